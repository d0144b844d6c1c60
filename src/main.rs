use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use svault_upload::{
    config::DEFAULT_CONFIG_PATH, logging, AppConfig, ConsoleView, FileSelection, HttpTransport,
    PageLocation, UploadOutcome, UploadWidget, WidgetOptions,
};
use tracing::{error, info};

/// 向文件服务器上传文件
#[derive(Debug, Parser)]
#[command(name = "svault-upload", version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 页面地址，如 http://127.0.0.1:8080/?dir=/photos
    /// 也可以是相对地址 `?dir=/photos`，基于配置中的服务器地址解析
    page: String,

    /// 上传目录，覆盖页面地址中的 `dir` 参数
    #[arg(long)]
    dir: Option<String>,

    /// 待上传文件；为空时只显示目录导航
    files: Vec<PathBuf>,
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = AppConfig::load_or_default(&cli.config).await?;
    let base_url = config.server.parsed_base_url()?;

    let mut location = PageLocation::parse(&cli.page, Some(&base_url))?;
    if let Some(dir) = cli.dir.as_deref() {
        location = location.with_dir(dir);
    }
    let transport = HttpTransport::new(&location.server_root(), &config.upload)
        .context("创建上传客户端失败")?;
    let widget = UploadWidget::new(
        &location,
        transport,
        ConsoleView::stdout(),
        WidgetOptions::from(&config.upload),
    );

    widget.mount().await;
    if cli.files.is_empty() {
        return Ok(true);
    }

    let selection = FileSelection::pick_paths(cli.files).await?;
    widget.on_picker_change(selection);

    match widget.on_upload_click().await {
        Ok(UploadOutcome::Completed) => {
            info!("上传成功: dir={}", widget.upload_dir());
            Ok(true)
        }
        Ok(UploadOutcome::Disabled) => {
            error!("服务器未开放上传");
            Ok(false)
        }
        Ok(outcome) => {
            info!("未发起上传: {:?}", outcome);
            Ok(true)
        }
        Err(e) => {
            error!("上传失败: {}", e);
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 日志配置需在完整加载配置前确定，读取失败时使用默认值
    let log_config = AppConfig::load_from_file(&cli.config)
        .await
        .map(|config| config.log)
        .unwrap_or_default();
    let _log_guard = logging::init_logging(&log_config);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
