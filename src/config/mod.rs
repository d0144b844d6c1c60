// 配置管理模块

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::progress::DEFAULT_PROGRESS_INTERVAL_MS;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/upload.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 文件服务器根地址，页面地址为相对地址时基于它解析
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl ServerConfig {
    pub fn parsed_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("服务器地址无效: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("服务器地址必须是 http 或 https: {}", self.base_url);
        }
        Ok(url)
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 上传接口路径
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 服务器配置接口路径
    #[serde(default = "default_config_endpoint")]
    pub config_endpoint: String,
    /// 文件字段名（每个文件一个同名字段）
    #[serde(default = "default_file_field")]
    pub file_field: String,
    /// 上传目录字段名
    #[serde(default = "default_dir_field")]
    pub dir_field: String,
    /// 连接超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 整个上传请求的截止时间（秒），0 表示不限制
    ///
    /// 一次请求携带全部文件，大文件上传耗时不可预估，默认不限制
    #[serde(default)]
    pub timeout_secs: u64,
    /// 进度刷新最小间隔（毫秒），0 表示不节流
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// 挂载时是否查询服务器是否允许上传
    #[serde(default = "default_check_server_config")]
    pub check_server_config: bool,
}

fn default_endpoint() -> String {
    "/upload".to_string()
}

fn default_config_endpoint() -> String {
    "/config".to_string()
}

fn default_file_field() -> String {
    "file".to_string()
}

fn default_dir_field() -> String {
    "uploadDir".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

fn default_check_server_config() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            config_endpoint: default_config_endpoint(),
            file_field: default_file_field(),
            dir_field: default_dir_field(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: 0,
            progress_interval_ms: default_progress_interval_ms(),
            check_server_config: default_check_server_config(),
        }
    }
}

impl UploadConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// 上传请求截止时间，未设置时返回 None
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("endpoint", &self.endpoint),
            ("config_endpoint", &self.config_endpoint),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{} 必须以 / 开头，当前值: {}", name, path);
            }
        }
        if self.file_field.is_empty() || self.dir_field.is_empty() {
            anyhow::bail!("表单字段名不能为空");
        }
        if self.connect_timeout_secs == 0 {
            anyhow::bail!("connect_timeout_secs 必须大于 0");
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否写入日志文件
    #[serde(default)]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.server.parsed_base_url()?;
        self.upload.validate()
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;
        config.validate().context("配置文件验证失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("创建配置目录失败")?;
            }
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("写入配置文件失败: {:?}", path))?;

        tracing::info!("✓ 配置已保存: {:?}", path);
        Ok(())
    }

    /// 加载配置，不存在时写出默认配置
    ///
    /// 文件存在但无效时直接报错，不覆盖用户的文件
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            let config = Self::load_from_file(path).await?;
            tracing::info!("配置文件加载成功: {:?}", path);
            return Ok(config);
        }

        tracing::warn!("配置文件不存在，使用默认配置: {:?}", path);
        let config = Self::default();
        if let Err(e) = config.save_to_file(path).await {
            tracing::error!("保存默认配置失败: {:#}", e);
        }
        Ok(config)
    }
}
