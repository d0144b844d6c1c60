// 上传传输层
//
// 组件只依赖 UploadTransport trait，默认实现基于 reqwest multipart

use crate::config::{ServerConfig, UploadConfig};
use crate::error::UploadError;
use crate::progress::{ProgressCounter, ProgressFn, UploadProgress};
use crate::staging::{FileContent, StagedFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, TryStream, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// 一次上传请求
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// 目标目录
    pub upload_dir: String,
    /// 待上传文件
    pub files: Vec<StagedFile>,
}

impl UploadRequest {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// 服务器配置信息（`GET /config`）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    /// 服务器显示名称
    #[serde(default)]
    pub name: String,
    /// 是否允许上传
    #[serde(default)]
    pub allow_uploads: bool,
}

/// 上传传输接口
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// 发送上传请求，返回服务器状态码
    ///
    /// 只有传输失败才返回 Err；非 200 状态码由调用方判断
    async fn send(
        &self,
        request: UploadRequest,
        on_progress: ProgressFn<'_>,
    ) -> Result<StatusCode, UploadError>;

    /// 查询服务器配置
    async fn server_info(&self) -> Result<ServerInfo, UploadError>;
}

/// 基于 reqwest 的 HTTP 传输
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    upload_url: Url,
    config_url: Url,
    file_field: String,
    dir_field: String,
    /// 查询服务器配置的超时，与连接超时一致
    config_timeout: Duration,
}

impl HttpTransport {
    /// 创建 HTTP 传输
    ///
    /// # 参数
    /// * `base_url` - 服务器根地址
    /// * `upload` - 上传配置（接口路径、字段名、超时）
    pub fn new(base_url: &Url, upload: &UploadConfig) -> Result<Self, UploadError> {
        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|e| UploadError::Config(format!("接口地址无效 {}: {}", path, e)))
        };

        let mut builder = Client::builder().connect_timeout(upload.connect_timeout());
        if let Some(timeout) = upload.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(UploadError::Network)?;

        Ok(Self {
            client,
            upload_url: join(&upload.endpoint)?,
            config_url: join(&upload.config_endpoint)?,
            file_field: upload.file_field.clone(),
            dir_field: upload.dir_field.clone(),
            config_timeout: upload.connect_timeout(),
        })
    }

    /// 从应用配置创建
    pub fn from_config(server: &ServerConfig, upload: &UploadConfig) -> Result<Self, UploadError> {
        let base_url = server
            .parsed_base_url()
            .map_err(|e| UploadError::Config(format!("{:#}", e)))?;
        Self::new(&base_url, upload)
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    /// 构建 multipart 表单
    ///
    /// 每个文件一个同名字段，最后附加上传目录字段。
    /// 文件内容以流的形式发送，读取时累计进度并写入 `progress_tx`
    fn build_form(
        &self,
        request: UploadRequest,
        progress_tx: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<Form, UploadError> {
        let counter = Arc::new(ProgressCounter::new(request.total_size()));
        let mut form = Form::new();

        for file in request.files {
            let part = file_part(file, Arc::clone(&counter), progress_tx.clone())?;
            form = form.part(self.file_field.clone(), part);
        }

        Ok(form.text(self.dir_field.clone(), request.upload_dir))
    }
}

/// 本地文件内容流
///
/// 文件在该分段开始发送时才打开，读完即关闭，同一时刻最多占用一个文件句柄
fn path_stream(
    path: PathBuf,
) -> impl TryStream<Ok = Bytes, Error = std::io::Error> + Send + Sync + 'static {
    stream::once(tokio::fs::File::open(path))
        .map_ok(ReaderStream::new)
        .try_flatten()
}

fn file_part(
    file: StagedFile,
    counter: Arc<ProgressCounter>,
    progress_tx: mpsc::UnboundedSender<UploadProgress>,
) -> Result<Part, UploadError> {
    let report = move |chunk: &Bytes| {
        let progress = counter.add(chunk.len() as u64);
        // 接收端已结束说明请求已完成，丢弃即可
        let _ = progress_tx.send(progress);
    };

    let body = match file.content {
        FileContent::Path(path) => Body::wrap_stream(path_stream(path).inspect_ok(report)),
        FileContent::Bytes(data) => Body::wrap_stream(
            stream::iter(vec![Ok::<_, std::io::Error>(data)]).inspect_ok(report),
        ),
    };

    Part::stream_with_length(body, file.size)
        .file_name(file.name)
        .mime_str("application/octet-stream")
        .map_err(UploadError::Network)
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(
        &self,
        request: UploadRequest,
        on_progress: ProgressFn<'_>,
    ) -> Result<StatusCode, UploadError> {
        info!(
            "发送上传请求: url={}, dir={}, files={}, size={}",
            self.upload_url,
            request.upload_dir,
            request.files.len(),
            request.total_size()
        );

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let form = self.build_form(request, progress_tx)?;

        let send = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send();
        tokio::pin!(send);

        let response = loop {
            tokio::select! {
                Some(progress) = progress_rx.recv() => on_progress(progress),
                result = &mut send => break result?,
            }
        };

        while let Ok(progress) = progress_rx.try_recv() {
            on_progress(progress);
        }

        let status = response.status();
        if status == StatusCode::OK {
            debug!("上传请求完成: status={}", status);
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("上传请求被拒绝: status={}, body={}", status, body.trim());
        }

        Ok(status)
    }

    async fn server_info(&self) -> Result<ServerInfo, UploadError> {
        let response = self
            .client
            .get(self.config_url.clone())
            .timeout(self.config_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected { status });
        }

        let body = response.text().await?;
        let info: ServerInfo = serde_json::from_str(&body).map_err(|e| {
            UploadError::InvalidResponse(format!("解析服务器配置失败: {}, body={}", e, body))
        })?;

        debug!("服务器配置: {:?}", info);
        Ok(info)
    }
}
