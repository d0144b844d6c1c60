// 上传错误类型

use crate::status::FailureKind;
use reqwest::StatusCode;
use std::path::PathBuf;

/// 上传组件错误
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// 服务器返回非 200 状态码
    #[error("服务器拒绝上传: HTTP {status}")]
    Rejected { status: StatusCode },

    /// 网络传输失败（连接失败、超时、连接中断等）
    #[error("上传网络错误: {0}")]
    Network(#[from] reqwest::Error),

    /// 读取待上传文件失败
    #[error("读取文件失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 页面地址无法解析
    #[error("无效的页面地址: {0}")]
    InvalidUrl(String),

    /// 服务器响应无法解析
    #[error("无效的服务器响应: {0}")]
    InvalidResponse(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl UploadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 状态栏应展示的失败类型
    ///
    /// 只有服务器明确拒绝时显示为上传错误，其余都归为网络错误
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Rejected { .. } => FailureKind::Rejected,
            _ => FailureKind::Network,
        }
    }
}
