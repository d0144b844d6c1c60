// 上传状态定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 失败类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// 服务器返回非 200
    Rejected,
    /// 网络错误
    Network,
}

/// 上传状态
///
/// 只由组件自身的事件处理器写入，展示文本见 `Display`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum UploadStatus {
    /// 空闲
    #[default]
    Idle,
    /// 上传中，长度可计算时带百分比
    Uploading { percent: Option<f64> },
    /// 已完成
    Complete,
    /// 失败
    Failed { kind: FailureKind },
}

impl UploadStatus {
    pub fn failed(kind: FailureKind) -> Self {
        Self::Failed { kind }
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self, Self::Uploading { .. })
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => Ok(()),
            Self::Uploading { percent: None } => write!(f, "Uploading..."),
            Self::Uploading {
                percent: Some(percent),
            } => write!(f, "Uploading: {:.2}%", percent),
            Self::Complete => write!(f, "Upload complete!"),
            Self::Failed {
                kind: FailureKind::Rejected,
            } => write!(f, "Error uploading files."),
            Self::Failed {
                kind: FailureKind::Network,
            } => write!(f, "Network error during upload."),
        }
    }
}
