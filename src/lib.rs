// SVault Upload Library
// 文件服务器上传组件核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 错误类型
pub mod error;

// 页面地址
pub mod location;

// 面包屑导航
pub mod breadcrumb;

// 文件暂存
pub mod staging;

// 上传进度
pub mod progress;

// 上传状态
pub mod status;

// 传输层
pub mod transport;

// 页面宿主
pub mod view;

// 上传组件
pub mod widget;

pub mod utils;

// 导出常用类型
pub use breadcrumb::{Breadcrumb, BreadcrumbTrail};
pub use config::AppConfig;
pub use error::UploadError;
pub use location::PageLocation;
pub use progress::UploadProgress;
pub use staging::{FileSelection, SelectionSource, StagedFile};
pub use status::{FailureKind, UploadStatus};
pub use transport::{HttpTransport, ServerInfo, UploadRequest, UploadTransport};
pub use view::{ConsoleView, MemoryView, PageView};
pub use widget::{UploadOutcome, UploadWidget, WidgetOptions};
