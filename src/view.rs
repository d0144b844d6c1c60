//! 页面宿主接口
//!
//! 组件通过 [`PageView`] 操作展示区域（面包屑、上传按钮、拖放区、状态栏），
//! 页面刷新也由宿主负责。提供两个实现：
//! - [`ConsoleView`]：终端输出，供命令行使用
//! - [`MemoryView`]：把渲染结果保存在内存中，供嵌入和测试使用

use crate::breadcrumb::BreadcrumbTrail;
use crate::status::UploadStatus;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 回到行首并清除当前行（ANSI EL2）
const CLEAR_LINE: &str = "\r\x1b[2K";

/// 页面宿主
pub trait PageView: Send + Sync {
    /// 替换面包屑区域内容
    fn render_breadcrumbs(&self, trail: &BreadcrumbTrail);

    /// 显示上传按钮并设置文本
    fn show_upload_button(&self, label: &str);

    /// 拖放区高亮
    fn set_drop_highlight(&self, active: bool);

    /// 更新状态栏
    fn set_status(&self, status: &UploadStatus);

    /// 显示服务器名称
    fn set_title(&self, _name: &str) {}

    /// 请求刷新页面（重新渲染目录列表）
    fn reload(&self);
}

/// 内存中的页面状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    pub breadcrumbs_html: Option<String>,
    pub title: Option<String>,
    pub upload_button: Option<String>,
    pub drop_highlight: bool,
    pub status_text: String,
    /// 状态栏历史，按写入顺序
    pub status_history: Vec<UploadStatus>,
}

impl PageState {
    pub fn upload_button_visible(&self) -> bool {
        self.upload_button.is_some()
    }
}

/// 内存页面宿主
#[derive(Debug, Default)]
pub struct MemoryView {
    state: Mutex<PageState>,
    reloads: AtomicUsize,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PageState {
        self.state.lock().clone()
    }

    /// 已请求刷新次数
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl PageView for MemoryView {
    fn render_breadcrumbs(&self, trail: &BreadcrumbTrail) {
        self.state.lock().breadcrumbs_html = Some(trail.render_html());
    }

    fn show_upload_button(&self, label: &str) {
        self.state.lock().upload_button = Some(label.to_string());
    }

    fn set_drop_highlight(&self, active: bool) {
        self.state.lock().drop_highlight = active;
    }

    fn set_status(&self, status: &UploadStatus) {
        let mut state = self.state.lock();
        state.status_text = status.to_string();
        state.status_history.push(status.clone());
    }

    fn set_title(&self, name: &str) {
        self.state.lock().title = Some(name.to_string());
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// 终端页面宿主
///
/// 上传进度在同一行刷新，其余状态各占一行
pub struct ConsoleView<W: Write + Send> {
    out: Mutex<W>,
    reloads: AtomicUsize,
}

impl ConsoleView<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            reloads: AtomicUsize::new(0),
        }
    }

    pub fn reload_requested(&self) -> bool {
        self.reloads.load(Ordering::SeqCst) > 0
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::warn!("写入终端失败: {}", e);
        }
    }
}

impl<W: Write + Send> PageView for ConsoleView<W> {
    fn render_breadcrumbs(&self, trail: &BreadcrumbTrail) {
        self.write_line(&trail.render_text());
    }

    fn show_upload_button(&self, label: &str) {
        self.write_line(&format!("[{}]", label));
    }

    fn set_drop_highlight(&self, _active: bool) {}

    fn set_status(&self, status: &UploadStatus) {
        let mut out = self.out.lock();
        // 回到行首并清除整行，较短的文本不会残留上一条的尾巴
        let result = if status.is_uploading() {
            write!(out, "{}{}", CLEAR_LINE, status).and_then(|_| out.flush())
        } else {
            writeln!(out, "{}{}", CLEAR_LINE, status).and_then(|_| out.flush())
        };
        if let Err(e) = result {
            tracing::warn!("写入终端失败: {}", e);
        }
    }

    fn set_title(&self, name: &str) {
        self.write_line(name);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        tracing::info!("上传完成，已请求刷新目录列表");
    }
}
