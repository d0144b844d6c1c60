// 上传组件控制器
//
// 组件状态（暂存文件、状态栏、是否允许上传）全部由 UploadWidget 持有，
// 事件处理器都接收 &self，可在上传等待网络期间继续处理拖放事件

use crate::breadcrumb::BreadcrumbTrail;
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::location::PageLocation;
use crate::progress::{ProgressThrottler, UploadProgress};
use crate::staging::{upload_button_label, FileSelection, StagedFiles};
use crate::status::UploadStatus;
use crate::transport::{UploadRequest, UploadTransport};
use crate::utils::fmt_bytes;
use crate::view::PageView;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 点击上传的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 上传成功，已请求刷新页面
    Completed,
    /// 没有暂存文件，未发起请求
    NothingStaged,
    /// 已有上传进行中，未发起请求
    AlreadyInFlight,
    /// 服务器不允许上传，未发起请求
    Disabled,
}

/// 组件选项
#[derive(Debug, Clone)]
pub struct WidgetOptions {
    /// 进度刷新最小间隔
    pub progress_interval: Duration,
    /// 挂载时是否查询服务器配置
    pub check_server_config: bool,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for WidgetOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            progress_interval: config.progress_interval(),
            check_server_config: config.check_server_config,
        }
    }
}

#[derive(Debug, Default)]
struct WidgetState {
    staged: StagedFiles,
    status: UploadStatus,
    uploads_disabled: bool,
}

/// 上传中标记守卫，离开作用域时释放
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 上传组件
pub struct UploadWidget<T, V> {
    upload_dir: String,
    transport: T,
    view: V,
    options: WidgetOptions,
    state: Mutex<WidgetState>,
    in_flight: AtomicBool,
}

impl<T: UploadTransport, V: PageView> UploadWidget<T, V> {
    /// 创建组件，上传目录在此时从页面地址读取且之后不再变化
    pub fn new(location: &PageLocation, transport: T, view: V, options: WidgetOptions) -> Self {
        Self {
            upload_dir: location.upload_dir(),
            transport,
            view,
            options,
            state: Mutex::new(WidgetState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> UploadStatus {
        self.state.lock().status.clone()
    }

    pub fn staged_count(&self) -> usize {
        self.state.lock().staged.len()
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn uploads_allowed(&self) -> bool {
        !self.state.lock().uploads_disabled
    }

    /// 挂载：渲染面包屑，按需查询服务器是否允许上传
    ///
    /// 查询失败时只记录警告，仍允许上传
    pub async fn mount(&self) {
        let trail = BreadcrumbTrail::from_path(&self.upload_dir);
        self.view.render_breadcrumbs(&trail);

        if !self.options.check_server_config {
            return;
        }

        match self.transport.server_info().await {
            Ok(info) => {
                if !info.name.is_empty() {
                    self.view.set_title(&info.name);
                }
                if !info.allow_uploads {
                    info!("服务器未开放上传: {}", info.name);
                }
                self.state.lock().uploads_disabled = !info.allow_uploads;
            }
            Err(e) => warn!("获取服务器配置失败，默认允许上传: {}", e),
        }
    }

    pub fn on_drag_over(&self) {
        self.view.set_drop_highlight(true);
    }

    pub fn on_drag_leave(&self) {
        self.view.set_drop_highlight(false);
    }

    /// 拖放文件
    pub fn on_drop(&self, selection: FileSelection) {
        self.view.set_drop_highlight(false);
        self.stage(selection);
    }

    /// 文件选择器变更
    pub fn on_picker_change(&self, selection: FileSelection) {
        self.stage(selection);
    }

    /// 整体替换暂存文件；数量为 0 时不改动按钮
    fn stage(&self, selection: FileSelection) {
        let count = selection.len();
        let total_size = {
            let mut state = self.state.lock();
            state.staged.replace(selection.files);
            state.staged.total_size()
        };

        debug!(
            "暂存文件: source={:?}, count={}, size={}",
            selection.source,
            count,
            fmt_bytes(total_size)
        );

        if let Some(label) = upload_button_label(count) {
            self.view.show_upload_button(&label);
        }
    }

    /// 点击上传
    ///
    /// 成功（HTTP 200）时状态栏显示完成并请求刷新页面；
    /// 非 200 或网络错误时显示错误文本并返回 Err，不自动重试
    pub async fn on_upload_click(&self) -> Result<UploadOutcome, UploadError> {
        let files = {
            let state = self.state.lock();
            if state.uploads_disabled {
                return Ok(UploadOutcome::Disabled);
            }
            if state.staged.is_empty() {
                return Ok(UploadOutcome::NothingStaged);
            }
            state.staged.snapshot()
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("已有上传进行中，忽略本次点击");
            return Ok(UploadOutcome::AlreadyInFlight);
        };

        let upload_id = Uuid::new_v4();
        info!(
            "开始上传: id={}, dir={}, files={}",
            upload_id,
            self.upload_dir,
            files.len()
        );
        self.set_status(UploadStatus::Uploading { percent: None });

        let request = UploadRequest {
            upload_dir: self.upload_dir.clone(),
            files,
        };
        let throttler = ProgressThrottler::new(self.options.progress_interval);
        let on_progress = |progress: UploadProgress| self.on_progress(&throttler, progress);

        match self.transport.send(request, &on_progress).await {
            Ok(StatusCode::OK) => {
                info!("上传完成: id={}", upload_id);
                self.set_status(UploadStatus::Complete);
                self.view.reload();
                Ok(UploadOutcome::Completed)
            }
            Ok(status) => {
                let err = UploadError::Rejected { status };
                error!("上传失败: id={}, {}", upload_id, err);
                self.set_status(UploadStatus::failed(err.failure_kind()));
                Err(err)
            }
            Err(err) => {
                error!("上传失败: id={}, {}", upload_id, err);
                self.set_status(UploadStatus::failed(err.failure_kind()));
                Err(err)
            }
        }
    }

    fn on_progress(&self, throttler: &ProgressThrottler, progress: UploadProgress) {
        let Some(percent) = progress.percent() else {
            return;
        };
        let emit = if progress.is_complete() {
            throttler.force_emit()
        } else {
            throttler.should_emit()
        };
        if emit {
            self.set_status(UploadStatus::Uploading {
                percent: Some(percent),
            });
        }
    }

    fn set_status(&self, status: UploadStatus) {
        self.state.lock().status = status.clone();
        self.view.set_status(&status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressFn;
    use crate::staging::StagedFile;
    use crate::status::FailureKind;
    use crate::transport::ServerInfo;
    use crate::view::MemoryView;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// 按预设结果应答的传输，记录收到的请求
    #[derive(Default)]
    struct ScriptedTransport {
        status: Option<StatusCode>,
        server_info: Option<ServerInfo>,
        requests: Mutex<Vec<UploadRequest>>,
        sends: AtomicUsize,
        /// 设置后 send 会等待通知再返回
        gate: Option<Arc<Notify>>,
        /// 上报进度的次数，0 时按两次（一半、全部）上报
        progress_steps: u64,
    }

    impl ScriptedTransport {
        fn responding(status: StatusCode) -> Self {
            Self {
                status: Some(status),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self::default()
        }

        fn send_count(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn send(
            &self,
            request: UploadRequest,
            on_progress: ProgressFn<'_>,
        ) -> Result<StatusCode, UploadError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let total = request.total_size();
            self.requests.lock().push(request);

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let steps = self.progress_steps.max(2);
            for step in 1..=steps {
                on_progress(UploadProgress::new(total * step / steps, total));
            }

            match self.status {
                Some(status) => Ok(status),
                None => Err(UploadError::io(
                    "/dev/net",
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
                )),
            }
        }

        async fn server_info(&self) -> Result<ServerInfo, UploadError> {
            self.server_info.clone().ok_or_else(|| {
                UploadError::InvalidResponse("no config".to_string())
            })
        }
    }

    fn widget_at(
        url: &str,
        transport: ScriptedTransport,
    ) -> UploadWidget<ScriptedTransport, MemoryView> {
        widget_with_interval(url, transport, Duration::ZERO)
    }

    fn widget_with_interval(
        url: &str,
        transport: ScriptedTransport,
        progress_interval: Duration,
    ) -> UploadWidget<ScriptedTransport, MemoryView> {
        let location = PageLocation::parse(url, None).unwrap();
        let options = WidgetOptions {
            progress_interval,
            check_server_config: true,
        };
        UploadWidget::new(&location, transport, MemoryView::new(), options)
    }

    fn widget(transport: ScriptedTransport) -> UploadWidget<ScriptedTransport, MemoryView> {
        widget_at("http://host/?dir=/a/b", transport)
    }

    fn files(names: &[&str]) -> Vec<StagedFile> {
        names
            .iter()
            .map(|name| StagedFile::from_bytes(*name, name.as_bytes().to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_mount_renders_breadcrumbs() {
        let widget = widget_at("http://host/?dir=/a/b/c", ScriptedTransport::default());
        widget.mount().await;

        let html = widget.view().state().breadcrumbs_html.unwrap();
        assert!(html.contains("<a href=\"?dir=/a\">a</a>"));
        assert!(html.contains("<a href=\"?dir=/a/b\">b</a>"));
        assert!(html.contains("<span>c</span>"));
        // 配置查询失败时仍允许上传
        assert!(widget.uploads_allowed());
    }

    #[tokio::test]
    async fn test_root_dir_by_default() {
        let widget = widget_at("http://host/", ScriptedTransport::default());
        assert_eq!(widget.upload_dir(), "/");
    }

    #[test]
    fn test_label_pluralization() {
        let widget = widget(ScriptedTransport::default());
        widget.on_picker_change(FileSelection::picked(files(&["a"])));
        assert_eq!(
            widget.view().state().upload_button.as_deref(),
            Some("Upload 1 file")
        );

        widget.on_drop(FileSelection::dropped(files(&["a", "b"])));
        assert_eq!(
            widget.view().state().upload_button.as_deref(),
            Some("Upload 2 files")
        );
    }

    #[test]
    fn test_empty_selection_keeps_label() {
        let widget = widget(ScriptedTransport::default());
        widget.on_picker_change(FileSelection::picked(files(&["a", "b"])));
        widget.on_picker_change(FileSelection::picked(Vec::new()));

        let state = widget.view().state();
        assert_eq!(state.upload_button.as_deref(), Some("Upload 2 files"));
        assert_eq!(widget.staged_count(), 0);
    }

    #[test]
    fn test_drag_highlight() {
        let widget = widget(ScriptedTransport::default());
        widget.on_drag_over();
        assert!(widget.view().state().drop_highlight);
        widget.on_drag_leave();
        assert!(!widget.view().state().drop_highlight);

        widget.on_drag_over();
        widget.on_drop(FileSelection::dropped(files(&["a"])));
        assert!(!widget.view().state().drop_highlight);
    }

    #[tokio::test]
    async fn test_nothing_staged_skips_request() {
        let widget = widget(ScriptedTransport::responding(StatusCode::OK));
        let outcome = widget.on_upload_click().await.unwrap();

        assert_eq!(outcome, UploadOutcome::NothingStaged);
        assert_eq!(widget.transport().send_count(), 0);
        assert_eq!(widget.view().reload_count(), 0);
    }

    #[tokio::test]
    async fn test_restage_replaces_files() {
        let widget = widget(ScriptedTransport::responding(StatusCode::OK));
        widget.on_drop(FileSelection::dropped(files(&["first.txt"])));
        widget.on_picker_change(FileSelection::picked(files(&["second.txt"])));

        widget.on_upload_click().await.unwrap();

        let requests = widget.transport().requests.lock();
        assert_eq!(requests.len(), 1);
        let names: Vec<_> = requests[0].files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["second.txt"]);
        assert_eq!(requests[0].upload_dir, "/a/b");
    }

    #[tokio::test]
    async fn test_success_reloads_once() {
        let widget = widget(ScriptedTransport::responding(StatusCode::OK));
        widget.on_picker_change(FileSelection::picked(files(&["a.txt", "b.txt"])));

        let outcome = widget.on_upload_click().await.unwrap();
        assert_eq!(outcome, UploadOutcome::Completed);

        let state = widget.view().state();
        assert_eq!(state.status_text, "Upload complete!");
        assert_eq!(widget.view().reload_count(), 1);
        assert_eq!(widget.status(), UploadStatus::Complete);
        assert!(state.status_history.contains(&UploadStatus::Uploading {
            percent: Some(100.0)
        }));
        assert!(!widget.is_uploading());
    }

    #[tokio::test]
    async fn test_progress_throttled_between_first_and_last() {
        let transport = ScriptedTransport {
            status: Some(StatusCode::OK),
            progress_steps: 4,
            ..Default::default()
        };
        let widget = widget_with_interval("http://host/?dir=/a", transport, Duration::from_secs(1));
        widget.on_picker_change(FileSelection::picked(files(&["abcd"])));

        widget.on_upload_click().await.unwrap();

        // 25% 立即显示，50%/75% 落在间隔内被丢弃，100% 强制显示
        assert_eq!(
            widget.view().state().status_history,
            vec![
                UploadStatus::Uploading { percent: None },
                UploadStatus::Uploading { percent: Some(25.0) },
                UploadStatus::Uploading { percent: Some(100.0) },
                UploadStatus::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_status_shows_error() {
        let widget = widget(ScriptedTransport::responding(StatusCode::INTERNAL_SERVER_ERROR));
        widget.on_picker_change(FileSelection::picked(files(&["a.txt"])));

        let err = widget.on_upload_click().await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected { status } if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(widget.view().state().status_text, "Error uploading files.");
        assert_eq!(widget.view().reload_count(), 0);
        assert!(!widget.is_uploading());
    }

    #[tokio::test]
    async fn test_transport_error_shows_network_error() {
        let widget = widget(ScriptedTransport::failing());
        widget.on_picker_change(FileSelection::picked(files(&["a.txt"])));

        assert!(widget.on_upload_click().await.is_err());
        assert_eq!(
            widget.status(),
            UploadStatus::failed(FailureKind::Network)
        );
        assert_eq!(
            widget.view().state().status_text,
            "Network error during upload."
        );
        assert_eq!(widget.view().reload_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_by_server_config() {
        let transport = ScriptedTransport {
            status: Some(StatusCode::OK),
            server_info: Some(ServerInfo {
                name: "Kofi's Server".to_string(),
                allow_uploads: false,
            }),
            ..Default::default()
        };
        let widget = widget(transport);
        widget.mount().await;
        widget.on_picker_change(FileSelection::picked(files(&["a.txt"])));

        assert_eq!(
            widget.view().state().title.as_deref(),
            Some("Kofi's Server")
        );
        assert_eq!(widget.on_upload_click().await.unwrap(), UploadOutcome::Disabled);
        assert_eq!(widget.transport().send_count(), 0);
    }

    #[tokio::test]
    async fn test_second_click_while_in_flight_is_ignored() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport {
            status: Some(StatusCode::OK),
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let widget = Arc::new(widget(transport));
        widget.on_picker_change(FileSelection::picked(files(&["a.txt"])));

        let first = {
            let widget = Arc::clone(&widget);
            tokio::spawn(async move { widget.on_upload_click().await })
        };

        // 等待第一次上传进入传输层
        while widget.transport().send_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(widget.is_uploading());

        // 上传进行中仍可继续拖放
        widget.on_drop(FileSelection::dropped(files(&["b.txt", "c.txt"])));
        assert_eq!(
            widget.on_upload_click().await.unwrap(),
            UploadOutcome::AlreadyInFlight
        );

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), UploadOutcome::Completed);
        assert_eq!(widget.transport().send_count(), 1);
        assert!(!widget.is_uploading());

        // 完成后可以再次上传，使用新暂存的文件
        gate.notify_one();
        widget.on_upload_click().await.unwrap();
        let requests = widget.transport().requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].files.len(), 2);
    }
}
