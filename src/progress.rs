//! 上传进度
//!
//! 传输层在请求体被读取时累计已发送字节，通过回调上报 [`UploadProgress`]；
//! 组件侧用 [`ProgressThrottler`] 控制状态栏刷新频率，避免事件风暴

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 默认节流间隔（毫秒）
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// 进度回调
pub type ProgressFn<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

/// 上传进度快照
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct UploadProgress {
    /// 已发送字节数
    pub loaded: u64,
    /// 总字节数，0 表示长度不可计算
    pub total: u64,
}

impl UploadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }

    /// 长度是否可计算
    pub fn length_computable(&self) -> bool {
        self.total > 0
    }

    /// 进度百分比，长度不可计算时返回 None
    pub fn percent(&self) -> Option<f64> {
        if !self.length_computable() {
            return None;
        }
        Some(self.loaded.min(self.total) as f64 / self.total as f64 * 100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.length_computable() && self.loaded >= self.total
    }
}

/// 已发送字节计数器
///
/// 多个文件分片共享同一个计数器，`add` 返回累计后的进度
#[derive(Debug)]
pub struct ProgressCounter {
    loaded: AtomicU64,
    total: u64,
}

impl ProgressCounter {
    pub fn new(total: u64) -> Self {
        Self {
            loaded: AtomicU64::new(0),
            total,
        }
    }

    pub fn add(&self, bytes: u64) -> UploadProgress {
        let loaded = self.loaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        UploadProgress::new(loaded, self.total)
    }

    pub fn snapshot(&self) -> UploadProgress {
        UploadProgress::new(self.loaded.load(Ordering::Relaxed), self.total)
    }
}

/// 进度事件节流器
///
/// 每次收到进度时调用 `should_emit()`，返回 true 时才刷新状态
#[derive(Debug)]
pub struct ProgressThrottler {
    /// 创建时刻，时间戳都相对它计算
    origin: Instant,
    /// 上次发布的时间戳（纳秒），0 表示尚未发布
    last_emit_nanos: AtomicU64,
    interval_nanos: u64,
}

impl ProgressThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_emit_nanos: AtomicU64::new(0),
            interval_nanos: interval.as_nanos() as u64,
        }
    }

    pub fn with_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// 距离上次发布超过间隔时返回 true 并更新时间戳
    pub fn should_emit(&self) -> bool {
        // +1 保证首次调用时时间戳不为 0
        let now = self.origin.elapsed().as_nanos() as u64 + 1;
        let last = self.last_emit_nanos.load(Ordering::Relaxed);

        if last != 0 && now.saturating_sub(last) < self.interval_nanos {
            return false;
        }

        self.last_emit_nanos
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// 强制发布（最后一次进度）
    pub fn force_emit(&self) -> bool {
        let now = self.origin.elapsed().as_nanos() as u64 + 1;
        self.last_emit_nanos.store(now, Ordering::Relaxed);
        true
    }

    pub fn reset(&self) {
        self.last_emit_nanos.store(0, Ordering::Relaxed);
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::with_millis(DEFAULT_PROGRESS_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_percent() {
        assert_eq!(UploadProgress::new(0, 0).percent(), None);
        assert_eq!(UploadProgress::new(50, 200).percent(), Some(25.0));
        assert_eq!(UploadProgress::new(300, 200).percent(), Some(100.0));
        assert!(UploadProgress::new(200, 200).is_complete());
        assert!(!UploadProgress::new(0, 0).is_complete());
    }

    #[test]
    fn test_counter_accumulates() {
        let counter = ProgressCounter::new(10);
        assert_eq!(counter.add(4), UploadProgress::new(4, 10));
        assert_eq!(counter.add(6), UploadProgress::new(10, 10));
        assert!(counter.snapshot().is_complete());
    }

    #[test]
    fn test_throttlers_are_independent() {
        let first = ProgressThrottler::with_millis(1000);
        let second = ProgressThrottler::with_millis(1000);

        assert!(first.should_emit());
        assert!(!first.should_emit());
        // 另一次上传有自己的起点，不受前一个节流器影响
        assert!(second.should_emit());
    }

    #[test]
    fn test_throttler_shared_across_threads() {
        let throttler = Arc::new(ProgressThrottler::with_millis(1000));

        let worker = {
            let throttler = Arc::clone(&throttler);
            thread::spawn(move || throttler.should_emit())
        };
        assert!(worker.join().unwrap());
        assert!(!throttler.should_emit());
    }

    #[test]
    fn test_emits_again_after_interval() {
        let throttler = ProgressThrottler::with_millis(30);
        assert!(throttler.should_emit());
        thread::sleep(Duration::from_millis(40));
        assert!(throttler.should_emit());
        assert!(!throttler.should_emit());
    }

    #[test]
    fn test_zero_interval_never_throttles() {
        let throttler = ProgressThrottler::with_millis(0);
        assert!(throttler.should_emit());
        assert!(throttler.should_emit());
    }

    #[test]
    fn test_force_emit_restarts_interval() {
        // 尚未发布过也能强制发布，之后的普通进度要等满间隔
        let throttler = ProgressThrottler::with_millis(1000);
        assert!(throttler.force_emit());
        assert!(!throttler.should_emit());

        throttler.reset();
        assert!(throttler.should_emit());
        assert!(!throttler.should_emit());
    }
}
