//! 驱动性能指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
///
/// ```rust
/// use kt2_driver::DriverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DriverMetrics::new();
/// metrics.packets_decoded.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().packets_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 从字节源读到的总字节数
    pub bytes_read: AtomicU64,
    /// 返回数据的硬件读取次数
    pub hardware_reads: AtomicU64,
    /// 读超时次数（正常现象）
    pub read_timeouts: AtomicU64,
    /// 设备错误次数
    pub device_errors: AtomicU64,
    /// 同步并解码成功的包数
    pub packets_decoded: AtomicU64,
    /// 同步前丢弃过字节的次数
    pub resync_events: AtomicU64,
    /// 搜索同步字时丢弃的字节数
    pub bytes_skipped: AtomicU64,
    /// 行号超出配置行数的包数
    pub row_range_violations: AtomicU64,
    pub frames_completed: AtomicU64,
    /// 成功放入发布通道的条目数（帧或原始包）
    pub frames_published: AtomicU64,
    /// 发布通道满或无接收端而丢弃的条目数
    pub frames_dropped: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            hardware_reads: self.hardware_reads.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            resync_events: self.resync_events.load(Ordering::Relaxed),
            bytes_skipped: self.bytes_skipped.load(Ordering::Relaxed),
            row_range_violations: self.row_range_violations.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.bytes_read,
            &self.hardware_reads,
            &self.read_timeouts,
            &self.device_errors,
            &self.packets_decoded,
            &self.resync_events,
            &self.bytes_skipped,
            &self.row_range_violations,
            &self.frames_completed,
            &self.frames_published,
            &self.frames_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub hardware_reads: u64,
    pub read_timeouts: u64,
    pub device_errors: u64,
    pub packets_decoded: u64,
    pub resync_events: u64,
    pub bytes_skipped: u64,
    pub row_range_violations: u64,
    pub frames_completed: u64,
    pub frames_published: u64,
    pub frames_dropped: u64,
}

impl MetricsSnapshot {
    /// 丢弃字节占读取字节的百分比
    ///
    /// `bytes_read` 为 0 时返回 0.0。
    pub fn skip_rate(&self) -> f64 {
        if self.bytes_read == 0 {
            return 0.0;
        }
        (self.bytes_skipped as f64 / self.bytes_read as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = DriverMetrics::new();
        metrics.bytes_read.fetch_add(1000, Ordering::Relaxed);
        metrics.bytes_skipped.fetch_add(10, Ordering::Relaxed);
        metrics.frames_completed.fetch_add(2, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_read, 1000);
        assert_eq!(snapshot.frames_completed, 2);
        assert!((snapshot.skip_rate() - 1.0).abs() < f64::EPSILON);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_skip_rate_without_data() {
        assert_eq!(MetricsSnapshot::default().skip_rate(), 0.0);
    }
}
