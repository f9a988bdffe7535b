//! 传感器驱动句柄
//!
//! 持有读硬件线程和流水线线程，负责有序关闭：
//! 请求退出 → 读线程退出并交还字节源 → 关闭缓冲区 → 流水线退出 → 关闭硬件句柄。

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::pipeline::{Published, pipeline_loop};
use crate::reader::reader_loop;
use crate::ring_buffer::{RingBuffer, RingEvent};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use kt2_protocol::Frame;
use kt2_serial::ByteSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

type BoxedSource = Box<dyn ByteSource + Send>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 带超时的线程 join
trait JoinTimeout<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<T>;
}

impl<T: Send + 'static> JoinTimeout<T> for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<T> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// KT2 传感器驱动
///
/// # Example
///
/// ```
/// use kt2_driver::{DriverConfig, Kt2};
/// use kt2_serial::{MockByteSource, synthetic_stream};
/// use std::time::Duration;
///
/// let source = MockByteSource::chunked(&synthetic_stream(80, 1), 1000);
/// let mut kt2 = Kt2::start(source, DriverConfig::default()).unwrap();
/// let frame = kt2.next_frame(Duration::from_secs(2)).unwrap();
/// assert_eq!(frame.rows(), 80);
/// kt2.shutdown().unwrap();
/// ```
pub struct Kt2 {
    ring: Arc<RingBuffer>,
    output_rx: Receiver<Published>,
    latest: Arc<ArcSwapOption<Frame>>,
    metrics: Arc<DriverMetrics>,
    is_running: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<BoxedSource>>,
    pipeline_thread: Option<JoinHandle<()>>,
    config: DriverConfig,
    source_name: String,
}

impl Kt2 {
    /// 启动读线程，等待其就绪后再启动流水线线程
    pub fn start<S>(source: S, config: DriverConfig) -> Result<Self, DriverError>
    where
        S: ByteSource + Send + 'static,
    {
        config.validate()?;

        let source_name = source.describe();
        let ring = Arc::new(RingBuffer::with_diagnostics(config.record_diagnostics));
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(DriverMetrics::new());
        let latest = Arc::new(ArcSwapOption::empty());
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(1);
        let (output_tx, output_rx) = crossbeam_channel::bounded(config.publish_capacity);

        let reader_thread = {
            let ring = ring.clone();
            let config = config.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name("kt2-reader".to_string())
                .spawn(move || -> BoxedSource {
                    Box::new(reader_loop(
                        source, ring, config, is_running, ready_tx, metrics,
                    ))
                })
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };

        if ready_rx.recv_timeout(config.ready_timeout).is_err() {
            is_running.store(false, Ordering::Release);
            ring.close();
            if let Ok(mut source) = reader_thread.join_timeout(JOIN_TIMEOUT) {
                let _ = source.close();
            }
            return Err(DriverError::ReaderNotReady(config.ready_timeout));
        }

        let pipeline_thread = {
            let pipeline_ring = ring.clone();
            let config = config.clone();
            let latest = latest.clone();
            let metrics = metrics.clone();
            let spawned = thread::Builder::new()
                .name("kt2-pipeline".to_string())
                .spawn(move || pipeline_loop(pipeline_ring, config, output_tx, latest, metrics));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    is_running.store(false, Ordering::Release);
                    ring.close();
                    if let Ok(mut source) = reader_thread.join_timeout(JOIN_TIMEOUT) {
                        let _ = source.close();
                    }
                    return Err(DriverError::IoThread(e.to_string()));
                },
            }
        };

        info!(
            "KT2 driver started on {} ({} rows, {:?})",
            source_name, config.rows, config.publish_mode
        );

        Ok(Self {
            ring,
            output_rx,
            latest,
            metrics,
            is_running,
            reader_thread: Some(reader_thread),
            pipeline_thread: Some(pipeline_thread),
            config,
            source_name,
        })
    }

    /// 流水线输出通道
    pub fn output(&self) -> &Receiver<Published> {
        &self.output_rx
    }

    /// 等待下一个输出（帧或原始包）
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Published, DriverError> {
        self.output_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => DriverError::Timeout,
            RecvTimeoutError::Disconnected => DriverError::ChannelClosed,
        })
    }

    /// 等待下一帧，跳过原始包
    pub fn next_frame(&self, timeout: Duration) -> Result<Frame, DriverError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if let Published::Frame(frame) = self.recv_timeout(remaining)? {
                return Ok(frame);
            }
        }
    }

    /// 丢弃已排队的输出，返回丢弃数量
    pub fn discard_pending(&self) -> usize {
        self.output_rx.try_iter().count()
    }

    /// 最近完成的一帧
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.latest.load_full()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 环形缓冲区当前积压的字节数
    pub fn backlog(&self) -> usize {
        self.ring.len()
    }

    pub fn drain_ring_events(&self) -> Vec<RingEvent> {
        self.ring.drain_events()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 两个线程都存活且未请求退出
    pub fn is_healthy(&self) -> bool {
        self.is_running() && is_alive(&self.reader_thread) && is_alive(&self.pipeline_thread)
    }

    /// 有序关闭（幂等）
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        // Release: 之前的写入对读线程可见
        self.is_running.store(false, Ordering::Release);

        let had_reader = self.reader_thread.is_some();
        let source = match self.reader_thread.take() {
            Some(handle) => match handle.join_timeout(JOIN_TIMEOUT) {
                Ok(source) => Some(source),
                Err(_) => {
                    error!(
                        "Reader thread panicked or failed to shut down within {:?}",
                        JOIN_TIMEOUT
                    );
                    None
                },
            },
            None => None,
        };

        self.ring.close();

        if let Some(handle) = self.pipeline_thread.take() {
            if handle.join_timeout(JOIN_TIMEOUT).is_err() {
                error!(
                    "Pipeline thread panicked or failed to shut down within {:?}",
                    JOIN_TIMEOUT
                );
            }
        }

        match source {
            Some(mut source) => {
                source.close()?;
                debug!("Closed {}", self.source_name);
                Ok(())
            },
            None if !had_reader => Ok(()),
            None => {
                warn!("Byte source {} not returned by reader", self.source_name);
                Err(DriverError::IoThread("reader thread did not exit".to_string()))
            },
        }
    }
}

fn is_alive<T>(handle: &Option<JoinHandle<T>>) -> bool {
    handle.as_ref().is_some_and(|h| !h.is_finished())
}

impl Drop for Kt2 {
    fn drop(&mut self) {
        if self.reader_thread.is_some() || self.pipeline_thread.is_some() {
            if let Err(e) = self.shutdown() {
                warn!("KT2 driver shutdown error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt2_serial::{MockByteSource, SerialError, synthetic_stream};

    struct StuckSource;

    impl ByteSource for StuckSource {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, SerialError> {
            Err(SerialError::Timeout)
        }
    }

    #[test]
    fn test_start_rejects_bad_config() {
        let config = DriverConfig {
            rows: 0,
            ..Default::default()
        };
        assert!(matches!(
            Kt2::start(StuckSource, config),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut kt2 = Kt2::start(StuckSource, DriverConfig::default()).unwrap();
        assert!(kt2.is_healthy());
        kt2.shutdown().unwrap();
        assert!(!kt2.is_running());
        assert!(!kt2.is_healthy());
        kt2.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_closes_source_after_reader_exit() {
        let source = MockByteSource::new(vec![]);
        let closed = source.closed_flag();
        let mut kt2 = Kt2::start(source, DriverConfig::default()).unwrap();
        assert!(!closed.load(Ordering::Acquire));
        kt2.shutdown().unwrap();
        assert!(closed.load(Ordering::Acquire));
    }

    #[test]
    fn test_pipeline_shares_ring_with_handle() {
        let source = MockByteSource::chunked(&synthetic_stream(80, 1), 1000);
        let mut kt2 = Kt2::start(source, DriverConfig::default()).unwrap();
        assert!(!kt2.ring.is_closed());

        // 流水线消费的是同一个缓冲区：整帧读出后不再有积压
        let frame = kt2.next_frame(Duration::from_secs(2)).unwrap();
        assert_eq!(frame.rows(), 80);
        assert_eq!(kt2.backlog(), 0);

        kt2.shutdown().unwrap();
        assert!(kt2.ring.is_closed());
        assert!(!kt2.is_healthy());
    }

    #[test]
    fn test_drop_shuts_down() {
        let source = MockByteSource::new(vec![]);
        let closed = source.closed_flag();
        {
            let _kt2 = Kt2::start(source, DriverConfig::default()).unwrap();
        }
        assert!(closed.load(Ordering::Acquire));
    }

    #[test]
    fn test_next_frame_timeout() {
        let kt2 = Kt2::start(StuckSource, DriverConfig::default()).unwrap();
        assert!(matches!(
            kt2.next_frame(Duration::from_millis(20)),
            Err(DriverError::Timeout)
        ));
        assert!(kt2.latest_frame().is_none());
    }
}
