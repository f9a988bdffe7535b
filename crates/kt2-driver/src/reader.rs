//! 读硬件线程
//!
//! 只做两件事：从字节源读字节、追加到环形缓冲区。不解析任何内容。

use crate::config::DriverConfig;
use crate::metrics::DriverMetrics;
use crate::ring_buffer::RingBuffer;
use crossbeam_channel::Sender;
use kt2_serial::{ByteSource, SerialError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, trace, warn};

/// 读硬件循环
///
/// 进入循环前通过 `ready_tx` 发出就绪信号；`is_running` 变为 `false` 后退出，
/// 退出时关闭环形缓冲区并把字节源交还给调用者，由调用者负责关闭硬件句柄。
///
/// 致命设备错误会把 `is_running` 置为 `false`。
pub fn reader_loop<S: ByteSource>(
    mut source: S,
    ring: Arc<RingBuffer>,
    config: DriverConfig,
    is_running: Arc<AtomicBool>,
    ready_tx: Sender<()>,
    metrics: Arc<DriverMetrics>,
) -> S {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("Reader thread priority set to MAX (realtime)"),
            Err(e) => warn!(
                "Failed to set reader thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                e
            ),
        }
    }

    let mut buf = vec![0u8; config.read_chunk.max(1)];
    debug!("Reader thread started on {}", source.describe());

    if ready_tx.send(()).is_err() {
        warn!("Reader thread: nobody waiting for ready signal");
    }

    loop {
        // Acquire: 看到 false 时必须看到其他线程在此之前的写入
        if !is_running.load(Ordering::Acquire) {
            trace!("Reader thread: is_running flag is false, exiting");
            break;
        }

        match source.read(&mut buf) {
            Ok(n) => {
                metrics.hardware_reads.fetch_add(1, Ordering::Relaxed);
                metrics.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                ring.append(&buf[..n]);
                if n < buf.len() {
                    spin_sleep::sleep(config.idle_sleep);
                }
            },
            Err(SerialError::Timeout) => {
                metrics.read_timeouts.fetch_add(1, Ordering::Relaxed);
                spin_sleep::sleep(config.idle_sleep);
            },
            Err(e) => {
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                if e.is_fatal() {
                    error!("Reader thread: fatal error on {}: {}", source.describe(), e);
                    // Release: 之前的写入对看到 false 的线程可见
                    is_running.store(false, Ordering::Release);
                    break;
                }
                warn!("Reader thread: read error: {}", e);
                spin_sleep::sleep(config.idle_sleep);
            },
        }
    }

    ring.close();
    debug!("Reader thread exited");
    source
}
