//! 字节环形缓冲区
//!
//! 单生产者（读硬件线程）/ 单消费者（解析线程）的无界 FIFO 字节队列。
//! 消费端 `read` 在条件变量上阻塞等待，直到数据足够或缓冲区被关闭。
//!
//! 缓冲区本身不限制增长，消费速度需要大致跟上生产速度。

use crate::error::RingBufferError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::trace;

/// 诊断事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingEventKind {
    Append,
    Read,
}

/// 一次 append/read 的诊断记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingEvent {
    pub kind: RingEventKind,
    /// append 的字节数，或 read 请求的字节数
    pub requested: usize,
    /// read 从队首移除的字节数（append 时为 0）
    pub popped: usize,
    /// 操作完成后的缓冲区长度
    pub len_after: usize,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    data: VecDeque<u8>,
    closed: bool,
    events: Option<Vec<RingEvent>>,
}

impl Inner {
    fn record(&mut self, kind: RingEventKind, requested: usize, popped: usize) {
        let len_after = self.data.len();
        if let Some(events) = self.events.as_mut() {
            events.push(RingEvent {
                kind,
                requested,
                popped,
                len_after,
                at: Instant::now(),
            });
        }
    }
}

/// 字节环形缓冲区
///
/// # Example
///
/// ```
/// use kt2_driver::RingBuffer;
///
/// let ring = RingBuffer::new();
/// ring.append(&[0x5A, 0xA5, 0x5A, 0xA5, 0x01]);
///
/// // 读 4 字节但只弹出 3 字节
/// assert_eq!(ring.read(4, 3).unwrap(), vec![0x5A, 0xA5, 0x5A, 0xA5]);
/// assert_eq!(ring.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RingBuffer {
    inner: Mutex<Inner>,
    available: Condvar,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启内存诊断日志（见 [`RingBuffer::drain_events`]）
    ///
    /// 每次 append/read 记录一条事件，日志只在 `drain_events` 时清空，
    /// 长时间运行需要调用方定期取出。
    pub fn with_diagnostics(enabled: bool) -> Self {
        let ring = Self::new();
        if enabled {
            ring.inner.lock().events = Some(Vec::new());
        }
        ring
    }

    /// 追加字节到队尾（仅生产者调用）
    ///
    /// 关闭后追加的数据被丢弃。
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.data.extend(bytes);
        inner.record(RingEventKind::Append, bytes.len(), 0);
        trace!(
            "ring append {} bytes (len {}): {}",
            bytes.len(),
            inner.data.len(),
            hex::encode(&bytes[..bytes.len().min(8)])
        );
        drop(inner);
        self.available.notify_one();
    }

    /// 读取队首 `n` 字节并弹出 `pop` 字节（仅消费者调用）
    ///
    /// 阻塞直到至少有 `max(n, pop)` 字节可用。缓冲区关闭且剩余数据不足时
    /// 返回 [`RingBufferError::Closed`]；关闭前已追加的完整数据仍按序交付。
    pub fn read(&self, n: usize, pop: usize) -> Result<Vec<u8>, RingBufferError> {
        let need = n.max(pop);
        let mut inner = self.inner.lock();
        while inner.data.len() < need {
            if inner.closed {
                return Err(RingBufferError::Closed {
                    available: inner.data.len(),
                });
            }
            self.available.wait(&mut inner);
        }
        Ok(Self::take(&mut inner, n, pop))
    }

    /// 带超时的 [`RingBuffer::read`]，超时返回 `Ok(None)`
    pub fn read_timeout(
        &self,
        n: usize,
        pop: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, RingBufferError> {
        let need = n.max(pop);
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.data.len() < need {
            if inner.closed {
                return Err(RingBufferError::Closed {
                    available: inner.data.len(),
                });
            }
            if self.available.wait_until(&mut inner, deadline).timed_out()
                && inner.data.len() < need
            {
                return if inner.closed {
                    Err(RingBufferError::Closed {
                        available: inner.data.len(),
                    })
                } else {
                    Ok(None)
                };
            }
        }
        Ok(Some(Self::take(&mut inner, n, pop)))
    }

    fn take(inner: &mut Inner, n: usize, pop: usize) -> Vec<u8> {
        let out: Vec<u8> = inner.data.iter().take(n).copied().collect();
        inner.data.drain(..pop);
        inner.record(RingEventKind::Read, n, pop);
        trace!("ring read {} pop {} (len {})", n, pop, inner.data.len());
        out
    }

    /// 当前缓冲的字节数
    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 关闭缓冲区并唤醒阻塞中的消费者（幂等）
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// 取出并清空诊断事件；未开启诊断时返回空
    pub fn drain_events(&self) -> Vec<RingEvent> {
        self.inner
            .lock()
            .events
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let ring = RingBuffer::new();
        ring.append(&[1, 2, 3]);
        ring.append(&[4, 5]);
        assert_eq!(ring.read(2, 2).unwrap(), vec![1, 2]);
        assert_eq!(ring.read(3, 3).unwrap(), vec![3, 4, 5]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_peek_then_partial_pop() {
        let ring = RingBuffer::new();
        ring.append(&[0xAA, 0x5A, 0xA5, 0x5A, 0xA5]);
        assert_eq!(ring.read(4, 1).unwrap(), vec![0xAA, 0x5A, 0xA5, 0x5A]);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.read(4, 3).unwrap(), vec![0x5A, 0xA5, 0x5A, 0xA5]);
        assert_eq!(ring.read(1, 1).unwrap(), vec![0xA5]);
    }

    #[test]
    fn test_pop_larger_than_read() {
        let ring = RingBuffer::new();
        ring.append(&[1, 2, 3, 4]);
        assert_eq!(ring.read(1, 3).unwrap(), vec![1]);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_read_blocks_until_appended() {
        let ring = Arc::new(RingBuffer::new());
        let consumer = {
            let ring = ring.clone();
            thread::spawn(move || ring.read(6, 6))
        };

        thread::sleep(Duration::from_millis(20));
        ring.append(&[1, 2, 3]);
        thread::sleep(Duration::from_millis(20));
        assert!(!consumer.is_finished());
        ring.append(&[4, 5, 6, 7]);

        assert_eq!(consumer.join().unwrap().unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_close_wakes_consumer() {
        let ring = Arc::new(RingBuffer::new());
        ring.append(&[1, 2]);
        let consumer = {
            let ring = ring.clone();
            thread::spawn(move || ring.read(10, 10))
        };
        thread::sleep(Duration::from_millis(20));
        ring.close();
        assert_eq!(
            consumer.join().unwrap(),
            Err(RingBufferError::Closed { available: 2 })
        );
    }

    #[test]
    fn test_closed_buffer_still_delivers_complete_reads() {
        let ring = RingBuffer::new();
        ring.append(&[1, 2, 3]);
        ring.close();
        ring.append(&[4]);
        assert_eq!(ring.read(2, 2).unwrap(), vec![1, 2]);
        assert!(ring.read(2, 2).is_err());
        assert!(ring.is_closed());
    }

    #[test]
    fn test_read_timeout() {
        let ring = RingBuffer::new();
        ring.append(&[9]);
        assert_eq!(
            ring.read_timeout(2, 2, Duration::from_millis(10)).unwrap(),
            None
        );
        assert_eq!(
            ring.read_timeout(1, 1, Duration::from_millis(10)).unwrap(),
            Some(vec![9])
        );
    }

    #[test]
    fn test_diagnostics_events() {
        let ring = RingBuffer::with_diagnostics(true);
        ring.append(&[1, 2, 3, 4]);
        ring.read(4, 3).unwrap();

        let events = ring.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, RingEventKind::Append);
        assert_eq!(events[0].requested, 4);
        assert_eq!(events[0].len_after, 4);
        assert_eq!(events[1].kind, RingEventKind::Read);
        assert_eq!(events[1].requested, 4);
        assert_eq!(events[1].popped, 3);
        assert_eq!(events[1].len_after, 1);
        assert!(ring.drain_events().is_empty());
    }

    #[test]
    fn test_diagnostics_disabled_by_default() {
        let ring = RingBuffer::new();
        ring.append(&[1]);
        assert!(ring.drain_events().is_empty());
    }
}
