//! 内存字节源
//!
//! 按脚本回放字节块，无硬件依赖。用于测试和 `--mock-frames` 运行模式。

use crate::{ByteSource, SerialError};
use kt2_protocol::{Packet, SAMPLES_PER_ROW};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 脚本化字节源
///
/// 每次 `read` 返回下一个块（缓冲区不够大时拆分），块耗尽后返回超时，
/// 或在 `disconnect_when_drained` 时返回 [`SerialError::Disconnected`]。
/// 开启 `repeat` 时块耗尽后从头回放。
pub struct MockByteSource {
    chunks: VecDeque<Vec<u8>>,
    script: Option<Vec<Vec<u8>>>,
    read_delay: Duration,
    disconnect_when_drained: bool,
    closed: Arc<AtomicBool>,
}

impl MockByteSource {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            script: None,
            read_delay: Duration::ZERO,
            disconnect_when_drained: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 把一段连续字节按固定大小切块
    pub fn chunked(bytes: &[u8], chunk_size: usize) -> Self {
        Self::new(bytes.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect())
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// 块耗尽后从头回放（空脚本不回放）
    pub fn repeat(mut self, enabled: bool) -> Self {
        self.script = if enabled && !self.chunks.is_empty() {
            Some(self.chunks.iter().cloned().collect())
        } else {
            None
        };
        self
    }

    pub fn disconnect_when_drained(mut self, enabled: bool) -> Self {
        self.disconnect_when_drained = enabled;
        self
    }

    /// `close()` 被调用后置位的标志
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

impl ByteSource for MockByteSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SerialError::Disconnected);
        }
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }

        if self.chunks.is_empty() {
            if let Some(script) = &self.script {
                self.chunks.extend(script.iter().cloned());
            }
        }

        let Some(mut chunk) = self.chunks.pop_front() else {
            return if self.disconnect_when_drained {
                Err(SerialError::Disconnected)
            } else {
                Err(SerialError::Timeout)
            };
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mock ({} bytes queued)", self.remaining())
    }
}

/// 生成一个合成行包：距离值随行号和帧号缓慢变化
pub fn synthetic_packet(row: u8, frame: u64) -> Packet {
    let samples = (0..SAMPLES_PER_ROW)
        .map(|col| 500 + (row as i16) * 10 + (col as i16) + (frame % 100) as i16)
        .collect();
    Packet::distance(row, samples)
}

/// 生成 `frames` 帧、每帧 `rows` 行的连续字节流
pub fn synthetic_stream(rows: usize, frames: u64) -> Vec<u8> {
    let mut stream = Vec::with_capacity(rows * frames as usize * kt2_protocol::PACKET_LEN);
    for frame in 0..frames {
        for row in 0..rows {
            let packet = synthetic_packet(row as u8, frame);
            if let Ok(bytes) = packet.encode() {
                stream.extend_from_slice(&bytes);
            }
        }
    }
    stream
}

/// 生成不含同步字首字节（0x5A）的随机噪声
pub fn random_garbage(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| loop {
            let b: u8 = rng.r#gen();
            if b != kt2_protocol::SYNC_BYTES[0] {
                break b;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt2_protocol::PACKET_LEN;

    #[test]
    fn test_chunk_split_on_small_buffer() {
        let mut source = MockByteSource::new(vec![vec![1, 2, 3, 4, 5]]);
        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert!(matches!(source.read(&mut buf), Err(SerialError::Timeout)));
    }

    #[test]
    fn test_disconnect_when_drained() {
        let mut source = MockByteSource::new(vec![]).disconnect_when_drained(true);
        let mut buf = [0u8; 4];
        assert!(matches!(
            source.read(&mut buf),
            Err(SerialError::Disconnected)
        ));
    }

    #[test]
    fn test_repeat_replays_script() {
        let mut source = MockByteSource::new(vec![vec![1, 2], vec![3]]).repeat(true);
        let mut buf = [0u8; 8];
        let mut seen = Vec::new();
        for _ in 0..6 {
            let n = source.read(&mut buf).unwrap();
            seen.extend_from_slice(&buf[..n]);
        }
        assert_eq!(seen, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_close_sets_flag() {
        let mut source = MockByteSource::new(vec![vec![1]]);
        let flag = source.closed_flag();
        source.close().unwrap();
        assert!(flag.load(Ordering::Acquire));
        let mut buf = [0u8; 1];
        assert!(source.read(&mut buf).is_err());
    }

    #[test]
    fn test_synthetic_stream_layout() {
        let stream = synthetic_stream(40, 2);
        assert_eq!(stream.len(), 80 * PACKET_LEN);
        let packet = Packet::decode(&stream[PACKET_LEN..2 * PACKET_LEN]);
        assert_eq!(packet.row, 1);
        assert_eq!(packet, synthetic_packet(1, 0));
        let packet = Packet::decode(&stream[40 * PACKET_LEN..41 * PACKET_LEN]);
        assert_eq!(packet.row, 0);
    }

    #[test]
    fn test_random_garbage_has_no_marker_start() {
        let garbage = random_garbage(4096);
        assert_eq!(garbage.len(), 4096);
        assert!(!garbage.contains(&0x5A));
    }
}
