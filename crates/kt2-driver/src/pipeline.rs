//! 解析流水线
//!
//! 从环形缓冲区消费字节：SyncFinder 逐字节找同步字 → 读 642 字节包体 →
//! 解码 → FrameAssembler → 发布。

use crate::config::{DriverConfig, PublishMode};
use crate::error::RingBufferError;
use crate::metrics::DriverMetrics;
use crate::ring_buffer::RingBuffer;
use arc_swap::ArcSwapOption;
use bytes::{BufMut, Bytes, BytesMut};
use crossbeam_channel::{Sender, TrySendError};
use kt2_protocol::{
    Frame, FrameAssembler, PACKET_BODY_LEN, PACKET_LEN, Packet, RowOutcome, SYNC_BYTES, SYNC_LEN,
    SyncFinder,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// 流水线输出
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    /// 完整帧（副本，组帧器缓冲区继续复用）
    Frame(Frame),
    /// 通过同步校验的原始 646 字节包
    Packet(Bytes),
}

/// 一个同步后读出的包
#[derive(Debug, Clone)]
pub struct SyncedPacket {
    pub packet: Packet,
    /// 同步字 + 包体，共 646 字节
    pub raw: Bytes,
    /// 找到同步字之前丢弃的字节数
    pub skipped: usize,
}

/// 环形缓冲区上的同步 + 取包
pub struct PacketReader {
    ring: Arc<RingBuffer>,
    finder: SyncFinder,
}

impl PacketReader {
    pub fn new(ring: Arc<RingBuffer>) -> Self {
        Self {
            ring,
            finder: SyncFinder::new(),
        }
    }

    /// 阻塞直到读出下一个包
    ///
    /// 缓冲区关闭且剩余数据不足一个包时返回错误。
    pub fn next_packet(&mut self) -> Result<SyncedPacket, RingBufferError> {
        let mut fed = 0usize;
        loop {
            let byte = self.ring.read(1, 1)?;
            fed += 1;
            if self.finder.feed(byte[0]) {
                break;
            }
        }

        let body = self.ring.read(PACKET_BODY_LEN, PACKET_BODY_LEN)?;
        self.finder.consume();

        let mut raw = BytesMut::with_capacity(PACKET_LEN);
        raw.put_slice(&SYNC_BYTES);
        raw.put_slice(&body);
        let raw = raw.freeze();

        Ok(SyncedPacket {
            packet: Packet::decode(&raw),
            raw,
            skipped: fed.saturating_sub(SYNC_LEN),
        })
    }
}

/// 流水线循环
///
/// 一直运行到环形缓冲区关闭且剩余数据不足一个包。无论有没有消费者，
/// 组帧都会继续；发布通道满或断开时丢弃并计数，不阻塞。
pub fn pipeline_loop(
    ring: Arc<RingBuffer>,
    config: DriverConfig,
    output_tx: Sender<Published>,
    latest: Arc<ArcSwapOption<Frame>>,
    metrics: Arc<DriverMetrics>,
) {
    let mut reader = PacketReader::new(ring);
    let mut assembler =
        FrameAssembler::new(config.rows).with_zero_fill(config.zero_fill_on_restart);

    loop {
        let synced = match reader.next_packet() {
            Ok(synced) => synced,
            Err(RingBufferError::Closed { available }) => {
                debug!("Pipeline: ring buffer closed, {} bytes discarded", available);
                break;
            },
        };

        metrics.packets_decoded.fetch_add(1, Ordering::Relaxed);
        if synced.skipped > 0 {
            metrics.resync_events.fetch_add(1, Ordering::Relaxed);
            metrics
                .bytes_skipped
                .fetch_add(synced.skipped as u64, Ordering::Relaxed);
            debug!(
                "Resynchronized after skipping {} bytes (row {})",
                synced.skipped, synced.packet.row
            );
        }

        let outcome = assembler.push(&synced.packet);
        match outcome.row {
            RowOutcome::OutOfRange { row } => {
                metrics.row_range_violations.fetch_add(1, Ordering::Relaxed);
                trace!("Row {} outside configured {} rows", row, config.rows);
            },
            RowOutcome::Rejected { row } => trace!("Row {} rejected", row),
            RowOutcome::Ignored | RowOutcome::Written { .. } => {},
        }

        if config.publish_mode == PublishMode::RawPackets {
            publish(&output_tx, Published::Packet(synced.raw), &metrics);
        }

        if let Some(frame) = outcome.completed {
            metrics.frames_completed.fetch_add(1, Ordering::Relaxed);
            trace!("Frame {} completed", frame.index);
            if config.publish_mode == PublishMode::Frames {
                latest.store(Some(Arc::new(frame.clone())));
                publish(&output_tx, Published::Frame(frame), &metrics);
            } else {
                latest.store(Some(Arc::new(frame)));
            }
        }
    }

    trace!("Pipeline thread: loop exited");
}

fn publish(tx: &Sender<Published>, item: Published, metrics: &DriverMetrics) {
    match tx.try_send(item) {
        Ok(()) => {
            metrics.frames_published.fetch_add(1, Ordering::Relaxed);
        },
        Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
            metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
        },
    }
}
