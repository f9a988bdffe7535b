//! 行数据包编解码
//!
//! 线上布局（646 字节）：
//!
//! ```text
//! | sync (4, BE) | row (1) | kind (1) | samples (320 × i16 LE) |
//! ```

use crate::ProtocolError;
use crate::constants::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 数据类型字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PacketKind {
    /// 距离，单位厘米
    DistanceCm = 0,
}

/// 一行测距数据
///
/// 只有长度为 646 且同步字正确的缓冲区才会解码出有效包，
/// 其余情况一律得到空包（`row = 0`、`kind = 0`、无采样），不会出现部分填充的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// 行号（0..ROWS）
    pub row: u8,
    /// 数据类型原始值
    pub kind: u8,
    /// 一行采样值（320 个，空包时为空）
    pub samples: Vec<i16>,
}

impl Packet {
    /// 构造距离数据包
    pub fn distance(row: u8, samples: Vec<i16>) -> Self {
        Self {
            row,
            kind: PacketKind::DistanceCm.into(),
            samples,
        }
    }

    /// 空包
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 解析数据类型
    pub fn packet_kind(&self) -> Option<PacketKind> {
        PacketKind::try_from(self.kind).ok()
    }

    /// 仅检查前 4 字节是否为同步字
    ///
    /// 可以在读取完整 646 字节之前调用。
    pub fn check_sync(buf: &[u8]) -> bool {
        buf.len() >= SYNC_LEN && buf[..SYNC_LEN] == SYNC_BYTES
    }

    /// 解码，失败时返回空包
    pub fn decode(buf: &[u8]) -> Self {
        Self::try_decode(buf).unwrap_or_default()
    }

    /// 解码，失败时返回具体原因
    pub fn try_decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != PACKET_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: PACKET_LEN,
                actual: buf.len(),
            });
        }

        let mut cursor = buf;
        let sync = cursor.get_u32();
        if sync != SYNC_MARKER {
            return Err(ProtocolError::InvalidSync { found: sync });
        }
        let row = cursor.get_u8();
        let kind = cursor.get_u8();

        let mut samples = Vec::with_capacity(SAMPLES_PER_ROW);
        while cursor.has_remaining() {
            samples.push(cursor.get_i16_le());
        }

        Ok(Self { row, kind, samples })
    }

    /// 编码为 646 字节
    ///
    /// 采样数必须恰好为 320。
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(PACKET_LEN);
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.samples.len() != SAMPLES_PER_ROW {
            return Err(ProtocolError::InvalidLength {
                expected: SAMPLES_PER_ROW,
                actual: self.samples.len(),
            });
        }

        buf.reserve(PACKET_LEN);
        buf.put_u32(SYNC_MARKER);
        buf.put_u8(self.row);
        buf.put_u8(self.kind);
        for &sample in &self.samples {
            buf.put_i16_le(sample);
        }
        Ok(())
    }
}
