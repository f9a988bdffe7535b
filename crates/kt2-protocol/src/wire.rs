//! 服务端 → 客户端的帧序列化格式
//!
//! 全部小端：
//!
//! ```text
//! | magic "KT2F" (4) | frame_index u64 | rows u16 | cols u16 | rows*cols × i16 |
//! ```
//!
//! 头部自描述载荷长度，客户端可以在任意 TCP 分段边界上增量解码。

use crate::ProtocolError;
use crate::frame::Frame;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 帧头魔数
pub const FRAME_MAGIC: [u8; 4] = *b"KT2F";

/// 帧头长度
pub const FRAME_HEADER_LEN: usize = 16;

/// 单帧允许的最大采样数（防止损坏的头部导致巨量分配）
pub const MAX_FRAME_SAMPLES: usize = 1 << 20;

/// 编码一帧
pub fn encode_frame(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(frame));
    encode_frame_into(frame, &mut buf);
    buf.freeze()
}

pub fn encode_frame_into(frame: &Frame, buf: &mut BytesMut) {
    buf.reserve(encoded_len(frame));
    buf.put_slice(&FRAME_MAGIC);
    buf.put_u64_le(frame.index);
    buf.put_u16_le(frame.rows() as u16);
    buf.put_u16_le(frame.cols() as u16);
    for &sample in frame.data() {
        buf.put_i16_le(sample);
    }
}

/// 编码后的字节数
pub fn encoded_len(frame: &Frame) -> usize {
    FRAME_HEADER_LEN + frame.data().len() * 2
}

/// 增量帧解码器
///
/// # Example
///
/// ```
/// use kt2_protocol::{Frame, FrameDecoder, encode_frame};
///
/// let bytes = encode_frame(&Frame::with_dims(2, 3));
/// let mut decoder = FrameDecoder::new();
/// decoder.extend(&bytes[..10]);
/// assert!(decoder.decode_next().unwrap().is_none());
/// decoder.extend(&bytes[10..]);
/// assert_eq!(decoder.decode_next().unwrap().unwrap().rows(), 2);
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加从连接读到的字节
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// 尚未消费的字节数
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// 尝试解出下一帧
    ///
    /// 数据不足时返回 `Ok(None)`；头部非法时返回错误，此时流已不可恢复。
    pub fn decode_next(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let mut header = &self.buf[..FRAME_HEADER_LEN];
        let mut magic = [0u8; 4];
        header.copy_to_slice(&mut magic);
        if magic != FRAME_MAGIC {
            return Err(ProtocolError::InvalidMagic { found: magic });
        }
        let index = header.get_u64_le();
        let rows = header.get_u16_le();
        let cols = header.get_u16_le();

        let samples = rows as usize * cols as usize;
        if samples == 0 || samples > MAX_FRAME_SAMPLES {
            return Err(ProtocolError::InvalidDimensions { rows, cols });
        }

        let total = FRAME_HEADER_LEN + samples * 2;
        if self.buf.len() < total {
            return Ok(None);
        }

        let mut payload = self.buf.split_to(total);
        payload.advance(FRAME_HEADER_LEN);
        let mut data = Vec::with_capacity(samples);
        while payload.has_remaining() {
            data.push(payload.get_i16_le());
        }

        Ok(Frame::from_data(index, rows as usize, cols as usize, data))
    }
}
