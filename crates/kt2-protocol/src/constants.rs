//! 协议常量定义

/// 同步字（按大端读取的 32 位值）
pub const SYNC_MARKER: u32 = 0x5AA5_5AA5;

/// 同步字的字节序列（线上顺序）
pub const SYNC_BYTES: [u8; 4] = SYNC_MARKER.to_be_bytes();

/// 同步字长度
pub const SYNC_LEN: usize = 4;

/// 包头长度：sync(4) + row(1) + kind(1)
pub const HEADER_LEN: usize = SYNC_LEN + 2;

/// 每行采样点数
pub const SAMPLES_PER_ROW: usize = 320;

/// 每行采样数据的字节数（320 × i16）
pub const ROW_BYTES: usize = SAMPLES_PER_ROW * 2;

/// 完整数据包长度（646 字节）
pub const PACKET_LEN: usize = HEADER_LEN + ROW_BYTES;

/// 同步之后还需读取的字节数：row + kind + 采样数据
pub const PACKET_BODY_LEN: usize = PACKET_LEN - SYNC_LEN;

/// 窄视场模式的行数
pub const ROWS_NARROW: usize = 40;

/// 全视场模式的行数
pub const ROWS_FULL: usize = 80;

/// 默认行数
pub const DEFAULT_ROWS: usize = ROWS_FULL;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_layout() {
        assert_eq!(SYNC_BYTES, [0x5A, 0xA5, 0x5A, 0xA5]);
        assert_eq!(PACKET_LEN, 646);
        assert_eq!(PACKET_BODY_LEN, 642);
    }
}
