//! # KT2 Protocol
//!
//! KT2 飞行时间（ToF）测距传感器的串口包格式与网络帧格式定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（同步字、包长、每行采样数）
//! - `sync`: 同步字逐字节匹配器
//! - `packet`: 646 字节行数据包编解码
//! - `frame`: 二维深度帧
//! - `assembler`: 行包 → 完整帧的状态机
//! - `command`: 客户端单字节命令
//! - `wire`: 服务端 → 客户端的帧序列化格式
//!
//! ## 字节序
//!
//! 同步字按大端读取（`5A A5 5A A5`），采样值为小端有符号 16 位整数。
//! 网络帧格式统一使用小端。

pub mod assembler;
pub mod command;
pub mod constants;
pub mod frame;
pub mod packet;
pub mod sync;
pub mod wire;

// 重新导出常用类型
pub use assembler::{FrameAssembler, PushOutcome, RowOutcome};
pub use command::Command;
pub use constants::*;
pub use frame::Frame;
pub use packet::{Packet, PacketKind};
pub use sync::{SyncFinder, SyncState};
pub use wire::{FrameDecoder, encode_frame};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid sync marker: 0x{found:08X}")]
    InvalidSync { found: u32 },

    #[error("Invalid frame header magic: {found:02X?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("Invalid frame dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: u16, cols: u16 },

    #[error("Unknown command byte: 0x{byte:02X}")]
    UnknownCommand { byte: u8 },
}
