//! # KT2 Client
//!
//! 连接 `kt2_server`，发送单字节命令（`G`/`C`/`Q`），接收帧。
//!
//! - 帧模式：服务端发送自描述的 `KT2F` 帧，[`StreamClient`] 增量解码
//! - 原始包模式：服务端转发 646 字节包，[`RawStreamClient`] 在本地重新同步、组帧

mod error;
mod raw;
mod stream;
mod tcp_source;

pub use error::ClientError;
pub use raw::RawStreamClient;
pub use stream::{ClientConfig, StreamClient};
pub use tcp_source::TcpByteSource;
