//! # KT2 Stream Server
//!
//! 单客户端 TCP 流服务：
//!
//! ```text
//! LISTENING ──accept──▶ SESSION_ACTIVE ──C / 断开 / 发送失败──▶ LISTENING
//!                              │
//!                              └──Q──▶ SHUTDOWN（停止读线程，关闭硬件）
//! ```
//!
//! 无论是否有客户端，传感器流水线都持续运行；没有客户端（或未收到 `G`）时
//! 完成的帧直接丢弃，不排队。

pub mod config;
mod error;
pub mod server;
pub mod session;
pub mod stats;

pub use config::{DEFAULT_BIND, FileConfig, ServerConfig, StreamMode};
pub use error::ServerError;
pub use server::{RingSummary, ServerState, StreamServer};
pub use session::Session;
pub use stats::{ServerStats, ServerStatsSnapshot};
