//! 客户端错误类型

use kt2_driver::DriverError;
use kt2_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 帧流解码失败，连接不可恢复
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 原始包模式下的本地流水线错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Failed to connect to {addr} after {attempts} attempt(s)")]
    ConnectFailed { addr: String, attempts: usize },

    /// 服务端关闭了连接
    #[error("Server closed the connection")]
    Disconnected,

    #[error("Read timeout")]
    Timeout,
}

impl ClientError {
    /// 超时之外的错误都意味着连接已经不可用
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout)
    }
}
