//! 驱动层错误类型定义

use kt2_protocol::ProtocolError;
use kt2_serial::SerialError;
use std::time::Duration;
use thiserror::Error;

/// 环形缓冲区错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    /// 缓冲区已关闭，剩余字节不足以满足本次读取
    #[error("Ring buffer closed ({available} bytes left)")]
    Closed { available: usize },
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口/字节源错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Ring buffer error: {0}")]
    RingBuffer(#[from] RingBufferError),

    /// 读硬件线程未在超时内发出就绪信号
    #[error("Reader thread not ready after {0:?}")]
    ReaderNotReady(Duration),

    /// 发布通道已关闭（流水线线程退出）
    #[error("Output channel closed")]
    ChannelClosed,

    #[error("Operation timeout")]
    Timeout,

    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 配置无效（行数、设备文件等）
    #[error("Invalid configuration: {0}")]
    Config(String),
}
