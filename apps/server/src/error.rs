//! 服务端错误类型

use kt2_driver::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 监听套接字绑定失败（启动错误）
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 流水线输出通道断开（读硬件线程因致命错误退出）
    #[error("Sensor pipeline stopped")]
    PipelineStopped,

    #[error("Invalid configuration: {0}")]
    Config(String),
}
