//! 原始包模式客户端

use crate::error::ClientError;
use crate::tcp_source::TcpByteSource;
use kt2_driver::{DriverConfig, Kt2, Kt2Builder, MetricsSnapshot};
use kt2_protocol::{Command, Frame};
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;
use tracing::debug;

/// 原始包模式客户端
///
/// 服务端转发的是串口上的 646 字节包；接收端复用驱动的读线程 + 流水线，
/// 只是字节源换成了 TCP 连接。
pub struct RawStreamClient {
    control: TcpStream,
    kt2: Kt2,
}

impl RawStreamClient {
    pub fn from_stream(stream: TcpStream, config: DriverConfig) -> Result<Self, ClientError> {
        stream.set_nodelay(true)?;
        let control = stream.try_clone()?;
        let kt2 = Kt2Builder::new()
            .read_timeout(Duration::from_millis(10))
            .config(config)
            .build_with_source(TcpByteSource::new(stream))?;
        Ok(Self { control, kt2 })
    }

    pub fn send_command(&mut self, command: Command) -> Result<(), ClientError> {
        self.control.write_all(&[command.as_byte()])?;
        debug!("Sent {:?}", command);
        Ok(())
    }

    pub fn go(&mut self) -> Result<(), ClientError> {
        self.send_command(Command::Go)
    }

    /// 等待下一帧
    pub fn next_frame(&self, timeout: Duration) -> Result<Frame, ClientError> {
        self.kt2.next_frame(timeout).map_err(|e| match e {
            kt2_driver::DriverError::Timeout => ClientError::Timeout,
            kt2_driver::DriverError::ChannelClosed => ClientError::Disconnected,
            other => ClientError::Driver(other),
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.kt2.metrics()
    }

    pub fn close(mut self) -> Result<(), ClientError> {
        self.send_command(Command::Close)?;
        self.kt2.shutdown()?;
        Ok(())
    }

    pub fn quit(mut self) -> Result<(), ClientError> {
        self.send_command(Command::Quit)?;
        self.kt2.shutdown()?;
        Ok(())
    }
}
