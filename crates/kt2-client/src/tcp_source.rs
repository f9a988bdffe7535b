//! TCP 连接作为字节源
//!
//! 原始包模式下，服务端转发的字节流与串口字节流格式相同，
//! 客户端用同一条 RingBuffer + SyncFinder 流水线重新组帧。

use kt2_serial::{ByteSource, SerialError};
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;
use tracing::{debug, warn};

pub struct TcpByteSource {
    stream: TcpStream,
    peer: String,
}

impl TcpByteSource {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp".to_string());
        Self { stream, peer }
    }
}

impl ByteSource for TcpByteSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        match self.stream.read(buf) {
            Ok(0) => Err(SerialError::Disconnected),
            Ok(n) => Ok(n),
            Err(e) => match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                    Err(SerialError::Timeout)
                },
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                    Err(SerialError::Disconnected)
                },
                _ => Err(SerialError::Io(e)),
            },
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        // 零超时在 std 中是错误，最小取 1ms
        let timeout = timeout.max(Duration::from_millis(1));
        if let Err(e) = self.stream.set_read_timeout(Some(timeout)) {
            warn!("Failed to set read timeout on {}: {}", self.peer, e);
        }
    }

    /// 只关闭读方向，写方向留给命令通道
    fn close(&mut self) -> Result<(), SerialError> {
        match self.stream.shutdown(Shutdown::Read) {
            Ok(()) => {
                debug!("Closed read side of {}", self.peer);
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}
