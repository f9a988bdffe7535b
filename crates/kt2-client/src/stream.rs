//! 帧流客户端

use crate::error::ClientError;
use crate::raw::RawStreamClient;
use kt2_driver::DriverConfig;
use kt2_protocol::{Command, Frame, FrameDecoder};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 客户端连接参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// 单次连接超时
    pub connect_timeout: Duration,
    /// 连接失败后的重试间隔
    pub retry_interval: Duration,
    /// 最大连接次数，`None` 表示一直重试
    pub max_attempts: Option<usize>,
    /// 读超时
    pub read_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            retry_interval: Duration::from_secs(2),
            max_attempts: None,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// 帧流客户端
///
/// ```no_run
/// use kt2_client::StreamClient;
///
/// let mut client = StreamClient::connect("127.0.0.1:65432").unwrap();
/// client.go().unwrap();
/// let frame = client.next_frame().unwrap();
/// println!("frame {} ({}x{})", frame.index, frame.rows(), frame.cols());
/// client.close().unwrap();
/// ```
pub struct StreamClient {
    stream: TcpStream,
    peer: SocketAddr,
    decoder: FrameDecoder,
    buf: Vec<u8>,
}

impl StreamClient {
    /// 使用默认参数连接（失败时一直重试）
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with(addr, &ClientConfig::default())
    }

    pub fn connect_with(
        addr: impl ToSocketAddrs,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        let label = addrs
            .first()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<none>".to_string());

        let mut attempts = 0usize;
        loop {
            attempts += 1;
            for candidate in &addrs {
                match TcpStream::connect_timeout(candidate, config.connect_timeout) {
                    Ok(stream) => {
                        info!("Connected to {} (attempt {})", candidate, attempts);
                        return Self::from_stream(stream, config.read_timeout);
                    },
                    Err(e) => debug!("Connect to {} failed: {}", candidate, e),
                }
            }

            if config.max_attempts.is_some_and(|max| attempts >= max) || addrs.is_empty() {
                return Err(ClientError::ConnectFailed {
                    addr: label,
                    attempts,
                });
            }
            warn!(
                "Cannot reach {}, trying again in {:?}",
                label, config.retry_interval
            );
            std::thread::sleep(config.retry_interval);
        }
    }

    /// 包装一个已建立的连接
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Result<Self, ClientError> {
        stream.set_read_timeout(Some(read_timeout.max(Duration::from_millis(1))))?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            decoder: FrameDecoder::new(),
            buf: vec![0u8; 64 * 1024],
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), ClientError> {
        self.stream
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        Ok(())
    }

    pub fn send_command(&mut self, command: Command) -> Result<(), ClientError> {
        self.stream.write_all(&[command.as_byte()])?;
        debug!("Sent {:?} to {}", command, self.peer);
        Ok(())
    }

    /// 请求开始推流
    pub fn go(&mut self) -> Result<(), ClientError> {
        self.send_command(Command::Go)
    }

    /// 关闭本连接，服务端继续监听
    pub fn close(mut self) -> Result<(), ClientError> {
        self.send_command(Command::Close)
    }

    /// 关闭本连接并让服务端退出
    pub fn quit(mut self) -> Result<(), ClientError> {
        self.send_command(Command::Quit)
    }

    /// 读取下一帧
    ///
    /// 读超时内没有凑齐一帧返回 [`ClientError::Timeout`]，已收到的字节保留。
    pub fn next_frame(&mut self) -> Result<Frame, ClientError> {
        loop {
            if let Some(frame) = self.decoder.decode_next()? {
                return Ok(frame);
            }
            match self.stream.read(&mut self.buf) {
                Ok(0) => return Err(ClientError::Disconnected),
                Ok(n) => self.decoder.extend(&self.buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(ClientError::Timeout);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    return Err(ClientError::Disconnected);
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 读取下一帧，超时以 `None` 返回
    pub fn try_next_frame(&mut self) -> Result<Option<Frame>, ClientError> {
        match self.next_frame() {
            Ok(frame) => Ok(Some(frame)),
            Err(ClientError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 切换到原始包模式：本地 RingBuffer + SyncFinder 流水线重新组帧
    pub fn into_raw(self, config: DriverConfig) -> Result<RawStreamClient, ClientError> {
        if self.decoder.buffered() > 0 {
            warn!(
                "Dropping {} buffered frame bytes when switching to raw mode",
                self.decoder.buffered()
            );
        }
        RawStreamClient::from_stream(self.stream, config)
    }
}
