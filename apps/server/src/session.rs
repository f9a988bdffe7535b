//! 单个客户端会话

use crate::stats::ServerStats;
use kt2_protocol::Command;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 一个已连接客户端的状态
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    /// 收到 `G` 之前为 false
    pub streaming: bool,
    pub should_close: bool,
    pub should_shutdown_server: bool,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        command_poll: Duration,
        write_timeout: Duration,
    ) -> std::io::Result<Self> {
        // 监听套接字是非阻塞的，accept 出来的连接需要改回阻塞 + 超时
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(command_poll.max(Duration::from_millis(1))))?;
        stream.set_write_timeout(Some(write_timeout))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            streaming: false,
            should_close: false,
            should_shutdown_server: false,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// 读取并处理已到达的命令字节
    ///
    /// 超时内没有数据不是错误。对端关闭（读到 0 字节）或连接故障会设置
    /// `should_close`，但不会设置 `should_shutdown_server`。
    pub fn poll_commands(&mut self, stats: &ServerStats) {
        let mut buf = [0u8; 64];
        match self.stream.read(&mut buf) {
            Ok(0) => {
                info!("Client {} disconnected", self.peer);
                self.should_close = true;
            },
            Ok(n) => self.handle_bytes(&buf[..n], stats),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {},
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) => {
                warn!("Connection fault from {}: {}", self.peer, e);
                self.should_close = true;
            },
        }
    }

    /// 按顺序处理命令字节，遇到 `C`/`Q` 后停止
    pub fn handle_bytes(&mut self, bytes: &[u8], stats: &ServerStats) {
        for &byte in bytes {
            match Command::from_byte(byte) {
                Ok(Command::Go) => {
                    if !self.streaming {
                        info!("Client {} started streaming", self.peer);
                    }
                    self.streaming = true;
                },
                Ok(Command::Close) => {
                    info!("Client {} requested close", self.peer);
                    self.should_close = true;
                },
                Ok(Command::Quit) => {
                    info!("Client {} requested server shutdown", self.peer);
                    self.should_close = true;
                    self.should_shutdown_server = true;
                },
                Err(e) => {
                    stats.commands_ignored.fetch_add(1, Ordering::Relaxed);
                    debug!("Ignoring byte from {}: {}", self.peer, e);
                },
            }
            if self.should_close {
                break;
            }
        }
    }

    /// 发送一个输出条目；失败时标记会话关闭并返回错误
    pub fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if let Err(e) = self.stream.write_all(bytes) {
            self.should_close = true;
            return Err(e);
        }
        Ok(())
    }
}
