//! 流服务主循环
//!
//! 控制线程上交替执行：短超时的 accept / 命令读取，和流水线输出的转发或丢弃。
//! 帧按完成顺序发送，流水线只发布完整帧。

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::session::Session;
use crate::stats::{ServerStats, ServerStatsSnapshot};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use kt2_driver::{Kt2, Published, RingEvent, RingEventKind};
use kt2_protocol::encode_frame;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 服务端状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    SessionActive,
    /// 终态：停止读线程、关闭硬件后退出
    Shutdown,
}

/// 单客户端流服务
pub struct StreamServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    kt2: Kt2,
    stats: Arc<ServerStats>,
    shutdown: Arc<AtomicBool>,
}

impl StreamServer {
    /// 绑定监听地址；驱动已经在运行
    pub fn bind(config: ServerConfig, kt2: Kt2) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind).map_err(|source| ServerError::Bind {
            addr: config.bind.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            config,
            kt2,
            stats: Arc::new(ServerStats::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 置位后服务在下一次轮询时进入 `Shutdown`（用于 Ctrl+C）
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn stats_handle(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    /// 运行直到收到 `Q`、外部请求退出或监听套接字故障
    ///
    /// 返回前总是有序关闭驱动。
    pub fn run(mut self) -> Result<ServerStatsSnapshot, ServerError> {
        let result = self.serve();
        if let Err(e) = &result {
            error!("Server stopped: {}", e);
        }

        info!("Stopping sensor driver");
        let driver_result = self.kt2.shutdown();
        if self.kt2.config().record_diagnostics {
            self.log_ring_diagnostics();
        }
        result?;
        driver_result?;

        let stats = self.stats.snapshot();
        info!(
            "Server shut down: {} session(s), {} frame(s) sent, {} discarded",
            stats.sessions_accepted, stats.frames_sent, stats.frames_discarded
        );
        Ok(stats)
    }

    /// 汇总并清空环形缓冲区事件日志
    fn log_ring_diagnostics(&self) {
        let summary = RingSummary::from_events(&self.kt2.drain_ring_events());
        info!(
            "Ring buffer: {} append(s) totalling {} bytes, {} read(s), peak backlog {} bytes, current backlog {} bytes",
            summary.appends,
            summary.appended_bytes,
            summary.reads,
            summary.peak_backlog,
            self.kt2.backlog()
        );
        info!("Driver metrics: {:?}", self.kt2.metrics());
        self.stats.diagnostics_reports.fetch_add(1, Ordering::Relaxed);
    }

    fn serve(&mut self) -> Result<(), ServerError> {
        let mut session: Option<Session> = None;
        let diagnostics = self.kt2.config().record_diagnostics;
        let mut last_report = Instant::now();
        loop {
            // Acquire: 与信号处理线程的 Release 配对
            if self.shutdown.load(Ordering::Acquire) {
                info!("Shutdown requested");
                return Ok(());
            }

            // 定期汇总并清空诊断事件
            if diagnostics && last_report.elapsed() >= self.config.diagnostics_interval {
                self.log_ring_diagnostics();
                last_report = Instant::now();
            }

            let state = match session.as_mut() {
                None => {
                    session = self.accept_step()?;
                    if session.is_some() {
                        ServerState::SessionActive
                    } else {
                        ServerState::Listening
                    }
                },
                Some(active) => self.session_step(active)?,
            };

            match state {
                ServerState::SessionActive => {},
                ServerState::Listening => {
                    if let Some(closed) = session.take() {
                        info!("Session with {} ended, listening", closed.peer());
                    }
                },
                ServerState::Shutdown => return Ok(()),
            }
        }
    }

    fn accept_step(&mut self) -> Result<Option<Session>, ServerError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                self.stats.sessions_accepted.fetch_add(1, Ordering::Relaxed);
                info!("Accepted client {}", peer);

                // 连接之前完成的帧不发给新客户端
                let stale = self.kt2.discard_pending();
                self.stats
                    .frames_discarded
                    .fetch_add(stale as u64, Ordering::Relaxed);

                match Session::new(
                    stream,
                    peer,
                    self.config.command_poll,
                    self.config.write_timeout,
                ) {
                    Ok(session) => Ok(Some(session)),
                    Err(e) => {
                        warn!("Failed to configure connection from {}: {}", peer, e);
                        Ok(None)
                    },
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                self.discard_for(self.config.accept_poll)?;
                Ok(None)
            },
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::Interrupted
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::ConnectionReset
                ) =>
            {
                debug!("Transient accept error: {}", e);
                Ok(None)
            },
            Err(e) => Err(ServerError::Io(e)),
        }
    }

    /// 无客户端时等待最多 `timeout`，期间完成的帧直接丢弃
    fn discard_for(&self, timeout: Duration) -> Result<(), ServerError> {
        match self.kt2.output().recv_timeout(timeout) {
            Ok(_) => {
                let count = 1 + self.kt2.discard_pending();
                self.stats
                    .frames_discarded
                    .fetch_add(count as u64, Ordering::Relaxed);
                Ok(())
            },
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(ServerError::PipelineStopped),
        }
    }

    fn session_step(&mut self, session: &mut Session) -> Result<ServerState, ServerError> {
        session.poll_commands(&self.stats);
        if !session.should_close {
            self.forward(session)?;
        }

        Ok(if !session.should_close {
            ServerState::SessionActive
        } else if session.should_shutdown_server {
            ServerState::Shutdown
        } else {
            ServerState::Listening
        })
    }

    /// 转发（或在未收到 `G` 时丢弃）所有已完成的输出
    fn forward(&mut self, session: &mut Session) -> Result<(), ServerError> {
        loop {
            let item = match self.kt2.output().try_recv() {
                Ok(item) => item,
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(ServerError::PipelineStopped),
            };

            if !session.streaming {
                self.stats.frames_discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let bytes = match item {
                Published::Frame(frame) => encode_frame(&frame),
                Published::Packet(raw) => raw,
            };

            if let Err(e) = session.send(&bytes) {
                warn!("Send to {} failed: {}", session.peer(), e);
                self.stats.session_faults.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
            self.stats
                .bytes_sent
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        }
    }
}

/// 一批环形缓冲区事件的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingSummary {
    pub appends: usize,
    pub appended_bytes: usize,
    pub reads: usize,
    pub peak_backlog: usize,
}

impl RingSummary {
    pub fn from_events(events: &[RingEvent]) -> Self {
        events.iter().fold(Self::default(), |mut summary, event| {
            match event.kind {
                RingEventKind::Append => {
                    summary.appends += 1;
                    summary.appended_bytes += event.requested;
                },
                RingEventKind::Read => summary.reads += 1,
            }
            summary.peak_backlog = summary.peak_backlog.max(event.len_after);
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: RingEventKind, requested: usize, popped: usize, len_after: usize) -> RingEvent {
        RingEvent {
            kind,
            requested,
            popped,
            len_after,
            at: Instant::now(),
        }
    }

    #[test]
    fn test_ring_summary() {
        let events = [
            event(RingEventKind::Append, 1000, 0, 1000),
            event(RingEventKind::Read, 4, 1, 999),
            event(RingEventKind::Append, 300, 0, 1299),
            event(RingEventKind::Read, 646, 646, 653),
        ];
        assert_eq!(
            RingSummary::from_events(&events),
            RingSummary {
                appends: 2,
                appended_bytes: 1300,
                reads: 2,
                peak_backlog: 1299,
            }
        );
    }

    #[test]
    fn test_ring_summary_empty() {
        assert_eq!(RingSummary::from_events(&[]), RingSummary::default());
    }
}
