//! 服务端统计

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServerStats {
    pub sessions_accepted: AtomicU64,
    /// 发给客户端的条目数（帧或原始包）
    pub frames_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    /// 无客户端或未收到 `G` 时丢弃的条目数
    pub frames_discarded: AtomicU64,
    pub commands_ignored: AtomicU64,
    /// 因发送失败而结束的会话数
    pub session_faults: AtomicU64,
    /// 已输出的环形缓冲区诊断汇总次数
    pub diagnostics_reports: AtomicU64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            sessions_accepted: self.sessions_accepted.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            commands_ignored: self.commands_ignored.load(Ordering::Relaxed),
            session_faults: self.session_faults.load(Ordering::Relaxed),
            diagnostics_reports: self.diagnostics_reports.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub sessions_accepted: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_discarded: u64,
    pub commands_ignored: u64,
    pub session_faults: u64,
    pub diagnostics_reports: u64,
}
