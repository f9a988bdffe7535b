//! 同步字匹配器
//!
//! 串口链路没有任何帧边界，只能在字节流中逐字节寻找 `5A A5 5A A5`。
//! 每个包只提供一次同步机会：读完一个包体之后必须重新搜索下一个同步字。

use crate::constants::{SYNC_BYTES, SYNC_LEN};

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// 正在搜索，`progress` 为已连续匹配的字节数（0-3）
    Searching { progress: u8 },
    /// 刚匹配到完整同步字，等待读取包体
    Synched,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Searching { progress: 0 }
    }
}

/// 逐字节同步字匹配器（4 状态自动机）
///
/// 失配时进度归零，但**不会**在同一次调用中用失配字节重新比较 `pattern[0]`。
/// 因此紧跟在假起始之后的同步字可能被漏掉，例如 `5A 5A A5 5A A5` 不会命中。
/// 漏掉的包会在下一个同步字处恢复。
///
/// # Example
///
/// ```
/// use kt2_protocol::{SyncFinder, SyncState};
///
/// let mut finder = SyncFinder::new();
/// let hits: Vec<bool> = [0x00, 0x5A, 0xA5, 0x5A, 0xA5].iter().map(|&b| finder.feed(b)).collect();
/// assert_eq!(hits, [false, false, false, false, true]);
/// assert_eq!(finder.state(), SyncState::Synched);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncFinder {
    state: SyncState,
}

impl SyncFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一个字节
    ///
    /// 仅当该字节补全了同步字时返回 `true`。处于 `Synched` 状态时喂入字节
    /// 视为一次新的搜索。
    pub fn feed(&mut self, byte: u8) -> bool {
        let progress = match self.state {
            SyncState::Synched => 0,
            SyncState::Searching { progress } => progress,
        };

        if byte == SYNC_BYTES[progress as usize] {
            let next = progress + 1;
            if next as usize == SYNC_LEN {
                self.state = SyncState::Synched;
                return true;
            }
            self.state = SyncState::Searching { progress: next };
        } else {
            self.state = SyncState::Searching { progress: 0 };
        }
        false
    }

    /// 在切片中搜索同步字
    ///
    /// 返回同步字最后一个字节之后的偏移量（即包体起始位置）。
    /// 未命中时返回 `None`，匹配进度保留到下一次调用。
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Option<usize> {
        bytes
            .iter()
            .position(|&b| self.feed(b))
            .map(|index| index + 1)
    }

    /// 读完包体后消费同步状态，回到搜索
    pub fn consume(&mut self) {
        self.state = SyncState::Searching { progress: 0 };
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_synched(&self) -> bool {
        self.state == SyncState::Synched
    }
}
