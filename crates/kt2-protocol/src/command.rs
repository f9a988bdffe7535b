//! 客户端 → 服务端单字节命令

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 流控制命令（单个 ASCII 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Command {
    /// 开始/继续推流
    Go = b'G',
    /// 关闭当前连接，服务端继续监听
    Close = b'C',
    /// 关闭当前连接并停止服务端
    Quit = b'Q',
}

impl Command {
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        Self::try_from(byte).map_err(|_| ProtocolError::UnknownCommand { byte })
    }

    pub fn as_byte(self) -> u8 {
        self.into()
    }
}
