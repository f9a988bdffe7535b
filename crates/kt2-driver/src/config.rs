//! 驱动配置

use crate::error::DriverError;
use kt2_protocol::{DEFAULT_ROWS, ROWS_FULL, ROWS_NARROW};
use std::time::Duration;

/// 流水线发布内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// 发布组好的完整帧
    #[default]
    Frames,
    /// 逐包发布通过同步校验的 646 字节原始包
    RawPackets,
}

/// 驱动配置
///
/// # Example
///
/// ```
/// use kt2_driver::{DriverConfig, PublishMode};
///
/// let config = DriverConfig {
///     rows: 40,
///     publish_mode: PublishMode::RawPackets,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// 每帧行数（40 或 80，取决于传感器模式）
    pub rows: usize,
    /// 每次硬件读取的最大字节数
    pub read_chunk: usize,
    /// 硬件读取返回不足一块或超时后的休眠时间
    pub idle_sleep: Duration,
    /// 等待读线程就绪的超时
    pub ready_timeout: Duration,
    /// 发布通道容量
    pub publish_capacity: usize,
    pub publish_mode: PublishMode,
    /// 记录环形缓冲区的 append/read 诊断事件（需定期 [`crate::Kt2::drain_ring_events`]）
    pub record_diagnostics: bool,
    /// 每次从行 0 开始时清零帧缓冲区
    pub zero_fill_on_restart: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            read_chunk: 1000,
            idle_sleep: Duration::from_millis(1),
            ready_timeout: Duration::from_secs(2),
            publish_capacity: 8,
            publish_mode: PublishMode::Frames,
            record_diagnostics: false,
            zero_fill_on_restart: false,
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.rows != ROWS_NARROW && self.rows != ROWS_FULL {
            return Err(DriverError::Config(format!(
                "rows must be {} or {}, got {}",
                ROWS_NARROW, ROWS_FULL, self.rows
            )));
        }
        if self.read_chunk == 0 {
            return Err(DriverError::Config("read_chunk must be > 0".to_string()));
        }
        if self.publish_capacity == 0 {
            return Err(DriverError::Config(
                "publish_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
