//! # KT2 Serial Layer
//!
//! 字节源抽象层：传感器通过 12 Mbaud FTDI 串口输出无边界的字节流，
//! 上层只依赖 [`ByteSource`] 的"读最多 N 字节、短超时"语义。

use std::time::Duration;
use thiserror::Error;

pub mod device_file;
#[cfg(feature = "ftdi")]
pub mod ftdi;
pub mod mock;

pub use device_file::{DeviceEntry, default_device_file, read_device_file};
#[cfg(feature = "ftdi")]
pub use ftdi::{FTDI_VID, FtdiSerialAdapter, resolve_ftdi_url};
pub use mock::{MockByteSource, random_garbage, synthetic_packet, synthetic_stream};

/// 串口默认波特率
pub const DEFAULT_BAUD: u32 = 12_000_000;

/// 默认读超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// 串口参数（固定 8N1、无流控）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: DEFAULT_BAUD,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// 字节源统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    /// 轮询窗口内没有数据（正常情况）
    #[error("Read timeout")]
    Timeout,
    /// 对端关闭（网络字节源）或设备已关闭
    #[error("Source disconnected")]
    Disconnected,
}

impl SerialError {
    /// 读循环遇到此错误时应当退出
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::Device(e) => e.is_fatal(),
            SerialError::Disconnected => true,
            SerialError::Io(_) | SerialError::Timeout => false,
        }
    }
}

/// 设备错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
                | SerialDeviceErrorKind::Busy
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

/// 半双工字节通道（读端）
///
/// `read` 在超时窗口内没有数据时返回 [`SerialError::Timeout`]，
/// 不会返回 `Ok(0)`。
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    fn set_read_timeout(&mut self, _timeout: Duration) {}

    /// 关闭底层句柄
    fn close(&mut self) -> Result<(), SerialError> {
        Ok(())
    }

    /// 用于日志的描述（端口名等）
    fn describe(&self) -> String {
        "byte source".to_string()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        (**self).read(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        (**self).set_read_timeout(timeout)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!SerialError::Timeout.is_fatal());
        assert!(SerialError::Disconnected.is_fatal());
        assert!(!SerialError::Io(std::io::Error::other("glitch")).is_fatal());
        assert!(
            SerialError::Device(SerialDeviceError::new(
                SerialDeviceErrorKind::NoDevice,
                "unplugged"
            ))
            .is_fatal()
        );
        assert!(
            !SerialError::Device(SerialDeviceError::new(
                SerialDeviceErrorKind::Backend,
                "transient"
            ))
            .is_fatal()
        );
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0").baud(3_000_000);
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud, 3_000_000);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SerialError::Timeout.to_string(), "Read timeout");
        let err = SerialError::Device(SerialDeviceError::new(
            SerialDeviceErrorKind::Busy,
            "/dev/ttyUSB0",
        ));
        assert_eq!(err.to_string(), "Device Error: Busy: /dev/ttyUSB0");
    }

    #[test]
    fn test_boxed_source_forwards() {
        let mut source: Box<dyn ByteSource + Send> =
            Box::new(MockByteSource::new(vec![vec![1, 2, 3]]));
        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
        assert!(matches!(source.read(&mut buf), Err(SerialError::Timeout)));
    }
}
