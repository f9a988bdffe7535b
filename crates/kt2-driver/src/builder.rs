//! Builder 模式实现
//!
//! 串口来源优先级：显式端口 > 设备文件 > 当前主机的默认设备文件。

use crate::config::{DriverConfig, PublishMode};
use crate::error::DriverError;
use crate::kt2::Kt2;
use kt2_serial::{ByteSource, DEFAULT_BAUD, DEFAULT_READ_TIMEOUT, SerialConfig};
use std::path::PathBuf;
use std::time::Duration;

/// KT2 Builder（链式构造）
///
/// ```no_run
/// use kt2_driver::Kt2Builder;
///
/// let kt2 = Kt2Builder::new()
///     .port("/dev/ttyUSB0")
///     .rows(40)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Kt2Builder {
    port: Option<String>,
    device_file: Option<PathBuf>,
    baud: u32,
    read_timeout: Duration,
    config: DriverConfig,
}

impl Default for Kt2Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Kt2Builder {
    pub fn new() -> Self {
        Self {
            port: None,
            device_file: None,
            baud: DEFAULT_BAUD,
            read_timeout: DEFAULT_READ_TIMEOUT,
            config: DriverConfig::default(),
        }
    }

    /// 直接指定串口路径（如 `/dev/ttyUSB0`）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 从设备文件读取串口路径
    pub fn device_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_file = Some(path.into());
        self
    }

    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.config.rows = rows;
        self
    }

    pub fn publish_mode(mut self, mode: PublishMode) -> Self {
        self.config.publish_mode = mode;
        self
    }

    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// 解析出最终的串口参数
    pub fn serial_config(&self) -> Result<SerialConfig, DriverError> {
        let port = match (&self.port, &self.device_file) {
            (Some(port), _) => port.clone(),
            (None, Some(path)) => kt2_serial::read_device_file(path)?.port,
            (None, None) => kt2_serial::read_device_file(kt2_serial::default_device_file())?.port,
        };
        Ok(SerialConfig::new(port)
            .baud(self.baud)
            .read_timeout(self.read_timeout))
    }

    /// 打开串口并启动驱动
    #[cfg(feature = "ftdi")]
    pub fn build(self) -> Result<Kt2, DriverError> {
        let serial = self.serial_config()?;
        let adapter = kt2_serial::FtdiSerialAdapter::open(&serial)?;
        Kt2::start(adapter, self.config)
    }

    #[cfg(not(feature = "ftdi"))]
    pub fn build(self) -> Result<Kt2, DriverError> {
        Err(DriverError::Config(
            "serial backend disabled (enable the `ftdi` feature)".to_string(),
        ))
    }

    /// 使用自定义字节源启动驱动（测试、网络字节源等）
    pub fn build_with_source<S>(self, mut source: S) -> Result<Kt2, DriverError>
    where
        S: ByteSource + Send + 'static,
    {
        source.set_read_timeout(self.read_timeout);
        Kt2::start(source, self.config)
    }
}
