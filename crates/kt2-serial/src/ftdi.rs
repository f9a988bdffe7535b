//! FTDI 串口字节源（基于 `serialport`）
//!
//! FT232H 在 Linux 上以 `/dev/ttyUSB*` 出现，Windows 上为 `COM*`。
//! 设备文件中的 `ftdi://ftdi:232h:<SERIAL>/1` URL 按 USB 序列号映射到对应的串口。

use crate::{ByteSource, SerialConfig, SerialDeviceError, SerialDeviceErrorKind, SerialError};
use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 串口适配器
pub struct FtdiSerialAdapter {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl FtdiSerialAdapter {
    /// 打开串口并清空输入缓冲区中的残留字节
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        let path = if config.port.starts_with("ftdi:") {
            let ports = serialport::available_ports()
                .map_err(|e| map_serialport_error("port enumeration", e))?;
            let path = resolve_ftdi_url(&config.port, &ports)?;
            info!("Resolved {} to {}", config.port, path);
            path
        } else {
            config.port.clone()
        };

        let port = serialport::new(&path, config.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| map_serialport_error(&path, e))?;

        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!("Failed to purge input buffer on {}: {}", path, e);
        }

        info!("Opened serial port {} at {} baud", path, config.baud);

        Ok(Self {
            port: Some(port),
            name: path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// FTDI 的 USB 厂商号
pub const FTDI_VID: u16 = 0x0403;

/// 把 `ftdi://<vendor>:<product>[:<serial>]/<interface>` 映射到串口路径
///
/// 有序列号时按 USB 序列号匹配；没有时取第一个 FTDI 设备。
pub fn resolve_ftdi_url(url: &str, ports: &[SerialPortInfo]) -> Result<String, SerialError> {
    let device = url
        .strip_prefix("ftdi://")
        .and_then(|rest| rest.split('/').next())
        .filter(|device| !device.is_empty())
        .ok_or_else(|| {
            SerialDeviceError::new(
                SerialDeviceErrorKind::UnsupportedConfig,
                format!("malformed FTDI URL: {}", url),
            )
        })?;
    let serial = device.split(':').nth(2).filter(|s| !s.is_empty());

    ports
        .iter()
        .find(|port| match &port.port_type {
            SerialPortType::UsbPort(usb) => match serial {
                Some(serial) => usb.serial_number.as_deref() == Some(serial),
                None => usb.vid == FTDI_VID,
            },
            _ => false,
        })
        .map(|port| port.port_name.clone())
        .ok_or_else(|| {
            SerialDeviceError::new(
                SerialDeviceErrorKind::NotFound,
                format!("no serial port matches {}", url),
            )
            .into()
        })
}

fn map_serialport_error(port: &str, e: serialport::Error) -> SerialError {
    let kind = match e.kind() {
        serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NoDevice,
        serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::UnsupportedConfig,
        serialport::ErrorKind::Io(ErrorKind::NotFound) => SerialDeviceErrorKind::NotFound,
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => {
            SerialDeviceErrorKind::AccessDenied
        },
        serialport::ErrorKind::Io(ErrorKind::ResourceBusy) => SerialDeviceErrorKind::Busy,
        serialport::ErrorKind::Io(_) => SerialDeviceErrorKind::Backend,
        serialport::ErrorKind::Unknown => SerialDeviceErrorKind::Unknown,
    };
    SerialDeviceError::new(kind, format!("{}: {}", port, e)).into()
}

fn map_io_error(e: std::io::Error) -> SerialError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
            SerialError::Timeout
        },
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => SerialDeviceError::new(
            SerialDeviceErrorKind::NoDevice,
            format!("serial device gone: {}", e),
        )
        .into(),
        _ => SerialError::Io(e),
    }
}

impl ByteSource for FtdiSerialAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let port = self.port.as_mut().ok_or(SerialError::Disconnected)?;
        match port.read(buf) {
            Ok(0) => Err(SerialError::Timeout),
            Ok(n) => Ok(n),
            Err(e) => Err(map_io_error(e)),
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.set_timeout(timeout) {
                warn!("Failed to set read timeout on {}: {}", self.name, e);
            }
        }
    }

    fn close(&mut self) -> Result<(), SerialError> {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.name);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl Drop for FtdiSerialAdapter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serialport::UsbPortInfo;

    fn usb_port(name: &str, vid: u16, serial: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid: 0x6014,
                serial_number: serial.map(str::to_string),
                manufacturer: Some("FTDI".to_string()),
                product: Some("Single RS232-HS".to_string()),
            }),
        }
    }

    fn ports() -> Vec<SerialPortInfo> {
        vec![
            SerialPortInfo {
                port_name: "/dev/ttyS0".to_string(),
                port_type: SerialPortType::Unknown,
            },
            usb_port("/dev/ttyACM0", 0x2341, Some("ARDUINO1")),
            usb_port("/dev/ttyUSB0", FTDI_VID, Some("FT0OTHER")),
            usb_port("/dev/ttyUSB1", FTDI_VID, Some("FT4ABCDE")),
        ]
    }

    fn device_error_kind(err: SerialError) -> Option<SerialDeviceErrorKind> {
        match err {
            SerialError::Device(e) => Some(e.kind),
            _ => None,
        }
    }

    #[test]
    fn test_resolve_by_serial_number() {
        assert_eq!(
            resolve_ftdi_url("ftdi://ftdi:232h:FT4ABCDE/1", &ports()).unwrap(),
            "/dev/ttyUSB1"
        );
    }

    #[test]
    fn test_resolve_without_serial_takes_first_ftdi() {
        assert_eq!(
            resolve_ftdi_url("ftdi://ftdi:232h/1", &ports()).unwrap(),
            "/dev/ttyUSB0"
        );
    }

    #[test]
    fn test_resolve_unknown_serial_is_not_found() {
        let err = resolve_ftdi_url("ftdi://ftdi:232h:FTMISSING/1", &ports()).unwrap_err();
        assert_eq!(device_error_kind(err), Some(SerialDeviceErrorKind::NotFound));

        let err = resolve_ftdi_url("ftdi://ftdi:232h:FT4ABCDE/1", &ports()[..2]).unwrap_err();
        assert_eq!(device_error_kind(err), Some(SerialDeviceErrorKind::NotFound));
    }

    #[test]
    fn test_resolve_malformed_url() {
        let err = resolve_ftdi_url("ftdi:///1", &ports()).unwrap_err();
        assert_eq!(
            device_error_kind(err),
            Some(SerialDeviceErrorKind::UnsupportedConfig)
        );
    }

    #[test]
    fn test_missing_port_is_error() {
        let config = SerialConfig::new("/dev/kt2-does-not-exist");
        assert!(FtdiSerialAdapter::open(&config).is_err());
    }

    #[test]
    fn test_io_error_mapping() {
        assert!(matches!(
            map_io_error(std::io::Error::from(ErrorKind::TimedOut)),
            SerialError::Timeout
        ));
        assert!(map_io_error(std::io::Error::from(ErrorKind::BrokenPipe)).is_fatal());
        assert!(!map_io_error(std::io::Error::other("crc")).is_fatal());
    }
}
