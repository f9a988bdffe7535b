//! 设备映射文件
//!
//! 每台主机一个文本文件 `ftdi-port-<hostname>.txt`，记录要打开的串口：
//!
//! ```text
//! ftdi://ftdi:232h:FT4ABCDE/1   FT232H USB-Serial (UART)
//! ```
//!
//! 取第一行可用条目，第一个字段为端口，其余为描述。

use crate::{SerialDeviceError, SerialDeviceErrorKind, SerialError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 设备文件中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub port: String,
    pub description: String,
}

/// 当前主机的默认设备文件名
pub fn default_device_file() -> PathBuf {
    PathBuf::from(format!("ftdi-port-{}.txt", hostname()))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// 读取设备文件并返回第一条可用记录
pub fn read_device_file(path: impl AsRef<Path>) -> Result<DeviceEntry, SerialError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        SerialDeviceError::new(
            SerialDeviceErrorKind::NotFound,
            format!("cannot read device file {}: {}", path.display(), e),
        )
    })?;

    parse_device_entries(&content).into_iter().next().ok_or_else(|| {
        SerialDeviceError::new(
            SerialDeviceErrorKind::NotFound,
            format!("no usable port in {}", path.display()),
        )
        .into()
    })
}

/// 解析所有可用记录
pub fn parse_device_entries(content: &str) -> Vec<DeviceEntry> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (port, description) = match line.split_once(char::is_whitespace) {
                Some((port, rest)) => (port, rest.trim()),
                None => (line, ""),
            };
            if !is_port_name(port) {
                if !line.is_empty() {
                    debug!("Skipping device file line: {:?}", line);
                }
                return None;
            }
            Some(DeviceEntry {
                port: port.to_string(),
                description: description.to_string(),
            })
        })
        .collect()
}

fn is_port_name(field: &str) -> bool {
    field.starts_with("ftdi:") || field.starts_with("/dev/") || field.starts_with("COM")
}
