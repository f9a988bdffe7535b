//! 服务端配置
//!
//! 优先级：命令行参数 > `--config` TOML 文件 > 默认值。

use crate::error::ServerError;
use kt2_driver::{DriverConfig, PublishMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认监听地址
pub const DEFAULT_BIND: &str = "127.0.0.1:65432";

/// 流服务配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    /// 无客户端时 accept 的轮询间隔
    pub accept_poll: Duration,
    /// 会话中读取命令字节的超时
    pub command_poll: Duration,
    /// 发送超时，超过视为连接故障
    pub write_timeout: Duration,
    /// 开启环形缓冲区诊断时，汇总并清空事件日志的间隔
    pub diagnostics_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            accept_poll: Duration::from_millis(200),
            command_poll: Duration::from_millis(1),
            write_timeout: Duration::from_secs(2),
            diagnostics_interval: Duration::from_secs(5),
        }
    }
}

/// 输出模式（TOML 与命令行共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// 发送 `KT2F` 帧
    Frames,
    /// 转发原始 646 字节包
    Raw,
}

impl From<StreamMode> for PublishMode {
    fn from(mode: StreamMode) -> Self {
        match mode {
            StreamMode::Frames => PublishMode::Frames,
            StreamMode::Raw => PublishMode::RawPackets,
        }
    }
}

/// TOML 配置文件
///
/// ```toml
/// bind = "0.0.0.0:65432"
/// rows = 40
/// mode = "raw"
/// device_file = "ftdi-port-lab.txt"
/// accept_poll_ms = 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<String>,
    pub device_file: Option<PathBuf>,
    pub baud: Option<u32>,
    pub rows: Option<usize>,
    pub mode: Option<StreamMode>,
    pub accept_poll_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub publish_capacity: Option<usize>,
    pub zero_fill: Option<bool>,
    pub diagnostics: Option<bool>,
    pub diagnostics_interval_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| ServerError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// 把文件中的设置叠加到服务配置上
    pub fn apply_server(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(ms) = self.accept_poll_ms {
            config.accept_poll = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.diagnostics_interval_ms {
            config.diagnostics_interval = Duration::from_millis(ms);
        }
    }

    /// 把文件中的设置叠加到驱动配置上
    pub fn apply_driver(&self, config: &mut DriverConfig) {
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(mode) = self.mode {
            config.publish_mode = mode.into();
        }
        if let Some(capacity) = self.publish_capacity {
            config.publish_capacity = capacity;
        }
        if let Some(zero_fill) = self.zero_fill {
            config.zero_fill_on_restart = zero_fill;
        }
        if let Some(diagnostics) = self.diagnostics {
            config.record_diagnostics = diagnostics;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "127.0.0.1:65432");
        assert_eq!(config.accept_poll, Duration::from_millis(200));
        assert_eq!(config.command_poll, Duration::from_millis(1));
        assert_eq!(config.diagnostics_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_and_apply() {
        let file = FileConfig::parse(
            r#"
            bind = "0.0.0.0:7000"
            rows = 40
            mode = "raw"
            accept_poll_ms = 50
            diagnostics_interval_ms = 1000
            "#,
        )
        .unwrap();

        let mut server = ServerConfig::default();
        file.apply_server(&mut server);
        assert_eq!(server.bind, "0.0.0.0:7000");
        assert_eq!(server.accept_poll, Duration::from_millis(50));
        assert_eq!(server.diagnostics_interval, Duration::from_secs(1));

        let mut driver = DriverConfig::default();
        file.apply_driver(&mut driver);
        assert_eq!(driver.rows, 40);
        assert_eq!(driver.publish_mode, PublishMode::RawPackets);
        assert!(!driver.zero_fill_on_restart);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(FileConfig::parse("bogus = 1").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            FileConfig::load("/nonexistent/kt2.toml"),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kt2.toml");
        std::fs::write(&path, "mode = \"frames\"\nbaud = 3000000\n").unwrap();
        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.mode, Some(StreamMode::Frames));
        assert_eq!(file.baud, Some(3_000_000));
    }
}
