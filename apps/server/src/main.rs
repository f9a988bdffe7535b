//! `kt2_server`：从 KT2 传感器读取帧并通过 TCP 推送给一个客户端

use anyhow::Context;
use clap::Parser;
use kt2_driver::{DriverConfig, Kt2, Kt2Builder};
use kt2_serial::{MockByteSource, synthetic_stream};
use kt2_stream_server::{FileConfig, ServerConfig, StreamMode, StreamServer};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::info;

/// KT2 帧流服务
///
/// 客户端命令（单字节）：G = 开始推流，C = 断开，Q = 断开并关闭服务
#[derive(Parser, Debug)]
#[command(name = "kt2_server")]
#[command(about = "KT2 ToF sensor stream server", long_about = None)]
struct Args {
    /// TOML 配置文件（命令行参数优先）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 监听地址（默认 127.0.0.1:65432）
    #[arg(long)]
    bind: Option<String>,

    /// 串口路径，如 /dev/ttyUSB0（优先于设备文件）
    #[arg(long)]
    port: Option<String>,

    /// 设备文件（默认 ftdi-port-<hostname>.txt）
    #[arg(long)]
    device_file: Option<PathBuf>,

    /// 串口波特率（默认 12000000）
    #[arg(long)]
    baud: Option<u32>,

    /// 每帧行数（40 或 80）
    #[arg(long)]
    rows: Option<usize>,

    /// 输出模式
    #[arg(long, value_enum)]
    mode: Option<StreamMode>,

    /// 不连接硬件，回放 N 帧合成数据
    #[arg(long)]
    mock_frames: Option<u64>,

    /// 合成数据循环回放
    #[arg(long, requires = "mock_frames")]
    mock_repeat: bool,

    /// 记录环形缓冲区诊断事件（定期及退出时输出统计）
    #[arg(long)]
    diagnostics: bool,

    /// 诊断统计的输出间隔，毫秒（默认 5000）
    #[arg(long, requires = "diagnostics")]
    diagnostics_interval_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kt2_server=info".parse().unwrap())
                .add_directive("kt2_stream_server=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let mut server_config = ServerConfig::default();
    file.apply_server(&mut server_config);
    if let Some(bind) = &args.bind {
        server_config.bind = bind.clone();
    }
    if let Some(ms) = args.diagnostics_interval_ms {
        server_config.diagnostics_interval = std::time::Duration::from_millis(ms);
    }

    let mut driver_config = DriverConfig::default();
    file.apply_driver(&mut driver_config);
    if let Some(rows) = args.rows {
        driver_config.rows = rows;
    }
    if let Some(mode) = args.mode {
        driver_config.publish_mode = mode.into();
    }
    if args.diagnostics {
        driver_config.record_diagnostics = true;
    }

    let kt2 = start_driver(&args, &file, driver_config)?;
    let diagnostics = args.diagnostics;

    let server = StreamServer::bind(server_config, kt2)?;
    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        shutdown.store(true, Ordering::Release);
    })
    .expect("Failed to set signal handler");

    let stats = server.run()?;
    if diagnostics {
        info!("Final server stats: {:?}", stats);
    }
    Ok(())
}

fn start_driver(args: &Args, file: &FileConfig, config: DriverConfig) -> anyhow::Result<Kt2> {
    if let Some(frames) = args.mock_frames {
        info!(
            "Using synthetic source: {} frame(s) of {} rows{}",
            frames,
            config.rows,
            if args.mock_repeat { ", repeating" } else { "" }
        );
        let source = MockByteSource::chunked(&synthetic_stream(config.rows, frames), 1000)
            .repeat(args.mock_repeat)
            .with_read_delay(std::time::Duration::from_micros(500));
        return Kt2::start(source, config).context("failed to start synthetic driver");
    }

    let mut builder = Kt2Builder::new().config(config);
    if let Some(port) = args.port.clone().or_else(|| file.port.clone()) {
        builder = builder.port(port);
    }
    if let Some(path) = args.device_file.clone().or_else(|| file.device_file.clone()) {
        builder = builder.device_file(path);
    }
    if let Some(baud) = args.baud.or(file.baud) {
        builder = builder.baud(baud);
    }

    let serial = builder.serial_config()?;
    info!("Opening sensor on {} at {} baud", serial.port, serial.baud);
    builder
        .build()
        .with_context(|| format!("failed to open sensor on {}", serial.port))
}
