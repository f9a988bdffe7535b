//! `kt2_client`：连接 KT2 帧流服务，打印收到的帧
//!
//! ```bash
//! # 接收 10 帧后断开，服务端继续监听
//! kt2_client --addr 127.0.0.1:65432 --frames 10
//!
//! # 服务端以 raw 模式运行时，本地重新组帧；结束后让服务端退出
//! kt2_client --raw --rows 40 --shutdown-server
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use kt2_client::{ClientConfig, ClientError, StreamClient};
use kt2_driver::DriverConfig;
use kt2_protocol::{DEFAULT_ROWS, Frame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// KT2 帧流客户端
#[derive(Parser, Debug)]
#[command(name = "kt2_client")]
#[command(about = "Receive depth frames from a KT2 stream server", long_about = None)]
struct Args {
    /// 服务端地址
    #[arg(long, default_value = "127.0.0.1:65432")]
    addr: String,

    /// 接收帧数（0 表示直到 Ctrl+C）
    #[arg(long, default_value_t = 10)]
    frames: u64,

    /// 服务端转发原始 646 字节包，本地组帧
    #[arg(long)]
    raw: bool,

    /// raw 模式下每帧行数（40 或 80）
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: usize,

    /// 最多尝试连接次数（默认一直重试）
    #[arg(long)]
    max_attempts: Option<usize>,

    /// 结束时发送 `Q`，让服务端关闭
    #[arg(long)]
    shutdown_server: bool,
}

/// 非零采样的统计（零值视为无回波）
fn summarize(frame: &Frame) -> String {
    let valid: Vec<i16> = frame.data().iter().copied().filter(|&v| v != 0).collect();
    if valid.is_empty() {
        return format!(
            "frame {:>6}  {}x{}  no valid samples",
            frame.index,
            frame.rows(),
            frame.cols()
        );
    }
    let min = valid.iter().min().copied().unwrap_or_default();
    let max = valid.iter().max().copied().unwrap_or_default();
    let mean = valid.iter().map(|&v| v as f64).sum::<f64>() / valid.len() as f64;
    format!(
        "frame {:>6}  {}x{}  valid {:>5}  min {:>6}  max {:>6}  mean {:>8.1}",
        frame.index,
        frame.rows(),
        frame.cols(),
        valid.len(),
        min,
        max,
        mean
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kt2_client=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Stopping...");
        r.store(false, Ordering::Release);
    })
    .expect("Failed to set signal handler");

    let config = ClientConfig {
        max_attempts: args.max_attempts,
        ..Default::default()
    };
    info!("Connecting to {}", args.addr);
    let client = StreamClient::connect_with(args.addr.as_str(), &config)
        .with_context(|| format!("cannot connect to {}", args.addr))?;

    let started = Instant::now();
    let received = if args.raw {
        run_raw(client, &args, &running)?
    } else {
        run_frames(client, &args, &running)?
    };

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        info!(
            "Received {} frame(s) in {:.2}s ({:.1} fps)",
            received,
            elapsed,
            received as f64 / elapsed
        );
    }
    Ok(())
}

fn wants_more(received: u64, args: &Args, running: &AtomicBool) -> bool {
    running.load(Ordering::Acquire) && (args.frames == 0 || received < args.frames)
}

fn run_frames(mut client: StreamClient, args: &Args, running: &AtomicBool) -> Result<u64> {
    client.go()?;
    let mut received = 0;
    while wants_more(received, args, running) {
        match client.try_next_frame() {
            Ok(Some(frame)) => {
                println!("{}", summarize(&frame));
                received += 1;
            },
            Ok(None) => {},
            Err(ClientError::Disconnected) => {
                warn!("Server closed the connection");
                return Ok(received);
            },
            Err(e) => return Err(e.into()),
        }
    }

    if args.shutdown_server {
        client.quit()?;
    } else {
        client.close()?;
    }
    Ok(received)
}

fn run_raw(client: StreamClient, args: &Args, running: &AtomicBool) -> Result<u64> {
    let config = DriverConfig {
        rows: args.rows,
        ..Default::default()
    };
    let mut client = client.into_raw(config)?;
    client.go()?;

    let mut received = 0;
    while wants_more(received, args, running) {
        match client.next_frame(Duration::from_millis(100)) {
            Ok(frame) => {
                println!("{}", summarize(&frame));
                received += 1;
            },
            Err(ClientError::Timeout) => {},
            Err(ClientError::Disconnected) => {
                warn!("Server closed the connection");
                return Ok(received);
            },
            Err(e) => return Err(e.into()),
        }
    }

    let metrics = client.metrics();
    info!(
        "Local pipeline: {} packet(s), {} resync(s), {} byte(s) skipped",
        metrics.packets_decoded, metrics.resync_events, metrics.bytes_skipped
    );
    if args.shutdown_server {
        client.quit()?;
    } else {
        client.close()?;
    }
    Ok(received)
}
