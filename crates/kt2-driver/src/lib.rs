//! # KT2 Driver
//!
//! 传感器驱动层：
//! - 读硬件线程：字节源 → [`RingBuffer`]，不解析
//! - 流水线线程：[`RingBuffer`] → 同步 → 解码 → 组帧 → 发布
//! - [`Kt2`] 句柄：就绪握手、指标、有序关闭
//!
//! 两个线程只通过环形缓冲区通信，字节严格按 FIFO 交付。

mod builder;
mod config;
mod error;
mod kt2;
pub mod metrics;
pub mod pipeline;
pub mod reader;
pub mod ring_buffer;

pub use builder::Kt2Builder;
pub use config::{DriverConfig, PublishMode};
pub use error::{DriverError, RingBufferError};
pub use kt2::Kt2;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pipeline::{PacketReader, Published, SyncedPacket, pipeline_loop};
pub use reader::reader_loop;
pub use ring_buffer::{RingBuffer, RingEvent, RingEventKind};
