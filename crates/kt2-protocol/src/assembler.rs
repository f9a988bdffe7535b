//! 组帧状态机
//!
//! 以行号回绕检测帧边界：
//! - `row == 0`：开始（或重新开始）一帧
//! - 已开始时，`row < ROWS` 的包覆盖对应行
//! - 观察到 `row >= ROWS - 1`：帧完成，复制交给发布阶段，缓冲区留给下一帧复用
//!
//! 缓冲区在新一帧开始时默认**不清零**：丢失的行保留上一帧的内容。

use crate::constants::SAMPLES_PER_ROW;
use crate::frame::Frame;
use crate::packet::Packet;

/// 单个行包的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// 尚未遇到行 0，包被忽略
    Ignored,
    /// 已写入帧缓冲区
    Written { row: u8 },
    /// 行号超出配置的行数，计数但不写入
    OutOfRange { row: u8 },
    /// 采样数不正确（空包），不写入
    Rejected { row: u8 },
}

/// `push` 的返回值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub row: RowOutcome,
    /// 本次推入使一帧完成时，携带该帧的副本
    pub completed: Option<Frame>,
}

/// 行包 → 完整帧
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    current: Frame,
    frame_started: bool,
    /// 本轮已接收的行数（含越界行）
    row_cursor: usize,
    frame_index: u64,
    zero_fill_on_restart: bool,
}

impl FrameAssembler {
    /// 创建组帧器，`rows` 为每帧行数（40 或 80）
    pub fn new(rows: usize) -> Self {
        Self {
            current: Frame::new(rows),
            frame_started: false,
            row_cursor: 0,
            frame_index: 0,
            zero_fill_on_restart: false,
        }
    }

    /// 每次从行 0 重新开始时清零缓冲区（默认关闭）
    pub fn with_zero_fill(mut self, enabled: bool) -> Self {
        self.zero_fill_on_restart = enabled;
        self
    }

    pub fn rows(&self) -> usize {
        self.current.rows()
    }

    pub fn is_frame_started(&self) -> bool {
        self.frame_started
    }

    pub fn row_cursor(&self) -> usize {
        self.row_cursor
    }

    /// 已完成的帧数
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// 当前（可能不完整的）帧缓冲区
    pub fn current(&self) -> &Frame {
        &self.current
    }

    pub fn push(&mut self, packet: &Packet) -> PushOutcome {
        self.push_row(packet.row, &packet.samples)
    }

    pub fn push_row(&mut self, row: u8, samples: &[i16]) -> PushOutcome {
        let rows = self.current.rows();

        if row == 0 {
            // 未完成时遇到行 0 视为重新开始
            self.frame_started = true;
            self.row_cursor = 0;
            if self.zero_fill_on_restart {
                self.current.clear();
            }
        }

        if !self.frame_started {
            return PushOutcome {
                row: RowOutcome::Ignored,
                completed: None,
            };
        }

        self.row_cursor += 1;

        let outcome = if (row as usize) >= rows {
            RowOutcome::OutOfRange { row }
        } else if samples.len() != SAMPLES_PER_ROW || !self.current.set_row(row as usize, samples) {
            RowOutcome::Rejected { row }
        } else {
            RowOutcome::Written { row }
        };

        let completed = if (row as usize) + 1 >= rows {
            let mut frame = self.current.clone();
            frame.index = self.frame_index;
            self.frame_index += 1;
            self.frame_started = false;
            self.row_cursor = 0;
            Some(frame)
        } else {
            None
        };

        PushOutcome {
            row: outcome,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_samples(row: u8, salt: i16) -> Vec<i16> {
        (0..SAMPLES_PER_ROW as i16)
            .map(|i| i.wrapping_mul(7) ^ (row as i16) << 8 ^ salt)
            .collect()
    }

    fn packet(row: u8, salt: i16) -> Packet {
        Packet::distance(row, row_samples(row, salt))
    }

    #[test]
    fn test_in_order_rows_produce_one_frame() {
        let rows = 40;
        let mut assembler = FrameAssembler::new(rows);
        let mut completed = Vec::new();

        for row in 0..rows as u8 {
            let outcome = assembler.push(&packet(row, 1));
            assert_eq!(outcome.row, RowOutcome::Written { row });
            completed.extend(outcome.completed);
        }

        assert_eq!(completed.len(), 1);
        let frame = &completed[0];
        assert_eq!(frame.index, 0);
        for row in 0..rows {
            assert_eq!(frame.row(row).unwrap(), &row_samples(row as u8, 1)[..]);
        }
        assert_eq!(assembler.frame_index(), 1);
        assert!(!assembler.is_frame_started());
    }

    #[test]
    fn test_rows_before_row_zero_are_ignored() {
        let mut assembler = FrameAssembler::new(40);
        let outcome = assembler.push(&packet(5, 0));
        assert_eq!(outcome.row, RowOutcome::Ignored);
        assert!(outcome.completed.is_none());
        assert!(assembler.current().data().iter().all(|&v| v == 0));

        // 行尾在未开始时同样不会触发完成
        let outcome = assembler.push(&packet(39, 0));
        assert_eq!(outcome.row, RowOutcome::Ignored);
        assert!(outcome.completed.is_none());
    }

    #[test]
    fn test_skipped_rows_keep_previous_content() {
        let rows = 40;
        let mut assembler = FrameAssembler::new(rows);
        for row in 0..rows as u8 {
            assembler.push(&packet(row, 1));
        }

        // 第二帧丢失第 10 行
        let mut second = None;
        for row in (0..rows as u8).filter(|&r| r != 10) {
            if let Some(frame) = assembler.push(&packet(row, 2)).completed {
                second = Some(frame);
            }
        }

        let frame = second.expect("second frame should complete");
        assert_eq!(frame.index, 1);
        assert_eq!(frame.row(10).unwrap(), &row_samples(10, 1)[..]);
        assert_eq!(frame.row(11).unwrap(), &row_samples(11, 2)[..]);
    }

    #[test]
    fn test_out_of_order_rows_overwrite_in_place() {
        let mut assembler = FrameAssembler::new(4);
        assembler.push(&packet(0, 0));
        assembler.push(&packet(2, 0));
        assembler.push(&packet(1, 0));
        let frame = assembler.push(&packet(3, 0)).completed.unwrap();
        for row in 0..4u8 {
            assert_eq!(frame.row(row as usize).unwrap(), &row_samples(row, 0)[..]);
        }
    }

    #[test]
    fn test_zero_fill_on_restart() {
        let mut assembler = FrameAssembler::new(4).with_zero_fill(true);
        for row in 0..4u8 {
            assembler.push(&packet(row, 1));
        }
        assembler.push(&packet(0, 2));
        let frame = assembler.push(&packet(3, 2)).completed.unwrap();
        assert!(frame.row(1).unwrap().iter().all(|&v| v == 0));
        assert!(frame.row(2).unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_row_beyond_bound_completes_without_write() {
        // 传感器输出 80 行，而配置为 40 行
        let mut assembler = FrameAssembler::new(40);
        for row in 0..39u8 {
            assembler.push(&packet(row, 0));
        }
        let before = assembler.current().clone();
        let outcome = assembler.push(&packet(60, 0));
        assert_eq!(outcome.row, RowOutcome::OutOfRange { row: 60 });
        let frame = outcome.completed.unwrap();
        assert_eq!(frame.data(), before.data());

        // 后续越界行在未开始时被忽略
        let outcome = assembler.push(&packet(61, 0));
        assert_eq!(outcome.row, RowOutcome::Ignored);
    }

    #[test]
    fn test_row_zero_restarts_incomplete_frame() {
        let mut assembler = FrameAssembler::new(40);
        for row in 0..20u8 {
            assembler.push(&packet(row, 1));
        }
        assert_eq!(assembler.row_cursor(), 20);

        assembler.push(&packet(0, 2));
        assert_eq!(assembler.row_cursor(), 1);
        assert!(assembler.is_frame_started());
        assert_eq!(assembler.frame_index(), 0);
    }

    #[test]
    fn test_empty_packet_is_rejected() {
        let mut assembler = FrameAssembler::new(40);
        let outcome = assembler.push(&Packet::empty());
        assert_eq!(outcome.row, RowOutcome::Rejected { row: 0 });
        assert!(assembler.is_frame_started());
    }
}
