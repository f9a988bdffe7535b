//! 二维深度帧

use crate::constants::SAMPLES_PER_ROW;

/// 一帧深度图像（行优先，`rows × cols` 个 i16）
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// 帧序号（由组帧器递增）
    pub index: u64,
    rows: usize,
    cols: usize,
    data: Vec<i16>,
}

impl Frame {
    /// 创建全零帧（每行 320 个采样）
    pub fn new(rows: usize) -> Self {
        Self::with_dims(rows, SAMPLES_PER_ROW)
    }

    pub fn with_dims(rows: usize, cols: usize) -> Self {
        Self {
            index: 0,
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// 由已有数据构造，长度必须等于 `rows * cols`
    pub fn from_data(index: u64, rows: usize, cols: usize, data: Vec<i16>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self {
            index,
            rows,
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn into_data(self) -> Vec<i16> {
        self.data
    }

    pub fn row(&self, row: usize) -> Option<&[i16]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i16> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// 覆盖一行
    ///
    /// 行号越界或采样数不等于列数时不写入，返回 `false`。
    pub fn set_row(&mut self, row: usize, samples: &[i16]) -> bool {
        if row >= self.rows || samples.len() != self.cols {
            return false;
        }
        self.data[row * self.cols..(row + 1) * self.cols].copy_from_slice(samples);
        true
    }

    /// 全部清零
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
