//! Квадратная матрица и способы её заполнения

use crate::error::{GemmError, Result};
use serde::{Deserialize, Serialize};

/// Как заполнять входные матрицы A и B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatrixFill {
    /// Случайные целые значения из [0, 100)
    #[default]
    Random,
    /// Все элементы равны 1
    Ones,
    /// Единичная матрица
    Identity,
}

/// Квадратная матрица `size x size` из `f32`, хранение по строкам:
/// элемент (i, j) лежит по смещению `i * size + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    size: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Нулевая матрица; нехватка памяти возвращается как ошибка
    pub fn zeroed(size: usize) -> Result<Self> {
        let len = size.checked_mul(size).ok_or(GemmError::OutOfMemory { size })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| GemmError::OutOfMemory { size })?;
        data.resize(len, 0.0);
        Ok(Self { size, data })
    }

    /// Матрица из строк одинаковой длины
    #[cfg(test)]
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Option<Self> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for row in rows {
            let row = row.as_ref();
            if row.len() != size {
                return None;
            }
            data.extend_from_slice(row);
        }
        Some(Self { size, data })
    }

    pub fn identity(size: usize) -> Result<Self> {
        let mut m = Self::zeroed(size)?;
        for i in 0..size {
            m.set(i, i, 1.0);
        }
        Ok(m)
    }

    pub fn filled(size: usize, value: f32) -> Result<Self> {
        let mut m = Self::zeroed(size)?;
        m.data.fill(value);
        Ok(m)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Пустая матрица (size = 0) не пригодна для вычислений
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[cfg(test)]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.size + col] = value;
    }

    /// Транспонирование на месте
    pub fn transpose(&mut self) {
        let n = self.size;
        for i in 0..n {
            for j in i + 1..n {
                self.data.swap(i * n + j, j * n + i);
            }
        }
    }
}
