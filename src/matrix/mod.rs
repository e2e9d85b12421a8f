//! Модуль для работы с матрицами
//!
//! Предоставляет:
//! - Квадратную матрицу и способы её заполнения
//! - Эталонный GEMM на CPU и сравнение результатов

mod types;
pub mod operations;

pub use types::{Matrix, MatrixFill};
pub use operations::{compare_results, reference_gemm, Comparison};
