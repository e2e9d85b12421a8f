//! Операции над матрицами на CPU: генерация, эталонный GEMM, сравнение

use super::types::{Matrix, MatrixFill};
use crate::error::Result;
use ndarray::{ArrayView2, ArrayViewMut2};
use rand::Rng;

impl Matrix {
    /// Случайная матрица с целыми значениями из [0, 100).
    ///
    /// Генератор передаётся явно, чтобы результат был воспроизводим по seed.
    pub fn random<R: Rng>(size: usize, rng: &mut R) -> Result<Self> {
        let mut m = Self::zeroed(size)?;
        for v in m.data_mut() {
            *v = rng.gen_range(0..100) as f32;
        }
        Ok(m)
    }

    /// Создаёт матрицу заданного вида
    pub fn generate<R: Rng>(fill: MatrixFill, size: usize, rng: &mut R) -> Result<Self> {
        match fill {
            MatrixFill::Random => Self::random(size, rng),
            MatrixFill::Ones => Self::filled(size, 1.0),
            MatrixFill::Identity => Self::identity(size),
        }
    }

    fn view(&self) -> ArrayView2<'_, f32> {
        // Форма всегда согласована с длиной данных
        ArrayView2::from_shape((self.size(), self.size()), self.data())
            .unwrap_or_else(|_| unreachable!("matrix data is always size*size"))
    }
}

/// Эталонный GEMM на CPU: `C = beta * C + alpha * A * B`
pub fn reference_gemm(alpha: f32, beta: f32, a: &Matrix, b: &Matrix, c: &mut Matrix) {
    assert!(
        a.size() == b.size() && b.size() == c.size(),
        "GEMM operands must share one size: A={}, B={}, C={}",
        a.size(),
        b.size(),
        c.size()
    );
    let product = a.view().dot(&b.view());
    let n = c.size();
    let mut out = ArrayViewMut2::from_shape((n, n), c.data_mut())
        .unwrap_or_else(|_| unreachable!("matrix data is always size*size"));
    out.zip_mut_with(&product, |c, &p| *c = beta * *c + alpha * p);
}

/// Результат сравнения двух матриц
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Максимальная относительная разница
    pub max_relative_diff: f32,
    /// Число элементов, отличающихся больше допуска
    pub mismatches: usize,
}

impl Comparison {
    pub fn matches(&self) -> bool {
        self.mismatches == 0
    }
}

/// Сравнивает результат устройства с эталоном по относительной погрешности
pub fn compare_results(device: &Matrix, reference: &Matrix, tolerance: f32) -> Comparison {
    assert_eq!(device.size(), reference.size(), "compared matrices differ in size");
    let mut max_relative_diff = 0.0f32;
    let mut mismatches = 0;
    for (&got, &want) in device.data().iter().zip(reference.data()) {
        let diff = (got - want).abs() / want.abs().max(1.0);
        if !(diff <= tolerance) {
            mismatches += 1;
        }
        max_relative_diff = max_relative_diff.max(diff);
    }
    if mismatches > 0 {
        log::warn!(
            "{mismatches} element(s) differ from the CPU reference, max relative diff {max_relative_diff}"
        );
    }
    Comparison {
        max_relative_diff,
        mismatches,
    }
}
