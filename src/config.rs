//! Параметры запуска
//!
//! Значения берутся по возрастанию приоритета: встроенные умолчания,
//! JSON-файл (`--config`), флаги командной строки.

use crate::gemm::{KernelSource, TransferMode};
use crate::matrix::MatrixFill;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Сторона квадратных матриц, кратна 8
    pub size: usize,
    pub alpha: f32,
    pub beta: f32,
    /// Зерно генератора; если не задано, выбирается случайно и пишется в лог
    pub seed: Option<u64>,
    /// Файл с исходным кодом ядра вместо встроенного
    pub kernel: Option<PathBuf>,
    pub transfer: TransferMode,
    pub fill: MatrixFill,
    /// Сверять результат устройства с расчётом на CPU
    pub verify: bool,
    /// Допустимое относительное расхождение при сверке
    pub tolerance: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size: 1024,
            alpha: 1.0,
            beta: 1.0,
            seed: None,
            kernel: None,
            transfer: TransferMode::Copy,
            fill: MatrixFill::Random,
            verify: false,
            tolerance: 1e-3,
        }
    }
}

impl RunConfig {
    /// Читает конфигурацию из JSON; отсутствующие поля берутся по умолчанию
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Умолчания, поверх них файл (если задан), поверх него флаги
    pub fn resolve(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(size) = overrides.size {
            self.size = size;
        }
        if let Some(alpha) = overrides.alpha {
            self.alpha = alpha;
        }
        if let Some(beta) = overrides.beta {
            self.beta = beta;
        }
        if overrides.seed.is_some() {
            self.seed = overrides.seed;
        }
        if overrides.kernel.is_some() {
            self.kernel = overrides.kernel.clone();
        }
        if let Some(transfer) = overrides.transfer {
            self.transfer = transfer;
        }
        if let Some(fill) = overrides.fill {
            self.fill = fill;
        }
        if overrides.verify {
            self.verify = true;
        }
        if let Some(tolerance) = overrides.tolerance {
            self.tolerance = tolerance;
        }
    }

    pub fn kernel_source(&self) -> KernelSource {
        match &self.kernel {
            Some(path) => KernelSource::File(path.clone()),
            None => KernelSource::Embedded,
        }
    }
}

/// Флаги командной строки, перекрывающие конфигурацию
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Matrix side length (multiple of 8)
    #[arg(short = 'n', long)]
    pub size: Option<usize>,

    /// Scale applied to A*B
    #[arg(long, allow_negative_numbers = true)]
    pub alpha: Option<f32>,

    /// Scale applied to the initial C
    #[arg(long, allow_negative_numbers = true)]
    pub beta: Option<f32>,

    /// Seed for the input generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load kernel source from this file instead of the embedded one
    #[arg(long, value_name = "PATH")]
    pub kernel: Option<PathBuf>,

    /// How matrices reach device buffers
    #[arg(long, value_enum)]
    pub transfer: Option<TransferMode>,

    /// Input matrix contents
    #[arg(long, value_enum)]
    pub fill: Option<MatrixFill>,

    /// Check device results against a CPU reference
    #[arg(long)]
    pub verify: bool,

    /// Relative tolerance used by --verify
    #[arg(long)]
    pub tolerance: Option<f32>,
}
