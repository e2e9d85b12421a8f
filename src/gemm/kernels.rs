//! Исходный код ядра GEMM

use crate::error::{GemmError, Result};
use std::borrow::Cow;
use std::ffi::CStr;
use std::path::PathBuf;

/// Встроенный исходный код ядра (тот же файл, что `kernels/gemm.cl`)
pub static GEMM_KERNEL: &str = include_str!("../../kernels/gemm.cl");

/// Имя точки входа в программе
pub const ENTRY_POINT: &CStr = c"gemm";

/// Откуда брать исходный код ядра
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KernelSource {
    #[default]
    Embedded,
    File(PathBuf),
}

impl KernelSource {
    /// Текст программы; ошибка чтения файла даёт `SourceUnavailable`
    pub fn load(&self) -> Result<Cow<'static, str>> {
        match self {
            Self::Embedded => Ok(Cow::Borrowed(GEMM_KERNEL)),
            Self::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| GemmError::SourceUnavailable {
                    path: path.clone(),
                    source,
                }),
        }
    }
}
