//! Ошибки конвейера GEMM

use crate::opencl::types::{cl_int, error_name};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Роль матрицы в операции `C = alpha * A * B + beta * C`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixRole {
    A,
    B,
    C,
}

impl fmt::Display for MatrixRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
            Self::C => f.write_str("C"),
        }
    }
}

/// Код возврата OpenCL в виде `CL_NAME (-N)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClCode(pub cl_int);

impl fmt::Display for ClCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", error_name(self.0), self.0)
    }
}

/// Ошибки, возникающие при поиске устройств и запуске GEMM.
///
/// Ни одна из них не фатальна для процесса: драйвер сообщает об ошибке
/// и переходит к следующему устройству. Повторных попыток нет.
#[derive(Debug, Error)]
pub enum GemmError {
    #[error("OpenCL runtime is not available: {0}")]
    RuntimeUnavailable(String),

    #[error("failed to enumerate OpenCL devices at {step}: {code}")]
    EnumerationFailed { step: &'static str, code: ClCode },

    #[error("failed to read gemm kernel source from {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create context: {code}")]
    ContextCreateFailed { code: ClCode },

    #[error("failed to create queue: {code}")]
    QueueCreateFailed { code: ClCode },

    #[error("failed to create gemm program: {code}")]
    ProgramCreateFailed { code: ClCode },

    #[error("failed to build gemm program: {code}\n{log}")]
    BuildFailed { code: ClCode, log: String },

    #[error("failed to create gemm kernel: {code}")]
    KernelCreateFailed { code: ClCode },

    #[error("failed to create buffer for {role}: {code}")]
    BufferCreateFailed { role: MatrixRole, code: ClCode },

    #[error("failed to set gemm kernel argument {index}: {code}")]
    ArgumentBindFailed { index: u32, code: ClCode },

    #[error("failed to enqueue gemm kernel: {code}")]
    EnqueueFailed { code: ClCode },

    #[error("failed to read result: {code}")]
    ReadbackFailed { code: ClCode },

    #[error("matrix size {size} is not a positive multiple of the {tile}x{tile} work-group tile")]
    InvalidGeometry { size: usize, tile: usize },

    #[error("failed to allocate {size}x{size} matrix")]
    OutOfMemory { size: usize },

    #[error("failed to query {param}: {code}")]
    InfoQueryFailed { param: &'static str, code: ClCode },
}

impl GemmError {
    /// Короткое имя шага конвейера, на котором произошла ошибка
    pub fn step(&self) -> &'static str {
        match self {
            Self::RuntimeUnavailable(_) => "runtime",
            Self::EnumerationFailed { .. } => "enumeration",
            Self::SourceUnavailable { .. } => "source",
            Self::ContextCreateFailed { .. } => "context creation",
            Self::QueueCreateFailed { .. } => "queue creation",
            Self::ProgramCreateFailed { .. } => "program creation",
            Self::BuildFailed { .. } => "build",
            Self::KernelCreateFailed { .. } => "kernel creation",
            Self::BufferCreateFailed { role: MatrixRole::A, .. } => "buffer creation for A",
            Self::BufferCreateFailed { role: MatrixRole::B, .. } => "buffer creation for B",
            Self::BufferCreateFailed { role: MatrixRole::C, .. } => "buffer creation for C",
            Self::ArgumentBindFailed { .. } => "argument binding",
            Self::EnqueueFailed { .. } => "enqueue",
            Self::ReadbackFailed { .. } => "readback",
            Self::InvalidGeometry { .. } => "launch geometry",
            Self::OutOfMemory { .. } => "allocation",
            Self::InfoQueryFailed { .. } => "info query",
        }
    }
}

pub type Result<T> = std::result::Result<T, GemmError>;
