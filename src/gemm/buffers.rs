//! Буферы устройства для матриц A, B, C

use super::ladder::{MemObject, Owned};
use crate::error::{ClCode, GemmError, MatrixRole, Result};
use crate::matrix::Matrix;
use crate::opencl::types::*;
use crate::opencl::ClApi;
use log::debug;
use serde::{Deserialize, Serialize};

/// Как содержимое матрицы попадает в буфер устройства
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// `CL_MEM_COPY_HOST_PTR`: данные копируются при создании буфера,
    /// время жизни памяти хоста и буфера не связано.
    #[default]
    Copy,
    /// `CL_MEM_USE_HOST_PTR`: устройство работает с памятью хоста напрямую.
    /// Хост не должен читать или менять матрицы, пока буфер жив.
    Alias,
}

impl TransferMode {
    fn host_flag(self) -> cl_mem_flags {
        match self {
            Self::Copy => CL_MEM_COPY_HOST_PTR,
            Self::Alias => CL_MEM_USE_HOST_PTR,
        }
    }
}

/// Режим доступа по роли: A и B только читаются устройством, C читается
/// (для умножения на beta) и записывается
pub fn access_flags(role: MatrixRole) -> cl_mem_flags {
    match role {
        MatrixRole::A | MatrixRole::B => CL_MEM_READ_ONLY,
        MatrixRole::C => CL_MEM_READ_WRITE,
    }
}

/// Создаёт буфер устройства для `len` элементов по адресу `host`.
///
/// # Safety
///
/// `host` должен указывать на `len` значений `f32`. В режиме
/// `TransferMode::Alias` эта память должна оставаться валидной и не
/// использоваться хостом, пока возвращённый буфер не освобождён; для
/// `MatrixRole::C` она также должна быть доступна для записи.
pub unsafe fn stage<'a, A: ClApi + ?Sized>(
    api: &'a A,
    context: cl_context,
    host: *mut f32,
    len: usize,
    role: MatrixRole,
    mode: TransferMode,
) -> Result<Owned<'a, A, MemObject>> {
    let flags = access_flags(role) | mode.host_flag();
    let size = len * std::mem::size_of::<f32>();
    let mem = api
        .create_buffer(context, flags, size, host.cast())
        .map_err(|code| GemmError::BufferCreateFailed {
            role,
            code: ClCode(code),
        })?;
    debug!("staged {role} as {size} byte buffer ({mode:?})");
    Ok(Owned::<A, MemObject>::new(api, mem))
}

/// Матрица, транспонированная на время жизни guard'а.
///
/// Ядро читает B по строкам, поэтому на устройство она уходит
/// транспонированной. Исходная раскладка восстанавливается при удалении
/// guard'а на любом пути выхода.
pub struct Transposed<'m> {
    matrix: &'m mut Matrix,
}

impl<'m> Transposed<'m> {
    pub fn new(matrix: &'m mut Matrix) -> Self {
        matrix.transpose();
        Self { matrix }
    }

    pub fn as_mut_ptr(&mut self) -> *mut f32 {
        self.matrix.data_mut().as_mut_ptr()
    }

    #[cfg(test)]
    fn data(&self) -> &[f32] {
        self.matrix.data()
    }
}

impl Drop for Transposed<'_> {
    fn drop(&mut self) {
        self.matrix.transpose();
    }
}
