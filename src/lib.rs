//! Запуск GEMM (`C = alpha * A * B + beta * C`) на всех OpenCL-устройствах хоста

// Макросы объявлены до модулей, чтобы быть видимыми в них
#[macro_use]
mod macros {
    /// Превращает код возврата OpenCL в `Result<(), cl_int>`
    macro_rules! cl_check {
        ($expr:expr) => {{
            #[allow(unused_unsafe)]
            let code = unsafe { $expr };
            if code == $crate::opencl::types::CL_SUCCESS {
                Ok(())
            } else {
                Err(code)
            }
        }};
    }

    /// Вызывает функцию-конструктор OpenCL, дописывая `errcode_ret` последним аргументом
    macro_rules! cl_create {
        ($func:expr, $($arg:expr),* $(,)?) => {{
            let mut code = $crate::opencl::types::CL_SUCCESS;
            #[allow(unused_unsafe)]
            let obj = unsafe { ($func)($($arg,)* &mut code) };
            if code != $crate::opencl::types::CL_SUCCESS {
                Err(code)
            } else if obj.is_null() {
                Err($crate::opencl::types::CL_OUT_OF_HOST_MEMORY)
            } else {
                Ok(obj)
            }
        }};
    }
}

pub mod config;
pub mod error;
pub mod gemm;
pub mod matrix;
pub mod opencl;
pub mod utils;

// Реэкспорт основных типов для удобства
pub use error::{GemmError, MatrixRole, Result};
pub use gemm::{Gemm, Job, TransferMode};
pub use matrix::{Matrix, MatrixFill};
pub use opencl::{ClApi, Context, Device, OpenCl};
