//! Сборка ядра GEMM для одного устройства

use super::kernels::ENTRY_POINT;
use super::ladder::{CommandQueue, Kernel, Owned, Program};
use crate::error::{ClCode, GemmError, Result};
use crate::opencl::query::fetch_string;
use crate::opencl::types::{cl_context, cl_program, CL_PROGRAM_BUILD_LOG};
use crate::opencl::{ClApi, Device};
use log::debug;

/// Очередь, программа и ядро одного устройства.
///
/// Поля удаляются в порядке объявления: ядро, программа, очередь.
pub struct CompiledKernel<'a, A: ClApi + ?Sized> {
    pub kernel: Owned<'a, A, Kernel>,
    pub program: Owned<'a, A, Program>,
    pub queue: Owned<'a, A, CommandQueue>,
}

/// Создаёт очередь, собирает программу из `source` для `device` и извлекает
/// точку входа `gemm`. При ошибке на любом шаге уже созданные объекты
/// освобождаются.
pub fn build<'a, A: ClApi + ?Sized>(
    api: &'a A,
    source: &str,
    device: Device,
    context: cl_context,
) -> Result<CompiledKernel<'a, A>> {
    let queue = api
        .create_command_queue(context, device.raw())
        .map_err(|code| GemmError::QueueCreateFailed { code: ClCode(code) })?;
    let queue = Owned::<A, CommandQueue>::new(api, queue);

    let program = api
        .create_program_with_source(context, source)
        .map_err(|code| GemmError::ProgramCreateFailed { code: ClCode(code) })?;
    let program = Owned::<A, Program>::new(api, program);

    if let Err(code) = api.build_program(program.raw(), device.raw()) {
        let log = build_log(api, program.raw(), device);
        debug!("gemm program build failed with {}", ClCode(code));
        return Err(GemmError::BuildFailed {
            code: ClCode(code),
            log,
        });
    }
    debug!("built gemm program for device {:p}", device.raw());

    let kernel = api
        .create_kernel(program.raw(), ENTRY_POINT)
        .map_err(|code| GemmError::KernelCreateFailed { code: ClCode(code) })?;
    let kernel = Owned::<A, Kernel>::new(api, kernel);

    Ok(CompiledKernel {
        kernel,
        program,
        queue,
    })
}

/// Лог сборки; если его нельзя получить, возвращается описание причины
pub fn build_log<A: ClApi + ?Sized>(api: &A, program: cl_program, device: Device) -> String {
    match fetch_string(|out| api.get_program_build_info(program, device.raw(), CL_PROGRAM_BUILD_LOG, out)) {
        Ok(log) if log.trim().is_empty() => "<build log is empty>".to_owned(),
        Ok(log) => log,
        Err(code) => format!("<build log unavailable: {}>", ClCode(code)),
    }
}
