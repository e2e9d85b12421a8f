//! Интерфейс к OpenCL, через который проходят все вызовы крейта
//!
//! `OpenCl` вызывает настоящий ICD-загрузчик. Тесты подставляют свою
//! реализацию `ClApi` и считают живые объекты.

use super::bindings::Bindings;
use super::types::*;
use crate::error::GemmError;
use std::ffi::{c_void, CStr};
use std::ptr;

/// Подмножество OpenCL API, нужное конвейеру GEMM.
///
/// Запросы переменной длины (`Option<&mut [T]>`) работают в два шага:
/// `None` возвращает требуемый размер, `Some(buf)` заполняет буфер.
pub trait ClApi {
    fn get_platform_ids(&self, platforms: Option<&mut [cl_platform_id]>) -> Result<usize, cl_int>;

    fn get_platform_info(
        &self,
        platform: cl_platform_id,
        param: cl_platform_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int>;

    fn get_device_ids(
        &self,
        platform: cl_platform_id,
        device_type: cl_device_type,
        devices: Option<&mut [cl_device_id]>,
    ) -> Result<usize, cl_int>;

    fn get_device_info(
        &self,
        device: cl_device_id,
        param: cl_device_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int>;

    fn create_context(&self, device: cl_device_id) -> Result<cl_context, cl_int>;

    fn release_context(&self, context: cl_context) -> Result<(), cl_int>;

    fn create_command_queue(
        &self,
        context: cl_context,
        device: cl_device_id,
    ) -> Result<cl_command_queue, cl_int>;

    fn release_command_queue(&self, queue: cl_command_queue) -> Result<(), cl_int>;

    fn create_program_with_source(&self, context: cl_context, source: &str) -> Result<cl_program, cl_int>;

    /// Сборка программы ровно для одного устройства
    fn build_program(&self, program: cl_program, device: cl_device_id) -> Result<(), cl_int>;

    fn get_program_build_info(
        &self,
        program: cl_program,
        device: cl_device_id,
        param: cl_program_build_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int>;

    fn release_program(&self, program: cl_program) -> Result<(), cl_int>;

    fn create_kernel(&self, program: cl_program, name: &CStr) -> Result<cl_kernel, cl_int>;

    fn release_kernel(&self, kernel: cl_kernel) -> Result<(), cl_int>;

    /// Создаёт буфер размером `size` байт.
    ///
    /// # Safety
    ///
    /// С `CL_MEM_COPY_HOST_PTR` `host_ptr` должен указывать на `size`
    /// читаемых байт. С `CL_MEM_USE_HOST_PTR` память должна оставаться
    /// валидной и не изменяться хостом до освобождения буфера.
    unsafe fn create_buffer(
        &self,
        context: cl_context,
        flags: cl_mem_flags,
        size: usize,
        host_ptr: *mut c_void,
    ) -> Result<cl_mem, cl_int>;

    fn release_mem_object(&self, mem: cl_mem) -> Result<(), cl_int>;

    /// Аргумент ядра передаётся как байты значения (скаляр или `cl_mem`)
    fn set_kernel_arg(&self, kernel: cl_kernel, index: cl_uint, value: &[u8]) -> Result<(), cl_int>;

    /// Ставит ядро в очередь и возвращает событие завершения
    fn enqueue_nd_range_kernel(
        &self,
        queue: cl_command_queue,
        kernel: cl_kernel,
        global: &[usize],
        local: &[usize],
    ) -> Result<cl_event, cl_int>;

    /// Блокирующее чтение всего буфера в `dst` после событий `wait_list`
    fn enqueue_read_buffer(
        &self,
        queue: cl_command_queue,
        buffer: cl_mem,
        dst: &mut [f32],
        wait_list: &[cl_event],
    ) -> Result<(), cl_int>;

    fn finish(&self, queue: cl_command_queue) -> Result<(), cl_int>;

    fn release_event(&self, event: cl_event) -> Result<(), cl_int>;
}

/// Реализация `ClApi` поверх системного ICD-загрузчика
pub struct OpenCl {
    cl: Bindings,
}

impl OpenCl {
    /// Загружает библиотеку OpenCL
    pub fn load() -> Result<Self, GemmError> {
        let cl = Bindings::load().map_err(GemmError::RuntimeUnavailable)?;
        Ok(Self { cl })
    }
}

/// Разбирает необязательный выходной буфер на пару (ёмкость, указатель)
fn out_parts<T>(buf: Option<&mut [T]>) -> (usize, *mut T) {
    match buf {
        Some(buf) => (buf.len(), buf.as_mut_ptr()),
        None => (0, ptr::null_mut()),
    }
}

impl ClApi for OpenCl {
    fn get_platform_ids(&self, platforms: Option<&mut [cl_platform_id]>) -> Result<usize, cl_int> {
        let (len, out) = out_parts(platforms);
        let mut count: cl_uint = 0;
        cl_check!((self.cl.clGetPlatformIDs)(len as cl_uint, out, &mut count))?;
        Ok(count as usize)
    }

    fn get_platform_info(
        &self,
        platform: cl_platform_id,
        param: cl_platform_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int> {
        let (len, out) = out_parts(value);
        let mut size = 0usize;
        cl_check!((self.cl.clGetPlatformInfo)(platform, param, len, out.cast(), &mut size))?;
        Ok(size)
    }

    fn get_device_ids(
        &self,
        platform: cl_platform_id,
        device_type: cl_device_type,
        devices: Option<&mut [cl_device_id]>,
    ) -> Result<usize, cl_int> {
        let (len, out) = out_parts(devices);
        let mut count: cl_uint = 0;
        cl_check!((self.cl.clGetDeviceIDs)(platform, device_type, len as cl_uint, out, &mut count))?;
        Ok(count as usize)
    }

    fn get_device_info(
        &self,
        device: cl_device_id,
        param: cl_device_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int> {
        let (len, out) = out_parts(value);
        let mut size = 0usize;
        cl_check!((self.cl.clGetDeviceInfo)(device, param, len, out.cast(), &mut size))?;
        Ok(size)
    }

    fn create_context(&self, device: cl_device_id) -> Result<cl_context, cl_int> {
        cl_create!(
            self.cl.clCreateContext,
            ptr::null(),
            1,
            &device,
            None,
            ptr::null_mut()
        )
    }

    fn release_context(&self, context: cl_context) -> Result<(), cl_int> {
        cl_check!((self.cl.clReleaseContext)(context))
    }

    fn create_command_queue(
        &self,
        context: cl_context,
        device: cl_device_id,
    ) -> Result<cl_command_queue, cl_int> {
        cl_create!(self.cl.clCreateCommandQueue, context, device, 0)
    }

    fn release_command_queue(&self, queue: cl_command_queue) -> Result<(), cl_int> {
        cl_check!((self.cl.clReleaseCommandQueue)(queue))
    }

    fn create_program_with_source(&self, context: cl_context, source: &str) -> Result<cl_program, cl_int> {
        let text = source.as_ptr() as *const i8;
        let length = source.len();
        cl_create!(self.cl.clCreateProgramWithSource, context, 1, &text, &length)
    }

    fn build_program(&self, program: cl_program, device: cl_device_id) -> Result<(), cl_int> {
        cl_check!((self.cl.clBuildProgram)(
            program,
            1,
            &device,
            ptr::null(),
            None,
            ptr::null_mut()
        ))
    }

    fn get_program_build_info(
        &self,
        program: cl_program,
        device: cl_device_id,
        param: cl_program_build_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int> {
        let (len, out) = out_parts(value);
        let mut size = 0usize;
        cl_check!((self.cl.clGetProgramBuildInfo)(program, device, param, len, out.cast(), &mut size))?;
        Ok(size)
    }

    fn release_program(&self, program: cl_program) -> Result<(), cl_int> {
        cl_check!((self.cl.clReleaseProgram)(program))
    }

    fn create_kernel(&self, program: cl_program, name: &CStr) -> Result<cl_kernel, cl_int> {
        cl_create!(self.cl.clCreateKernel, program, name.as_ptr() as *const i8)
    }

    fn release_kernel(&self, kernel: cl_kernel) -> Result<(), cl_int> {
        cl_check!((self.cl.clReleaseKernel)(kernel))
    }

    unsafe fn create_buffer(
        &self,
        context: cl_context,
        flags: cl_mem_flags,
        size: usize,
        host_ptr: *mut c_void,
    ) -> Result<cl_mem, cl_int> {
        cl_create!(self.cl.clCreateBuffer, context, flags, size, host_ptr)
    }

    fn release_mem_object(&self, mem: cl_mem) -> Result<(), cl_int> {
        cl_check!((self.cl.clReleaseMemObject)(mem))
    }

    fn set_kernel_arg(&self, kernel: cl_kernel, index: cl_uint, value: &[u8]) -> Result<(), cl_int> {
        cl_check!((self.cl.clSetKernelArg)(
            kernel,
            index,
            value.len(),
            value.as_ptr() as *const c_void
        ))
    }

    fn enqueue_nd_range_kernel(
        &self,
        queue: cl_command_queue,
        kernel: cl_kernel,
        global: &[usize],
        local: &[usize],
    ) -> Result<cl_event, cl_int> {
        if global.len() != local.len() {
            return Err(CL_INVALID_WORK_DIMENSION);
        }
        let mut event: cl_event = ptr::null_mut();
        cl_check!((self.cl.clEnqueueNDRangeKernel)(
            queue,
            kernel,
            global.len() as cl_uint,
            ptr::null(),
            global.as_ptr(),
            local.as_ptr(),
            0,
            ptr::null(),
            &mut event
        ))?;
        Ok(event)
    }

    fn enqueue_read_buffer(
        &self,
        queue: cl_command_queue,
        buffer: cl_mem,
        dst: &mut [f32],
        wait_list: &[cl_event],
    ) -> Result<(), cl_int> {
        let waits = if wait_list.is_empty() { ptr::null() } else { wait_list.as_ptr() };
        cl_check!((self.cl.clEnqueueReadBuffer)(
            queue,
            buffer,
            CL_TRUE,
            0,
            std::mem::size_of_val(dst),
            dst.as_mut_ptr() as *mut c_void,
            wait_list.len() as cl_uint,
            waits,
            ptr::null_mut()
        ))
    }

    fn finish(&self, queue: cl_command_queue) -> Result<(), cl_int> {
        cl_check!((self.cl.clFinish)(queue))
    }

    fn release_event(&self, event: cl_event) -> Result<(), cl_int> {
        cl_check!((self.cl.clReleaseEvent)(event))
    }
}
