//! Поддельная реализация `ClApi` для интеграционных тестов
//!
//! Выдаёт фиктивные дескрипторы, считает живые объекты, умеет падать на
//! заданном шаге и исполняет ядро GEMM на CPU при постановке в очередь.

#![allow(dead_code)]

use opencl_gemm::opencl::types::*;
use opencl_gemm::ClApi;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::ffi::{c_void, CStr};

pub const BUILD_LOG: &str = "<kernel>:7:22: error: use of undeclared identifier 'acc'";

/// Шаг, на котором подделка вернёт ошибку
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fail {
    PlatformIds(cl_int),
    DeviceCount { platform: usize, code: cl_int },
    DeviceFill { platform: usize, code: cl_int },
    /// Платформа сообщает на одно устройство больше при заполнении
    DeviceGrowth { platform: usize },
    DeviceName,
    Context,
    Queue,
    Program,
    Build,
    Kernel,
    /// Создание n-го по счёту буфера (0 = A, 1 = B, 2 = C)
    Buffer(usize),
    SetArg(cl_uint),
    Enqueue,
    Read,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Context,
    Queue,
    Program,
    Kernel,
    Buffer,
    Event,
}

/// Запись журнала вызовов
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(Kind),
    Build,
    SetArg(cl_uint),
    Enqueue,
    Read,
    Finish,
    /// Освобождение; для буферов хранится номер в порядке создания
    Release(Kind, Option<usize>),
}

enum Storage {
    Copied(Vec<f32>),
    Aliased(*mut f32, usize),
}

impl Storage {
    fn read(&self) -> Vec<f32> {
        match self {
            Self::Copied(data) => data.clone(),
            Self::Aliased(ptr, len) => unsafe { std::slice::from_raw_parts(*ptr, *len).to_vec() },
        }
    }

    fn write(&mut self, values: &[f32]) {
        match self {
            Self::Copied(data) => data.copy_from_slice(values),
            Self::Aliased(ptr, len) => {
                assert_eq!(*len, values.len());
                unsafe { std::ptr::copy_nonoverlapping(values.as_ptr(), *ptr, *len) }
            }
        }
    }
}

struct Buffer {
    ordinal: usize,
    storage: Storage,
}

#[derive(Default)]
struct State {
    next_handle: usize,
    live: BTreeMap<usize, Kind>,
    failures: HashSet<Fail>,
    calls: Vec<Call>,
    buffers: BTreeMap<usize, Buffer>,
    buffers_created: usize,
    /// Флаги созданных буферов; освобождение их не стирает
    created_flags: Vec<cl_mem_flags>,
    args: BTreeMap<cl_uint, Vec<u8>>,
    sources: Vec<String>,
    failed_programs: HashSet<usize>,
    launches: Vec<([usize; 2], [usize; 2])>,
    read_wait_lists: Vec<Vec<cl_event>>,
}

#[derive(Debug, Clone)]
pub struct MockPlatform {
    pub name: String,
    pub devices: Vec<String>,
}

pub struct MockCl {
    platforms: Vec<MockPlatform>,
    state: RefCell<State>,
}

const PLATFORM_BASE: usize = 0x100;
const DEVICE_BASE: usize = 0x1_0000;
const HANDLE_BASE: usize = 0x100_0000;

fn as_handle(value: usize) -> *mut c_void {
    value as *mut c_void
}

/// Двухфазный ответ на запрос свойства
fn answer(bytes: &[u8], out: Option<&mut [u8]>) -> Result<usize, cl_int> {
    if let Some(out) = out {
        if out.len() < bytes.len() {
            return Err(CL_INVALID_VALUE);
        }
        out[..bytes.len()].copy_from_slice(bytes);
    }
    Ok(bytes.len())
}

fn text(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

impl MockCl {
    /// Одна платформа с одним устройством
    pub fn new() -> Self {
        Self::with_platforms(&[&["Mock GPU"]])
    }

    /// Платформы с заданными именами устройств
    pub fn with_platforms(platforms: &[&[&str]]) -> Self {
        let platforms = platforms
            .iter()
            .enumerate()
            .map(|(index, devices)| MockPlatform {
                name: format!("Mock Platform {index}"),
                devices: devices.iter().map(|name| name.to_string()).collect(),
            })
            .collect();
        Self {
            platforms,
            state: RefCell::new(State {
                next_handle: HANDLE_BASE,
                ..State::default()
            }),
        }
    }

    pub fn fail(self, step: Fail) -> Self {
        self.state.borrow_mut().failures.insert(step);
        self
    }

    pub fn platform_handle(index: usize) -> cl_platform_id {
        as_handle(PLATFORM_BASE + index)
    }

    pub fn device_handle(platform: usize, index: usize) -> cl_device_id {
        as_handle(DEVICE_BASE + platform * 0x100 + index)
    }

    /// Первое устройство первой платформы
    pub fn first_device(&self) -> opencl_gemm::Device {
        opencl_gemm::Device::from_raw(Self::device_handle(0, 0))
    }

    pub fn live(&self, kind: Kind) -> usize {
        self.state.borrow().live.values().filter(|&&k| k == kind).count()
    }

    pub fn live_total(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Флаги буферов в порядке создания
    pub fn buffer_flags(&self) -> Vec<cl_mem_flags> {
        self.state.borrow().created_flags.clone()
    }

    pub fn launches(&self) -> Vec<([usize; 2], [usize; 2])> {
        self.state.borrow().launches.clone()
    }

    pub fn read_wait_lists(&self) -> Vec<Vec<cl_event>> {
        self.state.borrow().read_wait_lists.clone()
    }

    pub fn arg(&self, index: cl_uint) -> Option<Vec<u8>> {
        self.state.borrow().args.get(&index).cloned()
    }

    pub fn sources(&self) -> Vec<String> {
        self.state.borrow().sources.clone()
    }

    fn failing(&self, step: Fail) -> bool {
        self.state.borrow().failures.contains(&step)
    }

    fn acquire(&self, kind: Kind) -> usize {
        let mut state = self.state.borrow_mut();
        let handle = state.next_handle;
        state.next_handle += 0x10;
        state.live.insert(handle, kind);
        state.calls.push(Call::Create(kind));
        handle
    }

    fn is_live(&self, handle: *mut c_void, kind: Kind) -> bool {
        self.state.borrow().live.get(&(handle as usize)) == Some(&kind)
    }

    fn release(&self, handle: *mut c_void, kind: Kind, invalid: cl_int) -> Result<(), cl_int> {
        let mut state = self.state.borrow_mut();
        let handle = handle as usize;
        if state.live.get(&handle) != Some(&kind) {
            return Err(invalid);
        }
        state.live.remove(&handle);
        let ordinal = match kind {
            Kind::Buffer => state.buffers.remove(&handle).map(|b| b.ordinal),
            _ => None,
        };
        state.calls.push(Call::Release(kind, ordinal));
        if state.failures.contains(&Fail::Release) {
            return Err(CL_OUT_OF_RESOURCES);
        }
        Ok(())
    }

    fn platform_index(&self, platform: cl_platform_id) -> Option<usize> {
        (platform as usize)
            .checked_sub(PLATFORM_BASE)
            .filter(|&index| index < self.platforms.len())
    }

    fn device_name(&self, device: cl_device_id) -> Option<&str> {
        let offset = (device as usize).checked_sub(DEVICE_BASE)?;
        let platform = self.platforms.get(offset / 0x100)?;
        platform.devices.get(offset % 0x100).map(String::as_str)
    }

    fn buffer_data(&self, mem: cl_mem) -> Result<Vec<f32>, cl_int> {
        let state = self.state.borrow();
        state
            .buffers
            .get(&(mem as usize))
            .map(|b| b.storage.read())
            .ok_or(CL_INVALID_MEM_OBJECT)
    }

    fn arg_value(&self, index: cl_uint) -> Result<Vec<u8>, cl_int> {
        self.arg(index).ok_or(CL_INVALID_KERNEL_ARGS)
    }

    fn arg_mem(&self, index: cl_uint) -> Result<cl_mem, cl_int> {
        let bytes = self.arg_value(index)?;
        let bytes: [u8; std::mem::size_of::<usize>()] = bytes.try_into().map_err(|_| CL_INVALID_ARG_SIZE)?;
        Ok(as_handle(usize::from_ne_bytes(bytes)))
    }

    fn arg_f32(&self, index: cl_uint) -> Result<f32, cl_int> {
        let bytes: [u8; 4] = self.arg_value(index)?.try_into().map_err(|_| CL_INVALID_ARG_SIZE)?;
        Ok(f32::from_ne_bytes(bytes))
    }

    /// Семантика ядра `gemm`: B передан транспонированным
    fn run_kernel(&self, n: usize) -> Result<(), cl_int> {
        let alpha = self.arg_f32(0)?;
        let beta = self.arg_f32(1)?;
        let k: [u8; 4] = self.arg_value(2)?.try_into().map_err(|_| CL_INVALID_ARG_SIZE)?;
        let k = u32::from_ne_bytes(k) as usize;
        let a = self.buffer_data(self.arg_mem(3)?)?;
        let b = self.buffer_data(self.arg_mem(4)?)?;
        let c_mem = self.arg_mem(5)?;
        let mut c = self.buffer_data(c_mem)?;

        for row in 0..n {
            for col in 0..n {
                let acc: f32 = (0..k).map(|i| a[row * k + i] * b[col * k + i]).sum();
                let idx = row * n + col;
                c[idx] = beta * c[idx] + alpha * acc;
            }
        }

        let mut state = self.state.borrow_mut();
        let buffer = state.buffers.get_mut(&(c_mem as usize)).ok_or(CL_INVALID_MEM_OBJECT)?;
        buffer.storage.write(&c);
        Ok(())
    }
}

impl ClApi for MockCl {
    fn get_platform_ids(&self, platforms: Option<&mut [cl_platform_id]>) -> Result<usize, cl_int> {
        if let Some(code) = self.state.borrow().failures.iter().find_map(|f| match f {
            Fail::PlatformIds(code) => Some(*code),
            _ => None,
        }) {
            return Err(code);
        }
        if self.platforms.is_empty() {
            return Err(CL_PLATFORM_NOT_FOUND_KHR);
        }
        if let Some(out) = platforms {
            for (index, slot) in out.iter_mut().enumerate().take(self.platforms.len()) {
                *slot = Self::platform_handle(index);
            }
        }
        Ok(self.platforms.len())
    }

    fn get_platform_info(
        &self,
        platform: cl_platform_id,
        param: cl_platform_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int> {
        let index = self.platform_index(platform).ok_or(CL_INVALID_PLATFORM)?;
        let bytes = match param {
            CL_PLATFORM_NAME => text(&self.platforms[index].name),
            CL_PLATFORM_VENDOR => text("Mock Vendor"),
            CL_PLATFORM_VERSION => text("OpenCL 1.2 mock"),
            CL_PLATFORM_PROFILE => text("FULL_PROFILE"),
            CL_PLATFORM_EXTENSIONS => text("cl_khr_icd cl_khr_fp64 "),
            _ => return Err(CL_INVALID_VALUE),
        };
        answer(&bytes, value)
    }

    fn get_device_ids(
        &self,
        platform: cl_platform_id,
        device_type: cl_device_type,
        devices: Option<&mut [cl_device_id]>,
    ) -> Result<usize, cl_int> {
        let index = self.platform_index(platform).ok_or(CL_INVALID_PLATFORM)?;
        if device_type != CL_DEVICE_TYPE_ALL {
            return Err(CL_INVALID_DEVICE_TYPE);
        }
        let filling = devices.is_some();
        for fail in self.state.borrow().failures.iter() {
            match *fail {
                Fail::DeviceCount { platform, code } if platform == index && !filling => return Err(code),
                Fail::DeviceFill { platform, code } if platform == index && filling => return Err(code),
                _ => {}
            }
        }
        let count = self.platforms[index].devices.len();
        if count == 0 {
            return Err(CL_DEVICE_NOT_FOUND);
        }
        match devices {
            Some(out) => {
                for (slot, device) in out.iter_mut().zip(0..count) {
                    *slot = Self::device_handle(index, device);
                }
                if self.failing(Fail::DeviceGrowth { platform: index }) {
                    return Ok(count + 1);
                }
                Ok(count)
            }
            None => Ok(count),
        }
    }

    fn get_device_info(
        &self,
        device: cl_device_id,
        param: cl_device_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int> {
        let name = self.device_name(device).ok_or(CL_INVALID_DEVICE)?;
        let bytes = match param {
            CL_DEVICE_NAME if self.failing(Fail::DeviceName) => return Err(CL_OUT_OF_HOST_MEMORY),
            CL_DEVICE_NAME => text(name),
            CL_DEVICE_VERSION => text("OpenCL 1.2 mock"),
            CL_DEVICE_MAX_COMPUTE_UNITS => 16u32.to_ne_bytes().to_vec(),
            CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS => 3u32.to_ne_bytes().to_vec(),
            CL_DEVICE_MAX_WORK_ITEM_SIZES => [1024usize, 1024, 64].iter().flat_map(|s| s.to_ne_bytes()).collect(),
            CL_DEVICE_MAX_WORK_GROUP_SIZE => 256usize.to_ne_bytes().to_vec(),
            CL_DEVICE_COMPILER_AVAILABLE => CL_TRUE.to_ne_bytes().to_vec(),
            CL_DEVICE_LINKER_AVAILABLE => CL_FALSE.to_ne_bytes().to_vec(),
            _ => return Err(CL_INVALID_VALUE),
        };
        answer(&bytes, value)
    }

    fn create_context(&self, device: cl_device_id) -> Result<cl_context, cl_int> {
        if self.device_name(device).is_none() {
            return Err(CL_INVALID_DEVICE);
        }
        if self.failing(Fail::Context) {
            return Err(CL_OUT_OF_HOST_MEMORY);
        }
        Ok(as_handle(self.acquire(Kind::Context)))
    }

    fn release_context(&self, context: cl_context) -> Result<(), cl_int> {
        self.release(context, Kind::Context, CL_INVALID_CONTEXT)
    }

    fn create_command_queue(
        &self,
        context: cl_context,
        device: cl_device_id,
    ) -> Result<cl_command_queue, cl_int> {
        if !self.is_live(context, Kind::Context) {
            return Err(CL_INVALID_CONTEXT);
        }
        if self.device_name(device).is_none() {
            return Err(CL_INVALID_DEVICE);
        }
        if self.failing(Fail::Queue) {
            return Err(CL_OUT_OF_RESOURCES);
        }
        Ok(as_handle(self.acquire(Kind::Queue)))
    }

    fn release_command_queue(&self, queue: cl_command_queue) -> Result<(), cl_int> {
        self.release(queue, Kind::Queue, CL_INVALID_COMMAND_QUEUE)
    }

    fn create_program_with_source(&self, context: cl_context, source: &str) -> Result<cl_program, cl_int> {
        if !self.is_live(context, Kind::Context) {
            return Err(CL_INVALID_CONTEXT);
        }
        if source.is_empty() {
            return Err(CL_INVALID_VALUE);
        }
        if self.failing(Fail::Program) {
            return Err(CL_OUT_OF_HOST_MEMORY);
        }
        self.state.borrow_mut().sources.push(source.to_owned());
        Ok(as_handle(self.acquire(Kind::Program)))
    }

    fn build_program(&self, program: cl_program, device: cl_device_id) -> Result<(), cl_int> {
        if !self.is_live(program, Kind::Program) {
            return Err(CL_INVALID_PROGRAM);
        }
        if self.device_name(device).is_none() {
            return Err(CL_INVALID_DEVICE);
        }
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Build);
        let has_entry = state.sources.last().is_some_and(|s| s.contains("__kernel void gemm("));
        if state.failures.contains(&Fail::Build) || !has_entry {
            state.failed_programs.insert(program as usize);
            return Err(CL_BUILD_PROGRAM_FAILURE);
        }
        Ok(())
    }

    fn get_program_build_info(
        &self,
        program: cl_program,
        device: cl_device_id,
        param: cl_program_build_info,
        value: Option<&mut [u8]>,
    ) -> Result<usize, cl_int> {
        if !self.is_live(program, Kind::Program) {
            return Err(CL_INVALID_PROGRAM);
        }
        if self.device_name(device).is_none() {
            return Err(CL_INVALID_DEVICE);
        }
        if param != CL_PROGRAM_BUILD_LOG {
            return Err(CL_INVALID_VALUE);
        }
        let failed = self.state.borrow().failed_programs.contains(&(program as usize));
        let log = if failed { text(BUILD_LOG) } else { text("") };
        answer(&log, value)
    }

    fn release_program(&self, program: cl_program) -> Result<(), cl_int> {
        self.release(program, Kind::Program, CL_INVALID_PROGRAM)
    }

    fn create_kernel(&self, program: cl_program, name: &CStr) -> Result<cl_kernel, cl_int> {
        if !self.is_live(program, Kind::Program) {
            return Err(CL_INVALID_PROGRAM);
        }
        if name.to_bytes() != b"gemm" {
            return Err(CL_INVALID_KERNEL_NAME);
        }
        if self.failing(Fail::Kernel) {
            return Err(CL_OUT_OF_RESOURCES);
        }
        Ok(as_handle(self.acquire(Kind::Kernel)))
    }

    fn release_kernel(&self, kernel: cl_kernel) -> Result<(), cl_int> {
        self.release(kernel, Kind::Kernel, CL_INVALID_KERNEL)
    }

    unsafe fn create_buffer(
        &self,
        context: cl_context,
        flags: cl_mem_flags,
        size: usize,
        host_ptr: *mut c_void,
    ) -> Result<cl_mem, cl_int> {
        if !self.is_live(context, Kind::Context) {
            return Err(CL_INVALID_CONTEXT);
        }
        if size == 0 {
            return Err(CL_INVALID_BUFFER_SIZE);
        }
        if host_ptr.is_null() {
            return Err(CL_INVALID_HOST_PTR);
        }
        let ordinal = {
            let mut state = self.state.borrow_mut();
            let ordinal = state.buffers_created;
            state.buffers_created += 1;
            ordinal
        };
        if self.failing(Fail::Buffer(ordinal)) {
            return Err(CL_MEM_OBJECT_ALLOCATION_FAILURE);
        }
        let len = size / std::mem::size_of::<f32>();
        let host = host_ptr.cast::<f32>();
        let storage = if flags & CL_MEM_USE_HOST_PTR != 0 {
            Storage::Aliased(host, len)
        } else if flags & CL_MEM_COPY_HOST_PTR != 0 {
            Storage::Copied(std::slice::from_raw_parts(host, len).to_vec())
        } else {
            return Err(CL_INVALID_HOST_PTR);
        };
        let handle = self.acquire(Kind::Buffer);
        let mut state = self.state.borrow_mut();
        state.created_flags.push(flags);
        state.buffers.insert(handle, Buffer { ordinal, storage });
        Ok(as_handle(handle))
    }

    fn release_mem_object(&self, mem: cl_mem) -> Result<(), cl_int> {
        self.release(mem, Kind::Buffer, CL_INVALID_MEM_OBJECT)
    }

    fn set_kernel_arg(&self, kernel: cl_kernel, index: cl_uint, value: &[u8]) -> Result<(), cl_int> {
        if !self.is_live(kernel, Kind::Kernel) {
            return Err(CL_INVALID_KERNEL);
        }
        if index > 5 {
            return Err(CL_INVALID_ARG_INDEX);
        }
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::SetArg(index));
        if state.failures.contains(&Fail::SetArg(index)) {
            return Err(CL_INVALID_ARG_VALUE);
        }
        state.args.insert(index, value.to_vec());
        Ok(())
    }

    fn enqueue_nd_range_kernel(
        &self,
        queue: cl_command_queue,
        kernel: cl_kernel,
        global: &[usize],
        local: &[usize],
    ) -> Result<cl_event, cl_int> {
        if !self.is_live(queue, Kind::Queue) {
            return Err(CL_INVALID_COMMAND_QUEUE);
        }
        if !self.is_live(kernel, Kind::Kernel) {
            return Err(CL_INVALID_KERNEL);
        }
        let (&[gx, gy], &[lx, ly]) = (global, local) else {
            return Err(CL_INVALID_WORK_DIMENSION);
        };
        if lx == 0 || ly == 0 || gx % lx != 0 || gy % ly != 0 {
            return Err(CL_INVALID_WORK_GROUP_SIZE);
        }
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::Enqueue);
            state.launches.push(([gx, gy], [lx, ly]));
        }
        if self.failing(Fail::Enqueue) {
            return Err(CL_OUT_OF_RESOURCES);
        }
        self.run_kernel(gx)?;
        Ok(as_handle(self.acquire(Kind::Event)))
    }

    fn enqueue_read_buffer(
        &self,
        queue: cl_command_queue,
        buffer: cl_mem,
        dst: &mut [f32],
        wait_list: &[cl_event],
    ) -> Result<(), cl_int> {
        if !self.is_live(queue, Kind::Queue) {
            return Err(CL_INVALID_COMMAND_QUEUE);
        }
        if wait_list.iter().any(|&event| !self.is_live(event, Kind::Event)) {
            return Err(CL_INVALID_EVENT_WAIT_LIST);
        }
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::Read);
            state.read_wait_lists.push(wait_list.to_vec());
            if state.failures.contains(&Fail::Read) {
                return Err(CL_OUT_OF_RESOURCES);
            }
        }
        let state = self.state.borrow();
        let source = state.buffers.get(&(buffer as usize)).ok_or(CL_INVALID_MEM_OBJECT)?;
        match &source.storage {
            // Буфер и есть `dst`: читать нечего
            Storage::Aliased(ptr, _) if *ptr == dst.as_mut_ptr() => {}
            storage => {
                let data = storage.read();
                if data.len() != dst.len() {
                    return Err(CL_INVALID_VALUE);
                }
                dst.copy_from_slice(&data);
            }
        }
        Ok(())
    }

    fn finish(&self, queue: cl_command_queue) -> Result<(), cl_int> {
        if !self.is_live(queue, Kind::Queue) {
            return Err(CL_INVALID_COMMAND_QUEUE);
        }
        self.state.borrow_mut().calls.push(Call::Finish);
        Ok(())
    }

    fn release_event(&self, event: cl_event) -> Result<(), cl_int> {
        self.release(event, Kind::Event, CL_INVALID_EVENT)
    }
}
