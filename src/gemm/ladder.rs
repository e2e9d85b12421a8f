//! Упорядоченное освобождение ресурсов OpenCL
//!
//! Каждый объект оборачивается в `Owned` сразу после создания. Rust
//! удаляет локальные переменные в порядке, обратном объявлению, поэтому
//! при любом выходе из функции (успех, `?`, паника) ресурсы освобождаются
//! в порядке, обратном захвату, и только те, что успели создать.

use crate::error::ClCode;
use crate::opencl::types::*;
use crate::opencl::ClApi;
use log::{trace, warn};
use std::marker::PhantomData;

/// Вид объекта OpenCL и способ его освобождения
pub trait Resource {
    type Raw: Copy + std::fmt::Pointer;
    const KIND: &'static str;

    fn release<A: ClApi + ?Sized>(api: &A, raw: Self::Raw) -> Result<(), cl_int>;
}

pub enum CommandQueue {}
pub enum Program {}
pub enum Kernel {}
pub enum MemObject {}
pub enum Event {}

impl Resource for CommandQueue {
    type Raw = cl_command_queue;
    const KIND: &'static str = "command queue";

    /// Очередь опустошается перед уничтожением
    fn release<A: ClApi + ?Sized>(api: &A, raw: Self::Raw) -> Result<(), cl_int> {
        let drained = api.finish(raw);
        api.release_command_queue(raw)?;
        drained
    }
}

impl Resource for Program {
    type Raw = cl_program;
    const KIND: &'static str = "program";

    fn release<A: ClApi + ?Sized>(api: &A, raw: Self::Raw) -> Result<(), cl_int> {
        api.release_program(raw)
    }
}

impl Resource for Kernel {
    type Raw = cl_kernel;
    const KIND: &'static str = "kernel";

    fn release<A: ClApi + ?Sized>(api: &A, raw: Self::Raw) -> Result<(), cl_int> {
        api.release_kernel(raw)
    }
}

impl Resource for MemObject {
    type Raw = cl_mem;
    const KIND: &'static str = "buffer";

    fn release<A: ClApi + ?Sized>(api: &A, raw: Self::Raw) -> Result<(), cl_int> {
        api.release_mem_object(raw)
    }
}

impl Resource for Event {
    type Raw = cl_event;
    const KIND: &'static str = "event";

    fn release<A: ClApi + ?Sized>(api: &A, raw: Self::Raw) -> Result<(), cl_int> {
        api.release_event(raw)
    }
}

/// Объект OpenCL, освобождаемый при удалении
pub struct Owned<'a, A: ClApi + ?Sized, R: Resource> {
    api: &'a A,
    raw: R::Raw,
    _kind: PhantomData<R>,
}

impl<'a, A: ClApi + ?Sized, R: Resource> Owned<'a, A, R> {
    pub fn new(api: &'a A, raw: R::Raw) -> Self {
        trace!("acquired {} {:p}", R::KIND, raw);
        Self {
            api,
            raw,
            _kind: PhantomData,
        }
    }

    pub fn raw(&self) -> R::Raw {
        self.raw
    }
}

impl<A: ClApi + ?Sized, R: Resource> Drop for Owned<'_, A, R> {
    fn drop(&mut self) {
        match R::release(self.api, self.raw) {
            Ok(()) => trace!("released {} {:p}", R::KIND, self.raw),
            Err(code) => warn!("failed to release {} {:p}: {}", R::KIND, self.raw, ClCode(code)),
        }
    }
}

/// Ожидает завершения всех команд очереди при удалении.
///
/// Создаётся сразу после постановки ядра в очередь, поэтому устройство
/// заканчивает работу раньше, чем освобождаются буферы и раньше, чем B
/// возвращается к исходной раскладке.
pub struct Drain<'a, A: ClApi + ?Sized> {
    api: &'a A,
    queue: cl_command_queue,
}

impl<'a, A: ClApi + ?Sized> Drain<'a, A> {
    pub fn new(api: &'a A, queue: cl_command_queue) -> Self {
        Self { api, queue }
    }
}

impl<A: ClApi + ?Sized> Drop for Drain<'_, A> {
    fn drop(&mut self) {
        if let Err(code) = self.api.finish(self.queue) {
            warn!("failed to drain queue {:p}: {}", self.queue, ClCode(code));
        }
    }
}
