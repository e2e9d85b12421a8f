//! Запуск GEMM на устройстве OpenCL
//!
//! Порядок одного запуска: сборка ядра, транспонирование B, буферы A, B, C,
//! аргументы ядра, запуск на сетке N x N с группами 8 x 8, блокирующее
//! чтение C после события завершения ядра, ожидание очереди. Все объекты
//! освобождаются в обратном порядке на любом пути выхода (см. `ladder`).

pub mod buffers;
pub mod builder;
pub mod kernels;
pub mod ladder;

pub use buffers::TransferMode;
pub use kernels::{KernelSource, GEMM_KERNEL};

use crate::error::{ClCode, GemmError, MatrixRole, Result};
use crate::matrix::Matrix;
use crate::opencl::types::{cl_context, cl_kernel, cl_mem, cl_uint};
use crate::opencl::{ClApi, Context, Device};
use buffers::{stage, Transposed};
use ladder::{Drain, Event, Owned};
use log::{debug, info};

/// Сторона рабочей группы
pub const TILE: usize = 8;

/// Геометрия запуска: глобальная сетка N x N, группы TILE x TILE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub global: [usize; 2],
    pub local: [usize; 2],
}

impl LaunchGeometry {
    /// Проверяет, что `size` положителен, кратен `tile` и помещается в `cl_uint`.
    /// Размер не обрезается и не дополняется.
    pub fn square(size: usize, tile: usize) -> Result<Self> {
        let invalid = GemmError::InvalidGeometry { size, tile };
        if tile == 0 || size == 0 || size % tile != 0 || cl_uint::try_from(size).is_err() {
            return Err(invalid);
        }
        Ok(Self {
            global: [size, size],
            local: [tile, tile],
        })
    }
}

/// Входные данные одного запуска.
///
/// A, B и C принадлежат вызывающему и должны быть одного размера.
/// B временно транспонируется на месте, поэтому заимствуется изменяемо.
pub struct Job<'m> {
    pub alpha: f32,
    pub beta: f32,
    pub a: &'m Matrix,
    pub b: &'m mut Matrix,
    pub c: &'m mut Matrix,
    pub device: Device,
    pub context: cl_context,
}

impl<'m> Job<'m> {
    pub fn new<A: ClApi + ?Sized>(
        alpha: f32,
        beta: f32,
        a: &'m Matrix,
        b: &'m mut Matrix,
        c: &'m mut Matrix,
        context: &Context<'_, A>,
    ) -> Self {
        Self {
            alpha,
            beta,
            a,
            b,
            c,
            device: context.device(),
            context: context.raw(),
        }
    }
}

/// Движок запуска GEMM поверх `ClApi`
pub struct Gemm<'a, A: ClApi + ?Sized> {
    api: &'a A,
    source: &'a str,
    transfer: TransferMode,
}

impl<'a, A: ClApi + ?Sized> Gemm<'a, A> {
    pub fn new(api: &'a A, source: &'a str) -> Self {
        Self {
            api,
            source,
            transfer: TransferMode::default(),
        }
    }

    pub fn transfer(mut self, mode: TransferMode) -> Self {
        self.transfer = mode;
        self
    }

    /// Вычисляет `C = beta * C + alpha * A * B` на устройстве задания.
    ///
    /// Размер, не кратный `TILE`, отклоняется до любого обращения к OpenCL.
    /// Ошибка любого шага возвращается один раз, без повторов; B в любом
    /// случае возвращается в исходной раскладке.
    ///
    /// # Panics
    ///
    /// Если A, B и C разного размера.
    pub fn dispatch(&self, job: Job<'_>) -> Result<()> {
        let Job {
            alpha,
            beta,
            a,
            b,
            c,
            device,
            context,
        } = job;
        assert!(
            a.size() == b.size() && b.size() == c.size(),
            "GEMM operands must share one size: A={}, B={}, C={}",
            a.size(),
            b.size(),
            c.size()
        );
        let n = c.size();
        let geometry = LaunchGeometry::square(n, TILE)?;
        info!("dispatching {n}x{n} GEMM on device {:p}", device.raw());

        let compiled = builder::build(self.api, self.source, device, context)?;

        let mut b = Transposed::new(b);
        let len = n * n;
        // Матрицы заимствованы заданием до конца вызова, а все буферы
        // освобождаются раньше, чем заимствование заканчивается
        let a_buf = unsafe {
            stage(self.api, context, a.data().as_ptr().cast_mut(), len, MatrixRole::A, self.transfer)?
        };
        let b_buf = unsafe { stage(self.api, context, b.as_mut_ptr(), len, MatrixRole::B, self.transfer)? };
        let c_buf = unsafe {
            stage(self.api, context, c.data_mut().as_mut_ptr(), len, MatrixRole::C, self.transfer)?
        };

        bind_arguments(
            self.api,
            compiled.kernel.raw(),
            alpha,
            beta,
            n as cl_uint,
            [a_buf.raw(), b_buf.raw(), c_buf.raw()],
        )?;

        let queue = compiled.queue.raw();
        let event = self
            .api
            .enqueue_nd_range_kernel(queue, compiled.kernel.raw(), &geometry.global, &geometry.local)
            .map_err(|code| GemmError::EnqueueFailed { code: ClCode(code) })?;
        let event = Owned::<A, Event>::new(self.api, event);
        let _drain = Drain::new(self.api, queue);
        debug!("gemm kernel enqueued");

        self.api
            .enqueue_read_buffer(queue, c_buf.raw(), c.data_mut(), &[event.raw()])
            .map_err(|code| GemmError::ReadbackFailed { code: ClCode(code) })?;
        debug!("result read back");
        Ok(())
    }
}

/// Аргументы ядра в фиксированном порядке: alpha, beta, K, A, B, C
fn bind_arguments<A: ClApi + ?Sized>(
    api: &A,
    kernel: cl_kernel,
    alpha: f32,
    beta: f32,
    k: cl_uint,
    buffers: [cl_mem; 3],
) -> Result<()> {
    let set = |index: cl_uint, value: &[u8]| {
        api.set_kernel_arg(kernel, index, value)
            .map_err(|code| GemmError::ArgumentBindFailed {
                index,
                code: ClCode(code),
            })
    };
    set(0, &alpha.to_ne_bytes())?;
    set(1, &beta.to_ne_bytes())?;
    set(2, &k.to_ne_bytes())?;
    for (index, mem) in (3..).zip(buffers) {
        set(index, &(mem as usize).to_ne_bytes())?;
    }
    Ok(())
}
