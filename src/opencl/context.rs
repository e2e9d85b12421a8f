//! Контекст OpenCL для одного устройства

use super::api::ClApi;
use super::device::Device;
use super::types::cl_context;
use crate::error::{ClCode, GemmError, Result};
use log::{debug, warn};

/// Владеет `cl_context` одного устройства и освобождает его при удалении.
///
/// Все очереди, программы и буферы одного запуска GEMM создаются в нём
/// и освобождаются раньше него.
pub struct Context<'a, A: ClApi + ?Sized> {
    api: &'a A,
    raw: cl_context,
    device: Device,
}

impl<'a, A: ClApi + ?Sized> Context<'a, A> {
    pub fn create(api: &'a A, device: Device) -> Result<Self> {
        let raw = api
            .create_context(device.raw())
            .map_err(|code| GemmError::ContextCreateFailed { code: ClCode(code) })?;
        debug!("created context {raw:p} for device {:p}", device.raw());
        Ok(Self { api, raw, device })
    }

    pub fn raw(&self) -> cl_context {
        self.raw
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl<A: ClApi + ?Sized> Drop for Context<'_, A> {
    fn drop(&mut self) {
        if let Err(code) = self.api.release_context(self.raw) {
            warn!("failed to release context: {}", ClCode(code));
        }
    }
}
