//! Поиск всех вычислительных устройств на всех платформах

use super::api::ClApi;
use super::query::{fetch_string, fetch_vec};
use super::types::*;
use crate::error::{ClCode, GemmError, Result};
use log::{debug, info};
use std::ptr;

/// Идентификатор OpenCL-устройства.
///
/// Действителен до конца процесса и никогда не изменяется.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device(cl_device_id);

// Идентификаторы устройств OpenCL потокобезопасны
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    pub fn from_raw(id: cl_device_id) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> cl_device_id {
        self.0
    }

    /// Имя устройства (`CL_DEVICE_NAME`)
    pub fn name<A: ClApi + ?Sized>(&self, api: &A) -> Result<String> {
        fetch_string(|out| api.get_device_info(self.0, CL_DEVICE_NAME, out)).map_err(|code| {
            GemmError::InfoQueryFailed {
                param: "CL_DEVICE_NAME",
                code: ClCode(code),
            }
        })
    }
}

fn enumeration_failed(step: &'static str) -> impl Fn(cl_int) -> GemmError {
    move |code| GemmError::EnumerationFailed {
        step,
        code: ClCode(code),
    }
}

/// Список платформ; отсутствие ICD-платформ даёт пустой список
pub fn list_platforms<A: ClApi + ?Sized>(api: &A) -> Result<Vec<cl_platform_id>> {
    let init: cl_platform_id = ptr::null_mut();
    match fetch_vec(init, |out| api.get_platform_ids(out)) {
        Err(CL_PLATFORM_NOT_FOUND_KHR) => Ok(Vec::new()),
        other => other.map_err(enumeration_failed("clGetPlatformIDs")),
    }
}

/// Число устройств платформы; `CL_DEVICE_NOT_FOUND` означает ноль
fn platform_device_count<A: ClApi + ?Sized>(api: &A, platform: cl_platform_id) -> Result<usize> {
    match api.get_device_ids(platform, CL_DEVICE_TYPE_ALL, None) {
        Ok(count) => Ok(count),
        Err(CL_DEVICE_NOT_FOUND) => Ok(0),
        Err(code) => Err(enumeration_failed("clGetDeviceIDs (count)")(code)),
    }
}

/// Устройства одной платформы
pub fn platform_devices<A: ClApi + ?Sized>(api: &A, platform: cl_platform_id) -> Result<Vec<Device>> {
    let count = platform_device_count(api, platform)?;
    let mut ids = vec![ptr::null_mut(); count];
    if count > 0 {
        fill_platform(api, platform, &mut ids)?;
    }
    Ok(ids.into_iter().map(Device).collect())
}

fn fill_platform<A: ClApi + ?Sized>(
    api: &A,
    platform: cl_platform_id,
    slot: &mut [cl_device_id],
) -> Result<()> {
    let filled = api
        .get_device_ids(platform, CL_DEVICE_TYPE_ALL, Some(slot))
        .map_err(enumeration_failed("clGetDeviceIDs (fill)"))?;
    // Число устройств изменилось между запросами
    if filled != slot.len() {
        return Err(enumeration_failed("clGetDeviceIDs (fill)")(CL_INVALID_VALUE));
    }
    Ok(())
}

/// Все устройства всех платформ хоста.
///
/// Сначала суммируются количества устройств по платформам, затем один
/// плоский массив заполняется срезами: каждая платформа пишет с позиции,
/// равной числу уже записанных устройств. Любая ошибка отменяет поиск
/// целиком, частичный список не возвращается.
pub fn list_devices<A: ClApi + ?Sized>(api: &A) -> Result<Vec<Device>> {
    let platforms = list_platforms(api)?;
    debug!("found {} OpenCL platform(s)", platforms.len());

    let counts = platforms
        .iter()
        .map(|&platform| platform_device_count(api, platform))
        .collect::<Result<Vec<_>>>()?;
    let total: usize = counts.iter().sum();

    let mut ids: Vec<cl_device_id> = vec![ptr::null_mut(); total];
    let mut offset = 0;
    for (&platform, &count) in platforms.iter().zip(&counts) {
        if count == 0 {
            continue;
        }
        fill_platform(api, platform, &mut ids[offset..offset + count])?;
        offset += count;
    }

    info!("found {} OpenCL device(s) on {} platform(s)", total, platforms.len());
    Ok(ids.into_iter().map(Device).collect())
}
