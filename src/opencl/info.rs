//! Сведения о платформах и устройствах для отчётов

use super::api::ClApi;
use super::device::{list_platforms, platform_devices, Device};
use super::query::{fetch_sizes, fetch_string, fetch_u32, fetch_usize};
use super::types::*;
use crate::error::{ClCode, GemmError, Result};
use prettytable::{row, Table};

fn query_failed(param: &'static str) -> impl Fn(cl_int) -> GemmError {
    move |code| GemmError::InfoQueryFailed {
        param,
        code: ClCode(code),
    }
}

/// Свойства платформы
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub profile: String,
    pub extensions: Vec<String>,
}

impl PlatformInfo {
    pub fn query<A: ClApi + ?Sized>(api: &A, platform: cl_platform_id) -> Result<Self> {
        let text = |param, label| {
            fetch_string(|out| api.get_platform_info(platform, param, out)).map_err(query_failed(label))
        };
        Ok(Self {
            name: text(CL_PLATFORM_NAME, "CL_PLATFORM_NAME")?,
            vendor: text(CL_PLATFORM_VENDOR, "CL_PLATFORM_VENDOR")?,
            version: text(CL_PLATFORM_VERSION, "CL_PLATFORM_VERSION")?,
            profile: text(CL_PLATFORM_PROFILE, "CL_PLATFORM_PROFILE")?,
            extensions: text(CL_PLATFORM_EXTENSIONS, "CL_PLATFORM_EXTENSIONS")?
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
        })
    }
}

/// Свойства устройства
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub version: String,
    pub compute_units: u32,
    pub max_work_item_dimensions: u32,
    pub max_work_item_sizes: Vec<usize>,
    pub max_work_group_size: usize,
    pub compiler_available: bool,
    pub linker_available: bool,
}

impl DeviceInfo {
    pub fn query<A: ClApi + ?Sized>(api: &A, device: Device) -> Result<Self> {
        let raw = device.raw();
        let info = |param| move |out: Option<&mut [u8]>| api.get_device_info(raw, param, out);
        Ok(Self {
            name: fetch_string(info(CL_DEVICE_NAME)).map_err(query_failed("CL_DEVICE_NAME"))?,
            version: fetch_string(info(CL_DEVICE_VERSION)).map_err(query_failed("CL_DEVICE_VERSION"))?,
            compute_units: fetch_u32(info(CL_DEVICE_MAX_COMPUTE_UNITS))
                .map_err(query_failed("CL_DEVICE_MAX_COMPUTE_UNITS"))?,
            max_work_item_dimensions: fetch_u32(info(CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS))
                .map_err(query_failed("CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS"))?,
            max_work_item_sizes: fetch_sizes(info(CL_DEVICE_MAX_WORK_ITEM_SIZES))
                .map_err(query_failed("CL_DEVICE_MAX_WORK_ITEM_SIZES"))?,
            max_work_group_size: fetch_usize(info(CL_DEVICE_MAX_WORK_GROUP_SIZE))
                .map_err(query_failed("CL_DEVICE_MAX_WORK_GROUP_SIZE"))?,
            compiler_available: fetch_u32(info(CL_DEVICE_COMPILER_AVAILABLE))
                .map_err(query_failed("CL_DEVICE_COMPILER_AVAILABLE"))?
                != CL_FALSE,
            linker_available: fetch_u32(info(CL_DEVICE_LINKER_AVAILABLE))
                .map_err(query_failed("CL_DEVICE_LINKER_AVAILABLE"))?
                != CL_FALSE,
        })
    }

    /// Таблица «свойство / значение»
    pub fn table(&self) -> Table {
        let sizes = self
            .max_work_item_sizes
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut table = Table::new();
        table.add_row(row!["Device name", self.name]);
        table.add_row(row!["Device version", self.version]);
        table.add_row(row!["Compute units", self.compute_units]);
        table.add_row(row!["Max work-item dimensions", self.max_work_item_dimensions]);
        table.add_row(row!["Max work-item sizes", sizes]);
        table.add_row(row!["Max work-group size", self.max_work_group_size]);
        table.add_row(row!["Compiler available", self.compiler_available]);
        table.add_row(row!["Linker available", self.linker_available]);
        table
    }
}

/// Платформа вместе с её устройствами
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformReport {
    pub platform: PlatformInfo,
    pub devices: Vec<DeviceInfo>,
}

impl PlatformReport {
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Platform name", self.platform.name]);
        table.add_row(row!["Platform vendor", self.platform.vendor]);
        table.add_row(row!["Platform version", self.platform.version]);
        table.add_row(row!["Platform profile", self.platform.profile]);
        table.add_row(row!["Platform extensions", self.platform.extensions.join("\n")]);
        table.add_row(row!["Devices", self.devices.len()]);
        table
    }
}

/// Собирает сведения обо всех платформах и их устройствах
pub fn collect<A: ClApi + ?Sized>(api: &A) -> Result<Vec<PlatformReport>> {
    list_platforms(api)?
        .into_iter()
        .map(|platform| -> Result<PlatformReport> {
            let devices = platform_devices(api, platform)?
                .into_iter()
                .map(|device| DeviceInfo::query(api, device))
                .collect::<Result<Vec<_>>>()?;
            Ok(PlatformReport {
                platform: PlatformInfo::query(api, platform)?,
                devices,
            })
        })
        .collect()
}
