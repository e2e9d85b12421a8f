//! Модуль для работы с OpenCL
//!
//! Содержит низкоуровневые привязки, интерфейс `ClApi` и обёртки над
//! платформами, устройствами и контекстами

pub mod api;
pub mod bindings;
pub mod context;
pub mod device;
pub mod info;
pub mod query;
pub mod types;

pub use api::{ClApi, OpenCl};
pub use context::Context;
pub use device::{list_devices, Device};
