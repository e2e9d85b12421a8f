//! Запросы переменной длины: сначала размер, затем данные
//!
//! OpenCL отдаёт списки платформ, логи сборки и строковые свойства
//! одинаково: вызов без буфера сообщает размер, второй вызов заполняет
//! буфер. Все такие запросы крейта проходят через `fetch_vec`.

use super::types::{cl_int, CL_INVALID_VALUE};

/// Выполняет двухфазный запрос.
///
/// `query(None)` должен вернуть число элементов, `query(Some(buf))` заполнить
/// `buf`. Если при заполнении объём вырос, возвращается `CL_INVALID_VALUE`,
/// а не усечённый результат.
pub fn fetch_vec<T, F>(init: T, mut query: F) -> Result<Vec<T>, cl_int>
where
    T: Copy,
    F: FnMut(Option<&mut [T]>) -> Result<usize, cl_int>,
{
    let count = query(None)?;
    let mut values = vec![init; count];
    if count == 0 {
        return Ok(values);
    }
    let filled = query(Some(&mut values))?;
    if filled > count {
        return Err(CL_INVALID_VALUE);
    }
    values.truncate(filled);
    Ok(values)
}

/// Сырые байты свойства
pub fn fetch_bytes<F>(query: F) -> Result<Vec<u8>, cl_int>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, cl_int>,
{
    fetch_vec(0u8, query)
}

/// Строковое свойство без завершающего нуля
pub fn fetch_string<F>(query: F) -> Result<String, cl_int>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, cl_int>,
{
    let mut bytes = fetch_bytes(query)?;
    if let Some(end) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(end);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Массив `size_t`, например `CL_DEVICE_MAX_WORK_ITEM_SIZES`
pub fn fetch_sizes<F>(query: F) -> Result<Vec<usize>, cl_int>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, cl_int>,
{
    const WIDTH: usize = std::mem::size_of::<usize>();
    let bytes = fetch_bytes(query)?;
    Ok(bytes
        .chunks_exact(WIDTH)
        .map(|chunk| {
            let mut raw = [0u8; WIDTH];
            raw.copy_from_slice(chunk);
            usize::from_ne_bytes(raw)
        })
        .collect())
}

/// Скалярное свойство фиксированного размера (`cl_uint`, `cl_bool`, `size_t`)
pub fn fetch_u32<F>(mut query: F) -> Result<u32, cl_int>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, cl_int>,
{
    let mut raw = [0u8; 4];
    query(Some(&mut raw))?;
    Ok(u32::from_ne_bytes(raw))
}

pub fn fetch_usize<F>(mut query: F) -> Result<usize, cl_int>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, cl_int>,
{
    let mut raw = [0u8; std::mem::size_of::<usize>()];
    query(Some(&mut raw))?;
    Ok(usize::from_ne_bytes(raw))
}
