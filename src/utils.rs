//! Замер времени запусков

use std::time::{Duration, Instant};

/// Выполняет `f` и возвращает её результат вместе с затраченным временем
pub fn measure_time<F, T>(f: F) -> (T, Duration)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Пропускная способность GEMM размера `size` в GFLOP/s (2·N³ операций)
pub fn gflops(size: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    let n = size as f64;
    2.0 * n * n * n / secs / 1e9
}
