use std::cmp::max;

pub mod http;
pub mod text;

/// 依 CPU 數量估算的並發上限，最少 64
pub fn concurrent_limit_64() -> usize {
    max(64, num_cpus::get() * 4)
}
