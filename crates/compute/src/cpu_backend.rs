use rayon::prelude::*;

use crate::{ComputeBackend, MemoryDevice};

/// Multi-threaded host backend. Image passes hand one row to each worker.
#[derive(Default, Debug, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    const NAME: &'static str = "cpu";
    const MEMORY: MemoryDevice = MemoryDevice::Host;

    fn span_len(width: usize) -> usize {
        width.max(1)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn compact<F>(count: usize, keep: F) -> Vec<u32>
    where
        F: Fn(usize) -> bool + Sync,
    {
        (0..count)
            .into_par_iter()
            .filter(|&index| keep(index))
            .map(|index| index as u32)
            .collect()
    }
}
