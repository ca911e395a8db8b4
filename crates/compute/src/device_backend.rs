//! Massively parallel backend.
//!
//! Passes are launched as grids of [`THREADS_PER_GROUP`]-thread workgroups
//! over the device copies of mirrored buffers. Stream compaction reserves
//! output slots with an atomic counter, the way a device kernel would, and
//! sorts the compacted list afterwards so both backends agree on order.

use rayon::prelude::*;

use crate::layout::{group_count, THREADS_PER_GROUP};
use crate::{AppendBuffer, ComputeBackend, MemoryDevice};

#[derive(Default, Debug, Clone, Copy)]
pub struct DeviceBackend;

impl DeviceBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for DeviceBackend {
    const NAME: &'static str = "device";
    const MEMORY: MemoryDevice = MemoryDevice::Device;

    fn span_len(_width: usize) -> usize {
        THREADS_PER_GROUP
    }

    #[allow(clippy::cast_possible_truncation)]
    fn compact<F>(count: usize, keep: F) -> Vec<u32>
    where
        F: Fn(usize) -> bool + Sync,
    {
        let mut slots = vec![0u32; count];
        let accepted = {
            let output = AppendBuffer::new(&mut slots);
            (0..group_count(count, THREADS_PER_GROUP))
                .into_par_iter()
                .for_each(|group| {
                    let start = group * THREADS_PER_GROUP;
                    let end = (start + THREADS_PER_GROUP).min(count);
                    for index in start..end {
                        if keep(index) {
                            output.push(index as u32);
                        }
                    }
                });
            output.into_len()
        };
        slots.truncate(accepted);
        slots.sort_unstable();
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CpuBackend;

    #[test]
    fn compact_matches_host_backend() {
        let keep = |i: usize| (i * 7919) % 13 < 4;
        let device = DeviceBackend::compact(10_000, keep);
        let host = CpuBackend::compact(10_000, keep);
        assert_eq!(device, host);
    }

    #[test]
    fn compact_of_nothing_is_empty() {
        assert!(DeviceBackend::compact(0, |_| true).is_empty());
    }
}
