use crate::MemoryDevice;

/// Execution strategy shared by every data-parallel pass of the engine.
///
/// A backend decides which copy of a mirrored buffer its passes work on and
/// how work items are grouped onto workers. Backends carry no state; passes
/// are generic over the backend so the per-item loops are monomorphised.
pub trait ComputeBackend: Default + Send + Sync + 'static {
    /// Human readable name used in logs.
    const NAME: &'static str;

    /// Side of every [`MemoryBlock`](crate::MemoryBlock) this backend reads and writes.
    const MEMORY: MemoryDevice;

    /// Number of consecutive pixels one worker processes in a launch over a
    /// row-major image `width` pixels wide.
    fn span_len(width: usize) -> usize;

    /// Runs `keep` once for every index in `0..count` and returns the indices
    /// it accepted, in ascending order.
    fn compact<F>(count: usize, keep: F) -> Vec<u32>
    where
        F: Fn(usize) -> bool + Sync;
}
