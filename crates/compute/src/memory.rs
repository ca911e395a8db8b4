//! # Host and Device Memory
//!
//! A [`MemoryBlock`] is a fixed-length buffer that lives on the host, on the
//! device, or on both. Mirrored blocks keep two independent copies and never
//! synchronise them implicitly.

use std::fmt;

use crate::{ComputeError, MemoryDevice};

/// Where a [`MemoryBlock`] keeps its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Host copy only.
    Host,
    /// Device copy only.
    Device,
    /// Independent host and device copies.
    Mirrored,
}

impl Placement {
    /// Placement for buffers the host reads or writes while a backend running
    /// on `device` works on them.
    #[must_use]
    pub const fn shared_with(device: MemoryDevice) -> Self {
        match device {
            MemoryDevice::Host => Self::Host,
            MemoryDevice::Device => Self::Mirrored,
        }
    }

    /// Placement for buffers only the backend running on `device` touches.
    #[must_use]
    pub const fn resident_on(device: MemoryDevice) -> Self {
        match device {
            MemoryDevice::Host => Self::Host,
            MemoryDevice::Device => Self::Device,
        }
    }
}

enum Storage<T> {
    Host(Vec<T>),
    Device(Vec<T>),
    Mirrored { host: Vec<T>, device: Vec<T> },
}

/// Fixed-length buffer with explicit host/device transfers.
///
/// Accessing a side that has no allocation resolves to the side that does,
/// so code written against one [`MemoryDevice`] runs unchanged on a block
/// that was only ever allocated on the other.
pub struct MemoryBlock<T> {
    storage: Storage<T>,
}

impl<T: Copy> MemoryBlock<T> {
    /// Allocates `len` elements initialised to `fill` on every side named by
    /// `placement`.
    #[must_use]
    pub fn new(len: usize, fill: T, placement: Placement) -> Self {
        let storage = match placement {
            Placement::Host => Storage::Host(vec![fill; len]),
            Placement::Device => Storage::Device(vec![fill; len]),
            Placement::Mirrored => Storage::Mirrored {
                host: vec![fill; len],
                device: vec![fill; len],
            },
        };
        Self { storage }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Host(data) | Storage::Device(data) => data.len(),
            Storage::Mirrored { host, .. } => host.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        match &self.storage {
            Storage::Host(_) => Placement::Host,
            Storage::Device(_) => Placement::Device,
            Storage::Mirrored { .. } => Placement::Mirrored,
        }
    }

    /// Read access to the copy on `side`.
    #[must_use]
    pub fn data(&self, side: MemoryDevice) -> &[T] {
        match (&self.storage, side) {
            (Storage::Host(data) | Storage::Device(data), _) => data,
            (Storage::Mirrored { host, .. }, MemoryDevice::Host) => host,
            (Storage::Mirrored { device, .. }, MemoryDevice::Device) => device,
        }
    }

    /// Write access to the copy on `side`.
    pub fn data_mut(&mut self, side: MemoryDevice) -> &mut [T] {
        match (&mut self.storage, side) {
            (Storage::Host(data) | Storage::Device(data), _) => data,
            (Storage::Mirrored { host, .. }, MemoryDevice::Host) => host,
            (Storage::Mirrored { device, .. }, MemoryDevice::Device) => device,
        }
    }

    /// Overwrites every element on `side` with `value`.
    pub fn fill(&mut self, side: MemoryDevice, value: T) {
        self.data_mut(side).fill(value);
    }

    /// Copies `src` into the buffer on `side`.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::LengthMismatch`] if `src` does not have exactly
    /// [`len`](Self::len) elements.
    pub fn copy_from(&mut self, side: MemoryDevice, src: &[T]) -> Result<(), ComputeError> {
        let expected = self.len();
        if src.len() != expected {
            return Err(ComputeError::LengthMismatch {
                expected,
                actual: src.len(),
            });
        }
        self.data_mut(side).copy_from_slice(src);
        Ok(())
    }

    /// Makes the device copy match the host copy. No-op unless mirrored.
    pub fn update_device_from_host(&mut self) {
        if let Storage::Mirrored { host, device } = &mut self.storage {
            device.copy_from_slice(host);
            tracing::trace!(len = host.len(), "host -> device transfer");
        }
    }

    /// Makes the host copy match the device copy. No-op unless mirrored.
    pub fn update_host_from_device(&mut self) {
        if let Storage::Mirrored { host, device } = &mut self.storage {
            host.copy_from_slice(device);
            tracing::trace!(len = host.len(), "device -> host transfer");
        }
    }

    /// Reallocates every copy to `len` elements of `fill`.
    pub fn reset(&mut self, len: usize, fill: T) {
        *self = Self::new(len, fill, self.placement());
    }
}

impl<T> fmt::Debug for MemoryBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (placement, len) = match &self.storage {
            Storage::Host(data) => ("host", data.len()),
            Storage::Device(data) => ("device", data.len()),
            Storage::Mirrored { host, .. } => ("mirrored", host.len()),
        };
        f.debug_struct("MemoryBlock")
            .field("placement", &placement)
            .field("len", &len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_copies_are_independent_until_synced() {
        let mut block = MemoryBlock::new(4, 0u32, Placement::Mirrored);
        block.data_mut(MemoryDevice::Device)[2] = 7;
        assert_eq!(block.data(MemoryDevice::Host), &[0, 0, 0, 0]);

        block.update_host_from_device();
        assert_eq!(block.data(MemoryDevice::Host), &[0, 0, 7, 0]);

        block.data_mut(MemoryDevice::Host)[0] = 3;
        assert_eq!(block.data(MemoryDevice::Device)[0], 0);
        block.update_device_from_host();
        assert_eq!(block.data(MemoryDevice::Device), &[3, 0, 7, 0]);
    }

    #[test]
    fn single_sided_block_serves_both_sides() {
        let mut block = MemoryBlock::new(3, 1.0f32, Placement::Host);
        block.data_mut(MemoryDevice::Device)[1] = 5.0;
        assert_eq!(block.data(MemoryDevice::Host), &[1.0, 5.0, 1.0]);
        block.update_host_from_device();
        assert_eq!(block.placement(), Placement::Host);
    }

    #[test]
    fn copy_from_rejects_wrong_length() {
        let mut block = MemoryBlock::new(4, 0u8, Placement::Host);
        let result = block.copy_from(MemoryDevice::Host, &[1, 2, 3]);
        assert_eq!(
            result,
            Err(ComputeError::LengthMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(block.copy_from(MemoryDevice::Host, &[1, 2, 3, 4]).is_ok());
        assert_eq!(block.data(MemoryDevice::Host), &[1, 2, 3, 4]);
    }

    #[test]
    fn reset_keeps_placement() {
        let mut block = MemoryBlock::new(2, 0i16, Placement::Device);
        block.reset(5, -1);
        assert_eq!(block.len(), 5);
        assert_eq!(block.placement(), Placement::Device);
        assert!(block.data(MemoryDevice::Device).iter().all(|&v| v == -1));
    }
}
