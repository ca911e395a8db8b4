//! # Images
//!
//! Row-major 2D buffers built on [`MemoryBlock`].

use glam::UVec2;

use crate::memory::{MemoryBlock, Placement};
use crate::{ComputeError, MemoryDevice};

/// Row-major image of `dims.x * dims.y` pixels.
#[derive(Debug)]
pub struct Image<T> {
    dims: UVec2,
    block: MemoryBlock<T>,
    fill: T,
}

impl<T: Copy> Image<T> {
    /// Creates an image with every pixel set to `fill`. `fill` is also the
    /// value [`clear`](Self::clear) restores.
    #[must_use]
    pub fn new(dims: UVec2, fill: T, placement: Placement) -> Self {
        Self {
            dims,
            block: MemoryBlock::new(pixel_count(dims), fill, placement),
            fill,
        }
    }

    #[must_use]
    pub fn dims(&self) -> UVec2 {
        self.dims
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.dims.x as usize
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.dims.y as usize
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.block.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        self.block.placement()
    }

    #[must_use]
    pub fn data(&self, side: MemoryDevice) -> &[T] {
        self.block.data(side)
    }

    pub fn data_mut(&mut self, side: MemoryDevice) -> &mut [T] {
        self.block.data_mut(side)
    }

    /// Pixel at `(x, y)` on `side`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, side: MemoryDevice, x: u32, y: u32) -> Option<T> {
        if x >= self.dims.x || y >= self.dims.y {
            return None;
        }
        self.data(side)
            .get(x as usize + y as usize * self.width())
            .copied()
    }

    /// Resets every pixel on every side to the fill value.
    pub fn clear(&mut self) {
        let fill = self.fill;
        self.block.reset(self.block.len(), fill);
    }

    /// Reallocates the image at `dims` with every pixel reset to the fill value.
    pub fn change_dims(&mut self, dims: UVec2) {
        self.dims = dims;
        self.block.reset(pixel_count(dims), self.fill);
    }

    /// Copies the pixels of `src` (read on `side`) into this image (written
    /// on `side`).
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::DimsMismatch`] if the images differ in size.
    pub fn set_from(&mut self, src: &Image<T>, side: MemoryDevice) -> Result<(), ComputeError> {
        if src.dims != self.dims {
            return Err(ComputeError::DimsMismatch {
                expected: self.dims.to_array(),
                actual: src.dims.to_array(),
            });
        }
        self.block.copy_from(side, src.data(side))
    }

    /// Copies a row-major slice into the image on `side`.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::LengthMismatch`] if `pixels` has the wrong length.
    pub fn copy_from_slice(&mut self, side: MemoryDevice, pixels: &[T]) -> Result<(), ComputeError> {
        self.block.copy_from(side, pixels)
    }

    pub fn update_device_from_host(&mut self) {
        self.block.update_device_from_host();
    }

    pub fn update_host_from_device(&mut self) {
        self.block.update_host_from_device();
    }
}

fn pixel_count(dims: UVec2) -> usize {
    dims.x as usize * dims.y as usize
}
