#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Compute Layer
//!
//! Memory model and execution backends shared by the fusion engine.
//!
//! Buffers live in a [`MemoryBlock`], which owns a host copy, a device copy,
//! or both. The two copies of a mirrored block are independent allocations:
//! writes on one side only become visible on the other after an explicit
//! [`MemoryBlock::update_device_from_host`] or
//! [`MemoryBlock::update_host_from_device`].
//!
//! Work is fanned out by a [`ComputeBackend`]. Two backends are provided:
//!
//! -   [`CpuBackend`] runs on the host copies and hands out whole image rows
//!     to worker threads.
//! -   [`DeviceBackend`] runs on the device copies and launches fixed-size
//!     workgroups, one logical thread per pixel or per block.

use thiserror::Error;

pub mod append;
pub mod backend;
pub mod cpu_backend;
pub mod device_backend;
pub mod image;
pub mod layout;
pub mod memory;

pub use append::AppendBuffer;
pub use backend::ComputeBackend;
pub use cpu_backend::CpuBackend;
pub use device_backend::DeviceBackend;
pub use image::Image;
pub use memory::{MemoryBlock, Placement};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ComputeError {
    #[error("buffer length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("image dimensions mismatch: expected {expected:?}, got {actual:?}")]
    DimsMismatch { expected: [u32; 2], actual: [u32; 2] },
}

/// Which copy of a [`MemoryBlock`] an operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryDevice {
    Host,
    Device,
}
