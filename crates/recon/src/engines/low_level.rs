use std::marker::PhantomData;

use compute::{ComputeBackend, Image};
use rayon::prelude::*;

use super::LowLevelEngine;
use crate::camera::{DisparityCalib, Intrinsics};

/// Per-pixel depth conversions on backend `B`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceLowLevelEngine<B> {
    backend: PhantomData<B>,
}

impl<B: ComputeBackend> ReferenceLowLevelEngine<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: PhantomData,
        }
    }
}

/// Depth in metres of a Kinect disparity value, `-1` where undefined.
#[must_use]
pub fn disparity_to_depth(disparity: u16, fx: f32, calib: &DisparityCalib) -> f32 {
    let denominator = calib.a - f32::from(disparity);
    let depth = if denominator == 0.0 {
        0.0
    } else {
        8.0 * calib.b * fx / denominator
    };
    if depth > 0.0 {
        depth
    } else {
        -1.0
    }
}

/// Depth in metres of a millimetre reading, `-1` where missing.
#[must_use]
pub fn millimetres_to_depth(depth_mm: u16) -> f32 {
    if depth_mm == 0 {
        -1.0
    } else {
        f32::from(depth_mm) / 1000.0
    }
}

impl<B: ComputeBackend> LowLevelEngine for ReferenceLowLevelEngine<B> {
    fn convert_disparity_to_depth(
        &self,
        out: &mut Image<f32>,
        disparity: &Image<u16>,
        intrinsics_d: &Intrinsics,
        calib: &DisparityCalib,
    ) {
        let fx = intrinsics_d.fx;
        out.data_mut(B::MEMORY)
            .par_iter_mut()
            .zip(disparity.data(B::MEMORY).par_iter())
            .for_each(|(depth, &raw)| *depth = disparity_to_depth(raw, fx, calib));
    }

    fn convert_depth_mm_to_float(&self, out: &mut Image<f32>, depth_mm: &Image<u16>) {
        out.data_mut(B::MEMORY)
            .par_iter_mut()
            .zip(depth_mm.data(B::MEMORY).par_iter())
            .for_each(|(depth, &raw)| *depth = millimetres_to_depth(raw));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::{CpuBackend, MemoryDevice, Placement};
    use glam::UVec2;

    #[test]
    fn disparity_follows_kinect_model() {
        let calib = DisparityCalib { a: 1000.0, b: 0.1 };
        assert!((disparity_to_depth(600, 500.0, &calib) - 1.0).abs() < 1e-6);
        assert!((disparity_to_depth(1000, 500.0, &calib) + 1.0).abs() < f32::EPSILON);
        assert!((disparity_to_depth(1200, 500.0, &calib) + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn millimetres_convert_to_metres() {
        let engine = ReferenceLowLevelEngine::<CpuBackend>::new();
        let dims = UVec2::new(3, 1);
        let mut raw = Image::new(dims, 0u16, Placement::Host);
        raw.copy_from_slice(MemoryDevice::Host, &[0, 1500, 250]).unwrap();
        let mut out = Image::new(dims, 0.0f32, Placement::Host);
        engine.convert_depth_mm_to_float(&mut out, &raw);
        assert_eq!(out.data(MemoryDevice::Host), &[-1.0, 1.5, 0.25]);
    }
}
