//! False-colour rendering of a depth image with the jet colour map.

use compute::{Image, MemoryDevice};
use rayon::prelude::*;

fn interpolate(value: f32, y0: f32, x0: f32, y1: f32, x1: f32) -> f32 {
    (value - x0) * (y1 - y0) / (x1 - x0) + y0
}

fn base(value: f32) -> f32 {
    if value <= -0.75 {
        0.0
    } else if value <= -0.25 {
        interpolate(value, 0.0, -0.75, 1.0, -0.25)
    } else if value <= 0.25 {
        1.0
    } else if value <= 0.75 {
        interpolate(value, 1.0, 0.25, 0.0, 0.75)
    } else {
        0.0
    }
}

/// Jet colour map sampled at `value`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn jet(value: f32) -> [u8; 4] {
    let channel = |v: f32| (base(v) * 255.0) as u8;
    [channel(value - 0.5), channel(value), channel(value + 0.5), 255]
}

/// Renders the host copy of `depth` into the host copy of `out`, mapping
/// the valid depth range onto the jet colour map. Pixels without depth stay
/// black; an image of constant depth stays black entirely. `out` must have
/// the dimensions of `depth`.
pub fn depth_to_uchar4(out: &mut Image<[u8; 4]>, depth: &Image<f32>) {
    let source = depth.data(MemoryDevice::Host);
    let target = out.data_mut(MemoryDevice::Host);
    target.fill([0, 0, 0, 255]);

    let (lims_min, lims_max) = source
        .iter()
        .filter(|&&d| d > 0.0)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));
    if lims_min >= lims_max {
        return;
    }
    let scale = 1.0 / (lims_max - lims_min);

    target
        .par_iter_mut()
        .zip(source.par_iter())
        .for_each(|(pixel, &d)| {
            if d > 0.0 {
                *pixel = jet((d - lims_min) * scale);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::Placement;
    use glam::UVec2;

    #[test]
    fn jet_runs_blue_to_red() {
        assert_eq!(jet(-1.0), [0, 0, 127, 255]);
        assert_eq!(jet(0.0), [127, 255, 127, 255]);
        assert_eq!(jet(1.0), [127, 0, 0, 255]);
    }

    #[test]
    fn invalid_and_constant_depth_stay_black() {
        let dims = UVec2::new(3, 1);
        let mut out = Image::new(dims, [9, 9, 9, 9], Placement::Host);
        let mut depth = Image::new(dims, 1.5f32, Placement::Host);
        depth_to_uchar4(&mut out, &depth);
        assert!(out.data(MemoryDevice::Host).iter().all(|&p| p == [0, 0, 0, 255]));

        depth
            .copy_from_slice(MemoryDevice::Host, &[1.0, -1.0, 2.0])
            .unwrap();
        depth_to_uchar4(&mut out, &depth);
        let pixels = out.data(MemoryDevice::Host);
        assert_eq!(pixels[1], [0, 0, 0, 255]);
        assert_eq!(pixels[0], jet(0.0));
        assert_eq!(pixels[2], jet(1.0));
    }
}
