#![allow(dead_code)]

use compute::MemoryDevice;
use glam::{IVec3, UVec2};
use recon::scene::{voxel_index_in_block, SDF_BLOCK_SIZE};
use recon::{
    DeviceType, FusionSettings, Intrinsics, RgbdCalib, Scene, SceneParams, TrackerType, View,
    Voxel,
};

/// Depth of the synthetic plane, in metres.
pub const PLANE_Z: f32 = 0.5;
pub const DIMS: UVec2 = UVec2::new(32, 24);
pub const PLANE_COLOUR: [u8; 3] = [200, 100, 50];

pub fn intrinsics() -> Intrinsics {
    Intrinsics::new(40.0, 40.0, 16.0, 12.0)
}

pub fn calib() -> RgbdCalib {
    RgbdCalib {
        intrinsics_rgb: intrinsics(),
        intrinsics_d: intrinsics(),
        ..RgbdCalib::default()
    }
}

pub fn plane_params() -> SceneParams {
    SceneParams {
        voxel_size: 0.01,
        mu: 0.04,
        bucket_count: 4096,
        excess_count: 1024,
        max_blocks: 512,
        ..SceneParams::default()
    }
}

/// Scene holding the plane `z = PLANE_Z` facing a camera at the origin,
/// fully observed with weight one and a uniform colour.
pub fn plane_scene<V: Voxel>() -> Scene<V> {
    let params = plane_params();
    let mut scene: Scene<V> = Scene::new(params, false);
    for bz in 5..=6 {
        for by in -3..=2 {
            for bx in -4..=3 {
                let pos = IVec3::new(bx, by, bz);
                let slot = scene.allocate_block(pos).expect("plane block");
                let block = scene.block_mut(slot).expect("resident block");
                for lz in 0..SDF_BLOCK_SIZE {
                    #[allow(clippy::cast_precision_loss)]
                    let z = (bz * SDF_BLOCK_SIZE + lz) as f32 * params.voxel_size;
                    let sdf = ((PLANE_Z - z) / params.mu).clamp(-1.0, 1.0);
                    for ly in 0..SDF_BLOCK_SIZE {
                        for lx in 0..SDF_BLOCK_SIZE {
                            let voxel = &mut block[voxel_index_in_block(IVec3::new(lx, ly, lz))];
                            voxel.set_sdf(sdf);
                            voxel.set_depth_weight(1);
                            voxel.set_colour(PLANE_COLOUR, 1);
                        }
                    }
                }
            }
        }
    }
    scene
}

pub fn plane_view() -> View {
    View::new(calib(), DIMS, DIMS, MemoryDevice::Host)
}

pub fn settings(device: DeviceType, tracker_type: TrackerType, params: SceneParams) -> FusionSettings {
    FusionSettings {
        device,
        tracker_type,
        scene: params,
        ..FusionSettings::default()
    }
}

/// Small coarse scene for single-block observations.
pub fn coarse_params() -> SceneParams {
    SceneParams {
        voxel_size: 0.05,
        mu: 0.02,
        bucket_count: 1024,
        excess_count: 256,
        max_blocks: 64,
        ..SceneParams::default()
    }
}

/// Depth image with every pixel invalid except `(x, y)` at `depth`.
pub fn single_pixel_depth(x: u32, y: u32, depth: f32) -> Vec<f32> {
    let mut pixels = vec![-1.0; (DIMS.x * DIMS.y) as usize];
    pixels[(x + y * DIMS.x) as usize] = depth;
    pixels
}

pub fn flat_depth(depth: f32) -> Vec<f32> {
    vec![depth; (DIMS.x * DIMS.y) as usize]
}
