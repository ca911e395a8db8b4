//! Reference fusion: ray-band block allocation and projective TSDF
//! averaging.

use std::marker::PhantomData;

use compute::ComputeBackend;
use glam::{IVec3, Mat4, UVec2, Vec3};
use rayon::prelude::*;

use super::SceneReconstructionEngine;
use crate::camera::{Intrinsics, Pose};
use crate::scene::{Scene, Voxel, SDF_BLOCK_SIZE, SDF_BLOCK_SIZE3};
use crate::settings::SceneParams;
use crate::view::View;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceReconstructionEngine<B> {
    backend: PhantomData<B>,
}

impl<B: ComputeBackend> ReferenceReconstructionEngine<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: PhantomData,
        }
    }
}

/// Block coordinates crossed by the truncation band `[d - mu, d + mu]`
/// around the depth measurement of one pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn blocks_along_ray(
    pixel: (f32, f32),
    depth: f32,
    inv_m: &Mat4,
    intrinsics: &Intrinsics,
    mu: f32,
    block_size_world: f32,
) -> Vec<IVec3> {
    let point = intrinsics.unproject(pixel.0, pixel.1, depth);
    let norm = point.length();
    let start = inv_m.transform_point3(point * (1.0 - mu / norm)) / block_size_world;
    let end = inv_m.transform_point3(point * (1.0 + mu / norm)) / block_size_world;
    let direction = end - start;
    let steps = (2.0 * direction.length()).ceil().max(1.0) as usize;
    let step = direction / (steps.saturating_sub(1).max(1)) as f32;
    (0..steps)
        .map(|i| (start + step * i as f32).floor().as_ivec3())
        .collect()
}

/// Folds one observation into the running weighted average of a voxel.
/// `eta` is the measured depth minus the voxel's depth along the ray.
fn fuse_depth<V: Voxel>(voxel: &mut V, eta: f32, mu: f32, max_w: u32) {
    let new_f = (eta / mu).min(1.0);
    let old_w = voxel.depth_weight();
    #[allow(clippy::cast_precision_loss)]
    let fused = (old_w as f32 * voxel.sdf() + new_f) / (old_w + 1) as f32;
    voxel.set_sdf(fused);
    voxel.set_depth_weight((old_w + 1).min(max_w));
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fuse_colour<V: Voxel>(voxel: &mut V, measured: [u8; 4], max_w: u32) {
    let old_w = voxel.colour_weight();
    let [r, g, b] = voxel.colour();
    let old = Vec3::new(f32::from(r), f32::from(g), f32::from(b));
    let new = Vec3::new(
        f32::from(measured[0]),
        f32::from(measured[1]),
        f32::from(measured[2]),
    );
    let fused = ((old * old_w as f32 + new) / (old_w + 1) as f32).round();
    voxel.set_colour(
        [fused.x as u8, fused.y as u8, fused.z as u8],
        (old_w + 1).min(max_w),
    );
}

/// Pixel of `image` nearest to the projection of `camera`, if it lies at
/// least one pixel inside the border.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn sample_index(camera: Vec3, intrinsics: &Intrinsics, dims: UVec2) -> Option<usize> {
    if camera.z <= 0.0 {
        return None;
    }
    let pixel = intrinsics.project(camera);
    if pixel.x < 1.0
        || pixel.x > dims.x as f32 - 2.0
        || pixel.y < 1.0
        || pixel.y > dims.y as f32 - 2.0
    {
        return None;
    }
    let (x, y) = ((pixel.x + 0.5) as usize, (pixel.y + 0.5) as usize);
    Some(x + y * dims.x as usize)
}

/// Measurements closer than the band width or past the far plane are
/// ignored; so are missing ones, which are non-positive.
fn in_fusion_range(depth: f32, params: &SceneParams) -> bool {
    depth > params.mu && depth <= params.view_frustum_max
}

impl<B: ComputeBackend, V: Voxel> SceneReconstructionEngine<V> for ReferenceReconstructionEngine<B> {
    #[allow(clippy::cast_precision_loss)]
    fn allocate_scene_from_depth(&self, scene: &mut Scene<V>, view: &View, pose: &Pose) {
        let params = scene.params;
        let block_size_world = scene.block_size_world();
        let dims = view.depth_dims();
        let width = dims.x as usize;
        let inv_m = pose.inv_m();
        let intrinsics = view.calib.intrinsics_d;

        let mut touched: Vec<IVec3> = view
            .depth
            .data(B::MEMORY)
            .par_iter()
            .enumerate()
            .filter(|&(_, &depth)| in_fusion_range(depth, &params))
            .flat_map_iter(|(index, &depth)| {
                let pixel = ((index % width) as f32, (index / width) as f32);
                blocks_along_ray(pixel, depth, &inv_m, &intrinsics, params.mu, block_size_world)
            })
            .collect();
        touched.sort_unstable_by_key(|pos| (pos.x, pos.y, pos.z));
        touched.dedup();

        let before = scene.allocated_block_count();
        let mut live = Vec::with_capacity(touched.len());
        for pos in touched {
            let slot = match scene.index.find(pos) {
                Some(slot) => Some(slot),
                None => scene.allocate_block(pos),
            };
            #[allow(clippy::cast_possible_truncation)]
            live.extend(slot.map(|slot| slot as u32));
        }
        live.sort_unstable();
        scene.live_entries = live;
        tracing::debug!(
            live = scene.live_entries.len(),
            allocated = scene.allocated_block_count() - before,
            "allocated scene from depth"
        );
    }

    #[allow(clippy::cast_precision_loss)]
    fn integrate_into_scene(&self, scene: &mut Scene<V>, view: &View, pose: &Pose) {
        let params = scene.params;
        let m_d = pose.m();
        let m_rgb = view.calib.trafo_rgb_to_depth.calib_inv * m_d;
        let (intrinsics_d, intrinsics_rgb) = (view.calib.intrinsics_d, view.calib.intrinsics_rgb);
        let (depth_dims, rgb_dims) = (view.depth_dims(), view.rgb_dims());
        let depth = view.depth.data(B::MEMORY);
        let rgb = view.rgb.data(B::MEMORY);

        let mut live_blocks: Vec<Option<IVec3>> = vec![None; scene.local_vba.capacity()];
        for &slot in &scene.live_entries {
            if let Some(entry) = scene.index.entry(slot as usize) {
                if let Some(ptr) = entry.ptr() {
                    live_blocks[ptr] = Some(entry.pos);
                }
            }
        }

        scene
            .local_vba
            .voxels_mut()
            .par_chunks_mut(SDF_BLOCK_SIZE3)
            .zip(live_blocks.par_iter())
            .for_each(|(block, pos)| {
                let Some(pos) = pos else { return };
                let origin = *pos * SDF_BLOCK_SIZE;
                for (index, voxel) in block.iter_mut().enumerate() {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    let local = IVec3::new(
                        (index % 8) as i32,
                        (index / 8 % 8) as i32,
                        (index / 64) as i32,
                    );
                    let model = (origin + local).as_vec3() * params.voxel_size;
                    let camera = m_d.transform_point3(model);
                    let Some(sample) = sample_index(camera, &intrinsics_d, depth_dims) else {
                        continue;
                    };
                    let measured = depth[sample];
                    if !in_fusion_range(measured, &params) {
                        continue;
                    }
                    let eta = measured - camera.z;
                    if eta < -params.mu {
                        continue;
                    }
                    fuse_depth(voxel, eta, params.mu, params.max_w);

                    if V::HAS_COLOUR && eta.abs() < params.mu {
                        let camera_rgb = m_rgb.transform_point3(model);
                        if let Some(sample) = sample_index(camera_rgb, &intrinsics_rgb, rgb_dims) {
                            fuse_colour(voxel, rgb[sample], params.max_w);
                        }
                    }
                }
            });
        tracing::debug!(blocks = scene.live_entries.len(), "integrated depth frame");
    }
}
