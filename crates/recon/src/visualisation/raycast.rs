//! # Ray Marching
//!
//! One generic traversal shared by every raycast product. Each pixel's ray
//! is sphere-traced through the signed distance field between the near and
//! far bounds of its interval, and the outcome is handed to a
//! [`RaycastConsumer`] exactly once per pixel, hit or miss.
//!
//! Consumers split their outputs into disjoint spans of consecutive pixels,
//! one per worker, so the per-pixel loop needs no locking. Positions are in
//! voxel units throughout.

use compute::ComputeBackend;
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::camera::{Intrinsics, Pose};
use crate::scene::{BlockCache, SceneView, Voxel, SDF_BLOCK_SIZE};
use crate::settings::SceneParams;

/// Sampled distances in this band are re-read with trilinear interpolation.
const INTERPOLATION_BAND: (f32, f32) = (-0.5, 0.1);

/// Per-frame constants of a raycast.
#[derive(Debug, Clone, Copy)]
pub struct RaycastParams {
    /// Camera-to-world transform.
    pub inv_m: Mat4,
    /// `(1 / fx, 1 / fy, cx, cy)`.
    pub inv_projection: Vec4,
    pub one_over_voxel_size: f32,
    /// Voxels advanced per unit of normalised distance, `mu / voxel_size`.
    pub step_scale: f32,
    /// Direction towards the light, the negated camera viewing axis.
    pub light_source: Vec3,
    pub dims: UVec2,
}

impl RaycastParams {
    #[must_use]
    pub fn new(pose: &Pose, intrinsics: &Intrinsics, scene: &SceneParams, dims: UVec2) -> Self {
        Self::from_inverse(pose.inv_m(), intrinsics, scene, dims)
    }

    /// Parameters for a camera whose camera-to-world transform is `inv_m`.
    #[must_use]
    pub fn from_inverse(inv_m: Mat4, intrinsics: &Intrinsics, scene: &SceneParams, dims: UVec2) -> Self {
        Self {
            inv_m,
            inv_projection: intrinsics.inverse_projection_params(),
            one_over_voxel_size: 1.0 / scene.voxel_size,
            step_scale: scene.step_scale(),
            light_source: -inv_m.z_axis.truncate().normalize_or_zero(),
            dims,
        }
    }

    /// Ray point in voxel units behind pixel `(x, y)` at camera depth `z`,
    /// with its distance from the camera centre in voxels.
    fn ray_point(&self, x: f32, y: f32, z: f32) -> (Vec3, f32) {
        let camera = Vec3::new(
            z * (x - self.inv_projection.z) * self.inv_projection.x,
            z * (y - self.inv_projection.w) * self.inv_projection.y,
            z,
        );
        let world = self.inv_m.transform_point3(camera);
        (
            world * self.one_over_voxel_size,
            camera.length() * self.one_over_voxel_size,
        )
    }
}

/// Marches the ray of pixel `(x, y)` through `[min_max.x, min_max.y]` and
/// returns the surface crossing in voxel units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cast_ray<V: Voxel>(
    scene: &SceneView<'_, V>,
    cache: &mut BlockCache,
    x: u32,
    y: u32,
    params: &RaycastParams,
    min_max: Vec2,
) -> Option<Vec3> {
    let (x, y) = (x as f32, y as f32);
    let (start, mut total_length) = params.ray_point(x, y, min_max.x);
    let (end, total_length_max) = params.ray_point(x, y, min_max.y);
    let direction = (end - start).normalize_or_zero();

    let mut point = start;
    let mut sdf = 1.0;
    let mut hit = false;
    while total_length < total_length_max {
        let step = match scene.sdf_uninterpolated(point, cache) {
            None => SDF_BLOCK_SIZE as f32,
            Some(sample) => {
                sdf = sample;
                if (INTERPOLATION_BAND.0..=INTERPOLATION_BAND.1).contains(&sdf) {
                    sdf = scene.sdf_interpolated(point, cache);
                }
                if sdf <= 0.0 {
                    hit = true;
                    break;
                }
                (sdf * params.step_scale).max(1.0)
            }
        };
        point += step * direction;
        total_length += step;
    }
    if !hit {
        return None;
    }

    point += sdf * params.step_scale * direction;
    sdf = scene.sdf_interpolated(point, cache);
    point += sdf * params.step_scale * direction;
    Some(point)
}

/// Everything a consumer learns about one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelVisit {
    pub x: u32,
    pub y: u32,
    /// Row-major index of the pixel.
    pub loc_id: usize,
    pub found: bool,
    /// Surface point in voxel units. Meaningless without `found`.
    pub point: Vec3,
    pub normal: Vec3,
    /// Cosine between `normal` and the light direction.
    pub angle: f32,
    /// Segment label of the voxel nearest the hit, `0` on a miss.
    pub id: u32,
}

/// Traces pixel `loc_id` and fills in its [`PixelVisit`].
#[must_use]
pub fn visit_pixel<V: Voxel>(
    scene: &SceneView<'_, V>,
    cache: &mut BlockCache,
    loc_id: usize,
    params: &RaycastParams,
    min_max: Vec2,
) -> PixelVisit {
    let width = params.dims.x.max(1) as usize;
    #[allow(clippy::cast_possible_truncation)]
    let (x, y) = ((loc_id % width) as u32, (loc_id / width) as u32);
    match cast_ray(scene, cache, x, y, params, min_max) {
        Some(point) => {
            let normal = scene.normal(point, cache);
            let id = scene.id_uninterpolated(point, cache);
            PixelVisit {
                x,
                y,
                loc_id,
                found: true,
                point,
                normal,
                angle: normal.dot(params.light_source),
                id,
            }
        }
        None => PixelVisit {
            x,
            y,
            loc_id,
            found: false,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
            angle: 0.0,
            id: 0,
        },
    }
}

/// Exclusive slice of a consumer's outputs covering a run of consecutive
/// pixels.
pub trait PixelSpan: Send {
    fn process_pixel(&mut self, visit: &PixelVisit);
}

/// Per-pixel sink of a raycast.
pub trait RaycastConsumer {
    type Span<'s>: PixelSpan
    where
        Self: 's;

    /// Splits the outputs into spans of `span_len` pixels each, in pixel
    /// order. The last span may be shorter.
    fn spans(&mut self, span_len: usize) -> Vec<Self::Span<'_>>;
}

/// Raycasts every pixel of `params.dims` into `consumer`, reading search
/// intervals from the row-major `min_max`.
pub fn raycast_pixels<B, V, C>(
    scene: SceneView<'_, V>,
    params: &RaycastParams,
    min_max: &[Vec2],
    consumer: &mut C,
) where
    B: ComputeBackend,
    V: Voxel,
    C: RaycastConsumer,
{
    let total = params.dims.x as usize * params.dims.y as usize;
    let span_len = B::span_len(params.dims.x as usize);
    consumer
        .spans(span_len)
        .into_par_iter()
        .enumerate()
        .for_each(|(index, mut span)| {
            let mut cache = BlockCache::default();
            let start = index * span_len;
            for loc_id in start..(start + span_len).min(total) {
                let bounds = min_max.get(loc_id).copied().unwrap_or(Vec2::ZERO);
                let visit = visit_pixel(&scene, &mut cache, loc_id, params, bounds);
                span.process_pixel(&visit);
            }
        });
}
