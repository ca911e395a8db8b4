//! Frustum culling of allocated blocks.
//!
//! A block is kept when at least one of its eight corners projects inside
//! the image. Corners at or behind the camera plane count as invisible, so
//! a block straddling the camera plane with every in-front corner
//! off-screen is dropped even though part of it may be in view.

use compute::ComputeBackend;
use glam::{IVec3, Mat4, UVec2, Vec3};

use super::CORNER_DEPTH_EPSILON;
use crate::camera::{Intrinsics, Pose};
use crate::scene::{HashEntry, Scene, Voxel, SDF_BLOCK_SIZE};

/// Unit-cube offsets of the eight corners of a block.
pub(crate) const CORNERS: [IVec3; 8] = [
    IVec3::new(0, 0, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 1, 1),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 0, 1),
    IVec3::new(1, 1, 0),
    IVec3::new(1, 1, 1),
];

/// World-space position of corner `offset` of block `block_pos`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn corner_world(block_pos: IVec3, offset: IVec3, voxel_size: f32) -> Vec3 {
    (block_pos + offset).as_vec3() * (SDF_BLOCK_SIZE as f32 * voxel_size)
}

/// Number of corners of `block_pos` that do not land inside the
/// `dims`-sized image seen through `m` and `intrinsics`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn count_invisible_corners(
    block_pos: IVec3,
    m: &Mat4,
    intrinsics: &Intrinsics,
    dims: UVec2,
    voxel_size: f32,
) -> u32 {
    let (width, height) = (dims.x as f32, dims.y as f32);
    let mut invisible = 0;
    for offset in CORNERS {
        let camera = m.transform_point3(corner_world(block_pos, offset, voxel_size));
        if camera.z <= CORNER_DEPTH_EPSILON {
            invisible += 1;
            continue;
        }
        let pixel = intrinsics.project(camera);
        if !(pixel.x >= 0.0 && pixel.x < width && pixel.y >= 0.0 && pixel.y < height) {
            invisible += 1;
        }
    }
    invisible
}

#[must_use]
pub fn block_is_visible(
    block_pos: IVec3,
    m: &Mat4,
    intrinsics: &Intrinsics,
    dims: UVec2,
    voxel_size: f32,
) -> bool {
    count_invisible_corners(block_pos, m, intrinsics, dims, voxel_size) < 8
}

fn entry_is_visible(
    entry: &HashEntry,
    m: &Mat4,
    intrinsics: &Intrinsics,
    dims: UVec2,
    voxel_size: f32,
) -> bool {
    entry.ptr().is_some() && block_is_visible(entry.pos, m, intrinsics, dims, voxel_size)
}

/// Hash slots of every resident block visible from `pose`, ascending.
#[must_use]
pub fn find_visible_blocks<B: ComputeBackend, V: Voxel>(
    scene: &Scene<V>,
    pose: &Pose,
    intrinsics: &Intrinsics,
    dims: UVec2,
) -> Vec<u32> {
    let entries = scene.index.entries();
    let m = pose.m();
    let voxel_size = scene.params.voxel_size;
    let visible = B::compact(entries.len(), |slot| {
        entry_is_visible(&entries[slot], &m, intrinsics, dims, voxel_size)
    });
    tracing::trace!(backend = B::NAME, visible = visible.len(), "culled blocks");
    visible
}
