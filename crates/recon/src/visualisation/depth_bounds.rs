//! # Depth Bounds
//!
//! Builds the per-pixel `[near, far]` interval the ray marcher searches.
//!
//! Every candidate block is projected to a screen rectangle with a depth
//! range, split into [`RENDERING_BLOCK_SIZE`]-pixel tiles, and the tiles are
//! merged into the bounds image by widening: `near` only ever decreases and
//! `far` only ever increases. Pixels no tile covers keep the empty interval
//! `(FAR_AWAY, VERY_CLOSE)` and are never marched.

use compute::{ComputeBackend, Image};
use glam::{IVec2, IVec3, Mat4, UVec2, Vec2};
use rayon::prelude::*;

use super::visibility::{corner_world, CORNERS};
use super::{CORNER_DEPTH_EPSILON, FAR_AWAY, RENDERING_BLOCK_SIZE, VERY_CLOSE};
use crate::camera::{Intrinsics, Pose};
use crate::scene::{Scene, Voxel};

/// Screen rectangle (inclusive corners) with a conservative depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingBlock {
    pub upper_left: IVec2,
    pub lower_right: IVec2,
    /// `x = min depth`, `y = max depth`, in metres.
    pub z_range: Vec2,
}

impl RenderingBlock {
    /// Number of tiles this rectangle splits into.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn tile_count(&self) -> usize {
        let extent = self.lower_right - self.upper_left + IVec2::ONE;
        let tiles = (extent + IVec2::splat(RENDERING_BLOCK_SIZE - 1)) / RENDERING_BLOCK_SIZE;
        (tiles.x.max(0) * tiles.y.max(0)) as usize
    }
}

/// Outcome of one depth bounds pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthBoundsReport {
    /// Tiles merged into the bounds image.
    pub rendering_blocks: usize,
    /// Source blocks skipped because their tiles would not fit.
    pub dropped_blocks: usize,
    /// Whether every pixel got the default frustum range instead.
    pub used_fallback: bool,
}

/// Projects block `block_pos` into a `dims`-sized image. Returns `None`
/// when no part of the block's bounding box lands on screen in front of
/// the camera.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn project_single_block(
    block_pos: IVec3,
    m: &Mat4,
    intrinsics: &Intrinsics,
    dims: UVec2,
    voxel_size: f32,
) -> Option<RenderingBlock> {
    let image = dims.as_ivec2();
    let mut upper_left = image;
    let mut lower_right = IVec2::splat(-1);
    let mut z_range = Vec2::new(FAR_AWAY, VERY_CLOSE);

    for offset in CORNERS {
        let camera = m.transform_point3(corner_world(block_pos, offset, voxel_size));
        if camera.z <= CORNER_DEPTH_EPSILON {
            continue;
        }
        let pixel = intrinsics.project(camera);
        upper_left = upper_left.min(pixel.floor().as_ivec2());
        lower_right = lower_right.max(pixel.ceil().as_ivec2());
        z_range.x = z_range.x.min(camera.z);
        z_range.y = z_range.y.max(camera.z);
    }

    upper_left = upper_left.max(IVec2::ZERO);
    lower_right = lower_right.min(image - IVec2::ONE);
    if upper_left.x > lower_right.x || upper_left.y > lower_right.y {
        return None;
    }
    z_range.x = z_range.x.max(VERY_CLOSE);
    if z_range.y < VERY_CLOSE {
        return None;
    }
    Some(RenderingBlock {
        upper_left,
        lower_right,
        z_range,
    })
}

/// Splits `block` into tiles and appends them to `out`.
pub fn create_rendering_blocks(out: &mut Vec<RenderingBlock>, block: &RenderingBlock) {
    let mut y = block.upper_left.y;
    while y <= block.lower_right.y {
        let mut x = block.upper_left.x;
        while x <= block.lower_right.x {
            let upper_left = IVec2::new(x, y);
            out.push(RenderingBlock {
                upper_left,
                lower_right: (upper_left + IVec2::splat(RENDERING_BLOCK_SIZE - 1))
                    .min(block.lower_right),
                z_range: block.z_range,
            });
            x += RENDERING_BLOCK_SIZE;
        }
        y += RENDERING_BLOCK_SIZE;
    }
}

/// Tiles `projections` in order, never emitting more than
/// `max_rendering_blocks` tiles. A block whose tiles do not all fit is
/// skipped whole. Returns the tiles and the number of skipped blocks.
pub fn plan_rendering_blocks(
    projections: impl IntoIterator<Item = RenderingBlock>,
    max_rendering_blocks: usize,
) -> (Vec<RenderingBlock>, usize) {
    let mut blocks = Vec::new();
    let mut dropped = 0;
    for projection in projections {
        if blocks.len() + projection.tile_count() > max_rendering_blocks {
            dropped += 1;
            continue;
        }
        create_rendering_blocks(&mut blocks, &projection);
    }
    (blocks, dropped)
}

/// Widens the intervals of every pixel covered by `blocks`.
#[allow(clippy::cast_sign_loss)]
pub fn merge_rendering_blocks(min_max: &mut [Vec2], width: usize, blocks: &[RenderingBlock]) {
    let height = min_max.len() / width.max(1);
    let mut rows: Vec<Vec<u32>> = vec![Vec::new(); height];
    for (index, block) in blocks.iter().enumerate() {
        for y in block.upper_left.y..=block.lower_right.y {
            if let Some(row) = rows.get_mut(y as usize) {
                #[allow(clippy::cast_possible_truncation)]
                row.push(index as u32);
            }
        }
    }
    min_max
        .par_chunks_mut(width.max(1))
        .zip(rows.par_iter())
        .for_each(|(row, ids)| {
            for &id in ids {
                let block = &blocks[id as usize];
                let span = block.upper_left.x as usize..=block.lower_right.x as usize;
                for pixel in &mut row[span] {
                    pixel.x = pixel.x.min(block.z_range.x);
                    pixel.y = pixel.y.max(block.z_range.y);
                }
            }
        });
}

/// Fills `min_max` for a view from `pose` through `intrinsics`. Candidates
/// are the slots in `visible`, or every resident block when `None`.
pub fn create_expected_depths<B: ComputeBackend, V: Voxel>(
    scene: &Scene<V>,
    pose: &Pose,
    intrinsics: &Intrinsics,
    min_max: &mut Image<Vec2>,
    visible: Option<&[u32]>,
) -> DepthBoundsReport {
    let dims = min_max.dims();
    let width = min_max.width();
    let params = &scene.params;
    let m = pose.m();

    let all_resident: Vec<u32>;
    let candidates = if let Some(visible) = visible {
        visible
    } else {
        #[allow(clippy::cast_possible_truncation)]
        {
            all_resident = scene.index.allocated_slots().map(|slot| slot as u32).collect();
        }
        &all_resident
    };

    let entries = scene.index.entries();
    let projections: Vec<Option<RenderingBlock>> = candidates
        .par_iter()
        .map(|&slot| {
            let entry = entries.get(slot as usize)?;
            entry.ptr()?;
            project_single_block(entry.pos, &m, intrinsics, dims, params.voxel_size)
        })
        .collect();
    let (blocks, dropped_blocks) =
        plan_rendering_blocks(projections.into_iter().flatten(), params.max_rendering_blocks);
    if dropped_blocks > 0 {
        tracing::warn!(
            dropped_blocks,
            capacity = params.max_rendering_blocks,
            "rendering block capacity exceeded; depth bounds are looser this frame"
        );
    }

    let data = min_max.data_mut(B::MEMORY);
    let used_fallback = blocks.is_empty();
    if used_fallback {
        data.fill(Vec2::new(params.view_frustum_min, params.view_frustum_max));
    } else {
        data.fill(Vec2::new(FAR_AWAY, VERY_CLOSE));
        merge_rendering_blocks(data, width, &blocks);
    }
    tracing::trace!(
        backend = B::NAME,
        candidates = candidates.len(),
        rendering_blocks = blocks.len(),
        used_fallback,
        "planned depth bounds"
    );
    DepthBoundsReport {
        rendering_blocks: blocks.len(),
        dropped_blocks,
        used_fallback,
    }
}
