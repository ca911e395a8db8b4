//! # Scene
//!
//! A sparse signed-distance volume. Space is divided into blocks of
//! `8 x 8 x 8` voxels; a [`VoxelBlockHash`] maps block coordinates to blocks
//! in the [`LocalVoxelBlockArray`]. With swapping enabled, blocks leaving
//! the working set are parked in a [`GlobalCache`].

mod access;
mod block_array;
mod global_cache;
mod hash;
mod voxel;

pub use access::{BlockCache, SceneView};
pub use block_array::LocalVoxelBlockArray;
pub use global_cache::GlobalCache;
pub use hash::{find_entry, hash_index, HashEntry, SlotState, VoxelBlockHash};
pub use voxel::{Voxel, VoxelF, VoxelRgb};

use glam::IVec3;

use crate::settings::SceneParams;

/// Edge length of a voxel block, in voxels.
pub const SDF_BLOCK_SIZE: i32 = 8;
/// Voxels per block.
pub const SDF_BLOCK_SIZE3: usize = 512;

/// Linear index of a voxel inside its block, from its local coordinate.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn voxel_index_in_block(local: IVec3) -> usize {
    (local.x + local.y * SDF_BLOCK_SIZE + local.z * SDF_BLOCK_SIZE * SDF_BLOCK_SIZE) as usize
}

/// Splits a voxel coordinate into its block coordinate and the linear index
/// inside that block.
#[must_use]
pub fn split_voxel_coord(point: IVec3) -> (IVec3, usize) {
    let block = point >> 3;
    let local = point & (SDF_BLOCK_SIZE - 1);
    (block, voxel_index_in_block(local))
}

pub struct Scene<V> {
    pub params: SceneParams,
    pub use_swapping: bool,
    pub index: VoxelBlockHash,
    pub local_vba: LocalVoxelBlockArray<V>,
    pub global_cache: Option<GlobalCache<V>>,
    /// Hash slots touched by the most recent depth frame.
    pub live_entries: Vec<u32>,
}

impl<V: Voxel> Scene<V> {
    #[must_use]
    pub fn new(params: SceneParams, use_swapping: bool) -> Self {
        tracing::info!(
            buckets = params.bucket_count,
            excess = params.excess_count,
            blocks = params.max_blocks,
            use_swapping,
            "Allocating scene."
        );
        Self {
            params,
            use_swapping,
            index: VoxelBlockHash::new(params.bucket_count, params.excess_count),
            local_vba: LocalVoxelBlockArray::new(params.max_blocks),
            global_cache: use_swapping.then(GlobalCache::new),
            live_entries: Vec::new(),
        }
    }

    /// Read-only accessor over the resident voxels.
    #[must_use]
    pub fn view(&self) -> SceneView<'_, V> {
        SceneView::new(self)
    }

    /// Returns the slot of block `pos`, allocating an arena block for it if
    /// the coordinate is new. `None` when the arena or the hash is full, or
    /// when the block is swapped out.
    pub fn allocate_block(&mut self, pos: IVec3) -> Option<usize> {
        if let Some(slot) = self.index.find(pos) {
            return self.index.entries()[slot].ptr().map(|_| slot);
        }
        let Some(ptr) = self.local_vba.allocate() else {
            tracing::warn!(?pos, "voxel block arena exhausted");
            return None;
        };
        let slot = self.index.insert(pos, SlotState::Allocated(ptr));
        if slot.is_none() {
            self.local_vba.release(ptr);
        }
        slot
    }

    /// Voxels of the resident block in hash slot `slot`.
    #[must_use]
    pub fn block(&self, slot: usize) -> Option<&[V]> {
        let ptr = self.index.entry(slot)?.ptr()?;
        Some(self.local_vba.block(ptr))
    }

    pub fn block_mut(&mut self, slot: usize) -> Option<&mut [V]> {
        let ptr = self.index.entry(slot)?.ptr()?;
        Some(self.local_vba.block_mut(ptr))
    }

    /// Number of hash entries with a resident block.
    #[must_use]
    pub fn allocated_block_count(&self) -> usize {
        self.local_vba.allocated_count()
    }

    /// Number of blocks parked in the global cache.
    #[must_use]
    pub fn swapped_out_count(&self) -> usize {
        self.global_cache.as_ref().map_or(0, GlobalCache::len)
    }

    /// World-space edge length of a block.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn block_size_world(&self) -> f32 {
        SDF_BLOCK_SIZE as f32 * self.params.voxel_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> SceneParams {
        SceneParams {
            bucket_count: 64,
            excess_count: 8,
            max_blocks: 4,
            ..SceneParams::default()
        }
    }

    #[test]
    fn voxel_coordinates_split_with_floor_semantics() {
        assert_eq!(split_voxel_coord(IVec3::new(9, 0, 0)), (IVec3::new(1, 0, 0), 1));
        assert_eq!(
            split_voxel_coord(IVec3::new(-1, -8, 0)),
            (IVec3::new(-1, -1, 0), 7)
        );
        assert_eq!(split_voxel_coord(IVec3::new(0, 0, 15)), (IVec3::new(0, 0, 1), 448));
    }

    #[test]
    fn allocate_block_is_idempotent_and_bounded() {
        let mut scene = Scene::<VoxelF>::new(small_params(), false);
        let slot = scene.allocate_block(IVec3::new(1, 2, 3)).unwrap();
        assert_eq!(scene.allocate_block(IVec3::new(1, 2, 3)), Some(slot));
        assert_eq!(scene.allocated_block_count(), 1);
        for x in 0..3 {
            assert!(scene.allocate_block(IVec3::new(x, 0, 0)).is_some());
        }
        assert_eq!(scene.allocate_block(IVec3::new(9, 9, 9)), None);
        assert_eq!(scene.index.find(IVec3::new(9, 9, 9)), None);
    }

    #[test]
    fn swapping_scene_has_a_global_cache() {
        let scene = Scene::<VoxelRgb>::new(small_params(), true);
        assert!(scene.global_cache.is_some());
        assert_eq!(scene.swapped_out_count(), 0);
    }
}
