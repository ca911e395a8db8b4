//! Voxel lookups used by the ray marcher and the projectors.
//!
//! Points are given in voxel units. Voxels of blocks that are not resident
//! read as the default voxel (`sdf = 1`, zero weight).

use glam::{IVec3, Vec3, Vec4};

use super::hash::{find_entry, HashEntry};
use super::voxel::Voxel;
use super::{split_voxel_coord, Scene, SDF_BLOCK_SIZE3};

/// Remembers the most recently resolved block so neighbouring lookups along
/// a ray skip the hash walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockCache {
    last: Option<(IVec3, Option<usize>)>,
}

/// Borrowed, read-only view of a scene's hash and voxel arena.
#[derive(Clone, Copy)]
pub struct SceneView<'a, V> {
    entries: &'a [HashEntry],
    voxels: &'a [V],
    bucket_count: usize,
}

impl<'a, V: Voxel> SceneView<'a, V> {
    #[must_use]
    pub fn new(scene: &'a Scene<V>) -> Self {
        Self {
            entries: scene.index.entries(),
            voxels: scene.local_vba.voxels(),
            bucket_count: scene.index.bucket_count(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &'a [HashEntry] {
        self.entries
    }

    /// Arena index of the resident block at block coordinate `pos`.
    #[must_use]
    pub fn find_block(&self, pos: IVec3, cache: &mut BlockCache) -> Option<usize> {
        if let Some((cached, ptr)) = cache.last {
            if cached == pos {
                return ptr;
            }
        }
        let ptr = find_entry(self.entries, self.bucket_count, pos)
            .and_then(|slot| self.entries[slot].ptr());
        cache.last = Some((pos, ptr));
        ptr
    }

    /// Voxel at integer voxel coordinate `point`, or `None` if its block is
    /// not resident.
    #[must_use]
    pub fn read_voxel(&self, point: IVec3, cache: &mut BlockCache) -> Option<V> {
        let (block, index) = split_voxel_coord(point);
        let ptr = self.find_block(block, cache)?;
        self.voxels.get(ptr * SDF_BLOCK_SIZE3 + index).copied()
    }

    fn voxel_or_default(&self, point: IVec3, cache: &mut BlockCache) -> V {
        self.read_voxel(point, cache).unwrap_or_default()
    }

    /// Distance of the voxel nearest to `point`, or `None` if its block is
    /// not resident.
    #[must_use]
    pub fn sdf_uninterpolated(&self, point: Vec3, cache: &mut BlockCache) -> Option<f32> {
        self.read_voxel(point.round().as_ivec3(), cache)
            .map(|voxel| voxel.sdf())
    }

    /// Segment label of the voxel nearest to `point`, `0` if its block is
    /// not resident.
    #[must_use]
    pub fn id_uninterpolated(&self, point: Vec3, cache: &mut BlockCache) -> u32 {
        self.read_voxel(point.round().as_ivec3(), cache)
            .map_or(0, |voxel| voxel.id())
    }

    /// Trilinearly interpolated distance at `point`.
    #[must_use]
    pub fn sdf_interpolated(&self, point: Vec3, cache: &mut BlockCache) -> f32 {
        let base = point.floor();
        let coeff = point - base;
        let base = base.as_ivec3();
        let mut sdf = 0.0;
        for (offset, weight) in trilinear_corners(coeff) {
            sdf += weight * self.voxel_or_default(base + offset, cache).sdf();
        }
        sdf
    }

    /// Trilinear colour at `point` over corners that have observed colour.
    /// Returns `(r, g, b)` in `[0, 1]` scaled by the accumulated weight in
    /// `w`; divide by `w` to normalise.
    #[must_use]
    pub fn colour_interpolated(&self, point: Vec3, cache: &mut BlockCache) -> Vec4 {
        let base = point.floor();
        let coeff = point - base;
        let base = base.as_ivec3();
        let mut colour = Vec3::ZERO;
        let mut total = 0.0;
        for (offset, weight) in trilinear_corners(coeff) {
            let voxel = self.voxel_or_default(base + offset, cache);
            if voxel.colour_weight() == 0 {
                continue;
            }
            let [r, g, b] = voxel.colour();
            colour += weight * Vec3::new(f32::from(r), f32::from(g), f32::from(b)) / 255.0;
            total += weight;
        }
        colour.extend(total)
    }

    /// Unit surface normal from central differences of the interpolated
    /// distance one voxel either side of `point`.
    #[must_use]
    pub fn normal(&self, point: Vec3, cache: &mut BlockCache) -> Vec3 {
        let gradient = Vec3::new(
            self.sdf_interpolated(point + Vec3::X, cache)
                - self.sdf_interpolated(point - Vec3::X, cache),
            self.sdf_interpolated(point + Vec3::Y, cache)
                - self.sdf_interpolated(point - Vec3::Y, cache),
            self.sdf_interpolated(point + Vec3::Z, cache)
                - self.sdf_interpolated(point - Vec3::Z, cache),
        );
        gradient.normalize_or_zero()
    }
}

fn trilinear_corners(coeff: Vec3) -> [(IVec3, f32); 8] {
    let (cx, cy, cz) = (coeff.x, coeff.y, coeff.z);
    let (ix, iy, iz) = (1.0 - cx, 1.0 - cy, 1.0 - cz);
    [
        (IVec3::new(0, 0, 0), ix * iy * iz),
        (IVec3::new(1, 0, 0), cx * iy * iz),
        (IVec3::new(0, 1, 0), ix * cy * iz),
        (IVec3::new(1, 1, 0), cx * cy * iz),
        (IVec3::new(0, 0, 1), ix * iy * cz),
        (IVec3::new(1, 0, 1), cx * iy * cz),
        (IVec3::new(0, 1, 1), ix * cy * cz),
        (IVec3::new(1, 1, 1), cx * cy * cz),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{VoxelF, VoxelRgb};
    use crate::settings::SceneParams;

    fn ramp_scene() -> Scene<VoxelF> {
        let params = SceneParams {
            bucket_count: 64,
            excess_count: 8,
            max_blocks: 4,
            ..SceneParams::default()
        };
        let mut scene: Scene<VoxelF> = Scene::new(params, false);
        let slot = scene.allocate_block(IVec3::ZERO).unwrap();
        let block = scene.block_mut(slot).unwrap();
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    let index = crate::scene::voxel_index_in_block(IVec3::new(x, y, z));
                    #[allow(clippy::cast_precision_loss)]
                    block[index].set_sdf(0.1 * x as f32 - 0.3);
                }
            }
        }
        scene
    }

    #[test]
    fn missing_blocks_read_as_none() {
        let scene = ramp_scene();
        let view = scene.view();
        let mut cache = BlockCache::default();
        assert!(view.sdf_uninterpolated(Vec3::new(-3.0, 0.0, 0.0), &mut cache).is_none());
        assert!(view.sdf_uninterpolated(Vec3::new(2.2, 1.0, 1.0), &mut cache).is_some());
    }

    #[test]
    fn interpolation_follows_the_ramp() {
        let scene = ramp_scene();
        let view = scene.view();
        let mut cache = BlockCache::default();
        let sdf = view.sdf_interpolated(Vec3::new(2.5, 3.0, 3.0), &mut cache);
        assert!((sdf - (-0.05)).abs() < 1e-5, "sdf={sdf}");
        let normal = view.normal(Vec3::new(3.0, 3.0, 3.0), &mut cache);
        assert!(normal.abs_diff_eq(Vec3::X, 1e-5), "normal={normal}");
    }

    #[test]
    fn colour_ignores_unobserved_corners() {
        let params = SceneParams {
            bucket_count: 64,
            excess_count: 8,
            max_blocks: 2,
            ..SceneParams::default()
        };
        let mut scene = Scene::<VoxelRgb>::new(params, false);
        let slot = scene.allocate_block(IVec3::ZERO).unwrap();
        scene.block_mut(slot).unwrap()[0].set_colour([255, 0, 0], 1);
        let mut cache = BlockCache::default();
        let colour = scene.view().colour_interpolated(Vec3::new(0.5, 0.0, 0.0), &mut cache);
        assert!((colour.w - 0.5).abs() < 1e-6);
        assert!((colour.x / colour.w - 1.0).abs() < 1e-6);
        assert!(colour.y.abs() < 1e-6);
    }
}
