use super::SceneSegmentation;
use crate::scene::{Scene, Voxel};

/// Flips the label of every even voxel of each resident block between `0`
/// and `1`, leaving odd voxels untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlternatingLabelSegmentation;

impl AlternatingLabelSegmentation {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<V: Voxel> SceneSegmentation<V> for AlternatingLabelSegmentation {
    fn segment(&self, scene: &mut Scene<V>) {
        let blocks: Vec<usize> = scene
            .index
            .allocated_slots()
            .filter_map(|slot| scene.index.entry(slot).and_then(|e| e.ptr()))
            .collect();
        for &ptr in &blocks {
            for voxel in scene.local_vba.block_mut(ptr).iter_mut().step_by(2) {
                voxel.set_id(u32::from(voxel.id() == 0));
            }
        }
        tracing::debug!(blocks = blocks.len(), "relabelled voxels");
    }
}
