use super::SwappingEngine;
use crate::scene::{GlobalCache, Scene, SlotState, Voxel};
use crate::view::View;

/// Keeps exactly the blocks touched by the current frame resident.
///
/// Blocks the frame needs are restored from the global cache; every other
/// resident block is parked there, freeing its arena slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceSwappingEngine;

impl ReferenceSwappingEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<V: Voxel> SwappingEngine<V> for ReferenceSwappingEngine {
    fn integrate_global_into_local(&self, scene: &mut Scene<V>, _view: &View) {
        let Some(cache) = scene.global_cache.as_mut() else {
            return;
        };
        let mut restored = 0;
        for &slot in &scene.live_entries {
            let slot = slot as usize;
            let Some(SlotState::PendingTransfer(index)) = scene.index.entry(slot).map(|e| e.state)
            else {
                continue;
            };
            let Some(ptr) = scene.local_vba.allocate() else {
                tracing::warn!("voxel block arena exhausted while swapping in");
                break;
            };
            let Some(block) = cache.take(index) else {
                scene.local_vba.release(ptr);
                continue;
            };
            scene.local_vba.block_mut(ptr as usize).copy_from_slice(&block);
            scene.index.set_state(slot, SlotState::Allocated(ptr));
            restored += 1;
        }
        tracing::debug!(restored, "swapped blocks in");
    }

    #[allow(clippy::cast_possible_truncation)]
    fn save_to_global_memory(&self, scene: &mut Scene<V>, _view: &View) {
        let cache = scene.global_cache.get_or_insert_with(GlobalCache::new);
        let mut parked = 0;
        let mut live = scene.live_entries.iter().peekable();
        for slot in 0..scene.index.len() {
            while live.next_if(|&&l| (l as usize) < slot).is_some() {}
            if live.peek().is_some_and(|&&l| l as usize == slot) {
                continue;
            }
            let Some(ptr) = scene.index.entry(slot).and_then(|e| e.ptr()) else {
                continue;
            };
            let index = cache.store(scene.local_vba.block(ptr));
            scene.local_vba.release(ptr as u32);
            scene.index.set_state(slot, SlotState::PendingTransfer(index));
            parked += 1;
        }
        tracing::debug!(parked, cached = cache.len(), "swapped blocks out");
    }
}
