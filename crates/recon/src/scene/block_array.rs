use super::voxel::Voxel;
use super::SDF_BLOCK_SIZE3;

/// Dense arena of voxel blocks with a free list of block indices.
#[derive(Debug, Clone)]
pub struct LocalVoxelBlockArray<V> {
    voxels: Vec<V>,
    free: Vec<u32>,
    capacity: usize,
}

impl<V: Voxel> LocalVoxelBlockArray<V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let free = (0..capacity as u32).rev().collect();
        Self {
            voxels: vec![V::default(); capacity * SDF_BLOCK_SIZE3],
            free,
            capacity,
        }
    }

    /// Takes a block from the free list and resets it to default voxels.
    pub fn allocate(&mut self) -> Option<u32> {
        let ptr = self.free.pop()?;
        self.block_mut(ptr as usize).fill(V::default());
        Some(ptr)
    }

    /// Returns a block to the free list.
    pub fn release(&mut self, ptr: u32) {
        debug_assert!(!self.free.contains(&ptr));
        self.free.push(ptr);
    }

    #[must_use]
    pub fn voxels(&self) -> &[V] {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut [V] {
        &mut self.voxels
    }

    #[must_use]
    pub fn block(&self, ptr: usize) -> &[V] {
        &self.voxels[ptr * SDF_BLOCK_SIZE3..(ptr + 1) * SDF_BLOCK_SIZE3]
    }

    pub fn block_mut(&mut self, ptr: usize) -> &mut [V] {
        &mut self.voxels[ptr * SDF_BLOCK_SIZE3..(ptr + 1) * SDF_BLOCK_SIZE3]
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.capacity - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::VoxelF;

    #[test]
    fn allocation_resets_and_exhausts() {
        let mut arena = LocalVoxelBlockArray::<VoxelF>::new(2);
        let first = arena.allocate().unwrap();
        assert_eq!(first, 0);
        arena.block_mut(0)[5].set_sdf(-0.5);
        arena.release(first);
        let again = arena.allocate().unwrap();
        assert!((arena.block(again as usize)[5].sdf() - 1.0).abs() < 1e-6);
        assert!(arena.allocate().is_some());
        assert!(arena.allocate().is_none());
        assert_eq!(arena.allocated_count(), 2);
    }
}
