/// Host-side store for blocks swapped out of the local arena.
#[derive(Debug, Clone, Default)]
pub struct GlobalCache<V> {
    blocks: Vec<Option<Box<[V]>>>,
    free: Vec<u32>,
}

impl<V: Copy> GlobalCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Stores a copy of `block` and returns its index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn store(&mut self, block: &[V]) -> u32 {
        let data: Box<[V]> = block.into();
        if let Some(index) = self.free.pop() {
            self.blocks[index as usize] = Some(data);
            index
        } else {
            self.blocks.push(Some(data));
            (self.blocks.len() - 1) as u32
        }
    }

    /// Removes and returns the block at `index`, freeing the slot for reuse.
    pub fn take(&mut self, index: u32) -> Option<Box<[V]>> {
        let block = self.blocks.get_mut(index as usize)?.take()?;
        self.free.push(index);
        Some(block)
    }

    /// Number of blocks currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
