//! # Voxel Block Hash
//!
//! Maps integer block coordinates to slots in the local voxel arena.
//!
//! The table holds `bucket_count` ordered entries, one per hash bucket,
//! followed by `excess_count` excess entries. Colliding coordinates are
//! chained from their bucket through the excess list via
//! [`HashEntry::offset`]: `0` ends the chain, `k` continues at excess entry
//! `k - 1`.

use glam::IVec3;

/// State of a hash entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Unused entry.
    #[default]
    Free,
    /// Block resident in the local arena at this block index.
    Allocated(u32),
    /// Block swapped out to the global cache at this index.
    PendingTransfer(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashEntry {
    /// Block coordinate, in units of whole blocks.
    pub pos: IVec3,
    /// Link to the next entry of the bucket chain.
    pub offset: u32,
    pub state: SlotState,
}

impl HashEntry {
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.state == SlotState::Free
    }

    /// Arena block index if the block is resident.
    #[must_use]
    pub fn ptr(&self) -> Option<usize> {
        match self.state {
            SlotState::Allocated(ptr) => Some(ptr as usize),
            _ => None,
        }
    }
}

/// Bucket of block coordinate `pos` in a table with `bucket_count` buckets.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn hash_index(pos: IVec3, bucket_count: usize) -> usize {
    let x = (pos.x as u32).wrapping_mul(73_856_093);
    let y = (pos.y as u32).wrapping_mul(19_349_669);
    let z = (pos.z as u32).wrapping_mul(83_492_791);
    (x ^ y ^ z) as usize & (bucket_count - 1)
}

/// Walks the chain of `pos` and returns the slot holding it.
#[must_use]
pub fn find_entry(entries: &[HashEntry], bucket_count: usize, pos: IVec3) -> Option<usize> {
    let mut slot = hash_index(pos, bucket_count);
    loop {
        let entry = entries.get(slot)?;
        if !entry.is_free() && entry.pos == pos {
            return Some(slot);
        }
        if entry.offset == 0 {
            return None;
        }
        slot = bucket_count + entry.offset as usize - 1;
    }
}

#[derive(Debug, Clone)]
pub struct VoxelBlockHash {
    entries: Vec<HashEntry>,
    bucket_count: usize,
    excess_free: Vec<u32>,
}

impl VoxelBlockHash {
    /// Creates an empty table. `bucket_count` must be a power of two.
    #[must_use]
    pub fn new(bucket_count: usize, excess_count: usize) -> Self {
        debug_assert!(bucket_count.is_power_of_two());
        #[allow(clippy::cast_possible_truncation)]
        let excess_free = (0..excess_count as u32).rev().collect();
        Self {
            entries: vec![HashEntry::default(); bucket_count + excess_count],
            bucket_count,
            excess_free,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, slot: usize) -> Option<&HashEntry> {
        self.entries.get(slot)
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Total number of entries, ordered and excess.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unused excess entries.
    #[must_use]
    pub fn excess_remaining(&self) -> usize {
        self.excess_free.len()
    }

    #[must_use]
    pub fn find(&self, pos: IVec3) -> Option<usize> {
        find_entry(&self.entries, self.bucket_count, pos)
    }

    /// Inserts `pos` with `state` and returns its slot. An existing entry for
    /// `pos` is returned untouched. Returns `None` when the bucket is taken
    /// and the excess list is exhausted.
    pub fn insert(&mut self, pos: IVec3, state: SlotState) -> Option<usize> {
        if let Some(slot) = self.find(pos) {
            return Some(slot);
        }
        let mut slot = hash_index(pos, self.bucket_count);
        if self.entries[slot].is_free() {
            let offset = self.entries[slot].offset;
            self.entries[slot] = HashEntry { pos, offset, state };
            return Some(slot);
        }
        while self.entries[slot].offset != 0 {
            slot = self.bucket_count + self.entries[slot].offset as usize - 1;
        }
        let Some(excess) = self.excess_free.pop() else {
            tracing::warn!(?pos, "hash excess list exhausted");
            return None;
        };
        let tail = self.bucket_count + excess as usize;
        self.entries[tail] = HashEntry {
            pos,
            offset: 0,
            state,
        };
        self.entries[slot].offset = excess + 1;
        Some(tail)
    }

    /// Updates the state of an occupied slot.
    pub fn set_state(&mut self, slot: usize, state: SlotState) {
        if let Some(entry) = self.entries.get_mut(slot) {
            entry.state = state;
        }
    }

    /// Slots whose block is resident in the arena.
    pub fn allocated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.ptr().is_some())
            .map(|(slot, _)| slot)
    }
}
