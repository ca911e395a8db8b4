//! # Append Buffer
//!
//! Lock-free, capacity-bounded append into a borrowed slice. Concurrent
//! producers reserve slots with a single atomic `fetch_add`, so accepted
//! elements are packed densely from index 0 in reservation order.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct AppendBuffer<'a, T> {
    slots: &'a [UnsafeCell<T>],
    next: AtomicUsize,
}

// SAFETY: every write goes to a slot index handed out exactly once by
// `next.fetch_add`, so no two threads ever touch the same `UnsafeCell`.
// Reads only happen through `&mut self` or after the buffer is consumed.
unsafe impl<T: Send> Sync for AppendBuffer<'_, T> {}

impl<'a, T: Copy> AppendBuffer<'a, T> {
    /// Wraps `storage`; the buffer starts empty and can hold `storage.len()`
    /// elements.
    pub fn new(storage: &'a mut [T]) -> Self {
        // SAFETY: `UnsafeCell<T>` is `repr(transparent)` over `T`, and the
        // exclusive borrow guarantees nothing else observes the slice while
        // the buffer exists.
        let slots = unsafe { &*(storage as *mut [T] as *const [UnsafeCell<T>]) };
        Self {
            slots,
            next: AtomicUsize::new(0),
        }
    }

    /// Appends `value`, returning its slot, or `None` once the buffer is full.
    pub fn push(&self, value: T) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        let slot = self.slots.get(index)?;
        // SAFETY: `index` was reserved by this call alone.
        unsafe { *slot.get() = value };
        Some(index)
    }

    /// Consumes the buffer and returns the number of elements written.
    pub fn into_len(self) -> usize {
        self.next.into_inner().min(self.slots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn concurrent_pushes_are_dense_and_unique() {
        let mut storage = vec![u32::MAX; 1000];
        let count = {
            let buffer = AppendBuffer::new(&mut storage);
            (0..1000u32).into_par_iter().for_each(|i| {
                if i % 3 == 0 {
                    buffer.push(i);
                }
            });
            buffer.into_len()
        };
        assert_eq!(count, 334);

        let mut written: Vec<u32> = storage[..count].to_vec();
        assert!(storage[count..].iter().all(|&v| v == u32::MAX));
        written.sort_unstable();
        let expected: Vec<u32> = (0..1000).filter(|i| i % 3 == 0).collect();
        assert_eq!(written, expected);
    }

    #[test]
    fn push_past_capacity_is_rejected() {
        let mut storage = [0u8; 2];
        let buffer = AppendBuffer::new(&mut storage);
        assert_eq!(buffer.push(1), Some(0));
        assert_eq!(buffer.push(2), Some(1));
        assert_eq!(buffer.push(3), None);
        assert_eq!(buffer.push(4), None);
        assert_eq!(buffer.into_len(), 2);
        assert_eq!(storage, [1, 2]);
    }
}
