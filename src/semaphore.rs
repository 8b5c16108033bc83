//! Counting semaphores.
//!
//! A semaphore is a `{max, current}` pair created full. Acquire and release
//! are trap-based so they can block and wake through the scheduler; the
//! tables here only hold the counts. Handles follow the same packed
//! index+generation scheme as counters.

use crate::config::MAX_SEMAPHORES;
use crate::counter::next_generation;

/// Opaque handle to an allocated semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreHandle(u32);

impl SemaphoreHandle {
    pub(crate) fn pack(index: usize, generation: u16) -> Self {
        Self(((generation as u32) << 16) | index as u32)
    }

    /// Reconstruct a handle from its raw trap-argument form.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw trap-argument form.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

/// A semaphore record. `current <= max` holds at every trap boundary.
pub struct Semaphore {
    generation: u16,
    max: u32,
    current: u32,
}

impl Semaphore {
    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Take one permit if any remain.
    pub fn try_acquire(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Return one permit, saturating at `max`.
    pub fn release(&mut self) {
        if self.current < self.max {
            self.current += 1;
        }
    }
}

/// Fixed-capacity table of semaphores.
pub struct SemaphoreTable {
    slots: [Option<Semaphore>; MAX_SEMAPHORES],
    generations: [u16; MAX_SEMAPHORES],
}

impl SemaphoreTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            generations: [0; MAX_SEMAPHORES],
        }
    }

    /// Allocate a semaphore with `max` permits, all available, or `None`
    /// when the table is full.
    pub fn init(&mut self, max: u32) -> Option<SemaphoreHandle> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                let generation = next_generation(&mut self.generations[i]);
                *slot = Some(Semaphore {
                    generation,
                    max,
                    current: max,
                });
                return Some(SemaphoreHandle::pack(i, generation));
            }
        }
        None
    }

    /// Release a semaphore. Unknown handles are ignored. Threads still
    /// blocked on it are the caller's problem, as with destroying a thread
    /// that holds references.
    pub fn free(&mut self, handle: SemaphoreHandle) {
        if self.get(handle).is_some() {
            self.slots[handle.index()] = None;
        }
    }

    /// Drop every semaphore.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn get(&self, handle: SemaphoreHandle) -> Option<&Semaphore> {
        self.slots
            .get(handle.index())?
            .as_ref()
            .filter(|s| s.generation == handle.generation())
    }

    pub fn get_mut(&mut self, handle: SemaphoreHandle) -> Option<&mut Semaphore> {
        self.slots
            .get_mut(handle.index())?
            .as_mut()
            .filter(|s| s.generation == handle.generation())
    }
}

impl Default for SemaphoreTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_full() {
        let mut table = SemaphoreTable::new();
        let h = table.init(3).unwrap();
        let sem = table.get(h).unwrap();
        assert_eq!(sem.max(), 3);
        assert_eq!(sem.current(), 3);
    }

    #[test]
    fn test_acquire_release_bounds() {
        let mut table = SemaphoreTable::new();
        let h = table.init(2).unwrap();
        let sem = table.get_mut(h).unwrap();

        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());

        sem.release();
        sem.release();
        sem.release();
        assert_eq!(sem.current(), 2);
    }

    #[test]
    fn test_stale_handle() {
        let mut table = SemaphoreTable::new();
        let h = table.init(1).unwrap();
        table.free(h);
        let h2 = table.init(1).unwrap();
        assert!(table.get(h).is_none());
        assert!(table.get(h2).is_some());
    }
}
