//! Global counters.
//!
//! A counter is a single owned 32-bit cell. Allocation and release happen in
//! user context inside a critical section; increment, decrement and read run
//! only inside the trap dispatcher, which serializes them against all
//! scheduling. Handles are opaque `u32`s so they travel in one saved GP
//! register; a stale or fabricated handle fails the generation check and is
//! treated exactly like an unknown pointer in the old ABI (writes ignored,
//! reads zero).

use crate::config::MAX_GLOBAL_COUNTERS;

/// Opaque handle to an allocated global counter.
///
/// Packs a table index in the low half and a nonzero generation in the high
/// half; raw value 0 is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterHandle(u32);

impl CounterHandle {
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

struct CounterSlot {
    generation: u16,
    value: u32,
}

/// Fixed-capacity table of global counters.
pub struct CounterTable {
    slots: [Option<CounterSlot>; MAX_GLOBAL_COUNTERS],
    generations: [u16; MAX_GLOBAL_COUNTERS],
}

impl CounterTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            generations: [0; MAX_GLOBAL_COUNTERS],
        }
    }

    /// Allocate a counter holding `initial`, or `None` when the table is
    /// full.
    pub fn init(&mut self, initial: u32) -> Option<CounterHandle> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                let generation = next_generation(&mut self.generations[i]);
                *slot = Some(CounterSlot {
                    generation,
                    value: initial,
                });
                return Some(CounterHandle::pack(i, generation));
            }
        }
        None
    }

    /// Release a counter. Unknown handles are ignored.
    pub fn free(&mut self, handle: CounterHandle) {
        if self.lookup(handle).is_some() {
            self.slots[handle.index()] = None;
        }
    }

    /// Drop every counter.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    /// `counter += 1`, wrapping. Unknown handles are ignored.
    pub fn increment(&mut self, handle: CounterHandle) {
        if let Some(slot) = self.lookup_mut(handle) {
            slot.value = slot.value.wrapping_add(1);
        }
    }

    /// `counter -= 1`, saturating at zero. Unknown handles are ignored.
    pub fn decrement(&mut self, handle: CounterHandle) {
        if let Some(slot) = self.lookup_mut(handle) {
            if slot.value > 0 {
                slot.value -= 1;
            }
        }
    }

    /// Current value, or 0 for unknown handles.
    pub fn value(&self, handle: CounterHandle) -> u32 {
        self.lookup(handle).map_or(0, |slot| slot.value)
    }

    fn lookup(&self, handle: CounterHandle) -> Option<&CounterSlot> {
        self.slots
            .get(handle.index())?
            .as_ref()
            .filter(|slot| slot.generation == handle.generation())
    }

    fn lookup_mut(&mut self, handle: CounterHandle) -> Option<&mut CounterSlot> {
        self.slots
            .get_mut(handle.index())?
            .as_mut()
            .filter(|slot| slot.generation == handle.generation())
    }
}

impl Default for CounterTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Bump a per-slot generation, skipping 0 so a packed handle is never raw 0.
pub(crate) fn next_generation(generation: &mut u16) -> u16 {
    *generation = generation.wrapping_add(1);
    if *generation == 0 {
        *generation = 1;
    }
    *generation
}
