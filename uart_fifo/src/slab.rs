use core::fmt;

use fifostd::IrqMutex;

use crate::error::Error;

/// Index of a slot in a slab's arena.
pub(crate) type SlotIndex = u16;

#[derive(Clone, Copy)]
pub(crate) struct Slot {
    pub(crate) byte: u8,
    /// Free-list link while free, queue link while queued.
    pub(crate) next: Option<SlotIndex>,
    live: bool,
}

impl Slot {
    const VACANT: Self = Self {
        byte: 0,
        next: None,
        live: false,
    };
}

pub(crate) struct Arena<const N: usize> {
    slots: [Slot; N],
    free: Option<SlotIndex>,
    in_use: usize,
    peak: usize,
}

impl<const N: usize> Arena<N> {
    fn take(&mut self) -> Option<SlotIndex> {
        let index = self.free?;
        let slot = &mut self.slots[index as usize];

        self.free = slot.next.take();
        slot.byte = 0;
        slot.live = true;

        self.in_use += 1;
        self.peak = self.peak.max(self.in_use);

        Some(index)
    }

    fn put(&mut self, index: SlotIndex) {
        let slot = &mut self.slots[index as usize];
        assert!(slot.live, "slot {index} freed while not allocated");

        slot.live = false;
        slot.next = self.free;
        self.free = Some(index);
        self.in_use -= 1;
    }

    pub(crate) fn slot_mut(&mut self, index: SlotIndex) -> &mut Slot {
        &mut self.slots[index as usize]
    }
}

/// Fixed-capacity pool of byte elements, usable from interrupt context.
///
/// Free slots are kept on an intrusive list threaded through the arena, so both
/// [`Slab::alloc`] and freeing are O(1) and never wait on anything but a short
/// interrupt-masked lock.
pub struct Slab<const N: usize> {
    arena: IrqMutex<Arena<N>>,
}

impl<const N: usize> Slab<N> {
    /// Creates a slab with all `N` slots free.
    ///
    /// # Panics
    /// If `N` is zero or doesn't fit a slot index.
    pub const fn new() -> Self {
        assert!(
            N > 0 && N <= SlotIndex::MAX as usize,
            "slab capacity must be between 1 and 65535"
        );

        let mut slots = [Slot::VACANT; N];
        let mut index = 0;
        while index + 1 < N {
            slots[index].next = Some((index + 1) as SlotIndex);
            index += 1;
        }

        Self {
            arena: IrqMutex::new(Arena {
                slots,
                free: Some(0),
                in_use: 0,
                peak: 0,
            }),
        }
    }

    /// Hands out a zeroed element, or [`Error::Exhausted`] if every slot is in use.
    pub fn alloc(&self) -> Result<Element<'_, N>, Error> {
        let index = self.arena.with(Arena::take).ok_or(Error::Exhausted)?;

        Ok(Element { slab: self, index })
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of elements currently handed out.
    pub fn in_use(&self) -> usize {
        self.arena.with(|arena| arena.in_use)
    }

    pub fn available(&self) -> usize {
        N - self.in_use()
    }

    /// Highest number of elements ever handed out at once.
    pub fn peak(&self) -> usize {
        self.arena.with(|arena| arena.peak)
    }

    pub(crate) fn with_arena<R>(&self, f: impl FnOnce(&mut Arena<N>) -> R) -> R {
        self.arena.with(f)
    }
}

impl<const N: usize> Default for Slab<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for Slab<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("capacity", &N)
            .field("in_use", &self.in_use())
            .field("peak", &self.peak())
            .finish()
    }
}

/// Exclusive handle to one allocated slot.
///
/// Handles can't be copied, and dropping one returns its slot to the slab, so a
/// slot is never freed twice and never outlives its owner.
pub struct Element<'s, const N: usize> {
    slab: &'s Slab<N>,
    index: SlotIndex,
}

impl<'s, const N: usize> Element<'s, N> {
    /// The payload byte.
    pub fn get(&self) -> u8 {
        self.slab
            .with_arena(|arena| arena.slot_mut(self.index).byte)
    }

    pub fn set(&mut self, byte: u8) {
        self.slab
            .with_arena(|arena| arena.slot_mut(self.index).byte = byte);
    }

    /// Returns the slot to the slab. Same as dropping the handle.
    pub fn free(self) {
        drop(self)
    }

    pub(crate) fn belongs_to(&self, slab: &Slab<N>) -> bool {
        core::ptr::eq(self.slab, slab)
    }

    /// Gives up the handle without freeing the slot, for a queue to link it.
    pub(crate) fn into_raw(self) -> SlotIndex {
        let index = self.index;
        core::mem::forget(self);

        index
    }

    /// Rebuilds the handle for a slot a queue just unlinked.
    pub(crate) fn from_raw(slab: &'s Slab<N>, index: SlotIndex) -> Self {
        Self { slab, index }
    }
}

impl<const N: usize> Drop for Element<'_, N> {
    fn drop(&mut self) {
        let index = self.index;
        self.slab.with_arena(|arena| arena.put(index));
    }
}

impl<const N: usize> fmt::Debug for Element<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("index", &self.index)
            .field("byte", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_distinct_slots_until_exhausted() {
        let slab: Slab<4> = Slab::new();
        let elements: Vec<_> = (0..4).map(|_| slab.alloc().unwrap()).collect();

        let mut indices: Vec<_> = elements.iter().map(|element| element.index).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), 4);

        assert_eq!(slab.in_use(), 4);
        assert_eq!(slab.available(), 0);
        assert_eq!(slab.alloc().unwrap_err(), Error::Exhausted);
    }

    #[test]
    fn exhaustion_leaves_other_slots_untouched() {
        let slab: Slab<2> = Slab::new();
        let mut a = slab.alloc().unwrap();
        let mut b = slab.alloc().unwrap();
        a.set(0xAA);
        b.set(0xBB);

        assert!(slab.alloc().is_err());
        assert_eq!(a.get(), 0xAA);
        assert_eq!(b.get(), 0xBB);
    }

    #[test]
    fn freed_slots_are_reused_zeroed() {
        let slab: Slab<1> = Slab::new();
        let mut element = slab.alloc().unwrap();
        element.set(b'x');
        element.free();

        assert_eq!(slab.in_use(), 0);
        let element = slab.alloc().unwrap();
        assert_eq!(element.get(), 0);
    }

    #[test]
    fn dropping_a_handle_frees_it() {
        let slab: Slab<8> = Slab::new();
        {
            let _a = slab.alloc().unwrap();
            let _b = slab.alloc().unwrap();
            assert_eq!(slab.in_use(), 2);
        }

        assert_eq!(slab.in_use(), 0);
        assert_eq!(slab.peak(), 2);
    }

    #[test]
    fn raw_round_trip_keeps_slot_allocated() {
        let slab: Slab<2> = Slab::new();
        let mut element = slab.alloc().unwrap();
        element.set(7);

        let index = element.into_raw();
        assert_eq!(slab.in_use(), 1);

        let element = Element::from_raw(&slab, index);
        assert!(element.belongs_to(&slab));
        assert_eq!(element.get(), 7);
        drop(element);
        assert_eq!(slab.in_use(), 0);
    }

    #[test]
    fn statics_can_hold_a_slab() {
        static SLAB: Slab<16> = Slab::new();

        let element = SLAB.alloc().unwrap();
        assert_eq!(SLAB.capacity(), 16);
        assert_eq!(SLAB.in_use(), 1);
        drop(element);
    }
}
