use core::fmt;

use fifostd::IrqMutex;

use crate::slab::{Element, Slab, SlotIndex};

#[derive(Debug, Default, Clone, Copy)]
struct Chain {
    head: Option<SlotIndex>,
    tail: Option<SlotIndex>,
    len: usize,
}

/// FIFO of elements from one [`Slab`], linked through the slab's own slots.
///
/// Every operation takes the queue lock with interrupts masked and then, nested
/// inside it, the slab lock. Nothing takes them in the other order, so an
/// interrupt handler and any number of threads can share a queue.
pub struct Fifo<'s, const N: usize> {
    slab: &'s Slab<N>,
    chain: IrqMutex<Chain>,
}

impl<'s, const N: usize> Fifo<'s, N> {
    pub const fn new(slab: &'s Slab<N>) -> Self {
        Self {
            slab,
            chain: IrqMutex::new(Chain {
                head: None,
                tail: None,
                len: 0,
            }),
        }
    }

    /// The slab this queue's elements come from.
    pub fn slab(&self) -> &'s Slab<N> {
        self.slab
    }

    /// Appends an element at the tail.
    ///
    /// # Panics
    /// If the element was allocated from a different slab.
    pub fn push(&self, element: Element<'s, N>) {
        let index = self.adopt(element);

        self.chain.with(|chain| {
            self.slab.with_arena(|arena| {
                arena.slot_mut(index).next = None;
                match chain.tail {
                    Some(tail) => arena.slot_mut(tail).next = Some(index),
                    None => chain.head = Some(index),
                }
            });

            chain.tail = Some(index);
            chain.len += 1;
        });
    }

    /// Puts an element back at the head, ahead of everything already queued.
    ///
    /// # Panics
    /// If the element was allocated from a different slab.
    pub fn push_front(&self, element: Element<'s, N>) {
        let index = self.adopt(element);

        self.chain.with(|chain| {
            self.slab
                .with_arena(|arena| arena.slot_mut(index).next = chain.head);

            chain.head = Some(index);
            if chain.tail.is_none() {
                chain.tail = Some(index);
            }
            chain.len += 1;
        });
    }

    /// Removes the head element, or returns `None` straight away if the queue is empty.
    pub fn pop(&self) -> Option<Element<'s, N>> {
        let index = self.chain.with(|chain| {
            let head = chain.head?;
            let next = self.slab.with_arena(|arena| arena.slot_mut(head).next.take());

            chain.head = next;
            if next.is_none() {
                chain.tail = None;
            }
            chain.len -= 1;

            Some(head)
        })?;

        Some(Element::from_raw(self.slab, index))
    }

    pub fn is_empty(&self) -> bool {
        self.chain.with(|chain| chain.head.is_none())
    }

    pub fn len(&self) -> usize {
        self.chain.with(|chain| chain.len)
    }

    /// Frees every queued element, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        while let Some(element) = self.pop() {
            element.free();
            cleared += 1;
        }

        cleared
    }

    fn adopt(&self, element: Element<'s, N>) -> SlotIndex {
        assert!(
            element.belongs_to(self.slab),
            "element pushed onto a queue backed by another slab"
        );

        element.into_raw()
    }
}

impl<const N: usize> Drop for Fifo<'_, N> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<const N: usize> fmt::Debug for Fifo<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fifo").field("len", &self.len()).finish()
    }
}
