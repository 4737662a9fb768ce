use core::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time copy of an endpoint's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Interrupt invocations that found a pending condition.
    pub interrupts: usize,
    pub rx_bytes: usize,
    pub tx_bytes: usize,
    /// Received bytes discarded because no element could be allocated.
    pub rx_dropped: usize,
    /// Bytes requeued after the device refused them.
    pub tx_retries: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) interrupts: AtomicUsize,
    pub(crate) rx_bytes: AtomicUsize,
    pub(crate) tx_bytes: AtomicUsize,
    pub(crate) rx_dropped: AtomicUsize,
    pub(crate) tx_retries: AtomicUsize,
}

impl Counters {
    pub(crate) const fn new() -> Self {
        Self {
            interrupts: AtomicUsize::new(0),
            rx_bytes: AtomicUsize::new(0),
            tx_bytes: AtomicUsize::new(0),
            rx_dropped: AtomicUsize::new(0),
            tx_retries: AtomicUsize::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            interrupts: self.interrupts.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            tx_retries: self.tx_retries.load(Ordering::Relaxed),
        }
    }
}
