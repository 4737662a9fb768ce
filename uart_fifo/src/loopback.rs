//! Two simulated UARTs joined by a null-modem wire.
//!
//! Each direction of the wire is a small bounded line, the same depth as a 16550
//! FIFO. A transmit-ready condition is raised for as long as transmit is armed and
//! the outgoing line has room, just like an idle hardware transmitter, so an
//! endpoint that forgets to disarm transmit gets serviced forever.

use heapless::Deque;

use fifostd::IrqMutex;

use crate::{
    error::WriteIncomplete,
    transport::{Interrupts, Pending, Transport},
};

/// Bytes each direction of the wire buffers before the transmitter stops being ready.
pub const LINE_DEPTH: usize = 16;

type Line = IrqMutex<Deque<u8, LINE_DEPTH>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

pub struct Wire {
    a_to_b: Line,
    b_to_a: Line,
}

impl Wire {
    pub const fn new() -> Self {
        Self {
            a_to_b: IrqMutex::new(Deque::new()),
            b_to_a: IrqMutex::new(Deque::new()),
        }
    }

    /// Returns a transport attached to one side of the wire, with every interrupt disarmed.
    pub fn end(&self, side: Side, name: &'static str) -> LoopbackUart<'_> {
        let (tx, rx) = match side {
            Side::A => (&self.a_to_b, &self.b_to_a),
            Side::B => (&self.b_to_a, &self.a_to_b),
        };

        LoopbackUart {
            name,
            tx,
            rx,
            enabled: Interrupts::empty(),
            write_faults: 0,
        }
    }

    /// Bytes written by one side and not yet read by the other, both directions together.
    pub fn in_flight(&self) -> usize {
        self.a_to_b.with(|line| line.len()) + self.b_to_a.with(|line| line.len())
    }
}

impl Default for Wire {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LoopbackUart<'w> {
    name: &'static str,
    tx: &'w Line,
    rx: &'w Line,
    enabled: Interrupts,
    write_faults: usize,
}

impl LoopbackUart<'_> {
    /// Makes the next `count` writes fail as if the device dropped the byte.
    pub fn inject_write_faults(&mut self, count: usize) {
        self.write_faults = count;
    }
}

impl Transport for LoopbackUart<'_> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn pending(&mut self) -> Pending {
        let mut pending = Pending::empty();

        if self.enabled.contains(Interrupts::RX) && !self.rx.with(|line| line.is_empty()) {
            pending |= Pending::RX_READY;
        }
        if self.enabled.contains(Interrupts::TX) && !self.tx.with(|line| line.is_full()) {
            pending |= Pending::TX_READY;
        }

        pending
    }

    fn read_byte(&mut self) -> u8 {
        // an empty receive register reads as zero
        self.rx.with(|line| line.pop_front()).unwrap_or(0)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), WriteIncomplete> {
        if self.write_faults > 0 {
            self.write_faults -= 1;
            return Err(WriteIncomplete);
        }

        self.tx
            .with(|line| line.push_back(byte))
            .map_err(|_| WriteIncomplete)
    }

    fn enable(&mut self, interrupts: Interrupts) {
        self.enabled |= interrupts;
    }

    fn disable(&mut self, interrupts: Interrupts) {
        self.enabled &= !interrupts;
    }

    fn enabled(&self) -> Interrupts {
        self.enabled
    }
}
