use bitflags::bitflags;

use crate::error::WriteIncomplete;

bitflags! {
    /// Interrupt classes a transport can be armed for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u8 {
        const RX = 1;
        const TX = 1 << 1;
    }
}

bitflags! {
    /// Conditions waiting to be serviced by the interrupt handler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pending: u8 {
        /// At least one received byte can be read.
        const RX_READY = 1;
        /// The device can accept a byte to transmit.
        const TX_READY = 1 << 1;
    }
}

/// A byte-at-a-time serial device, as seen by the interrupt handler.
pub trait Transport {
    /// Name used in log messages.
    fn name(&self) -> &'static str;

    /// Latches the device's status and returns the conditions that are both
    /// asserted and armed. An empty set means there is nothing to service.
    fn pending(&mut self) -> Pending;

    /// Reads one received byte. Only meaningful while [`Pending::RX_READY`] is asserted.
    fn read_byte(&mut self) -> u8;

    /// Hands one byte to the device. Only meaningful while [`Pending::TX_READY`] is asserted.
    fn write_byte(&mut self, byte: u8) -> Result<(), WriteIncomplete>;

    /// Arms the given interrupt classes. Arming an armed class does nothing.
    fn enable(&mut self, interrupts: Interrupts);

    /// Disarms the given interrupt classes. Disarming a disarmed class does nothing.
    fn disable(&mut self, interrupts: Interrupts);

    /// Currently armed interrupt classes.
    fn enabled(&self) -> Interrupts;
}
