use core::fmt::Write;

use bitflags::bitflags;

use crate::{
    error::WriteIncomplete,
    transport::{Interrupts, Pending, Transport},
};

/// Byte-wide access to a block of device registers.
pub trait RegisterIo {
    fn read(&mut self, offset: u16) -> u8;
    fn write(&mut self, offset: u16, value: u8);
}

/// Register offsets from the UART's base address.
pub mod registers {
    /// Data port, R+W
    pub const DATA: u16 = 0;
    /// Interrupt enable port, W
    pub const INT_EN: u16 = 1;
    /// Fifo control port, W
    pub const FIFO_CONTROL: u16 = 2;
    /// Line control port, W
    pub const LINE_CTRL: u16 = 3;
    /// Modem control port, W
    pub const MODEM_CTRL: u16 = 4;
    /// Line status port, R
    pub const LINE_STATUS: u16 = 5;
}

macro_rules! wait_for {
    ($self:expr => OUTPUT_EMPTY) => {
        while !$self.line_status().contains(LineStatusFlags::OUTPUT_EMPTY) {
            core::hint::spin_loop()
        }
    };
}

/// 16550-compatible UART driven through its interrupt enable register.
pub struct Uart16550<R> {
    io: R,
    name: &'static str,
    /// Shadow of the interrupt enable register, which isn't reliably readable.
    int_en: InterruptEnable,
}

impl<R: RegisterIo> Uart16550<R> {
    pub const fn new(io: R, name: &'static str) -> Self {
        Self {
            io,
            name,
            int_en: InterruptEnable::empty(),
        }
    }

    /// Programs 38400 baud 8N1 with FIFOs on, leaving every interrupt disarmed.
    ///
    /// Arming is left to [`Endpoint::start`](crate::Endpoint::start) and
    /// [`Endpoint::send`](crate::Endpoint::send), which go through [`Transport`]
    /// and keep the IER shadow in step with the hardware.
    pub fn init(&mut self) {
        // nothing may fire while the divisor latch overlays DATA and INT_EN
        self.set_int_en(InterruptEnable::empty());
        self.io.write(registers::LINE_CTRL, 0x80);

        // divisor 3: low byte through DATA, high byte (0) through INT_EN
        self.io.write(registers::DATA, 0x03);
        self.io.write(registers::INT_EN, 0x00);

        // latch off, 8 data bits, no parity, one stop bit
        self.io.write(registers::LINE_CTRL, 0x03);

        // FIFOs on and cleared; `pending` reads data-ready from LINE_STATUS, so
        // the 14-byte trigger level never holds back RX_READY
        self.io.write(registers::FIFO_CONTROL, 0xC7);

        // DTR, RTS, and OUT2, which gates the IRQ line to the interrupt controller
        self.io.write(registers::MODEM_CTRL, 0x0B);
    }

    /// Sends a byte, spinning until the transmitter can take it.
    ///
    /// For consoles and panic output, which can't go through the queues.
    pub fn write_blocking(&mut self, byte: u8) {
        wait_for!(self => OUTPUT_EMPTY);
        self.io.write(registers::DATA, byte);
    }

    fn line_status(&mut self) -> LineStatusFlags {
        LineStatusFlags::from_bits_truncate(self.io.read(registers::LINE_STATUS))
    }

    fn set_int_en(&mut self, int_en: InterruptEnable) {
        self.int_en = int_en;
        self.io.write(registers::INT_EN, int_en.bits());
    }
}

impl<R: RegisterIo> Transport for Uart16550<R> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn pending(&mut self) -> Pending {
        let status = self.line_status();
        let mut pending = Pending::empty();

        if self.int_en.contains(InterruptEnable::RX_AVAILABLE)
            && status.contains(LineStatusFlags::INPUT_FULL)
        {
            pending |= Pending::RX_READY;
        }
        if self.int_en.contains(InterruptEnable::TX_EMPTY)
            && status.contains(LineStatusFlags::OUTPUT_EMPTY)
        {
            pending |= Pending::TX_READY;
        }

        pending
    }

    fn read_byte(&mut self) -> u8 {
        self.io.read(registers::DATA)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), WriteIncomplete> {
        if !self.line_status().contains(LineStatusFlags::OUTPUT_EMPTY) {
            return Err(WriteIncomplete);
        }

        self.io.write(registers::DATA, byte);
        Ok(())
    }

    fn enable(&mut self, interrupts: Interrupts) {
        self.set_int_en(self.int_en | InterruptEnable::from(interrupts));
    }

    fn disable(&mut self, interrupts: Interrupts) {
        self.set_int_en(self.int_en - InterruptEnable::from(interrupts));
    }

    fn enabled(&self) -> Interrupts {
        let mut interrupts = Interrupts::empty();
        interrupts.set(
            Interrupts::RX,
            self.int_en.contains(InterruptEnable::RX_AVAILABLE),
        );
        interrupts.set(Interrupts::TX, self.int_en.contains(InterruptEnable::TX_EMPTY));

        interrupts
    }
}

impl<R: RegisterIo> Write for Uart16550<R> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.write_blocking(byte);
        }

        Ok(())
    }
}

bitflags! {
    /// Line status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LineStatusFlags: u8 {
        const INPUT_FULL = 1;
        // 1 to 4 are error conditions
        const OUTPUT_EMPTY = 1 << 5;
        // 6 and 7 unused here
    }
}

bitflags! {
    /// Interrupt enable register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct InterruptEnable: u8 {
        const RX_AVAILABLE = 1;
        const TX_EMPTY = 1 << 1;
        const LINE_STATUS = 1 << 2;
        const MODEM_STATUS = 1 << 3;
    }
}

impl From<Interrupts> for InterruptEnable {
    fn from(interrupts: Interrupts) -> Self {
        let mut int_en = Self::empty();
        int_en.set(Self::RX_AVAILABLE, interrupts.contains(Interrupts::RX));
        int_en.set(Self::TX_EMPTY, interrupts.contains(Interrupts::TX));

        int_en
    }
}
