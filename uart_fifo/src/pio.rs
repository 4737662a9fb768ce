//! x86 port-mapped I/O for UARTs on the legacy COM ports.

use core::arch::asm;

use crate::serial_port::RegisterIo;

pub mod ports {
    pub const COM1: u16 = 0x3F8;
    pub const COM2: u16 = 0x2F8;
    pub const COM3: u16 = 0x3E8;
    pub const COM4: u16 = 0x2E8;
}

/// Registers reached through `in`/`out` at `base + offset`.
///
/// Plugs a [`Uart16550`](crate::serial_port::Uart16550) into the legacy COM
/// ports, e.g. to put an [`Endpoint`](crate::Endpoint) on COM1:
///
/// ```no_run
/// use uart_fifo::{
///     pio::{ports, PortIo},
///     serial_port::Uart16550,
///     Endpoint, EndpointConfig, Slab, SLAB_CAPACITY,
/// };
///
/// static SLAB: Slab<SLAB_CAPACITY> = Slab::new();
///
/// // SAFETY: nothing else drives COM1, and we run with I/O privilege
/// let mut com1 = Uart16550::new(unsafe { PortIo::new(ports::COM1) }, "com1");
/// com1.init();
///
/// let com1 = Endpoint::new(&SLAB, com1, EndpointConfig::halting());
/// com1.start();
/// com1.send(b"hello").unwrap();
///
/// // normally called from the IRQ 4 vector
/// com1.on_interrupt();
/// ```
pub struct PortIo {
    base: u16,
}

impl PortIo {
    /// # Safety
    /// `base` must be the base port of a UART that nothing else drives, and the
    /// caller must be allowed to execute port I/O.
    pub const unsafe fn new(base: u16) -> Self {
        Self { base }
    }
}

impl RegisterIo for PortIo {
    fn read(&mut self, offset: u16) -> u8 {
        let value: u8;
        // SAFETY: `new` requires a port range we own
        unsafe {
            asm!(
                "in al, dx",
                out("al") value,
                in("dx") self.base + offset,
                options(nomem, nostack, preserves_flags)
            );
        }

        value
    }

    fn write(&mut self, offset: u16, value: u8) {
        // SAFETY: `new` requires a port range we own
        unsafe {
            asm!(
                "out dx, al",
                in("dx") self.base + offset,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }
}
