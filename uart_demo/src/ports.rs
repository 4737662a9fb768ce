use lazy_static::lazy_static;
use uart_fifo::{
    loopback::{LoopbackUart, Side, Wire},
    Endpoint, EndpointConfig, Slab, SLAB_CAPACITY,
};

pub type Port = Endpoint<'static, LoopbackUart<'static>, SLAB_CAPACITY>;

/// Elements for both ports and both directions.
pub static SLAB: Slab<SLAB_CAPACITY> = Slab::new();

/// Null-modem cable between the two ports.
static WIRE: Wire = Wire::new();

lazy_static! {
    pub static ref UART0: Port =
        Endpoint::new(&SLAB, WIRE.end(Side::A, "uart0"), EndpointConfig::halting());
    pub static ref UART2: Port =
        Endpoint::new(&SLAB, WIRE.end(Side::B, "uart2"), EndpointConfig::halting());
}

/// Plays interrupt controller: runs a port's handler whenever it has something pending.
pub fn dispatch() -> bool {
    let mut fired = false;
    for port in [&*UART0, &*UART2] {
        if port.interrupt_pending() {
            port.on_interrupt();
            fired = true;
        }
    }

    fired
}
