//! Interrupt-safe byte queues between a UART interrupt handler and application code.
//!
//! A single [`Slab`] hands out fixed storage for in-flight bytes. Each [`Endpoint`]
//! owns an inbound and an outbound [`Fifo`] threaded through that storage, a
//! [`Transport`] device, and the interrupt handler that moves bytes between the two.
//! Nothing here allocates or blocks, so [`Endpoint::on_interrupt`] may run from an
//! interrupt vector while [`Endpoint::send`] and [`Endpoint::receive`] run on threads.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod fifo;
pub mod loopback;
#[cfg(target_arch = "x86_64")]
pub mod pio;
pub mod serial_port;
pub mod slab;
pub mod stats;
pub mod transport;

pub use config::{EndpointConfig, FaultPolicy, SLAB_CAPACITY};
pub use endpoint::Endpoint;
pub use error::{Error, SendError, WriteIncomplete};
pub use fifo::Fifo;
pub use slab::{Element, Slab};
pub use stats::Stats;
pub use transport::{Interrupts, Pending, Transport};
