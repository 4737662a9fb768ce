use core::fmt;

use fifostd::{Cursor, IrqMutex};

use crate::{
    config::{EndpointConfig, FaultPolicy},
    error::{Error, SendError},
    fifo::Fifo,
    slab::{Element, Slab},
    stats::{Counters, Stats},
    transport::{Interrupts, Pending, Transport},
};

/// One serial device together with its inbound and outbound queues.
///
/// [`Endpoint::on_interrupt`] is meant to be called from the device's interrupt
/// vector; everything else from application context. Whether transmit is armed
/// isn't stored anywhere: it tracks "the outbound queue is non-empty", with `send`
/// arming and the handler disarming.
pub struct Endpoint<'s, T, const N: usize> {
    name: &'static str,
    device: IrqMutex<T>,
    inbound: Fifo<'s, N>,
    outbound: Fifo<'s, N>,
    config: EndpointConfig,
    counters: Counters,
}

impl<'s, T: Transport, const N: usize> Endpoint<'s, T, N> {
    /// Binds `device` to a pair of queues drawing from `slab`. The device is left
    /// as it is until [`Endpoint::start`].
    pub fn new(slab: &'s Slab<N>, device: T, config: EndpointConfig) -> Self {
        Self {
            name: device.name(),
            device: IrqMutex::new(device),
            inbound: Fifo::new(slab),
            outbound: Fifo::new(slab),
            config,
            counters: Counters::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Arms reception. Transmit stays disarmed until there's something to send,
    /// otherwise an idle transmitter interrupts continuously.
    pub fn start(&self) {
        self.device.with(|device| {
            device.disable(Interrupts::RX | Interrupts::TX);
            device.enable(Interrupts::RX);
        });

        log::trace!("{}: receive interrupt armed", self.name);
    }

    /// Disarms both interrupt classes. Queued bytes stay queued.
    pub fn stop(&self) {
        self.device
            .with(|device| device.disable(Interrupts::RX | Interrupts::TX));

        log::trace!("{}: interrupts disarmed", self.name);
    }

    /// Whether the device has a condition the handler would service right now.
    pub fn interrupt_pending(&self) -> bool {
        self.device.with(|device| !device.pending().is_empty())
    }

    /// Services whatever the device has pending: moves one received byte onto the
    /// inbound queue and, if the transmitter is ready, either hands it the next
    /// outbound byte or disarms transmit when there is none.
    ///
    /// Never blocks and never returns an error; faults are handled per the
    /// endpoint's [`FaultPolicy`].
    pub fn on_interrupt(&self) {
        self.device.with(|device| {
            let pending = device.pending();
            if pending.is_empty() {
                return;
            }
            Counters::bump(&self.counters.interrupts);

            if pending.contains(Pending::RX_READY) {
                self.service_rx(device);
            }
            if pending.contains(Pending::TX_READY) {
                self.service_tx(device);
            }
        });
    }

    fn service_rx(&self, device: &mut T) {
        match self.reserve(&self.inbound, self.config.rx_limit) {
            Ok(mut element) => {
                element.set(device.read_byte());
                self.inbound.push(element);
                Counters::bump(&self.counters.rx_bytes);
            }
            Err(err) => {
                self.check_exhausted(err);

                // still read the byte, or receive-ready stays asserted
                let byte = device.read_byte();
                Counters::bump(&self.counters.rx_dropped);
                log::warn!("{}: dropped received byte {byte:#04x}: {err}", self.name);
            }
        }
    }

    fn service_tx(&self, device: &mut T) {
        // Transmit is disarmed only here and armed only by `send` after queueing,
        // both under the device lock, so it can't stay disarmed with data queued.
        let Some(element) = self.outbound.pop() else {
            device.disable(Interrupts::TX);
            return;
        };

        match device.write_byte(element.get()) {
            Ok(()) => {
                element.free();
                Counters::bump(&self.counters.tx_bytes);
            }
            Err(err) => {
                if self.config.fault_policy == FaultPolicy::Halt {
                    panic!("UART TX failed! {}: {err}", self.name);
                }

                Counters::bump(&self.counters.tx_retries);
                log::warn!("{}: {err}, requeueing byte", self.name);
                self.outbound.push_front(element);
            }
        }
    }

    /// Queues `bytes` for transmission and arms the transmit interrupt.
    ///
    /// Returns once everything is queued, without waiting for it to go out. An
    /// empty slice allocates nothing and leaves transmit as it was. If the slab
    /// or the outbound limit runs out part way, the queued prefix is still sent
    /// and the error says how much of it there was. A halting endpoint panics on
    /// an exhausted slab, but still reports a reached limit as an error.
    pub fn send(&self, bytes: &[u8]) -> Result<(), SendError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let mut queued = 0;
        let mut failure = None;
        for &byte in bytes {
            match self.reserve(&self.outbound, self.config.tx_limit) {
                Ok(mut element) => {
                    element.set(byte);
                    self.outbound.push(element);
                    queued += 1;
                }
                Err(err) => {
                    self.check_exhausted(err);
                    failure = Some(err);
                    break;
                }
            }
        }

        if queued > 0 {
            self.device.with(|device| device.enable(Interrupts::TX));
        }

        match failure {
            None => {
                log::debug!("{}: queued {queued} bytes", self.name);
                Ok(())
            }
            Some(cause) => {
                log::warn!(
                    "{}: queued {queued} of {} bytes: {cause}",
                    self.name,
                    bytes.len()
                );
                Err(SendError {
                    queued,
                    requested: bytes.len(),
                    cause,
                })
            }
        }
    }

    /// Copies everything received so far into `buf`, returning how many bytes
    /// were written.
    ///
    /// Doesn't wait for more to arrive. If `buf` fills up first, the rest stays
    /// queued for the next call.
    pub fn receive(&self, buf: &mut [u8]) -> usize {
        let mut cursor = Cursor::new(buf);

        while !cursor.is_full() {
            let Some(element) = self.inbound.pop() else {
                break;
            };
            cursor.write_u8(element.get());
            element.free();
        }

        let received = cursor.position();
        if received > 0 {
            log::debug!("{}: received {received} bytes", self.name);
        }

        received
    }

    /// Bytes received and not yet taken by `receive`.
    pub fn pending_rx(&self) -> usize {
        self.inbound.len()
    }

    /// Bytes queued by `send` and not yet handed to the device.
    pub fn pending_tx(&self) -> usize {
        self.outbound.len()
    }

    /// Whether the transmit interrupt is currently armed.
    pub fn tx_armed(&self) -> bool {
        self.device
            .with(|device| device.enabled().contains(Interrupts::TX))
    }

    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }

    /// Runs `f` with the device, interrupts masked.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.device.with(f)
    }

    /// Halts on slab exhaustion if configured to. A queue limit is a configured
    /// cap rather than a sizing bug, so it is always handed back to the caller.
    fn check_exhausted(&self, err: Error) {
        if err == Error::Exhausted && self.config.fault_policy == FaultPolicy::Halt {
            panic!("Out of memory! {}: {err}", self.name);
        }
    }

    fn reserve(
        &self,
        queue: &Fifo<'s, N>,
        limit: Option<usize>,
    ) -> Result<Element<'s, N>, Error> {
        // the limit is checked before allocating, so concurrent producers on the
        // same queue can overshoot it by one each
        if let Some(limit) = limit {
            if queue.len() >= limit {
                return Err(Error::QueueLimit { limit });
            }
        }

        queue.slab().alloc()
    }
}

impl<T, const N: usize> fmt::Debug for Endpoint<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackUart, Side, Wire};

    const CAPACITY: usize = 64;
    /// Upper bound on handler invocations in one `pump`, well above what any test needs.
    const MAX_INTERRUPTS: usize = 10_000;

    type Port<'s, 'w> = Endpoint<'s, LoopbackUart<'w>, CAPACITY>;

    fn pair<'s, 'w>(
        slab: &'s Slab<CAPACITY>,
        wire: &'w Wire,
        config: EndpointConfig,
    ) -> (Port<'s, 'w>, Port<'s, 'w>) {
        let uart0 = Endpoint::new(slab, wire.end(Side::A, "uart0"), config);
        let uart2 = Endpoint::new(slab, wire.end(Side::B, "uart2"), config);
        uart0.start();
        uart2.start();

        (uart0, uart2)
    }

    /// Plays interrupt controller until neither device has anything pending,
    /// returning how many times a handler ran.
    fn pump(endpoints: &[&Port<'_, '_>]) -> usize {
        let mut fired = 0;
        while endpoints.iter().any(|endpoint| endpoint.interrupt_pending()) {
            for endpoint in endpoints {
                if endpoint.interrupt_pending() {
                    endpoint.on_interrupt();
                    fired += 1;
                }
            }
            assert!(fired < MAX_INTERRUPTS, "interrupts never went quiet");
        }

        fired
    }

    fn receive_all(endpoint: &Port<'_, '_>) -> Vec<u8> {
        let mut buf = [0u8; CAPACITY];
        let len = endpoint.receive(&mut buf);
        buf[..len].to_vec()
    }

    #[test]
    fn start_arms_receive_only() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, _) = pair(&slab, &wire, EndpointConfig::new());

        assert_eq!(uart0.with_device(|device| device.enabled()), Interrupts::RX);
        assert!(!uart0.interrupt_pending());

        uart0.stop();
        assert_eq!(
            uart0.with_device(|device| device.enabled()),
            Interrupts::empty()
        );
    }

    #[test]
    fn hi_crosses_the_wire() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"Hi").unwrap();
        pump(&[&uart0, &uart2]);

        assert_eq!(receive_all(&uart2), b"Hi");
        assert_eq!(slab.in_use(), 0);
        assert_eq!(uart0.stats().tx_bytes, 2);
        assert_eq!(uart2.stats().rx_bytes, 2);
    }

    #[test]
    fn send_arms_transmit_and_handler_disarms_it_when_drained() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"abc").unwrap();
        assert!(uart0.tx_armed());
        assert_eq!(uart0.pending_tx(), 3);

        pump(&[&uart0, &uart2]);

        assert!(!uart0.tx_armed());
        assert_eq!(uart0.pending_tx(), 0);
        assert!(!uart0.interrupt_pending());
    }

    #[test]
    fn idle_transmitter_fires_once_then_goes_quiet() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, _) = pair(&slab, &wire, EndpointConfig::new());

        // armed with nothing queued: the first interrupt must disarm it
        uart0.with_device(|device| device.enable(Interrupts::TX));
        assert_eq!(pump(&[&uart0]), 1);
        assert!(!uart0.tx_armed());
    }

    #[test]
    fn transmit_stays_armed_while_data_is_queued() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"0123456789").unwrap();
        for _ in 0..5 {
            uart0.on_interrupt();
            uart2.on_interrupt();
            assert!(uart0.pending_tx() > 0);
            assert!(uart0.tx_armed());
        }

        pump(&[&uart0, &uart2]);
        assert_eq!(receive_all(&uart2), b"0123456789");
    }

    #[test]
    fn empty_send_changes_nothing() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, _) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"").unwrap();

        assert_eq!(slab.peak(), 0);
        assert!(!uart0.tx_armed());
    }

    #[test]
    fn second_receive_is_empty() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"once").unwrap();
        pump(&[&uart0, &uart2]);

        assert_eq!(receive_all(&uart2), b"once");
        assert!(receive_all(&uart2).is_empty());
    }

    #[test]
    fn short_buffer_leaves_the_rest_queued() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"hello").unwrap();
        pump(&[&uart0, &uart2]);

        let mut buf = [0u8; 2];
        assert_eq!(uart2.receive(&mut buf), 2);
        assert_eq!(&buf, b"he");
        assert_eq!(uart2.pending_rx(), 3);
        assert_eq!(receive_all(&uart2), b"llo");
    }

    #[test]
    fn handler_does_rx_and_tx_in_one_invocation() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.send(b"x").unwrap();
        uart2.send(b"y").unwrap();
        uart0.on_interrupt();

        // uart2 now has 'x' to read and 'y' to write
        assert_eq!(
            uart2.with_device(|device| device.pending()),
            Pending::RX_READY | Pending::TX_READY
        );
        uart2.on_interrupt();
        assert_eq!(uart2.pending_rx(), 1);
        assert_eq!(uart2.pending_tx(), 0);

        pump(&[&uart0, &uart2]);
        assert_eq!(receive_all(&uart0), b"y");
        assert_eq!(receive_all(&uart2), b"x");
    }

    #[test]
    fn exhausted_send_reports_queued_prefix() {
        let slab: Slab<CAPACITY> = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());
        let hog: Vec<_> = (0..CAPACITY - 3).map(|_| slab.alloc().unwrap()).collect();

        let err = uart0.send(b"abcdef").unwrap_err();
        assert_eq!(err.queued, 3);
        assert_eq!(err.requested, 6);
        assert_eq!(err.cause, Error::Exhausted);
        assert!(uart0.tx_armed());

        drop(hog);
        pump(&[&uart0, &uart2]);
        assert_eq!(receive_all(&uart2), b"abc");
    }

    #[test]
    fn tx_limit_caps_the_outbound_queue() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, _) = pair(&slab, &wire, EndpointConfig::new().with_tx_limit(4));

        let err = uart0.send(b"too long").unwrap_err();
        assert_eq!(err.queued, 4);
        assert_eq!(err.cause, Error::QueueLimit { limit: 4 });
        assert_eq!(slab.in_use(), 4);
    }

    #[test]
    fn rx_limit_drops_and_counts_excess() {
        let slab = Slab::new();
        let wire = Wire::new();
        let uart0 = Endpoint::new(&slab, wire.end(Side::A, "uart0"), EndpointConfig::new());
        let uart2 = Endpoint::new(
            &slab,
            wire.end(Side::B, "uart2"),
            EndpointConfig::new().with_rx_limit(2),
        );
        uart0.start();
        uart2.start();

        uart0.send(b"1234").unwrap();
        pump(&[&uart0, &uart2]);

        assert_eq!(receive_all(&uart2), b"12");
        assert_eq!(uart2.stats().rx_dropped, 2);
        assert_eq!(wire.in_flight(), 0);
        assert_eq!(slab.in_use(), 0);
    }

    #[test]
    fn refused_byte_is_retried_in_order() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::new());

        uart0.with_device(|device| device.inject_write_faults(2));
        uart0.send(b"ok").unwrap();
        pump(&[&uart0, &uart2]);

        assert_eq!(receive_all(&uart2), b"ok");
        assert_eq!(uart0.stats().tx_retries, 2);
        assert_eq!(uart0.stats().tx_bytes, 2);
    }

    #[test]
    #[should_panic(expected = "Out of memory!")]
    fn halting_endpoint_panics_when_receive_exhausts_the_slab() {
        let slab: Slab<CAPACITY> = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::halting());

        uart0.send(b"z").unwrap();
        uart0.on_interrupt();
        let _hog: Vec<_> = (0..CAPACITY).map(|_| slab.alloc().unwrap()).collect();
        uart2.on_interrupt();
    }

    #[test]
    #[should_panic(expected = "UART TX failed!")]
    fn halting_endpoint_panics_on_refused_byte() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, _) = pair(&slab, &wire, EndpointConfig::halting());

        uart0.with_device(|device| device.inject_write_faults(1));
        uart0.send(b"!").unwrap();
        uart0.on_interrupt();
    }

    #[test]
    fn halting_endpoint_reports_tx_limit() {
        let slab = Slab::new();
        let wire = Wire::new();
        let (uart0, uart2) = pair(&slab, &wire, EndpointConfig::halting().with_tx_limit(1));

        let err = uart0.send(b"ab").unwrap_err();
        assert_eq!(err.queued, 1);
        assert_eq!(err.requested, 2);
        assert_eq!(err.cause, Error::QueueLimit { limit: 1 });

        pump(&[&uart0, &uart2]);
        assert_eq!(receive_all(&uart2), b"a");
    }

    #[test]
    fn halting_endpoint_drops_past_rx_limit() {
        let slab = Slab::new();
        let wire = Wire::new();
        let uart0 = Endpoint::new(&slab, wire.end(Side::A, "uart0"), EndpointConfig::halting());
        let uart2 = Endpoint::new(
            &slab,
            wire.end(Side::B, "uart2"),
            EndpointConfig::halting().with_rx_limit(1),
        );
        uart0.start();
        uart2.start();

        uart0.send(b"xyz").unwrap();
        pump(&[&uart0, &uart2]);

        assert_eq!(receive_all(&uart2), b"x");
        assert_eq!(uart2.stats().rx_dropped, 2);
        assert_eq!(wire.in_flight(), 0);
    }

    #[test]
    #[should_panic(expected = "Out of memory!")]
    fn halting_endpoint_panics_when_send_exhausts_the_slab() {
        let slab: Slab<2> = Slab::new();
        let wire = Wire::new();
        let uart0 = Endpoint::new(&slab, wire.end(Side::A, "uart0"), EndpointConfig::halting());

        let _ = uart0.send(b"abc");
    }
}
