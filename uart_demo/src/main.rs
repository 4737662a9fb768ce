use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crate::{
    logger::LOGGER,
    ports::{SLAB, UART0, UART2},
};

mod logger;
mod ports;

const MESSAGES: usize = 10;
/// Time given to a message to reach the second port.
const TRANSIT_DELAY: Duration = Duration::from_millis(100);
const ROUND_DELAY: Duration = Duration::from_millis(1000);
/// How often the simulated interrupt line is sampled when idle.
const IRQ_POLL: Duration = Duration::from_micros(50);

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn main() {
    LOGGER.init().expect("failed to init logger");
    log::trace!("logger initialised");

    // only uart2 listens; uart0's transmit is armed by the first send
    UART0.stop();
    UART2.stop();
    UART2.start();

    let irq = thread::Builder::new()
        .name("irq".into())
        .spawn(|| {
            while !SHUTDOWN.load(Ordering::Acquire) {
                if !ports::dispatch() {
                    thread::sleep(IRQ_POLL);
                }
            }
        })
        .expect("failed to spawn interrupt thread");

    let mut recv_buf = [0u8; 64];
    for i in (0..MESSAGES).rev() {
        let message = format!("Hello from device {}, num {i}", UART0.name());
        match UART0.send(message.as_bytes()) {
            Ok(()) => log::info!("Device {} sent: \"{message}\"", UART0.name()),
            Err(err) => log::error!("Device {} failed to send: {err}", UART0.name()),
        }

        thread::sleep(TRANSIT_DELAY);

        let len = UART2.receive(&mut recv_buf);
        log::info!(
            "Device {} received: \"{}\"",
            UART2.name(),
            String::from_utf8_lossy(&recv_buf[..len])
        );

        thread::sleep(ROUND_DELAY);
    }

    SHUTDOWN.store(true, Ordering::Release);
    irq.join().expect("interrupt thread panicked");

    log::debug!("{}: {:?}", UART0.name(), UART0.stats());
    log::debug!("{}: {:?}", UART2.name(), UART2.stats());
    log::debug!("slab peak usage {} of {}", SLAB.peak(), SLAB.capacity());
}
