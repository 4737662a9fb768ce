use std::{
    io::{self, Write},
    thread,
};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub static LOGGER: Logger = Logger::new(LevelFilter::Debug);

/// Writes records to stdout, which plays the board's debug console.
///
/// The endpoints log from both the main loop and the irq thread, so each line
/// is tagged with the thread it came from and written under one stdout lock;
/// lines from the two never interleave.
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_max_level(self.level);
        log::set_logger(self)
    }

    fn write_record(&self, out: &mut impl Write, record: &Record) -> io::Result<()> {
        let current = thread::current();
        writeln!(
            out,
            "{:>5} | {:<4} | {}",
            record.level(),
            current.name().unwrap_or("?"),
            record.args()
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level().to_level_filter() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            // nowhere to report a failed console write
            let _ = self.write_record(&mut io::stdout().lock(), record);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
