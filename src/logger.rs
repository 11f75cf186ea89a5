use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;
use std::io::Write;

// @module: Console logger shared by all worker threads

// @struct: Colored stderr logger, one guarded write per record
pub struct ConsoleLogger {
    level: LevelFilter,
    // Held for the duration of each line so concurrent videos never interleave
    line_guard: Mutex<()>,
}

impl ConsoleLogger {
    // @creates: New logger with specified level
    pub fn new(level: LevelFilter) -> Self {
        ConsoleLogger {
            level,
            line_guard: Mutex::new(()),
        }
    }

    // @initializes: Global logger
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(ConsoleLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }

    // @returns: Fixed-width tag for log level
    fn tag_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    /// Render a record into a single line without the trailing newline
    pub fn format_line(level: Level, message: &str) -> String {
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        format!(
            "{}{} {} {}\x1B[0m",
            Self::color_for_level(level),
            now,
            Self::tag_for_level(level),
            message
        )
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = Self::format_line(record.level(), &record.args().to_string());
        let _guard = self.line_guard.lock();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
    }

    fn flush(&self) {
        let _guard = self.line_guard.lock();
        let _ = std::io::stderr().flush();
    }
}
