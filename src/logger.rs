use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{stderr, stdout, Write};
use std::sync::{Mutex, Once, PoisonError};

/// Log implementation for standard output streams
///
/// Errors and warnings go to stderr, so they never interleave with the reply lines and the
/// statistics block on stdout.
pub struct StdLogger(Mutex<()>);

impl StdLogger {
    /// Initialize logger
    ///
    /// Warnings and errors are always shown, `verbose` adds informational messages. Even if this
    /// function is called multiple times, initialization will only be done once.
    pub fn init(verbose: bool) {
        static INIT: Once = Once::new();

        // Initialization may run from more than one thread
        INIT.call_once(|| {
            let level = if verbose {
                LevelFilter::Info
            } else {
                LevelFilter::Warn
            };

            // Another logger may already be installed, e.g. by a test harness
            if log::set_boxed_logger(Box::new(StdLogger(Mutex::new(())))).is_ok() {
                log::set_max_level(level);
            }
        });
    }

    fn prefix(level: Level) -> &'static str {
        match level {
            Level::Error | Level::Warn => "[-]",
            Level::Info => "[i]",
            _ => "[+]",
        }
    }
}

impl Log for StdLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let prefix = Self::prefix(record.level());
        match record.level() {
            Level::Error | Level::Warn => {
                let stderr = stderr();
                let mut handle = stderr.lock();
                let _ = writeln!(handle, "{} {}", prefix, record.args());
            }
            _ => {
                let stdout = stdout();
                let mut handle = stdout.lock();
                let _ = writeln!(handle, "{} {}", prefix, record.args());
            }
        }
    }

    /// Flush buffered output streams
    fn flush(&self) {
        let _ = stdout().flush();
        let _ = stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_init() {
        StdLogger::init(true);
        StdLogger::init(false);

        // Call different log implementations
        trace!("trace log succeeded");
        debug!("debug log succeeded");
        info!("info log succeeded");
        warn!("warn log succeeded");
        error!("error log succeeded");

        let logger = log::logger();
        assert!(logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Trace).build()));
    }

    #[test]
    fn prefixes() {
        assert_eq!(StdLogger::prefix(Level::Error), "[-]");
        assert_eq!(StdLogger::prefix(Level::Warn), "[-]");
        assert_eq!(StdLogger::prefix(Level::Info), "[i]");
        assert_eq!(StdLogger::prefix(Level::Trace), "[+]");
    }
}
