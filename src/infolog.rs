//! A minimal sink for diagnostic messages, in the vein of LevelDB's
//! `Env::NewLogger` — not a general logging facade, just somewhere to
//! write a line when the reader notices something worth recording.

use std::io::Write;

/// Wraps any `Write` destination. Cloneable handles share the same
/// underlying writer via `Arc<Mutex<_>>` at the call site (see
/// `Options::logger`); this type itself just owns the sink.
pub struct Logger(pub Box<dyn Write + Send>);

impl Logger {
    pub fn new(w: Box<dyn Write + Send>) -> Logger {
        Logger(w)
    }

    /// A logger that writes to standard error.
    pub fn stderr() -> Logger {
        Logger(Box::new(std::io::stderr()))
    }
}

/// Writes a line to a `Logger`, ignoring write errors (a failing logger
/// must never fail the read it's annotating).
#[macro_export]
macro_rules! log {
    ($logger:expr, $fmt:expr) => {
        let _ = writeln!($logger.0, $fmt);
    };
    ($logger:expr, $fmt:expr, $($arg:tt)*) => {
        let _ = writeln!($logger.0, $fmt, $($arg)*);
    };
}
