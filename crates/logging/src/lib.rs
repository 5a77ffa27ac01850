//! A small `log::Log` implementation producing the broker's fixed log
//! line shape, shared by the server and client binaries so their
//! output is identical no matter which process is doing the logging.
//!
//! `simple_logger`'s own formatting knobs (colors, module paths,
//! configurable timestamp style) have no hook for laying fields out in
//! a fixed custom order, so this implements the `log::Log` trait
//! directly instead of reaching for a builder option that doesn't
//! exist.

use std::io::Write;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Renders `body` (already containing whatever a call site logged, e.g.
/// `"L <token> <peer>"`) behind a `[YYYY-MM-DD HH:MM:SS]` timestamp.
pub fn format_line(timestamp: OffsetDateTime, body: &str) -> String {
    let stamp = timestamp.format(TIMESTAMP_FORMAT).expect("static format description never fails");
    format!("[{stamp}] {body}")
}

struct Logger {
    level: log::LevelFilter,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(OffsetDateTime::now_utc(), &record.args().to_string());
        let _ = writeln!(std::io::stderr(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the process-wide logger at `level`. Call once, from `main`.
pub fn init(level: log::Level) -> Result<(), log::SetLoggerError> {
    let filter = level.to_level_filter();
    log::set_boxed_logger(Box::new(Logger { level: filter }))?;
    log::set_max_level(filter);
    Ok(())
}
