use std::io::Write;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Timestamped log lines on stderr, so stdout stays clean.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
	fn enabled(&self, metadata: &Metadata) -> bool {
		metadata.level() <= log::max_level()
	}

	fn log(&self, record: &Record) {
		if !self.enabled(record.metadata()) {
			return;
		}
		let level = match record.level() {
			Level::Error => "error",
			Level::Warn => "warn",
			Level::Info => "info",
			Level::Debug => "debug",
			Level::Trace => "trace"
		};
		let line = format!("[{}] {level}: {}", chrono::Local::now().format("%H:%M:%S"), record.args());
		let _ = writeln!(std::io::stderr().lock(), "{}", line.trim_end());
	}

	fn flush(&self) {
		let _ = std::io::stderr().flush();
	}
}

pub fn init(verbose: bool) {
	if log::set_logger(&LOGGER).is_ok() {
		log::set_max_level(if verbose {LevelFilter::Debug} else {LevelFilter::Info});
	}
}
