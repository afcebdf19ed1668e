use chrono::{SecondsFormat, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::LOG_DOMAIN;

struct DynLogger {
    level: AtomicUsize,
}

impl DynLogger {
    const fn new() -> Self {
        Self {
            level: AtomicUsize::new(LevelFilter::Info as usize),
        }
    }

    fn current_level(&self) -> LevelFilter {
        level_from_usize(self.level.load(Ordering::Relaxed))
    }

    fn set_level_internal(&self, level: LevelFilter) {
        self.level.store(level as usize, Ordering::Relaxed);
    }
}

fn level_from_usize(val: usize) -> LevelFilter {
    match val {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn format_line(record: &Record) -> String {
    format!(
        "{} {} {} [{}] {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        LOG_DOMAIN,
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for DynLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.current_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(io::stderr(), "{}", format_line(record));
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

static LOGGER: DynLogger = DynLogger::new();

pub fn init_logger(level: Level) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Trace);
    set_log_level(level);
    Ok(())
}

pub fn set_log_level(level: Level) {
    LOGGER.set_level_internal(level.to_level_filter());
}
