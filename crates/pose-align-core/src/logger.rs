//! Logging setup for binaries and examples.
//!
//! The library itself only emits through the `log` facade (and `tracing`
//! spans with the `tracing` feature); nothing is installed implicitly.
//! `init_with_level` installs a small stderr logger printing
//! `[elapsed LEVEL target] message`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let target = record.target();
        let short = target.rsplit("::").next().unwrap_or(target);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Route `log` records from the matcher and catalog scans to stderr.
///
/// Only the first call picks the level; later calls keep the installed logger.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Map a `-v` count to a level filter: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Send catalog-scan spans and bridged `log` records to stderr.
///
/// `RUST_LOG` wins over `level` when set. Closing `score_all` and `match_pair`
/// spans carry their timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_ascii_lowercase()));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
