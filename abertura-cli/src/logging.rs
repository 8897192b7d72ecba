//! Subscriber setup for the `abertura` binary.
//!
//! Events go to stderr so stdout carries only command output. The filter
//! starts from `RUST_LOG` (default `info`) and can be swapped later by
//! `--log-level`; `--log-file` adds an append-only copy without colors.

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

const RESET: &str = "\x1b[0m";

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static LOG_FILE: LogFile = LogFile(Mutex::new(None));

/// `HH:MM:SS.mmm LEVEL target: message fields`, with the level colored on a
/// terminal.
struct EventLine;

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[2m",
    }
}

impl<S, N> FormatEvent<S, N> for EventLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let time = Local::now().format("%H:%M:%S%.3f");

        if writer.has_ansi_escapes() {
            let color = level_color(*meta.level());
            write!(writer, "{time} {color}{:<5}{RESET} ", meta.level())?;
        } else {
            write!(writer, "{time} {:<5} ", meta.level())?;
        }
        write!(writer, "{}: ", meta.target())?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Optional log file. Writes are dropped until [`enable_file_logging`]
/// opens one.
struct LogFile(Mutex<Option<File>>);

impl LogFile {
    fn slot(&self) -> MutexGuard<'_, Option<File>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct LogFileWriter<'a>(MutexGuard<'a, Option<File>>);

impl Write for LogFileWriter<'_> {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.as_mut().map_or(Ok(buf.len()), |file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.as_mut().map_or(Ok(()), |file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for &'static LogFile {
    type Writer = LogFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter(self.slot())
    }
}

/// Installs the global subscriber. Later calls do nothing.
pub fn init_default_logging() {
    let initial = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(initial);

    let stderr = tracing_subscriber::fmt::layer()
        .event_format(EventLine)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr);
    let file = tracing_subscriber::fmt::layer()
        .event_format(EventLine)
        .with_ansi(false)
        .with_writer(&LOG_FILE);

    if tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .is_ok()
    {
        let _ = FILTER.set(handle);
    }
}

/// Replaces the active filter. Takes a bare level (`debug`) or any
/// `EnvFilter` directive list (`abertura_core=trace,info`).
pub fn set_log_level(directives: &str) -> Result<()> {
    let handle = FILTER
        .get()
        .ok_or_else(|| anyhow!("logging is not initialized"))?;
    let filter = EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter '{directives}'"))?;
    handle.reload(filter).context("Failed to swap the log filter")
}

/// Appends every later event to `path`, replacing any file opened before.
pub fn enable_file_logging(path: &Path) -> Result<()> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
    *LOG_FILE.slot() = Some(file);
    Ok(())
}
