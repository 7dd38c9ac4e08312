// src/telemetry.rs

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

/// Shared by every progress bar of the process, so log lines can clear them.
pub fn progress() -> &'static MultiProgress {
    PROGRESS.get_or_init(MultiProgress::new)
}

/// New bar drawn below any bars still on screen.
pub fn progress_bar(len: u64) -> ProgressBar {
    progress().add(ProgressBar::new(len))
}

/// Stderr that hides the progress bars while a log line is written.
struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        progress().suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        progress().suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
/// Logs go to stderr so reports piped from stdout stay clean. JSON output is
/// meant for machines, so progress bars are switched off with it.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        progress().set_draw_target(ProgressDrawTarget::hidden());
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(|| LogWriter).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(|| LogWriter))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_share_one_multi_progress() {
        let first = progress_bar(3);
        let second = progress_bar(5);
        assert_eq!(first.length(), Some(3));
        assert_eq!(second.length(), Some(5));
        assert!(std::ptr::eq(progress(), progress()));
    }

    #[test]
    fn log_writer_passes_bytes_through() {
        let mut writer = LogWriter;
        writer.write_all(b"").unwrap();
        assert_eq!(writer.write(b"").unwrap(), 0);
        writer.flush().unwrap();
    }
}
