//! Log output for the docsearch server.
//!
//! Events go to the terminal and to `logs/docsearch.log`. `DOCSEARCH_LOG_FILE` moves the file;
//! `RUST_LOG` overrides the configured level.
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "DOCSEARCH_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "logs/docsearch.log";

static FILE_WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. `level` is the configured `api.log_level`.
///
/// A log file that cannot be opened is reported on stderr and skipped.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let terminal = fmt::layer().with_target(false).compact();
    let file = file_writer(&log_file_path(std::env::var(LOG_FILE_ENV).ok())).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal)
        .with(file)
        .init();
}

fn log_file_path(configured: Option<String>) -> PathBuf {
    configured
        .filter(|path| !path.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from)
}

fn file_writer(path: &Path) -> Option<NonBlocking> {
    match open_append(path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = FILE_WRITER_GUARD.set(guard);
            Some(writer)
        }
        Err(err) => {
            eprintln!("Log file {} unavailable: {err}", path.display());
            None
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_override_falls_back_to_default_path() {
        assert_eq!(log_file_path(None), PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(log_file_path(Some("  ".into())), PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(
            log_file_path(Some("/var/log/docsearch.log".into())),
            PathBuf::from("/var/log/docsearch.log")
        );
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("nested").join("docsearch.log");
        open_append(&path).expect("open");
        assert!(path.is_file());
    }
}
