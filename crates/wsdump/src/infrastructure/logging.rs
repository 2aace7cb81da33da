//! `tracing` subscriber setup: console plus a size-rotated log file.
//!
//! The file layer writes through [`RotatingFile`].  fmt formats each event into
//! one buffer and hands it over in a single write, and the writer holds the
//! file mutex for the whole of that write, so lines from concurrent sessions
//! never interleave.  Once the active file would grow past the rotation size
//! it is renamed to `<name>.<YYYYMMDDHHMMSSffffff>` and a fresh file started.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::settings::LoggingSettings;

/// Installs the global subscriber described by `settings`.
///
/// `RUST_LOG` wins over `settings.level` when set.  The returned guard must
/// be kept alive for the life of the process; dropping it syncs the log file.
///
/// # Errors
///
/// Fails if the log directory or file cannot be created, the level string is
/// not a valid filter, or a global subscriber is already installed.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<LoggingGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .with_context(|| format!("invalid log level '{}'", settings.level))?,
    };

    let file = RotatingFile::open(settings.file_path(), settings.rotate_bytes)?;

    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(LoggingGuard { file })
}

/// Keeps the log file alive; syncs it to disk on drop.
#[must_use = "dropping the guard early loses buffered log output"]
pub struct LoggingGuard {
    file: RotatingFile,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        let state = self.file.state.lock();
        let _ = state.file.sync_data();
    }
}

// ── Rotating file writer ──────────────────────────────────────────────────────

/// A log file that is archived and restarted once it reaches a size limit.
///
/// Cloning shares the same underlying file.
#[derive(Clone)]
pub struct RotatingFile {
    path: Arc<PathBuf>,
    state: Arc<Mutex<RotatingState>>,
}

struct RotatingState {
    file: File,
    written: u64,
    limit: u64,
}

impl RotatingFile {
    /// Opens (appending to) the file at `path`, creating its directory.
    pub fn open(path: impl Into<PathBuf>, limit: u64) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
        let file = open_append(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path: Arc::new(path),
            state: Arc::new(Mutex::new(RotatingState {
                file,
                written,
                limit,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RotatingState {
    fn write_event(&mut self, path: &Path, buf: &[u8]) -> io::Result<()> {
        // A single event larger than the limit still goes into a file of its
        // own rather than being dropped.
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.rotate(path)?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn rotate(&mut self, path: &Path) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(path, archive_path(path))?;
        self.file = open_append(path)?;
        self.written = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `log.raw` becomes `log.raw.20180912140307123456`, with a numeric suffix if
/// two rotations land in the same microsecond.
fn archive_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d%H%M%S%6f");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{stamp}"));
    let base = PathBuf::from(name);

    let mut candidate = base.clone();
    let mut n = 1u32;
    while candidate.exists() {
        let mut name = base.as_os_str().to_owned();
        name.push(format!("-{n}"));
        candidate = PathBuf::from(name);
        n += 1;
    }
    candidate
}

/// One event's worth of exclusive access to the log file.
pub struct RotatingWriter<'a> {
    path: &'a Path,
    state: MutexGuard<'a, RotatingState>,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.write_event(self.path, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter {
            path: &self.path,
            state: self.state.lock(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
