//! Log destination setup from the `log*` settings.
//!
//! Logging goes through `tracing`. A run installs its subscriber with
//! [`tracing::subscriber::set_default`], so it is active only while the
//! returned [`LogGuard`] lives and never leaks into other runs in the same
//! process.
//!
//! | setting     | meaning                                              |
//! |-------------|------------------------------------------------------|
//! | `log`       | file name, `stderr`, or empty / `none` for no logging |
//! | `log-level` | debug, info, warning, error, critical, fatal         |
//! | `log-max`   | rotate the file once it would exceed this many bytes |
//! | `log-keep`  | number of rotated files kept (`FILE.1` is newest)    |
//! | `log-mode`  | octal permissions for newly created log files        |

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{AppError, ConfigError};
use crate::settings::Settings;

/// Keeps the run's log subscriber installed until dropped.
#[must_use = "logging stops when the guard is dropped"]
pub struct LogGuard {
    guard: Option<DefaultGuard>,
}

impl LogGuard {
    /// A guard for a run without logging.
    pub fn none() -> Self {
        Self { guard: None }
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }
}

/// Install the log destination described by `settings`.
pub fn setup(settings: &Settings) -> Result<LogGuard, AppError> {
    let target = settings.string("log")?;
    let level = filter_level(settings.string("log-level")?);

    match target {
        "" | "none" => Ok(LogGuard::none()),
        "stderr" => Ok(install(level, io::stderr)),
        path => {
            let mode = parse_mode(settings.string("log-mode")?)?;
            let max = u64::try_from(settings.integer("log-max")?).unwrap_or(0);
            let keep = usize::try_from(settings.integer("log-keep")?).unwrap_or(0);
            let file = RotatingFile::open(Path::new(path), max, keep, mode).map_err(|source| {
                ConfigError::IoError {
                    path: PathBuf::from(path),
                    source,
                }
            })?;
            Ok(install(level, file))
        }
    }
}

fn install<W>(level: &str, writer: W) -> LogGuard
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(fmt::layer().with_writer(writer).with_ansi(false));
    LogGuard {
        guard: Some(tracing::subscriber::set_default(subscriber)),
    }
}

/// Map a `log-level` choice onto a tracing filter directive.
fn filter_level(level: &str) -> &'static str {
    match level {
        "debug" => "debug",
        "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}

fn parse_mode(mode: &str) -> Result<u32, ConfigError> {
    u32::from_str_radix(mode, 8).map_err(|_| ConfigError::InvalidValue {
        name: "log-mode".into(),
        reason: format!("'{mode}' is not an octal permission mode"),
    })
}

/// A log file that rotates itself once it grows past a size limit.
///
/// Rotation renames `FILE` to `FILE.1`, `FILE.1` to `FILE.2` and so on,
/// dropping whatever would become `FILE.{keep + 1}`.
#[derive(Clone)]
pub struct RotatingFile {
    inner: Arc<Mutex<RotatingInner>>,
}

struct RotatingInner {
    path: PathBuf,
    file: File,
    size: u64,
    max: u64,
    keep: usize,
    mode: u32,
}

impl RotatingFile {
    /// Open `path` for appending. `max == 0` disables rotation.
    pub fn open(path: &Path, max: u64, keep: usize, mode: u32) -> io::Result<Self> {
        let file = open_log(path, mode)?;
        let size = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingInner {
                path: path.to_path_buf(),
                file,
                size,
                max,
                keep,
                mode,
            })),
        })
    }
}

fn open_log(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

impl RotatingInner {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.keep == 0 {
            fs::remove_file(&self.path)?;
        } else {
            let oldest = numbered(&self.path, self.keep);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.keep).rev() {
                let from = numbered(&self.path, n);
                if from.exists() {
                    fs::rename(&from, numbered(&self.path, n + 1))?;
                }
            }
            fs::rename(&self.path, numbered(&self.path, 1))?;
        }
        self.file = open_log(&self.path, self.mode)?;
        self.size = 0;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max > 0 && self.size > 0 && self.size + buf.len() as u64 > self.max {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(buf.len())
    }
}

/// Handle given to the fmt layer for each log event.
pub struct RotatingWriter {
    inner: Arc<Mutex<RotatingInner>>,
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter {
            inner: self.inner.clone(),
        }
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock().map_err(|_| io::ErrorKind::Other)?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.inner.lock().map_err(|_| io::ErrorKind::Other)?;
        guard.file.flush()
    }
}
