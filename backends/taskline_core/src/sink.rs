use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use taskline_sync::{OnceError, OnceInitializer, OncePolicy, SyncLock};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open log file: {0}")]
    Open(#[source] io::Error),

    #[error("failed to write log line: {0}")]
    Write(#[from] io::Error),

    #[error("log file unavailable: {0}")]
    Unavailable(String),
}

/// A file shared by many threads where each line is written whole.
///
/// No I/O happens until the first [`LogFile::shared_print`]; that call opens
/// the file (append mode, created when missing) through a
/// [`OnceInitializer`], so concurrent first writers open it exactly once.
/// The writer itself never leaves the lock.
pub struct LogFile {
    path: PathBuf,
    opened: OnceInitializer,
    writer: SyncLock<Option<BufWriter<File>>>,
    lines: AtomicU64,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_policy(path, OncePolicy::Retry)
    }

    /// With [`OncePolicy::Sticky`] a failed open is remembered and later
    /// writes fail with [`SinkError::Unavailable`] without touching the disk.
    pub fn with_policy(path: impl Into<PathBuf>, policy: OncePolicy) -> Self {
        Self {
            path: path.into(),
            opened: OnceInitializer::with_policy(policy),
            writer: SyncLock::new(None),
            lines: AtomicU64::new(0),
        }
    }

    /// Appends `From <id>: <value>` as one line and flushes it.
    ///
    /// # Errors
    ///
    /// [`SinkError::Open`] when the lazy open fails, [`SinkError::Write`] on
    /// a write failure and [`SinkError::Unavailable`] after a sticky open
    /// failure.
    pub fn shared_print(
        &self,
        id: impl fmt::Display,
        value: impl fmt::Display,
    ) -> Result<(), SinkError> {
        self.ensure_open()?;

        let mut writer = self.writer.lock();
        let Some(file) = writer.as_mut() else {
            return Err(SinkError::Unavailable(String::from("writer missing after open")));
        };
        writeln!(file, "From {id}: {value}")?;
        file.flush()?;
        drop(writer);

        self.lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        self.opened
            .run(|| {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                *self.writer.lock() = Some(BufWriter::new(file));
                taskline_logs::info!(path = %self.path.display(), "log file opened");
                Ok::<(), io::Error>(())
            })
            .map_err(|err| match err {
                OnceError::Failed(err) => SinkError::Open(err),
                OnceError::Poisoned(reason) => SinkError::Unavailable(reason),
            })
    }

    /// Lines successfully written so far.
    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened.is_done()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for LogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFile")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("lines", &self.lines_written())
            .finish()
    }
}
