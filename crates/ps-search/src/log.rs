//! Append-only JSON Lines sink for discovered records.

use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use ps_types::{PsResult, Record};

/// Record log at a caller-supplied path.
///
/// The file is opened, appended to and closed on every write; no handle is
/// kept between calls, and the file is never truncated. Writers sharing one
/// `ResultLog` are serialized so each record lands as a single line.
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ResultLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record followed by a newline, creating the file if needed.
    pub fn append(&self, record: &Record) -> PsResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(path = %self.path.display(), "record appended");
        Ok(())
    }

    /// Every record currently in this log.
    pub fn records(&self) -> PsResult<Vec<Record>> {
        Self::read_records(&self.path)
    }

    /// Parse a JSON Lines file back into records. Blank lines are skipped.
    pub fn read_records<P: AsRef<Path>>(path: P) -> PsResult<Vec<Record>> {
        let file = std::fs::File::open(path)?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

/// Append a single record to the log at `path`.
pub fn append<P: AsRef<Path>>(path: P, record: &Record) -> PsResult<()> {
    ResultLog::new(path).append(record)
}
