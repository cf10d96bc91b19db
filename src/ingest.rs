//! NDJSON event log reading.
//!
//! The wire framing is one JSON record per line. Decoding the framing is
//! plumbing outside the projection contract: [`read_log`] hands the
//! projector a plain sequence of already-decoded records. Blank lines are
//! tolerated (trailing newlines are common in captured logs); anything
//! else that fails to parse is a fault carrying its 1-based line number.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Faults raised while reading an event log.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read event log: {0}")]
    Read(#[from] io::Error),

    #[error("event log line {line}: invalid JSON: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Read an NDJSON event log from any buffered reader.
pub fn read_log<R: BufRead>(reader: R) -> Result<Vec<Value>, IngestError> {
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record =
            serde_json::from_str(&line).map_err(|source| IngestError::InvalidLine {
                line: number + 1,
                source,
            })?;
        records.push(record);
    }
    debug!(records = records.len(), "event log decoded");
    Ok(records)
}

/// Read an NDJSON event log from a file.
pub fn read_log_file(path: &Path) -> Result<Vec<Value>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_log(BufReader::new(file))
}
