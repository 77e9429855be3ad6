// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! Newline-delimited JSON. Each line carries a sequence number and a CRC32
//! of the serialized operation. Replay refuses a log whose checksum or
//! sequence does not line up, except on the final line: an unreadable last
//! line is a write torn by a crash and is cut off when the log is opened.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checksum mismatch at sequence {0}")]
    Corrupt(u64),
    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    file: File,
    sequence: u64,
    /// Bytes of committed entries; a failed append is cut back to this
    len: u64,
}

impl Wal {
    /// Open or create a WAL at the given path.
    ///
    /// Returns the log positioned for appending together with the
    /// operations already in it. A torn final line is truncated.
    pub fn open(path: &Path) -> Result<(Self, Vec<Operation>), WalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let scan = scan(path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut len = scan.valid_len;
        if scan.torn_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                valid_entries = scan.ops.len(),
                dropped_bytes = scan.torn_bytes,
                "truncating torn write at end of WAL"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }
        if scan.missing_newline {
            file.write_all(b"\n")?;
            file.sync_all()?;
            len += 1;
        }

        let sequence = scan.ops.len() as u64;
        Ok((
            Self {
                file,
                sequence,
                len,
            },
            scan.ops,
        ))
    }

    /// Append an operation and fsync before returning.
    ///
    /// On failure the file is cut back to the last committed entry so a
    /// partial line never precedes the next append.
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        let entry = WalEntry::new(self.sequence + 1, op.clone())?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_all());
        if let Err(e) = written {
            if let Err(undo) = self.file.set_len(self.len) {
                tracing::error!(error = %undo, "failed to roll back partial WAL append");
            }
            return Err(e.into());
        }

        self.len += line.len() as u64;
        self.sequence += 1;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all operations from the log, ignoring a torn final line
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        Ok(scan(path)?.ops)
    }
}

struct Scan {
    ops: Vec<Operation>,
    /// Byte length of the valid prefix
    valid_len: u64,
    /// Bytes after the valid prefix belonging to a torn final line
    torn_bytes: u64,
    /// Last valid line has no terminating newline
    missing_newline: bool,
}

fn scan(path: &Path) -> Result<Scan, WalError> {
    let mut scan = Scan {
        ops: Vec::new(),
        valid_len: 0,
        torn_bytes: 0,
        missing_newline: false,
    };
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(scan),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)? as u64;
        if read == 0 {
            break;
        }
        let at_end = reader.fill_buf()?.is_empty();
        let terminated = line.last() == Some(&b'\n');

        let decoded = match std::str::from_utf8(&line) {
            Ok(text) => {
                let text = text.trim_end_matches(['\n', '\r']);
                if text.is_empty() {
                    scan.valid_len += read;
                    continue;
                }
                decode(text, scan.ops.len() as u64 + 1)
            }
            Err(_) => Err(LineError::Invalid(WalError::Corrupt(
                scan.ops.len() as u64 + 1,
            ))),
        };

        match decoded {
            Ok(op) => {
                scan.ops.push(op);
                scan.valid_len += read;
                scan.missing_newline = !terminated;
            }
            Err(LineError::Invalid(_)) if at_end => {
                scan.torn_bytes = read;
                break;
            }
            Err(LineError::Invalid(e)) | Err(LineError::Fatal(e)) => return Err(e),
        }
    }
    Ok(scan)
}

enum LineError {
    /// Unparsable or checksum mismatch; forgivable on the last line
    Invalid(WalError),
    /// Well-formed but out of order
    Fatal(WalError),
}

fn decode(text: &str, expected: u64) -> Result<Operation, LineError> {
    let entry: WalEntry =
        serde_json::from_str(text).map_err(|e| LineError::Invalid(WalError::Json(e)))?;
    if entry.seq != expected {
        return Err(LineError::Fatal(WalError::SequenceGap {
            expected,
            found: entry.seq,
        }));
    }
    match entry.verify() {
        Ok(true) => Ok(entry.op),
        Ok(false) => Err(LineError::Invalid(WalError::Corrupt(entry.seq))),
        Err(e) => Err(LineError::Fatal(e)),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    op: Operation,
    checksum: u32,
}

impl WalEntry {
    fn new(seq: u64, op: Operation) -> Result<Self, WalError> {
        let checksum = checksum(&op)?;
        Ok(Self { seq, op, checksum })
    }

    fn verify(&self) -> Result<bool, WalError> {
        Ok(self.checksum == checksum(&self.op)?)
    }
}

fn checksum(op: &Operation) -> Result<u32, WalError> {
    let json = serde_json::to_string(op)?;
    Ok(crc32fast::hash(json.as_bytes()))
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
