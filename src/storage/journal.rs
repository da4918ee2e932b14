//! Append-only transaction journal
//!
//! One JSON line per committed unit of work:
//!
//! ```text
//! {"seq":1,"checksum":3735928559,"body":{"committed_at":"...","balances":[...],"entries":[...]}}
//! ```
//!
//! The checksum is a CRC32 of the serialized body. A record is durable once
//! its line has been written and synced; only then does the commit publish
//! anything in memory. Lines are never rewritten. The one exception is a torn
//! final line left by a crash mid-append, which is dropped on open.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, Money, Transaction};

/// Balance of one account after a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub balance: Money,
}

/// Everything one commit changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBody {
    pub committed_at: DateTime<Utc>,
    pub balances: Vec<BalanceUpdate>,
    pub entries: Vec<Transaction>,
}

/// A verified journal record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub seq: u64,
    pub body: CommitBody,
}

#[derive(Serialize)]
struct LineOut<'a> {
    seq: u64,
    checksum: u32,
    body: &'a CommitBody,
}

#[derive(Deserialize)]
struct LineIn {
    seq: u64,
    checksum: u32,
    body: CommitBody,
}

fn checksum(body: &CommitBody) -> LedgerResult<u32> {
    Ok(crc32fast::hash(&serde_json::to_vec(body)?))
}

/// Writer side of the journal
///
/// Not synchronized; the store serializes access behind its own mutex.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    last_seq: u64,
    last_committed_at: Option<DateTime<Utc>>,
    /// Length of the file up to and including the last good record
    valid_len: u64,
}

impl Journal {
    /// Open the journal, returning every committed record in order
    ///
    /// A final line that is torn, unparseable or fails its checksum is
    /// discarded and the file truncated to the last good record. Damage
    /// anywhere before the tail is a persistence error: later records may
    /// depend on the damaged one. So is any intact record whose sequence
    /// number does not follow the one before it, tail included.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<(Self, Vec<JournalRecord>)> {
        let path = path.into();
        let mut journal = Self {
            path,
            last_seq: 0,
            last_committed_at: None,
            valid_len: 0,
        };

        if !journal.path.exists() {
            return Ok((journal, Vec::new()));
        }

        let bytes = fs::read(&journal.path).map_err(|e| {
            LedgerError::Persistence(format!(
                "Failed to read journal {}: {}",
                journal.path.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            let rest = &bytes[offset..];
            let Some(newline) = rest.iter().position(|&b| b == b'\n') else {
                // No terminator: the process died mid-write
                tracing::warn!(
                    journal = %journal.path.display(),
                    discarded_bytes = rest.len(),
                    "discarding torn journal tail"
                );
                break;
            };

            let line = &rest[..newline];
            let next_offset = offset + newline + 1;
            let is_last = bytes[next_offset..].iter().all(|b| b.is_ascii_whitespace());

            let parsed = match journal.decode_line(line) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => {
                    journal.valid_len = next_offset as u64;
                    offset = next_offset;
                    continue;
                }
                Err(err) if is_last => {
                    tracing::warn!(
                        journal = %journal.path.display(),
                        error = %err,
                        "discarding unreadable final journal record"
                    );
                    break;
                }
                Err(err) => return Err(err),
            };

            // Intact records are never discarded, tail or not
            let record = journal.check_sequence(parsed)?;
            journal.last_seq = record.seq;
            journal.last_committed_at = Some(record.body.committed_at);
            journal.valid_len = next_offset as u64;
            records.push(record);

            offset = next_offset;
        }

        if journal.valid_len < bytes.len() as u64 {
            journal.truncate_to_valid()?;
        }

        tracing::debug!(
            journal = %journal.path.display(),
            records = records.len(),
            last_seq = journal.last_seq,
            "journal opened"
        );

        Ok((journal, records))
    }

    /// Parse one line and verify its checksum
    fn decode_line(&self, line: &[u8]) -> LedgerResult<Option<JournalRecord>> {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }

        let parsed: LineIn = serde_json::from_slice(line).map_err(|e| {
            LedgerError::Persistence(format!(
                "Corrupt journal record after seq {}: {}",
                self.last_seq, e
            ))
        })?;

        if parsed.checksum != checksum(&parsed.body)? {
            return Err(LedgerError::Persistence(format!(
                "Checksum mismatch in journal record {}",
                parsed.seq
            )));
        }

        Ok(Some(JournalRecord {
            seq: parsed.seq,
            body: parsed.body,
        }))
    }

    fn check_sequence(&self, record: JournalRecord) -> LedgerResult<JournalRecord> {
        if record.seq != self.last_seq + 1 {
            return Err(LedgerError::Persistence(format!(
                "Journal sequence gap in {}: expected {}, found {}",
                self.path.display(),
                self.last_seq + 1,
                record.seq
            )));
        }
        Ok(record)
    }

    fn truncate_to_valid(&self) -> LedgerResult<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(self.valid_len)?;
        file.sync_all()?;
        Ok(())
    }

    /// Durably append one record and return its sequence number
    ///
    /// On failure the file is cut back to the last good record and the
    /// sequence number is not consumed.
    pub fn append(&mut self, body: &CommitBody) -> LedgerResult<u64> {
        let seq = self.last_seq + 1;
        let mut line = serde_json::to_vec(&LineOut {
            seq,
            checksum: checksum(body)?,
            body,
        })?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LedgerError::Persistence(format!(
                    "Failed to open journal {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        if let Err(e) = write_synced(&mut file, &line) {
            let _ = file.set_len(self.valid_len);
            return Err(LedgerError::Persistence(format!(
                "Failed to append journal record {}: {}",
                seq, e
            )));
        }

        self.last_seq = seq;
        self.last_committed_at = Some(body.committed_at);
        self.valid_len += line.len() as u64;
        Ok(seq)
    }

    /// Sequence number of the last durable record (0 when empty)
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Commit time to stamp on the next record
    ///
    /// Never earlier than the previous record, so journal order and time
    /// order agree even if the wall clock steps back.
    pub fn next_commit_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_committed_at {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_synced(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line)?;
    file.flush()?;
    file.sync_data()
}
