//! Append-only sequential message log: a fixed-size index file plus a data file
//! of concatenated payload bytes, grounded on the original `DB_SAM`/`SAM_INDEX`
//! pair (`common/db_sam.cpp`, `common/MessageDB.h`).

mod error;
mod index_entry;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

pub use error::JournalError;
pub use index_entry::{IndexEntry, INDEX_ENTRY_SIZE};

/// Flush the index and data files to disk every this many appends.
const SYNC_INTERVAL: u64 = 100;

/// An append-only message log rooted at `{base_path}.idx` / `{base_path}.data`.
///
/// Sequence numbers are dense, start at 1, and strictly increase. A single
/// `MessageLog` is meant to be driven by one writer at a time (the caller, e.g. a
/// `Publisher`, enforces that); concurrent readers observe entries up to the last
/// flushed append.
pub struct MessageLog {
    index_path: PathBuf,
    data_path: PathBuf,
    index_file: File,
    data_file: File,
    message_count: u64,
    next_sequence: u64,
    appends_since_sync: u64,
}

impl MessageLog {
    /// Opens (creating if absent) the log at `base_path`, recovering
    /// `message_count`/`next_sequence` from the index file's length. A partially
    /// written tail entry (index file length not a multiple of the entry size) is
    /// truncated away rather than trusted.
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let base_path = base_path.as_ref();
        if let Some(parent) = base_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let index_path = append_ext(base_path, "idx");
        let data_path = append_ext(base_path, "data");

        let mut index_file = open_rw(&index_path)?;
        let data_file = open_rw(&data_path)?;

        let raw_len = index_file
            .seek(SeekFrom::End(0))
            .map_err(|source| io_err(&index_path, source))?;
        let whole_entries = raw_len / INDEX_ENTRY_SIZE as u64;
        let truncated_len = whole_entries * INDEX_ENTRY_SIZE as u64;
        if truncated_len != raw_len {
            index_file
                .set_len(truncated_len)
                .map_err(|source| io_err(&index_path, source))?;
            tracing::warn!(
                path = %index_path.display(),
                raw_len, truncated_len,
                "truncated partial tail index entry on open"
            );
        }

        let mut next_sequence = 1u64;
        if whole_entries > 0 {
            index_file
                .seek(SeekFrom::Start(truncated_len - INDEX_ENTRY_SIZE as u64))
                .map_err(|source| io_err(&index_path, source))?;
            let mut buf = [0u8; INDEX_ENTRY_SIZE];
            index_file
                .read_exact(&mut buf)
                .map_err(|source| io_err(&index_path, source))?;
            let last = IndexEntry::from_bytes(&buf);
            next_sequence = last.seq as u64 + 1;
        }

        index_file
            .seek(SeekFrom::End(0))
            .map_err(|source| io_err(&index_path, source))?;

        Ok(Self {
            index_path,
            data_path,
            index_file,
            data_file,
            message_count: whole_entries,
            next_sequence,
            appends_since_sync: 0,
        })
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Appends `payload`, assigning it the next sequence number. Returns the
    /// assigned sequence.
    pub fn append(&mut self, payload: &[u8], timestamp_ns: u64) -> Result<u64, JournalError> {
        let data_pos = self
            .data_file
            .seek(SeekFrom::End(0))
            .map_err(|source| io_err(&self.data_path, source))?;
        self.data_file
            .write_all(payload)
            .map_err(|source| io_err(&self.data_path, source))?;

        let seq = self.next_sequence;
        let entry = IndexEntry {
            seek: data_pos,
            size: payload.len() as u32,
            seq: seq as u32,
            timestamp: timestamp_ns,
        };
        self.index_file
            .write_all(&entry.to_bytes())
            .map_err(|source| io_err(&self.index_path, source))?;

        self.message_count += 1;
        self.next_sequence += 1;
        self.appends_since_sync += 1;
        if self.appends_since_sync >= SYNC_INTERVAL {
            self.sync()?;
        }
        Ok(seq)
    }

    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.index_file.flush().map_err(|source| io_err(&self.index_path, source))?;
        self.data_file.flush().map_err(|source| io_err(&self.data_path, source))?;
        self.appends_since_sync = 0;
        Ok(())
    }

    fn read_index(&mut self, seq: u64) -> Result<IndexEntry, JournalError> {
        if seq < 1 || seq >= self.next_sequence {
            return Err(JournalError::NotFound(seq));
        }
        let pos = (seq - 1) * INDEX_ENTRY_SIZE as u64;
        self.index_file
            .seek(SeekFrom::Start(pos))
            .map_err(|source| io_err(&self.index_path, source))?;
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        self.index_file
            .read_exact(&mut buf)
            .map_err(|source| io_err(&self.index_path, source))?;
        let entry = IndexEntry::from_bytes(&buf);
        if entry.seq as u64 != seq {
            return Err(JournalError::IntegrityError { expected: seq, actual: entry.seq as u64 });
        }
        Ok(entry)
    }

    /// Looks up message `seq`, copying its payload into `buf` (resized as needed).
    pub fn get(&mut self, seq: u64, buf: &mut Vec<u8>) -> Result<IndexEntry, JournalError> {
        let entry = self.read_index(seq)?;
        buf.resize(entry.size as usize, 0);
        self.data_file
            .seek(SeekFrom::Start(entry.seek))
            .map_err(|source| io_err(&self.data_path, source))?;
        self.data_file
            .read_exact(buf)
            .map_err(|source| io_err(&self.data_path, source))?;
        Ok(entry)
    }

    /// Iterates `[lo, hi]` in order, invoking `callback(entry, payload)` for each.
    /// Stops early if the callback returns `ControlFlow::Break`.
    pub fn range<F>(&mut self, lo: u64, hi: u64, mut callback: F) -> Result<(), JournalError>
    where
        F: FnMut(IndexEntry, &[u8]) -> ControlFlow<()>,
    {
        let mut buf = Vec::new();
        let hi = hi.min(self.next_sequence.saturating_sub(1));
        let mut seq = lo.max(1);
        while seq <= hi {
            let entry = self.get(seq, &mut buf)?;
            if callback(entry, &buf).is_break() {
                break;
            }
            seq += 1;
        }
        Ok(())
    }

    /// Confirms the entry count matches the index file's length and every entry's
    /// stored `seq` matches its position.
    pub fn verify_integrity(&mut self) -> Result<(), JournalError> {
        let len = self
            .index_file
            .seek(SeekFrom::End(0))
            .map_err(|source| io_err(&self.index_path, source))?;
        let entries = len / INDEX_ENTRY_SIZE as u64;
        if entries != self.message_count {
            return Err(JournalError::IntegrityError { expected: self.message_count, actual: entries });
        }
        for seq in 1..=self.message_count {
            self.read_index(seq)?;
        }
        Ok(())
    }
}

fn append_ext(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn open_rw(path: &Path) -> Result<File, JournalError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|source| io_err(path, source))
}

fn io_err(path: &Path, source: std::io::Error) -> JournalError {
    JournalError::Io { path: path.display().to_string(), source }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_base(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lithos_journal_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_file(append_ext(&dir, "idx"));
        let _ = std::fs::remove_file(append_ext(&dir, "data"));
        dir
    }

    #[test]
    fn append_and_get_roundtrip() {
        let base = tmp_base("roundtrip");
        let mut log = MessageLog::open(&base).unwrap();
        let seq = log.append(b"hello", 42).unwrap();
        assert_eq!(seq, 1);
        let mut buf = Vec::new();
        let entry = log.get(1, &mut buf).unwrap();
        assert_eq!(buf, b"hello");
        assert_eq!(entry.timestamp, 42);
    }

    #[test]
    fn sequences_are_dense_and_increasing() {
        let base = tmp_base("dense");
        let mut log = MessageLog::open(&base).unwrap();
        for i in 0..5 {
            assert_eq!(log.append(format!("msg{i}").as_bytes(), i).unwrap(), i + 1);
        }
        assert_eq!(log.message_count(), 5);
    }

    #[test]
    fn range_scan_in_order() {
        let base = tmp_base("range");
        let mut log = MessageLog::open(&base).unwrap();
        for i in 0..5 {
            log.append(format!("{i}").as_bytes(), 0).unwrap();
        }
        let mut seen = Vec::new();
        log.range(2, 4, |entry, payload| {
            seen.push((entry.seq, String::from_utf8(payload.to_vec()).unwrap()));
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(seen, vec![(2, "1".into()), (3, "2".into()), (4, "3".into())]);
    }

    #[test]
    fn range_beyond_max_seq_yields_nothing() {
        let base = tmp_base("range_empty");
        let mut log = MessageLog::open(&base).unwrap();
        log.append(b"x", 0).unwrap();
        let mut calls = 0;
        log.range(10, 20, |_, _| {
            calls += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn reopen_recovers_state_and_truncates_partial_tail() {
        let base = tmp_base("reopen");
        {
            let mut log = MessageLog::open(&base).unwrap();
            for i in 0..10 {
                log.append(format!("{i}").as_bytes(), 0).unwrap();
            }
            log.sync().unwrap();
        }
        // Corrupt the tail: truncate the index file to half of the last entry.
        let idx_path = append_ext(&base, "idx");
        let full_len = std::fs::metadata(&idx_path).unwrap().len();
        let half_entry_len = full_len - (INDEX_ENTRY_SIZE as u64 / 2);
        let f = OpenOptions::new().write(true).open(&idx_path).unwrap();
        f.set_len(half_entry_len).unwrap();

        let mut log = MessageLog::open(&base).unwrap();
        assert_eq!(log.message_count(), 9);
        assert_eq!(log.next_sequence(), 10);
        let mut buf = Vec::new();
        assert!(matches!(log.get(10, &mut buf), Err(JournalError::NotFound(10))));
        let seq = log.append(b"replacement", 0).unwrap();
        assert_eq!(seq, 10);
    }
}
