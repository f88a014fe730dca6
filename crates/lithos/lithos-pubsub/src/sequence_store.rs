//! Durable storage for each publisher's sequence counters.
//! Grounded on `original_source/pubsub/FileSequenceStorage.h` (flat-file
//! backend) and `SequenceStorage.h` (the shared record shape, backend-agnostic
//! interface).

use std::fs;
use std::path::{Path, PathBuf};

use lithos_events::PublisherSequenceRecord;
use lithos_events::sequence::PUBLISHER_SEQUENCE_RECORD_SIZE;
use lithos_master::{Master, MasterConfig};

use crate::error::PubSubError;

/// Loads, persists, and atomically increments a publisher's sequence record.
pub trait SequenceStore: Send + Sync {
    fn load(&self, publisher_name: &str) -> Result<Option<PublisherSequenceRecord>, PubSubError>;
    fn save(&self, record: &PublisherSequenceRecord) -> Result<(), PubSubError>;
    /// Loads the record (creating it fresh via `PublisherSequenceRecord::new`
    /// with `publisher_id`/`publisher_date` if absent), bumps `topic`'s
    /// counter and the global counter by one, persists the result, and
    /// returns the new `(global_seq, topic_seq)`.
    fn increment(
        &self,
        publisher_name: &str,
        publisher_id: u32,
        publisher_date: i32,
        topic: u32,
        now_ns: u64,
    ) -> Result<(u32, u32), PubSubError>;
}

/// One flat file per publisher at `{dir}/{name}.seq`, truncate-and-write.
pub struct FileSequenceStore {
    dir: PathBuf,
}

impl FileSequenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, publisher_name: &str) -> PathBuf {
        self.dir.join(format!("{publisher_name}.seq"))
    }
}

impl SequenceStore for FileSequenceStore {
    fn load(&self, publisher_name: &str) -> Result<Option<PublisherSequenceRecord>, PubSubError> {
        match fs::read(self.path(publisher_name)) {
            Ok(bytes) if bytes.len() == PUBLISHER_SEQUENCE_RECORD_SIZE => {
                Ok(Some(PublisherSequenceRecord::from_bytes(&bytes)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &PublisherSequenceRecord) -> Result<(), PubSubError> {
        fs::write(self.path(record.name()), record.to_bytes())?;
        Ok(())
    }

    fn increment(
        &self,
        publisher_name: &str,
        publisher_id: u32,
        publisher_date: i32,
        topic: u32,
        now_ns: u64,
    ) -> Result<(u32, u32), PubSubError> {
        let mut record = self
            .load(publisher_name)?
            .unwrap_or_else(|| PublisherSequenceRecord::new(publisher_name, publisher_id, publisher_date));
        let global_seq = record.advance(topic, now_ns);
        let topic_seq = record.topic_sequence(topic);
        self.save(&record)?;
        Ok((global_seq, topic_seq))
    }
}

/// A single [`Master`] keyed by publisher name, storing `PublisherSequenceRecord`
/// as its payload. `increment` goes through `Master::mutate_primary` so a
/// counter bump never pays for a full encode/decode cycle, and 8 bytes in the
/// record's unused trailer (the record proper ends at
/// `PUBLISHER_SEQUENCE_RECORD_SIZE`'s `last_updated_time` field, byte 100;
/// the slot is sized for the full 148-byte record) carry an odd/even
/// generation word bracketing the write, the same discipline
/// `lithos_icc::SeqlockSlot` used, so a reader racing the writer can detect
/// a torn record instead of returning one.
pub struct MasterSequenceStore {
    master: Master,
}

const GENERATION_OFFSET: usize = 100;

impl MasterSequenceStore {
    pub fn open(base_path: impl AsRef<Path>, max_publishers: usize) -> Result<Self, PubSubError> {
        let master = Master::open(MasterConfig {
            base_path: base_path.as_ref().to_path_buf(),
            max_record_count: max_publishers,
            max_record_size: PUBLISHER_SEQUENCE_RECORD_SIZE,
            bucket_count: (max_publishers.next_power_of_two()).max(16),
            primary_key_len: 64,
            secondary_key_len: 0,
            use_lock: true,
        })?;
        Ok(Self { master })
    }

    fn key(name: &str) -> [u8; 64] {
        let mut key = [0u8; 64];
        let n = name.len().min(64);
        key[..n].copy_from_slice(&name.as_bytes()[..n]);
        key
    }
}

impl SequenceStore for MasterSequenceStore {
    fn load(&self, publisher_name: &str) -> Result<Option<PublisherSequenceRecord>, PubSubError> {
        match self.master.get_by_primary(&Self::key(publisher_name)) {
            Ok(bytes) => Ok(Some(PublisherSequenceRecord::from_bytes(&bytes))),
            Err(lithos_master::MasterError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &PublisherSequenceRecord) -> Result<(), PubSubError> {
        let key = Self::key(record.name());
        let bytes = record.to_bytes();
        match self.master.put(&key, None, &bytes) {
            Ok(()) => Ok(()),
            Err(lithos_master::MasterError::DuplicatePrimary) => {
                self.master.mutate_primary(&key, |payload| payload.copy_from_slice(&bytes))?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn increment(
        &self,
        publisher_name: &str,
        publisher_id: u32,
        publisher_date: i32,
        topic: u32,
        now_ns: u64,
    ) -> Result<(u32, u32), PubSubError> {
        let key = Self::key(publisher_name);
        if self.master.get_by_primary(&key).is_err() {
            self.save(&PublisherSequenceRecord::new(publisher_name, publisher_id, publisher_date))?;
        }

        let (global_seq, topic_seq) = self.master.mutate_primary(&key, |payload| {
            let generation = u64::from_ne_bytes(payload[GENERATION_OFFSET..GENERATION_OFFSET + 8].try_into().unwrap());
            payload[GENERATION_OFFSET..GENERATION_OFFSET + 8].copy_from_slice(&generation.wrapping_add(1).to_ne_bytes());

            let mut record = PublisherSequenceRecord::from_bytes(payload);
            let global_seq = record.advance(topic, now_ns);
            let topic_seq = record.topic_sequence(topic);
            payload.copy_from_slice(&record.to_bytes());

            payload[GENERATION_OFFSET..GENERATION_OFFSET + 8].copy_from_slice(&generation.wrapping_add(2).to_ne_bytes());
            (global_seq, topic_seq)
        })?;
        Ok((global_seq, topic_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrips_and_increments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSequenceStore::new(dir.path()).unwrap();
        assert!(store.load("quotes").unwrap().is_none());

        let (seq, topic_seq) = store.increment("quotes", 1, 20260728, 1, 100).unwrap();
        assert_eq!((seq, topic_seq), (1, 1));
        let (seq2, topic_seq2) = store.increment("quotes", 1, 20260728, 1, 200).unwrap();
        assert_eq!((seq2, topic_seq2), (2, 2));

        let record = store.load("quotes").unwrap().unwrap();
        assert_eq!(record.topic1_sequence, 2);
        assert_eq!(record.all_topics_sequence, 2);
    }

    #[test]
    fn master_store_roundtrips_and_increments() {
        let dir = tempfile::tempdir().unwrap();
        let store = MasterSequenceStore::open(dir.path().join("seq"), 8).unwrap();

        let (seq, topic_seq) = store.increment("pub-a", 1, 20260728, 2, 10).unwrap();
        assert_eq!((seq, topic_seq), (1, 1));
        let (seq2, topic_seq2) = store.increment("pub-a", 1, 20260728, 4, 20).unwrap();
        assert_eq!((seq2, topic_seq2), (2, 1));

        let record = store.load("pub-a").unwrap().unwrap();
        assert_eq!(record.topic2_sequence, 1);
        assert_eq!(record.misc_sequence, 1);
        assert_eq!(record.all_topics_sequence, 2);
    }

    #[test]
    fn generation_word_does_not_clobber_last_updated_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = MasterSequenceStore::open(dir.path().join("seq"), 8).unwrap();

        store.increment("pub-a", 1, 20260728, 1, 555).unwrap();
        let record = store.load("pub-a").unwrap().unwrap();
        assert_eq!(record.last_updated_time, 555);
    }
}
