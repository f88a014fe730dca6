//! Persisted per-publisher sequence counters, grounded on
//! `original_source/pubsub/SequenceStorage.h`'s `PublisherSequenceRecord`.
//! Stored as a single fixed 148-byte record, whether the backing store is a
//! flat file or a `Master` slot.

pub const PUBLISHER_SEQUENCE_RECORD_SIZE: usize = 148;

const NAME_LEN: usize = 64;

const NAME_OFF: usize = 0;
const PUBLISHER_ID_OFF: usize = 64;
const PUBLISHER_DATE_OFF: usize = 68;
const TOPIC1_OFF: usize = 72;
const TOPIC2_OFF: usize = 76;
const MISC_OFF: usize = 80;
const GLOBAL_OFF: usize = 84;
const LAST_UPDATED_OFF: usize = 92;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherSequenceRecord {
    pub publisher_name: [u8; NAME_LEN],
    pub publisher_id: u32,
    pub publisher_date: i32,
    pub topic1_sequence: u32,
    pub topic2_sequence: u32,
    pub misc_sequence: u32,
    pub all_topics_sequence: u32,
    pub last_updated_time: u64,
}

impl PublisherSequenceRecord {
    pub fn new(name: &str, publisher_id: u32, publisher_date: i32) -> Self {
        let mut publisher_name = [0u8; NAME_LEN];
        let n = name.len().min(NAME_LEN - 1);
        publisher_name[..n].copy_from_slice(&name.as_bytes()[..n]);
        Self {
            publisher_name,
            publisher_id,
            publisher_date,
            topic1_sequence: 0,
            topic2_sequence: 0,
            misc_sequence: 0,
            all_topics_sequence: 0,
            last_updated_time: 0,
        }
    }

    pub fn name(&self) -> &str {
        let end = self.publisher_name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        std::str::from_utf8(&self.publisher_name[..end]).unwrap_or("")
    }

    /// Returns the sequence counter for one topic (1, 2, 4, or 7 for all).
    pub fn topic_sequence(&self, topic: u32) -> u32 {
        match topic {
            1 => self.topic1_sequence,
            2 => self.topic2_sequence,
            4 => self.misc_sequence,
            7 => self.all_topics_sequence,
            _ => 0,
        }
    }

    /// Advances the global counter and the given topic's counter by one,
    /// returning the new global sequence number.
    pub fn advance(&mut self, topic: u32, now_ns: u64) -> u32 {
        self.all_topics_sequence += 1;
        match topic {
            1 => self.topic1_sequence += 1,
            2 => self.topic2_sequence += 1,
            4 => self.misc_sequence += 1,
            _ => {}
        }
        self.last_updated_time = now_ns;
        self.all_topics_sequence
    }

    pub fn to_bytes(&self) -> [u8; PUBLISHER_SEQUENCE_RECORD_SIZE] {
        let mut buf = [0u8; PUBLISHER_SEQUENCE_RECORD_SIZE];
        buf[NAME_OFF..NAME_OFF + NAME_LEN].copy_from_slice(&self.publisher_name);
        buf[PUBLISHER_ID_OFF..PUBLISHER_ID_OFF + 4].copy_from_slice(&self.publisher_id.to_ne_bytes());
        buf[PUBLISHER_DATE_OFF..PUBLISHER_DATE_OFF + 4].copy_from_slice(&self.publisher_date.to_ne_bytes());
        buf[TOPIC1_OFF..TOPIC1_OFF + 4].copy_from_slice(&self.topic1_sequence.to_ne_bytes());
        buf[TOPIC2_OFF..TOPIC2_OFF + 4].copy_from_slice(&self.topic2_sequence.to_ne_bytes());
        buf[MISC_OFF..MISC_OFF + 4].copy_from_slice(&self.misc_sequence.to_ne_bytes());
        buf[GLOBAL_OFF..GLOBAL_OFF + 4].copy_from_slice(&self.all_topics_sequence.to_ne_bytes());
        buf[LAST_UPDATED_OFF..LAST_UPDATED_OFF + 8].copy_from_slice(&self.last_updated_time.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        let mut publisher_name = [0u8; NAME_LEN];
        publisher_name.copy_from_slice(&buf[NAME_OFF..NAME_OFF + NAME_LEN]);
        Self {
            publisher_name,
            publisher_id: u32::from_ne_bytes(buf[PUBLISHER_ID_OFF..PUBLISHER_ID_OFF + 4].try_into().unwrap()),
            publisher_date: i32::from_ne_bytes(buf[PUBLISHER_DATE_OFF..PUBLISHER_DATE_OFF + 4].try_into().unwrap()),
            topic1_sequence: u32::from_ne_bytes(buf[TOPIC1_OFF..TOPIC1_OFF + 4].try_into().unwrap()),
            topic2_sequence: u32::from_ne_bytes(buf[TOPIC2_OFF..TOPIC2_OFF + 4].try_into().unwrap()),
            misc_sequence: u32::from_ne_bytes(buf[MISC_OFF..MISC_OFF + 4].try_into().unwrap()),
            all_topics_sequence: u32::from_ne_bytes(buf[GLOBAL_OFF..GLOBAL_OFF + 4].try_into().unwrap()),
            last_updated_time: u64::from_ne_bytes(buf[LAST_UPDATED_OFF..LAST_UPDATED_OFF + 8].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_all_fields() {
        let mut record = PublisherSequenceRecord::new("quotes-publisher", 7, 20260728);
        record.advance(1, 111);
        record.advance(2, 222);
        record.advance(1, 333);

        let bytes = record.to_bytes();
        let back = PublisherSequenceRecord::from_bytes(&bytes);
        assert_eq!(back, record);
        assert_eq!(back.name(), "quotes-publisher");
    }

    #[test]
    fn global_counter_tracks_sum_of_topics() {
        let mut record = PublisherSequenceRecord::new("p", 1, 20260101);
        record.advance(1, 1);
        record.advance(2, 2);
        record.advance(4, 3);
        assert_eq!(record.all_topics_sequence, 3);
        assert_eq!(record.topic1_sequence + record.topic2_sequence + record.misc_sequence, 3);
    }

    #[test]
    fn long_name_is_truncated_not_overflowed() {
        let long = "a".repeat(200);
        let record = PublisherSequenceRecord::new(&long, 1, 1);
        assert_eq!(record.publisher_name.len(), 64);
        assert_eq!(record.publisher_name[63], 0);
    }
}
