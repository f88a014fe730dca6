//! On-disk layout for the two files a [`crate::HashIndex`] owns: a bucket file
//! (header + array of chain-head slot indices) and a slot file (array of
//! collision-chain entries). Mirrors `HashIndexTable`/`DataIndexEntry` from the
//! original `HashTable.h`, minus the in-process pointer fields.

pub const BUCKET_HEADER_SIZE: usize = 64;
pub const BUCKET_ENTRY_SIZE: usize = 4;
pub const SLOT_HEADER_SIZE: usize = 16;

/// ASCII "LHIX0001" folded into a u64, distinguishing this from the broadcast
/// ring's `RING_MAGIC`.
pub const HASHINDEX_MAGIC: u64 = 0x4C48_4958_3030_3031;
pub const HASHINDEX_VERSION: u64 = 1;

pub const EMPTY: i32 = -1;

/// `first_free_slot` lives at offset 0 (ahead of `magic`), mirroring the field
/// order `HashIndexTable` declares it in; everything past `is_text_key` is
/// padding out to one cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketFileHeader {
    pub first_free_slot: i64,
    pub magic: u64,
    pub version: u64,
    pub bucket_count: u64,
    pub slot_count: u64,
    pub key_len: u64,
    pub is_text_key: bool,
}

const FIRST_FREE_OFFSET: usize = 0;
const MAGIC_OFFSET: usize = 8;
const VERSION_OFFSET: usize = 16;
const BUCKET_COUNT_OFFSET: usize = 24;
const SLOT_COUNT_OFFSET: usize = 32;
const KEY_LEN_OFFSET: usize = 40;
const IS_TEXT_KEY_OFFSET: usize = 48;

impl BucketFileHeader {
    pub fn to_bytes(self) -> [u8; BUCKET_HEADER_SIZE] {
        let mut buf = [0u8; BUCKET_HEADER_SIZE];
        buf[FIRST_FREE_OFFSET..FIRST_FREE_OFFSET + 8].copy_from_slice(&self.first_free_slot.to_ne_bytes());
        buf[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(&self.magic.to_ne_bytes());
        buf[VERSION_OFFSET..VERSION_OFFSET + 8].copy_from_slice(&self.version.to_ne_bytes());
        buf[BUCKET_COUNT_OFFSET..BUCKET_COUNT_OFFSET + 8].copy_from_slice(&self.bucket_count.to_ne_bytes());
        buf[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 8].copy_from_slice(&self.slot_count.to_ne_bytes());
        buf[KEY_LEN_OFFSET..KEY_LEN_OFFSET + 8].copy_from_slice(&self.key_len.to_ne_bytes());
        buf[IS_TEXT_KEY_OFFSET] = self.is_text_key as u8;
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            first_free_slot: i64::from_ne_bytes(buf[FIRST_FREE_OFFSET..FIRST_FREE_OFFSET + 8].try_into().unwrap()),
            magic: u64::from_ne_bytes(buf[MAGIC_OFFSET..MAGIC_OFFSET + 8].try_into().unwrap()),
            version: u64::from_ne_bytes(buf[VERSION_OFFSET..VERSION_OFFSET + 8].try_into().unwrap()),
            bucket_count: u64::from_ne_bytes(buf[BUCKET_COUNT_OFFSET..BUCKET_COUNT_OFFSET + 8].try_into().unwrap()),
            slot_count: u64::from_ne_bytes(buf[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 8].try_into().unwrap()),
            key_len: u64::from_ne_bytes(buf[KEY_LEN_OFFSET..KEY_LEN_OFFSET + 8].try_into().unwrap()),
            is_text_key: buf[IS_TEXT_KEY_OFFSET] != 0,
        }
    }

    pub fn matches_shape(&self, bucket_count: u64, slot_count: u64, key_len: u64, is_text_key: bool) -> bool {
        self.magic == HASHINDEX_MAGIC
            && self.version == HASHINDEX_VERSION
            && self.bucket_count == bucket_count
            && self.slot_count == slot_count
            && self.key_len == key_len
            && self.is_text_key == is_text_key
    }
}

pub fn read_first_free_slot(buf: &[u8]) -> i32 {
    i64::from_ne_bytes(buf[FIRST_FREE_OFFSET..FIRST_FREE_OFFSET + 8].try_into().unwrap()) as i32
}

pub fn write_first_free_slot(buf: &mut [u8], value: i32) {
    buf[FIRST_FREE_OFFSET..FIRST_FREE_OFFSET + 8].copy_from_slice(&(value as i64).to_ne_bytes());
}

pub fn bucket_file_size(bucket_count: usize) -> usize {
    BUCKET_HEADER_SIZE + bucket_count * BUCKET_ENTRY_SIZE
}

pub fn slot_size(key_len: usize) -> usize {
    SLOT_HEADER_SIZE + key_len
}

pub fn slot_file_size(slot_count: usize, key_len: usize) -> usize {
    slot_count * slot_size(key_len)
}

/// A decoded view of one slot's fixed header fields (the key bytes are accessed
/// separately, since their length is only known at runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    pub occupied: bool,
    pub next_in_chain: i32,
    pub next_free: i32,
    pub data_index: i32,
}

impl SlotHeader {
    pub fn read(buf: &[u8]) -> Self {
        Self {
            occupied: i32::from_ne_bytes(buf[0..4].try_into().unwrap()) != 0,
            next_in_chain: i32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            next_free: i32::from_ne_bytes(buf[8..12].try_into().unwrap()),
            data_index: i32::from_ne_bytes(buf[12..16].try_into().unwrap()),
        }
    }

    pub fn write(self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&(self.occupied as i32).to_ne_bytes());
        buf[4..8].copy_from_slice(&self.next_in_chain.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.next_free.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.data_index.to_ne_bytes());
    }
}

pub fn read_bucket_head(buf: &[u8], bucket: usize) -> i32 {
    let off = BUCKET_HEADER_SIZE + bucket * BUCKET_ENTRY_SIZE;
    i32::from_ne_bytes(buf[off..off + BUCKET_ENTRY_SIZE].try_into().unwrap())
}

pub fn write_bucket_head(buf: &mut [u8], bucket: usize, head: i32) {
    let off = BUCKET_HEADER_SIZE + bucket * BUCKET_ENTRY_SIZE;
    buf[off..off + BUCKET_ENTRY_SIZE].copy_from_slice(&head.to_ne_bytes());
}
