//! On-disk layout of a Master's record file: header + fixed-size slot array.
//! Slot shape: `{occupied, reserved, next_free, primary_key, secondary_key,
//! payload}`, chosen so `del` can read the secondary key directly off a slot
//! without a second index lookup.

pub const HEADER_SIZE: usize = 64;
pub const SLOT_HEADER_SIZE: usize = 8;

pub const MASTER_MAGIC: u64 = 0x4C48_4D53_5452_0001;
pub const MASTER_VERSION: u64 = 1;

pub const EMPTY: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterFileHeader {
    pub first_free_slot: i64,
    pub magic: u64,
    pub version: u64,
    pub capacity: u64,
    pub pkey_len: u64,
    pub skey_len: u64,
    pub record_size: u64,
}

const FIRST_FREE_OFF: usize = 0;
const MAGIC_OFF: usize = 8;
const VERSION_OFF: usize = 16;
const CAPACITY_OFF: usize = 24;
const PKEY_LEN_OFF: usize = 32;
const SKEY_LEN_OFF: usize = 40;
const RECORD_SIZE_OFF: usize = 48;

impl MasterFileHeader {
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[FIRST_FREE_OFF..FIRST_FREE_OFF + 8].copy_from_slice(&self.first_free_slot.to_ne_bytes());
        buf[MAGIC_OFF..MAGIC_OFF + 8].copy_from_slice(&self.magic.to_ne_bytes());
        buf[VERSION_OFF..VERSION_OFF + 8].copy_from_slice(&self.version.to_ne_bytes());
        buf[CAPACITY_OFF..CAPACITY_OFF + 8].copy_from_slice(&self.capacity.to_ne_bytes());
        buf[PKEY_LEN_OFF..PKEY_LEN_OFF + 8].copy_from_slice(&self.pkey_len.to_ne_bytes());
        buf[SKEY_LEN_OFF..SKEY_LEN_OFF + 8].copy_from_slice(&self.skey_len.to_ne_bytes());
        buf[RECORD_SIZE_OFF..RECORD_SIZE_OFF + 8].copy_from_slice(&self.record_size.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            first_free_slot: i64::from_ne_bytes(buf[FIRST_FREE_OFF..FIRST_FREE_OFF + 8].try_into().unwrap()),
            magic: u64::from_ne_bytes(buf[MAGIC_OFF..MAGIC_OFF + 8].try_into().unwrap()),
            version: u64::from_ne_bytes(buf[VERSION_OFF..VERSION_OFF + 8].try_into().unwrap()),
            capacity: u64::from_ne_bytes(buf[CAPACITY_OFF..CAPACITY_OFF + 8].try_into().unwrap()),
            pkey_len: u64::from_ne_bytes(buf[PKEY_LEN_OFF..PKEY_LEN_OFF + 8].try_into().unwrap()),
            skey_len: u64::from_ne_bytes(buf[SKEY_LEN_OFF..SKEY_LEN_OFF + 8].try_into().unwrap()),
            record_size: u64::from_ne_bytes(buf[RECORD_SIZE_OFF..RECORD_SIZE_OFF + 8].try_into().unwrap()),
        }
    }

    pub fn matches_shape(&self, capacity: u64, pkey_len: u64, skey_len: u64, record_size: u64) -> bool {
        self.magic == MASTER_MAGIC
            && self.version == MASTER_VERSION
            && self.capacity == capacity
            && self.pkey_len == pkey_len
            && self.skey_len == skey_len
            && self.record_size == record_size
    }
}

pub fn read_first_free_slot(buf: &[u8]) -> i32 {
    i64::from_ne_bytes(buf[FIRST_FREE_OFF..FIRST_FREE_OFF + 8].try_into().unwrap()) as i32
}

pub fn write_first_free_slot(buf: &mut [u8], value: i32) {
    buf[FIRST_FREE_OFF..FIRST_FREE_OFF + 8].copy_from_slice(&(value as i64).to_ne_bytes());
}

pub fn slot_size(pkey_len: usize, skey_len: usize, record_size: usize) -> usize {
    SLOT_HEADER_SIZE + pkey_len + skey_len + record_size
}

pub fn record_file_size(capacity: usize, pkey_len: usize, skey_len: usize, record_size: usize) -> usize {
    HEADER_SIZE + capacity * slot_size(pkey_len, skey_len, record_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    pub occupied: bool,
    pub next_free: i32,
}

impl SlotHeader {
    pub fn read(buf: &[u8]) -> Self {
        Self {
            occupied: buf[0] != 0,
            next_free: i32::from_ne_bytes(buf[4..8].try_into().unwrap()),
        }
    }

    pub fn write(self, buf: &mut [u8]) {
        buf[0] = self.occupied as u8;
        buf[1] = 0;
        buf[2] = 0;
        buf[3] = 0;
        buf[4..8].copy_from_slice(&self.next_free.to_ne_bytes());
    }
}

/// Layout offsets within one slot's bytes, past the 8-byte [`SlotHeader`].
pub struct SlotFields {
    pub pkey: std::ops::Range<usize>,
    pub skey: std::ops::Range<usize>,
    pub payload: std::ops::Range<usize>,
}

pub fn slot_fields(pkey_len: usize, skey_len: usize, record_size: usize) -> SlotFields {
    let pkey_start = SLOT_HEADER_SIZE;
    let pkey_end = pkey_start + pkey_len;
    let skey_end = pkey_end + skey_len;
    let payload_end = skey_end + record_size;
    SlotFields {
        pkey: pkey_start..pkey_end,
        skey: pkey_end..skey_end,
        payload: skey_end..payload_end,
    }
}
