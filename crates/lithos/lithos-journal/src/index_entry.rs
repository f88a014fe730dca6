pub const INDEX_ENTRY_SIZE: usize = 24;

/// One fixed-size entry of the index file: where in the data file a message's
/// bytes live, how large it is, its sequence number, and when it was appended.
///
/// Mirrors `SAM_INDEX` (`_seek`, `_size`, `_seq`, `_timestamp`) byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub seek: u64,
    pub size: u32,
    pub seq: u32,
    pub timestamp: u64,
}

impl IndexEntry {
    pub fn to_bytes(self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.seek.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.size.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.seq.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        Self {
            seek: u64::from_ne_bytes(buf[0..8].try_into().unwrap()),
            size: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
            seq: u32::from_ne_bytes(buf[12..16].try_into().unwrap()),
            timestamp: u64::from_ne_bytes(buf[16..24].try_into().unwrap()),
        }
    }
}
