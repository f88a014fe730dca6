//! Memory-mapped chained-bucket hash table from fixed-length keys to 32-bit data
//! slot indices, grounded on `original_source/HashMaster/HashTable.h`.
//!
//! Two files back one `HashIndex`: a bucket file (header + chain-head array) and
//! a slot file (collision-chain entries + embedded free list). On open, the
//! bucket header's magic/version/shape is validated; a mismatch (including first
//! use, when the files are freshly created and zeroed) triggers a full
//! reinitialization rather than a hard failure, the same validate-or-reinit
//! discipline `lithos-icc`'s `RingHeader` used for the broadcast ring.

mod error;
mod hash;
mod layout;

use std::cell::UnsafeCell;
use std::path::{Path, PathBuf};

use lithos_mmap::MmapFileMut;
use parking_lot::RwLock;

pub use error::HashIndexError;
use hash::{djb2, key_eq};
use layout::{
    bucket_file_size, read_bucket_head, read_first_free_slot, slot_file_size, slot_size,
    write_bucket_head, write_first_free_slot, BucketFileHeader, SlotHeader, EMPTY, HASHINDEX_MAGIC,
    HASHINDEX_VERSION,
};

enum Lock {
    Enabled(RwLock<()>),
    Disabled,
}

impl Lock {
    fn read(&self) -> Option<parking_lot::RwLockReadGuard<'_, ()>> {
        match self {
            Lock::Enabled(l) => Some(l.read()),
            Lock::Disabled => None,
        }
    }

    fn write(&self) -> Option<parking_lot::RwLockWriteGuard<'_, ()>> {
        match self {
            Lock::Enabled(l) => Some(l.write()),
            Lock::Disabled => None,
        }
    }
}

/// Counts and chain-length statistics for a [`HashIndex`], mirroring
/// `HashTableStats`.
#[derive(Debug, Clone, Copy)]
pub struct HashIndexStats {
    pub total_slots: usize,
    pub used_slots: usize,
    pub free_slots: usize,
    pub load_factor: f64,
    pub max_chain_length: usize,
}

/// A memory-mapped chained-bucket hash table. `key_len` and `is_text_key` are
/// fixed at construction; `use_lock = false` is for callers (e.g. [`crate` users
/// wrapped by a `Master`](https://docs.rs/lithos-master)) that already serialize
/// access themselves.
pub struct HashIndex {
    bucket_count: usize,
    slot_count: usize,
    key_len: usize,
    is_text_key: bool,
    bucket_file: UnsafeCell<MmapFileMut>,
    slot_file: UnsafeCell<MmapFileMut>,
    lock: Lock,
}

unsafe impl Sync for HashIndex {}

impl HashIndex {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        base_path: impl AsRef<Path>,
        bucket_count: usize,
        slot_count: usize,
        key_len: usize,
        is_text_key: bool,
        use_lock: bool,
    ) -> Result<Self, HashIndexError> {
        let base_path = base_path.as_ref();
        let bucket_path = with_ext(base_path, "hashindex");
        let slot_path = with_ext(base_path, "dataindex");

        let mut bucket_file = MmapFileMut::create_or_open_rw(&bucket_path, bucket_file_size(bucket_count) as u64)
            .map_err(|source| io_err(&bucket_path, source))?;
        let mut slot_file = MmapFileMut::create_or_open_rw(&slot_path, slot_file_size(slot_count, key_len) as u64)
            .map_err(|source| io_err(&slot_path, source))?;

        let needs_init = {
            let header = BucketFileHeader::from_bytes(bucket_file.as_slice());
            !header.matches_shape(bucket_count as u64, slot_count as u64, key_len as u64, is_text_key)
        };

        if needs_init {
            tracing::info!(
                path = %bucket_path.display(),
                bucket_count, slot_count, key_len,
                "hash index header mismatch or first use, reinitializing"
            );
            reinitialize(&mut bucket_file, &mut slot_file, bucket_count, slot_count, key_len, is_text_key);
        }

        let lock = if use_lock { Lock::Enabled(RwLock::new(())) } else { Lock::Disabled };

        Ok(Self {
            bucket_count,
            slot_count,
            key_len,
            is_text_key,
            bucket_file: UnsafeCell::new(bucket_file),
            slot_file: UnsafeCell::new(slot_file),
            lock,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    fn bucket_slice(&self) -> &[u8] {
        unsafe { (*self.bucket_file.get()).as_slice() }
    }

    fn bucket_slice_mut(&self) -> &mut [u8] {
        unsafe { (*self.bucket_file.get()).as_mut_slice() }
    }

    fn slot_slice(&self) -> &[u8] {
        unsafe { (*self.slot_file.get()).as_slice() }
    }

    fn slot_slice_mut(&self) -> &mut [u8] {
        unsafe { (*self.slot_file.get()).as_mut_slice() }
    }

    fn slot_bytes(&self, index: usize) -> &[u8] {
        let sz = slot_size(self.key_len);
        &self.slot_slice()[index * sz..(index + 1) * sz]
    }

    fn slot_bytes_mut(&self, index: usize) -> &mut [u8] {
        let sz = slot_size(self.key_len);
        &mut self.slot_slice_mut()[index * sz..(index + 1) * sz]
    }

    fn slot_key(&self, index: usize) -> &[u8] {
        &self.slot_bytes(index)[16..16 + self.key_len]
    }

    fn first_free_slot(&self) -> i32 {
        read_first_free_slot(self.bucket_slice())
    }

    fn set_first_free_slot(&self, value: i32) {
        write_first_free_slot(self.bucket_slice_mut(), value);
    }

    fn check_key_len(&self, key: &[u8]) -> Result<(), HashIndexError> {
        if key.len() != self.key_len {
            return Err(HashIndexError::InvalidKeyLength { expected: self.key_len, actual: key.len() });
        }
        Ok(())
    }

    fn bucket_of(&self, key: &[u8]) -> usize {
        djb2(key, self.is_text_key) as usize % self.bucket_count
    }

    /// Walks the chain for `key`'s bucket. Returns the matching slot index if
    /// found.
    fn find_slot(&self, key: &[u8]) -> Option<usize> {
        let bucket = self.bucket_of(key);
        let mut cur = read_bucket_head(self.bucket_slice(), bucket);
        while cur != EMPTY {
            let idx = cur as usize;
            let header = SlotHeader::read(self.slot_bytes(idx));
            if header.occupied && key_eq(self.slot_key(idx), key, self.is_text_key) {
                return Some(idx);
            }
            cur = header.next_in_chain;
        }
        None
    }

    /// Inserts `key -> data_index`, overwriting any prior binding for a
    /// different key that happens to occupy the same chain position (it does
    /// not check for duplicates; use [`HashIndex::add`] for that).
    pub fn put(&self, key: &[u8], data_index: u32) -> Result<(), HashIndexError> {
        self.check_key_len(key)?;
        let _guard = self.lock.write();

        let free = self.first_free_slot();
        if free == EMPTY {
            return Err(HashIndexError::NoSpace { capacity: self.slot_count });
        }
        let slot_idx = free as usize;
        let next_free = SlotHeader::read(self.slot_bytes(slot_idx)).next_free;
        self.set_first_free_slot(next_free);

        let bucket = self.bucket_of(key);
        let old_head = read_bucket_head(self.bucket_slice(), bucket);

        let key_len = self.key_len;
        let bytes = self.slot_bytes_mut(slot_idx);
        SlotHeader {
            occupied: true,
            next_in_chain: old_head,
            next_free: EMPTY,
            data_index: data_index as i32,
        }
        .write(bytes);
        bytes[16..16 + key_len].copy_from_slice(key);

        write_bucket_head(self.bucket_slice_mut(), bucket, slot_idx as i32);
        Ok(())
    }

    /// Like [`HashIndex::put`], but fails with [`HashIndexError::Duplicate`] if
    /// `key` is already present.
    pub fn add(&self, key: &[u8], data_index: u32) -> Result<(), HashIndexError> {
        self.check_key_len(key)?;
        {
            let _guard = self.lock.read();
            if self.find_slot(key).is_some() {
                return Err(HashIndexError::Duplicate);
            }
        }
        self.put(key, data_index)
    }

    pub fn get(&self, key: &[u8]) -> Result<u32, HashIndexError> {
        self.check_key_len(key)?;
        let _guard = self.lock.read();
        let idx = self.find_slot(key).ok_or(HashIndexError::NotFound)?;
        Ok(SlotHeader::read(self.slot_bytes(idx)).data_index as u32)
    }

    /// Removes `key`, returning the data index it was mapped to.
    pub fn remove(&self, key: &[u8]) -> Result<u32, HashIndexError> {
        self.check_key_len(key)?;
        let _guard = self.lock.write();

        let bucket = self.bucket_of(key);
        let mut cur = read_bucket_head(self.bucket_slice(), bucket);
        let mut prev: Option<usize> = None;

        while cur != EMPTY {
            let idx = cur as usize;
            let header = SlotHeader::read(self.slot_bytes(idx));
            if header.occupied && key_eq(self.slot_key(idx), key, self.is_text_key) {
                let next = header.next_in_chain;
                match prev {
                    Some(p) => {
                        let mut ph = SlotHeader::read(self.slot_bytes(p));
                        ph.next_in_chain = next;
                        ph.write(self.slot_bytes_mut(p));
                    }
                    None => write_bucket_head(self.bucket_slice_mut(), bucket, next),
                }

                let data_index = header.data_index as u32;
                let old_free = self.first_free_slot();
                SlotHeader { occupied: false, next_in_chain: EMPTY, next_free: old_free, data_index: EMPTY }
                    .write(self.slot_bytes_mut(idx));
                self.set_first_free_slot(idx as i32);
                return Ok(data_index);
            }
            prev = Some(idx);
            cur = header.next_in_chain;
        }
        Err(HashIndexError::NotFound)
    }

    /// Reverse lookup: the first occupied slot's key bound to `data_index`, via
    /// a linear scan. Mirrors `find_key_by_data_index`, used only by consistency
    /// checks/repair, never on a hot path.
    pub fn find_key_by_data_index(&self, data_index: u32) -> Result<Vec<u8>, HashIndexError> {
        let _guard = self.lock.read();
        for idx in 0..self.slot_count {
            let header = SlotHeader::read(self.slot_bytes(idx));
            if header.occupied && header.data_index as u32 == data_index {
                return Ok(self.slot_key(idx).to_vec());
            }
        }
        Err(HashIndexError::NotFound)
    }

    pub fn statistics(&self) -> HashIndexStats {
        let _guard = self.lock.read();
        let mut used = 0usize;
        let mut max_chain = 0usize;
        for bucket in 0..self.bucket_count {
            let mut len = 0usize;
            let mut cur = read_bucket_head(self.bucket_slice(), bucket);
            while cur != EMPTY {
                len += 1;
                used += 1;
                cur = SlotHeader::read(self.slot_bytes(cur as usize)).next_in_chain;
            }
            max_chain = max_chain.max(len);
        }
        HashIndexStats {
            total_slots: self.slot_count,
            used_slots: used,
            free_slots: self.slot_count - used,
            load_factor: used as f64 / self.bucket_count as f64,
            max_chain_length: max_chain,
        }
    }

    /// Confirms every occupied slot is reachable from exactly one bucket chain
    /// and the free-list/occupied partitions are disjoint and cover all slots.
    pub fn validate_file_integrity(&self) -> Result<(), HashIndexError> {
        let _guard = self.lock.read();
        let mut reached = vec![false; self.slot_count];

        for bucket in 0..self.bucket_count {
            let mut cur = read_bucket_head(self.bucket_slice(), bucket);
            while cur != EMPTY {
                let idx = cur as usize;
                if reached[idx] {
                    return Err(HashIndexError::InvalidDataIndex(idx as u32));
                }
                reached[idx] = true;
                cur = SlotHeader::read(self.slot_bytes(idx)).next_in_chain;
            }
        }

        let mut cur = self.first_free_slot();
        while cur != EMPTY {
            let idx = cur as usize;
            if reached[idx] {
                return Err(HashIndexError::InvalidDataIndex(idx as u32));
            }
            reached[idx] = true;
            cur = SlotHeader::read(self.slot_bytes(idx)).next_free;
        }

        if reached.iter().all(|&r| r) {
            Ok(())
        } else {
            Err(HashIndexError::InvalidDataIndex(u32::MAX))
        }
    }

    pub fn flush(&self) -> std::io::Result<()> {
        unsafe {
            (*self.bucket_file.get()).flush()?;
            (*self.slot_file.get()).flush()?;
        }
        Ok(())
    }
}

fn reinitialize(
    bucket_file: &mut MmapFileMut,
    slot_file: &mut MmapFileMut,
    bucket_count: usize,
    slot_count: usize,
    key_len: usize,
    is_text_key: bool,
) {
    let header = BucketFileHeader {
        first_free_slot: 0,
        magic: HASHINDEX_MAGIC,
        version: HASHINDEX_VERSION,
        bucket_count: bucket_count as u64,
        slot_count: slot_count as u64,
        key_len: key_len as u64,
        is_text_key,
    };
    let buf = bucket_file.as_mut_slice();
    buf[..64].copy_from_slice(&header.to_bytes());
    for bucket in 0..bucket_count {
        write_bucket_head(buf, bucket, EMPTY);
    }

    let sz = slot_size(key_len);
    let slot_buf = slot_file.as_mut_slice();
    for i in 0..slot_count {
        let next_free = if i + 1 < slot_count { i as i32 + 1 } else { EMPTY };
        SlotHeader { occupied: false, next_in_chain: EMPTY, next_free, data_index: EMPTY }
            .write(&mut slot_buf[i * sz..(i + 1) * sz]);
    }
}

fn with_ext(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn io_err(path: &Path, source: std::io::Error) -> HashIndexError {
    HashIndexError::Io { path: path.display().to_string(), source }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_base(name: &str) -> PathBuf {
        let dir = tempfile::tempdir().unwrap().into_path();
        dir.join(name)
    }

    #[test]
    fn put_and_get_roundtrip() {
        let base = tmp_base("put_get");
        let idx = HashIndex::open(&base, 16, 32, 8, true, true).unwrap();
        idx.put(b"AAAAAAAA", 5).unwrap();
        assert_eq!(idx.get(b"AAAAAAAA").unwrap(), 5);
    }

    #[test]
    fn remove_then_get_not_found_and_slot_freed() {
        let base = tmp_base("remove");
        let idx = HashIndex::open(&base, 16, 32, 8, true, true).unwrap();
        idx.put(b"AAAAAAAA", 1).unwrap();
        let stats_before = idx.statistics();
        idx.remove(b"AAAAAAAA").unwrap();
        assert!(matches!(idx.get(b"AAAAAAAA"), Err(HashIndexError::NotFound)));
        let stats_after = idx.statistics();
        assert_eq!(stats_before.used_slots - 1, stats_after.used_slots);
    }

    #[test]
    fn add_rejects_duplicate() {
        let base = tmp_base("dup");
        let idx = HashIndex::open(&base, 16, 32, 8, true, true).unwrap();
        idx.add(b"AAAAAAAA", 1).unwrap();
        assert!(matches!(idx.add(b"AAAAAAAA", 2), Err(HashIndexError::Duplicate)));
    }

    #[test]
    fn collision_chain_survives_deletes() {
        let base = tmp_base("chain");
        // single bucket forces every key into the same chain
        let idx = HashIndex::open(&base, 1, 4, 8, true, true).unwrap();
        idx.put(b"k1______", 1).unwrap();
        idx.put(b"k2______", 2).unwrap();
        idx.put(b"k3______", 3).unwrap();
        idx.remove(b"k1______").unwrap();
        assert_eq!(idx.get(b"k2______").unwrap(), 2);
        assert_eq!(idx.get(b"k3______").unwrap(), 3);
        assert_eq!(idx.statistics().free_slots, 2);
    }

    #[test]
    fn no_space_when_full() {
        let base = tmp_base("full");
        let idx = HashIndex::open(&base, 4, 2, 8, true, true).unwrap();
        idx.put(b"k1______", 1).unwrap();
        idx.put(b"k2______", 2).unwrap();
        assert!(matches!(idx.put(b"k3______", 3), Err(HashIndexError::NoSpace { .. })));
    }

    #[test]
    fn reopen_preserves_data() {
        let base = tmp_base("reopen");
        {
            let idx = HashIndex::open(&base, 16, 32, 8, true, true).unwrap();
            idx.put(b"AAAAAAAA", 99).unwrap();
            idx.flush().unwrap();
        }
        let idx = HashIndex::open(&base, 16, 32, 8, true, true).unwrap();
        assert_eq!(idx.get(b"AAAAAAAA").unwrap(), 99);
    }

    #[test]
    fn validate_integrity_passes_on_fresh_and_mutated_index() {
        let base = tmp_base("integrity");
        let idx = HashIndex::open(&base, 16, 32, 8, true, true).unwrap();
        idx.validate_file_integrity().unwrap();
        idx.put(b"AAAAAAAA", 1).unwrap();
        idx.put(b"BBBBBBBB", 2).unwrap();
        idx.remove(b"AAAAAAAA").unwrap();
        idx.validate_file_integrity().unwrap();
    }
}
