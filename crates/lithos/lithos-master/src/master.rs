use std::cell::UnsafeCell;
use std::path::{Path, PathBuf};

use lithos_hashindex::{HashIndex, HashIndexStats};
use lithos_mmap::MmapFileMut;

use crate::error::MasterError;
use crate::layout::{
    record_file_size, slot_fields, slot_size, MasterFileHeader, SlotHeader, EMPTY, MASTER_MAGIC,
    MASTER_VERSION,
};
use crate::lock::Lock;

/// Parameters fixed for the lifetime of a [`Master`]'s on-disk files.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub base_path: PathBuf,
    pub max_record_count: usize,
    pub max_record_size: usize,
    pub bucket_count: usize,
    pub primary_key_len: usize,
    pub secondary_key_len: usize,
    pub use_lock: bool,
}

impl MasterConfig {
    pub fn use_secondary_index(&self) -> bool {
        self.secondary_key_len > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MasterStats {
    pub total_records: usize,
    pub used_records: usize,
    pub free_records: usize,
    pub record_utilization: f64,
    pub primary_index: HashIndexStats,
    pub secondary_index: Option<HashIndexStats>,
}

/// A dual-indexed fixed-capacity record store: a memory-mapped slot array plus
/// one or two [`HashIndex`]es, grounded on `original_source/HashMaster/Master.h`.
pub struct Master {
    config: MasterConfig,
    record_file: UnsafeCell<MmapFileMut>,
    primary: HashIndex,
    secondary: Option<HashIndex>,
    lock: Lock,
}

unsafe impl Sync for Master {}

impl Master {
    pub fn open(config: MasterConfig) -> Result<Self, MasterError> {
        if config.max_record_count == 0 {
            return Err(MasterError::InvalidParameter("max_record_count must be > 0"));
        }
        if config.max_record_size == 0 {
            return Err(MasterError::InvalidParameter("max_record_size must be > 0"));
        }
        if config.primary_key_len == 0 {
            return Err(MasterError::InvalidParameter("primary_key_len must be > 0"));
        }

        let records_path = records_path(&config.base_path);
        let size = record_file_size(
            config.max_record_count,
            config.primary_key_len,
            config.secondary_key_len,
            config.max_record_size,
        );
        let mut record_file = MmapFileMut::create_or_open_rw(&records_path, size as u64)
            .map_err(|source| MasterError::Io { path: records_path.display().to_string(), source })?;

        let needs_init = {
            let header = MasterFileHeader::from_bytes(record_file.as_slice());
            !header.matches_shape(
                config.max_record_count as u64,
                config.primary_key_len as u64,
                config.secondary_key_len as u64,
                config.max_record_size as u64,
            )
        };
        if needs_init {
            tracing::info!(
                path = %records_path.display(),
                capacity = config.max_record_count,
                "master record file header mismatch or first use, reinitializing"
            );
            reinitialize(&mut record_file, &config);
        }

        let primary = HashIndex::open(
            primary_index_base(&config.base_path),
            config.bucket_count,
            config.max_record_count,
            config.primary_key_len,
            true,
            false,
        )?;

        let secondary = if config.use_secondary_index() {
            Some(HashIndex::open(
                secondary_index_base(&config.base_path),
                config.bucket_count,
                config.max_record_count,
                config.secondary_key_len,
                true,
                false,
            )?)
        } else {
            None
        };

        let lock = Lock::new(config.use_lock);

        Ok(Self { config, record_file: UnsafeCell::new(record_file), primary, secondary, lock })
    }

    fn slot_size(&self) -> usize {
        slot_size(self.config.primary_key_len, self.config.secondary_key_len, self.config.max_record_size)
    }

    fn record_slice(&self) -> &[u8] {
        unsafe { (*self.record_file.get()).as_slice() }
    }

    fn record_slice_mut(&self) -> &mut [u8] {
        unsafe { (*self.record_file.get()).as_mut_slice() }
    }

    fn slot_bytes(&self, index: usize) -> &[u8] {
        let sz = self.slot_size();
        let start = crate::layout::HEADER_SIZE + index * sz;
        &self.record_slice()[start..start + sz]
    }

    fn slot_bytes_mut(&self, index: usize) -> &mut [u8] {
        let sz = self.slot_size();
        let start = crate::layout::HEADER_SIZE + index * sz;
        &mut self.record_slice_mut()[start..start + sz]
    }

    fn first_free_slot(&self) -> i32 {
        crate::layout::read_first_free_slot(self.record_slice())
    }

    fn set_first_free_slot(&self, value: i32) {
        crate::layout::write_first_free_slot(self.record_slice_mut(), value)
    }

    fn fields(&self) -> crate::layout::SlotFields {
        slot_fields(self.config.primary_key_len, self.config.secondary_key_len, self.config.max_record_size)
    }

    /// Stores a record under `pkey` (and `skey` if the secondary index is
    /// enabled). Fails without mutating state if either key already exists, the
    /// record is oversized, or no free slot remains.
    pub fn put(&self, pkey: &[u8], skey: Option<&[u8]>, record: &[u8]) -> Result<(), MasterError> {
        if pkey.len() != self.config.primary_key_len {
            return Err(MasterError::InvalidParameter("primary key length mismatch"));
        }
        if record.len() > self.config.max_record_size {
            return Err(MasterError::RecordTooLarge { capacity: self.config.max_record_size, actual: record.len() });
        }
        if self.config.use_secondary_index() {
            let skey = skey.ok_or(MasterError::InvalidParameter("secondary key required"))?;
            if skey.len() != self.config.secondary_key_len {
                return Err(MasterError::InvalidParameter("secondary key length mismatch"));
            }
        }

        let _guard = self.lock.write();

        if self.primary.get(pkey).is_ok() {
            return Err(MasterError::DuplicatePrimary);
        }
        if let (Some(secondary), Some(skey)) = (&self.secondary, skey) {
            if secondary.get(skey).is_ok() {
                return Err(MasterError::DuplicateSecondary);
            }
        }

        let free = self.first_free_slot();
        if free == EMPTY {
            return Err(MasterError::NoSpace { capacity: self.config.max_record_count });
        }
        let slot_idx = free as usize;
        let next_free = SlotHeader::read(self.slot_bytes(slot_idx)).next_free;

        let fields = self.fields();
        let bytes = self.slot_bytes_mut(slot_idx);
        SlotHeader { occupied: true, next_free: EMPTY }.write(bytes);
        bytes[fields.pkey.clone()].copy_from_slice(pkey);
        if let Some(skey) = skey {
            bytes[fields.skey.clone()].copy_from_slice(skey);
        }
        bytes[fields.payload.start..fields.payload.start + record.len()].copy_from_slice(record);
        if record.len() < fields.payload.len() {
            bytes[fields.payload.start + record.len()..fields.payload.end].fill(0);
        }

        // Roll back the slot allocation if either index insert fails. `slot_idx`
        // is still `first_free_slot` (only advanced below, on success), so
        // restoring its header to the successor popped at the top puts the
        // free list back exactly as it was.
        if let Err(e) = self.primary.put(pkey, slot_idx as u32) {
            SlotHeader { occupied: false, next_free }.write(self.slot_bytes_mut(slot_idx));
            return Err(e.into());
        }
        if let (Some(secondary), Some(skey)) = (&self.secondary, skey) {
            if let Err(e) = secondary.put(skey, slot_idx as u32) {
                let _ = self.primary.remove(pkey);
                SlotHeader { occupied: false, next_free }.write(self.slot_bytes_mut(slot_idx));
                return Err(e.into());
            }
        }

        self.set_first_free_slot(next_free);
        Ok(())
    }

    pub fn get_by_primary(&self, pkey: &[u8]) -> Result<Vec<u8>, MasterError> {
        let _guard = self.lock.read();
        let slot_idx = self.primary.get(pkey).map_err(|_| MasterError::NotFound)? as usize;
        let fields = self.fields();
        Ok(self.slot_bytes(slot_idx)[fields.payload].to_vec())
    }

    /// Calls `f` with a mutable view of the payload bytes stored under `pkey`,
    /// in place, without going through `put`'s duplicate checks or the index
    /// insert path. Used by the sequence store's fast-update path so repeated
    /// counter bumps don't pay for a fresh key lookup and full slot rewrite.
    pub fn mutate_primary<F, R>(&self, pkey: &[u8], f: F) -> Result<R, MasterError>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let _guard = self.lock.write();
        let slot_idx = self.primary.get(pkey).map_err(|_| MasterError::NotFound)? as usize;
        let fields = self.fields();
        let payload = &mut self.slot_bytes_mut(slot_idx)[fields.payload];
        Ok(f(payload))
    }

    pub fn get_by_secondary(&self, skey: &[u8]) -> Result<Vec<u8>, MasterError> {
        let _guard = self.lock.read();
        let secondary = self.secondary.as_ref().ok_or(MasterError::InvalidParameter("secondary index disabled"))?;
        let slot_idx = secondary.get(skey).map_err(|_| MasterError::NotFound)? as usize;
        let fields = self.fields();
        Ok(self.slot_bytes(slot_idx)[fields.payload].to_vec())
    }

    /// Deletes the record under `pkey`, also removing its secondary-key binding
    /// (read directly from the slot's stored secondary-key bytes, so no
    /// reverse scan of the secondary index is needed).
    pub fn del(&self, pkey: &[u8]) -> Result<(), MasterError> {
        let _guard = self.lock.write();
        let slot_idx = self.primary.remove(pkey).map_err(|_| MasterError::NotFound)? as usize;

        if let Some(secondary) = &self.secondary {
            let fields = self.fields();
            let skey = self.slot_bytes(slot_idx)[fields.skey].to_vec();
            let _ = secondary.remove(&skey);
        }

        let old_free = self.first_free_slot();
        SlotHeader { occupied: false, next_free: old_free }.write(self.slot_bytes_mut(slot_idx));
        self.set_first_free_slot(slot_idx as i32);
        Ok(())
    }

    pub fn statistics(&self) -> MasterStats {
        let _guard = self.lock.read();
        let primary_index = self.primary.statistics();
        let used = primary_index.used_slots;
        MasterStats {
            total_records: self.config.max_record_count,
            used_records: used,
            free_records: self.config.max_record_count - used,
            record_utilization: used as f64 / self.config.max_record_count as f64,
            primary_index,
            secondary_index: self.secondary.as_ref().map(|s| s.statistics()),
        }
    }

    /// Confirms every occupied slot is reachable from both indexes (where
    /// applicable) and that the free-list length equals `capacity - used`.
    pub fn validate_integrity(&self) -> Result<(), MasterError> {
        let _guard = self.lock.read();
        self.primary.validate_file_integrity()?;
        if let Some(secondary) = &self.secondary {
            secondary.validate_file_integrity()?;
        }

        let mut free_count = 0usize;
        let mut cur = self.first_free_slot();
        while cur != EMPTY {
            free_count += 1;
            cur = SlotHeader::read(self.slot_bytes(cur as usize)).next_free;
        }
        let stats = self.primary.statistics();
        if free_count != stats.free_slots {
            return Err(MasterError::IntegrityError(format!(
                "free-list length {free_count} != capacity-used {}",
                stats.free_slots
            )));
        }
        Ok(())
    }

    pub fn flush(&self) -> std::io::Result<()> {
        unsafe { (*self.record_file.get()).flush() }?;
        self.primary.flush()?;
        if let Some(secondary) = &self.secondary {
            secondary.flush()?;
        }
        Ok(())
    }
}

fn reinitialize(record_file: &mut MmapFileMut, config: &MasterConfig) {
    let header = MasterFileHeader {
        first_free_slot: 0,
        magic: MASTER_MAGIC,
        version: MASTER_VERSION,
        capacity: config.max_record_count as u64,
        pkey_len: config.primary_key_len as u64,
        skey_len: config.secondary_key_len as u64,
        record_size: config.max_record_size as u64,
    };
    let buf = record_file.as_mut_slice();
    buf[..crate::layout::HEADER_SIZE].copy_from_slice(&header.to_bytes());

    let sz = slot_size(config.primary_key_len, config.secondary_key_len, config.max_record_size);
    for i in 0..config.max_record_count {
        let next_free = if i + 1 < config.max_record_count { i as i32 + 1 } else { EMPTY };
        let start = crate::layout::HEADER_SIZE + i * sz;
        SlotHeader { occupied: false, next_free }.write(&mut buf[start..start + sz]);
    }
}

fn records_path(base: &Path) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push("_records.dat");
    PathBuf::from(s)
}

fn primary_index_base(base: &Path) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push("_primary");
    PathBuf::from(s)
}

fn secondary_index_base(base: &Path) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push("_secondary");
    PathBuf::from(s)
}
