//! Dual-indexed fixed-capacity record store and the registry that loads named
//! stores from descriptor files. Grounded on
//! `original_source/HashMaster/Master.h` and `MasterManager.h`.

mod error;
mod layout;
mod lock;
mod master;
mod registry;

pub use error::MasterError;
pub use master::{Master, MasterConfig, MasterStats};
pub use registry::MasterRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tmp_base(name: &str) -> PathBuf {
        let dir = tempfile::tempdir().unwrap().into_path();
        dir.join(name)
    }

    fn config(base: PathBuf, secondary: usize) -> MasterConfig {
        MasterConfig {
            base_path: base,
            max_record_count: 16,
            max_record_size: 64,
            bucket_count: 8,
            primary_key_len: 8,
            secondary_key_len: secondary,
            use_lock: true,
        }
    }

    #[test]
    fn put_get_del_primary_only() {
        let master = Master::open(config(tmp_base("primary_only"), 0)).unwrap();
        let record = b"payload-bytes-here".to_vec();
        master.put(b"AAAAAAAA", None, &record).unwrap();
        let got = master.get_by_primary(b"AAAAAAAA").unwrap();
        assert_eq!(&got[..record.len()], &record[..]);
        master.del(b"AAAAAAAA").unwrap();
        assert!(master.get_by_primary(b"AAAAAAAA").is_err());
    }

    #[test]
    fn dual_key_lookup_and_delete_clears_both() {
        let master = Master::open(config(tmp_base("dual_key"), 8)).unwrap();
        master.put(b"AAAAAAAA", Some(b"BBBBBBBB"), b"hello").unwrap();
        assert_eq!(&master.get_by_primary(b"AAAAAAAA").unwrap()[..5], b"hello");
        assert_eq!(&master.get_by_secondary(b"BBBBBBBB").unwrap()[..5], b"hello");

        master.del(b"AAAAAAAA").unwrap();
        assert!(master.get_by_primary(b"AAAAAAAA").is_err());
        assert!(master.get_by_secondary(b"BBBBBBBB").is_err());
        assert_eq!(master.statistics().used_records, 0);
    }

    #[test]
    fn duplicate_primary_key_rejected() {
        let master = Master::open(config(tmp_base("dup_primary"), 0)).unwrap();
        master.put(b"AAAAAAAA", None, b"x").unwrap();
        assert!(matches!(master.put(b"AAAAAAAA", None, b"y"), Err(MasterError::DuplicatePrimary)));
    }

    #[test]
    fn no_space_when_full_does_not_corrupt_state() {
        let master = Master::open(MasterConfig {
            max_record_count: 2,
            ..config(tmp_base("no_space"), 0)
        })
        .unwrap();
        master.put(b"key00001", None, b"a").unwrap();
        master.put(b"key00002", None, b"b").unwrap();
        assert!(matches!(master.put(b"key00003", None, b"c"), Err(MasterError::NoSpace { .. })));
        assert_eq!(master.statistics().used_records, 2);
    }

    #[test]
    fn reopen_preserves_records() {
        let base = tmp_base("reopen");
        {
            let master = Master::open(config(base.clone(), 0)).unwrap();
            master.put(b"AAAAAAAA", None, b"persisted").unwrap();
            master.flush().unwrap();
        }
        let master = Master::open(config(base, 0)).unwrap();
        assert_eq!(&master.get_by_primary(b"AAAAAAAA").unwrap()[..9], b"persisted");
    }

    #[test]
    fn validate_integrity_passes_after_mutations() {
        let master = Master::open(config(tmp_base("integrity"), 8)).unwrap();
        master.put(b"AAAAAAAA", Some(b"BBBBBBBB"), b"x").unwrap();
        master.put(b"CCCCCCCC", Some(b"DDDDDDDD"), b"y").unwrap();
        master.del(b"AAAAAAAA").unwrap();
        master.validate_integrity().unwrap();
    }
}
