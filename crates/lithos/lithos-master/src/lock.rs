use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A lock that can be compiled out at construction time, for callers that
/// already serialize access themselves (or are single-threaded).
pub enum Lock {
    Enabled(RwLock<()>),
    Disabled,
}

impl Lock {
    pub fn new(enabled: bool) -> Self {
        if enabled { Lock::Enabled(RwLock::new(())) } else { Lock::Disabled }
    }

    pub fn read(&self) -> Option<RwLockReadGuard<'_, ()>> {
        match self {
            Lock::Enabled(l) => Some(l.read()),
            Lock::Disabled => None,
        }
    }

    pub fn write(&self) -> Option<RwLockWriteGuard<'_, ()>> {
        match self {
            Lock::Enabled(l) => Some(l.write()),
            Lock::Disabled => None,
        }
    }
}
