#[derive(Debug, thiserror::Error)]
pub enum HashIndexError {
    #[error("key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("key not found")]
    NotFound,

    #[error("key already present")]
    Duplicate,

    #[error("no free slots remain (capacity {capacity})")]
    NoSpace { capacity: usize },

    #[error("I/O error on '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("data index {0} out of range")]
    InvalidDataIndex(u32),
}
