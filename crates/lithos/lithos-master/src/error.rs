#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("master is not initialized")]
    NotInitialized,

    #[error("key not found")]
    NotFound,

    #[error("primary key already present")]
    DuplicatePrimary,

    #[error("secondary key already present")]
    DuplicateSecondary,

    #[error("no free record slots remain (capacity {capacity})")]
    NoSpace { capacity: usize },

    #[error("record is {actual} bytes, slot capacity is {capacity}")]
    RecordTooLarge { capacity: usize, actual: usize },

    #[error(transparent)]
    HashIndex(#[from] lithos_hashindex::HashIndexError),

    #[error("I/O error on '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("integrity check failed: {0}")]
    IntegrityError(String),

    #[error("registry has no master named '{0}'")]
    UnknownMaster(String),

    #[error("duplicate master name '{0}' in registry directory")]
    DuplicateMasterName(String),

    #[error(transparent)]
    Config(#[from] lithos_config::ConfigError),
}
