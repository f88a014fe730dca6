#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected magic: expected {expected:#x}, got {actual:#x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("connection closed before a full frame was received")]
    ShortRead,

    #[error(transparent)]
    Journal(#[from] lithos_journal::JournalError),

    #[error(transparent)]
    Master(#[from] lithos_master::MasterError),
}
