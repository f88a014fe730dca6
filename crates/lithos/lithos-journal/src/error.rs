#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("I/O error on '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sequence {0} not found")]
    NotFound(u64),

    #[error("caller buffer is {buf_len} bytes, message {seq} is {msg_len} bytes")]
    BufferTooSmall { seq: u64, msg_len: u32, buf_len: usize },

    #[error("index entry for seq {expected} is corrupt (stored seq {actual})")]
    IntegrityError { expected: u64, actual: u64 },
}
