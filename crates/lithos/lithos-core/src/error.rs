#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("no field named '{0}'")]
    NoSuchField(String),

    #[error("field '{name}' is not a {expected} field")]
    WrongKind { name: String, expected: &'static str },

    #[error("record buffer is {actual} bytes, layout expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("value for field '{name}' is not valid utf-8")]
    NotUtf8 { name: String },

    #[error("layout has already been finalized, no further fields may be appended")]
    AlreadyFinalized,
}
