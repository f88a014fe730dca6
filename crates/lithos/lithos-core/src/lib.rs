//! Fixed-size record layout and field access: the binary record format shared by
//! the message log, hash index keys, and master payloads.

mod error;
mod field;
mod layout;
mod record;

pub use error::RecordError;
pub use field::{FieldInfo, FieldKind};
pub use layout::RecordLayout;
pub use record::BinaryRecord;
