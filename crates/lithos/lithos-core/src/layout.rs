use std::collections::HashMap;

use crate::error::RecordError;
use crate::field::{FieldInfo, FieldKind};

/// Describes the byte layout of a fixed-size record: an ordered list of fields,
/// each with a computed offset, plus the total record size.
///
/// Mirrors the original `RecordLayout`/`SpecFileParser` split, minus the YAML/TSV
/// parsing (replaced by `serde`-driven descriptors in `lithos-config`). Fields are
/// appended one at a time and the layout is finalized once, after which offsets and
/// the name→index map are fixed for the life of the layout.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    fields: Vec<FieldInfo>,
    index: HashMap<String, usize>,
    record_size: usize,
    finalized: bool,
}

impl RecordLayout {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
            record_size: 0,
            finalized: false,
        }
    }

    /// Appends a field. `len` is the declared byte width for text/decimal fields;
    /// ignored (the kind's own width is used) for binary scalar kinds.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        kind: FieldKind,
        len: usize,
        is_key: bool,
    ) -> Result<(), RecordError> {
        if self.finalized {
            return Err(RecordError::AlreadyFinalized);
        }
        let name = name.into();
        let field = FieldInfo {
            name: name.clone(),
            kind,
            len: kind.byte_len(len),
            offset: 0,
            is_key,
        };
        self.index.insert(name, self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Computes offsets and locks the layout. Idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let mut offset = 0;
        for field in &mut self.fields {
            field.offset = offset;
            offset += field.len;
        }
        self.record_size = offset;
        self.finalized = true;
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Result<&FieldInfo, RecordError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| RecordError::NoSuchField(name.to_string()))?;
        Ok(&self.fields[idx])
    }

    pub fn key_fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter().filter(|f| f.is_key)
    }
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_assigned_left_to_right() {
        let mut layout = RecordLayout::new();
        layout.add_field("symbol", FieldKind::Text, 8, true).unwrap();
        layout
            .add_field("price", FieldKind::Decimal { decimal: 4 }, 12, false)
            .unwrap();
        layout
            .add_field("qty", FieldKind::UnsignedInt { width: 8 }, 0, false)
            .unwrap();
        layout.finalize();

        assert_eq!(layout.field("symbol").unwrap().offset, 0);
        assert_eq!(layout.field("price").unwrap().offset, 8);
        assert_eq!(layout.field("qty").unwrap().offset, 20);
        assert_eq!(layout.record_size(), 28);
    }

    #[test]
    fn append_after_finalize_fails() {
        let mut layout = RecordLayout::new();
        layout.add_field("a", FieldKind::Text, 4, false).unwrap();
        layout.finalize();
        let err = layout.add_field("b", FieldKind::Text, 4, false);
        assert!(matches!(err, Err(RecordError::AlreadyFinalized)));
    }
}
