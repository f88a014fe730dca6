use std::ops::{Deref, DerefMut};

use crate::error::RecordError;
use crate::field::FieldKind;
use crate::layout::RecordLayout;

enum Buffer<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl Deref for Buffer<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Borrowed(s) => s,
        }
    }
}

impl DerefMut for Buffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Borrowed(s) => s,
        }
    }
}

/// A record's bytes, read and written field-by-field against a [`RecordLayout`].
///
/// Either owns its buffer (`new_owned`) or borrows one (`new_borrowed`), e.g. a
/// slot inside a memory-mapped [`Master`](https://docs.rs/lithos-master)'s record
/// array, for zero-copy access. The borrow is checked at compile time via the
/// lifetime parameter; there is no runtime "does the provider still exist" check.
pub struct BinaryRecord<'a, 'l> {
    layout: &'l RecordLayout,
    buf: Buffer<'a>,
}

impl<'a, 'l> BinaryRecord<'a, 'l> {
    pub fn new_owned(layout: &'l RecordLayout) -> Self {
        Self {
            layout,
            buf: Buffer::Owned(vec![0u8; layout.record_size()]),
        }
    }

    pub fn new_borrowed(layout: &'l RecordLayout, buf: &'a mut [u8]) -> Result<Self, RecordError> {
        if buf.len() != layout.record_size() {
            return Err(RecordError::SizeMismatch {
                expected: layout.record_size(),
                actual: buf.len(),
            });
        }
        Ok(Self {
            layout,
            buf: Buffer::Borrowed(buf),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn copy_from(&mut self, other: &[u8]) -> Result<(), RecordError> {
        if other.len() != self.layout.record_size() {
            return Err(RecordError::SizeMismatch {
                expected: self.layout.record_size(),
                actual: other.len(),
            });
        }
        self.buf.deref_mut().copy_from_slice(other);
        Ok(())
    }

    fn field_slice(&self, name: &str) -> Result<(&[u8], FieldKind), RecordError> {
        let field = self.layout.field(name)?;
        Ok((&self.buf[field.offset..field.offset + field.len], field.kind))
    }

    /// Sets a `Text` field, right-padding with NUL. Truncates on the right if
    /// `value` is longer than the field.
    pub fn set_text(&mut self, name: &str, value: &str) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        if !matches!(field.kind, FieldKind::Text) {
            return Err(RecordError::WrongKind { name: name.into(), expected: "text" });
        }
        let slot = &mut self.buf[field.offset..field.offset + field.len];
        let bytes = value.as_bytes();
        let n = bytes.len().min(slot.len());
        slot[..n].copy_from_slice(&bytes[..n]);
        slot[n..].fill(0);
        Ok(())
    }

    /// Reads a `Text` field up to the first NUL (or the full width if none).
    pub fn get_text(&self, name: &str) -> Result<String, RecordError> {
        let (slice, kind) = self.field_slice(name)?;
        if !matches!(kind, FieldKind::Text) {
            return Err(RecordError::WrongKind { name: name.into(), expected: "text" });
        }
        let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
        String::from_utf8(slice[..end].to_vec()).map_err(|_| RecordError::NotUtf8 { name: name.into() })
    }

    /// Sets a `Decimal { decimal }` field: renders `value` with `decimal` fractional
    /// digits and left-pads with `'0'` to the field width. A negative value consumes
    /// one leading character for the `-` sign.
    pub fn set_decimal(&mut self, name: &str, value: f64) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        let decimal = match field.kind {
            FieldKind::Decimal { decimal } => decimal,
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "decimal" }),
        };
        let rendered = format!("{:.*}", decimal as usize, value);
        let width = field.len;
        let slot = &mut self.buf[field.offset..field.offset + field.len];
        if rendered.len() >= width {
            // Truncate from the high-order (leftmost, after sign) digits.
            let start = rendered.len() - width;
            slot.copy_from_slice(rendered.as_bytes()[start..].as_ref());
        } else if let Some(stripped) = rendered.strip_prefix('-') {
            let pad = width - stripped.len() - 1;
            slot[0] = b'-';
            slot[1..1 + pad].fill(b'0');
            slot[1 + pad..].copy_from_slice(stripped.as_bytes());
        } else {
            let pad = width - rendered.len();
            slot[..pad].fill(b'0');
            slot[pad..].copy_from_slice(rendered.as_bytes());
        }
        Ok(())
    }

    /// Reads a `Decimal` field back into a float.
    pub fn get_decimal(&self, name: &str) -> Result<f64, RecordError> {
        let (slice, kind) = self.field_slice(name)?;
        if !matches!(kind, FieldKind::Decimal { .. }) {
            return Err(RecordError::WrongKind { name: name.into(), expected: "decimal" });
        }
        let text = std::str::from_utf8(slice).map_err(|_| RecordError::NotUtf8 { name: name.into() })?;
        text.trim_start_matches('0')
            .parse::<f64>()
            .or_else(|_| Ok(0.0))
    }

    pub fn set_i64(&mut self, name: &str, value: i64) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        match field.kind {
            FieldKind::SignedInt { width: 1 } => self.buf[field.offset] = value as i8 as u8,
            FieldKind::SignedInt { width: 2 } => {
                self.buf[field.offset..field.offset + 2].copy_from_slice(&(value as i16).to_le_bytes())
            }
            FieldKind::SignedInt { width: 4 } => {
                self.buf[field.offset..field.offset + 4].copy_from_slice(&(value as i32).to_le_bytes())
            }
            FieldKind::SignedInt { width: 8 } => {
                self.buf[field.offset..field.offset + 8].copy_from_slice(&value.to_le_bytes())
            }
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "signed-int" }),
        }
        Ok(())
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, RecordError> {
        let (slice, kind) = self.field_slice(name)?;
        Ok(match kind {
            FieldKind::SignedInt { width: 1 } => slice[0] as i8 as i64,
            FieldKind::SignedInt { width: 2 } => i16::from_le_bytes(slice.try_into().unwrap()) as i64,
            FieldKind::SignedInt { width: 4 } => i32::from_le_bytes(slice.try_into().unwrap()) as i64,
            FieldKind::SignedInt { width: 8 } => i64::from_le_bytes(slice.try_into().unwrap()),
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "signed-int" }),
        })
    }

    pub fn set_u64(&mut self, name: &str, value: u64) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        match field.kind {
            FieldKind::UnsignedInt { width: 1 } => self.buf[field.offset] = value as u8,
            FieldKind::UnsignedInt { width: 2 } => {
                self.buf[field.offset..field.offset + 2].copy_from_slice(&(value as u16).to_le_bytes())
            }
            FieldKind::UnsignedInt { width: 4 } => {
                self.buf[field.offset..field.offset + 4].copy_from_slice(&(value as u32).to_le_bytes())
            }
            FieldKind::UnsignedInt { width: 8 } => {
                self.buf[field.offset..field.offset + 8].copy_from_slice(&value.to_le_bytes())
            }
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "unsigned-int" }),
        }
        Ok(())
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, RecordError> {
        let (slice, kind) = self.field_slice(name)?;
        Ok(match kind {
            FieldKind::UnsignedInt { width: 1 } => slice[0] as u64,
            FieldKind::UnsignedInt { width: 2 } => u16::from_le_bytes(slice.try_into().unwrap()) as u64,
            FieldKind::UnsignedInt { width: 4 } => u32::from_le_bytes(slice.try_into().unwrap()) as u64,
            FieldKind::UnsignedInt { width: 8 } => u64::from_le_bytes(slice.try_into().unwrap()),
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "unsigned-int" }),
        })
    }

    pub fn set_f64(&mut self, name: &str, value: f64) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        match field.kind {
            FieldKind::Float { width: 4 } => {
                self.buf[field.offset..field.offset + 4].copy_from_slice(&(value as f32).to_le_bytes())
            }
            FieldKind::Float { width: 8 } => {
                self.buf[field.offset..field.offset + 8].copy_from_slice(&value.to_le_bytes())
            }
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "float" }),
        }
        Ok(())
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, RecordError> {
        let (slice, kind) = self.field_slice(name)?;
        Ok(match kind {
            FieldKind::Float { width: 4 } => f32::from_le_bytes(slice.try_into().unwrap()) as f64,
            FieldKind::Float { width: 8 } => f64::from_le_bytes(slice.try_into().unwrap()),
            _ => return Err(RecordError::WrongKind { name: name.into(), expected: "float" }),
        })
    }

    /// Fills a `Text` field with a single repeated byte (default `' '` is the
    /// caller's job to pass).
    pub fn init_text(&mut self, name: &str, fill: u8) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        if !matches!(field.kind, FieldKind::Text) {
            return Err(RecordError::WrongKind { name: name.into(), expected: "text" });
        }
        self.buf[field.offset..field.offset + field.len].fill(fill);
        Ok(())
    }

    /// Fills a `Decimal` field with a single repeated byte (typically `b'0'`).
    pub fn init_numeric(&mut self, name: &str, fill: u8) -> Result<(), RecordError> {
        let field = self.layout.field(name)?.clone();
        if !matches!(field.kind, FieldKind::Decimal { .. }) {
            return Err(RecordError::WrongKind { name: name.into(), expected: "decimal" });
        }
        self.buf[field.offset..field.offset + field.len].fill(fill);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;

    fn layout() -> RecordLayout {
        let mut l = RecordLayout::new();
        l.add_field("symbol", FieldKind::Text, 8, true).unwrap();
        l.add_field("price", FieldKind::Decimal { decimal: 2 }, 10, false).unwrap();
        l.add_field("qty", FieldKind::UnsignedInt { width: 4 }, 0, false).unwrap();
        l.add_field("rate", FieldKind::Float { width: 8 }, 0, false).unwrap();
        l.finalize();
        l
    }

    #[test]
    fn text_roundtrip_with_padding() {
        let l = layout();
        let mut r = BinaryRecord::new_owned(&l);
        r.set_text("symbol", "BTC").unwrap();
        assert_eq!(r.get_text("symbol").unwrap(), "BTC");
        assert_eq!(&r.as_bytes()[0..8], b"BTC\0\0\0\0\0");
    }

    #[test]
    fn text_truncates_when_too_long() {
        let l = layout();
        let mut r = BinaryRecord::new_owned(&l);
        r.set_text("symbol", "ABCDEFGHIJ").unwrap();
        assert_eq!(r.get_text("symbol").unwrap(), "ABCDEFGH");
    }

    #[test]
    fn decimal_roundtrip() {
        let l = layout();
        let mut r = BinaryRecord::new_owned(&l);
        r.set_decimal("price", 123.45).unwrap();
        assert_eq!(&r.as_bytes()[8..18], b"0000123.45");
        assert!((r.get_decimal("price").unwrap() - 123.45).abs() < 1e-9);
    }

    #[test]
    fn binary_scalar_roundtrip() {
        let l = layout();
        let mut r = BinaryRecord::new_owned(&l);
        r.set_u64("qty", 7).unwrap();
        assert_eq!(r.get_u64("qty").unwrap(), 7);
    }

    #[test]
    fn float_roundtrip() {
        let l = layout();
        let mut r = BinaryRecord::new_owned(&l);
        r.set_f64("rate", 0.015625).unwrap();
        assert_eq!(r.get_f64("rate").unwrap(), 0.015625);
    }

    #[test]
    fn borrowed_buffer_rejects_wrong_size() {
        let l = layout();
        let mut buf = vec![0u8; l.record_size() - 1];
        assert!(BinaryRecord::new_borrowed(&l, &mut buf).is_err());
    }

    #[test]
    fn wrong_kind_access_errors() {
        let l = layout();
        let mut r = BinaryRecord::new_owned(&l);
        assert!(r.set_u64("symbol", 1).is_err());
    }
}
