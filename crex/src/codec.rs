//! Field decoding for both encodings.
//!
//! CREX fields are fixed-width decimal text; BUFR fields are fixed-width
//! unsigned integers in the bit stream. Both apply the Table B scale, and
//! both have a missing-value sentinel.

use crate::cursor::{BitCursor, TextCursor};
use crate::errors::{Error, Result};
use crate::message::Value;
use crextables::prelude::BTableEntry;

pub const MISSING_MARKER: u8 = b'/';

/// CREX check digits: once enabled every field is preceded by one digit
/// cycling 0..=9 across the whole message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckDigits {
    active: bool,
    enforce: bool,
    expected: u8,
}

impl CheckDigits {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(enforce: bool) -> Self {
        Self {
            active: true,
            enforce,
            expected: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn expected(&self) -> u8 {
        self.expected
    }

    fn verify(&mut self, found: u8, offset: usize) -> Result<()> {
        if self.enforce && found != b'0' + self.expected {
            return Err(Error::CheckDigitMismatch {
                expected: self.expected,
                found: found as char,
                offset,
            });
        }
        self.expected = (self.expected + 1) % 10;
        Ok(())
    }
}

/// A raw cursor the decoder engine can pull fields from.
pub trait FieldReader {
    /// BUFR names the delayed replication counter explicitly after the
    /// replication descriptor; CREX implies `B31001`.
    const EXPLICIT_DELAYED_COUNTER: bool;

    fn offset(&self) -> usize;

    fn read_field(&mut self, entry: &BTableEntry, check_digits: &mut CheckDigits) -> Result<Value>;
}

impl FieldReader for TextCursor<'_> {
    const EXPLICIT_DELAYED_COUNTER: bool = false;

    fn offset(&self) -> usize {
        TextCursor::offset(self)
    }

    fn read_field(&mut self, entry: &BTableEntry, check_digits: &mut CheckDigits) -> Result<Value> {
        crex::decode_value(self, entry, check_digits).map(|(value, _)| value)
    }
}

impl FieldReader for BitCursor<'_> {
    const EXPLICIT_DELAYED_COUNTER: bool = true;

    fn offset(&self) -> usize {
        BitCursor::offset(self)
    }

    fn read_field(&mut self, entry: &BTableEntry, _check_digits: &mut CheckDigits) -> Result<Value> {
        bufr::decode_value(self, entry).map(|(value, _)| value)
    }
}

pub mod crex {
    use super::*;

    /// Decodes one field; returns the value and the number of bytes consumed,
    /// including the check digit and surrounding whitespace.
    pub fn decode_value(
        cursor: &mut TextCursor<'_>,
        entry: &BTableEntry,
        check_digits: &mut CheckDigits,
    ) -> Result<(Value, usize)> {
        let start = cursor.offset();
        let width = entry
            .crex_datawidth_char
            .ok_or(Error::UnknownDescriptor {
                fxy: entry.fxy,
                offset: start,
            })? as usize;

        cursor.skip_whitespace();
        if width == 0 {
            return Err(Error::MalformedValue {
                fxy: entry.fxy,
                text: String::new(),
                offset: cursor.offset(),
            });
        }

        if check_digits.is_active() {
            let digit_offset = cursor.offset();
            let digit = cursor.take_byte()?;
            check_digits.verify(digit, digit_offset)?;
        }

        let field_offset = cursor.offset();
        let value = if entry.is_string() {
            let raw = cursor.take(width)?;
            decode_string(raw)
        } else {
            let width = if cursor.peek() == Some(b'-') {
                width + 1
            } else {
                width
            };
            let raw = cursor.take(width)?;
            decode_number(raw, entry, field_offset)?
        };

        cursor.skip_whitespace();
        Ok((value, cursor.offset() - start))
    }

    fn is_missing(text: &[u8]) -> bool {
        !text.is_empty() && text.iter().all(|b| *b == MISSING_MARKER)
    }

    fn decode_string(raw: &[u8]) -> Value {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end();
        if is_missing(text.as_bytes()) {
            Value::Missing
        } else {
            Value::String(text.to_string())
        }
    }

    fn decode_number(raw: &[u8], entry: &BTableEntry, offset: usize) -> Result<Value> {
        let malformed = || Error::MalformedValue {
            fxy: entry.fxy,
            text: String::from_utf8_lossy(raw).into_owned(),
            offset,
        };

        let text = std::str::from_utf8(raw).map_err(|_| malformed())?.trim();
        if is_missing(text.as_bytes()) {
            return Ok(Value::Missing);
        }

        let raw_value: i64 = text.parse().map_err(|_| malformed())?;
        let scale = entry.crex_scale.unwrap_or(entry.bufr_scale);
        Ok(Value::Number(raw_value as f64 * 10f64.powi(-scale)))
    }
}

pub mod bufr {
    use super::*;

    /// Decodes one field; returns the value and the number of bits consumed.
    pub fn decode_value(cursor: &mut BitCursor<'_>, entry: &BTableEntry) -> Result<(Value, usize)> {
        let start = cursor.bit_position();
        let bits = entry.bufr_datawidth_bits as usize;
        if bits == 0 || (entry.is_string() && bits % 8 != 0) {
            return Err(Error::MalformedValue {
                fxy: entry.fxy,
                text: format!("{bits}-bit field"),
                offset: cursor.offset(),
            });
        }

        let value = if entry.is_string() {
            let raw = cursor.read_bytes(bits / 8)?;
            if raw.iter().all(|b| *b == 0xFF) {
                Value::Missing
            } else {
                let text = String::from_utf8_lossy(&raw);
                Value::String(text.trim_end_matches([' ', '\0']).to_string())
            }
        } else {
            let raw = cursor.read_bits(bits)?;
            let all_ones = if bits == 64 {
                u64::MAX
            } else {
                (1u64 << bits) - 1
            };
            if raw == all_ones && !entry.is_counter() {
                Value::Missing
            } else {
                let reference = entry.bufr_reference_value as f64;
                Value::Number((raw as f64 + reference) * 10f64.powi(-entry.bufr_scale))
            }
        };

        Ok((value, cursor.bit_position() - start))
    }
}
