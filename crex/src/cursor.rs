use crate::errors::{Error, Result};

/// Position in a CREX (character) message.
///
/// Every read checks the remaining length first and reports
/// `PrematureEndOfMessage` instead of slicing past the end.
#[derive(Debug, Clone, Copy)]
pub struct TextCursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> TextCursor<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    pub fn starts_with(&self, literal: &[u8]) -> bool {
        self.rest().starts_with(literal)
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::premature(self.pos));
        }
        let taken = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(taken)
    }

    pub fn take_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Consumes `literal`, which must be present in full.
    pub fn expect_literal(&mut self, literal: &[u8], what: &str) -> Result<()> {
        let at = self.pos;
        let found = self.take(literal.len())?;
        if found != literal {
            return Err(Error::framing(
                at,
                format!(
                    "expected {what} {:?}, found {:?}",
                    String::from_utf8_lossy(literal),
                    String::from_utf8_lossy(found)
                ),
            ));
        }
        Ok(())
    }

    /// Consumes a run of ASCII digits. A run that reaches the end of input is
    /// reported as premature, since more digits could have followed.
    pub fn take_digits(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let len = self
            .rest()
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if start + len >= self.input.len() {
            return Err(Error::premature(self.input.len()));
        }
        self.pos += len;
        Ok(&self.input[start..start + len])
    }

    /// Advances past the next occurrence of `literal`.
    pub fn skip_past(&mut self, literal: &[u8]) -> Result<()> {
        match find(self.rest(), literal) {
            Some(idx) => {
                self.pos += idx + literal.len();
                Ok(())
            }
            None => Err(Error::premature(self.input.len())),
        }
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Value of a digit run, saturating at `u32::MAX` for runs too long to fit.
pub(crate) fn digits_value(digits: &[u8]) -> u32 {
    digits.iter().fold(0u32, |acc, d| {
        acc.saturating_mul(10).saturating_add((d - b'0') as u32)
    })
}

/// Bit position in a BUFR data section, most significant bit first.
#[derive(Debug, Clone, Copy)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    bit_pos: usize,
    // added to `offset()` so errors point into the whole message
    base_offset: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base_offset(data, 0)
    }

    pub fn with_base_offset(data: &'a [u8], base_offset: usize) -> Self {
        Self {
            data,
            bit_pos: 0,
            base_offset,
        }
    }

    /// Byte offset of the next unread bit.
    pub fn offset(&self) -> usize {
        self.base_offset + self.bit_pos / 8
    }

    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    pub fn read_bits(&mut self, nbits: usize) -> Result<u64> {
        if nbits > 64 {
            return Err(Error::Unsupported(format!("{nbits}-bit field")));
        }
        if self.remaining_bits() < nbits {
            return Err(Error::premature(self.base_offset + self.data.len()));
        }

        let mut value: u64 = 0;
        let mut needed = nbits;
        let mut pos = self.bit_pos;
        while needed > 0 {
            let byte = self.data[pos / 8];
            let available = 8 - pos % 8;
            let take = available.min(needed);
            let shift = available - take;
            let bits = (byte >> shift) & (((1u16 << take) - 1) as u8);
            value = (value << take) | bits as u64;
            needed -= take;
            pos += take;
        }
        self.bit_pos = pos;
        Ok(value)
    }

    pub fn read_bytes(&mut self, nbytes: usize) -> Result<Vec<u8>> {
        if self.remaining_bits() < nbytes * 8 {
            return Err(Error::premature(self.base_offset + self.data.len()));
        }
        (0..nbytes).map(|_| self.read_bits(8).map(|b| b as u8)).collect()
    }
}
