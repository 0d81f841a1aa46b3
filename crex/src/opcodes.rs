use crate::errors::{Error, Result};
use crextables::Fxy;
use std::collections::VecDeque;

/// The work list driving the decoder engine.
///
/// Every operation moves codes by value: nothing is shared between lists, and
/// splitting or splicing never changes the total number of codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Opcodes {
    codes: VecDeque<Fxy>,
}

impl Opcodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn peek_front(&self) -> Option<Fxy> {
        self.codes.front().copied()
    }

    pub fn push_back(&mut self, fxy: Fxy) {
        self.codes.push_back(fxy);
    }

    pub fn pop_front(&mut self) -> Result<Fxy> {
        self.codes.pop_front().ok_or(Error::EmptyList)
    }

    /// Detaches the first `n` codes, in order.
    pub fn pop_front_n(&mut self, n: usize) -> Result<Opcodes> {
        if n > self.codes.len() {
            return Err(Error::InsufficientOpcodes {
                requested: n,
                available: self.codes.len(),
                offset: 0,
            });
        }
        let tail = self.codes.split_off(n);
        let head = std::mem::replace(&mut self.codes, tail);
        Ok(Opcodes { codes: head })
    }

    /// Moves every code of `other` in front of this list.
    pub fn prepend(&mut self, mut other: Opcodes) {
        other.codes.append(&mut self.codes);
        self.codes = other.codes;
    }

    /// Places a sequence expansion where the just popped sequence code was,
    /// so it runs before the rest of the list.
    pub fn splice_in_place_of_current(&mut self, expansion: Opcodes) {
        self.prepend(expansion);
    }

    pub fn iter(&self) -> impl Iterator<Item = Fxy> + '_ {
        self.codes.iter().copied()
    }
}

impl From<Vec<Fxy>> for Opcodes {
    fn from(codes: Vec<Fxy>) -> Self {
        Opcodes {
            codes: codes.into(),
        }
    }
}

impl FromIterator<Fxy> for Opcodes {
    fn from_iter<I: IntoIterator<Item = Fxy>>(iter: I) -> Self {
        Opcodes {
            codes: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for Opcodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: Vec<String> = self.codes.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", codes.join(" "))
    }
}
