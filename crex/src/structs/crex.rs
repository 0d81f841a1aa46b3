//! CREX framing:
//! `CREX++ T<mmeevv> A<category> <descriptors> ++ <subset> + <subset> ++ [SUPP ... ++] 7777`.

use crate::cursor::{TextCursor, digits_value};
use crate::errors::{Error, Result};
use crate::message::{Encoding, MessageHeader};
use crate::opcodes::Opcodes;
use crate::tables::TableKey;
use crextables::Fxy;

pub const INDICATOR: &[u8] = b"CREX++";
pub const OPTIONAL_SECTION: &[u8] = b"SUPP";
pub const END_INDICATOR: &[u8] = b"7777";
pub const TERMINATOR: u8 = b'+';
pub const DOUBLE_TERMINATOR: &[u8] = b"++";

/// Sections 0 and 1: everything needed before data can be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CrexDescription {
    pub master_table: u8,
    pub edition: u8,
    pub table_version: u8,
    /// Present in the eight-digit edition-2 form of the `T` group.
    pub local_table_version: Option<u8>,
    pub data_category: u16,
    pub data_subcategory: Option<u16>,
    pub check_digits: bool,
    pub descriptors: Opcodes,
}

impl CrexDescription {
    pub fn table_key(&self) -> TableKey {
        TableKey {
            master_table: self.master_table,
            edition: self.edition,
            version: self.table_version,
            local: None,
        }
    }

    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            encoding: Encoding::Crex,
            edition: self.edition,
            master_table: self.master_table,
            table_version: self.table_version,
            local_table_version: self.local_table_version.unwrap_or(0),
            centre: None,
            subcentre: None,
            data_category: self.data_category,
            data_subcategory: self.data_subcategory,
            reference_time: None,
            check_digits: self.check_digits,
        }
    }
}

/// Parses the indicator and the data description section, leaving the
/// cursor at the first data field.
pub fn parse_description(cursor: &mut TextCursor<'_>) -> Result<CrexDescription> {
    parse_indicator(cursor)?;

    let (master_table, edition, table_version, local_table_version) = parse_edition(cursor)?;
    let (data_category, data_subcategory) = parse_category(cursor)?;
    let (descriptors, check_digits) = parse_descriptor_list(cursor)?;

    Ok(CrexDescription {
        master_table,
        edition,
        table_version,
        local_table_version,
        data_category,
        data_subcategory,
        check_digits,
        descriptors,
    })
}

fn parse_indicator(cursor: &mut TextCursor<'_>) -> Result<()> {
    cursor.skip_whitespace();
    let rest = cursor.rest();
    if rest.len() < INDICATOR.len() && INDICATOR.starts_with(rest) {
        return Err(Error::premature(cursor.offset() + rest.len()));
    }
    if !rest.starts_with(INDICATOR) {
        return Err(Error::NotThisFormat { expected: "CREX" });
    }
    cursor.take(INDICATOR.len())?;
    Ok(())
}

fn expect_group_letter(cursor: &mut TextCursor<'_>, letter: u8, what: &str) -> Result<()> {
    cursor.skip_whitespace();
    cursor.expect_literal(&[letter], what)
}

fn parse_edition(cursor: &mut TextCursor<'_>) -> Result<(u8, u8, u8, Option<u8>)> {
    expect_group_letter(cursor, b'T', "edition group")?;
    let at = cursor.offset();
    let digits = cursor.take_digits()?;
    let pair = |i: usize| digits_value(&digits[i..i + 2]) as u8;
    match digits.len() {
        6 => Ok((pair(0), pair(2), pair(4), None)),
        8 => Ok((pair(0), pair(2), pair(4), Some(pair(6)))),
        n => Err(Error::framing(
            at,
            format!("edition group has {n} digits, expected 6 or 8"),
        )),
    }
}

fn parse_category(cursor: &mut TextCursor<'_>) -> Result<(u16, Option<u16>)> {
    expect_group_letter(cursor, b'A', "category group")?;
    let at = cursor.offset();
    let digits = cursor.take_digits()?;
    match digits.len() {
        3 => Ok((digits_value(digits) as u16, None)),
        6 => Ok((
            digits_value(&digits[..3]) as u16,
            Some(digits_value(&digits[3..]) as u16),
        )),
        n => Err(Error::framing(
            at,
            format!("category group has {n} digits, expected 3 or 6"),
        )),
    }
}

fn descriptor_class(letter: u8) -> Option<u8> {
    match letter {
        b'B' => Some(0),
        b'R' => Some(1),
        b'C' => Some(2),
        b'D' => Some(3),
        _ => None,
    }
}

fn parse_descriptor_list(cursor: &mut TextCursor<'_>) -> Result<(Opcodes, bool)> {
    let mut descriptors = Opcodes::new();
    let mut check_digits = false;

    loop {
        cursor.skip_whitespace();
        let at = cursor.offset();
        let letter = cursor.peek().ok_or(Error::premature(at))?;

        if letter == TERMINATOR {
            cursor.expect_literal(DOUBLE_TERMINATOR, "descriptor list terminator")?;
            break;
        }

        cursor.take_byte()?;
        if letter == b'E' {
            check_digits = true;
            continue;
        }

        let f = descriptor_class(letter).ok_or_else(|| {
            Error::framing(at, format!("unexpected {:?} in descriptor list", letter as char))
        })?;
        let digits = cursor.take_digits()?;
        if digits.len() != 5 {
            return Err(Error::framing(
                at,
                format!("descriptor body has {} digits, expected 5", digits.len()),
            ));
        }
        let x = digits_value(&digits[..2]) as u8;
        let y = digits_value(&digits[2..]) as u16;
        descriptors.push_back(Fxy::new(f, x, y));
    }

    Ok((descriptors, check_digits))
}

/// What follows a decoded subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetEnd {
    More,
    Last,
}

pub fn parse_subset_end(cursor: &mut TextCursor<'_>) -> Result<SubsetEnd> {
    cursor.skip_whitespace();
    cursor.expect_literal(&[TERMINATOR], "subset terminator")?;
    match cursor.peek() {
        None => Err(Error::premature(cursor.offset())),
        Some(TERMINATOR) => {
            cursor.take_byte()?;
            Ok(SubsetEnd::Last)
        }
        Some(_) => Ok(SubsetEnd::More),
    }
}

/// Optional section and end indicator.
pub fn parse_trailer(cursor: &mut TextCursor<'_>) -> Result<()> {
    cursor.skip_whitespace();
    if cursor.starts_with(OPTIONAL_SECTION) {
        cursor.take(OPTIONAL_SECTION.len())?;
        cursor.skip_past(DOUBLE_TERMINATOR)?;
        cursor.skip_whitespace();
    }
    cursor.expect_literal(END_INDICATOR, "end indicator")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(text: &str) -> Result<CrexDescription> {
        parse_description(&mut TextCursor::new(text.as_bytes()))
    }

    #[test]
    fn six_digit_edition_and_three_digit_category() {
        let d = description("CREX++\nT010001 A003\nB01001++\n500").unwrap();
        assert_eq!((d.master_table, d.edition, d.table_version), (1, 0, 1));
        assert_eq!(d.local_table_version, None);
        assert_eq!(d.data_category, 3);
        assert_eq!(d.data_subcategory, None);
        assert!(!d.check_digits);
        assert_eq!(d.descriptors.iter().collect::<Vec<_>>(), vec![
            Fxy::new(0, 1, 1)
        ]);
    }

    #[test]
    fn edition_two_groups() {
        let d = description("CREX++ T00031102 A000007 D01001 R02000 B12004 E++ 1").unwrap();
        assert_eq!(d.table_version, 11);
        assert_eq!(d.local_table_version, Some(2));
        assert_eq!(d.data_category, 0);
        assert_eq!(d.data_subcategory, Some(7));
        assert!(d.check_digits);
        assert_eq!(
            d.descriptors.iter().collect::<Vec<_>>(),
            vec![Fxy::new(3, 1, 1), Fxy::new(1, 2, 0), Fxy::new(0, 12, 4)]
        );
    }

    #[test]
    fn wrong_magic_is_not_this_format() {
        assert!(matches!(
            description("BUFR...."),
            Err(Error::NotThisFormat { .. })
        ));
        assert!(matches!(
            description("CRE"),
            Err(Error::PrematureEndOfMessage { .. })
        ));
    }

    #[test]
    fn bad_groups_are_framing_errors() {
        assert!(matches!(
            description("CREX++ T0101 A003 B01001++ 1"),
            Err(Error::MalformedFraming { .. })
        ));
        assert!(matches!(
            description("CREX++ T010001 A03 B01001++ 1"),
            Err(Error::MalformedFraming { .. })
        ));
        assert!(matches!(
            description("CREX++ T010001 A99999999999 B01001++ 1"),
            Err(Error::MalformedFraming { offset: 16, .. })
        ));
        assert!(matches!(
            description("CREX++ T010001 A003 X01001++ 1"),
            Err(Error::MalformedFraming { offset: 20, .. })
        ));
        assert!(matches!(
            description("CREX++ T010001 A003 B01001+ 1"),
            Err(Error::MalformedFraming { .. })
        ));
    }

    #[test]
    fn subset_terminators() {
        let mut c = TextCursor::new(b" + 12");
        assert_eq!(parse_subset_end(&mut c).unwrap(), SubsetEnd::More);
        let mut c = TextCursor::new(b"++ 7777");
        assert_eq!(parse_subset_end(&mut c).unwrap(), SubsetEnd::Last);
        let mut c = TextCursor::new(b"+");
        assert!(matches!(
            parse_subset_end(&mut c),
            Err(Error::PrematureEndOfMessage { .. })
        ));
    }

    #[test]
    fn trailer_with_and_without_optional_section() {
        parse_trailer(&mut TextCursor::new(b"\r\n7777")).unwrap();
        parse_trailer(&mut TextCursor::new(b" SUPP free text ++ 7777")).unwrap();
        assert!(matches!(
            parse_trailer(&mut TextCursor::new(b"SUPP free text")),
            Err(Error::PrematureEndOfMessage { .. })
        ));
        assert!(matches!(
            parse_trailer(&mut TextCursor::new(b"8888")),
            Err(Error::MalformedFraming { .. })
        ));
    }
}
