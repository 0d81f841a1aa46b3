//! BUFR framing for editions 2, 3 and 4.
//!
//! Sections 0, 2, 3, 4 and 5 share one layout across editions; section 1
//! differs and lives in [`legacy`] and [`v4`].

pub mod legacy;
mod tools;
pub mod v4;

use super::skip1;
use crate::errors::{Error, Result};
use crate::message::MessageHeader;
use crate::tables::TableKey;
use crextables::Fxy;
use nom::{
    IResult,
    bytes::complete::{tag, take},
    error::ErrorKind,
    number::complete::{be_u8, be_u16, be_u24},
};

pub const INDICATOR: &[u8] = b"BUFR";
const SECTION0_LEN: usize = 8;

macro_rules! message {
    ($(($version:ident, $t: ty, $v: pat)),+$(,)?) => {
        #[derive(Clone, Debug)]
        pub enum BufrMessage {
            $(
                $version($t),
            )+
        }

        impl MessageVersion for BufrMessage {
            fn parse(input: &[u8]) -> Result<Self> {
                let section0 = check_section0(input)?;
                let input = &input[..section0.total_length as usize];
                match section0.edition {
                    $(
                        $v => {
                            let msg = <$t as MessageVersion>::parse(input)?;
                            Ok(BufrMessage::$version(msg))
                        }
                    )+
                    other => Err(Error::UnsupportedEdition(other)),
                }
            }

            fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        BufrMessage::$version(msg) => msg.description(f),
                    )+
                }
            }

            fn header(&self) -> MessageHeader {
                match self {
                    $(
                        BufrMessage::$version(msg) => msg.header(),
                    )+
                }
            }

            fn table_key(&self) -> TableKey {
                match self {
                    $(
                        BufrMessage::$version(msg) => msg.table_key(),
                    )+
                }
            }

            fn sections(&self) -> &CommonSections {
                match self {
                    $(
                        BufrMessage::$version(msg) => msg.sections(),
                    )+
                }
            }
        }
    };
}

message!(
    (Legacy, legacy::BufrMessageLegacy, 2 | 3),
    (V4, v4::BufrMessageV4, 4),
);

impl BufrMessage {
    pub fn edition(&self) -> u8 {
        self.sections().section0.edition
    }
}

impl std::fmt::Display for BufrMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description(f)
    }
}

pub trait MessageVersion: Sized {
    fn parse(input: &[u8]) -> Result<Self>;

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    fn header(&self) -> MessageHeader;

    fn table_key(&self) -> TableKey;

    fn sections(&self) -> &CommonSections;

    fn subsets_count(&self) -> u16 {
        self.sections().section3.number_of_subsets
    }

    fn is_compressed(&self) -> bool {
        self.sections().section3.is_compressed
    }

    fn descriptors(&self) -> Result<Vec<Fxy>> {
        let s = self.sections();
        tools::parse_descriptors(&s.section3.data, s.section3.data_offset)
    }

    fn data_block(&self) -> &[u8] {
        &self.sections().section4.data
    }

    /// Offset of the first data bit within the message.
    fn data_offset(&self) -> usize {
        self.sections().section4.data_offset
    }
}

/// Sections whose layout does not depend on the edition.
#[derive(Clone, Debug)]
pub struct CommonSections {
    pub section0: Section0,
    pub section2: Option<Section2>,
    pub section3: Section3,
    pub section4: Section4,
}

#[derive(Clone, Copy, Debug)]
pub struct Section0 {
    pub total_length: u32,
    pub edition: u8,
}

/// Checks the magic and declared length before any section is parsed, so
/// that a cut-off message is always reported as premature.
fn check_section0(input: &[u8]) -> Result<Section0> {
    let magic = &input[..input.len().min(INDICATOR.len())];
    if !INDICATOR.starts_with(magic) {
        return Err(Error::NotThisFormat { expected: "BUFR" });
    }
    if input.len() < SECTION0_LEN {
        return Err(Error::premature(input.len()));
    }
    let (_, section0) = parse_section0(input).map_err(|e| map_nom_error(input.len(), e))?;
    if (section0.total_length as usize) < SECTION0_LEN {
        return Err(Error::framing(4, "declared length shorter than section 0"));
    }
    if (section0.total_length as usize) > input.len() {
        return Err(Error::premature(input.len()));
    }
    Ok(section0)
}

pub(super) fn parse_section0(input: &[u8]) -> IResult<&[u8], Section0> {
    let (input, _) = tag(INDICATOR)(input)?;
    let (input, total_length) = be_u24(input)?;
    let (input, edition) = be_u8(input)?;
    Ok((
        input,
        Section0 {
            total_length,
            edition,
        },
    ))
}

/// Translates a nom failure into a decode error positioned in the message.
pub(super) fn map_nom_error(total: usize, e: nom::Err<nom::error::Error<&[u8]>>) -> Error {
    match e {
        nom::Err::Incomplete(_) => Error::premature(total),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = total - e.input.len();
            match e.code {
                ErrorKind::Eof => Error::premature(offset),
                code => Error::framing(offset, format!("{code:?}")),
            }
        }
    }
}

fn too_short(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, ErrorKind::LengthValue))
}

/// Body of a section whose length field counts `header` octets already read.
fn section_body(input: &[u8], length: usize, header: usize) -> IResult<&[u8], &[u8]> {
    let body = length.checked_sub(header).ok_or_else(|| too_short(input))?;
    take(body)(input)
}

#[derive(Clone, Debug)]
pub struct Section2 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(super) fn parse_section2(input: &[u8]) -> IResult<&[u8], Section2> {
    let (input, length) = be_u24(input)?;
    let (input, _) = skip1(input)?;
    let (input, data) = section_body(input, length as usize, 4)?;
    Ok((
        input,
        Section2 {
            length: length as usize,
            data: data.to_vec(),
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section3 {
    pub length: usize,
    pub number_of_subsets: u16,
    pub is_observation: bool,
    pub is_compressed: bool,
    pub data: Vec<u8>,
    pub data_offset: usize,
}

pub(super) fn parse_section3(input: &[u8], total: usize) -> IResult<&[u8], Section3> {
    let (input, length) = be_u24(input)?;
    let (input, _) = skip1(input)?;
    let (input, number_of_subsets) = be_u16(input)?;
    let (input, flags) = be_u8(input)?;
    let is_observation = (flags & 0b1000_0000) != 0;
    let is_compressed = (flags & 0b0100_0000) != 0;
    let data_offset = total - input.len();
    let (input, data) = section_body(input, length as usize, 7)?;
    Ok((
        input,
        Section3 {
            length: length as usize,
            number_of_subsets,
            is_observation,
            is_compressed,
            data: data.to_vec(),
            data_offset,
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section4 {
    pub length: usize,
    pub data: Vec<u8>,
    pub data_offset: usize,
}

pub(super) fn parse_section4(input: &[u8], total: usize) -> IResult<&[u8], Section4> {
    let (input, length) = be_u24(input)?;
    let (input, _) = skip1(input)?;
    let data_offset = total - input.len();
    let (input, data) = section_body(input, length as usize, 4)?;
    Ok((
        input,
        Section4 {
            length: length as usize,
            data: data.to_vec(),
            data_offset,
        },
    ))
}

pub(super) fn parse_section5(input: &[u8]) -> IResult<&[u8], ()> {
    let (input, _) = tag("7777")(input)?;
    Ok((input, ()))
}

/// Sections 2 to 5, following an edition-specific section 1.
pub(super) fn parse_tail(
    input: &[u8],
    total: usize,
    section0: Section0,
    optional_section_present: bool,
) -> IResult<&[u8], CommonSections> {
    let (input, section2) = if optional_section_present {
        let (input, sec2) = parse_section2(input)?;
        (input, Some(sec2))
    } else {
        (input, None)
    };
    let (input, section3) = parse_section3(input, total)?;
    let (input, section4) = parse_section4(input, total)?;
    let (input, _) = parse_section5(input)?;

    Ok((
        input,
        CommonSections {
            section0,
            section2,
            section3,
            section4,
        },
    ))
}
