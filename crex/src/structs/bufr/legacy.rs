use super::{CommonSections, MessageVersion, map_nom_error, parse_section0, parse_tail};
use crate::errors::Result;
use crate::message::{Encoding, MessageHeader, ReferenceTime};
use crate::tables::{LocalTableKey, TableKey};
use nom::{
    IResult,
    bytes::complete::take,
    error::{Error, ErrorKind},
    number::complete::{be_u8, be_u16, be_u24},
};

/// Editions 2 and 3, which share a 17-octet section 1 and differ only in
/// how the originating centre is encoded.
#[derive(Clone, Debug)]
pub struct BufrMessageLegacy {
    pub section1: Section1,
    pub sections: CommonSections,
}

impl MessageVersion for BufrMessageLegacy {
    fn parse(input: &[u8]) -> Result<Self> {
        let total = input.len();
        let (rest, section0) = parse_section0(input).map_err(|e| map_nom_error(total, e))?;
        let (rest, section1) =
            parse_section1(rest, section0.edition).map_err(|e| map_nom_error(total, e))?;
        let (_, sections) = parse_tail(rest, total, section0, section1.optional_section_present)
            .map_err(|e| map_nom_error(total, e))?;

        Ok(BufrMessageLegacy { section1, sections })
    }

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BUFR Message V{}:", self.sections.section0.edition)?;
        write!(f, "{}", self.section1)
    }

    fn header(&self) -> MessageHeader {
        let s = &self.section1;
        MessageHeader {
            encoding: Encoding::Bufr,
            edition: self.sections.section0.edition,
            master_table: s.master_table,
            table_version: s.master_table_version,
            local_table_version: s.local_table_version,
            centre: Some(s.centre),
            subcentre: Some(s.subcentre),
            data_category: s.data_category as u16,
            data_subcategory: Some(s.data_subcategory as u16),
            reference_time: Some(s.reference_time()),
            check_digits: false,
        }
    }

    fn table_key(&self) -> TableKey {
        let s = &self.section1;
        TableKey {
            master_table: s.master_table,
            edition: self.sections.section0.edition,
            version: s.master_table_version,
            local: (s.local_table_version > 0).then_some(LocalTableKey {
                centre: s.centre,
                subcentre: s.subcentre,
                version: s.local_table_version,
            }),
        }
    }

    fn sections(&self) -> &CommonSections {
        &self.sections
    }
}

#[derive(Clone, Debug)]
pub struct Section1 {
    pub length: usize,
    pub master_table: u8,               // octet 4
    pub centre: u16,                    // edition 2: octets 5-6, edition 3: octet 6
    pub subcentre: u16,                 // edition 3: octet 5
    pub update_sequence_number: u8,     // octet 7
    pub optional_section_present: bool, // octet 8 bit 1
    pub data_category: u8,              // octet 9
    pub data_subcategory: u8,           // octet 10
    pub master_table_version: u8,       // octet 11
    pub local_table_version: u8,        // octet 12
    pub year_of_century: u8,            // octet 13
    pub month: u8,                      // octet 14
    pub day: u8,                        // octet 15
    pub hour: u8,                       // octet 16
    pub minute: u8,                     // octet 17
}

impl Section1 {
    pub fn reference_time(&self) -> ReferenceTime {
        // 100 is how some centres wrote 2000
        let year = match self.year_of_century {
            y @ 0..=49 => 2000 + y as u16,
            100 => 2000,
            y => 1900 + y as u16,
        };
        ReferenceTime {
            year,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: 0,
        }
    }
}

fn parse_section1(input: &[u8], edition: u8) -> IResult<&[u8], Section1> {
    let (input, length) = be_u24(input)?;
    let length = length as usize;

    const FIXED_LEN: usize = 17;
    if length < FIXED_LEN {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue)));
    }

    let (input, master_table) = be_u8(input)?;
    let (input, (subcentre, centre)) = if edition == 2 {
        let (input, centre) = be_u16(input)?;
        (input, (0, centre))
    } else {
        let (input, subcentre) = be_u8(input)?;
        let (input, centre) = be_u8(input)?;
        (input, (subcentre as u16, centre as u16))
    };
    let (input, update_sequence_number) = be_u8(input)?;
    let (input, flags) = be_u8(input)?;
    let optional_section_present = (flags & 0x80) != 0;

    let (input, data_category) = be_u8(input)?;
    let (input, data_subcategory) = be_u8(input)?;
    let (input, master_table_version) = be_u8(input)?;
    let (input, local_table_version) = be_u8(input)?;
    let (input, year_of_century) = be_u8(input)?;
    let (input, month) = be_u8(input)?;
    let (input, day) = be_u8(input)?;
    let (input, hour) = be_u8(input)?;
    let (input, minute) = be_u8(input)?;

    let (input, _) = take(length - FIXED_LEN)(input)?;

    Ok((
        input,
        Section1 {
            length,
            master_table,
            centre,
            subcentre,
            update_sequence_number,
            optional_section_present,
            data_category,
            data_subcategory,
            master_table_version,
            local_table_version,
            year_of_century,
            month,
            day,
            hour,
            minute,
        },
    ))
}

impl std::fmt::Display for Section1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Centre:          {} / {}", self.centre, self.subcentre)?;
        writeln!(f, "  Category:        {}/{}", self.data_category, self.data_subcategory)?;
        writeln!(
            f,
            "  Tables:          master {} v{}, local v{}",
            self.master_table, self.master_table_version, self.local_table_version
        )?;
        writeln!(f, "  Reference time:  {} UTC", self.reference_time())
    }
}
