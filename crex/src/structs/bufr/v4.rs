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

#[derive(Clone, Debug)]
pub struct BufrMessageV4 {
    pub section1: Section1,
    pub sections: CommonSections,
}

impl MessageVersion for BufrMessageV4 {
    fn parse(input: &[u8]) -> Result<Self> {
        let total = input.len();
        let (rest, section0) = parse_section0(input).map_err(|e| map_nom_error(total, e))?;
        let (rest, section1) = parse_section1(rest).map_err(|e| map_nom_error(total, e))?;
        let (_, sections) = parse_tail(rest, total, section0, section1.optional_section_present)
            .map_err(|e| map_nom_error(total, e))?;

        Ok(BufrMessageV4 { section1, sections })
    }

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BUFR Message V4:")?;
        write!(f, "{}", self.section1)
    }

    fn header(&self) -> MessageHeader {
        let s = &self.section1;
        MessageHeader {
            encoding: Encoding::Bufr,
            edition: 4,
            master_table: s.master_table,
            table_version: s.master_table_version,
            local_table_version: s.local_table_version,
            centre: Some(s.centre),
            subcentre: Some(s.subcentre),
            data_category: s.data_category as u16,
            data_subcategory: Some(s.international_data_subcategory as u16),
            reference_time: Some(s.reference_time()),
            check_digits: false,
        }
    }

    fn table_key(&self) -> TableKey {
        let s = &self.section1;
        TableKey {
            master_table: s.master_table,
            edition: 4,
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
    pub length: usize,                      // octet 1-3
    pub master_table: u8,                   // octet 4
    pub centre: u16,                        // octet 5-6
    pub subcentre: u16,                     // octet 7-8
    pub update_sequence_number: u8,         // octet 9
    pub optional_section_present: bool,     // octet 10 bit1
    pub data_category: u8,                  // octet 11
    pub international_data_subcategory: u8, // octet 12
    pub local_subcategory: u8,              // octet 13
    pub master_table_version: u8,           // octet 14
    pub local_table_version: u8,            // octet 15
    pub year: u16,                          // octet 16-17
    pub month: u8,                          // octet 18
    pub day: u8,                            // octet 19
    pub hour: u8,                           // octet 20
    pub minute: u8,                         // octet 21
    pub second: u8,                         // octet 22
    pub local_use: Vec<u8>,                 // octet 23-
}

impl Section1 {
    pub fn reference_time(&self) -> ReferenceTime {
        ReferenceTime {
            year: self.year,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
        }
    }
}

fn parse_section1(input: &[u8]) -> IResult<&[u8], Section1> {
    let (input, length) = be_u24(input)?;
    let length = length as usize;

    const FIXED_LEN: usize = 22;
    if length < FIXED_LEN {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue)));
    }

    let (input, master_table) = be_u8(input)?;
    let (input, centre) = be_u16(input)?;
    let (input, subcentre) = be_u16(input)?;
    let (input, update_sequence_number) = be_u8(input)?;

    let (input, flags) = be_u8(input)?;
    let optional_section_present = (flags & 0x80) != 0;

    let (input, data_category) = be_u8(input)?;
    let (input, international_data_subcategory) = be_u8(input)?;
    let (input, local_subcategory) = be_u8(input)?;
    let (input, master_table_version) = be_u8(input)?;
    let (input, local_table_version) = be_u8(input)?;

    let (input, year) = be_u16(input)?;
    let (input, month) = be_u8(input)?;
    let (input, day) = be_u8(input)?;
    let (input, hour) = be_u8(input)?;
    let (input, minute) = be_u8(input)?;
    let (input, second) = be_u8(input)?;

    let (input, local_bytes) = take(length - FIXED_LEN)(input)?;

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
            international_data_subcategory,
            local_subcategory,
            master_table_version,
            local_table_version,
            year,
            month,
            day,
            hour,
            minute,
            second,
            local_use: local_bytes.to_vec(),
        },
    ))
}

impl std::fmt::Display for Section1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  Centre:          {:<5} (0x{:04X}) / {}",
            self.centre, self.centre, self.subcentre
        )?;
        writeln!(
            f,
            "  Category:        {} (international {}, local {})",
            self.data_category, self.international_data_subcategory, self.local_subcategory
        )?;
        writeln!(
            f,
            "  Tables:          master {} v{}, local v{}",
            self.master_table, self.master_table_version, self.local_table_version
        )?;
        writeln!(f, "  Reference time:  {} UTC", self.reference_time())?;
        write!(
            f,
            "  Section 2:       {}",
            if self.optional_section_present {
                "Yes"
            } else {
                "No"
            }
        )
    }
}
