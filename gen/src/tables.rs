use crate::Fxy;
use rkyv::Archive;
use rkyv::api::high::HighSerializer;
use rkyv::rancor::Error;
use std::fmt::{Debug, Display};

pub struct BTable;
pub struct DTable;

pub const STRING_BUFR_UNIT: &str = "CCITT IA5";
pub const STRING_CREX_UNIT: &str = "Character";

pub trait TableTypeTrait {
    type EntryType: TableEntry;
    const TABLE_TYPE: crate::TableType;
}

impl TableTypeTrait for BTable {
    type EntryType = BTableEntry;
    const TABLE_TYPE: crate::TableType = crate::TableType::B;
}

impl TableTypeTrait for DTable {
    type EntryType = DTableEntry;
    const TABLE_TYPE: crate::TableType = crate::TableType::D;
}

pub trait TableEntry:
    Display
    + Debug
    + Clone
    + Sized
    + Archive
    + for<'a> rkyv::Serialize<
        HighSerializer<rkyv::util::AlignedVec, rkyv::ser::allocator::ArenaHandle<'a>, Error>,
    >
{
    fn fxy(&self) -> Fxy;
}

/// Access to the descriptor code of an archived (zero-copy) entry.
pub trait ArchivedEntry: Display {
    fn fxy(&self) -> Fxy;
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct BTableEntry {
    pub fxy: Fxy,
    pub class_name_en: String,
    pub element_name_en: String,
    pub bufr_unit: String,
    pub bufr_scale: i32,
    pub bufr_reference_value: i32,
    pub bufr_datawidth_bits: u32,
    pub crex_unit: Option<String>,
    pub crex_scale: Option<i32>,
    pub crex_datawidth_char: Option<u32>,
    pub note_en: Option<String>,
    pub status: Option<String>,
}

impl BTableEntry {
    pub fn fxy(&self) -> Fxy {
        self.fxy
    }

    pub fn element_name_en(&self) -> &str {
        &self.element_name_en
    }

    pub fn bufr_unit(&self) -> &str {
        &self.bufr_unit
    }

    pub fn crex_unit(&self) -> Option<&str> {
        self.crex_unit.as_deref()
    }

    /// Character-valued elements are flagged by either encoding's unit.
    pub fn is_string(&self) -> bool {
        self.bufr_unit == STRING_BUFR_UNIT || self.crex_unit() == Some(STRING_CREX_UNIT)
    }

    pub fn is_flag_or_code(&self) -> bool {
        matches!(
            self.bufr_unit.as_str(),
            "flag table" | "flag-table" | "code table" | "code-table"
        )
    }

    /// Class 31 holds replication factors and other counters, which are never
    /// treated as missing.
    pub fn is_counter(&self) -> bool {
        self.fxy.f() == 0 && self.fxy.x() == 31
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

fn truncated(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn write_b_row(
    f: &mut std::fmt::Formatter<'_>,
    fxy: Fxy,
    name: &str,
    unit: &str,
    scale: i32,
    reference: i32,
    width: u32,
    crex_width: Option<u32>,
) -> std::fmt::Result {
    write!(
        f,
        "{} | {:<40} | {:<15} | {:>5} | {:>10} | {:>5} | {:>5}",
        fxy,
        truncated(name, 40),
        truncated(unit, 15),
        scale,
        reference,
        width,
        crex_width.map(|w| w.to_string()).unwrap_or_else(|| "-".into()),
    )
}

impl Display for BTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_b_row(
            f,
            self.fxy,
            &self.element_name_en,
            &self.bufr_unit,
            self.bufr_scale,
            self.bufr_reference_value,
            self.bufr_datawidth_bits,
            self.crex_datawidth_char,
        )
    }
}

impl Display for ArchivedBTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_b_row(
            f,
            self.fxy.to_native(),
            &self.element_name_en,
            &self.bufr_unit,
            self.bufr_scale.to_native(),
            self.bufr_reference_value.to_native(),
            self.bufr_datawidth_bits.to_native(),
            self.crex_datawidth_char.as_ref().map(|w| w.to_native()),
        )
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct DTableEntry {
    pub fxy: Fxy,
    pub fxy_chain: Vec<Fxy>,
    pub category: Option<String>,
    pub title_en: Option<String>,
    pub status: Option<String>,
}

impl DTableEntry {
    pub fn fxy(&self) -> Fxy {
        self.fxy
    }

    pub fn fxy_chain(&self) -> &[Fxy] {
        &self.fxy_chain
    }

    pub fn title_en(&self) -> Option<&str> {
        self.title_en.as_deref()
    }
}

fn write_d_row(
    f: &mut std::fmt::Formatter<'_>,
    fxy: Fxy,
    title: &str,
    chain: impl Iterator<Item = Fxy>,
) -> std::fmt::Result {
    let chain = chain.map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
    write!(f, "{} | {:<50} | [{}]", fxy, truncated(title, 50), chain)
}

impl Display for DTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_d_row(
            f,
            self.fxy,
            self.title_en().unwrap_or("N/A"),
            self.fxy_chain.iter().copied(),
        )
    }
}

impl Display for ArchivedDTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_d_row(
            f,
            self.fxy.to_native(),
            self.title_en.as_deref().unwrap_or("N/A"),
            self.fxy_chain.iter().map(|c| c.to_native()),
        )
    }
}

impl TableEntry for BTableEntry {
    fn fxy(&self) -> Fxy {
        self.fxy
    }
}

impl TableEntry for DTableEntry {
    fn fxy(&self) -> Fxy {
        self.fxy
    }
}

impl ArchivedEntry for ArchivedBTableEntry {
    fn fxy(&self) -> Fxy {
        self.fxy.to_native()
    }
}

impl ArchivedEntry for ArchivedDTableEntry {
    fn fxy(&self) -> Fxy {
        self.fxy.to_native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(unit: &str, crex_unit: Option<&str>) -> BTableEntry {
        BTableEntry {
            fxy: Fxy::new(0, 1, 15),
            class_name_en: "Identification".into(),
            element_name_en: "Station or site name".into(),
            bufr_unit: unit.into(),
            bufr_scale: 0,
            bufr_reference_value: 0,
            bufr_datawidth_bits: 160,
            crex_unit: crex_unit.map(Into::into),
            crex_scale: Some(0),
            crex_datawidth_char: Some(20),
            note_en: None,
            status: None,
        }
    }

    #[test]
    fn string_type_follows_either_unit() {
        assert!(entry("CCITT IA5", None).is_string());
        assert!(entry("Numeric", Some("Character")).is_string());
        assert!(!entry("Numeric", Some("Numeric")).is_string());
    }

    #[test]
    fn display_truncates_long_names() {
        let mut e = entry("CCITT IA5", Some("Character"));
        e.element_name_en = "x".repeat(60);
        let row = e.to_string();
        assert!(row.starts_with("001015 | "));
        assert!(row.contains("..."));
    }
}
