use super::EntryLoader;
use crate::{
    Fxy,
    tables::{BTable, BTableEntry},
};

#[derive(Default)]
pub struct BTableCsvLoader;

/// One row of `BUFRCREX_TableB_en_<version>.csv`.
#[derive(Debug, serde::Deserialize)]
pub struct RawBTableEntry {
    #[serde(rename = "ClassName_en")]
    pub class_name_en: String,
    #[serde(rename = "FXY")]
    pub fxy: String,
    #[serde(rename = "ElementName_en")]
    pub element_name_en: String,
    #[serde(rename = "BUFR_Unit")]
    pub bufr_unit: String,
    #[serde(rename = "BUFR_Scale")]
    pub bufr_scale: i32,
    #[serde(rename = "BUFR_ReferenceValue")]
    pub bufr_reference_value: i32,
    #[serde(rename = "BUFR_DataWidth_Bits")]
    pub bufr_datawidth_bits: u32,
    #[serde(rename = "CREX_Unit", default)]
    pub crex_unit: Option<String>,
    #[serde(rename = "CREX_Scale", default, deserialize_with = "csv::invalid_option")]
    pub crex_scale: Option<i32>,
    #[serde(
        rename = "CREX_DataWidth_Char",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub crex_datawidth_char: Option<u32>,
    #[serde(rename = "Note_en", default)]
    pub note_en: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

impl EntryLoader for BTableCsvLoader {
    type RawEntry = RawBTableEntry;
    type Output = BTableEntry;
    type TableType = BTable;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>> {
        let fxy = Fxy::from_str(&raw.fxy)?;

        let entry = BTableEntry {
            fxy,
            class_name_en: raw.class_name_en,
            element_name_en: raw.element_name_en,
            bufr_unit: raw.bufr_unit,
            bufr_scale: raw.bufr_scale,
            bufr_reference_value: raw.bufr_reference_value,
            bufr_datawidth_bits: raw.bufr_datawidth_bits,
            crex_unit: raw.crex_unit.filter(|u| !u.trim().is_empty()),
            crex_scale: raw.crex_scale,
            crex_datawidth_char: raw.crex_datawidth_char,
            note_en: raw.note_en,
            status: raw.status,
        };

        Ok(Some(entry))
    }
}
