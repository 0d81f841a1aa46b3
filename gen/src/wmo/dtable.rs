use super::EntryLoader;
use crate::{
    Fxy,
    tables::{DTable, DTableEntry},
};

/// Folds the one-row-per-element layout of the WMO Table D CSV into one
/// entry per sequence descriptor.
#[derive(Debug, Clone, Default)]
pub struct DTableCsvLoader {
    current_chain: Option<DTableEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RawDTableEntry {
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "FXY1")]
    pub fxy1: String,
    #[serde(rename = "Title_en", default)]
    pub title_en: Option<String>,
    #[serde(rename = "FXY2")]
    pub fxy2: String,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

impl EntryLoader for DTableCsvLoader {
    type RawEntry = RawDTableEntry;
    type Output = DTableEntry;
    type TableType = DTable;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>> {
        let fxy = Fxy::from_str(&raw.fxy1)?;
        let element = Fxy::from_str(&raw.fxy2)?;

        match self.current_chain.as_mut() {
            Some(chain) if chain.fxy == fxy => {
                chain.fxy_chain.push(element);
                Ok(None)
            }
            _ => {
                let finished = self.current_chain.replace(DTableEntry {
                    fxy,
                    fxy_chain: vec![element],
                    category: raw.category,
                    title_en: raw.title_en,
                    status: raw.status,
                });
                Ok(finished)
            }
        }
    }

    fn finish(&mut self) -> anyhow::Result<Option<Self::Output>> {
        Ok(self.current_chain.take())
    }
}
