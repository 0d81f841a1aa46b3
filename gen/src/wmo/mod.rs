pub mod btable;
pub mod dtable;
use crate::{
    TableConverter,
    tables::{TableEntry, TableTypeTrait},
};
pub use btable::BTableCsvLoader as WMOBTableLoader;
use csv::ReaderBuilder;
pub use dtable::DTableCsvLoader as WMODTableLoader;
use std::fmt::Debug;
use std::path::Path;

/// Reads a WMO CSV table, feeding each row through an [`EntryLoader`].
///
/// Rows that fail to deserialize or carry a malformed code are skipped with
/// a warning.
#[derive(Default)]
pub struct TableLoader<C: EntryLoader> {
    _marker: std::marker::PhantomData<C>,
}

impl<C: EntryLoader> TableLoader<C> {
    pub fn load_table<P: AsRef<Path>>(
        &self,
        path: P,
        loader: &mut C,
    ) -> anyhow::Result<Vec<C::Output>> {
        let rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .flexible(true)
            .from_path(path.as_ref())?;

        self.load_from_reader(rdr, &path.as_ref().display().to_string(), loader)
    }

    pub fn load_from_reader<R: std::io::Read>(
        &self,
        mut rdr: csv::Reader<R>,
        source: &str,
        loader: &mut C,
    ) -> anyhow::Result<Vec<C::Output>> {
        let mut entries = vec![];
        // header is line 1
        let mut line_num = 1;
        for result in rdr.deserialize() {
            line_num += 1;
            match result {
                Ok(record) => {
                    let record: C::RawEntry = record;
                    match loader.process_entry(record) {
                        Ok(Some(processed_entry)) => entries.push(processed_entry),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(line = line_num, source, error = %e, "skipping table row");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(line = line_num, source, error = %e, "skipping table row");
                }
            }
        }

        if let Some(processed_entry) = loader.finish()? {
            entries.push(processed_entry);
        }
        Ok(entries)
    }
}

pub trait EntryLoader: Default {
    type Output: TableEntry;
    type RawEntry: for<'de> serde::Deserialize<'de> + Debug;
    type TableType: TableTypeTrait<EntryType = Self::Output>;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>>;

    fn finish(&mut self) -> anyhow::Result<Option<Self::Output>> {
        Ok(None)
    }
}

impl<T: EntryLoader> TableConverter for TableLoader<T> {
    type OutputEntry = T::Output;
    type TableType = T::TableType;

    fn convert<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<Vec<Self::OutputEntry>> {
        let mut loader = T::default();
        self.load_table(path, &mut loader)
    }
}
