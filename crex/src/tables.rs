use crate::errors::{Error, Result};
use crate::opcodes::Opcodes;
use anyhow::anyhow;
use crextables::{
    Fxy, TableType, compiled_table_path,
    pattern::{local_file_stem, master_file_stem},
    prelude::{BTableEntry, CompiledTableB, CompiledTableD, DTableEntry},
};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Table B and Table D for one message, with local entries already layered
/// over the master ones. Immutable once built.
#[derive(Debug, Default, Clone)]
pub struct DescriptorTable {
    elements: FxHashMap<Fxy, Arc<BTableEntry>>,
    sequences: FxHashMap<Fxy, Vec<Fxy>>,
}

impl DescriptorTable {
    pub fn new(elements: Vec<BTableEntry>, sequences: Vec<DTableEntry>) -> Self {
        let mut table = Self::default();
        table.overlay(elements, sequences);
        table
    }

    /// Adds entries, replacing any existing entry with the same code.
    pub fn overlay(&mut self, elements: Vec<BTableEntry>, sequences: Vec<DTableEntry>) {
        self.elements
            .extend(elements.into_iter().map(|e| (e.fxy, Arc::new(e))));
        self.sequences
            .extend(sequences.into_iter().map(|d| (d.fxy, d.fxy_chain)));
    }

    pub fn lookup_element(&self, fxy: Fxy) -> Result<&Arc<BTableEntry>> {
        self.elements
            .get(&fxy)
            .ok_or(Error::UnknownDescriptor { fxy, offset: 0 })
    }

    /// Returns a fresh copy of the expansion, ready to be spliced.
    pub fn lookup_sequence(&self, fxy: Fxy) -> Result<Opcodes> {
        self.sequences
            .get(&fxy)
            .map(|chain| Opcodes::from(chain.clone()))
            .ok_or(Error::UnknownDescriptor { fxy, offset: 0 })
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalTableKey {
    pub centre: u16,
    pub subcentre: u16,
    pub version: u8,
}

/// Identifies the tables a message was encoded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub master_table: u8,
    pub edition: u8,
    pub version: u8,
    pub local: Option<LocalTableKey>,
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "master {} edition {} version {}",
            self.master_table, self.edition, self.version
        )?;
        if let Some(local) = &self.local {
            write!(
                f,
                " local {}:{} version {}",
                local.centre, local.subcentre, local.version
            )?;
        }
        Ok(())
    }
}

pub trait TableProvider: Send + Sync {
    fn load(&self, key: &TableKey) -> Result<Arc<DescriptorTable>>;
}

impl<P: TableProvider + ?Sized> TableProvider for Arc<P> {
    fn load(&self, key: &TableKey) -> Result<Arc<DescriptorTable>> {
        (**self).load(key)
    }
}

/// Reads compiled tables laid out by `crex-tables scan`.
#[derive(Debug, Clone)]
pub struct FileTableProvider {
    base: PathBuf,
}

impl FileTableProvider {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn stem_exists(&self, stem: &str) -> bool {
        compiled_table_path(self.base.join(stem)).exists()
    }

    /// Newest master version not above the requested one.
    fn resolve_master_version(&self, version: u8) -> Result<u8> {
        let found = (0..=version)
            .rev()
            .find(|v| self.stem_exists(&master_file_stem(TableType::B, *v as u32)));

        match found {
            Some(v) => {
                if v != version {
                    tracing::warn!(
                        requested = version,
                        using = v,
                        "master table missing, falling back to an older version"
                    );
                }
                Ok(v)
            }
            None => Err(Error::TableNotFound(anyhow!(
                "no master table at or below version {} in {}",
                version,
                self.base.display()
            ))),
        }
    }

    fn read(&self, b_stem: &str, d_stem: &str) -> Result<(Vec<BTableEntry>, Vec<DTableEntry>)> {
        let elements = CompiledTableB::load_from_disk(self.base.join(b_stem))?.to_entries()?;
        let sequences = CompiledTableD::load_from_disk(self.base.join(d_stem))?.to_entries()?;
        Ok((elements, sequences))
    }
}

impl TableProvider for FileTableProvider {
    fn load(&self, key: &TableKey) -> Result<Arc<DescriptorTable>> {
        let version = self.resolve_master_version(key.version)?;
        let (elements, sequences) = self.read(
            &master_file_stem(TableType::B, version as u32),
            &master_file_stem(TableType::D, version as u32),
        )?;
        let mut table = DescriptorTable::new(elements, sequences);

        if let Some(local) = key.local {
            let (elements, sequences) = self.read(
                &local_file_stem(TableType::B, local.centre, local.version as u32),
                &local_file_stem(TableType::D, local.centre, local.version as u32),
            )?;
            table.overlay(elements, sequences);
        }

        tracing::debug!(
            %key,
            elements = table.element_count(),
            sequences = table.sequence_count(),
            "loaded descriptor tables"
        );
        Ok(Arc::new(table))
    }
}

/// Tables held in memory, keyed exactly, with an optional catch-all.
#[derive(Debug, Default, Clone)]
pub struct MemoryTableProvider {
    tables: FxHashMap<TableKey, Arc<DescriptorTable>>,
    fallback: Option<Arc<DescriptorTable>>,
}

impl MemoryTableProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider answering every key with `table`.
    pub fn with_fallback(table: DescriptorTable) -> Self {
        Self {
            tables: FxHashMap::default(),
            fallback: Some(Arc::new(table)),
        }
    }

    pub fn insert(&mut self, key: TableKey, table: DescriptorTable) {
        self.tables.insert(key, Arc::new(table));
    }
}

impl TableProvider for MemoryTableProvider {
    fn load(&self, key: &TableKey) -> Result<Arc<DescriptorTable>> {
        self.tables
            .get(key)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| Error::TableNotFound(anyhow!("no tables registered for {key}")))
    }
}

/// Loads each key at most once and shares the result.
pub struct CachedProvider<P: TableProvider> {
    inner: P,
    cache: Mutex<FxHashMap<TableKey, Arc<DescriptorTable>>>,
}

impl<P: TableProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn cached_keys(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<P: TableProvider> TableProvider for CachedProvider<P> {
    fn load(&self, key: &TableKey) -> Result<Arc<DescriptorTable>> {
        // held across the inner load so concurrent callers wait for one load
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cache.get(key) {
            return Ok(Arc::clone(table));
        }
        let table = self.inner.load(key)?;
        cache.insert(*key, Arc::clone(&table));
        Ok(table)
    }
}
