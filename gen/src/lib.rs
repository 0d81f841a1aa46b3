pub mod pattern;
pub mod prelude;
pub mod tables;
pub mod wmo;

use anyhow::{Context, anyhow};
use memmap2::Mmap;
use ph::fmph::GOFunction;
use rkyv::api::high::HighValidator;
use rkyv::bytecheck::CheckBytes;
use rkyv::de::Pool;
use rkyv::rancor::{Error, Strategy};
use rkyv::{Archive, Deserialize, Serialize};
use rustc_hash::FxHashSet;
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::fmt::Debug;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use crate::tables::{ArchivedEntry, TableEntry, TableTypeTrait};

pub const COMPILED_TABLE_EXTENSION: &str = "bufrtbl";

pub trait TableConverter {
    type OutputEntry: TableEntry;
    type TableType: TableTypeTrait<EntryType = Self::OutputEntry>;

    fn convert<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<Vec<Self::OutputEntry>>;

    fn table_type(&self) -> TableType {
        Self::TableType::TABLE_TYPE
    }
}

/// WMO descriptor code `F XX YYY`, packed as `F << 24 | X << 16 | Y`.
///
/// The packing keeps the natural `(F, X, Y)` ordering, and the 16-bit `Y`
/// slot is wide enough for the three-digit indices used by CREX.
#[derive(
    Archive,
    SerdeSerialize,
    SerdeDeserialize,
    rkyv::Serialize,
    rkyv::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[rkyv(derive(Debug))]
pub struct Fxy(u32);

impl Fxy {
    pub const fn new(f: u8, x: u8, y: u16) -> Self {
        Fxy(((f as u32) << 24) | ((x as u32) << 16) | y as u32)
    }

    pub const fn f(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn x(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn y(&self) -> u16 {
        self.0 as u16
    }

    pub const fn packed(&self) -> u32 {
        self.0
    }

    /// Parses the six-digit `FXXYYY` form used by the WMO CSV tables.
    pub fn from_str(fxy_str: &str) -> anyhow::Result<Self> {
        let fxy_str = fxy_str.trim();
        if fxy_str.len() != 6 || !fxy_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(anyhow!("Invalid FXY string: {:?}", fxy_str));
        }

        let f = fxy_str[0..1]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse F from FXY: {}", fxy_str))?;
        let x = fxy_str[1..3]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse X from FXY: {}", fxy_str))?;
        let y = fxy_str[3..6]
            .parse::<u16>()
            .with_context(|| format!("Failed to parse Y from FXY: {}", fxy_str))?;

        if f > 3 {
            return Err(anyhow!("Invalid F value {} in FXY: {}", f, fxy_str));
        }

        Ok(Fxy::new(f, x, y))
    }
}

impl std::fmt::Display for Fxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:02}{:03}", self.f(), self.x(), self.y())
    }
}

impl ArchivedFxy {
    pub fn to_native(&self) -> Fxy {
        Fxy(self.0.to_native())
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableType {
    B,
    D,
}

#[derive(Archive, Deserialize, Serialize)]
struct CompiledFile<T>
where
    T: TableEntry,
{
    pub function_header: Vec<u8>,
    pub entries: Vec<T>,
}

impl<T> CompiledFile<T>
where
    T: TableEntry,
{
    /// Orders `entries` by their perfect-hash slot so that the slot doubles as
    /// the index into the archived entry vector.
    fn new(entries: Vec<T>) -> anyhow::Result<Self> {
        let mut seen = FxHashSet::default();
        let entries: Vec<T> = entries
            .into_iter()
            .filter(|e| {
                let fresh = seen.insert(e.fxy());
                if !fresh {
                    tracing::warn!(fxy = %e.fxy(), "duplicate table entry, keeping the first one");
                }
                fresh
            })
            .collect();

        let keys: Vec<Fxy> = entries.iter().map(|e| e.fxy()).collect();
        let mphf = GOFunction::from_slice(&keys);

        let mut slotted = entries
            .into_iter()
            .map(|e| {
                mphf.get(&e.fxy())
                    .map(|slot| (slot as usize, e))
                    .ok_or_else(|| anyhow!("perfect hash has no slot for a build key"))
            })
            .collect::<anyhow::Result<Vec<(usize, T)>>>()?;
        slotted.sort_by_key(|(slot, _)| *slot);

        let mut mphf_bytes = Vec::new();
        mphf.write(&mut mphf_bytes)
            .context("Failed to serialize perfect hash function")?;

        Ok(Self {
            function_header: mphf_bytes,
            entries: slotted.into_iter().map(|(_, e)| e).collect(),
        })
    }

    fn write_to_disk<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let bytes = rkyv::to_bytes::<Error>(self)?;
        file.write_all(&bytes)?;
        Ok(())
    }
}

/// A compiled descriptor table: a memory-mapped rkyv archive plus the
/// perfect-hash function indexing it.
pub struct CompiledTable<T: TableTypeTrait> {
    mphf: GOFunction,
    mmap: Mmap,
    _marker: std::marker::PhantomData<T>,
}

pub fn compiled_table_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut path = path.as_ref().to_path_buf();
    path.set_extension(COMPILED_TABLE_EXTENSION);
    path
}

impl<T: TableTypeTrait> CompiledTable<T>
where
    <T::EntryType as Archive>::Archived: for<'a> CheckBytes<HighValidator<'a, Error>>
        + rkyv::Deserialize<T::EntryType, Strategy<Pool, Error>>
        + ArchivedEntry,
{
    pub fn build_from_csv<P: AsRef<Path>, Q: AsRef<Path>, L>(
        loader: L,
        path: P,
        output_path: Q,
    ) -> anyhow::Result<Self>
    where
        L: TableConverter<OutputEntry = T::EntryType, TableType = T>,
    {
        let entries = loader.convert(path)?;
        Self::build(entries, output_path)
    }

    pub fn build<P: AsRef<Path>>(entries: Vec<T::EntryType>, output_path: P) -> anyhow::Result<Self> {
        let output_path = compiled_table_path(output_path);
        CompiledFile::new(entries)?.write_to_disk(&output_path)?;

        Self::load_from_disk(output_path)
    }

    pub fn load_from_disk<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = compiled_table_path(path);

        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open table {}", path.display()))?;
        // SAFETY: compiled tables are written once by the table tool and only read afterwards.
        let mmap = unsafe { Mmap::map(&file)? };

        let archived = rkyv::access::<ArchivedCompiledFile<T::EntryType>, Error>(&mmap)
            .with_context(|| format!("Corrupt compiled table {}", path.display()))?;
        let mut cursor = Cursor::new(&archived.function_header[..]);
        let mphf = GOFunction::read(&mut cursor)?;

        Ok(Self {
            mphf,
            mmap,
            _marker: std::marker::PhantomData,
        })
    }

    fn archived(&self) -> anyhow::Result<&ArchivedCompiledFile<T::EntryType>> {
        let archived = rkyv::access::<ArchivedCompiledFile<T::EntryType>, Error>(&self.mmap)?;
        Ok(archived)
    }

    pub fn len(&self) -> usize {
        self.archived().map(|a| a.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Perfect-hash lookup. Codes absent from the table hash to an arbitrary
    /// slot, so the stored code is compared before returning.
    pub fn lookup(&self, fxy: Fxy) -> Option<&<T::EntryType as Archive>::Archived> {
        let slot = self.mphf.get(&fxy)? as usize;
        self.archived()
            .ok()?
            .entries
            .get(slot)
            .filter(|e| e.fxy() == fxy)
    }

    pub fn get_all_entries(&self) -> Vec<&<T::EntryType as Archive>::Archived> {
        match self.archived() {
            Ok(archived) => archived.entries.iter().collect(),
            Err(_) => vec![],
        }
    }

    /// Deserializes every entry into its owned form.
    pub fn to_entries(&self) -> anyhow::Result<Vec<T::EntryType>> {
        self.archived()?
            .entries
            .iter()
            .map(|e| rkyv::deserialize::<T::EntryType, Error>(e).map_err(anyhow::Error::from))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::Fxy;

    #[test]
    fn fxy_parses_six_digit_form() {
        let fxy = Fxy::from_str("301011").unwrap();
        assert_eq!(fxy, Fxy::new(3, 1, 11));
        assert_eq!(fxy.to_string(), "301011");
    }

    #[test]
    fn fxy_rejects_bad_strings() {
        assert!(Fxy::from_str("30101").is_err());
        assert!(Fxy::from_str("3O1011").is_err());
        assert!(Fxy::from_str("401011").is_err());
    }

    #[test]
    fn fxy_orders_like_its_components() {
        assert!(Fxy::new(0, 1, 999) < Fxy::new(0, 2, 0));
        assert!(Fxy::new(0, 63, 255) < Fxy::new(1, 0, 0));
        assert_eq!(Fxy::new(1, 2, 999).y(), 999);
    }
}
