use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::TableType;

/// Stem of a compiled master table, relative to the tables directory.
pub fn master_file_stem(kind: TableType, version: u32) -> String {
    format!("master/BUFRCREX_Table{}_{}", kind_letter(kind), version)
}

/// Stem of a compiled local table, relative to the tables directory.
pub fn local_file_stem(kind: TableType, centre: u16, version: u32) -> String {
    format!(
        "local/BUFRCREX_Table{}_{}_{}",
        kind_letter(kind),
        centre,
        version
    )
}

fn kind_letter(kind: TableType) -> char {
    match kind {
        TableType::B => 'B',
        TableType::D => 'D',
    }
}

/// Metadata extracted from a CSV table filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub kind: TableType,
    pub version: u32,
    /// Originating centre, set for local tables only
    pub centre: Option<u16>,
    pub language: Option<String>,
    pub filename: String,
}

impl TableMetadata {
    pub fn is_local(&self) -> bool {
        self.centre.is_some()
    }

    /// Where the compiled form of this table lives under the output directory.
    pub fn output_name(&self) -> String {
        match self.centre {
            Some(centre) => local_file_stem(self.kind, centre, self.version),
            None => master_file_stem(self.kind, self.version),
        }
    }
}

pub trait TableFilePattern: Send + Sync {
    fn matches(&self, filename: &str) -> Option<TableMetadata>;

    fn glob_pattern(&self) -> &str;

    fn description(&self) -> &str;
}

/// WMO master tables, e.g. `BUFRCREX_TableB_en_35.csv`.
#[derive(Debug)]
pub struct WMOPattern {
    regex: Regex,
}

impl Default for WMOPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl WMOPattern {
    pub fn new() -> Self {
        let regex = Regex::new(r"^(?:BUFR(?:CREX)?)_Table([BD])_([a-z]{2})_(\d+)\.csv$")
            .expect("static regex");
        Self { regex }
    }
}

impl TableFilePattern for WMOPattern {
    fn matches(&self, filename: &str) -> Option<TableMetadata> {
        let caps = self.regex.captures(filename)?;

        let kind = match &caps[1] {
            "B" => TableType::B,
            "D" => TableType::D,
            _ => return None,
        };

        Some(TableMetadata {
            kind,
            version: caps[3].parse().ok()?,
            centre: None,
            language: Some(caps[2].to_string()),
            filename: filename.to_string(),
        })
    }

    fn glob_pattern(&self) -> &str {
        "*Table[BD]_*.csv"
    }

    fn description(&self) -> &str {
        "WMO master tables (BUFRCREX_Table[BD]_en_<version>.csv)"
    }
}

/// Centre-local tables, e.g. `localtabb_85_20.csv` (centre 85, version 20).
#[derive(Debug)]
pub struct LocalPattern {
    regex: Regex,
}

impl Default for LocalPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPattern {
    pub fn new() -> Self {
        let regex = Regex::new(r"^localtab([bd])_(\d+)_(\d+)\.csv$").expect("static regex");
        Self { regex }
    }
}

impl TableFilePattern for LocalPattern {
    fn matches(&self, filename: &str) -> Option<TableMetadata> {
        let caps = self.regex.captures(filename)?;

        let kind = match &caps[1] {
            "b" => TableType::B,
            "d" => TableType::D,
            _ => return None,
        };

        Some(TableMetadata {
            kind,
            version: caps[3].parse().ok()?,
            centre: Some(caps[2].parse().ok()?),
            language: None,
            filename: filename.to_string(),
        })
    }

    fn glob_pattern(&self) -> &str {
        "localtab[bd]_*.csv"
    }

    fn description(&self) -> &str {
        "Local tables (localtab[bd]_<centre>_<version>.csv)"
    }
}

pub struct TableScanner {
    patterns: Vec<Box<dyn TableFilePattern>>,
}

impl Default for TableScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TableScanner {
    pub fn new() -> Self {
        Self {
            patterns: vec![Box::new(WMOPattern::new()), Box::new(LocalPattern::new())],
        }
    }

    pub fn match_filename(&self, filename: &str) -> Option<TableMetadata> {
        self.patterns.iter().find_map(|p| p.matches(filename))
    }

    /// Lists every CSV table under `dir` recognised by one of the patterns,
    /// optionally restricted to one table kind.
    pub fn scan_directory<P: AsRef<Path>>(
        &self,
        dir: P,
        kind_filter: Option<TableType>,
    ) -> Result<Vec<(PathBuf, TableMetadata)>> {
        let dir = dir.as_ref();
        let mut results = Vec::new();

        for pattern in &self.patterns {
            let glob_pattern = dir.join(pattern.glob_pattern());
            let glob_pattern = glob_pattern
                .to_str()
                .with_context(|| format!("Non UTF-8 directory {}", dir.display()))?;

            for entry in glob::glob(glob_pattern).context("Failed to read glob pattern")? {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable directory entry");
                        continue;
                    }
                };
                let Some(metadata) = path
                    .file_name()
                    .and_then(|f| f.to_str())
                    .and_then(|f| pattern.matches(f))
                else {
                    continue;
                };
                if kind_filter.is_some_and(|k| k != metadata.kind) {
                    continue;
                }
                results.push((path, metadata));
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results.dedup_by(|a, b| a.0 == b.0);

        Ok(results)
    }

    pub fn patterns(&self) -> &[Box<dyn TableFilePattern>] {
        &self.patterns
    }
}
