use crate::errors::Result;
use crate::table_path::get_tables_base_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Decoder settings, usually read from a TOML file:
///
/// ```toml
/// tables_path = "/usr/share/crex/tables"
/// max_variables = 100000
/// max_nesting = 16
/// verify_check_digits = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Directory holding `master/` and `local/` compiled tables. Falls back to
    /// the process-wide path (see [`crate::table_path`]).
    pub tables_path: Option<PathBuf>,
    /// Upper bound on decoded variables per message.
    pub max_variables: usize,
    /// Upper bound on replication nesting.
    pub max_nesting: usize,
    /// When false, CREX check digits are consumed but not compared.
    pub verify_check_digits: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            tables_path: None,
            max_variables: 1_000_000,
            max_nesting: 32,
            verify_check_digits: true,
        }
    }
}

impl DecoderConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn tables_path(&self) -> PathBuf {
        self.tables_path
            .clone()
            .unwrap_or_else(get_tables_base_path)
    }
}
