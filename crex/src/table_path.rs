use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const TABLES_PATH_ENV: &str = "CREX_TABLES_PATH";

static TABLES_BASE_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Process-wide override of the compiled tables directory. Only the first
/// call takes effect.
pub fn set_tables_base_path<P: AsRef<Path>>(path: P) {
    let _ = TABLES_BASE_PATH.set(path.as_ref().to_path_buf());
}

pub fn get_tables_base_path() -> PathBuf {
    if let Some(path) = TABLES_BASE_PATH.get() {
        return path.clone();
    }

    if let Ok(env_path) = std::env::var(TABLES_PATH_ENV) {
        return PathBuf::from(env_path);
    }

    PathBuf::from("tables")
}

pub fn get_table_path<P: AsRef<Path>>(relative_path: P) -> PathBuf {
    get_tables_base_path().join(relative_path)
}
