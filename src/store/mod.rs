//! JSON document stores under the data directory.
//!
//! Every store owns a mutex that is held for the full read-modify-write of
//! its document, and every write goes through a temp-file + rename so readers
//! never observe a half-written file.

pub mod portfolios;
pub mod rates;
pub mod users;

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::core::error::CoreError;

/// Reads a JSON document, falling back to `fallback()` when the file is
/// missing, unreadable or corrupt. Corruption is logged, never raised.
pub(crate) fn read_json_or<T, F>(path: &Path, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt document, starting empty");
                fallback()
            }
        },
        Err(_) => fallback(),
    }
}

/// Writes a JSON document atomically: serialize to a sibling temp file, then
/// rename into place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "wrote document");
    Ok(())
}
