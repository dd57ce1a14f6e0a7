//! Whole-document JSON persistence shared by the ledger and the queue
//!
//! Every store is one pretty-printed JSON file that is read in full,
//! mutated in memory and written back in full. A missing file is an empty
//! store. There is no locking: two concurrent writers race and the last one
//! wins.

use crate::error::{LedgerError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a document, returning `T::default()` when the file doesn't exist
pub fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "store missing, starting empty");
            return Ok(T::default());
        }
        Err(source) => {
            return Err(LedgerError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|source| LedgerError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize and write a document, creating parent directories if needed
pub fn save<T>(path: &Path, what: &'static str, document: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let content = serde_json::to_string_pretty(document)
        .map_err(|source| LedgerError::Serialize { what, source })?;

    let io_err = |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    std::fs::write(path, content).map_err(io_err)?;
    tracing::debug!(path = %path.display(), what, "store written");
    Ok(())
}
