//! JSON storage for manifests, catalogs, quantity and log datasets.
//!
//! Every file is read whole, checked for NUL bytes and UTF-8 validity, then
//! parsed. Nothing here writes to the repository.

use crate::catalog::{Catalog, parse_float};
use crate::error::RegistryError;
use crate::repository::RepositoryManifest;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Read a repository manifest (`registry.json`).
pub fn read_manifest_from_path(
    path: impl AsRef<Path>,
) -> Result<RepositoryManifest, RegistryError> {
    let path = path.as_ref();
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| RegistryError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Read a catalog dataset.
pub fn read_catalog_from_path(path: impl AsRef<Path>) -> Result<Catalog, RegistryError> {
    let path = path.as_ref();
    let text = read_text(path)?;
    Catalog::from_json_str(&text).map_err(|e| match e {
        RegistryError::InvalidCatalog(message) => {
            RegistryError::InvalidCatalog(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Read a quantity dataset: a flat JSON object of `name -> number`.
pub fn read_quantities_from_path(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<String, f64>, RegistryError> {
    let path = path.as_ref();
    let text = read_text(path)?;
    let parse_error = |message: String| RegistryError::Parse {
        path: path.display().to_string(),
        message,
    };
    let raw: BTreeMap<String, Value> =
        serde_json::from_str(&text).map_err(|e| parse_error(e.to_string()))?;
    raw.into_iter()
        .map(|(name, value)| match parse_float(&value) {
            Some(number) => Ok((name, number)),
            None => Err(parse_error(format!("quantity `{name}` is not numeric: {value}"))),
        })
        .collect()
}

/// Read a log dataset: a JSON array of records, or one record per line.
pub fn read_log_records_from_path(path: impl AsRef<Path>) -> Result<Vec<Value>, RegistryError> {
    let path = path.as_ref();
    let text = read_text(path)?;
    let parse_error = |message: String| RegistryError::Parse {
        path: path.display().to_string(),
        message,
    };
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(&text).map_err(|e| parse_error(e.to_string()));
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| parse_error(format!("line {}: {e}", index + 1)))
        })
        .collect()
}

fn read_text(path: &Path) -> Result<String, RegistryError> {
    let bytes = fs::read(path).map_err(|e| RegistryError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    validate_substrate_bytes(path, &bytes)?;
    String::from_utf8(bytes).map_err(|e| RegistryError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), RegistryError> {
    if bytes.contains(&0) {
        return Err(RegistryError::Parse {
            path: path.display().to_string(),
            message: "contains NUL byte(s)".to_string(),
        });
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(RegistryError::Parse {
            path: path.display().to_string(),
            message: "contains non-UTF-8 byte sequence(s)".to_string(),
        });
    }
    Ok(())
}
