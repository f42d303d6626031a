//! Extension schema store (`schemas/` under the configuration directory).

use std::path::Path;

use helm_mapify_core::ResourceRef;
use helm_mapify_k8s::fetch::{StoredSchema, catalog_url, fetch, store_document};
use helm_mapify_k8s::{Registry, SchemaError};
use tracing::warn;

use crate::error::{CliError, CliResult};

const SCHEMA_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn store_file(dir: &Path, path: &Path, overwrite: bool) -> Result<StoredSchema, SchemaError> {
    let src = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    store_document(dir, &src, &path.to_string_lossy(), overwrite)
}

/// Copy schemas from a URL, a file, or every schema file below a directory
/// into the store.
///
/// Inside a directory, documents that are not schemas are logged and
/// skipped. A failed fetch leaves the store untouched.
///
/// # Errors
///
/// Fails when the source is missing, cannot be fetched, or a single file
/// source is not a schema.
pub fn load(dir: &Path, source: &str, overwrite: bool) -> CliResult<Vec<StoredSchema>> {
    if is_url(source) {
        let src = fetch(source)?;
        return Ok(vec![store_document(dir, &src, source, overwrite)?]);
    }

    let path = Path::new(source);
    if !path.exists() {
        return Err(CliError::SchemaSourceMissing {
            source_ref: source.to_string(),
        });
    }
    if !path.is_dir() {
        return Ok(vec![store_file(dir, path, overwrite)?]);
    }

    let mut stored = Vec::new();
    for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let is_schema_file = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SCHEMA_EXTENSIONS.contains(&e));
        if !is_schema_file {
            continue;
        }
        match store_file(dir, entry.path(), overwrite) {
            Ok(s) => stored.push(s),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "skipping schema file");
            }
        }
    }
    Ok(stored)
}

/// CRDs-catalog URL for a `<group>/<version>/<Kind>` reference.
///
/// # Errors
///
/// Fails for malformed references and for built-in API groups.
pub fn catalog_source(base_url: &str, reference: &str) -> CliResult<String> {
    let invalid = || CliError::InvalidCatalogRef {
        reference: reference.to_string(),
    };
    let (api_version, kind) = reference.trim().rsplit_once('/').ok_or_else(invalid)?;
    catalog_url(base_url, &ResourceRef::new(api_version, kind)).ok_or_else(invalid)
}

/// Resource types with a stored schema.
///
/// # Errors
///
/// Fails if the store cannot be read.
pub fn list(dir: &Path) -> CliResult<Vec<ResourceRef>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut registry = Registry::new();
    registry.load_path(dir)?;
    Ok(registry.known_types())
}
