use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use helm_mapify_core::ResourceRef;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::SchemaError;
use crate::registry::{SchemaIdentity, document_identities, parse_documents};

static TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub const DEFAULT_CATALOG_URL: &str = "https://raw.githubusercontent.com/datreeio/CRDs-catalog/main";

/// File name a schema is stored under, so that versions of one kind coexist.
#[must_use]
pub fn canonical_filename(group: &str, plural: &str, storage_version: &str) -> String {
    format!("{group}_{plural}_{storage_version}.yaml")
}

/// CRDs-catalog location of the schema for `resource`, if it belongs to an
/// extension group.
#[must_use]
pub fn catalog_url(base_url: &str, resource: &ResourceRef) -> Option<String> {
    let group = resource.group().trim();
    let version = resource.version().trim();
    let kind = resource.kind.trim().to_ascii_lowercase();
    if group.is_empty() || version.is_empty() || kind.is_empty() || resource.is_builtin_group() {
        return None;
    }
    Some(format!(
        "{}/{group}/{kind}_{version}.json",
        base_url.trim_end_matches('/')
    ))
}

/// Retrieve a schema document. No retries.
pub fn fetch(url: &str) -> Result<String, SchemaError> {
    debug!(url, "fetching schema document");
    let resp = ureq::get(url).call().map_err(|source| SchemaError::Fetch {
        url: url.to_string(),
        source: Box::new(source),
    })?;
    let mut reader = resp.into_body().into_reader();
    let mut out = String::new();
    reader.read_to_string(&mut out)?;
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSchema {
    pub path: PathBuf,
    pub identity: SchemaIdentity,
    /// `false` when an existing file was kept.
    pub written: bool,
}

/// Store `src` in `dir` under its canonical file name.
///
/// The name is derived from the storage version of the first schema in the
/// document. An existing file is kept unless `overwrite` is set.
pub fn store_document(
    dir: &Path,
    src: &str,
    origin: &str,
    overwrite: bool,
) -> Result<StoredSchema, SchemaError> {
    let identities = document_identities(src, origin)?;
    let identity = identities
        .iter()
        .find(|id| id.storage)
        .or_else(|| identities.first())
        .cloned()
        .ok_or_else(|| SchemaError::NotASchema {
            origin: origin.to_string(),
        })?;

    let filename = canonical_filename(&identity.group, &identity.plural, &identity.version);
    let path = dir.join(filename);
    if path.exists() && !overwrite {
        debug!(path = %path.display(), "keeping existing schema file");
        return Ok(StoredSchema {
            path,
            identity,
            written: false,
        });
    }

    let contents = with_embedded_identity(src, &identity)?;
    std::fs::create_dir_all(dir)?;
    write_atomic(&path, contents.as_bytes())?;
    info!(path = %path.display(), kind = %identity.kind, "stored schema");
    Ok(StoredSchema {
        path,
        identity,
        written: true,
    })
}

fn has_embedded_identity(doc: &Value) -> bool {
    let at = |ptr: &str| doc.pointer(ptr).is_some();
    (at("/properties/apiVersion/enum/0") && at("/properties/kind/enum/0"))
        || at("/x-kubernetes-group-version-kind/0")
}

/// A bare schema whose identity came from its catalog location gets it
/// embedded, since the canonical file name drops that layout.
fn with_embedded_identity(src: &str, identity: &SchemaIdentity) -> Result<String, SchemaError> {
    let docs = parse_documents(src)?;
    let [doc] = docs.as_slice() else {
        return Ok(src.to_string());
    };
    if doc.get("kind").is_some() || has_embedded_identity(doc) {
        return Ok(src.to_string());
    }
    let mut doc = doc.clone();
    let Some(object) = doc.as_object_mut() else {
        return Ok(src.to_string());
    };
    object.insert(
        "x-kubernetes-group-version-kind".to_string(),
        json!([{
            "group": identity.group,
            "version": identity.version,
            "kind": identity.kind,
        }]),
    );
    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    Ok(out)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SchemaError> {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("yaml.tmp.{}.{}", std::process::id(), n));
    std::fs::write(&tmp, data)?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}
