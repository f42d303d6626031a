use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use helm_mapify_core::{ExtensionSchemaEntry, ListKind, ResourceRef};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::SchemaError;
use crate::heuristic;
use crate::navigate::{JsonSchemaOps, is_array, materialize};

const SCHEMA_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// One served version of a resource kind, as declared by a schema document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIdentity {
    pub group: String,
    pub kind: String,
    pub plural: String,
    pub version: String,
    pub storage: bool,
}

impl SchemaIdentity {
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct KnownType {
    kind: String,
    api_versions: BTreeSet<String>,
}

/// Extension (CRD) schemas loaded for one pipeline run.
///
/// Kinds are matched case-insensitively, since the CRDs-catalog layout only
/// carries the lowercased kind in file names.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// `apiVersion/kind` -> convertible list fields.
    entries: BTreeMap<String, Vec<ExtensionSchemaEntry>>,
    /// `group/kind` -> every loaded version.
    versions: BTreeMap<String, KnownType>,
    /// `apiVersion/kind` -> every list-typed path, keyed or not.
    list_paths: BTreeMap<String, BTreeSet<String>>,
}

fn type_key(api_version: &str, kind: &str) -> String {
    format!("{}/{}", api_version.trim(), kind.trim().to_ascii_lowercase())
}

fn group_kind_key(group: &str, kind: &str) -> String {
    format!("{}/{}", group.trim(), kind.trim().to_ascii_lowercase())
}

fn group_of(api_version: &str) -> &str {
    api_version.split_once('/').map_or("", |(group, _)| group)
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.versions.clear();
        self.list_paths.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Load a schema file, or every `*.yaml|*.yml|*.json` below a directory.
    ///
    /// Inside a directory, files that fail to load are logged and skipped.
    /// Returns the number of resource versions loaded.
    pub fn load_path(&mut self, path: &Path) -> Result<usize, SchemaError> {
        if !path.is_dir() {
            return self.load_file(path);
        }

        let mut loaded = 0;
        for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_schema_file = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SCHEMA_EXTENSIONS.contains(&e));
            if !is_schema_file {
                continue;
            }
            match self.load_file(entry.path()) {
                Ok(n) => loaded += n,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping schema file");
                }
            }
        }
        Ok(loaded)
    }

    fn load_file(&mut self, path: &Path) -> Result<usize, SchemaError> {
        let src = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_document(&src, &path.to_string_lossy())
    }

    /// Load every schema declared in `src`.
    ///
    /// `origin` names the document for diagnostics and, for bare schemas
    /// without an embedded identity, supplies `group/kind_version` through
    /// its last two path components.
    pub fn load_document(&mut self, src: &str, origin: &str) -> Result<usize, SchemaError> {
        let mut loaded = 0;
        for doc in parse_documents(src)? {
            for (identity, schema) in schema_versions(&doc, origin) {
                self.load_version(&identity, schema);
                loaded += 1;
            }
        }
        if loaded == 0 {
            return Err(SchemaError::NotASchema {
                origin: origin.to_string(),
            });
        }
        debug!(origin, loaded, "loaded schema document");
        Ok(loaded)
    }

    fn load_version(&mut self, identity: &SchemaIdentity, schema: &Value) {
        let api_version = identity.api_version();
        let known = self
            .versions
            .entry(group_kind_key(&identity.group, &identity.kind))
            .or_default();
        if known.kind.is_empty() || known.kind.chars().all(|c| !c.is_uppercase()) {
            known.kind.clone_from(&identity.kind);
        }
        known.api_versions.insert(api_version.clone());

        let root = materialize(schema);
        let mut walker = Walker {
            api_version: &api_version,
            kind: &identity.kind,
            entries: Vec::new(),
            list_paths: BTreeSet::new(),
        };
        walker.walk(&root, "");
        let Walker {
            entries: found,
            list_paths: found_lists,
            ..
        } = walker;

        let key = type_key(&api_version, &identity.kind);
        self.list_paths
            .entry(key.clone())
            .or_default()
            .extend(found_lists);
        let entries = self.entries.entry(key).or_default();
        for entry in found {
            if entries.iter().any(|e| e.path == entry.path) {
                continue;
            }
            entries.push(entry);
        }
    }

    /// Convertible list entry at `path`, if any.
    #[must_use]
    pub fn query(&self, api_version: &str, kind: &str, path: &str) -> Option<&ExtensionSchemaEntry> {
        self.entries
            .get(&type_key(api_version, kind))?
            .iter()
            .find(|e| e.path == path)
    }

    /// Whether a schema for exactly this `apiVersion` and kind is loaded.
    #[must_use]
    pub fn has_type(&self, api_version: &str, kind: &str) -> bool {
        self.versions
            .get(&group_kind_key(group_of(api_version), kind))
            .is_some_and(|known| known.api_versions.contains(api_version.trim()))
    }

    /// Whether any version of the group/kind is loaded.
    #[must_use]
    pub fn has_group_kind(&self, group: &str, kind: &str) -> bool {
        self.versions.contains_key(&group_kind_key(group, kind))
    }

    #[must_use]
    pub fn available_versions(&self, group: &str, kind: &str) -> Vec<String> {
        self.versions
            .get(&group_kind_key(group, kind))
            .map(|known| known.api_versions.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_list_path(&self, api_version: &str, kind: &str, path: &str) -> bool {
        self.list_paths
            .get(&type_key(api_version, kind))
            .is_some_and(|paths| paths.contains(path))
    }

    /// First loaded `apiVersion` for a kind, regardless of group.
    #[must_use]
    pub fn find_by_kind(&self, kind: &str) -> Option<String> {
        let kind = kind.trim().to_ascii_lowercase();
        self.versions
            .iter()
            .find(|(key, _)| key.rsplit_once('/').is_some_and(|(_, k)| k == kind))
            .and_then(|(_, known)| known.api_versions.iter().next().cloned())
    }

    /// Every loaded `apiVersion`/kind pair.
    #[must_use]
    pub fn known_types(&self) -> Vec<ResourceRef> {
        self.versions
            .values()
            .flat_map(|known| {
                known
                    .api_versions
                    .iter()
                    .map(|v| ResourceRef::new(v.clone(), known.kind.clone()))
            })
            .collect()
    }
}

struct Walker<'a> {
    api_version: &'a str,
    kind: &'a str,
    entries: Vec<ExtensionSchemaEntry>,
    list_paths: BTreeSet<String>,
}

impl Walker<'_> {
    fn walk(&mut self, schema: &Value, path: &str) {
        if is_array(schema) && !path.is_empty() {
            self.list_paths.insert(path.to_string());
            if let Some(entry) = self.list_entry(schema, path) {
                self.entries.push(entry);
            }
            if let Some(items) = schema.items_schema() {
                self.walk(items, path);
            }
        }

        for (name, child) in schema.properties() {
            let child_path = if path.is_empty() {
                name.to_string()
            } else {
                format!("{path}.{name}")
            };
            self.walk(child, &child_path);
        }

        for keyword in ["allOf", "anyOf", "oneOf"] {
            if let Some(branches) = schema.get(keyword).and_then(|v| v.as_array()) {
                for branch in branches {
                    self.walk(branch, path);
                }
            }
        }
    }

    fn list_entry(&self, schema: &Value, path: &str) -> Option<ExtensionSchemaEntry> {
        let keys = schema.list_map_keys();
        if !keys.is_empty() {
            return Some(self.entry(path, keys, "object", false));
        }
        // Declared set/atomic lists, and maps without keys, are never keyed.
        if schema.list_kind().is_some() {
            return None;
        }
        let items = schema.items_schema()?;
        let found = heuristic::match_element(&items.property_names())?;
        debug!(
            path,
            kind = self.kind,
            element = found.signature.name,
            score = found.score,
            "heuristic element match"
        );
        Some(self.entry(
            path,
            vec![found.signature.merge_key.to_string()],
            found.signature.name,
            true,
        ))
    }

    fn entry(
        &self,
        path: &str,
        merge_keys: Vec<String>,
        element_type: &str,
        is_heuristic_match: bool,
    ) -> ExtensionSchemaEntry {
        ExtensionSchemaEntry {
            path: path.to_string(),
            list_kind: ListKind::Map,
            merge_keys,
            api_version: self.api_version.to_string(),
            kind: self.kind.to_string(),
            element_type: element_type.to_string(),
            is_heuristic_match,
        }
    }
}

/// Parse a (possibly multi-document) YAML or JSON source, skipping empty
/// documents.
pub fn parse_documents(src: &str) -> Result<Vec<Value>, SchemaError> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(src) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

/// Identities declared by the schemas in `src`, without loading them.
pub fn document_identities(src: &str, origin: &str) -> Result<Vec<SchemaIdentity>, SchemaError> {
    Ok(parse_documents(src)?
        .iter()
        .flat_map(|doc| {
            schema_versions(doc, origin)
                .into_iter()
                .map(|(id, _)| id)
                .collect::<Vec<_>>()
        })
        .collect())
}

fn schema_versions<'a>(doc: &'a Value, origin: &str) -> Vec<(SchemaIdentity, &'a Value)> {
    match doc.get("kind").and_then(|k| k.as_str()) {
        Some("CustomResourceDefinition") => crd_versions(doc),
        Some("List" | "CustomResourceDefinitionList") => doc
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().flat_map(crd_versions).collect())
            .unwrap_or_default(),
        _ if looks_like_schema(doc) => bare_schema_identity(doc, origin)
            .map(|id| vec![(id, doc)])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn crd_versions(doc: &Value) -> Vec<(SchemaIdentity, &Value)> {
    if doc.get("kind").and_then(|k| k.as_str()) != Some("CustomResourceDefinition") {
        return Vec::new();
    }
    let Some(spec) = doc.get("spec") else {
        return Vec::new();
    };
    let str_at = |ptr: &str| spec.pointer(ptr).and_then(|v| v.as_str()).unwrap_or("");
    let group = str_at("/group").to_string();
    let kind = str_at("/names/kind").to_string();
    if kind.is_empty() {
        return Vec::new();
    }
    let plural = match str_at("/names/plural") {
        "" => format!("{}s", kind.to_ascii_lowercase()),
        p => p.to_string(),
    };
    let legacy_schema = spec.pointer("/validation/openAPIV3Schema");

    let mut out = Vec::new();
    if let Some(versions) = spec.get("versions").and_then(|v| v.as_array()) {
        for version in versions {
            let Some(name) = version.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(schema) = version
                .pointer("/schema/openAPIV3Schema")
                .or(legacy_schema)
            else {
                continue;
            };
            out.push((
                SchemaIdentity {
                    group: group.clone(),
                    kind: kind.clone(),
                    plural: plural.clone(),
                    version: name.to_string(),
                    storage: version
                        .get("storage")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                },
                schema,
            ));
        }
    } else if let (Some(version), Some(schema)) =
        (spec.get("version").and_then(|v| v.as_str()), legacy_schema)
    {
        out.push((
            SchemaIdentity {
                group,
                kind,
                plural,
                version: version.to_string(),
                storage: true,
            },
            schema,
        ));
    }
    out
}

fn looks_like_schema(doc: &Value) -> bool {
    doc.get("properties").is_some_and(Value::is_object) || doc.is_type("object")
}

fn bare_schema_identity(doc: &Value, origin: &str) -> Option<SchemaIdentity> {
    let enum_value = |prop: &str| {
        doc.pointer(&format!("/properties/{prop}/enum/0"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
    };

    let (group, version, kind) = if let (Some(api_version), Some(kind)) =
        (enum_value("apiVersion"), enum_value("kind"))
    {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version),
        };
        (group, version, kind)
    } else if let Some(gvk) = doc.pointer("/x-kubernetes-group-version-kind/0") {
        let field = |name: &str| gvk.get(name).and_then(|v| v.as_str()).unwrap_or("");
        (
            field("group").to_string(),
            field("version").to_string(),
            field("kind").to_string(),
        )
    } else {
        // CRDs-catalog layout: `<group>/<kind>_<version>.json`.
        let path = Path::new(origin);
        let stem = path.file_stem()?.to_str()?;
        let (kind, version) = stem.rsplit_once('_')?;
        let group = path.parent()?.file_name()?.to_str()?;
        (group.to_string(), version.to_string(), kind.to_string())
    };

    if kind.is_empty() || version.is_empty() {
        return None;
    }
    Some(SchemaIdentity {
        plural: format!("{}s", kind.to_ascii_lowercase()),
        group,
        kind,
        version,
        storage: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_schema_identity_from_enum() {
        let doc = json!({
            "type": "object",
            "properties": {
                "apiVersion": {"type": "string", "enum": ["acme.io/v2"]},
                "kind": {"type": "string", "enum": ["Widget"]}
            }
        });
        let id = bare_schema_identity(&doc, "whatever.json").expect("identity");
        assert_eq!(id.api_version(), "acme.io/v2");
        assert_eq!(id.kind, "Widget");
    }

    #[test]
    fn bare_schema_identity_from_catalog_layout() {
        let doc = json!({"type": "object", "properties": {}});
        let id = bare_schema_identity(&doc, "/cache/monitoring.coreos.com/servicemonitor_v1.json")
            .expect("identity");
        assert_eq!(id.group, "monitoring.coreos.com");
        assert_eq!(id.kind, "servicemonitor");
        assert_eq!(id.version, "v1");
    }

    #[test]
    fn non_schema_documents_are_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .load_document("apiVersion: v1\nkind: ConfigMap\ndata:\n  a: b\n", "cm.yaml")
            .expect_err("not a schema");
        assert!(matches!(err, SchemaError::NotASchema { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn kinds_match_case_insensitively() {
        let mut registry = Registry::new();
        let doc = r#"{"type": "object", "properties": {"spec": {"type": "object", "properties": {
            "targets": {"type": "array", "x-kubernetes-list-map-keys": ["id"],
                        "items": {"type": "object", "properties": {"id": {"type": "string"}}}}}}}}"#;
        registry
            .load_document(doc, "acme.io/widget_v1.json")
            .expect("load");
        assert!(registry.has_type("acme.io/v1", "Widget"));
        assert_eq!(
            registry
                .query("acme.io/v1", "Widget", "spec.targets")
                .map(|e| e.merge_keys.clone()),
            Some(vec!["id".to_string()])
        );
        assert_eq!(registry.find_by_kind("WIDGET").as_deref(), Some("acme.io/v1"));
    }
}
