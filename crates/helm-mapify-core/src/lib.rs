use serde::{Deserialize, Serialize};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Other: {0}")]
    Other(String),
}

/// Kubernetes resource type (apiVersion + kind) declared by a template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
}

impl ResourceRef {
    #[must_use]
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// API group, empty for the core group (`v1`).
    #[must_use]
    pub fn group(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((_, version)) => version,
            None => &self.api_version,
        }
    }

    /// Whether the group is served by the platform itself rather than a CRD.
    #[must_use]
    pub fn is_builtin_group(&self) -> bool {
        let group = self.group().to_ascii_lowercase();
        group.is_empty()
            || matches!(
                group.as_str(),
                "apps" | "batch" | "autoscaling" | "policy" | "extensions"
            )
            || group.ends_with(".k8s.io")
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.api_version.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}/{}", self.api_version, self.kind)
        }
    }
}

/// Result of resolving a dotted path against a resource type.
///
/// An empty `merge_key` on a list means the list has no unique key and
/// cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub path: String,
    pub is_list: bool,
    pub element_type: String,
    pub merge_key: String,
}

impl FieldDescriptor {
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.is_list && !self.merge_key.is_empty()
    }
}

/// List semantics declared by `x-kubernetes-list-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Map,
    Set,
    Atomic,
}

impl ListKind {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "map" => Some(Self::Map),
            "set" => Some(Self::Set),
            "atomic" => Some(Self::Atomic),
            _ => None,
        }
    }
}

/// A list field recorded from an extension (CRD) schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSchemaEntry {
    pub path: String,
    pub list_kind: ListKind,
    pub merge_keys: Vec<String>,
    pub api_version: String,
    pub kind: String,
    /// Matched catalog type for heuristic entries, `object` otherwise.
    pub element_type: String,
    pub is_heuristic_match: bool,
}

/// A values path confirmed convertible from list to map form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedCandidate {
    pub values_path: String,
    pub yaml_path: String,
    pub merge_key: String,
    pub element_type: String,
    pub section_name: String,
    pub resource: Option<ResourceRef>,
    pub source_file: String,
    pub exists_in_values: bool,
    /// Field a bare scalar map value stands for, from a matching override rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promote_scalar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndetectedCategory {
    CrdNoKeys,
    K8sNoKeys,
    MissingSchema,
    UnknownType,
}

impl UndetectedCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrdNoKeys => "crd_no_keys",
            Self::K8sNoKeys => "k8s_no_keys",
            Self::MissingSchema => "missing_schema",
            Self::UnknownType => "unknown_type",
        }
    }
}

impl std::fmt::Display for UndetectedCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list-shaped usage that could not be converted automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndetectedUsage {
    pub values_path: String,
    pub source_file: String,
    pub line: usize,
    pub category: UndetectedCategory,
    pub reason: String,
    pub suggested_override: String,
}

/// User-declared conversion rule, matched against `values.path[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub path_pattern: String,
    pub unique_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promote_scalar: Option<String>,
}

impl OverrideRule {
    #[must_use]
    pub fn merge_key(&self) -> Option<&str> {
        self.unique_keys.first().map(String::as_str)
    }
}

/// The `rules add` invocation that would make `values_path` convertible.
#[must_use]
pub fn suggested_override(values_path: &str, merge_key: Option<&str>) -> String {
    let key = merge_key.unwrap_or("<key>");
    format!("helm-mapify rules add '{values_path}[]' --key {key}")
}

/// Split a dotted path into non-empty segments.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_group_and_version() {
        let r = ResourceRef::new("monitoring.coreos.com/v1", "ServiceMonitor");
        assert_eq!(r.group(), "monitoring.coreos.com");
        assert_eq!(r.version(), "v1");
        assert!(!r.is_builtin_group());

        let core = ResourceRef::new("v1", "Service");
        assert_eq!(core.group(), "");
        assert_eq!(core.version(), "v1");
        assert!(core.is_builtin_group());
        assert!(ResourceRef::new("networking.k8s.io/v1", "Ingress").is_builtin_group());
    }

    #[test]
    fn undetected_category_serializes_snake_case() -> Result<()> {
        let json = serde_json::to_string(&UndetectedCategory::CrdNoKeys)?;
        assert_eq!(json, "\"crd_no_keys\"");
        Ok(())
    }

    #[test]
    fn suggested_override_mentions_path() {
        assert_eq!(
            suggested_override("app.env", Some("name")),
            "helm-mapify rules add 'app.env[]' --key name"
        );
    }
}
