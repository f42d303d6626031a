use std::collections::{BTreeSet, HashSet};

use helm_mapify_core::ListKind;
use serde_json::Value;

/// Maximum `$ref` nesting followed while expanding a document.
pub const MAX_REF_DEPTH: usize = 64;

/// Convenience operations on OpenAPI v3 schema values.
pub trait JsonSchemaOps {
    /// Get the `type` field as a string.
    fn schema_type(&self) -> Option<&str>;

    /// Get the `items` schema of an array type.
    fn items_schema(&self) -> Option<&Value>;

    /// Whether `type` is (or, for type unions, includes) `ty`.
    fn is_type(&self, ty: &str) -> bool;

    /// Child schemas from `properties`, in document order.
    fn properties(&self) -> Vec<(&str, &Value)>;

    fn property_names(&self) -> BTreeSet<String>;

    /// `x-kubernetes-list-type`.
    fn list_kind(&self) -> Option<ListKind>;

    /// Unique element keys from `x-kubernetes-list-map-keys`, falling back to
    /// `x-kubernetes-patch-merge-key`.
    fn list_map_keys(&self) -> Vec<String>;
}

impl JsonSchemaOps for Value {
    fn schema_type(&self) -> Option<&str> {
        self.as_object()?.get("type")?.as_str()
    }

    fn items_schema(&self) -> Option<&Value> {
        self.as_object()?.get("items").filter(|v| v.is_object())
    }

    fn is_type(&self, ty: &str) -> bool {
        match self.as_object().and_then(|o| o.get("type")) {
            Some(Value::String(s)) => s == ty,
            Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(ty)),
            _ => false,
        }
    }

    fn properties(&self) -> Vec<(&str, &Value)> {
        self.as_object()
            .and_then(|o| o.get("properties"))
            .and_then(|p| p.as_object())
            .map(|p| p.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }

    fn property_names(&self) -> BTreeSet<String> {
        self.properties()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect()
    }

    fn list_kind(&self) -> Option<ListKind> {
        self.as_object()?
            .get("x-kubernetes-list-type")?
            .as_str()
            .and_then(ListKind::parse)
    }

    fn list_map_keys(&self) -> Vec<String> {
        let Some(obj) = self.as_object() else {
            return Vec::new();
        };
        let keys: Vec<String> = obj
            .get("x-kubernetes-list-map-keys")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if !keys.is_empty() {
            return keys;
        }
        obj.get("x-kubernetes-patch-merge-key")
            .and_then(|v| v.as_str())
            .map(|k| vec![k.to_string()])
            .unwrap_or_default()
    }
}

/// Whether the schema node describes a list.
#[must_use]
pub fn is_array(schema: &Value) -> bool {
    schema.is_type("array") || (schema.items_schema().is_some() && schema.schema_type().is_none())
}

/// Inline every local `$ref` (`#/...`) of `schema`, resolved against `root`.
///
/// Recursive references are cut at the first repetition and nesting is
/// bounded by [`MAX_REF_DEPTH`].
#[must_use]
pub fn expand_local_refs(
    root: &Value,
    schema: &Value,
    depth: usize,
    stack: &mut HashSet<String>,
) -> Value {
    if depth > MAX_REF_DEPTH {
        return schema.clone();
    }

    if let Some(r) = schema.get("$ref").and_then(|v| v.as_str()) {
        if stack.contains(r) {
            return strip_ref(schema);
        }
        stack.insert(r.to_string());

        let out = if let Some(ptr) = r.strip_prefix('#') {
            root.pointer(ptr).map_or_else(
                || strip_ref(schema),
                |target| expand_local_refs(root, target, depth + 1, stack),
            )
        } else {
            strip_ref(schema)
        };

        stack.remove(r);
        return out;
    }

    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = obj.clone();

    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(arr) = obj.get(keyword).and_then(|v| v.as_array()) {
            let expanded = arr
                .iter()
                .map(|v| expand_local_refs(root, v, depth + 1, stack))
                .collect();
            out.insert(keyword.to_string(), Value::Array(expanded));
        }
    }

    // `definitions` are only reached through `$ref`.
    if let Some(m) = obj.get("properties").and_then(|v| v.as_object()) {
        let expanded = m
            .iter()
            .map(|(k, v)| (k.clone(), expand_local_refs(root, v, depth + 1, stack)))
            .collect();
        out.insert("properties".to_string(), Value::Object(expanded));
    }

    for single_key in ["items", "additionalProperties"] {
        if let Some(v) = obj.get(single_key)
            && !v.is_boolean()
        {
            out.insert(
                single_key.to_string(),
                expand_local_refs(root, v, depth + 1, stack),
            );
        }
    }

    Value::Object(out)
}

/// Expand the whole document against itself.
#[must_use]
pub fn materialize(root: &Value) -> Value {
    let mut stack = HashSet::new();
    expand_local_refs(root, root, 0, &mut stack)
}

fn strip_ref(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };
    let mut out = obj.clone();
    out.remove("$ref");
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_nested_refs() {
        let doc = json!({
            "type": "object",
            "properties": {"spec": {"$ref": "#/definitions/Spec"}},
            "definitions": {
                "Spec": {
                    "type": "object",
                    "properties": {
                        "items": {"type": "array", "items": {"$ref": "#/definitions/Item"}}
                    }
                },
                "Item": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        });
        let out = materialize(&doc);
        similar_asserts::assert_eq!(
            out.pointer("/properties/spec/properties/items/items"),
            Some(&json!({"type": "object", "properties": {"name": {"type": "string"}}}))
        );
    }

    #[test]
    fn recursive_ref_is_cut() {
        let doc = json!({
            "properties": {"node": {"$ref": "#/definitions/Node"}},
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {"child": {"$ref": "#/definitions/Node"}}
                }
            }
        });
        let out = materialize(&doc);
        similar_asserts::assert_eq!(
            out.pointer("/properties/node/properties/child"),
            Some(&json!({}))
        );
    }

    #[test]
    fn list_annotations() {
        let schema = json!({
            "type": "array",
            "x-kubernetes-list-type": "map",
            "x-kubernetes-list-map-keys": ["name", "protocol"],
            "items": {"type": "object"}
        });
        assert!(is_array(&schema));
        assert_eq!(schema.list_kind(), Some(ListKind::Map));
        assert_eq!(schema.list_map_keys(), vec!["name", "protocol"]);

        let patch = json!({"type": "array", "x-kubernetes-patch-merge-key": "ip"});
        assert_eq!(patch.list_map_keys(), vec!["ip"]);
    }

    #[test]
    fn type_unions() {
        let schema = json!({"type": ["array", "null"], "items": {}});
        assert!(schema.is_type("array"));
        assert!(is_array(&schema));
        assert!(!is_array(&json!({"type": "object"})));
    }
}
