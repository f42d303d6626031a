use helm_mapify_core::{FieldDescriptor, ResourceRef};

use crate::builtin::{BuiltinLookup, BuiltinSchema};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSource {
    Builtin,
    Extension,
}

/// Answer to "is this path on this resource a keyed list?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Keyed(FieldDescriptor),
    /// A list without a unique element key.
    NoKey { source: SchemaSource },
    NotList,
    NotFound { reason: String },
    /// The group/kind is loaded, but not at the requested version.
    VersionMismatch { available: Vec<String> },
    /// An extension resource with no schema loaded for its group/kind.
    MissingSchema,
}

impl Resolution {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Resolves dotted field paths against resource types.
pub trait SchemaResolver {
    fn resolve(&self, resource: &ResourceRef, path: &str) -> Resolution;
}

impl<T> SchemaResolver for &T
where
    T: SchemaResolver + ?Sized,
{
    fn resolve(&self, resource: &ResourceRef, path: &str) -> Resolution {
        (**self).resolve(resource, path)
    }
}

impl SchemaResolver for BuiltinSchema {
    fn resolve(&self, resource: &ResourceRef, path: &str) -> Resolution {
        if !resource.is_builtin_group() {
            return Resolution::NotFound {
                reason: format!("{} is not a built-in API group", resource.group()),
            };
        }
        match self.lookup(&resource.kind, path) {
            BuiltinLookup::UnknownKind => Resolution::NotFound {
                reason: format!("unknown built-in kind {}", resource.kind),
            },
            BuiltinLookup::FieldNotFound { segment } => Resolution::NotFound {
                reason: format!("{} has no field {segment:?} on path {path}", resource.kind),
            },
            BuiltinLookup::Field(field) if field.is_keyed() => Resolution::Keyed(field),
            BuiltinLookup::Field(field) if field.is_list => Resolution::NoKey {
                source: SchemaSource::Builtin,
            },
            BuiltinLookup::Field(_) => Resolution::NotList,
        }
    }
}

impl SchemaResolver for Registry {
    fn resolve(&self, resource: &ResourceRef, path: &str) -> Resolution {
        let api_version = if resource.api_version.trim().is_empty() {
            match self.find_by_kind(&resource.kind) {
                Some(v) => v,
                None => {
                    return Resolution::NotFound {
                        reason: format!("no apiVersion and no loaded schema for {}", resource.kind),
                    };
                }
            }
        } else {
            resource.api_version.trim().to_string()
        };

        if self.has_type(&api_version, &resource.kind) {
            if let Some(entry) = self.query(&api_version, &resource.kind, path) {
                return Resolution::Keyed(FieldDescriptor {
                    path: path.to_string(),
                    is_list: true,
                    element_type: entry.element_type.clone(),
                    merge_key: entry.merge_keys.first().cloned().unwrap_or_default(),
                });
            }
            if self.is_list_path(&api_version, &resource.kind, path) {
                return Resolution::NoKey {
                    source: SchemaSource::Extension,
                };
            }
            // Only list-typed paths are recorded, so an absent field and a
            // non-list field look the same here.
            return Resolution::NotList;
        }

        let resolved = ResourceRef::new(api_version, resource.kind.clone());
        if self.has_group_kind(resolved.group(), &resolved.kind) {
            return Resolution::VersionMismatch {
                available: self.available_versions(resolved.group(), &resolved.kind),
            };
        }
        if !resolved.is_builtin_group() {
            return Resolution::MissingSchema;
        }
        Resolution::NotFound {
            reason: format!("no schema for {resolved}"),
        }
    }
}

/// Tries `first`, falling back to `second` when `first` finds nothing.
#[derive(Debug, Clone)]
pub struct ChainResolver<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> SchemaResolver for ChainResolver<A, B>
where
    A: SchemaResolver,
    B: SchemaResolver,
{
    fn resolve(&self, resource: &ResourceRef, path: &str) -> Resolution {
        let first = self.first.resolve(resource, path);
        if !first.is_not_found() {
            return first;
        }
        let second = self.second.resolve(resource, path);
        if second.is_not_found() { first } else { second }
    }
}

/// Built-in table first, then the loaded extension schemas.
#[must_use]
pub fn chain(registry: &Registry) -> ChainResolver<BuiltinSchema, &Registry> {
    ChainResolver {
        first: BuiltinSchema,
        second: registry,
    }
}
