//! Static description of the built-in Kubernetes types relevant to list
//! merge keys.
//!
//! Each type lists its fields with a shape; list fields either carry their
//! merge key inline or have it resolved through [`strategic_merge_key`], which
//! mirrors the `patchMergeKey` metadata of the upstream API types.

use helm_mapify_core::{FieldDescriptor, split_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    /// Free-form string-keyed map (labels, selectors, opaque sub-objects).
    Map,
    Object(&'static str),
    /// List of the named element type; `"string"` for scalar lists.
    List(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub shape: Shape,
    pub merge_key: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct TypeDef {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl TypeDef {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

const fn scalar(name: &'static str) -> FieldDef {
    FieldDef {
        name,
        shape: Shape::Scalar,
        merge_key: None,
    }
}

const fn map(name: &'static str) -> FieldDef {
    FieldDef {
        name,
        shape: Shape::Map,
        merge_key: None,
    }
}

const fn object(name: &'static str, ty: &'static str) -> FieldDef {
    FieldDef {
        name,
        shape: Shape::Object(ty),
        merge_key: None,
    }
}

const fn list(name: &'static str, elem: &'static str) -> FieldDef {
    FieldDef {
        name,
        shape: Shape::List(elem),
        merge_key: None,
    }
}

const fn keyed(name: &'static str, elem: &'static str, key: &'static str) -> FieldDef {
    FieldDef {
        name,
        shape: Shape::List(elem),
        merge_key: Some(key),
    }
}

const fn strings(name: &'static str) -> FieldDef {
    list(name, "string")
}

static TYPES: &[TypeDef] = &[
    TypeDef {
        name: "ObjectMeta",
        fields: &[
            scalar("name"),
            scalar("generateName"),
            scalar("namespace"),
            map("labels"),
            map("annotations"),
            strings("finalizers"),
            list("ownerReferences", "OwnerReference"),
        ],
    },
    TypeDef {
        name: "OwnerReference",
        fields: &[
            scalar("apiVersion"),
            scalar("kind"),
            scalar("name"),
            scalar("uid"),
            scalar("controller"),
            scalar("blockOwnerDeletion"),
        ],
    },
    TypeDef {
        name: "PodTemplateSpec",
        fields: &[object("metadata", "ObjectMeta"), object("spec", "PodSpec")],
    },
    TypeDef {
        name: "PodSpec",
        fields: &[
            keyed("containers", "Container", "name"),
            keyed("initContainers", "Container", "name"),
            list("ephemeralContainers", "Container"),
            list("volumes", "Volume"),
            list("imagePullSecrets", "LocalObjectReference"),
            list("hostAliases", "HostAlias"),
            list("tolerations", "Toleration"),
            list("topologySpreadConstraints", "TopologySpreadConstraint"),
            list("readinessGates", "PodReadinessGate"),
            list("resourceClaims", "PodResourceClaim"),
            list("schedulingGates", "PodSchedulingGate"),
            object("dnsConfig", "PodDNSConfig"),
            map("affinity"),
            map("securityContext"),
            map("nodeSelector"),
            map("overhead"),
            scalar("serviceAccountName"),
            scalar("automountServiceAccountToken"),
            scalar("restartPolicy"),
            scalar("terminationGracePeriodSeconds"),
            scalar("activeDeadlineSeconds"),
            scalar("dnsPolicy"),
            scalar("nodeName"),
            scalar("hostNetwork"),
            scalar("hostPID"),
            scalar("hostIPC"),
            scalar("shareProcessNamespace"),
            scalar("hostname"),
            scalar("subdomain"),
            scalar("schedulerName"),
            scalar("priorityClassName"),
            scalar("priority"),
            scalar("runtimeClassName"),
            scalar("enableServiceLinks"),
            scalar("preemptionPolicy"),
            scalar("hostUsers"),
        ],
    },
    TypeDef {
        name: "Container",
        fields: &[
            scalar("name"),
            scalar("image"),
            scalar("imagePullPolicy"),
            strings("command"),
            strings("args"),
            scalar("workingDir"),
            keyed("ports", "ContainerPort", "containerPort"),
            keyed("env", "EnvVar", "name"),
            list("envFrom", "EnvFromSource"),
            map("resources"),
            list("resizePolicy", "ContainerResizePolicy"),
            keyed("volumeMounts", "VolumeMount", "mountPath"),
            keyed("volumeDevices", "VolumeDevice", "devicePath"),
            map("livenessProbe"),
            map("readinessProbe"),
            map("startupProbe"),
            map("lifecycle"),
            map("securityContext"),
            scalar("terminationMessagePath"),
            scalar("terminationMessagePolicy"),
            scalar("restartPolicy"),
            scalar("stdin"),
            scalar("stdinOnce"),
            scalar("tty"),
        ],
    },
    TypeDef {
        name: "ContainerPort",
        fields: &[
            scalar("name"),
            scalar("hostPort"),
            scalar("containerPort"),
            scalar("protocol"),
            scalar("hostIP"),
        ],
    },
    TypeDef {
        name: "ContainerResizePolicy",
        fields: &[scalar("resourceName"), scalar("restartPolicy")],
    },
    TypeDef {
        name: "EnvVar",
        fields: &[scalar("name"), scalar("value"), map("valueFrom")],
    },
    TypeDef {
        name: "EnvFromSource",
        fields: &[scalar("prefix"), map("configMapRef"), map("secretRef")],
    },
    TypeDef {
        name: "VolumeMount",
        fields: &[
            scalar("name"),
            scalar("readOnly"),
            scalar("recursiveReadOnly"),
            scalar("mountPath"),
            scalar("subPath"),
            scalar("mountPropagation"),
            scalar("subPathExpr"),
        ],
    },
    TypeDef {
        name: "VolumeDevice",
        fields: &[scalar("name"), scalar("devicePath")],
    },
    TypeDef {
        name: "Volume",
        fields: &[
            scalar("name"),
            object("configMap", "ConfigMapVolumeSource"),
            object("secret", "SecretVolumeSource"),
            object("projected", "ProjectedVolumeSource"),
            map("emptyDir"),
            map("hostPath"),
            map("persistentVolumeClaim"),
            map("downwardAPI"),
            map("csi"),
            map("nfs"),
            map("ephemeral"),
            map("image"),
        ],
    },
    TypeDef {
        name: "ConfigMapVolumeSource",
        fields: &[
            scalar("name"),
            list("items", "KeyToPath"),
            scalar("defaultMode"),
            scalar("optional"),
        ],
    },
    TypeDef {
        name: "SecretVolumeSource",
        fields: &[
            scalar("secretName"),
            list("items", "KeyToPath"),
            scalar("defaultMode"),
            scalar("optional"),
        ],
    },
    TypeDef {
        name: "ProjectedVolumeSource",
        fields: &[list("sources", "VolumeProjection"), scalar("defaultMode")],
    },
    TypeDef {
        name: "VolumeProjection",
        fields: &[
            map("secret"),
            map("configMap"),
            map("downwardAPI"),
            map("serviceAccountToken"),
            map("clusterTrustBundle"),
        ],
    },
    TypeDef {
        name: "KeyToPath",
        fields: &[scalar("key"), scalar("path"), scalar("mode")],
    },
    TypeDef {
        name: "LocalObjectReference",
        fields: &[scalar("name")],
    },
    TypeDef {
        name: "ObjectReference",
        fields: &[
            scalar("kind"),
            scalar("namespace"),
            scalar("name"),
            scalar("uid"),
            scalar("apiVersion"),
            scalar("resourceVersion"),
            scalar("fieldPath"),
        ],
    },
    TypeDef {
        name: "HostAlias",
        fields: &[scalar("ip"), strings("hostnames")],
    },
    TypeDef {
        name: "Toleration",
        fields: &[
            scalar("key"),
            scalar("operator"),
            scalar("value"),
            scalar("effect"),
            scalar("tolerationSeconds"),
        ],
    },
    TypeDef {
        name: "TopologySpreadConstraint",
        fields: &[
            scalar("maxSkew"),
            scalar("topologyKey"),
            scalar("whenUnsatisfiable"),
            map("labelSelector"),
            scalar("minDomains"),
            scalar("nodeAffinityPolicy"),
            scalar("nodeTaintsPolicy"),
            strings("matchLabelKeys"),
        ],
    },
    TypeDef {
        name: "PodReadinessGate",
        fields: &[scalar("conditionType")],
    },
    TypeDef {
        name: "PodResourceClaim",
        fields: &[
            scalar("name"),
            scalar("resourceClaimName"),
            scalar("resourceClaimTemplateName"),
        ],
    },
    TypeDef {
        name: "PodSchedulingGate",
        fields: &[scalar("name")],
    },
    TypeDef {
        name: "PodDNSConfig",
        fields: &[
            strings("nameservers"),
            strings("searches"),
            list("options", "PodDNSConfigOption"),
        ],
    },
    TypeDef {
        name: "PodDNSConfigOption",
        fields: &[scalar("name"), scalar("value")],
    },
    TypeDef {
        name: "DeploymentSpec",
        fields: &[
            scalar("replicas"),
            map("selector"),
            object("template", "PodTemplateSpec"),
            map("strategy"),
            scalar("minReadySeconds"),
            scalar("revisionHistoryLimit"),
            scalar("paused"),
            scalar("progressDeadlineSeconds"),
        ],
    },
    TypeDef {
        name: "StatefulSetSpec",
        fields: &[
            scalar("replicas"),
            map("selector"),
            object("template", "PodTemplateSpec"),
            list("volumeClaimTemplates", "PersistentVolumeClaim"),
            scalar("serviceName"),
            scalar("podManagementPolicy"),
            map("updateStrategy"),
            scalar("revisionHistoryLimit"),
            scalar("minReadySeconds"),
            map("persistentVolumeClaimRetentionPolicy"),
            map("ordinals"),
        ],
    },
    TypeDef {
        name: "DaemonSetSpec",
        fields: &[
            map("selector"),
            object("template", "PodTemplateSpec"),
            map("updateStrategy"),
            scalar("minReadySeconds"),
            scalar("revisionHistoryLimit"),
        ],
    },
    TypeDef {
        name: "ReplicaSetSpec",
        fields: &[
            scalar("replicas"),
            scalar("minReadySeconds"),
            map("selector"),
            object("template", "PodTemplateSpec"),
        ],
    },
    TypeDef {
        name: "JobSpec",
        fields: &[
            scalar("parallelism"),
            scalar("completions"),
            scalar("activeDeadlineSeconds"),
            map("podFailurePolicy"),
            map("successPolicy"),
            scalar("backoffLimit"),
            scalar("backoffLimitPerIndex"),
            scalar("maxFailedIndexes"),
            map("selector"),
            scalar("manualSelector"),
            object("template", "PodTemplateSpec"),
            scalar("ttlSecondsAfterFinished"),
            scalar("completionMode"),
            scalar("suspend"),
            scalar("podReplacementPolicy"),
            scalar("managedBy"),
        ],
    },
    TypeDef {
        name: "JobTemplateSpec",
        fields: &[object("metadata", "ObjectMeta"), object("spec", "JobSpec")],
    },
    TypeDef {
        name: "CronJobSpec",
        fields: &[
            scalar("schedule"),
            scalar("timeZone"),
            scalar("startingDeadlineSeconds"),
            scalar("concurrencyPolicy"),
            scalar("suspend"),
            object("jobTemplate", "JobTemplateSpec"),
            scalar("successfulJobsHistoryLimit"),
            scalar("failedJobsHistoryLimit"),
        ],
    },
    TypeDef {
        name: "ServiceSpec",
        fields: &[
            list("ports", "ServicePort"),
            map("selector"),
            scalar("clusterIP"),
            strings("clusterIPs"),
            scalar("type"),
            strings("externalIPs"),
            scalar("sessionAffinity"),
            scalar("loadBalancerIP"),
            strings("loadBalancerSourceRanges"),
            scalar("externalName"),
            scalar("externalTrafficPolicy"),
            scalar("healthCheckNodePort"),
            scalar("publishNotReadyAddresses"),
            map("sessionAffinityConfig"),
            strings("ipFamilies"),
            scalar("ipFamilyPolicy"),
            scalar("allocateLoadBalancerNodePorts"),
            scalar("loadBalancerClass"),
            scalar("internalTrafficPolicy"),
            scalar("trafficDistribution"),
        ],
    },
    TypeDef {
        name: "ServicePort",
        fields: &[
            scalar("name"),
            scalar("protocol"),
            scalar("appProtocol"),
            scalar("port"),
            scalar("targetPort"),
            scalar("nodePort"),
        ],
    },
    TypeDef {
        name: "IngressSpec",
        fields: &[
            scalar("ingressClassName"),
            map("defaultBackend"),
            list("tls", "IngressTLS"),
            list("rules", "IngressRule"),
        ],
    },
    TypeDef {
        name: "IngressTLS",
        fields: &[strings("hosts"), scalar("secretName")],
    },
    TypeDef {
        name: "IngressRule",
        fields: &[scalar("host"), object("http", "HTTPIngressRuleValue")],
    },
    TypeDef {
        name: "HTTPIngressRuleValue",
        fields: &[list("paths", "HTTPIngressPath")],
    },
    TypeDef {
        name: "HTTPIngressPath",
        fields: &[scalar("path"), scalar("pathType"), map("backend")],
    },
    TypeDef {
        name: "NetworkPolicySpec",
        fields: &[
            map("podSelector"),
            list("ingress", "NetworkPolicyIngressRule"),
            list("egress", "NetworkPolicyEgressRule"),
            strings("policyTypes"),
        ],
    },
    TypeDef {
        name: "NetworkPolicyIngressRule",
        fields: &[
            list("ports", "NetworkPolicyPort"),
            list("from", "NetworkPolicyPeer"),
        ],
    },
    TypeDef {
        name: "NetworkPolicyEgressRule",
        fields: &[
            list("ports", "NetworkPolicyPort"),
            list("to", "NetworkPolicyPeer"),
        ],
    },
    TypeDef {
        name: "NetworkPolicyPort",
        fields: &[scalar("protocol"), scalar("port"), scalar("endPort")],
    },
    TypeDef {
        name: "NetworkPolicyPeer",
        fields: &[map("podSelector"), map("namespaceSelector"), map("ipBlock")],
    },
    TypeDef {
        name: "PersistentVolumeClaim",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "PersistentVolumeClaimSpec"),
        ],
    },
    TypeDef {
        name: "PersistentVolumeClaimSpec",
        fields: &[
            strings("accessModes"),
            map("selector"),
            map("resources"),
            scalar("volumeName"),
            scalar("storageClassName"),
            scalar("volumeMode"),
            map("dataSource"),
            map("dataSourceRef"),
            scalar("volumeAttributesClassName"),
        ],
    },
    TypeDef {
        name: "HorizontalPodAutoscalerSpec",
        fields: &[
            map("scaleTargetRef"),
            scalar("minReplicas"),
            scalar("maxReplicas"),
            list("metrics", "MetricSpec"),
            map("behavior"),
        ],
    },
    TypeDef {
        name: "MetricSpec",
        fields: &[
            scalar("type"),
            map("object"),
            map("pods"),
            map("resource"),
            map("containerResource"),
            map("external"),
        ],
    },
    TypeDef {
        name: "PodDisruptionBudgetSpec",
        fields: &[
            scalar("minAvailable"),
            map("selector"),
            scalar("maxUnavailable"),
            scalar("unhealthyPodEvictionPolicy"),
        ],
    },
    TypeDef {
        name: "PolicyRule",
        fields: &[
            strings("verbs"),
            strings("apiGroups"),
            strings("resources"),
            strings("resourceNames"),
            strings("nonResourceURLs"),
        ],
    },
    TypeDef {
        name: "Subject",
        fields: &[
            scalar("kind"),
            scalar("apiGroup"),
            scalar("name"),
            scalar("namespace"),
        ],
    },
    TypeDef {
        name: "RoleRef",
        fields: &[scalar("apiGroup"), scalar("kind"), scalar("name")],
    },
    // Resource roots.
    TypeDef {
        name: "Pod",
        fields: &[object("metadata", "ObjectMeta"), object("spec", "PodSpec")],
    },
    TypeDef {
        name: "Deployment",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "DeploymentSpec"),
        ],
    },
    TypeDef {
        name: "StatefulSet",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "StatefulSetSpec"),
        ],
    },
    TypeDef {
        name: "DaemonSet",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "DaemonSetSpec"),
        ],
    },
    TypeDef {
        name: "ReplicaSet",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "ReplicaSetSpec"),
        ],
    },
    TypeDef {
        name: "Job",
        fields: &[object("metadata", "ObjectMeta"), object("spec", "JobSpec")],
    },
    TypeDef {
        name: "CronJob",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "CronJobSpec"),
        ],
    },
    TypeDef {
        name: "Service",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "ServiceSpec"),
        ],
    },
    TypeDef {
        name: "Ingress",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "IngressSpec"),
        ],
    },
    TypeDef {
        name: "NetworkPolicy",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "NetworkPolicySpec"),
        ],
    },
    TypeDef {
        name: "ServiceAccount",
        fields: &[
            object("metadata", "ObjectMeta"),
            list("secrets", "ObjectReference"),
            keyed("imagePullSecrets", "LocalObjectReference", "name"),
            scalar("automountServiceAccountToken"),
        ],
    },
    TypeDef {
        name: "ConfigMap",
        fields: &[
            object("metadata", "ObjectMeta"),
            map("data"),
            map("binaryData"),
            scalar("immutable"),
        ],
    },
    TypeDef {
        name: "Secret",
        fields: &[
            object("metadata", "ObjectMeta"),
            map("data"),
            map("stringData"),
            scalar("type"),
            scalar("immutable"),
        ],
    },
    TypeDef {
        name: "HorizontalPodAutoscaler",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "HorizontalPodAutoscalerSpec"),
        ],
    },
    TypeDef {
        name: "PodDisruptionBudget",
        fields: &[
            object("metadata", "ObjectMeta"),
            object("spec", "PodDisruptionBudgetSpec"),
        ],
    },
    TypeDef {
        name: "Role",
        fields: &[
            object("metadata", "ObjectMeta"),
            list("rules", "PolicyRule"),
        ],
    },
    TypeDef {
        name: "ClusterRole",
        fields: &[
            object("metadata", "ObjectMeta"),
            list("rules", "PolicyRule"),
            map("aggregationRule"),
        ],
    },
    TypeDef {
        name: "RoleBinding",
        fields: &[
            object("metadata", "ObjectMeta"),
            list("subjects", "Subject"),
            object("roleRef", "RoleRef"),
        ],
    },
    TypeDef {
        name: "ClusterRoleBinding",
        fields: &[
            object("metadata", "ObjectMeta"),
            list("subjects", "Subject"),
            object("roleRef", "RoleRef"),
        ],
    },
];

/// `(parent type, field) -> merge key`, for list fields whose table entry
/// carries no inline key.
static STRATEGIC_MERGE_KEYS: &[(&str, &str, &str)] = &[
    ("ObjectMeta", "ownerReferences", "uid"),
    ("PodSpec", "ephemeralContainers", "name"),
    ("PodSpec", "volumes", "name"),
    ("PodSpec", "imagePullSecrets", "name"),
    ("PodSpec", "hostAliases", "ip"),
    ("PodSpec", "topologySpreadConstraints", "topologyKey"),
    ("PodSpec", "resourceClaims", "name"),
    ("PodSpec", "schedulingGates", "name"),
    ("ServiceSpec", "ports", "port"),
    ("ServiceAccount", "secrets", "name"),
];

#[must_use]
pub fn type_def(name: &str) -> Option<&'static TypeDef> {
    TYPES.iter().find(|t| t.name == name)
}

#[must_use]
pub fn strategic_merge_key(parent: &str, field: &str) -> Option<&'static str> {
    STRATEGIC_MERGE_KEYS
        .iter()
        .find(|(p, f, _)| *p == parent && *f == field)
        .map(|(_, _, key)| *key)
}

/// Outcome of walking a dotted path through the built-in tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinLookup {
    /// The kind has no entry in the table.
    UnknownKind,
    /// A path segment names no field of its parent type.
    FieldNotFound { segment: String },
    Field(FieldDescriptor),
}

/// Navigator over the static built-in type table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchema;

impl BuiltinSchema {
    /// Walk `path` from the resource root of `kind`.
    ///
    /// Intermediate list fields are dereferenced to their element type; only
    /// the terminal segment reports list-ness and merge key.
    #[must_use]
    pub fn lookup(&self, kind: &str, path: &str) -> BuiltinLookup {
        let Some(root) = type_def(kind) else {
            return BuiltinLookup::UnknownKind;
        };
        let segments = split_path(path);
        let Some((last, intermediate)) = segments.split_last() else {
            return BuiltinLookup::FieldNotFound {
                segment: String::new(),
            };
        };

        let mut current = root;
        for seg in intermediate {
            let Some(field) = current.field(seg) else {
                return BuiltinLookup::FieldNotFound {
                    segment: (*seg).to_string(),
                };
            };
            let next = match field.shape {
                Shape::Object(ty) | Shape::List(ty) => type_def(ty),
                Shape::Scalar | Shape::Map => None,
            };
            let Some(next) = next else {
                return BuiltinLookup::FieldNotFound {
                    segment: (*seg).to_string(),
                };
            };
            current = next;
        }

        let Some(field) = current.field(last) else {
            return BuiltinLookup::FieldNotFound {
                segment: (*last).to_string(),
            };
        };

        let descriptor = match field.shape {
            Shape::List(elem) => FieldDescriptor {
                path: path.to_string(),
                is_list: true,
                element_type: elem.to_string(),
                merge_key: field
                    .merge_key
                    .or_else(|| strategic_merge_key(current.name, field.name))
                    .unwrap_or_default()
                    .to_string(),
            },
            Shape::Object(ty) => FieldDescriptor {
                path: path.to_string(),
                is_list: false,
                element_type: ty.to_string(),
                merge_key: String::new(),
            },
            Shape::Scalar | Shape::Map => FieldDescriptor {
                path: path.to_string(),
                is_list: false,
                element_type: String::new(),
                merge_key: String::new(),
            },
        };
        BuiltinLookup::Field(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: &str, path: &str) -> FieldDescriptor {
        match BuiltinSchema.lookup(kind, path) {
            BuiltinLookup::Field(f) => f,
            other => panic!("expected field for {kind} {path}, got {other:?}"),
        }
    }

    #[test]
    fn container_env_is_keyed_by_name() {
        let f = field("Deployment", "spec.template.spec.containers.env");
        assert!(f.is_keyed());
        assert_eq!(f.merge_key, "name");
        assert_eq!(f.element_type, "EnvVar");
    }

    #[test]
    fn volumes_key_comes_from_strategic_merge_table() {
        let f = field("StatefulSet", "spec.template.spec.volumes");
        assert_eq!(f.merge_key, "name");
        let f = field("Service", "spec.ports");
        assert_eq!(f.merge_key, "port");
    }

    #[test]
    fn cronjob_reaches_containers_through_job_template() {
        let f = field(
            "CronJob",
            "spec.jobTemplate.spec.template.spec.initContainers.ports",
        );
        assert_eq!(f.merge_key, "containerPort");
    }

    #[test]
    fn atomic_lists_have_no_key() {
        let f = field("Deployment", "spec.template.spec.tolerations");
        assert!(f.is_list);
        assert!(!f.is_keyed());
        let f = field("Ingress", "spec.rules");
        assert!(f.is_list && f.merge_key.is_empty());
    }

    #[test]
    fn scalars_and_maps_are_not_lists() {
        assert!(!field("Deployment", "spec.replicas").is_list);
        assert!(!field("Deployment", "spec.template.metadata.labels").is_list);
    }

    #[test]
    fn unknown_kind_and_field() {
        assert_eq!(
            BuiltinSchema.lookup("Widget", "spec.items"),
            BuiltinLookup::UnknownKind
        );
        assert_eq!(
            BuiltinSchema.lookup("Deployment", "spec.nope.env"),
            BuiltinLookup::FieldNotFound {
                segment: "nope".to_string()
            }
        );
        // Cannot descend into a free-form map.
        assert!(matches!(
            BuiltinSchema.lookup("Deployment", "spec.selector.matchLabels"),
            BuiltinLookup::FieldNotFound { .. }
        ));
    }

    #[test]
    fn every_referenced_type_exists() {
        for t in TYPES {
            for f in t.fields {
                if let Shape::Object(ty) | Shape::List(ty) = f.shape {
                    assert!(
                        ty == "string" || type_def(ty).is_some(),
                        "{}.{} references unknown type {ty}",
                        t.name,
                        f.name
                    );
                }
            }
        }
    }
}
