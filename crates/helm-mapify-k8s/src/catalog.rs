/// A well-known list element type: its merge key and declared field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSignature {
    pub name: &'static str,
    pub merge_key: &'static str,
    pub fields: &'static [&'static str],
}

impl TypeSignature {
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(&name)
    }
}

static CATALOG: &[TypeSignature] = &[
    TypeSignature {
        name: "EnvVar",
        merge_key: "name",
        fields: &["name", "value", "valueFrom"],
    },
    TypeSignature {
        name: "ContainerPort",
        merge_key: "containerPort",
        fields: &["name", "containerPort", "protocol", "hostPort", "hostIP"],
    },
    TypeSignature {
        name: "VolumeMount",
        merge_key: "mountPath",
        fields: &[
            "name",
            "mountPath",
            "subPath",
            "subPathExpr",
            "readOnly",
            "recursiveReadOnly",
            "mountPropagation",
        ],
    },
    TypeSignature {
        name: "VolumeDevice",
        merge_key: "devicePath",
        fields: &["name", "devicePath"],
    },
    TypeSignature {
        name: "Volume",
        merge_key: "name",
        fields: &[
            "name",
            "configMap",
            "secret",
            "emptyDir",
            "hostPath",
            "persistentVolumeClaim",
            "projected",
            "downwardAPI",
            "csi",
            "nfs",
            "ephemeral",
        ],
    },
    TypeSignature {
        name: "Container",
        merge_key: "name",
        fields: &[
            "name",
            "image",
            "imagePullPolicy",
            "command",
            "args",
            "workingDir",
            "ports",
            "env",
            "envFrom",
            "resources",
            "volumeMounts",
            "volumeDevices",
            "livenessProbe",
            "readinessProbe",
            "startupProbe",
            "lifecycle",
            "securityContext",
            "stdin",
            "tty",
            "terminationMessagePath",
            "terminationMessagePolicy",
            "restartPolicy",
        ],
    },
    TypeSignature {
        name: "LocalObjectReference",
        merge_key: "name",
        fields: &["name"],
    },
    TypeSignature {
        name: "HostAlias",
        merge_key: "ip",
        fields: &["ip", "hostnames"],
    },
    TypeSignature {
        name: "ServicePort",
        merge_key: "port",
        fields: &["name", "port", "targetPort", "protocol", "nodePort", "appProtocol"],
    },
    TypeSignature {
        name: "OwnerReference",
        merge_key: "uid",
        fields: &[
            "apiVersion",
            "kind",
            "name",
            "uid",
            "controller",
            "blockOwnerDeletion",
        ],
    },
    TypeSignature {
        name: "PodResourceClaim",
        merge_key: "name",
        fields: &["name", "resourceClaimName", "resourceClaimTemplateName"],
    },
    TypeSignature {
        name: "PodSchedulingGate",
        merge_key: "name",
        fields: &["name"],
    },
    TypeSignature {
        name: "TopologySpreadConstraint",
        merge_key: "topologyKey",
        fields: &[
            "maxSkew",
            "topologyKey",
            "whenUnsatisfiable",
            "labelSelector",
            "minDomains",
            "nodeAffinityPolicy",
            "nodeTaintsPolicy",
            "matchLabelKeys",
        ],
    },
];

/// All catalog entries, in declaration order.
#[must_use]
pub fn catalog() -> &'static [TypeSignature] {
    CATALOG
}

#[must_use]
pub fn lookup(name: &str) -> Option<&'static TypeSignature> {
    CATALOG.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_merge_key_is_a_declared_field() {
        for t in catalog() {
            assert!(t.has_field(t.merge_key), "{} lacks {}", t.name, t.merge_key);
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(lookup("EnvVar").map(|t| t.merge_key), Some("name"));
        assert!(lookup("Toleration").is_none());
    }
}
