use color_eyre::eyre;
use helm_mapify_core::ResourceRef;
use helm_mapify_k8s::resolver::chain;
use helm_mapify_k8s::{BuiltinSchema, Registry, Resolution, SchemaResolver, SchemaSource};
use indoc::indoc;
use test_util::prelude::*;

const MONITOR_CRD: &str = indoc! {r"
    apiVersion: apiextensions.k8s.io/v1
    kind: CustomResourceDefinition
    metadata:
      name: servicemonitors.monitoring.coreos.com
    spec:
      group: monitoring.coreos.com
      names:
        kind: ServiceMonitor
        plural: servicemonitors
      versions:
        - name: v1
          served: true
          storage: true
          schema:
            openAPIV3Schema:
              type: object
              properties:
                spec:
                  type: object
                  properties:
                    endpoints:
                      type: array
                      items:
                        type: object
                        properties:
                          port: {type: string}
                          interval: {type: string}
                    selector:
                      type: object
                    podTargetLabels:
                      type: array
                      items: {type: string}
                    volumeMounts:
                      type: array
                      items:
                        type: object
                        properties:
                          name: {type: string}
                          mountPath: {type: string}
                          readOnly: {type: boolean}
"};

fn deployment() -> ResourceRef {
    ResourceRef::new("apps/v1", "Deployment")
}

#[test]
fn builtin_container_env_is_keyed() {
    Builder::default().build();
    let resolution = BuiltinSchema.resolve(&deployment(), "spec.template.spec.containers.env");
    let Resolution::Keyed(field) = resolution else {
        panic!("expected keyed list, got {resolution:?}");
    };
    assert_eq!(field.merge_key, "name");
    assert_eq!(field.element_type, "EnvVar");
}

#[test]
fn builtin_tolerations_have_no_key() {
    Builder::default().build();
    assert_eq!(
        BuiltinSchema.resolve(&deployment(), "spec.template.spec.tolerations"),
        Resolution::NoKey {
            source: SchemaSource::Builtin
        }
    );
}

#[test]
fn builtin_replicas_is_not_a_list() {
    Builder::default().build();
    assert_eq!(
        BuiltinSchema.resolve(&deployment(), "spec.replicas"),
        Resolution::NotList
    );
}

#[test]
fn builtin_unknown_field_is_not_found() {
    Builder::default().build();
    assert!(
        BuiltinSchema
            .resolve(&deployment(), "spec.template.spec.sidecars")
            .is_not_found()
    );
}

#[test]
fn chain_falls_through_to_registry() -> eyre::Result<()> {
    Builder::default().build();
    let mut registry = Registry::new();
    registry.load_document(MONITOR_CRD, "servicemonitors.yaml")?;
    let resolver = chain(&registry);
    let monitor = ResourceRef::new("monitoring.coreos.com/v1", "ServiceMonitor");

    let Resolution::Keyed(mounts) = resolver.resolve(&monitor, "spec.volumeMounts") else {
        panic!("expected heuristic keyed list");
    };
    assert_eq!(mounts.merge_key, "mountPath");

    assert_eq!(
        resolver.resolve(&monitor, "spec.endpoints"),
        Resolution::NoKey {
            source: SchemaSource::Extension
        }
    );
    assert_eq!(resolver.resolve(&monitor, "spec.selector"), Resolution::NotList);

    // Built-in kinds still resolve first.
    assert!(matches!(
        resolver.resolve(&deployment(), "spec.template.spec.volumes"),
        Resolution::Keyed(_)
    ));
    Ok(())
}

#[test]
fn version_skew_and_missing_schemas() -> eyre::Result<()> {
    Builder::default().build();
    let mut registry = Registry::new();
    registry.load_document(MONITOR_CRD, "servicemonitors.yaml")?;
    let resolver = chain(&registry);

    assert_eq!(
        resolver.resolve(
            &ResourceRef::new("monitoring.coreos.com/v1beta1", "ServiceMonitor"),
            "spec.endpoints"
        ),
        Resolution::VersionMismatch {
            available: vec!["monitoring.coreos.com/v1".to_string()]
        }
    );
    assert_eq!(
        resolver.resolve(
            &ResourceRef::new("cert-manager.io/v1", "Certificate"),
            "spec.dnsNames"
        ),
        Resolution::MissingSchema
    );
    assert!(
        resolver
            .resolve(&ResourceRef::new("v1", "Gizmo"), "spec.items")
            .is_not_found()
    );
    Ok(())
}

#[test]
fn missing_api_version_uses_kind_lookup() -> eyre::Result<()> {
    Builder::default().build();
    let mut registry = Registry::new();
    registry.load_document(MONITOR_CRD, "servicemonitors.yaml")?;
    let resolver = chain(&registry);

    assert!(matches!(
        resolver.resolve(&ResourceRef::new("", "ServiceMonitor"), "spec.volumeMounts"),
        Resolution::Keyed(_)
    ));
    assert!(matches!(
        resolver.resolve(&ResourceRef::new("", "Deployment"), "spec.template.spec.containers"),
        Resolution::Keyed(_)
    ));
    Ok(())
}
