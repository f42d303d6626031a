use std::collections::BTreeMap;

use color_eyre::eyre;
use helm_mapify_transform::{TransformTarget, transform};
use indoc::indoc;
use test_util::prelude::*;

fn env() -> Vec<TransformTarget> {
    vec![TransformTarget::new("env", "name")]
}

#[test]
fn simple_environment_list() -> eyre::Result<()> {
    Builder::default().build();
    let src = "env:\n  - name: DB_HOST\n    value: localhost\n  - name: DB_PORT\n    value: \"5432\"\n";
    let out = transform(src, &env())?;
    sim_assert_eq!(
        out.text,
        "env:\n  DB_HOST:\n    value: localhost\n  DB_PORT:\n    value: \"5432\"\n"
    );
    assert_that!(out.converted, elements_are![eq("env")]);
    Ok(())
}

#[test]
fn quoted_merge_key_values() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r#"
        env:
          - name: "DB_HOST"
            value: a
          - name: 'db-port'  # quoted
            value: b
    "#};
    let out = transform(src, &env())?;
    sim_assert_eq!(
        out.text,
        indoc! {r"
            env:
              DB_HOST:
                value: a
              db-port: # quoted
                value: b
        "}
    );
    Ok(())
}

#[test]
fn crlf_line_endings_are_kept() -> eyre::Result<()> {
    Builder::default().build();
    let src = "env:\r\n  - name: A\r\n    value: x\r\n  - name: B\r\n    value: y\r\nother: 1\r\n";
    let out = transform(src, &env())?;
    sim_assert_eq!(
        out.text,
        "env:\r\n  A:\r\n    value: x\r\n  B:\r\n    value: y\r\nother: 1\r\n"
    );
    Ok(())
}

#[test]
fn empty_list_with_stale_comment() -> eyre::Result<()> {
    Builder::default().build();
    let src = "env: []\n  # - name: FOO\n  #   value: bar\n";
    let out = transform(src, &env())?;
    sim_assert_eq!(out.text, "env: {}\n");
    Ok(())
}

#[test]
fn numeric_merge_key_stays_unquoted() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r"
        ports:
          - containerPort: 8080
            protocol: TCP
          - containerPort: 9090
            name: metrics
    "};
    let out = transform(src, &[TransformTarget::new("ports", "containerPort")])?;
    sim_assert_eq!(
        out.text,
        indoc! {r"
            ports:
              8080:
                protocol: TCP
              9090:
                name: metrics
        "}
    );
    Ok(())
}

#[test]
fn surrounding_lines_and_comments_are_preserved() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r#"
        # Application settings
        app:
          image: "nginx:1.27"   # pinned

          # Extra variables
          env:
            - name: A  # first
              value: "1"

            # the second one
            - value: two
              name: "b:c"
          replicas: 2
    "#};
    let targets = [TransformTarget::new("app.env", "name")];
    let out = transform(src, &targets)?;
    sim_assert_eq!(
        out.text,
        indoc! {r#"
            # Application settings
            app:
              image: "nginx:1.27"   # pinned

              # Extra variables
              env:
                A: # first
                  value: "1"

                # the second one
                "b:c":
                  value: two
              replicas: 2
        "#}
    );
    Ok(())
}

#[test]
fn indentless_list() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r"
        volumeMounts:
        - name: data
          mountPath: /data
        - name: tmp
          mountPath: /tmp
        other: true
    "};
    let out = transform(src, &[TransformTarget::new("volumeMounts", "mountPath")])?;
    sim_assert_eq!(
        out.text,
        indoc! {r"
            volumeMounts:
              /data:
                name: data
              /tmp:
                name: tmp
            other: true
        "}
    );
    Ok(())
}

#[test]
fn element_with_only_the_key() -> eyre::Result<()> {
    Builder::default().build();
    let src = "imagePullSecrets:\n  - name: registry\n";
    let out = transform(src, &[TransformTarget::new("imagePullSecrets", "name")])?;
    sim_assert_eq!(out.text, "imagePullSecrets:\n  registry: {}\n");
    Ok(())
}

#[test]
fn scalar_promotion_uses_compact_form() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r"
        env:
          - name: A
            value: one
          - name: B
            valueFrom:
              secretKeyRef:
                name: s
                key: k
    "};
    let targets = [TransformTarget::new("env", "name").with_promote_scalar("value")];
    let out = transform(src, &targets)?;
    sim_assert_eq!(
        out.text,
        indoc! {r"
            env:
              A: one
              B:
                valueFrom:
                  secretKeyRef:
                    name: s
                    key: k
        "}
    );
    Ok(())
}

#[test]
fn vetoed_fields_are_left_alone() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r"
        missing:
          - value: a
        duplicate:
          - name: a
          - name: a
        scalars:
          - a
          - b
        nested:
          - name:
              first: x
        flow: [{name: a}]
    "};
    let targets: Vec<TransformTarget> = ["missing", "duplicate", "scalars", "nested", "flow"]
        .into_iter()
        .map(|path| TransformTarget::new(path, "name"))
        .collect();
    let out = transform(src, &targets)?;
    sim_assert_eq!(out.text, src);
    assert_that!(out.converted, len(eq(0)));
    let reasons: BTreeMap<&str, &str> = out
        .skipped
        .iter()
        .map(|s| (s.values_path.as_str(), s.reason.as_str()))
        .collect();
    assert_that!(reasons.get("flow"), some(eq(&"flow style list")));
    assert_that!(reasons.get("scalars"), some(eq(&"list element is not an object")));
    assert_that!(reasons.get("duplicate"), some(starts_with("duplicate name")));
    assert_that!(reasons.len(), eq(5));
    Ok(())
}

#[test]
fn converting_twice_is_a_no_op() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r"
        env:
          - name: A
            value: a
        ports: []
        sidecar:
          env:
            - name: B
    "};
    let targets = [
        TransformTarget::new("env", "name"),
        TransformTarget::new("ports", "containerPort"),
        TransformTarget::new("sidecar.env", "name"),
    ];
    let first = transform(src, &targets)?;
    assert_that!(first.converted, len(eq(3)));
    let second = transform(&first.text, &targets)?;
    assert_that!(second.converted, len(eq(0)));
    sim_assert_eq!(second.text, first.text);
    Ok(())
}

/// (merge key value, remaining fields) pairs of a list or converted map.
fn pairs(
    value: &serde_yaml::Value,
    merge_key: &str,
) -> BTreeMap<String, serde_yaml::Mapping> {
    let key_string = |v: &serde_yaml::Value| match v {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    };
    match value {
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .filter_map(|item| item.as_mapping())
            .map(|item| {
                let mut rest = item.clone();
                let key = rest.remove(merge_key).unwrap_or_default();
                (key_string(&key), rest)
            })
            .collect(),
        serde_yaml::Value::Mapping(map) => map
            .iter()
            .map(|(k, v)| (key_string(k), v.as_mapping().cloned().unwrap_or_default()))
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[test]
fn conversion_preserves_element_values() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r#"
        ports:
          - containerPort: 80
            name: http
            protocol: TCP
          - name: "metrics"
            containerPort: 9090
        keep: [1, 2]
    "#};
    let out = transform(src, &[TransformTarget::new("ports", "containerPort")])?;
    let before: serde_yaml::Value = serde_yaml::from_str(src)?;
    let after: serde_yaml::Value = serde_yaml::from_str(&out.text)?;
    sim_assert_eq!(
        pairs(&before["ports"], "containerPort"),
        pairs(&after["ports"], "containerPort")
    );
    sim_assert_eq!(before["keep"], after["keep"]);

    let last_line = src.lines().last().unwrap_or_default();
    assert_that!(out.text.lines().last(), some(eq(last_line)));
    Ok(())
}

#[test]
fn awkward_merge_key_values_survive_conversion() -> eyre::Result<()> {
    Builder::default().build();
    let src = indoc! {r#"
        env:
          - name: "a\nb"
            value: one
          - name: " A"
            value: two
          - name: "- A"
            value: three
          - name: "? q"
            value: four
          - name: "tab\tin"
            value: five
    "#};
    let out = transform(src, &env())?;
    assert_that!(out.converted, elements_are![eq("env")]);
    let before: serde_yaml::Value = serde_yaml::from_str(src)?;
    let after: serde_yaml::Value = serde_yaml::from_str(&out.text)?;
    assert!(after["env"].is_mapping());
    sim_assert_eq!(pairs(&before["env"], "name"), pairs(&after["env"], "name"));
    Ok(())
}
