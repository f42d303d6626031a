use helm_mapify_template::{Idiom, RewriteOutcome, RewriteRequest, rewrite};
use indoc::indoc;
use test_util::prelude::*;

fn env_request() -> RewriteRequest<'static> {
    RewriteRequest {
        values_path: "env",
        merge_key: "name",
        section_name: "env",
        promote_scalar: None,
    }
}

fn rewritten(idioms: &[Idiom]) -> RewriteOutcome {
    RewriteOutcome::Rewritten {
        idioms: idioms.to_vec(),
    }
}

#[test]
fn direct_render_on_its_own_line() {
    Builder::default().build();
    let src = indoc! {r"
        spec:
          containers:
            - name: app
              env:
                {{- toYaml .Values.env | nindent 12 }}
    "};
    let result = rewrite(src, env_request());
    assert_that!(result.outcome, eq(&rewritten(&[Idiom::Direct])));
    sim_assert_eq!(
        result.text,
        indoc! {r#"
            spec:
              containers:
                - name: app
                  env:
                    {{- include "helm-mapify.listmap" (dict "items" .Values.env "key" "name") | nindent 12 }}
        "#}
    );
}

#[test]
fn direct_render_inline_after_key() {
    Builder::default().build();
    let src = "      env: {{- .Values.env | toYaml | nindent 8 }}\n";
    let result = rewrite(src, env_request());
    assert_that!(result.outcome, eq(&rewritten(&[Idiom::Direct])));
    sim_assert_eq!(
        result.text,
        "      env: {{- include \"helm-mapify.listmap\" (dict \"items\" .Values.env \"key\" \"name\") | nindent 8 }}\n"
    );
}

#[test]
fn scoped_render_inside_with() {
    Builder::default().build();
    let src = indoc! {r"
        containers:
          - name: app
            {{- with .Values.env }}
            env:
              {{- toYaml . | nindent 12 }}
            {{- end }}
    "};
    let result = rewrite(src, env_request());
    assert_that!(result.outcome, eq(&rewritten(&[Idiom::Scoped])));
    assert_that!(
        result.text,
        contains_substring(r#"{{- include "helm-mapify.listmap" (dict "items" . "key" "name") | nindent 12 }}"#)
    );
    assert_that!(result.text, contains_substring("{{- with .Values.env }}"));
}

#[test]
fn range_block_is_replaced() {
    Builder::default().build();
    let src = indoc! {r"
        env:
          {{- range .Values.env }}
          - name: {{ .name }}
            value: {{ .value | quote }}
          {{- end }}
        resources: {}
    "};
    let result = rewrite(src, env_request());
    assert_that!(result.outcome, eq(&rewritten(&[Idiom::Range])));
    sim_assert_eq!(
        result.text,
        indoc! {r#"
            env:
              {{- include "helm-mapify.listmap" (dict "items" .Values.env "key" "name") | nindent 2 }}
            resources: {}
        "#}
    );
}

#[test]
fn guarded_render() {
    Builder::default().build();
    let src = indoc! {r"
        {{- if .Values.env }}
        env:
          {{- toYaml .Values.env | nindent 2 }}
        {{- end }}
    "};
    let result = rewrite(src, env_request());
    assert_that!(result.outcome, eq(&rewritten(&[Idiom::Guarded])));
    assert_that!(result.text, starts_with("{{- if .Values.env }}\nenv:\n  {{- include"));
}

#[test]
fn rewriting_twice_is_a_no_op() {
    Builder::default().build();
    let src = indoc! {r"
        env:
          {{- toYaml .Values.env | nindent 2 }}
    "};
    let first = rewrite(src, env_request());
    let second = rewrite(&first.text, env_request());
    assert_that!(second.outcome, eq(&RewriteOutcome::AlreadyConverted));
    sim_assert_eq!(second.text, first.text);
}

#[test]
fn generated_call_gets_refreshed_key_and_scalar() {
    Builder::default().build();
    let src = indoc! {r#"
        env:
          {{- include "helm-mapify.listmap" (dict "items" .Values.env "key" "id") | nindent 2 }}
    "#};
    let request = RewriteRequest {
        promote_scalar: Some("value"),
        ..env_request()
    };
    let result = rewrite(src, request);
    assert_that!(result.outcome, eq(&rewritten(&[Idiom::Generated])));
    assert_that!(
        result.text,
        contains_substring(r#"(dict "items" .Values.env "key" "name" "scalar" "value")"#)
    );
}

#[test]
fn unsupported_usage_leaves_template_untouched() {
    Builder::default().build();
    let src = indoc! {r#"
        env:
          {{- toYaml .Values.env | nindent 2 }}
        initEnv:
          {{- include "app.env" .Values.env | nindent 2 }}
    "#};
    let result = rewrite(src, env_request());
    assert_that!(
        result.outcome,
        matches_pattern!(RewriteOutcome::Skipped {
            reason: contains_substring("app.env")
        })
    );
    sim_assert_eq!(result.text, src);
}

#[test]
fn render_under_other_key_is_skipped() {
    Builder::default().build();
    let src = indoc! {r"
        extra:
          {{- toYaml .Values.env | nindent 2 }}
    "};
    let result = rewrite(src, env_request());
    assert!(matches!(result.outcome, RewriteOutcome::Skipped { .. }));
    sim_assert_eq!(result.text, src);
}

#[test]
fn unrelated_template_reports_no_usage() {
    Builder::default().build();
    let src = indoc! {r"
        metadata:
          labels:
            {{- toYaml .Values.labels | nindent 4 }}
    "};
    let result = rewrite(src, env_request());
    assert_that!(result.outcome, eq(&RewriteOutcome::NoUsage));
    sim_assert_eq!(result.text, src);
}
