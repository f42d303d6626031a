//! Classification of a single template action.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static VALUES_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.Values\.([\w]+(?:\.[\w]+)*)").expect("valid values path regex")
});

static INCLUDE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:include|template)\s+"([^"]+)""#).expect("valid include regex")
});

static NINDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(n?indent)\s+(\d+)").expect("valid indent regex"));

/// Variable names that mark the first of two `range` variables as an index.
const INDEX_VARS: &[&str] = &["$i", "$idx", "$index", "$_", "$n"];

/// How a values path is used by a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsagePattern {
    DirectRender,
    ScopedRender,
    RangeList,
    RangePairs,
    ScopeOpen,
}

impl UsagePattern {
    /// Whether the usage renders the value as a list.
    #[must_use]
    pub fn is_list_use(self) -> bool {
        !matches!(self, Self::RangePairs | Self::ScopeOpen)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectRender => "direct-render",
            Self::ScopedRender => "scoped-render",
            Self::RangeList => "range-list",
            Self::RangePairs => "range-pairs",
            Self::ScopeOpen => "scope-open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuesUsage {
    pub values_path: String,
    pub pattern: UsagePattern,
}

impl ValuesUsage {
    #[must_use]
    pub fn is_list_use(&self) -> bool {
        self.pattern.is_list_use()
    }
}

/// What an action argument points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `.Values.a.b` or `$.Values.a.b`.
    Values(String),
    /// `.` or `$`: the current scope.
    Dot,
    /// `.a.b`: a field below the current scope.
    Field(String),
    Other,
}

impl Target {
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim().trim_start_matches('(').trim_end_matches(')');
        if token == "." || token == "$" {
            return Self::Dot;
        }
        let rest = token.strip_prefix('$').unwrap_or(token);
        if let Some(path) = rest.strip_prefix(".Values.") {
            if !path.is_empty() && path.split('.').all(is_ident) {
                return Self::Values(path.to_string());
            }
            return Self::Other;
        }
        if token.starts_with('$') {
            return Self::Other;
        }
        if let Some(path) = token.strip_prefix('.')
            && !path.is_empty()
            && path != "Values"
            && path.split('.').all(is_ident)
        {
            return Self::Field(path.to_string());
        }
        Self::Other
    }

    /// Absolute values path, given the enclosing scope's path.
    #[must_use]
    pub fn values_path(&self, scope: Option<&str>) -> Option<String> {
        match (self, scope) {
            (Self::Values(path), _) => Some(path.clone()),
            (Self::Dot, Some(scope)) => Some(scope.to_string()),
            (Self::Field(field), Some(scope)) => Some(format!("{scope}.{field}")),
            _ => None,
        }
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `toYaml X` / `toJson X`, optionally piped to `indent`/`nindent`.
    Render { target: Target },
    With { target: Target },
    Range { target: Target, pairs: bool },
    If,
    Include { name: String, arg: Target },
    Define { name: String },
    Block { name: String },
    Else,
    End,
    Comment,
    /// Anything else, with the values paths it mentions.
    Other { values_paths: Vec<String> },
}

impl Expr {
    /// Whether the action opens a block closed by `{{ end }}`.
    #[must_use]
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            Self::With { .. } | Self::Range { .. } | Self::If | Self::Define { .. } | Self::Block { .. }
        )
    }
}

/// Classify the inner text of one action.
#[must_use]
pub fn parse(text: &str) -> Expr {
    let text = text.trim();
    if text.starts_with("/*") {
        return Expr::Comment;
    }

    let mut words = text.split_whitespace();
    let head = words.next().unwrap_or("");
    match head {
        "end" => return Expr::End,
        "else" => return Expr::Else,
        "if" => return Expr::If,
        "with" => {
            return Expr::With {
                target: Target::parse(first_stage(rest_after(text, head))),
            };
        }
        "range" => return parse_range(rest_after(text, head)),
        "define" | "block" => {
            let name = quoted(rest_after(text, head)).unwrap_or_default();
            return if head == "define" {
                Expr::Define { name }
            } else {
                Expr::Block { name }
            };
        }
        _ => {}
    }

    if let Some(name) = parse_include_name(text) {
        let after = INCLUDE_NAME
            .find(text)
            .map_or("", |m| &text[m.end()..]);
        let arg = first_stage(after).split_whitespace().next().unwrap_or("");
        return Expr::Include {
            name,
            arg: Target::parse(arg),
        };
    }

    let stages: Vec<&str> = split_pipeline(text);
    let first = stages.first().copied().unwrap_or("");
    let mut first_words = first.split_whitespace();
    let first_head = first_words.next().unwrap_or("");
    if matches!(first_head, "toYaml" | "toJson" | "toPrettyJson")
        && let Some(arg) = first_words.next()
    {
        return Expr::Render {
            target: Target::parse(arg),
        };
    }
    // `.Values.x | toYaml | nindent 4`
    if stages
        .iter()
        .skip(1)
        .any(|s| matches!(s.split_whitespace().next(), Some("toYaml" | "toJson")))
        && first_words.next().is_none()
    {
        return Expr::Render {
            target: Target::parse(first_head),
        };
    }

    Expr::Other {
        values_paths: extract_values_paths(text),
    }
}

fn parse_range(rest: &str) -> Expr {
    let rest = first_stage(rest);
    let Some((vars, target)) = rest.split_once(":=") else {
        return Expr::Range {
            target: Target::parse(rest),
            pairs: false,
        };
    };
    let vars: Vec<&str> = vars
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    let pairs = vars.len() == 2 && !INDEX_VARS.contains(&vars[0]);
    Expr::Range {
        target: Target::parse(target.trim()),
        pairs,
    }
}

fn rest_after<'a>(text: &'a str, head: &str) -> &'a str {
    text[head.len()..].trim_start()
}

fn quoted(text: &str) -> Option<String> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(text[start..start + len].to_string())
}

/// Text before the first top-level `|`.
fn first_stage(text: &str) -> &str {
    split_pipeline(text).into_iter().next().unwrap_or("").trim()
}

/// Split on `|` outside of strings and parentheses.
fn split_pipeline(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut last = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_str = !in_str,
            '(' if !in_str => depth += 1,
            ')' if !in_str => depth = depth.saturating_sub(1),
            '|' if !in_str && depth == 0 => {
                out.push(text[last..i].trim());
                last = i + 1;
            }
            _ => {}
        }
    }
    out.push(text[last..].trim());
    out
}

/// Indentation requested by a trailing `indent N` / `nindent N`.
#[must_use]
pub fn indent_width(text: &str) -> Option<usize> {
    NINDENT.captures(text).and_then(|c| c[2].parse().ok())
}

/// Extract `.Values.foo.bar` references -> `["foo.bar"]`.
#[must_use]
pub fn extract_values_paths(text: &str) -> Vec<String> {
    let mut result: Vec<String> = VALUES_PATH
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    result.sort();
    result.dedup();
    result
}

/// Extract the template name from `include "name" ctx` or `template "name" ctx`.
#[must_use]
pub fn parse_include_name(text: &str) -> Option<String> {
    INCLUDE_NAME.captures(text).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_targets() {
        assert_eq!(
            parse("toYaml .Values.app.env | nindent 12"),
            Expr::Render {
                target: Target::Values("app.env".into())
            }
        );
        assert_eq!(
            parse("toYaml $.Values.env"),
            Expr::Render {
                target: Target::Values("env".into())
            }
        );
        assert_eq!(parse("toYaml . | nindent 8"), Expr::Render { target: Target::Dot });
        assert_eq!(
            parse("toYaml .ports | indent 4"),
            Expr::Render {
                target: Target::Field("ports".into())
            }
        );
        assert_eq!(
            parse(".Values.env | toYaml | nindent 4"),
            Expr::Render {
                target: Target::Values("env".into())
            }
        );
    }

    #[test]
    fn range_variants() {
        assert_eq!(
            parse("range .Values.env"),
            Expr::Range {
                target: Target::Values("env".into()),
                pairs: false
            }
        );
        assert_eq!(
            parse("range $i, $e := .Values.env"),
            Expr::Range {
                target: Target::Values("env".into()),
                pairs: false
            }
        );
        assert_eq!(
            parse("range $k, $v := .Values.labels"),
            Expr::Range {
                target: Target::Values("labels".into()),
                pairs: true
            }
        );
        assert_eq!(
            parse("range $e := .Values.env"),
            Expr::Range {
                target: Target::Values("env".into()),
                pairs: false
            }
        );
    }

    #[test]
    fn control_and_include() {
        assert_eq!(
            parse("with .Values.sidecar"),
            Expr::With {
                target: Target::Values("sidecar".into())
            }
        );
        assert_eq!(parse("end"), Expr::End);
        assert_eq!(parse("else if .Values.a"), Expr::Else);
        assert_eq!(
            parse(r#"define "app.env""#),
            Expr::Define {
                name: "app.env".into()
            }
        );
        assert_eq!(
            parse(r#"include "app.env" . | nindent 12"#),
            Expr::Include {
                name: "app.env".into(),
                arg: Target::Dot
            }
        );
        assert_eq!(
            parse(r#"include "app.env" .Values.extra"#),
            Expr::Include {
                name: "app.env".into(),
                arg: Target::Values("extra".into())
            }
        );
        assert!(parse("if .Values.env").opens_block());
    }

    #[test]
    fn other_collects_values_paths() {
        assert_eq!(
            parse(r#"default "x" .Values.image.tag | quote"#),
            Expr::Other {
                values_paths: vec!["image.tag".into()]
            }
        );
        assert_eq!(indent_width("toYaml . | nindent 12"), Some(12));
        assert_eq!(indent_width("toYaml ."), None);
    }
}
