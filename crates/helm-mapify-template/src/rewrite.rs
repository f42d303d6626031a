//! Replaces list renderings of one values path with a call to the
//! `helm-mapify.listmap` helper.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::expr::{self, Expr, Target};
use crate::scan::{Action, scan_actions};

pub const HELPER_NAME: &str = "helm-mapify.listmap";
pub const HELPER_FILE: &str = "_helm-mapify.tpl";

/// Renders a map of `key -> remaining fields` as a list sorted by key, with
/// the merge key first in every element. Lists are passed through unchanged.
pub const HELPER_TEMPLATE: &str = r#"{{/*
Render a map keyed by a list merge key back into a list.

  items:  map of merge key value -> remaining fields (a list is passed through)
  key:    name of the merge key field
  scalar: optional field name a bare scalar value stands for
*/}}
{{- define "helm-mapify.listmap" -}}
{{- $key := .key -}}
{{- $scalar := .scalar | default "" -}}
{{- $items := .items -}}
{{- if kindIs "slice" $items -}}
{{- toYaml $items -}}
{{- else if $items -}}
{{- range $i, $name := keys $items | sortAlpha -}}
{{- $item := get $items $name -}}
{{- if and $scalar (not (kindIs "map" $item)) -}}
{{- $item = dict $scalar $item -}}
{{- end -}}
{{- $id := $name -}}
{{- if regexMatch "^[0-9]+$" $name -}}
{{- $id = atoi $name -}}
{{- end -}}
{{- if $i }}{{ "\n" }}{{ end -}}
- {{ dict $key $id | toYaml | trim }}
{{- with omit (default (dict) $item) $key }}
{{- toYaml . | nindent 2 }}
{{- end -}}
{{- end -}}
{{- end -}}
{{- end -}}
"#;

static ITEMS_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""items"\s+(\S+)"#).expect("valid items regex"));

static KEY_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""key"\s+"([^"]*)""#).expect("valid key regex"));

static SCALAR_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s*"scalar"\s+"([^"]*)""#).expect("valid scalar regex"));

/// Template idiom a rewrite was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Idiom {
    Direct,
    Scoped,
    Range,
    Guarded,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RewriteOutcome {
    Rewritten { idioms: Vec<Idiom> },
    /// Only up-to-date helper calls were found.
    AlreadyConverted,
    /// The template does not render the path.
    NoUsage,
    /// A rendering of the path matched no known idiom; nothing was changed.
    Skipped { reason: String },
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    pub values_path: &'a str,
    pub merge_key: &'a str,
    pub section_name: &'a str,
    pub promote_scalar: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub outcome: RewriteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Open {
    If(String),
    Scope(Option<String>),
    Range,
    Define,
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

struct Lines {
    starts: Vec<usize>,
    len: usize,
}

impl Lines {
    fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        if starts.last() == Some(&src.len()) && !src.is_empty() {
            starts.pop();
        }
        Self {
            starts,
            len: src.len(),
        }
    }

    fn index_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }

    fn start(&self, idx: usize) -> usize {
        self.starts[idx]
    }

    /// End of the line including its newline.
    fn end(&self, idx: usize) -> usize {
        self.starts.get(idx + 1).copied().unwrap_or(self.len)
    }

    fn text<'a>(&self, src: &'a str, idx: usize) -> &'a str {
        src[self.start(idx)..self.end(idx)].trim_end_matches(['\n', '\r'])
    }
}

struct Rewriter<'a> {
    src: &'a str,
    req: RewriteRequest<'a>,
    actions: Vec<Action>,
    lines: Lines,
    section_line: Regex,
    open: Vec<Open>,
    edits: Vec<Edit>,
    idioms: Vec<Idiom>,
    up_to_date: usize,
    unmatched: Vec<String>,
}

/// Rewrite every list rendering of `req.values_path` in `src`.
///
/// Either every rendering of the path is rewritten or, when one of them is
/// not a known idiom, none is.
#[must_use]
pub fn rewrite(src: &str, req: RewriteRequest<'_>) -> Rewrite {
    let section = regex::escape(req.section_name);
    let section_line = Regex::new(&format!(r#"^\s*(?:-\s+)?["']?{section}["']?\s*:\s*$"#))
        .unwrap_or_else(|_| Regex::new("$^").expect("valid empty regex"));

    let mut rewriter = Rewriter {
        src,
        req,
        actions: scan_actions(src),
        lines: Lines::new(src),
        section_line,
        open: Vec::new(),
        edits: Vec::new(),
        idioms: Vec::new(),
        up_to_date: 0,
        unmatched: Vec::new(),
    };
    rewriter.run();
    rewriter.finish()
}

impl Rewriter<'_> {
    fn scope(&self) -> Option<&str> {
        self.open.iter().rev().find_map(|o| match o {
            Open::Scope(scope) => Some(scope.as_deref()),
            Open::Range | Open::Define => Some(None),
            Open::If(_) => None,
        })?
    }

    fn resolves_to_path(&self, target: &Target) -> bool {
        target.values_path(self.scope()).as_deref() == Some(self.req.values_path)
    }

    fn run(&mut self) {
        let mut i = 0;
        while i < self.actions.len() {
            let action = self.actions[i];
            let text = action.text(self.src);
            let parsed = expr::parse(text);
            match parsed {
                Expr::Render { ref target } if self.resolves_to_path(target) => {
                    self.render(&action, text, target);
                }
                Expr::Range {
                    ref target,
                    pairs: false,
                } if self.resolves_to_path(target) => {
                    if let Some(end) = self.range(i, text, target) {
                        i = end + 1;
                        continue;
                    }
                    self.open.push(Open::Range);
                }
                Expr::Include { ref name, .. } if name == HELPER_NAME => {
                    self.generated(&action, text);
                }
                Expr::Include { ref name, ref arg } if self.resolves_to_path(arg) => {
                    let line = self.lines.index_of(action.start) + 1;
                    self.unmatched
                        .push(format!("line {line}: rendered through include {name:?}"));
                }
                Expr::If => self.open.push(Open::If(text.to_string())),
                Expr::With { ref target } => {
                    let scope = target.values_path(self.scope());
                    self.open.push(Open::Scope(scope));
                }
                Expr::Range { .. } => self.open.push(Open::Range),
                Expr::Define { .. } | Expr::Block { .. } => self.open.push(Open::Define),
                Expr::End => {
                    self.open.pop();
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn finish(mut self) -> Rewrite {
        if let Some(reason) = self.unmatched.first() {
            debug!(path = self.req.values_path, %reason, "template rewrite skipped");
            return Rewrite {
                text: self.src.to_string(),
                outcome: RewriteOutcome::Skipped {
                    reason: format!("unsupported pattern ({reason})"),
                },
            };
        }
        if self.edits.is_empty() {
            let outcome = if self.up_to_date > 0 {
                RewriteOutcome::AlreadyConverted
            } else {
                RewriteOutcome::NoUsage
            };
            return Rewrite {
                text: self.src.to_string(),
                outcome,
            };
        }

        self.edits.sort_by(|a, b| b.start.cmp(&a.start));
        let mut text = self.src.to_string();
        for edit in &self.edits {
            text.replace_range(edit.start..edit.end, &edit.replacement);
        }
        self.idioms.dedup();
        Rewrite {
            text,
            outcome: RewriteOutcome::Rewritten {
                idioms: self.idioms,
            },
        }
    }

    fn helper_call(&self, items: &str, indent: usize) -> String {
        let scalar = self
            .req
            .promote_scalar
            .map(|s| format!(r#" "scalar" "{s}""#))
            .unwrap_or_default();
        format!(
            r#"{{{{- include "{HELPER_NAME}" (dict "items" {items} "key" "{key}"{scalar}) | nindent {indent} }}}}"#,
            key = self.req.merge_key,
        )
    }

    fn items_expr(text: &str, target: &Target) -> String {
        match target {
            Target::Values(path) if text.contains("$.Values") => format!("$.Values.{path}"),
            Target::Values(path) => format!(".Values.{path}"),
            Target::Field(field) => format!(".{field}"),
            Target::Dot | Target::Other => ".".to_string(),
        }
    }

    /// Whether the line holds nothing but control actions (`if`, `with`,
    /// `else`, `end`, comments).
    fn is_control_only(&self, idx: usize) -> bool {
        let start = self.lines.start(idx);
        let end = self.lines.end(idx);
        let mut rest = String::new();
        let mut last = start;
        let mut any = false;
        for action in self.actions.iter().filter(|a| a.start >= start && a.start < end) {
            rest.push_str(&self.src[last..action.start]);
            last = action.end.min(end);
            any = true;
            let control = matches!(
                expr::parse(action.text(self.src)),
                Expr::If | Expr::With { .. } | Expr::Else | Expr::End | Expr::Comment
            );
            if !control {
                return false;
            }
        }
        rest.push_str(&self.src[last.min(end)..end]);
        any && rest.trim().is_empty()
    }

    /// Closest preceding line that is YAML content.
    fn previous_significant(&self, idx: usize) -> Option<usize> {
        (0..idx).rev().find(|&k| {
            let text = self.lines.text(self.src, k).trim();
            !(text.is_empty() || text.starts_with('#') || self.is_control_only(k))
        })
    }

    /// Whether the action is alone on its line.
    fn standalone(&self, action: &Action) -> bool {
        let idx = self.lines.index_of(action.start);
        let line_start = self.lines.start(idx);
        let line_end = self.lines.end(idx);
        self.src[line_start..action.start].trim().is_empty()
            && action.end <= line_end
            && self.src[action.end..line_end].trim().is_empty()
    }

    fn under_section(&self, action: &Action) -> bool {
        let idx = self.lines.index_of(action.start);
        let prefix = &self.src[self.lines.start(idx)..action.start];
        if self.section_line.is_match(prefix) {
            return true;
        }
        self.standalone(action)
            && self
                .previous_significant(idx)
                .is_some_and(|k| self.section_line.is_match(self.lines.text(self.src, k)))
    }

    fn guarded(&self) -> bool {
        self.open.iter().any(|o| match o {
            Open::If(cond) => expr::extract_values_paths(cond)
                .iter()
                .any(|p| p == self.req.values_path),
            _ => false,
        })
    }

    fn render(&mut self, action: &Action, text: &str, target: &Target) {
        let line = self.lines.index_of(action.start) + 1;
        let Some(indent) = expr::indent_width(text) else {
            self.unmatched
                .push(format!("line {line}: render without indent"));
            return;
        };
        if !self.under_section(action) {
            self.unmatched.push(format!(
                "line {line}: not rendered under {}:",
                self.req.section_name
            ));
            return;
        }
        let idiom = match target {
            Target::Values(_) if self.guarded() => Idiom::Guarded,
            Target::Values(_) => Idiom::Direct,
            _ => Idiom::Scoped,
        };
        self.edits.push(Edit {
            start: action.start,
            end: action.end,
            replacement: self.helper_call(&Self::items_expr(text, target), indent),
        });
        self.idioms.push(idiom);
    }

    /// Replace a `range` block rendering the list. Returns the index of the
    /// block's `end` action on success.
    fn range(&mut self, idx: usize, text: &str, target: &Target) -> Option<usize> {
        let action = self.actions[idx];
        let line = self.lines.index_of(action.start) + 1;
        if !self.standalone(&action) || !self.under_section(&action) {
            self.unmatched
                .push(format!("line {line}: range not directly under {}:", self.req.section_name));
            return None;
        }

        let mut depth = 0usize;
        let mut end_idx = None;
        for (j, a) in self.actions.iter().enumerate().skip(idx + 1) {
            let parsed = expr::parse(a.text(self.src));
            if parsed.opens_block() {
                depth += 1;
            } else if parsed == Expr::End {
                if depth == 0 {
                    end_idx = Some(j);
                    break;
                }
                depth -= 1;
            }
        }
        let Some(end_idx) = end_idx else {
            self.unmatched.push(format!("line {line}: unterminated range"));
            return None;
        };
        let end_action = self.actions[end_idx];
        if !self.standalone(&end_action) {
            self.unmatched
                .push(format!("line {line}: range end shares a line"));
            return None;
        }

        let range_line = self.lines.index_of(action.start);
        let end_line = self.lines.index_of(end_action.start);
        let body_indent = (range_line + 1..end_line)
            .map(|k| self.lines.text(self.src, k))
            .find(|t| !t.trim().is_empty())
            .map(|t| t.len() - t.trim_start().len());
        let Some(body_indent) = body_indent else {
            self.unmatched.push(format!("line {line}: empty range body"));
            return None;
        };

        let range_text = self.lines.text(self.src, range_line);
        let lead = &range_text[..range_text.len() - range_text.trim_start().len()];
        let newline = if self.src[self.lines.start(end_line)..self.lines.end(end_line)].ends_with('\n')
        {
            "\n"
        } else {
            ""
        };
        self.edits.push(Edit {
            start: self.lines.start(range_line),
            end: self.lines.end(end_line),
            replacement: format!(
                "{lead}{}{newline}",
                self.helper_call(&Self::items_expr(text, target), body_indent)
            ),
        });
        self.idioms.push(Idiom::Range);
        Some(end_idx)
    }

    fn generated(&mut self, action: &Action, text: &str) {
        let Some(items) = ITEMS_ARG.captures(text).map(|c| c[1].to_string()) else {
            return;
        };
        let items = items.trim_end_matches(')');
        if !self.resolves_to_path(&Target::parse(items)) {
            return;
        }

        let mut updated = text.to_string();
        let stale_key = KEY_ARG
            .captures(&updated)
            .filter(|caps| &caps[1] != self.req.merge_key)
            .and_then(|caps| caps.get(0))
            .map(|m| m.range());
        if let Some(range) = stale_key {
            updated.replace_range(range, &format!(r#""key" "{}""#, self.req.merge_key));
        }
        let current_scalar = SCALAR_ARG.captures(&updated).map(|c| c[1].to_string());
        if current_scalar.as_deref() != self.req.promote_scalar {
            if let Some(range) = SCALAR_ARG.find(&updated).map(|m| m.range()) {
                updated.replace_range(range, "");
            }
            if let Some(scalar) = self.req.promote_scalar
                && let Some(pos) = KEY_ARG.find(&updated).map(|m| m.end())
            {
                updated.insert_str(pos, &format!(r#" "scalar" "{scalar}""#));
            }
        }

        if updated == text {
            self.up_to_date += 1;
            return;
        }
        let inner = self.src[action.inner_start..action.inner_end].to_string();
        let Some(offset) = inner.find(text) else {
            return;
        };
        let start = action.inner_start + offset;
        self.edits.push(Edit {
            start,
            end: start + text.len(),
            replacement: updated,
        });
        self.idioms.push(Idiom::Generated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_index() {
        let lines = Lines::new("a\nbb\n\nc");
        assert_eq!(lines.index_of(0), 0);
        assert_eq!(lines.index_of(2), 1);
        assert_eq!(lines.index_of(5), 2);
        assert_eq!(lines.index_of(6), 3);
        assert_eq!(lines.end(1), 5);
        assert_eq!(lines.end(3), 7);
    }

    #[test]
    fn helper_call_format() {
        let src = "";
        let rewriter = Rewriter {
            src,
            req: RewriteRequest {
                values_path: "env",
                merge_key: "name",
                section_name: "env",
                promote_scalar: Some("value"),
            },
            actions: Vec::new(),
            lines: Lines::new(src),
            section_line: Regex::new("^env:$").expect("regex"),
            open: Vec::new(),
            edits: Vec::new(),
            idioms: Vec::new(),
            up_to_date: 0,
            unmatched: Vec::new(),
        };
        assert_eq!(
            rewriter.helper_call(".Values.env", 12),
            r#"{{- include "helm-mapify.listmap" (dict "items" .Values.env "key" "name" "scalar" "value") | nindent 12 }}"#
        );
    }
}
