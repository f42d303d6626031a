//! Single forward scan over a template's lines.
//!
//! Tracks the YAML key path by indentation and the stack of open control
//! blocks, and records every action that renders, iterates or scopes a value
//! as a [`TemplateDirective`].

use std::sync::LazyLock;

use helm_mapify_core::ResourceRef;
use regex::Regex;

use crate::expr::{self, Expr};
use crate::scan::{Action, scan_actions};

static KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)(-\s+)?("[^"]+"|'[^']+'|[^\s:#{}\[\],&*!|>'"%@`-][^\s:#{}]*)\s*:(?:\s+(.*))?$"#)
        .expect("valid key regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDirective {
    /// Dotted YAML key path the action renders into; empty at the root.
    pub yaml_path: String,
    /// Action text without delimiters.
    pub expr: String,
    /// 1-based line of the action.
    pub line: usize,
    /// Values path of the innermost `with` block, if it rebinds `.` to one.
    pub scope: Option<String>,
    /// Resource of the YAML document containing the action.
    pub resource: Option<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTemplate {
    /// Resource of the first document.
    pub resource: Option<ResourceRef>,
    pub directives: Vec<TemplateDirective>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    If,
    /// Rebinds `.`; `None` when the new value is not a values path.
    Scope(Option<String>),
    Range,
    Define,
}

#[derive(Debug, Default)]
struct Analyzer {
    path: Vec<(usize, String)>,
    blocks: Vec<Block>,
    /// Indentation of a key whose value is a block scalar.
    block_scalar: Option<usize>,
    api_version: Option<String>,
    kind: Option<String>,
    doc_start: usize,
    resources: Vec<Option<ResourceRef>>,
    directives: Vec<TemplateDirective>,
}

impl Analyzer {
    fn scope(&self) -> Option<&str> {
        self.blocks.iter().rev().find_map(|b| match b {
            Block::Scope(scope) => Some(scope.as_deref()),
            Block::Range => Some(None),
            Block::If | Block::Define => None,
        })?
    }

    fn in_define(&self) -> bool {
        self.blocks.contains(&Block::Define)
    }

    fn path_string(entries: &[(usize, String)]) -> String {
        entries
            .iter()
            .map(|(_, k)| k.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn push_key(&mut self, indent: usize, key: &str) {
        while self.path.last().is_some_and(|(i, _)| *i >= indent) {
            self.path.pop();
        }
        self.path.push((indent, key.to_string()));
    }

    fn end_document(&mut self) {
        let resource = match (&self.api_version, &self.kind) {
            (_, None) => None,
            (api_version, Some(kind)) => Some(ResourceRef::new(
                api_version.clone().unwrap_or_default(),
                kind.clone(),
            )),
        };
        for d in &mut self.directives[self.doc_start..] {
            d.resource.clone_from(&resource);
        }
        self.resources.push(resource);
        self.doc_start = self.directives.len();
        self.api_version = None;
        self.kind = None;
        self.path.clear();
        self.block_scalar = None;
    }

    fn action(&mut self, src: &str, action: &Action, line: usize, yaml_path: String) {
        if action.is_comment(src) {
            return;
        }
        let text = action.text(src);
        let parsed = expr::parse(text);
        let scope = self.scope().map(ToString::to_string);

        let emit = matches!(
            parsed,
            Expr::Render { .. } | Expr::With { .. } | Expr::Range { .. } | Expr::Include { .. }
        );
        if emit && !self.in_define() {
            self.directives.push(TemplateDirective {
                yaml_path,
                expr: text.to_string(),
                line,
                scope: scope.clone(),
                resource: None,
            });
        }

        match parsed {
            Expr::If => self.blocks.push(Block::If),
            Expr::With { target } => self
                .blocks
                .push(Block::Scope(target.values_path(scope.as_deref()))),
            Expr::Range { .. } => self.blocks.push(Block::Range),
            Expr::Define { .. } | Expr::Block { .. } => self.blocks.push(Block::Define),
            Expr::End => {
                self.blocks.pop();
            }
            _ => {}
        }
    }
}

fn literal_value(value: &str) -> Option<String> {
    let value = value.split(" #").next().unwrap_or("").trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() || value.contains("{{") {
        return None;
    }
    Some(value.to_string())
}

#[must_use]
pub fn analyze(src: &str) -> ParsedTemplate {
    let actions = scan_actions(src);
    let mut analyzer = Analyzer::default();
    let mut next = 0;
    let mut covered_until = 0;
    let mut offset = 0;

    for (idx, raw_line) in src.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let line_start = offset;
        let line_end = offset + raw_line.len();
        offset = line_end;
        let line = raw_line.trim_end_matches(['\n', '\r']);

        let first = next;
        while next < actions.len() && actions[next].start < line_end {
            next += 1;
        }
        let line_actions = &actions[first..next];
        let continuation = line_start < covered_until;
        if let Some(last) = line_actions.last() {
            covered_until = covered_until.max(last.end);
        }

        let prefix_end = line_actions
            .first()
            .map_or(line.len(), |a| (a.start - line_start).min(line.len()));
        let prefix = &line[..prefix_end];
        let indent = line.len() - line.trim_start().len();
        let trimmed_prefix = prefix.trim();

        let mut key_on_line = false;
        if !continuation {
            if trimmed_prefix.starts_with('#') {
                continue;
            }
            if line.trim_end() == "---" {
                analyzer.end_document();
                continue;
            }

            if let Some(block_indent) = analyzer.block_scalar
                && ((trimmed_prefix.is_empty() && line_actions.is_empty()) || indent > block_indent)
            {
                // Block scalar content.
            } else if !trimmed_prefix.is_empty() {
                analyzer.block_scalar = None;
                if let Some(caps) = KEY_LINE.captures(prefix) {
                    let dash = caps.get(2).map_or(0, |m| m.len());
                    let col = caps[1].len() + dash;
                    let key = caps[3].trim_matches(|c| c == '"' || c == '\'');
                    analyzer.push_key(col, key);
                    key_on_line = true;

                    let value = caps.get(4).map_or("", |m| m.as_str()).trim();
                    if line_actions.is_empty() {
                        if value.starts_with('|') || value.starts_with('>') {
                            analyzer.block_scalar = Some(col);
                        }
                        if col == 0 && !analyzer.in_define() {
                            match key {
                                "apiVersion" if analyzer.api_version.is_none() => {
                                    analyzer.api_version = literal_value(value);
                                }
                                "kind" if analyzer.kind.is_none() => {
                                    analyzer.kind = literal_value(value);
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
        }

        for action in line_actions {
            let yaml_path = if key_on_line || analyzer.block_scalar.is_some() {
                Analyzer::path_string(&analyzer.path)
            } else {
                let col = if trimmed_prefix.starts_with('-') {
                    indent + 2
                } else {
                    indent
                };
                let keep = analyzer
                    .path
                    .iter()
                    .take_while(|(i, _)| *i < col)
                    .count();
                Analyzer::path_string(&analyzer.path[..keep])
            };
            analyzer.action(src, action, line_no, yaml_path);
        }
    }
    analyzer.end_document();

    ParsedTemplate {
        resource: analyzer.resources.into_iter().flatten().next(),
        directives: analyzer.directives,
    }
}
