//! Computes and applies line-range edits that turn keyed lists into maps.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quote::{comment_start, map_key};
use crate::tree::{Node, NodeKind};

/// A values path to convert and the merge key of its elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformTarget {
    pub values_path: String,
    pub merge_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promote_scalar: Option<String>,
}

impl TransformTarget {
    pub fn new(values_path: impl Into<String>, merge_key: impl Into<String>) -> Self {
        Self {
            values_path: values_path.into(),
            merge_key: merge_key.into(),
            promote_scalar: None,
        }
    }

    #[must_use]
    pub fn with_promote_scalar(mut self, field: impl Into<String>) -> Self {
        self.promote_scalar = Some(field.into());
        self
    }
}

/// Replacement of the lines `key_line..=value_end_line` (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayEdit {
    pub key_line: usize,
    pub value_start_line: usize,
    pub value_end_line: usize,
    pub key_column: usize,
    pub replacement: Vec<String>,
    /// Values path of the converted field.
    pub candidate: String,
    /// The field was an empty list; stale commented-out elements below it
    /// are removed as well.
    pub empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedField {
    pub values_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    pub edits: Vec<ArrayEdit>,
    pub skipped: Vec<SkippedField>,
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank_or_comment(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with('#')
}

fn is_entry_line(line: &str) -> bool {
    let t = line.trim_start();
    t == "-" || t.starts_with("- ")
}

/// Byte offset of the `col`-th char of `line`.
fn byte_at(line: &str, col: usize) -> usize {
    line.char_indices().nth(col).map_or(line.len(), |(i, _)| i)
}

fn shift(line: &str, delta: isize) -> String {
    if line.trim().is_empty() {
        return String::new();
    }
    if delta >= 0 {
        format!("{}{line}", " ".repeat(delta.unsigned_abs()))
    } else {
        let cut = indent(line).min(delta.unsigned_abs());
        line[cut..].to_string()
    }
}

struct Planner<'a> {
    lines: Vec<&'a str>,
    targets: &'a [TransformTarget],
    plan: EditPlan,
}

/// Plan the conversion of every target found in the first document of `root`.
#[must_use]
pub fn compute_edits(src: &str, root: &Node, targets: &[TransformTarget]) -> EditPlan {
    let mut planner = Planner {
        lines: src.lines().collect(),
        targets,
        plan: EditPlan::default(),
    };
    planner.walk(root, "");
    planner.plan
}

impl Planner<'_> {
    fn walk(&mut self, node: &Node, prefix: &str) {
        let Some(entries) = node.entries() else {
            return;
        };
        let targets = self.targets;
        for (key, value) in entries {
            let Some(name) = key.as_scalar() else {
                continue;
            };
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            };
            if let Some(target) = targets.iter().find(|t| t.values_path == path) {
                self.field(key, value, target);
                continue;
            }
            let nested = format!("{path}.");
            if targets.iter().any(|t| t.values_path.starts_with(&nested)) {
                self.walk(value, &path);
            }
        }
    }

    fn field(&mut self, key: &Node, value: &Node, target: &TransformTarget) {
        let NodeKind::Sequence(items) = &value.kind else {
            // Already a map, or not a list at all.
            return;
        };
        let result = if value.is_flow(&self.lines) {
            if items.is_empty() {
                self.empty_list(key, value, target)
            } else {
                Err("flow style list".to_string())
            }
        } else {
            self.block_list(key, value, items, target)
        };
        match result {
            Ok(edit) => self.plan.edits.push(edit),
            Err(reason) => {
                debug!(path = %target.values_path, %reason, "field left unconverted");
                self.plan.skipped.push(SkippedField {
                    values_path: target.values_path.clone(),
                    reason,
                });
            }
        }
    }

    fn empty_list(
        &self,
        key: &Node,
        value: &Node,
        target: &TransformTarget,
    ) -> Result<ArrayEdit, String> {
        let mut replacement: Vec<String> = self.lines[key.line..=value.line]
            .iter()
            .map(ToString::to_string)
            .collect();
        let Some(last) = replacement.last_mut() else {
            return Err("empty value range".to_string());
        };
        let open = byte_at(last, value.col);
        let close = last[open..]
            .find(']')
            .map(|i| open + i + 1)
            .ok_or_else(|| "unterminated flow list".to_string())?;
        last.replace_range(open..close, "{}");
        Ok(ArrayEdit {
            key_line: key.line,
            value_start_line: value.line,
            value_end_line: value.line,
            key_column: key.col,
            replacement,
            candidate: target.values_path.clone(),
            empty: true,
        })
    }

    /// Last line of a block list starting at `start`. Trailing blank lines
    /// and comments not indented below the key are left outside.
    fn list_end(&self, start: usize, key_col: usize, dash_col: usize) -> usize {
        let in_list = |line: &str| {
            let ind = indent(line);
            ind > key_col || (ind == key_col && dash_col == key_col && is_entry_line(line))
        };
        let mut end = start;
        for (i, line) in self.lines.iter().enumerate().skip(start + 1) {
            if is_blank_or_comment(line) {
                continue;
            }
            if !in_list(line) {
                break;
            }
            end = i;
        }
        while self
            .lines
            .get(end + 1)
            .is_some_and(|l| l.trim_start().starts_with('#') && indent(l) > key_col)
        {
            end += 1;
        }
        end
    }

    fn block_list(
        &self,
        key: &Node,
        value: &Node,
        items: &[Node],
        target: &TransformTarget,
    ) -> Result<ArrayEdit, String> {
        let start = value.line;
        let dash_col = value.col;
        if self
            .lines
            .get(start)
            .and_then(|l| l.chars().nth(dash_col))
            != Some('-')
        {
            return Err("unsupported list layout".to_string());
        }
        let end = self.list_end(start, key.col, dash_col);

        let dashes: Vec<usize> = (start..=end)
            .filter(|&i| indent(self.lines[i]) == dash_col && is_entry_line(self.lines[i]))
            .collect();
        if dashes.len() != items.len() {
            return Err("unsupported list layout".to_string());
        }

        let new_col = if dash_col > key.col {
            dash_col
        } else {
            key.col + 2
        };
        let mut replacement: Vec<String> = self.lines[key.line..start]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut seen = HashSet::new();
        for (n, item) in items.iter().enumerate() {
            let last = dashes.get(n + 1).map_or(end, |next| next - 1);
            let element = self.element(item, dashes[n], last, new_col, target)?;
            if !seen.insert(element.key.clone()) {
                return Err(format!("duplicate {} value {:?}", target.merge_key, element.key));
            }
            replacement.extend(element.lines);
        }

        Ok(ArrayEdit {
            key_line: key.line,
            value_start_line: start,
            value_end_line: end,
            key_column: key.col,
            replacement,
            candidate: target.values_path.clone(),
            empty: false,
        })
    }

    /// Last line of a mapping entry whose key is on `key_line`, given the
    /// line of the next sibling key.
    fn entry_end(&self, key_line: usize, next: usize, content_col: usize) -> usize {
        (key_line + 1..next)
            .rev()
            .find(|&i| !is_blank_or_comment(self.lines[i]) && indent(self.lines[i]) > content_col)
            .unwrap_or(key_line)
    }

    fn element(
        &self,
        item: &Node,
        first: usize,
        last: usize,
        new_col: usize,
        target: &TransformTarget,
    ) -> Result<ConvertedElement, String> {
        let Some(entries) = item.entries() else {
            return Err("list element is not an object".to_string());
        };
        if item.is_flow(&self.lines) {
            return Err("flow style element".to_string());
        }
        if item.line != first {
            return Err("unsupported element layout".to_string());
        }
        let content_col = item.col;
        let Some(idx) = entries
            .iter()
            .position(|(k, _)| k.as_scalar() == Some(target.merge_key.as_str()))
        else {
            return Err(format!("element without {}", target.merge_key));
        };
        let (merge_k, merge_v) = &entries[idx];
        let Some(merge_value) = merge_v.as_scalar() else {
            return Err(format!("non-scalar {}", target.merge_key));
        };

        let next_key_line = |i: usize| entries.get(i + 1).map_or(last + 1, |(k, _)| k.line);
        let merge_end = self.entry_end(merge_k.line, next_key_line(idx), content_col);
        let comment = if merge_end == merge_k.line {
            let line = self.lines[merge_k.line];
            let from = byte_at(line, merge_v.col);
            comment_start(&line[from..]).map(|c| line[from + c..].trim_end().to_string())
        } else {
            None
        };

        let delta = (new_col + 2) as isize - content_col as isize;
        let mut body: Vec<(usize, String)> = Vec::new();
        for i in first..=last {
            if (merge_k.line..=merge_end).contains(&i) {
                continue;
            }
            let line = self.lines[i];
            let line = if i == first {
                let cut = byte_at(line, content_col);
                format!("{}{}", " ".repeat(content_col), &line[cut..])
            } else {
                line.to_string()
            };
            body.push((i, shift(&line, delta)));
        }
        // Blank lines between elements stay after the element.
        let content: Vec<usize> = body
            .iter()
            .filter(|(_, l)| !is_blank_or_comment(l))
            .map(|(i, _)| *i)
            .collect();

        let map_key = map_key(merge_value);
        let pad = " ".repeat(new_col);
        let with_comment = |head: String| match &comment {
            Some(c) => format!("{head} {c}"),
            None => head,
        };

        let compact = target.promote_scalar.as_deref().and_then(|field| {
            if comment.is_some() || entries.len() != 2 || content.len() != 1 {
                return None;
            }
            let (k, v) = &entries[1 - idx];
            if k.as_scalar() != Some(field) || v.as_scalar().is_none() || v.line != content[0] {
                return None;
            }
            let line = self.lines[v.line];
            Some(line[byte_at(line, v.col)..].trim_end().to_string())
        });

        let mut lines = Vec::with_capacity(body.len() + 1);
        if let Some(scalar) = compact {
            lines.push(format!("{pad}{map_key}: {scalar}"));
            lines.extend(
                body.into_iter()
                    .filter(|(i, _)| *i != content[0])
                    .map(|(_, l)| l),
            );
        } else if content.is_empty() {
            lines.push(with_comment(format!("{pad}{map_key}: {{}}")));
            lines.extend(body.into_iter().map(|(_, l)| l));
        } else {
            lines.push(with_comment(format!("{pad}{map_key}:")));
            lines.extend(body.into_iter().map(|(_, l)| l));
        }
        Ok(ConvertedElement {
            key: merge_value.to_string(),
            lines,
        })
    }
}

struct ConvertedElement {
    key: String,
    lines: Vec<String>,
}

/// End (exclusive) of the stale commented-out examples below an empty list.
fn stale_comment_end(lines: &[String], from: usize, key_col: usize) -> usize {
    let mut last_comment = None;
    for (i, line) in lines.iter().enumerate().skip(from) {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        if t.starts_with('#') && indent(line) > key_col {
            last_comment = Some(i);
            continue;
        }
        break;
    }
    let Some(last) = last_comment else {
        return from;
    };
    let mut end = last + 1;
    // Collapse one blank-line gap left behind by the removal.
    let blank = |i: usize| lines.get(i).is_some_and(|l| l.trim().is_empty());
    if from > 0 && blank(end) && (blank(from - 1) || blank(end + 1)) {
        end += 1;
    }
    end
}

/// Splice `edits` into `src`, bottom to top.
#[must_use]
pub fn apply_edits(src: &str, edits: &[ArrayEdit]) -> String {
    let newline = if src.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = src.lines().map(ToString::to_string).collect();

    let mut ordered: Vec<&ArrayEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.key_line.cmp(&a.key_line));
    for edit in ordered {
        if edit.value_end_line >= lines.len() || edit.key_line > edit.value_end_line {
            continue;
        }
        let mut end = edit.value_end_line + 1;
        if edit.empty {
            end = stale_comment_end(&lines, end, edit.key_column);
        }
        lines.splice(edit.key_line..end, edit.replacement.iter().cloned());
    }

    let mut out = lines.join(newline);
    if src.ends_with('\n') {
        out.push_str(newline);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifting() {
        assert_eq!(shift("    value: x", 2), "      value: x");
        assert_eq!(shift("    value: x", -2), "  value: x");
        assert_eq!(shift(" value: x", -4), "value: x");
        assert_eq!(shift("   ", 2), "");
    }

    #[test]
    fn stale_comments_and_gap() {
        let lines: Vec<String> = ["env: {}", "  # - name: A", "", "", "b: 1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(stale_comment_end(&lines, 1, 0), 3);

        let lines: Vec<String> = ["env: {}", "other: 1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(stale_comment_end(&lines, 1, 0), 1);
    }
}
