use std::collections::HashMap;

use crate::expr::{self, Expr};
use crate::scan::scan_actions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineEntry {
    pub name: String,
    /// Template text between `{{ define }}` and its `{{ end }}`.
    pub body: String,
    pub source_file: String,
}

/// Named templates (`define`/`block`) of a chart, by name.
#[derive(Debug, Clone, Default)]
pub struct DefineIndex {
    map: HashMap<String, DefineEntry>,
}

impl DefineIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every named template in `src`. Later definitions win, as in Helm.
    pub fn add_source(&mut self, src: &str, source_file: &str) {
        let actions = scan_actions(src);
        // (name, body start, depth at which the define was opened)
        let mut open: Vec<(String, usize, usize)> = Vec::new();
        let mut depth = 0usize;
        for action in &actions {
            let parsed = expr::parse(action.text(src));
            match parsed {
                Expr::Define { ref name } | Expr::Block { ref name } => {
                    open.push((name.clone(), action.end, depth));
                    depth += 1;
                }
                Expr::End => {
                    depth = depth.saturating_sub(1);
                    if open.last().is_some_and(|(_, _, d)| *d == depth)
                        && let Some((name, body_start, _)) = open.pop()
                    {
                        self.insert(DefineEntry {
                            name,
                            body: src[body_start..action.start].to_string(),
                            source_file: source_file.to_string(),
                        });
                    }
                }
                other if other.opens_block() => depth += 1,
                _ => {}
            }
        }
    }

    pub fn insert(&mut self, e: DefineEntry) {
        self.map.insert(e.name.clone(), e);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DefineEntry> {
        self.map.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn indexes_nested_defines() {
        let src = indoc! {r#"
            {{- define "app.env" -}}
            {{- with .Values.env }}
            {{- toYaml . }}
            {{- end }}
            {{- end -}}

            {{- define "app.name" -}}
            {{ .Chart.Name }}
            {{- end -}}
        "#};
        let mut index = DefineIndex::new();
        index.add_source(src, "_helpers.tpl");
        assert_eq!(index.len(), 2);
        let env = index.get("app.env").expect("define");
        assert!(env.body.contains("toYaml ."));
        assert!(env.body.contains("{{- end }}"));
        assert!(!index.get("app.name").expect("define").body.contains("define"));
    }
}
