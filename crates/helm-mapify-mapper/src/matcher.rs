//! Cross-references template directives with the schema resolver.

use std::collections::HashSet;

use helm_mapify_core::{
    DetectedCandidate, FieldDescriptor, OverrideRule, UndetectedCategory, UndetectedUsage,
    split_path, suggested_override,
};
use helm_mapify_k8s::{Resolution, SchemaResolver, SchemaSource};
use helm_mapify_template::expr::{self, Expr, Target};
use helm_mapify_template::scan::scan_actions;
use helm_mapify_template::{
    DefineIndex, ParsedTemplate, TemplateDirective, UsagePattern, ValuesUsage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::rules::RuleSet;

/// Maximum depth of nested `include` resolution.
pub const MAX_INCLUDE_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub candidates: Vec<DetectedCandidate>,
    pub undetected: Vec<UndetectedUsage>,
}

/// Accumulates candidates over the templates of one chart.
pub struct Matcher<'a, R> {
    resolver: R,
    rules: &'a RuleSet,
    defines: &'a DefineIndex,
    seen: HashSet<String>,
    seen_undetected: HashSet<(String, UndetectedCategory)>,
    outcome: MatchOutcome,
}

/// Values paths one directive renders, with how they are used.
fn usage(target: &Target, scope: Option<&str>, direct: UsagePattern) -> Option<ValuesUsage> {
    let values_path = target.values_path(scope)?;
    let pattern = match (target, direct) {
        (Target::Values(_), pattern) => pattern,
        (_, UsagePattern::DirectRender) => UsagePattern::ScopedRender,
        (_, pattern) => pattern,
    };
    Some(ValuesUsage {
        values_path,
        pattern,
    })
}

/// Section name and manifest path of a rendering: the last key of the YAML
/// path, or the last values segment when the action sits at the document root.
fn section_path(yaml_path: &str, values_path: &str) -> (String, String) {
    if let Some(section) = split_path(yaml_path).last().map(ToString::to_string) {
        return (section, yaml_path.to_string());
    }
    let section = split_path(values_path)
        .last()
        .map(ToString::to_string)
        .unwrap_or_default();
    (section.clone(), section)
}

impl<'a, R> Matcher<'a, R>
where
    R: SchemaResolver,
{
    pub fn new(resolver: R, rules: &'a RuleSet, defines: &'a DefineIndex) -> Self {
        Self {
            resolver,
            rules,
            defines,
            seen: HashSet::new(),
            seen_undetected: HashSet::new(),
            outcome: MatchOutcome::default(),
        }
    }

    /// Usages of one action, following `include` into named templates.
    fn action_usages(
        &self,
        text: &str,
        scope: Option<&str>,
        depth: usize,
        visited: &mut Vec<String>,
    ) -> Vec<ValuesUsage> {
        match expr::parse(text) {
            Expr::Render { target } => usage(&target, scope, UsagePattern::DirectRender)
                .into_iter()
                .collect(),
            Expr::Range { target, pairs } => {
                let pattern = if pairs {
                    UsagePattern::RangePairs
                } else {
                    UsagePattern::RangeList
                };
                usage(&target, scope, pattern).into_iter().collect()
            }
            Expr::With { target } => usage(&target, scope, UsagePattern::ScopeOpen)
                .into_iter()
                .collect(),
            Expr::Include { name, arg } => {
                if depth >= MAX_INCLUDE_DEPTH || visited.contains(&name) {
                    trace!(name = %name, depth, "include recursion stopped");
                    return Vec::new();
                }
                let Some(define) = self.defines.get(&name) else {
                    return Vec::new();
                };
                let inner_scope = match arg {
                    Target::Dot => scope.map(ToString::to_string),
                    other => other.values_path(scope),
                };
                visited.push(name);
                let found =
                    self.body_usages(&define.body, inner_scope.as_deref(), depth + 1, visited);
                visited.pop();
                found
            }
            _ => Vec::new(),
        }
    }

    /// Usages inside a named template body, tracking its own `with` and
    /// `range` blocks.
    fn body_usages(
        &self,
        body: &str,
        scope: Option<&str>,
        depth: usize,
        visited: &mut Vec<String>,
    ) -> Vec<ValuesUsage> {
        // `None` entries do not rebind `.`; `Some(None)` hides the scope.
        let mut scopes: Vec<Option<Option<String>>> = Vec::new();
        let mut found = Vec::new();
        for action in scan_actions(body) {
            let text = action.text(body);
            let current: Option<String> = match scopes.iter().rev().find_map(Clone::clone) {
                Some(inner) => inner,
                None => scope.map(ToString::to_string),
            };
            found.extend(self.action_usages(text, current.as_deref(), depth, visited));
            match expr::parse(text) {
                Expr::With { target } => {
                    scopes.push(Some(target.values_path(current.as_deref())));
                }
                Expr::Range { .. } => scopes.push(Some(None)),
                Expr::If | Expr::Define { .. } | Expr::Block { .. } => scopes.push(None),
                Expr::End => {
                    scopes.pop();
                }
                _ => {}
            }
        }
        found
    }

    /// Classify every directive of one parsed template.
    pub fn add_template(&mut self, source_file: &str, parsed: &ParsedTemplate) {
        for directive in &parsed.directives {
            let mut visited = Vec::new();
            let usages =
                self.action_usages(&directive.expr, directive.scope.as_deref(), 0, &mut visited);
            for usage in usages {
                if !usage.is_list_use() {
                    continue;
                }
                self.classify(source_file, directive, &usage);
            }
        }
    }

    fn classify(&mut self, source_file: &str, directive: &TemplateDirective, usage: &ValuesUsage) {
        let values_path = usage.values_path.as_str();
        if self.seen.contains(values_path) {
            return;
        }
        let (section_name, path) = section_path(&directive.yaml_path, values_path);
        let rules = self.rules;
        let rule = rules.find(values_path);

        let (category, reason) = match directive.resource.as_ref() {
            None => (
                UndetectedCategory::UnknownType,
                "resource kind is not declared literally".to_string(),
            ),
            Some(resource) => {
                let resolution = self.resolver.resolve(resource, &path);
                debug!(
                    values_path,
                    path = %path,
                    resource = %resource,
                    ?resolution,
                    pattern = usage.pattern.as_str(),
                    "resolved list usage"
                );
                match resolution {
                    Resolution::Keyed(field) => {
                        let promote_scalar = rule
                            .filter(|r| r.merge_key() == Some(field.merge_key.as_str()))
                            .and_then(|r| r.promote_scalar.clone());
                        self.accept(
                            source_file,
                            directive,
                            values_path,
                            field,
                            section_name,
                            promote_scalar,
                        );
                        return;
                    }
                    Resolution::NotList => {
                        trace!(values_path, path = %path, "not a list, dropped");
                        return;
                    }
                    Resolution::NoKey { source } => {
                        let (category, origin) = match source {
                            SchemaSource::Builtin => {
                                (UndetectedCategory::K8sNoKeys, "built-in schema")
                            }
                            SchemaSource::Extension => {
                                (UndetectedCategory::CrdNoKeys, "CRD schema")
                            }
                        };
                        (
                            category,
                            format!(
                                "{resource} {path} is a list without a unique key in the {origin}"
                            ),
                        )
                    }
                    Resolution::VersionMismatch { available } => (
                        UndetectedCategory::MissingSchema,
                        format!(
                            "no schema loaded for {resource}; available versions: {}",
                            available.join(", ")
                        ),
                    ),
                    Resolution::MissingSchema => (
                        UndetectedCategory::MissingSchema,
                        format!("no schema loaded for {resource}"),
                    ),
                    Resolution::NotFound { reason } => (UndetectedCategory::UnknownType, reason),
                }
            }
        };

        match rule {
            Some(rule) => {
                self.accept_rule(source_file, directive, values_path, rule, section_name, path);
            }
            None => self.undetected(source_file, directive, values_path, category, reason),
        }
    }

    fn accept(
        &mut self,
        source_file: &str,
        directive: &TemplateDirective,
        values_path: &str,
        field: FieldDescriptor,
        section_name: String,
        promote_scalar: Option<String>,
    ) {
        debug!(values_path, merge_key = %field.merge_key, "detected candidate");
        self.seen.insert(values_path.to_string());
        self.outcome.candidates.push(DetectedCandidate {
            values_path: values_path.to_string(),
            yaml_path: field.path,
            merge_key: field.merge_key,
            element_type: field.element_type,
            section_name,
            resource: directive.resource.clone(),
            source_file: source_file.to_string(),
            exists_in_values: false,
            promote_scalar,
        });
    }

    fn accept_rule(
        &mut self,
        source_file: &str,
        directive: &TemplateDirective,
        values_path: &str,
        rule: &OverrideRule,
        section_name: String,
        path: String,
    ) {
        let Some(merge_key) = rule.merge_key() else {
            return;
        };
        let field = FieldDescriptor {
            path,
            is_list: true,
            element_type: "override".to_string(),
            merge_key: merge_key.to_string(),
        };
        let promote_scalar = rule.promote_scalar.clone();
        self.accept(
            source_file,
            directive,
            values_path,
            field,
            section_name,
            promote_scalar,
        );
    }

    fn undetected(
        &mut self,
        source_file: &str,
        directive: &TemplateDirective,
        values_path: &str,
        category: UndetectedCategory,
        reason: String,
    ) {
        if !self
            .seen_undetected
            .insert((values_path.to_string(), category))
        {
            return;
        }
        debug!(values_path, %category, %reason, "undetected list usage");
        self.outcome.undetected.push(UndetectedUsage {
            values_path: values_path.to_string(),
            source_file: source_file.to_string(),
            line: directive.line,
            category,
            reason,
            suggested_override: suggested_override(values_path, None),
        });
    }

    /// Candidates and diagnostics; diagnostics for paths that were detected
    /// elsewhere are dropped.
    #[must_use]
    pub fn finish(self) -> MatchOutcome {
        let Self { seen, mut outcome, .. } = self;
        outcome
            .undetected
            .retain(|u| !seen.contains(&u.values_path));
        outcome
    }
}

/// Match a single template without named-template context.
pub fn match_template<R: SchemaResolver>(
    source_file: &str,
    parsed: &ParsedTemplate,
    resolver: R,
    rules: &RuleSet,
) -> MatchOutcome {
    let defines = DefineIndex::new();
    let mut matcher = Matcher::new(resolver, rules, &defines);
    matcher.add_template(source_file, parsed);
    matcher.finish()
}
