//! User override rules and their glob matching.

use helm_mapify_core::OverrideRule;
use serde::{Deserialize, Serialize};

const LIST_SUFFIX: &str = "[]";

/// Rightmost-anchored glob match of a rule pattern against a `path[]`.
///
/// Segments are compared from the end; `*` matches exactly one segment. The
/// pattern may be longer than the path only when the extra leading segments
/// are all `*`.
#[must_use]
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let path: Vec<&str> = path.split('.').collect();

    let aligned = pattern
        .iter()
        .rev()
        .zip(path.iter().rev())
        .all(|(p, s)| segment_match(p, s));
    if !aligned {
        return false;
    }
    let leftover = pattern.len().saturating_sub(path.len());
    pattern[..leftover].iter().all(|p| *p == "*")
}

fn segment_match(pattern: &str, segment: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    // `*[]` matches any list segment.
    if pattern == "*[]" {
        return segment.ends_with(LIST_SUFFIX);
    }
    pattern == segment
}

/// Ordered override rules; the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<OverrideRule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    /// First rule matching `values_path`.
    #[must_use]
    pub fn find(&self, values_path: &str) -> Option<&OverrideRule> {
        let path = format!("{values_path}{LIST_SUFFIX}");
        self.rules
            .iter()
            .filter(|rule| rule.merge_key().is_some())
            .find(|rule| {
                let pattern = rule.path_pattern.trim();
                if pattern.ends_with(LIST_SUFFIX) {
                    glob_match(pattern, &path)
                } else {
                    glob_match(&format!("{pattern}{LIST_SUFFIX}"), &path)
                }
            })
    }

    pub fn push(&mut self, rule: OverrideRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<OverrideRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = OverrideRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
