//! Append-only override rule store (`rules.yaml`).

use std::io::Write;
use std::path::Path;

use helm_mapify_core::OverrideRule;
use helm_mapify_mapper::RuleSet;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// Load the rule store; a missing file is an empty rule set.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> CliResult<RuleSet> {
    if !path.is_file() {
        debug!(path = %path.display(), "no rule store");
        return Ok(RuleSet::default());
    }
    let src = std::fs::read_to_string(path)?;
    let rules = serde_yaml::from_str::<Option<RuleSet>>(&src)
        .map_err(|source| CliError::InvalidRules {
            path: path.to_path_buf(),
            source,
        })?
        .unwrap_or_default();
    Ok(rules)
}

/// Normalize a user-supplied rule: the pattern gets a trailing `[]` and keys
/// are trimmed.
///
/// # Errors
///
/// Fails for an empty pattern or an empty key list.
pub fn normalize(mut rule: OverrideRule) -> CliResult<OverrideRule> {
    rule.path_pattern = rule.path_pattern.trim().to_string();
    if rule.path_pattern.trim_end_matches("[]").is_empty() {
        return Err(CliError::InvalidRule {
            reason: "empty path pattern".to_string(),
        });
    }
    if !rule.path_pattern.ends_with("[]") {
        rule.path_pattern.push_str("[]");
    }
    rule.unique_keys = rule
        .unique_keys
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if rule.unique_keys.is_empty() {
        return Err(CliError::InvalidRule {
            reason: format!("no key given for {}", rule.path_pattern),
        });
    }
    Ok(rule)
}

/// Append `rule` to the store. Existing entries are never rewritten; an
/// identical rule is not added twice.
///
/// Returns whether the rule was added.
///
/// # Errors
///
/// Fails if the store cannot be read or written.
pub fn append(path: &Path, rule: OverrideRule) -> CliResult<bool> {
    let rule = normalize(rule)?;
    let existing = load(path)?;
    if existing.rules().contains(&rule) {
        info!(pattern = %rule.path_pattern, "rule already present");
        return Ok(false);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let needs_newline = std::fs::read(path)
        .map(|bytes| bytes.last().is_some_and(|b| *b != b'\n'))
        .unwrap_or(false);
    let entry = serde_yaml::to_string(&vec![&rule])?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if needs_newline {
        file.write_all(b"\n")?;
    }
    file.write_all(entry.as_bytes())?;
    info!(pattern = %rule.path_pattern, path = %path.display(), "added rule");
    Ok(true)
}
