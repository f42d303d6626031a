use std::collections::BTreeSet;

use crate::catalog::{TypeSignature, catalog};

/// Minimum share of the element's fields that must be known to the catalog type.
pub const MIN_SCORE: f64 = 0.5;
/// Minimum number of fields shared with the catalog type.
pub const MIN_OVERLAP: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicMatch {
    pub signature: &'static TypeSignature,
    pub overlap: usize,
    pub score: f64,
}

/// Overlap count and score of `element_fields` against `catalog_fields`.
///
/// The score is relative to the element, so an element carrying a few custom
/// fields on top of a known shape still scores high.
#[must_use]
pub fn score(element_fields: &BTreeSet<String>, catalog_fields: &[&str]) -> (usize, f64) {
    if element_fields.is_empty() {
        return (0, 0.0);
    }
    let overlap = element_fields
        .iter()
        .filter(|f| catalog_fields.contains(&f.as_str()))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let score = overlap as f64 / element_fields.len() as f64;
    (overlap, score)
}

#[must_use]
pub fn accepts(overlap: usize, score: f64) -> bool {
    overlap >= MIN_OVERLAP && score >= MIN_SCORE
}

/// Best catalog type for a list element with the given property names.
///
/// Only catalog types whose merge key is among the element's fields are
/// considered. Ties on score keep the earlier catalog entry.
#[must_use]
pub fn match_element(element_fields: &BTreeSet<String>) -> Option<HeuristicMatch> {
    match_element_in(element_fields, catalog())
}

#[must_use]
pub fn match_element_in(
    element_fields: &BTreeSet<String>,
    signatures: &'static [TypeSignature],
) -> Option<HeuristicMatch> {
    let mut best: Option<HeuristicMatch> = None;
    for signature in signatures {
        if !element_fields.contains(signature.merge_key) {
            continue;
        }
        let (overlap, score) = score(element_fields, signature.fields);
        if !accepts(overlap, score) {
            continue;
        }
        let better = match &best {
            Some(b) => score > b.score,
            None => true,
        };
        if better {
            best = Some(HeuristicMatch {
                signature,
                overlap,
                score,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn accepts_key_plus_two_shared_fields() {
        let m = match_element(&fields(&["name", "value", "valueFrom", "description"]))
            .expect("match");
        assert_eq!(m.signature.name, "EnvVar");
        assert_eq!(m.overlap, 3);
        assert!((m.score - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_key_plus_one_shared_field_even_with_perfect_score() {
        assert!(match_element(&fields(&["name", "value"])).is_none());
    }

    #[test]
    fn rejects_low_score() {
        let m = match_element(&fields(&[
            "name", "value", "valueFrom", "a", "b", "c", "d",
        ]));
        assert!(m.is_none());
    }

    #[test]
    fn requires_merge_key_present() {
        // Shares three VolumeMount fields but not `mountPath`.
        assert!(match_element(&fields(&["name", "subPath", "readOnly"])).is_none());
    }

    #[test]
    fn picks_highest_score() {
        let m = match_element(&fields(&["name", "containerPort", "protocol", "hostPort"]))
            .expect("match");
        assert_eq!(m.signature.name, "ContainerPort");
    }

    #[test]
    fn threshold_boundaries() {
        assert!(accepts(3, 0.5));
        assert!(!accepts(2, 1.0));
        assert!(!accepts(3, 0.49));
    }
}
