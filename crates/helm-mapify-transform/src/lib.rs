//! Line-preserving conversion of keyed lists into maps in YAML values files.
//!
//! Only the line ranges of converted fields are rewritten; every other line
//! of the input is kept byte for byte.

pub mod edit;
pub mod quote;
pub mod tree;

pub use edit::{ArrayEdit, EditPlan, SkippedField, TransformTarget, apply_edits, compute_edits};

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("invalid YAML: {0}")]
    Parse(#[from] yaml_rust::ScanError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub text: String,
    /// Values paths that were rewritten.
    pub converted: Vec<String>,
    pub skipped: Vec<SkippedField>,
}

impl Transformed {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.converted.is_empty()
    }
}

/// Convert every target present as a list in the first document of `src`.
///
/// # Errors
///
/// Returns an error if `src` is not valid YAML.
pub fn transform(src: &str, targets: &[TransformTarget]) -> Result<Transformed, TransformError> {
    let documents = tree::parse(src)?;
    let Some(root) = documents.first() else {
        return Ok(Transformed {
            text: src.to_string(),
            converted: Vec::new(),
            skipped: Vec::new(),
        });
    };
    let plan = compute_edits(src, root, targets);
    let converted = plan.edits.iter().map(|e| e.candidate.clone()).collect();
    Ok(Transformed {
        text: apply_edits(src, &plan.edits),
        converted,
        skipped: plan.skipped,
    })
}
