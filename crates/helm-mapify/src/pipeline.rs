//! Detection and conversion of one chart and, recursively, its subcharts.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use helm_mapify_chart::model::read_to_string;
use helm_mapify_chart::{Chart, LinkKind, LinkOptions, SubchartLink, archive, collect_links};
use helm_mapify_core::{DetectedCandidate, UndetectedUsage, split_path};
use helm_mapify_k8s::Registry;
use helm_mapify_k8s::resolver::chain;
use helm_mapify_mapper::{Matcher, RuleSet};
use helm_mapify_template::{
    DefineIndex, HELPER_FILE, HELPER_TEMPLATE, Rewrite, RewriteOutcome, RewriteRequest, analyze,
    rewrite,
};
use helm_mapify_transform::{TransformTarget, transform};
use serde::Serialize;
use tracing::{debug, info, warn};
use vfs::VfsPath;

use crate::backup::{DEFAULT_BACKUP_SUFFIX, write_with_backup};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct Options {
    /// Report what would change without writing anything.
    pub dry_run: bool,
    /// Convert subcharts and fold their conversions into parent values.
    pub recursive: bool,
    pub include_embedded: bool,
    pub include_linked: bool,
    /// Report packaged `.tgz` subcharts under `charts/`.
    pub include_archived: bool,
    pub expand_archived: bool,
    pub backup_suffix: String,
    /// Extra CRD schema files or directories.
    pub schema_sources: Vec<PathBuf>,
    pub rules: RuleSet,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dry_run: false,
            recursive: false,
            include_embedded: true,
            include_linked: true,
            include_archived: true,
            expand_archived: false,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            schema_sources: Vec::new(),
            rules: RuleSet::default(),
        }
    }
}

impl Options {
    fn link_options(&self) -> LinkOptions {
        LinkOptions {
            embedded: self.include_embedded,
            linked: self.include_linked,
            archived: self.include_archived,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectReport {
    pub chart: String,
    pub candidates: Vec<DetectedCandidate>,
    pub undetected: Vec<UndetectedUsage>,
    pub links: Vec<SubchartLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedField {
    pub values_path: String,
    pub merge_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promote_scalar: Option<String>,
    /// Templates rewritten for this field.
    pub templates: Vec<String>,
    /// Whether the values file held the field as a list and was converted.
    pub values_changed: bool,
}

impl ConvertedField {
    fn target(&self) -> TransformTarget {
        TransformTarget {
            values_path: self.values_path.clone(),
            merge_key: self.merge_key.clone(),
            promote_scalar: self.promote_scalar.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCandidate {
    pub values_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubchartReport {
    pub link: SubchartLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ConvertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SubchartReport {
    fn note(link: SubchartLink, note: impl Into<String>) -> Self {
        Self {
            link,
            report: None,
            error: None,
            note: Some(note.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvertReport {
    pub chart: String,
    pub dry_run: bool,
    pub converted: Vec<ConvertedField>,
    /// Subchart fields converted in this chart's values under their prefix.
    pub folded: Vec<ConvertedField>,
    pub skipped: Vec<SkippedCandidate>,
    pub undetected: Vec<UndetectedUsage>,
    pub subcharts: Vec<SubchartReport>,
    /// Chart-relative files whose content changed.
    pub files_changed: Vec<String>,
    /// Files actually written; empty on a dry run.
    pub files_written: Vec<String>,
}

impl ConvertReport {
    /// Whether this chart or any subchart reported an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.subcharts.iter().any(|s| {
            s.error.is_some() || s.report.as_ref().is_some_and(ConvertReport::has_errors)
        })
    }

    /// Fields a parent chart overrides under this chart's prefix.
    fn foldable(&self) -> Vec<ConvertedField> {
        self.converted
            .iter()
            .chain(&self.folded)
            .cloned()
            .collect()
    }
}

struct TemplateSource {
    rel: String,
    path: VfsPath,
    text: String,
    manifest: bool,
}

impl TemplateSource {
    fn is_helper(&self) -> bool {
        self.path.filename() == HELPER_FILE
    }
}

struct Analysis {
    chart: Chart,
    sources: Vec<TemplateSource>,
    values_src: Option<String>,
    candidates: Vec<DetectedCandidate>,
    undetected: Vec<UndetectedUsage>,
}

/// Whether `values` holds a list at the dotted `path`.
fn list_at(values: &serde_yaml::Value, path: &str) -> bool {
    let mut node = values;
    for segment in split_path(path) {
        match node.get(segment) {
            Some(next) => node = next,
            None => return false,
        }
    }
    node.is_sequence()
}

fn request(candidate: &DetectedCandidate) -> RewriteRequest<'_> {
    RewriteRequest {
        values_path: &candidate.values_path,
        merge_key: &candidate.merge_key,
        section_name: &candidate.section_name,
        promote_scalar: candidate.promote_scalar.as_deref(),
    }
}

/// Rewrite every template rendering one candidate.
///
/// Returns the new texts and the rewritten files, or why the candidate must
/// be left alone.
fn rewrite_candidate(
    sources: &[TemplateSource],
    texts: &[String],
    candidate: &DetectedCandidate,
) -> Result<(Vec<String>, Vec<String>), String> {
    let mut next = texts.to_vec();
    let mut files = Vec::new();
    let mut found = false;
    for (i, source) in sources.iter().enumerate() {
        if source.is_helper() {
            continue;
        }
        let Rewrite { text, outcome } = rewrite(&texts[i], request(candidate));
        match outcome {
            RewriteOutcome::Rewritten { .. } => {
                next[i] = text;
                files.push(source.rel.clone());
                found = true;
            }
            RewriteOutcome::AlreadyConverted => found = true,
            RewriteOutcome::NoUsage => {}
            RewriteOutcome::Skipped { reason } => {
                return Err(format!("{}: {reason}", source.rel));
            }
        }
    }
    if !found {
        return Err("no rewritable rendering found in templates".to_string());
    }
    Ok((next, files))
}

struct RewritePass {
    texts: Vec<String>,
    results: Vec<Result<Vec<String>, String>>,
}

fn rewrite_all(sources: &[TemplateSource], candidates: &[&DetectedCandidate]) -> RewritePass {
    let mut texts: Vec<String> = sources.iter().map(|s| s.text.clone()).collect();
    let mut results = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match rewrite_candidate(sources, &texts, candidate) {
            Ok((next, files)) => {
                texts = next;
                results.push(Ok(files));
            }
            Err(reason) => results.push(Err(reason)),
        }
    }
    RewritePass { texts, results }
}

fn prefixed(prefix: &str, field: &ConvertedField) -> ConvertedField {
    ConvertedField {
        values_path: format!("{prefix}.{}", field.values_path),
        merge_key: field.merge_key.clone(),
        promote_scalar: field.promote_scalar.clone(),
        templates: Vec::new(),
        values_changed: false,
    }
}

pub struct Pipeline {
    registry: Registry,
    options: Options,
}

impl Pipeline {
    /// Build a pipeline with a fresh registry loaded from
    /// `options.schema_sources`. Sources that fail to load are logged and
    /// skipped.
    #[must_use]
    pub fn new(options: Options) -> Self {
        let mut registry = Registry::new();
        for source in &options.schema_sources {
            match registry.load_path(source) {
                Ok(loaded) => debug!(path = %source.display(), loaded, "loaded schemas"),
                Err(err) => {
                    warn!(path = %source.display(), error = %err, "skipping schema source");
                }
            }
        }
        Self::with_registry(registry, options)
    }

    #[must_use]
    pub fn with_registry(registry: Registry, options: Options) -> Self {
        Self { registry, options }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    fn load_chart(chart_dir: &VfsPath) -> PipelineResult<Chart> {
        if !chart_dir.exists()? {
            return Err(PipelineError::ChartNotFound {
                path: chart_dir.as_str().to_string(),
            });
        }
        Ok(Chart::load(chart_dir)?)
    }

    fn analyze(&self, chart: Chart) -> PipelineResult<Analysis> {
        let manifests: BTreeSet<String> = chart
            .manifest_templates()?
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        let mut sources = Vec::new();
        for path in chart.template_sources()? {
            match read_to_string(&path) {
                Ok(text) => sources.push(TemplateSource {
                    rel: chart.relative(&path),
                    manifest: manifests.contains(path.as_str()),
                    path,
                    text,
                }),
                Err(err) => {
                    warn!(path = path.as_str(), error = %err, "skipping unreadable template");
                }
            }
        }

        let mut defines = DefineIndex::new();
        for source in &sources {
            defines.add_source(&source.text, &source.rel);
        }
        let mut matcher = Matcher::new(chain(&self.registry), &self.options.rules, &defines);
        for source in sources.iter().filter(|s| s.manifest) {
            matcher.add_template(&source.rel, &analyze(&source.text));
        }
        let outcome = matcher.finish();

        let values_file = chart.values_file()?;
        let values_src = if values_file.is_file()? {
            Some(read_to_string(&values_file)?)
        } else {
            None
        };
        let values = values_src.as_deref().and_then(|src| {
            serde_yaml::from_str::<serde_yaml::Value>(src)
                .inspect_err(|err| {
                    warn!(path = values_file.as_str(), error = %err, "values file is not valid YAML");
                })
                .ok()
        });
        let mut candidates = outcome.candidates;
        for candidate in &mut candidates {
            candidate.exists_in_values = values
                .as_ref()
                .is_some_and(|v| list_at(v, &candidate.values_path));
        }

        Ok(Analysis {
            chart,
            sources,
            values_src,
            candidates,
            undetected: outcome.undetected,
        })
    }

    /// Report convertible lists and diagnostics without touching the chart.
    ///
    /// # Errors
    ///
    /// Fails when `chart_dir` is not a readable chart.
    pub fn detect(&self, chart_dir: &VfsPath) -> PipelineResult<DetectReport> {
        let chart = Self::load_chart(chart_dir)?;
        let links = collect_links(&chart, self.options.link_options())?;
        let analysis = self.analyze(chart)?;
        Ok(DetectReport {
            chart: analysis.chart.name(),
            candidates: analysis.candidates,
            undetected: analysis.undetected,
            links,
        })
    }

    /// Convert `chart_dir`, and its subcharts when `recursive` is set.
    ///
    /// Failures inside a subchart are recorded in its [`SubchartReport`] and
    /// do not abort the run.
    ///
    /// # Errors
    ///
    /// Fails when `chart_dir` is not a readable chart or its values file
    /// cannot be converted or written.
    pub fn convert(&self, chart_dir: &VfsPath) -> PipelineResult<ConvertReport> {
        let chart = Self::load_chart(chart_dir)?;
        let mut visited = HashMap::new();
        self.convert_chart(chart, &mut visited)
    }

    fn convert_subcharts(
        &self,
        chart: &Chart,
        visited: &mut HashMap<String, Vec<ConvertedField>>,
    ) -> PipelineResult<(Vec<SubchartReport>, Vec<ConvertedField>)> {
        let mut reports = Vec::new();
        let mut folded = Vec::new();
        for link in collect_links(chart, self.options.link_options())? {
            let dir = if link.kinds == [LinkKind::Archived] {
                if !self.options.expand_archived {
                    reports.push(SubchartReport::note(link, "archived chart not expanded"));
                    continue;
                }
                if self.options.dry_run {
                    reports.push(SubchartReport::note(
                        link,
                        "archived chart would be expanded",
                    ));
                    continue;
                }
                match archive::expand(&link.path, &self.options.backup_suffix) {
                    Ok(dir) => dir,
                    Err(err) => {
                        warn!(path = link.path.as_str(), error = %err, "failed to expand subchart");
                        reports.push(SubchartReport {
                            link,
                            report: None,
                            error: Some(err.to_string()),
                            note: None,
                        });
                        continue;
                    }
                }
            } else {
                link.path.clone()
            };

            if let Some(fields) = visited.get(dir.as_str()) {
                folded.extend(fields.iter().map(|f| prefixed(&link.prefix, f)));
                reports.push(SubchartReport::note(link, "already converted in this run"));
                continue;
            }

            let result = Chart::load(&dir)
                .map_err(PipelineError::from)
                .and_then(|sub| self.convert_chart(sub, visited));
            match result {
                Ok(report) => {
                    folded.extend(report.foldable().iter().map(|f| prefixed(&link.prefix, f)));
                    reports.push(SubchartReport {
                        link,
                        report: Some(report),
                        error: None,
                        note: None,
                    });
                }
                Err(err) => {
                    warn!(path = dir.as_str(), error = %err, "failed to convert subchart");
                    reports.push(SubchartReport {
                        link,
                        report: None,
                        error: Some(err.to_string()),
                        note: None,
                    });
                }
            }
        }
        Ok((reports, folded))
    }

    fn convert_chart(
        &self,
        chart: Chart,
        visited: &mut HashMap<String, Vec<ConvertedField>>,
    ) -> PipelineResult<ConvertReport> {
        visited.insert(chart.dir.as_str().to_string(), Vec::new());
        let (subcharts, fold_targets) = if self.options.recursive {
            self.convert_subcharts(&chart, visited)?
        } else {
            (Vec::new(), Vec::new())
        };

        let Analysis {
            chart,
            sources,
            values_src,
            candidates,
            undetected,
        } = self.analyze(chart)?;
        let chart_name = chart.name();
        let mut report = ConvertReport {
            chart: chart_name.clone(),
            dry_run: self.options.dry_run,
            undetected,
            subcharts,
            ..ConvertReport::default()
        };

        let all: Vec<&DetectedCandidate> = candidates.iter().collect();
        let first = rewrite_all(&sources, &all);
        let first_accepted = first.results.iter().filter(|r| r.is_ok()).count();
        let mut accepted: Vec<(&DetectedCandidate, Vec<String>)> = Vec::new();
        for (candidate, result) in candidates.iter().zip(first.results) {
            match result {
                Ok(files) => accepted.push((candidate, files)),
                Err(reason) => {
                    warn!(
                        chart = %chart_name,
                        values_path = %candidate.values_path,
                        reason = %reason,
                        "template not rewritten, values left as a list"
                    );
                    report.skipped.push(SkippedCandidate {
                        values_path: candidate.values_path.clone(),
                        reason,
                    });
                }
            }
        }

        let values_file = chart.values_file()?;
        let mut new_values = None;
        let mut values_converted = BTreeSet::new();
        if let Some(src) = values_src.as_deref() {
            let targets: Vec<TransformTarget> = accepted
                .iter()
                .map(|(c, _)| TransformTarget {
                    values_path: c.values_path.clone(),
                    merge_key: c.merge_key.clone(),
                    promote_scalar: c.promote_scalar.clone(),
                })
                .chain(fold_targets.iter().map(ConvertedField::target))
                .collect();
            let transformed =
                transform(src, &targets).map_err(|source| PipelineError::Values {
                    path: values_file.as_str().to_string(),
                    source,
                })?;
            let vetoed: BTreeSet<&str> = transformed
                .skipped
                .iter()
                .map(|s| s.values_path.as_str())
                .collect();
            for skipped in &transformed.skipped {
                warn!(
                    chart = %chart_name,
                    values_path = %skipped.values_path,
                    reason = %skipped.reason,
                    "values field not converted"
                );
                report.skipped.push(SkippedCandidate {
                    values_path: skipped.values_path.clone(),
                    reason: skipped.reason.clone(),
                });
            }
            accepted.retain(|(c, _)| !vetoed.contains(c.values_path.as_str()));
            values_converted.extend(transformed.converted.iter().cloned());
            if transformed.changed() {
                new_values = Some(transformed.text);
            }
        }

        // a vetoed candidate may have rewritten a template in the first pass
        let texts = if accepted.len() == first_accepted {
            first.texts
        } else {
            let keep: Vec<&DetectedCandidate> = accepted.iter().map(|(c, _)| *c).collect();
            rewrite_all(&sources, &keep).texts
        };

        for (candidate, templates) in &accepted {
            info!(
                chart = %chart_name,
                values_path = %candidate.values_path,
                merge_key = %candidate.merge_key,
                "converted list to map"
            );
            report.converted.push(ConvertedField {
                values_path: candidate.values_path.clone(),
                merge_key: candidate.merge_key.clone(),
                promote_scalar: candidate.promote_scalar.clone(),
                templates: templates.clone(),
                values_changed: values_converted.contains(&candidate.values_path),
            });
        }
        for mut field in fold_targets {
            field.values_changed = values_converted.contains(&field.values_path);
            if field.values_changed {
                info!(chart = %chart_name, values_path = %field.values_path, "folded subchart conversion");
            }
            report.folded.push(field);
        }

        let mut changes: Vec<(VfsPath, String)> = Vec::new();
        for (source, text) in sources.iter().zip(texts) {
            if text != source.text {
                changes.push((source.path.clone(), text));
            }
        }
        let helper = chart.dir.join("templates")?.join(HELPER_FILE)?;
        if !report.converted.is_empty() && !helper.exists()? {
            changes.push((helper, HELPER_TEMPLATE.to_string()));
        }
        if let Some(text) = new_values {
            changes.push((values_file, text));
        }

        for (path, text) in changes {
            let rel = chart.relative(&path);
            report.files_changed.push(rel.clone());
            if self.options.dry_run {
                debug!(path = %rel, "dry run, not writing");
                continue;
            }
            write_with_backup(&path, &text, &self.options.backup_suffix)?;
            report.files_written.push(rel);
        }

        visited.insert(chart.dir.as_str().to_string(), report.foldable());
        Ok(report)
    }
}

/// Detect with a fresh pipeline built from `options`.
///
/// # Errors
///
/// See [`Pipeline::detect`].
pub fn detect(chart_dir: &VfsPath, options: Options) -> PipelineResult<DetectReport> {
    Pipeline::new(options).detect(chart_dir)
}

/// Convert with a fresh pipeline built from `options`.
///
/// # Errors
///
/// See [`Pipeline::convert`].
pub fn convert(chart_dir: &VfsPath, options: Options) -> PipelineResult<ConvertReport> {
    Pipeline::new(options).convert(chart_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_discovery_is_independent_of_embedded_charts() {
        let options = Options {
            include_embedded: false,
            ..Options::default()
        };
        let links = options.link_options();
        assert!(!links.embedded);
        assert!(links.archived);

        let options = Options {
            include_archived: false,
            ..Options::default()
        };
        let links = options.link_options();
        assert!(links.embedded);
        assert!(!links.archived);
    }

    #[test]
    fn list_probe_follows_dotted_path() {
        let values: serde_yaml::Value =
            serde_yaml::from_str("app:\n  env:\n    - name: A\n  ports: {}\n").expect("yaml");
        assert!(list_at(&values, "app.env"));
        assert!(!list_at(&values, "app.ports"));
        assert!(!list_at(&values, "app.missing"));
        assert!(!list_at(&values, "env"));
    }

    #[test]
    fn prefixed_fields_drop_template_info() {
        let field = ConvertedField {
            values_path: "env".to_string(),
            merge_key: "name".to_string(),
            promote_scalar: Some("value".to_string()),
            templates: vec!["templates/deployment.yaml".to_string()],
            values_changed: true,
        };
        let folded = prefixed("worker", &field);
        assert_eq!(folded.values_path, "worker.env");
        assert_eq!(folded.promote_scalar.as_deref(), Some("value"));
        assert!(folded.templates.is_empty());
        assert!(!folded.values_changed);
    }
}
