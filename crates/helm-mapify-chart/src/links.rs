//! Subchart discovery: embedded directories, `file://` dependencies and
//! packaged archives under `charts/`.

use serde::{Serialize, Serializer};
use tracing::{debug, warn};
use vfs::VfsPath;

use crate::archive::{self, is_archive};
use crate::model::Chart;
use crate::ChartResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Embedded,
    Relative,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    pub embedded: bool,
    pub linked: bool,
    pub archived: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            embedded: true,
            linked: true,
            archived: true,
        }
    }
}

fn serialize_vfs_path<S: Serializer>(path: &VfsPath, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(path.as_str())
}

#[derive(Debug, Clone, Serialize)]
pub struct SubchartLink {
    pub name: String,
    /// Values key in the parent chart: the dependency alias, else the name.
    pub prefix: String,
    #[serde(serialize_with = "serialize_vfs_path")]
    pub path: VfsPath,
    /// Every mechanism that named this subchart, in discovery order.
    pub kinds: Vec<LinkKind>,
}

impl SubchartLink {
    /// Named by more than one mechanism.
    #[must_use]
    pub fn resolved_via_both(&self) -> bool {
        self.kinds.len() > 1
    }
}

#[derive(Default)]
struct Links(Vec<SubchartLink>);

impl Links {
    fn add(&mut self, link: SubchartLink) {
        let Some(existing) = self
            .0
            .iter_mut()
            .find(|l| l.path.as_str() == link.path.as_str())
        else {
            self.0.push(link);
            return;
        };
        for kind in link.kinds {
            if !existing.kinds.contains(&kind) {
                existing.kinds.push(kind);
                if kind == LinkKind::Relative {
                    existing.prefix.clone_from(&link.prefix);
                }
            }
        }
        debug!(
            path = existing.path.as_str(),
            kinds = ?existing.kinds,
            "subchart named by more than one link"
        );
    }
}

fn sorted_entries(dir: &VfsPath) -> ChartResult<Vec<VfsPath>> {
    if !dir.is_dir()? {
        return Ok(Vec::new());
    }
    let mut entries: Vec<VfsPath> = dir.read_dir()?.collect();
    entries.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(entries)
}

fn resolve_local(chart: &Chart, local: &str) -> ChartResult<VfsPath> {
    let local = local.trim_end_matches('/');
    if local.starts_with('/') {
        Ok(chart.dir.root().join(local)?)
    } else {
        Ok(chart.dir.join(local)?)
    }
}

/// Direct subcharts of `chart`, deduplicated by resolved path.
///
/// A `file://` dependency that does not exist, or an archive that cannot be
/// read, is logged and left out.
///
/// # Errors
///
/// Fails on filesystem errors while listing `charts/`.
pub fn collect_links(chart: &Chart, options: LinkOptions) -> ChartResult<Vec<SubchartLink>> {
    let mut links = Links::default();
    let charts_dir = chart.dir.join("charts")?;
    let entries = sorted_entries(&charts_dir)?;

    if options.embedded {
        for dir in &entries {
            if !dir.is_dir()? || !Chart::is_chart_dir(dir) {
                continue;
            }
            let sub = match Chart::load(dir) {
                Ok(sub) => sub,
                Err(err) => {
                    warn!(path = dir.as_str(), error = %err, "skipping embedded subchart");
                    continue;
                }
            };
            let name = sub.name();
            links.add(SubchartLink {
                prefix: chart.meta.values_key_for(&name).to_string(),
                name,
                path: dir.clone(),
                kinds: vec![LinkKind::Embedded],
            });
        }
    }

    if options.linked {
        for dep in &chart.meta.dependencies {
            let Some(local) = dep.local_path() else {
                continue;
            };
            let path = resolve_local(chart, local)?;
            if !Chart::is_chart_dir(&path) {
                warn!(
                    dependency = %dep.name,
                    path = path.as_str(),
                    "linked subchart is missing"
                );
                continue;
            }
            links.add(SubchartLink {
                name: dep.name.clone(),
                prefix: dep.values_key().to_string(),
                path,
                kinds: vec![LinkKind::Relative],
            });
        }
    }

    if options.archived {
        for file in &entries {
            if !file.is_file()? || !is_archive(file) {
                continue;
            }
            let probed = match archive::probe(file) {
                Ok(probed) => probed,
                Err(err) => {
                    warn!(path = file.as_str(), error = %err, "skipping unreadable chart archive");
                    continue;
                }
            };
            let name = probed.name().to_string();
            links.add(SubchartLink {
                prefix: chart.meta.values_key_for(&name).to_string(),
                name,
                path: file.clone(),
                kinds: vec![LinkKind::Archived],
            });
        }
    }

    Ok(links.0)
}
