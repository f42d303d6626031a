//! Packaged (`.tgz`) subcharts.

use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tracing::{debug, warn};
use vfs::VfsPath;

use crate::model::{CHART_YAML, ChartYaml};
use crate::{ChartError, ChartResult};

#[must_use]
pub fn is_archive(path: &VfsPath) -> bool {
    let name = path.filename().to_ascii_lowercase();
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

/// Archive entry path as `/`-joined normal components.
///
/// Entries that are absolute or climb out of the archive root yield `None`.
fn entry_segments(path: &Path) -> Option<Vec<String>> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn read_bytes(path: &VfsPath) -> ChartResult<Vec<u8>> {
    let mut bytes = Vec::new();
    path.open_file()?.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Top-level directory and parsed `Chart.yaml` of a packaged chart.
#[derive(Debug, Clone)]
pub struct ArchivedChart {
    pub root: String,
    pub meta: ChartYaml,
}

impl ArchivedChart {
    #[must_use]
    pub fn name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or(&self.root)
    }
}

/// Locate `<root>/Chart.yaml` inside a gzipped tarball.
///
/// # Errors
///
/// Fails when the archive is unreadable or holds no chart.
pub fn probe(archive: &VfsPath) -> ChartResult<ArchivedChart> {
    let bytes = read_bytes(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
    for entry in tar.entries()? {
        let mut entry = entry?;
        let Some(segments) = entry_segments(&entry.path()?) else {
            continue;
        };
        if let [root, file] = segments.as_slice()
            && file == CHART_YAML
        {
            let root = root.clone();
            let mut src = String::new();
            entry.read_to_string(&mut src)?;
            let meta = serde_yaml::from_str::<Option<ChartYaml>>(&src)
                .map_err(|source| ChartError::InvalidChartYaml {
                    path: format!("{}!{root}/{CHART_YAML}", archive.as_str()),
                    source,
                })?
                .unwrap_or_default();
            return Ok(ArchivedChart { root, meta });
        }
    }
    Err(ChartError::NoChartYamlInArchive {
        archive: archive.as_str().to_string(),
    })
}

/// Extract a packaged chart next to the archive as `<name>/`, then move the
/// archive aside to `<archive><backup_suffix>`.
///
/// An existing backup is kept; the archive is removed either way so the chart
/// loader sees only the expanded directory.
///
/// # Errors
///
/// Fails when the archive holds no chart or the target directory exists.
pub fn expand(archive: &VfsPath, backup_suffix: &str) -> ChartResult<VfsPath> {
    let probed = probe(archive)?;
    let target = archive.parent().join(probed.name())?;
    if target.exists()? {
        return Err(ChartError::ExpandTargetExists {
            archive: archive.as_str().to_string(),
            target: target.as_str().to_string(),
        });
    }

    let bytes = read_bytes(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
    target.create_dir_all()?;
    for entry in tar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(segments) = entry_segments(&path) else {
            warn!(entry = %path.display(), archive = archive.as_str(), "skipping unsafe archive entry");
            continue;
        };
        let Some((root, rest)) = segments.split_first() else {
            continue;
        };
        if *root != probed.root || rest.is_empty() {
            continue;
        }
        let out = target.join(rest.join("/"))?;
        if entry.header().entry_type().is_dir() {
            out.create_dir_all()?;
        } else if entry.header().entry_type().is_file() {
            out.parent().create_dir_all()?;
            let mut file = out.create_file()?;
            std::io::copy(&mut entry, &mut file)?;
        }
    }

    let backup = archive
        .parent()
        .join(format!("{}{backup_suffix}", archive.filename()))?;
    if backup.exists()? {
        debug!(backup = backup.as_str(), "keeping existing archive backup");
    } else {
        archive.copy_file(&backup)?;
    }
    archive.remove_file()?;
    debug!(
        archive = archive.as_str(),
        target = target.as_str(),
        "expanded packaged chart"
    );
    Ok(target)
}
