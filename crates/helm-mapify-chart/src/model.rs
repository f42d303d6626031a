use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use vfs::VfsPath;

use crate::{ChartError, ChartResult};

pub const CHART_YAML: &str = "Chart.yaml";
pub const VALUES_YAML: &str = "values.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

impl Dependency {
    /// Key under which the parent chart's values configure this dependency.
    #[must_use]
    pub fn values_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Path of a `file://` repository reference, if this is one.
    #[must_use]
    pub fn local_path(&self) -> Option<&str> {
        self.repository.as_deref()?.strip_prefix("file://")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartYaml {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl ChartYaml {
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// Values prefix for the dependency `name`: its alias, else the name itself.
    #[must_use]
    pub fn values_key_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.dependency(name).map_or(name, Dependency::values_key)
    }
}

/// A chart directory with its parsed `Chart.yaml`.
#[derive(Debug, Clone)]
pub struct Chart {
    pub dir: VfsPath,
    pub meta: ChartYaml,
}

impl Chart {
    /// # Errors
    ///
    /// Fails when `dir` holds no readable `Chart.yaml`.
    pub fn load(dir: &VfsPath) -> ChartResult<Self> {
        let path = dir.join(CHART_YAML)?;
        if !path.is_file()? {
            return Err(ChartError::MissingChartYaml {
                path: dir.as_str().to_string(),
            });
        }
        let src = read_to_string(&path)?;
        let meta = serde_yaml::from_str::<Option<ChartYaml>>(&src)
            .map_err(|source| ChartError::InvalidChartYaml {
                path: path.as_str().to_string(),
                source,
            })?
            .unwrap_or_default();
        Ok(Self {
            dir: dir.clone(),
            meta,
        })
    }

    #[must_use]
    pub fn is_chart_dir(dir: &VfsPath) -> bool {
        dir.join(CHART_YAML)
            .and_then(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Chart name, falling back to the directory name.
    #[must_use]
    pub fn name(&self) -> String {
        self.meta
            .name
            .clone()
            .unwrap_or_else(|| self.dir.filename())
    }

    /// # Errors
    ///
    /// Fails on filesystem errors.
    pub fn values_file(&self) -> ChartResult<VfsPath> {
        Ok(self.dir.join(VALUES_YAML)?)
    }

    /// Chart-relative form of `path`, e.g. `templates/deployment.yaml`.
    #[must_use]
    pub fn relative(&self, path: &VfsPath) -> String {
        let root = self.dir.as_str().trim_end_matches('/');
        let abs = path.as_str();
        abs.strip_prefix(root)
            .map_or(abs, |rest| rest.trim_start_matches('/'))
            .to_string()
    }

    /// Every template source (`.yaml`, `.yml`, `.tpl`) under `templates/`,
    /// sorted by path.
    ///
    /// # Errors
    ///
    /// Fails on filesystem errors.
    pub fn template_sources(&self) -> ChartResult<Vec<VfsPath>> {
        let dir = self.dir.join("templates")?;
        if !dir.is_dir()? {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        list_files_recursive(&dir, &mut out)?;
        out.retain(|p| has_extension(p, &["yaml", "yml", "tpl"]));
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        out.dedup_by(|a, b| a.as_str() == b.as_str());
        Ok(out)
    }

    /// Manifest templates: `.yaml`/`.yml` sources not starting with `_`.
    ///
    /// # Errors
    ///
    /// Fails on filesystem errors.
    pub fn manifest_templates(&self) -> ChartResult<Vec<VfsPath>> {
        let mut out = self.template_sources()?;
        out.retain(|p| !p.filename().starts_with('_') && has_extension(p, &["yaml", "yml"]));
        Ok(out)
    }
}

fn has_extension(path: &VfsPath, allowed: &[&str]) -> bool {
    let file_name = path.filename();
    Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

fn list_files_recursive(dir: &VfsPath, out: &mut Vec<VfsPath>) -> ChartResult<()> {
    for ent in dir.read_dir()? {
        if ent.is_dir()? {
            list_files_recursive(&ent, out)?;
        } else if ent.is_file()? {
            out.push(ent);
        }
    }
    Ok(())
}

/// # Errors
///
/// Fails on filesystem errors or invalid UTF-8.
pub fn read_to_string(path: &VfsPath) -> ChartResult<String> {
    let mut src = String::new();
    path.open_file()?.read_to_string(&mut src)?;
    Ok(src)
}
