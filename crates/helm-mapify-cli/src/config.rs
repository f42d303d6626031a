use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "helm-mapify";
pub const RULES_FILE: &str = "rules.yaml";
pub const SCHEMAS_DIR: &str = "schemas";

/// Configuration directory holding the rule store and the schema store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir(PathBuf);

impl ConfigDir {
    /// Resolve from the `--config-dir` flag (or `HELM_MAPIFY_CONFIG_DIR`),
    /// else `$XDG_CONFIG_HOME/helm-mapify`, else `$HOME/.config/helm-mapify`,
    /// else `./.helm-mapify`.
    #[must_use]
    pub fn resolve(flag: Option<PathBuf>) -> Self {
        Self::resolve_from(
            flag,
            std::env::var_os("XDG_CONFIG_HOME"),
            std::env::var_os("HOME"),
        )
    }

    fn resolve_from(flag: Option<PathBuf>, xdg: Option<OsString>, home: Option<OsString>) -> Self {
        let non_empty = |v: Option<OsString>| v.filter(|v| !v.is_empty()).map(PathBuf::from);
        if let Some(dir) = flag {
            return Self(dir);
        }
        if let Some(xdg) = non_empty(xdg) {
            return Self(xdg.join(APP_DIR));
        }
        if let Some(home) = non_empty(home) {
            return Self(home.join(".config").join(APP_DIR));
        }
        Self(PathBuf::from(format!(".{APP_DIR}")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn rules_file(&self) -> PathBuf {
        self.0.join(RULES_FILE)
    }

    #[must_use]
    pub fn schemas_dir(&self) -> PathBuf {
        self.0.join(SCHEMAS_DIR)
    }
}
