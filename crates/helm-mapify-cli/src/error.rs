use std::path::PathBuf;

use helm_mapify::PipelineError;
use helm_mapify_k8s::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("chart directory {path} does not exist")]
    ChartDirMissing { path: PathBuf },

    #[error("invalid rule store {path}")]
    InvalidRules {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("schema source {source_ref} does not exist")]
    SchemaSourceMissing { source_ref: String },

    #[error("{reference} is not a <group>/<version>/<Kind> reference to an extension type")]
    InvalidCatalogRef { reference: String },

    #[error("invalid rule: {reason}")]
    InvalidRule { reason: String },
}

pub type CliResult<T> = std::result::Result<T, CliError>;
