use helm_mapify_chart::ChartError;
use helm_mapify_transform::TransformError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("chart directory {path} does not exist")]
    ChartNotFound { path: String },

    #[error("failed to convert values file {path}")]
    Values {
        path: String,
        #[source]
        source: TransformError,
    },

    #[error("failed to write {path}")]
    Write {
        path: String,
        #[source]
        source: vfs::VfsError,
    },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
