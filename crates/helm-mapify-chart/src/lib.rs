pub mod archive;
pub mod links;
pub mod model;

pub use links::{LinkKind, LinkOptions, SubchartLink, collect_links};
pub use model::{Chart, ChartYaml, Dependency};

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no Chart.yaml in {path}")]
    MissingChartYaml { path: String },

    #[error("invalid Chart.yaml in {path}")]
    InvalidChartYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no Chart.yaml found in archive {archive}")]
    NoChartYamlInArchive { archive: String },

    #[error("cannot expand {archive}: {target} already exists")]
    ExpandTargetExists { archive: String, target: String },
}

pub type ChartResult<T> = std::result::Result<T, ChartError>;
