pub mod builtin;
pub mod catalog;
pub mod fetch;
pub mod heuristic;
pub mod navigate;
pub mod registry;
pub mod resolver;

pub use builtin::BuiltinSchema;
pub use catalog::TypeSignature;
pub use registry::{Registry, SchemaIdentity};
pub use resolver::{ChainResolver, Resolution, SchemaResolver, SchemaSource};

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("{origin} is not a schema document")]
    NotASchema { origin: String },

    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
}
