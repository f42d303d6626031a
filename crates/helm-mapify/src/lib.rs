pub mod backup;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    ConvertReport, ConvertedField, DetectReport, Options, Pipeline, SkippedCandidate,
    SubchartReport, convert, detect,
};
