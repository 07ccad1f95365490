use datagen_core::CoreError;
use thiserror::Error;

use crate::export::ExportError;
use crate::model::{EngineState, GenerationReport};

/// Errors emitted by the generation engine and the generator service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine is {0}; a new run needs a new engine")]
    InvalidState(EngineState),
    #[error("no feature definition at index {index} (have {len})")]
    NoSuchFeature { index: usize, len: usize },
    #[error("generation worker stopped unexpectedly: {0}")]
    Worker(String),
    /// The run ended in `Failed`; `source` is absent when the run panicked.
    #[error("generation failed: {}", .report.error.as_deref().unwrap_or("unknown error"))]
    Failed {
        report: Box<GenerationReport>,
        #[source]
        source: Option<Box<GenerationError>>,
    },
}
