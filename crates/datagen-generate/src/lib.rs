//! Instance generation for datagen.
//!
//! The engine samples every feature of a dependency graph once per instance,
//! in topological order, and hands finished instances to an [`ExportSink`].
//! The CSV sink and the generator service build on top of it.

pub mod engine;
pub mod errors;
pub mod export;
pub mod model;
pub mod output;
pub mod service;

pub use engine::{CancellationFlag, GenerationEngine};
pub use errors::GenerationError;
pub use export::{ExportConfiguration, ExportError, ExportSink, MemoryRecord, MemorySink};
pub use model::{DEFAULT_SEED, EngineState, GenerateOptions, GenerationReport};
pub use output::csv::CsvExportSink;
pub use service::{DataGeneratorService, GenerationHandle};
