use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use datagen_core::{FeatureRef, Instance, SequencingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::csv::CsvExportSink;

/// Errors raised by export sinks.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Sequencing(#[from] SequencingError),
    #[error("export sink is closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Destination of generated instances.
///
/// `export_metadata` may be called at most once and only before the first
/// `export_instance`. Instances arrive in id order. `close` is idempotent.
pub trait ExportSink: Send {
    fn export_metadata(&mut self, definitions: &[FeatureRef]) -> Result<(), ExportError>;

    fn export_instance(&mut self, instance: &Instance) -> Result<(), ExportError>;

    fn close(&mut self) -> Result<(), ExportError>;

    /// Bytes handed to the underlying writer, for sinks that write bytes.
    fn bytes_written(&self) -> Option<u64> {
        None
    }
}

/// Call-order bookkeeping shared by the sinks in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExportSequence {
    metadata_exported: bool,
    instances_exported: bool,
    closed: bool,
}

impl ExportSequence {
    pub(crate) fn check_metadata(&self) -> Result<(), ExportError> {
        if self.closed {
            return Err(ExportError::Closed);
        }
        if self.instances_exported {
            return Err(SequencingError::MetadataAfterInstances.into());
        }
        if self.metadata_exported {
            return Err(SequencingError::MethodNotCallableTwice.into());
        }
        Ok(())
    }

    pub(crate) fn check_instance(&self) -> Result<(), ExportError> {
        if self.closed {
            return Err(ExportError::Closed);
        }
        Ok(())
    }

    pub(crate) fn mark_metadata(&mut self) {
        self.metadata_exported = true;
    }

    pub(crate) fn mark_instance(&mut self) {
        self.instances_exported = true;
    }

    /// Returns `false` when the sink was already closed.
    pub(crate) fn mark_closed(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }
}

/// Where and how a generation run exports its instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfiguration {
    pub path: PathBuf,
    /// Write a header line with the feature names.
    #[serde(default)]
    pub export_feature_names: bool,
    /// Prefix every line with the instance id.
    #[serde(default)]
    pub export_instance_ids: bool,
}

impl ExportConfiguration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            export_feature_names: false,
            export_instance_ids: false,
        }
    }

    /// Create a buffered CSV sink writing to `path`, truncating any existing file.
    pub fn create_sink(&self) -> Result<CsvExportSink<BufWriter<File>>, ExportError> {
        let file = File::create(&self.path)?;
        Ok(CsvExportSink::new(
            BufWriter::new(file),
            self.export_feature_names,
            self.export_instance_ids,
        ))
    }
}

/// Everything a [`MemorySink`] has received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRecord {
    /// Feature names from the metadata call, if any.
    pub feature_names: Option<Vec<String>>,
    pub instances: Vec<Instance>,
    pub closed: bool,
}

/// Sink that keeps instances in memory.
///
/// Clones share the same record, so a caller can keep a handle while the
/// sink itself is moved into a generation worker.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    record: Arc<Mutex<MemoryRecord>>,
    sequence: ExportSequence,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what has been exported so far.
    pub fn snapshot(&self) -> MemoryRecord {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRecord> {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ExportSink for MemorySink {
    fn export_metadata(&mut self, definitions: &[FeatureRef]) -> Result<(), ExportError> {
        self.sequence.check_metadata()?;
        let names = definitions
            .iter()
            .map(|definition| definition.name().to_string())
            .collect();
        self.lock().feature_names = Some(names);
        self.sequence.mark_metadata();
        Ok(())
    }

    fn export_instance(&mut self, instance: &Instance) -> Result<(), ExportError> {
        self.sequence.check_instance()?;
        self.lock().instances.push(instance.clone());
        self.sequence.mark_instance();
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExportError> {
        if self.sequence.mark_closed() {
            self.lock().closed = true;
        }
        Ok(())
    }
}
