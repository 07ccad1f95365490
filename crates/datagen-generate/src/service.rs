use std::thread::JoinHandle;

use datagen_core::{
    FeatureDefinitionGraph, FeatureRef, validate_feature_count, validate_instance_count,
};
use datagen_plan::CompiledPlan;
use tracing::{debug, info};

use crate::engine::{CancellationFlag, GenerationEngine, panic_message};
use crate::errors::GenerationError;
use crate::export::{ExportConfiguration, ExportSink};
use crate::model::{GenerateOptions, GenerationReport};

/// Editable list of feature definitions with a graph kept in sync.
///
/// Every change rebuilds the dependency graph; a change that would leave an
/// invalid graph (a cycle, a removed source) is rejected and the list stays
/// as it was.
#[derive(Debug, Clone, Default)]
pub struct DataGeneratorService {
    definitions: Vec<FeatureRef>,
    graph: FeatureDefinitionGraph,
    options: GenerateOptions,
}

impl DataGeneratorService {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            definitions: Vec::new(),
            graph: FeatureDefinitionGraph::new(),
            options,
        }
    }

    /// Service seeded with a compiled plan's definitions.
    pub fn from_plan(plan: &CompiledPlan, options: GenerateOptions) -> Self {
        Self {
            definitions: plan.definitions.clone(),
            graph: plan.graph.copy(),
            options,
        }
    }

    pub fn feature_definitions(&self) -> &[FeatureRef] {
        &self.definitions
    }

    pub fn graph(&self) -> &FeatureDefinitionGraph {
        &self.graph
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn add_feature_definition(&mut self, definition: FeatureRef) -> Result<(), GenerationError> {
        let mut definitions = self.definitions.clone();
        definitions.push(definition);
        self.replace_definitions(definitions)
    }

    pub fn remove_feature_definition(&mut self, index: usize) -> Result<FeatureRef, GenerationError> {
        if index >= self.definitions.len() {
            return Err(GenerationError::NoSuchFeature {
                index,
                len: self.definitions.len(),
            });
        }
        let mut definitions = self.definitions.clone();
        let removed = definitions.remove(index);
        self.replace_definitions(definitions)?;
        Ok(removed)
    }

    fn replace_definitions(&mut self, definitions: Vec<FeatureRef>) -> Result<(), GenerationError> {
        let graph = FeatureDefinitionGraph::from_definitions(&definitions)?;
        debug!(
            features = definitions.len(),
            edges = graph.edge_count(),
            "feature definitions updated"
        );
        self.definitions = definitions;
        self.graph = graph;
        Ok(())
    }

    /// Export to the configured CSV file on a background thread.
    pub fn generate_data(
        &self,
        instances: u64,
        config: &ExportConfiguration,
    ) -> Result<GenerationHandle, GenerationError> {
        validate_instance_count(instances)?;
        let sink = config.create_sink()?;
        info!(path = %config.path.display(), instances, "exporting to csv");
        self.generate_into(instances, Box::new(sink))
    }

    /// Export metadata to `sink`, then run the engine on a background thread
    /// over a copy of the current graph.
    pub fn generate_into(
        &self,
        instances: u64,
        mut sink: Box<dyn ExportSink>,
    ) -> Result<GenerationHandle, GenerationError> {
        validate_instance_count(instances)?;
        validate_feature_count(self.definitions.len())?;
        sink.export_metadata(&self.definitions)?;

        let mut engine = GenerationEngine::new(self.graph.copy(), self.options.clone());
        let cancellation = engine.cancellation_flag();
        let worker = std::thread::Builder::new()
            .name("datagen-generate".to_string())
            .spawn(move || engine.generate(instances, sink.as_mut()))?;

        Ok(GenerationHandle {
            cancellation,
            worker,
        })
    }
}

/// Running generation started by [`DataGeneratorService`].
#[derive(Debug)]
pub struct GenerationHandle {
    cancellation: CancellationFlag,
    worker: JoinHandle<Result<GenerationReport, GenerationError>>,
}

impl GenerationHandle {
    /// Stop after the instance currently being sampled.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the run to end.
    pub fn join(self) -> Result<GenerationReport, GenerationError> {
        self.worker
            .join()
            .map_err(|panic| GenerationError::Worker(panic_message(panic)))?
    }
}
