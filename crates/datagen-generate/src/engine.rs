use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use datagen_core::{
    CoreError, FeatureDefinitionGraph, FeatureRef, Instance, InstanceValues, SequencingError,
    validate_feature_count, validate_instance_count,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::errors::GenerationError;
use crate::export::ExportSink;
use crate::model::{EngineState, GenerateOptions, GenerationReport};

/// Cooperative cancellation signal, observed between instances only.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Samples instances from a dependency graph and hands them to an export sink.
///
/// An engine runs once: `Idle -> Running -> {Completed, Cancelled, Failed}`.
/// Terminal states are final; another run needs a new engine.
#[derive(Debug)]
pub struct GenerationEngine {
    graph: FeatureDefinitionGraph,
    options: GenerateOptions,
    state: EngineState,
    cancellation: CancellationFlag,
}

enum RunOutcome {
    Completed,
    Cancelled,
}

impl GenerationEngine {
    /// The engine owns `graph` for the run; pass a `copy()` of a live graph.
    pub fn new(graph: FeatureDefinitionGraph, options: GenerateOptions) -> Self {
        Self {
            graph,
            options,
            state: EngineState::Idle,
            cancellation: CancellationFlag::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Flag that stops the run at the next instance boundary once set.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Generate `instances` instances into `sink`, then close it.
    ///
    /// Cancellation yields `Ok` with a `Cancelled` report. Sampling errors,
    /// export errors and panics move the engine to `Failed` and come back as
    /// [`GenerationError::Failed`] carrying the report.
    pub fn generate(
        &mut self,
        instances: u64,
        sink: &mut dyn ExportSink,
    ) -> Result<GenerationReport, GenerationError> {
        if self.state != EngineState::Idle {
            return Err(GenerationError::InvalidState(self.state));
        }
        validate_instance_count(instances)?;
        validate_feature_count(self.graph.len())?;

        self.state = EngineState::Running;
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report = GenerationReport::new(run_id.clone(), instances, self.options.seed);

        info!(
            run_id = %run_id,
            instances,
            features = self.graph.len(),
            seed = self.options.seed,
            "generation started"
        );

        let mut exported = 0_u64;
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.run(instances, &mut *sink, &mut exported)
        }));
        let closed = sink.close();

        report.instances_exported = exported;
        report.duration_ms = start.elapsed().as_millis() as u64;
        report.bytes_written = sink.bytes_written();

        let outcome = match outcome {
            Ok(Ok(outcome)) => closed.map(|()| outcome).map_err(GenerationError::from),
            Ok(Err(err)) => Err(err),
            Err(panic) => {
                self.state = EngineState::Failed;
                report.state = EngineState::Failed;
                report.error = Some(panic_message(panic));
                warn!(run_id = %run_id, exported, "generation panicked");
                return Err(GenerationError::Failed {
                    report: Box::new(report),
                    source: None,
                });
            }
        };

        match outcome {
            Ok(RunOutcome::Completed) => {
                self.state = EngineState::Completed;
                info!(
                    run_id = %run_id,
                    instances = exported,
                    duration_ms = report.duration_ms,
                    bytes_written = report.bytes_written.unwrap_or(0),
                    "generation completed"
                );
            }
            Ok(RunOutcome::Cancelled) => {
                self.state = EngineState::Cancelled;
                warn!(
                    run_id = %run_id,
                    instances = exported,
                    requested = instances,
                    "generation cancelled"
                );
            }
            Err(err) => {
                self.state = EngineState::Failed;
                report.state = EngineState::Failed;
                report.error = Some(err.to_string());
                warn!(run_id = %run_id, exported, error = %err, "generation failed");
                return Err(GenerationError::Failed {
                    report: Box::new(report),
                    source: Some(Box::new(err)),
                });
            }
        }

        report.state = self.state;
        Ok(report)
    }

    fn run(
        &self,
        instances: u64,
        sink: &mut dyn ExportSink,
        exported: &mut u64,
    ) -> Result<RunOutcome, GenerationError> {
        let sampling_order = self.graph.topological_order();
        let declaration_order: Vec<FeatureRef> = self.graph.declaration_order();
        let mut values = InstanceValues::new();

        for instance_id in 0..instances {
            if self.cancellation.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }

            values.clear();
            let mut rng = ChaCha8Rng::seed_from_u64(instance_seed(self.options.seed, instance_id));
            for definition in &sampling_order {
                let value = definition.distribution().sample_in(&values, &mut rng)?;
                values.record(definition.id(), value);
            }

            let mut row = Vec::with_capacity(declaration_order.len());
            for definition in &declaration_order {
                let value = values.get(definition.id()).copied().ok_or_else(|| {
                    CoreError::from(SequencingError::UnresolvedSource {
                        feature: definition.name().to_string(),
                    })
                })?;
                row.push(value);
            }

            sink.export_instance(&Instance::new(instance_id, row))?;
            *exported += 1;
            debug!(instance_id, "instance exported");
        }

        Ok(RunOutcome::Completed)
    }
}

/// Seed of the random source for one instance.
fn instance_seed(seed: u64, instance_id: u64) -> u64 {
    let mut hash = seed ^ instance_id.wrapping_mul(0x9e3779b97f4a7c15);
    hash = hash.wrapping_mul(0x100000001b3);
    hash
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during generation".to_string()
    }
}

#[cfg(test)]
mod tests {
    use datagen_core::{
        BernoulliDistribution, CategorialDistribution, Conversion, Distribution,
        FeatureDefinition, FeatureValue, GaussianDistribution, Parameter, SamplingError,
        ValidationError,
    };

    use super::*;
    use crate::export::{ExportError, MemorySink};
    use crate::output::csv::CsvExportSink;

    fn feature(name: &str, distribution: Distribution) -> FeatureRef {
        FeatureDefinition::new(name, distribution).expect("definition")
    }

    fn bernoulli(name: &str) -> FeatureRef {
        feature(
            name,
            Distribution::Bernoulli(BernoulliDistribution::new(0.5).expect("bernoulli")),
        )
    }

    fn gaussian_on(name: &str, source: &FeatureRef, sigma: f64) -> FeatureRef {
        let mean: Parameter<f64> = Parameter::variable(source.clone(), Conversion::Identity);
        feature(
            name,
            Distribution::Gaussian(GaussianDistribution::new(mean, sigma).expect("gaussian")),
        )
    }

    fn engine(definitions: &[FeatureRef], seed: u64) -> GenerationEngine {
        let graph = FeatureDefinitionGraph::from_definitions(definitions).expect("graph");
        GenerationEngine::new(graph, GenerateOptions { seed })
    }

    /// Sets the flag once `after` instances have been exported.
    struct CancelAfter {
        inner: MemorySink,
        flag: CancellationFlag,
        after: usize,
        seen: usize,
    }

    impl ExportSink for CancelAfter {
        fn export_metadata(&mut self, definitions: &[FeatureRef]) -> Result<(), ExportError> {
            self.inner.export_metadata(definitions)
        }

        fn export_instance(&mut self, instance: &Instance) -> Result<(), ExportError> {
            self.inner.export_instance(instance)?;
            self.seen += 1;
            if self.seen == self.after {
                self.flag.cancel();
            }
            Ok(())
        }

        fn close(&mut self) -> Result<(), ExportError> {
            self.inner.close()
        }
    }

    #[test]
    fn emits_requested_instances_with_sequential_ids() {
        let a = bernoulli("A");
        let mut engine = engine(&[a], 7);
        let mut sink = MemorySink::new();

        let report = engine.generate(25, &mut sink).expect("generate");

        assert_eq!(report.state, EngineState::Completed);
        assert_eq!(report.instances_exported, 25);
        assert_eq!(engine.state(), EngineState::Completed);
        let record = sink.snapshot();
        let ids: Vec<u64> = record.instances.iter().map(Instance::id).collect();
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
        assert!(record.closed);
    }

    #[test]
    fn values_follow_declaration_order() {
        let a = bernoulli("A");
        let b = gaussian_on("B", &a, 1.0);
        // declared child first
        let mut engine = engine(&[b, a], 3);
        let mut sink = MemorySink::new();
        engine.generate(10, &mut sink).expect("generate");

        for instance in sink.snapshot().instances {
            assert!(matches!(instance.value(0), Some(FeatureValue::Continuous(_))));
            assert!(matches!(instance.value(1), Some(FeatureValue::Discrete(_))));
        }
    }

    #[test]
    fn dependent_value_uses_same_instance_source() {
        let a = feature(
            "A",
            Distribution::Gaussian(GaussianDistribution::new(0.0, 100.0).expect("gaussian")),
        );
        let b = gaussian_on("B", &a, 1e-9);
        let mut engine = engine(&[a, b], 11);
        let mut sink = MemorySink::new();
        engine.generate(200, &mut sink).expect("generate");

        for instance in sink.snapshot().instances {
            let a = instance.value(0).expect("A").as_f64();
            let b = instance.value(1).expect("B").as_f64();
            assert!((a - b).abs() < 1e-6, "B={b} drifted from A={a}");
        }
    }

    #[test]
    fn same_seed_reproduces_values() {
        let a = bernoulli("A");
        let b = gaussian_on("B", &a, 1.0);
        let definitions = [a, b];

        let mut first = MemorySink::new();
        engine(&definitions, 99)
            .generate(50, &mut first)
            .expect("first run");
        let mut second = MemorySink::new();
        engine(&definitions, 99)
            .generate(50, &mut second)
            .expect("second run");
        let mut other = MemorySink::new();
        engine(&definitions, 100)
            .generate(50, &mut other)
            .expect("other seed");

        assert_eq!(first.snapshot().instances, second.snapshot().instances);
        assert_ne!(first.snapshot().instances, other.snapshot().instances);
    }

    #[test]
    fn cancellation_stops_at_instance_boundary() {
        for k in 1..5 {
            let mut engine = engine(&[bernoulli("A")], 5);
            let observer = MemorySink::new();
            let mut sink = CancelAfter {
                inner: observer.clone(),
                flag: engine.cancellation_flag(),
                after: k,
                seen: 0,
            };

            let report = engine.generate(10, &mut sink).expect("generate");

            assert_eq!(report.state, EngineState::Cancelled);
            assert_eq!(report.instances_exported, k as u64);
            assert_eq!(observer.snapshot().instances.len(), k);
            assert!(observer.snapshot().closed);
        }
    }

    #[test]
    fn cancelled_before_start_exports_nothing() {
        let mut engine = engine(&[bernoulli("A")], 5);
        engine.cancellation_flag().cancel();
        let mut sink = MemorySink::new();

        let report = engine.generate(10, &mut sink).expect("generate");
        assert_eq!(report.state, EngineState::Cancelled);
        assert!(sink.snapshot().instances.is_empty());
    }

    #[test]
    fn sampling_error_fails_run_without_partial_instance() {
        let a = feature(
            "A",
            Distribution::Categorial(CategorialDistribution::new(vec![0.0, 1.0]).expect("categorial")),
        );
        // only category 0 has a table entry
        let p: Parameter<f64> = Parameter::variable(a.clone(), Conversion::Lookup(vec![0.5]));
        let b = feature(
            "B",
            Distribution::Bernoulli(BernoulliDistribution::new(p).expect("bernoulli")),
        );
        let mut engine = engine(&[a, b], 1);
        let mut sink = MemorySink::new();

        let err = engine.generate(3, &mut sink).expect_err("run fails");

        let (report, source) = match err {
            GenerationError::Failed { report, source } => (report, source),
            other => panic!("expected a failed run, got {other:?}"),
        };
        assert!(matches!(
            source.as_deref(),
            Some(GenerationError::Core(CoreError::Sampling(
                SamplingError::Conversion { .. }
            )))
        ));
        assert_eq!(report.state, EngineState::Failed);
        assert_eq!(report.instances_exported, 0);
        assert!(report.error.is_some());
        assert_eq!(engine.state(), EngineState::Failed);
        let record = sink.snapshot();
        assert!(record.instances.is_empty());
        assert!(record.closed);
    }

    #[test]
    fn terminated_engine_cannot_restart() {
        let mut engine = engine(&[bernoulli("A")], 5);
        let mut sink = MemorySink::new();
        engine.generate(2, &mut sink).expect("first run");

        let err = engine
            .generate(2, &mut MemorySink::new())
            .expect_err("restart rejected");
        assert!(matches!(
            err,
            GenerationError::InvalidState(EngineState::Completed)
        ));
    }

    #[test]
    fn zero_instances_is_rejected_before_running() {
        let mut engine = engine(&[bernoulli("A")], 5);
        let err = engine
            .generate(0, &mut MemorySink::new())
            .expect_err("zero instances");
        assert!(matches!(err, GenerationError::Core(CoreError::Validation(_))));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn export_error_fails_run_with_report() {
        struct RejectSecond {
            inner: MemorySink,
        }

        impl ExportSink for RejectSecond {
            fn export_metadata(&mut self, definitions: &[FeatureRef]) -> Result<(), ExportError> {
                self.inner.export_metadata(definitions)
            }

            fn export_instance(&mut self, instance: &Instance) -> Result<(), ExportError> {
                if instance.id() == 1 {
                    return Err(ExportError::Closed);
                }
                self.inner.export_instance(instance)
            }

            fn close(&mut self) -> Result<(), ExportError> {
                self.inner.close()
            }
        }

        let mut engine = engine(&[bernoulli("A")], 5);
        let observer = MemorySink::new();
        let mut sink = RejectSecond {
            inner: observer.clone(),
        };

        let err = engine.generate(4, &mut sink).expect_err("run fails");

        let (report, source) = match err {
            GenerationError::Failed { report, source } => (report, source),
            other => panic!("expected a failed run, got {other:?}"),
        };
        assert!(matches!(
            source.as_deref(),
            Some(GenerationError::Export(ExportError::Closed))
        ));
        assert_eq!(report.state, EngineState::Failed);
        assert_eq!(report.instances_exported, 1);
        assert!(observer.snapshot().closed);
    }

    #[test]
    fn empty_graph_is_rejected_before_running() {
        let mut engine = GenerationEngine::new(
            FeatureDefinitionGraph::new(),
            GenerateOptions { seed: 5 },
        );
        let mut out = Vec::new();
        let mut sink = CsvExportSink::new(&mut out, false, false);

        let err = engine.generate(2, &mut sink).expect_err("no features");

        assert!(matches!(
            err,
            GenerationError::Core(CoreError::Validation(ValidationError::NoFeatures))
        ));
        assert_eq!(engine.state(), EngineState::Idle);
        drop(sink);
        assert!(out.is_empty());
    }
}
