use std::fmt;

use serde::{Deserialize, Serialize};

/// Seed used when neither the caller nor the plan provides one.
pub const DEFAULT_SEED: u64 = 42;

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Seed of the per-instance random sources.
    pub seed: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

/// Lifecycle of a generation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EngineState::Completed | EngineState::Cancelled | EngineState::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Completed => "completed",
            EngineState::Cancelled => "cancelled",
            EngineState::Failed => "failed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    /// RFC 3339 UTC timestamp of the run start.
    pub started_at: String,
    pub instances_requested: u64,
    pub instances_exported: u64,
    pub state: EngineState,
    pub seed: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_written: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationReport {
    pub fn new(run_id: String, instances_requested: u64, seed: u64) -> Self {
        Self {
            run_id,
            started_at: chrono::Utc::now().to_rfc3339(),
            instances_requested,
            instances_exported: 0,
            state: EngineState::Running,
            seed,
            duration_ms: 0,
            bytes_written: None,
            error: None,
        }
    }
}
