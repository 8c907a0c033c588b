//! Asynchronous runs with a status-poll contract.
//!
//! A submitted run starts out `Pending`, becomes `Running` once a run slot is
//! free, and ends as `Completed` or `Failed`. Statuses stay queryable by
//! run id after the run ends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

use super::PipelineOrchestrator;
use crate::highlights::PipelineResult;

/// Opaque identifier of a submitted run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed(PipelineResult),
    Failed(String),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed(_) | RunStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed(_) => "completed",
            RunStatus::Failed(_) => "failed",
        }
    }
}

/// Runs pipelines in the background and tracks their status
#[derive(Clone)]
pub struct RunRegistry {
    orchestrator: Arc<PipelineOrchestrator>,
    runs: Arc<RwLock<HashMap<RunId, RunStatus>>>,
    slots: Arc<Semaphore>,
}

impl RunRegistry {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, max_concurrent_runs: usize) -> Self {
        Self {
            orchestrator,
            runs: Arc::new(RwLock::new(HashMap::new())),
            slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    /// Queue a run and return its id immediately
    pub async fn submit(&self, source: String, instruction: Option<String>) -> RunId {
        let id = RunId::generate();
        self.runs.write().await.insert(id.clone(), RunStatus::Pending);
        tracing::info!(run_id = %id, "Queued run for {}", source);

        let registry = self.clone();
        let run_id = id.clone();
        tokio::spawn(async move {
            let _slot = registry.slots.acquire().await;
            registry.set(&run_id, RunStatus::Running).await;

            let orchestrator = Arc::clone(&registry.orchestrator);
            let run = tokio::spawn(async move {
                orchestrator.run(&source, instruction.as_deref()).await
            });

            // A panicking run still ends in a terminal status
            let status = match run.await {
                Ok(Ok(result)) => RunStatus::Completed(result),
                Ok(Err(e)) => RunStatus::Failed(e.to_string()),
                Err(e) => RunStatus::Failed(format!("run aborted: {}", e)),
            };

            tracing::info!(run_id = %run_id, status = status.label(), "Run finished");
            registry.set(&run_id, status).await;
        });

        id
    }

    /// Current status, or `None` for an unknown id
    pub async fn status(&self, id: &RunId) -> Option<RunStatus> {
        self.runs.read().await.get(id).cloned()
    }

    /// Poll until the run reaches a terminal status
    pub async fn wait(&self, id: &RunId, poll_interval: Duration) -> Option<RunStatus> {
        loop {
            let status = self.status(id).await?;
            if status.is_terminal() {
                return Some(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Drop a finished run and return its final status.
    ///
    /// Runs that are still pending or running are kept and `None` is returned.
    pub async fn forget(&self, id: &RunId) -> Option<RunStatus> {
        let mut runs = self.runs.write().await;
        if !runs.get(id)?.is_terminal() {
            return None;
        }
        runs.remove(id)
    }

    /// Number of runs currently tracked
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    async fn set(&self, id: &RunId, status: RunStatus) {
        self.runs.write().await.insert(id.clone(), status);
    }
}
