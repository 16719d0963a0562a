//! Transport-agnostic boundary: an HTTP layer, a CLI or a queue consumer maps
//! onto these operations one-to-one.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::domain::{parse_wallet_address, BatchReport, OracleStatus, ScorePreview, ScoreUpdate};
use crate::error::OracleError;
use crate::startup;

pub const DEFAULT_BATCH_MAX_ITEMS: usize = 10;
pub const DEFAULT_BATCH_RETENTION: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAck {
    pub batch_id: u64,
    pub accepted: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchProgress {
    Running { accepted: usize },
    Finished { report: BatchReport },
    /// The run died before producing a report.
    Aborted { reason: String },
}

impl BatchProgress {
    pub fn is_running(&self) -> bool {
        matches!(self, BatchProgress::Running { .. })
    }
}

/// Batch states by id. Keeps at most `capacity` entries, evicting the oldest
/// settled batches first; running batches are never evicted.
struct BatchStore {
    entries: HashMap<u64, BatchProgress>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl BatchStore {
    fn new(capacity: usize) -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new(), capacity }
    }

    fn start(&mut self, batch_id: u64, accepted: usize) {
        self.entries.insert(batch_id, BatchProgress::Running { accepted });
        self.order.push_back(batch_id);
        self.evict();
    }

    fn settle(&mut self, batch_id: u64, progress: BatchProgress) {
        if let Some(entry) = self.entries.get_mut(&batch_id) {
            *entry = progress;
        }
        self.evict();
    }

    fn get(&self, batch_id: u64) -> Option<&BatchProgress> {
        self.entries.get(&batch_id)
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let settled = self
                .order
                .iter()
                .position(|id| self.entries.get(id).map_or(true, |p| !p.is_running()));
            let Some(id) = settled.and_then(|pos| self.order.remove(pos)) else {
                break;
            };
            self.entries.remove(&id);
        }
    }
}

/// Acknowledgement plus the running task; dropping it leaves the batch running.
pub struct BatchHandle {
    pub ack: BatchAck,
    task: JoinHandle<Option<BatchReport>>,
}

impl BatchHandle {
    /// Waits for the batch. `None` if the run panicked or was aborted.
    pub async fn wait(self) -> Option<BatchReport> {
        self.task.await.ok().flatten()
    }
}

pub struct OracleService {
    coordinator: Arc<Coordinator>,
    batches: Arc<RwLock<BatchStore>>,
    next_batch_id: AtomicU64,
    batch_max_items: usize,
    min_balance_sol: f64,
}

impl OracleService {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            batches: Arc::new(RwLock::new(BatchStore::new(DEFAULT_BATCH_RETENTION))),
            next_batch_id: AtomicU64::new(1),
            batch_max_items: DEFAULT_BATCH_MAX_ITEMS,
            min_balance_sol: 0.0,
        }
    }

    pub fn with_batch_max_items(mut self, max: usize) -> Self {
        self.batch_max_items = max;
        self
    }

    /// How many batch states `batch_result` can still answer for.
    pub fn with_batch_retention(self, capacity: usize) -> Self {
        Self { batches: Arc::new(RwLock::new(BatchStore::new(capacity))), ..self }
    }

    pub fn with_min_balance(mut self, min_balance_sol: f64) -> Self {
        self.min_balance_sol = min_balance_sol;
        self
    }

    pub async fn update_score(&self, address: &str) -> Result<ScoreUpdate, OracleError> {
        self.coordinator.update_score(address).await
    }

    pub async fn preview_score(&self, address: &str) -> Result<ScorePreview, OracleError> {
        self.coordinator.preview(address).await
    }

    /// A failed registry query reads as "no score" and is only logged.
    pub async fn check_score_exists(&self, address: &str) -> Result<bool, OracleError> {
        parse_wallet_address(address)?;
        match self.coordinator.score_exists(address).await {
            Ok(exists) => Ok(exists),
            Err(OracleError::Network(msg)) => {
                warn!(address, error = %msg, "service.check_score.query_failed");
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }

    /// Validates the batch size, starts the sequential run in the background
    /// and returns immediately.
    pub async fn batch_update(&self, addresses: Vec<String>) -> Result<BatchHandle, OracleError> {
        if addresses.is_empty() {
            return Err(OracleError::EmptyBatch);
        }
        if addresses.len() > self.batch_max_items {
            return Err(OracleError::BatchTooLarge {
                len: addresses.len(),
                max: self.batch_max_items,
            });
        }

        let batch_id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        let ack = BatchAck { batch_id, accepted: addresses.len(), started_at: Utc::now() };
        self.batches.write().await.start(batch_id, addresses.len());

        let coordinator = Arc::clone(&self.coordinator);
        let run = tokio::spawn(async move { coordinator.run_batch(&addresses).await });
        let batches = Arc::clone(&self.batches);
        let task = tokio::spawn(async move {
            let (progress, report) = match run.await {
                Ok(report) => (BatchProgress::Finished { report: report.clone() }, Some(report)),
                Err(err) => {
                    error!(batch_id, error = %err, "service.batch.aborted");
                    (BatchProgress::Aborted { reason: err.to_string() }, None)
                }
            };
            batches.write().await.settle(batch_id, progress);
            report
        });

        info!(batch_id, accepted = ack.accepted, "service.batch.accepted");
        Ok(BatchHandle { ack, task })
    }

    pub async fn batch_result(&self, batch_id: u64) -> Option<BatchProgress> {
        self.batches.read().await.get(batch_id).cloned()
    }

    pub async fn status(&self) -> Result<OracleStatus, OracleError> {
        let report = startup::inspect(self.coordinator.registry().as_ref(), self.min_balance_sol)
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;
        Ok(OracleStatus {
            oracle_address: report.oracle_address.to_string(),
            registry_oracle: report.registry_oracle.to_string(),
            is_authorized: report.is_authorized(),
            balance_sol: report.balance_sol,
            low_balance: report.low_balance(),
        })
    }
}
