//! One score-update cycle per address:
//! `Validating -> Fetching -> Scoring -> Submitting -> Confirming -> Done`,
//! with any step able to end in `Failed`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::activity::ActivityProvider;
use crate::domain::{
    parse_wallet_address, ActivitySnapshot, BatchItemOutcome, BatchReport, ScorePreview, ScoreUpdate,
};
use crate::error::OracleError;
use crate::journal::{append_score_update, AuditRecord};
use crate::registry::ScoreRegistry;
use crate::scoring::{score_breakdown, ScoreBreakdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    Idle,
    Validating,
    Fetching,
    Scoring,
    Submitting,
    Confirming,
    Done,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateStage::Idle => "idle",
            UpdateStage::Validating => "validating",
            UpdateStage::Fetching => "fetching",
            UpdateStage::Scoring => "scoring",
            UpdateStage::Submitting => "submitting",
            UpdateStage::Confirming => "confirming",
            UpdateStage::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct Coordinator {
    registry: Arc<dyn ScoreRegistry>,
    activity: Arc<dyn ActivityProvider>,
    // Serializes submissions from the single signing identity.
    submit_lock: Mutex<()>,
    batch_delay: Duration,
    audit_log: Option<PathBuf>,
}

impl Coordinator {
    pub fn new(registry: Arc<dyn ScoreRegistry>, activity: Arc<dyn ActivityProvider>) -> Self {
        Self {
            registry,
            activity,
            submit_lock: Mutex::new(()),
            batch_delay: Duration::from_secs(2),
            audit_log: None,
        }
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_audit_log(mut self, path: Option<PathBuf>) -> Self {
        self.audit_log = path;
        self
    }

    pub fn registry(&self) -> &Arc<dyn ScoreRegistry> {
        &self.registry
    }

    /// Computes, submits and confirms a fresh score for `address`.
    pub async fn update_score(&self, address: &str) -> Result<ScoreUpdate, OracleError> {
        let mut stage = UpdateStage::Idle;
        let res = self.run_update(address, &mut stage).await;
        match &res {
            Ok(update) => info!(
                address = %update.address,
                score = update.score,
                tx = %update.tx_hash,
                slot = update.slot,
                "oracle.update.done"
            ),
            Err(err) => warn!(
                address,
                %stage,
                kind = ?err.kind(),
                error = %err,
                "oracle.update.failed"
            ),
        }
        res
    }

    async fn run_update(&self, address: &str, stage: &mut UpdateStage) -> Result<ScoreUpdate, OracleError> {
        enter(stage, UpdateStage::Validating, address);
        let wallet = parse_wallet_address(address)?;

        enter(stage, UpdateStage::Fetching, address);
        let snapshot = self.fetch(&wallet).await?;

        enter(stage, UpdateStage::Scoring, address);
        let breakdown = score_breakdown(&snapshot);
        debug!(address, ?breakdown, "oracle.update.scored");

        // Overwriting an existing score is allowed; this is informational only.
        match self.registry.has_score(&wallet).await {
            Ok(true) => info!(address, "oracle.update.overwriting_existing_score"),
            Ok(false) => {}
            Err(err) => debug!(address, error = %err, "oracle.update.existing_score_unknown"),
        }

        enter(stage, UpdateStage::Submitting, address);
        let pending = {
            let _guard = self.submit_lock.lock().await;
            self.registry
                .submit_score(&wallet, breakdown.score)
                .await
                .map_err(|e| OracleError::Submission(e.to_string()))?
        };

        enter(stage, UpdateStage::Confirming, address);
        let confirmation = self
            .registry
            .await_confirmation(&pending)
            .await
            .map_err(|e| OracleError::TransactionFailed(e.to_string()))?;

        enter(stage, UpdateStage::Done, address);
        let update = ScoreUpdate {
            address: wallet.to_string(),
            score: breakdown.score,
            tx_hash: confirmation.tx_hash,
            slot: confirmation.slot,
        };
        self.record(&update, breakdown);
        Ok(update)
    }

    async fn fetch(&self, wallet: &Pubkey) -> Result<ActivitySnapshot, OracleError> {
        self.activity
            .fetch(wallet)
            .await
            .map_err(|e| OracleError::UpstreamData(e.to_string()))
    }

    fn record(&self, update: &ScoreUpdate, breakdown: ScoreBreakdown) {
        let Some(path) = self.audit_log.as_deref() else {
            return;
        };
        if let Err(err) = append_score_update(path, &AuditRecord::new(update, breakdown)) {
            warn!(path = %path.display(), error = %err, "oracle.audit.write_failed");
        }
    }

    /// Fetches and scores `address` without touching the registry.
    pub async fn preview(&self, address: &str) -> Result<ScorePreview, OracleError> {
        let wallet = parse_wallet_address(address)?;
        let snapshot = self.fetch(&wallet).await?;
        let breakdown = score_breakdown(&snapshot);
        Ok(ScorePreview { snapshot, breakdown })
    }

    /// Registry lookup that keeps "query failed" distinct from "no score".
    pub async fn score_exists(&self, address: &str) -> Result<bool, OracleError> {
        let wallet = parse_wallet_address(address)?;
        self.registry
            .has_score(&wallet)
            .await
            .map_err(|e| OracleError::Network(e.to_string()))
    }

    /// Updates every address in order, one at a time, pausing between items.
    /// A failed item is recorded and the run moves on.
    pub async fn run_batch(&self, addresses: &[String]) -> BatchReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(addresses.len());

        info!(count = addresses.len(), "oracle.batch.start");
        for (index, address) in addresses.iter().enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            let res = self.update_score(address).await;
            if let Err(err) = &res {
                debug!(index, address = %address, error = %err, "oracle.batch.item_failed");
            }
            outcomes.push(BatchItemOutcome::from_result(index, address, &res));
        }

        let report = BatchReport { started_at, finished_at: Utc::now(), outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "oracle.batch.done"
        );
        report
    }
}

fn enter(stage: &mut UpdateStage, next: UpdateStage, address: &str) {
    debug!(address, from = %stage, to = %next, "oracle.update.stage");
    *stage = next;
}
