use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs::OpenOptions, io::Write, path::Path};

use crate::domain::ScoreUpdate;
use crate::scoring::ScoreBreakdown;

/// One line of the score audit journal (JSON lines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub address: String,
    pub score: u16,
    pub tx_hash: String,
    pub slot: u64,
    pub breakdown: ScoreBreakdown,
}

impl AuditRecord {
    pub fn new(update: &ScoreUpdate, breakdown: ScoreBreakdown) -> Self {
        Self {
            timestamp: Utc::now(),
            address: update.address.clone(),
            score: update.score,
            tx_hash: update.tx_hash.clone(),
            slot: update.slot,
            breakdown,
        }
    }
}

pub fn append_score_update(path: impl AsRef<Path>, record: &AuditRecord) -> Result<()> {
    let line = serde_json::to_string(record)?;
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")?;
    Ok(())
}
