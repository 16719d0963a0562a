use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{ErrorKind, OracleError};
use crate::scoring::ScoreBreakdown;

/// Ordinal repayment quality observed for a wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentHistory {
    #[default]
    None,
    Poor,
    Average,
    Good,
    Strong,
    /// Any tier the provider reports that we do not recognise.
    #[serde(other)]
    Unknown,
}

/// Lending facts observed for one wallet. Produced fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySnapshot {
    pub address: String,
    pub has_lending_activity: bool,
    pub never_liquidated: bool,
    pub account_age_months: u32,
    pub protocol_count: u32,
    #[serde(default)]
    pub repayment_history: RepaymentHistory,

    // Informational, not scored.
    #[serde(rename = "totalBorrowedUSD", default)]
    pub total_borrowed_usd: f64,
    #[serde(rename = "totalRepaidUSD", default)]
    pub total_repaid_usd: f64,
}

/// Parses a wallet address, rejecting anything that is not a 32-byte base58 key.
pub fn parse_wallet_address(raw: &str) -> Result<Pubkey, OracleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OracleError::InvalidAddress("address is empty".into()));
    }
    let key = Pubkey::from_str(trimmed)
        .map_err(|e| OracleError::InvalidAddress(format!("{trimmed}: {e}")))?;
    if key == Pubkey::default() {
        return Err(OracleError::InvalidAddress(format!("{trimmed}: zero address")));
    }
    Ok(key)
}

/// Result of one confirmed score update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub address: String,
    pub score: u16,
    pub tx_hash: String,
    pub slot: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePreview {
    pub snapshot: ActivitySnapshot,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleStatus {
    pub oracle_address: String,
    pub registry_oracle: String,
    pub is_authorized: bool,
    pub balance_sol: f64,
    pub low_balance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Succeeded {
        score: u16,
        #[serde(rename = "txHash")]
        tx_hash: String,
        slot: u64,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemOutcome {
    pub index: usize,
    pub address: String,
    #[serde(flatten)]
    pub result: ItemResult,
}

impl BatchItemOutcome {
    pub fn from_result(index: usize, address: &str, result: &Result<ScoreUpdate, OracleError>) -> Self {
        let result = match result {
            Ok(update) => ItemResult::Succeeded {
                score: update.score,
                tx_hash: update.tx_hash.clone(),
                slot: update.slot,
            },
            Err(err) => ItemResult::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        Self { index, address: address.to_string(), result }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.result, ItemResult::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<BatchItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}
