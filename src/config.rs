use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // RPC
    pub rpc_url: String,
    pub commitment: String,

    // Registry
    pub registry_program_id: String,
    pub oracle_keypair_path: String,

    // Confirmation
    pub confirm_timeout_secs: u64,
    pub confirm_poll_ms: u64,

    // Runtime
    pub dry_run: bool,
    pub log_format: String,

    // Activity data
    pub activity_api_url: Option<String>,

    // Batch
    pub batch_max_items: usize,
    pub batch_delay_ms: u64,
    pub batch_retention: usize,

    // Startup checks
    pub min_balance_sol: f64,

    // Alerts / audit
    pub slack_webhook_url: Option<String>,
    pub score_audit_log: Option<String>,
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

/// Unset or blank reads as `None`; a value that does not parse is an error.
fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(lookup, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{key}: cannot parse {raw:?}: {e}")),
    }
}

fn env_opt(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // RPC
        let rpc_url = env_opt(&lookup, "SOLANA_RPC_URL")
            .or_else(|| env_opt(&lookup, "RPC_URL"))
            .unwrap_or_else(|| "https://api.devnet.solana.com".to_string());
        let commitment = env_opt(&lookup, "COMMITMENT")
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| "confirmed".to_string());
        if !matches!(commitment.as_str(), "processed" | "confirmed" | "finalized") {
            return Err(anyhow!("COMMITMENT must be processed, confirmed or finalized (got {commitment})"));
        }

        // Registry
        let registry_program_id = env_opt(&lookup, "REGISTRY_PROGRAM_ID")
            .ok_or_else(|| anyhow!("REGISTRY_PROGRAM_ID is required"))?;
        let oracle_keypair_path = env_opt(&lookup, "ORACLE_KEYPAIR_PATH")
            .ok_or_else(|| anyhow!("ORACLE_KEYPAIR_PATH is required"))?;

        // Confirmation
        let confirm_timeout_secs = env_parse::<u64>(&lookup, "CONFIRM_TIMEOUT_SECS")?.unwrap_or(60);
        let confirm_poll_ms = env_parse::<u64>(&lookup, "CONFIRM_POLL_MS")?.unwrap_or(500);
        if confirm_timeout_secs == 0 {
            return Err(anyhow!("CONFIRM_TIMEOUT_SECS must be > 0"));
        }
        if confirm_poll_ms == 0 {
            return Err(anyhow!("CONFIRM_POLL_MS must be > 0"));
        }

        // Runtime
        let dry_run = env_bool(&lookup, "DRY_RUN", false);
        let log_format = env_opt(&lookup, "LOG_FORMAT").unwrap_or_else(|| "pretty".to_string());

        let activity_api_url = env_opt(&lookup, "ACTIVITY_API_URL");

        // Batch
        let batch_max_items = env_parse::<usize>(&lookup, "BATCH_MAX_ITEMS")?.unwrap_or(10);
        let batch_delay_ms = env_parse::<u64>(&lookup, "BATCH_DELAY_MS")?.unwrap_or(2_000);
        let batch_retention = env_parse::<usize>(&lookup, "BATCH_RETENTION")?.unwrap_or(100);
        if batch_max_items == 0 {
            return Err(anyhow!("BATCH_MAX_ITEMS must be > 0"));
        }
        if batch_retention == 0 {
            return Err(anyhow!("BATCH_RETENTION must be > 0"));
        }

        let min_balance_sol = env_parse::<f64>(&lookup, "MIN_BALANCE_SOL")?.unwrap_or(0.01);
        if min_balance_sol < 0.0 {
            return Err(anyhow!("MIN_BALANCE_SOL cannot be negative"));
        }

        let slack_webhook_url = env_opt(&lookup, "SLACK_WEBHOOK_URL");
        let score_audit_log = env_opt(&lookup, "SCORE_AUDIT_LOG");

        Ok(Self {
            rpc_url,
            commitment,
            registry_program_id,
            oracle_keypair_path,
            confirm_timeout_secs,
            confirm_poll_ms,
            dry_run,
            log_format,
            activity_api_url,
            batch_max_items,
            batch_delay_ms,
            batch_retention,
            min_balance_sol,
            slack_webhook_url,
            score_audit_log,
        })
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}
