use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use solana_sdk::pubkey::Pubkey;

use crate::domain::{ActivitySnapshot, RepaymentHistory};
use crate::error::ProviderError;

/// Source of lending-activity facts for a wallet. Owns its own retry policy.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    async fn fetch(&self, wallet: &Pubkey) -> Result<ActivitySnapshot, ProviderError>;
}

/// Indexing service reachable over HTTP.
#[derive(Clone)]
pub struct HttpActivityProvider {
    base_url: String,
    http: Client,
}

impl HttpActivityProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ActivityProvider for HttpActivityProvider {
    async fn fetch(&self, wallet: &Pubkey) -> Result<ActivitySnapshot, ProviderError> {
        let url = format!("{}/wallets/{}/activity", self.base_url, wallet);
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let body = resp.bytes().await?;
        let snapshot: ActivitySnapshot =
            serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        if snapshot.address != wallet.to_string() {
            return Err(ProviderError::Decode(format!(
                "snapshot for {} returned for {wallet}",
                snapshot.address
            )));
        }
        Ok(snapshot)
    }
}

/// Stand-in for real chain scanning: the same wallet always yields the same facts.
#[derive(Debug, Clone, Default)]
pub struct MockActivityProvider;

impl MockActivityProvider {
    pub fn snapshot_for(wallet: &Pubkey) -> ActivitySnapshot {
        let bytes = wallet.to_bytes();
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&bytes[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

        let has_lending_activity = rng.gen_bool(0.8);
        let never_liquidated = rng.gen_bool(0.85);
        let account_age_months = rng.gen_range(0..=48);
        let protocol_count = if has_lending_activity { rng.gen_range(1..=5) } else { 0 };
        let repayment_history = if has_lending_activity {
            match rng.gen_range(0..4) {
                0 => RepaymentHistory::Poor,
                1 => RepaymentHistory::Average,
                2 => RepaymentHistory::Good,
                _ => RepaymentHistory::Strong,
            }
        } else {
            RepaymentHistory::None
        };
        let total_borrowed_usd = if has_lending_activity {
            rng.gen_range(100.0..100_000.0_f64).round()
        } else {
            0.0
        };
        let total_repaid_usd = (total_borrowed_usd * rng.gen_range(0.5..=1.0)).round();

        ActivitySnapshot {
            address: wallet.to_string(),
            has_lending_activity,
            never_liquidated,
            account_age_months,
            protocol_count,
            repayment_history,
            total_borrowed_usd,
            total_repaid_usd,
        }
    }
}

#[async_trait]
impl ActivityProvider for MockActivityProvider {
    async fn fetch(&self, wallet: &Pubkey) -> Result<ActivitySnapshot, ProviderError> {
        Ok(Self::snapshot_for(wallet))
    }
}
