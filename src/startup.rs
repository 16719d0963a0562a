use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::notifier::Notifier;
use crate::registry::ScoreRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationReport {
    pub oracle_address: Pubkey,
    pub registry_oracle: Pubkey,
    pub balance_sol: f64,
    pub min_balance_sol: f64,
}

impl AuthorizationReport {
    /// Base58 keys are case-sensitive, so this is exact key equality.
    pub fn is_authorized(&self) -> bool {
        self.oracle_address == self.registry_oracle
    }

    pub fn low_balance(&self) -> bool {
        self.balance_sol < self.min_balance_sol
    }
}

pub async fn inspect(
    registry: &dyn ScoreRegistry,
    min_balance_sol: f64,
) -> Result<AuthorizationReport, RegistryError> {
    let registry_oracle = registry.current_oracle_address().await?;
    let balance_sol = registry.balance().await?;
    Ok(AuthorizationReport {
        oracle_address: registry.oracle_address(),
        registry_oracle,
        balance_sol,
        min_balance_sol,
    })
}

/// Non-fatal: every finding is logged (and alerted) but startup continues.
pub async fn verify(
    registry: &dyn ScoreRegistry,
    min_balance_sol: f64,
    notifier: &Notifier,
) -> Option<AuthorizationReport> {
    let report = match inspect(registry, min_balance_sol).await {
        Ok(r) => r,
        Err(err) => {
            warn!(error = %err, oracle = %registry.oracle_address(), "startup.authorization.unavailable");
            return None;
        }
    };

    if report.is_authorized() {
        info!(oracle = %report.oracle_address, "startup.authorization.ok");
    } else {
        let msg = format!(
            "oracle key {} is NOT the registry oracle {}; score updates will be rejected on-chain",
            report.oracle_address, report.registry_oracle
        );
        warn!(
            oracle = %report.oracle_address,
            registry_oracle = %report.registry_oracle,
            "startup.authorization.mismatch"
        );
        alert(notifier, "startup.authorization.mismatch", &msg).await;
    }

    if report.low_balance() {
        let msg = format!(
            "oracle balance {:.6} SOL is below {:.6} SOL; submissions may fail for lack of fees",
            report.balance_sol, report.min_balance_sol
        );
        warn!(
            balance_sol = report.balance_sol,
            min_balance_sol = report.min_balance_sol,
            "startup.balance.low"
        );
        alert(notifier, "startup.balance.low", &msg).await;
    } else {
        info!(balance_sol = report.balance_sol, "startup.balance.ok");
    }

    Some(report)
}

async fn alert(notifier: &Notifier, event: &str, msg: &str) {
    if let Err(err) = notifier.alert(event, msg).await {
        warn!(event, error = %err, "startup.alert.failed");
    }
}
