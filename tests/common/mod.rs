#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use credit_oracle::activity::ActivityProvider;
use credit_oracle::error::{ProviderError, RegistryError};
use credit_oracle::registry::{Confirmation, OnChainScore, PendingUpdate, ScoreRegistry};
use credit_oracle::{ActivitySnapshot, RepaymentHistory};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit(Pubkey, u16),
    Confirm(Pubkey),
    HasScore(Pubkey),
    Oracle,
    Balance,
}

/// In-memory registry that behaves like a chain that confirms instantly.
pub struct MockRegistry {
    pub oracle: Pubkey,
    pub registry_oracle: Mutex<Pubkey>,
    pub balance: Mutex<f64>,
    pub calls: Mutex<Vec<Call>>,
    pub scores: Mutex<HashMap<Pubkey, u16>>,
    pub reject_submit: Mutex<HashSet<Pubkey>>,
    pub revert: Mutex<HashSet<Pubkey>>,
    pub queries_down: AtomicBool,
    pub crash_on_submit: AtomicBool,
    pub submit_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    next_slot: AtomicU64,
}

impl MockRegistry {
    pub fn new() -> Self {
        let oracle = Pubkey::new_unique();
        Self {
            oracle,
            registry_oracle: Mutex::new(oracle),
            balance: Mutex::new(1.5),
            calls: Mutex::new(Vec::new()),
            scores: Mutex::new(HashMap::new()),
            reject_submit: Mutex::new(HashSet::new()),
            revert: Mutex::new(HashSet::new()),
            queries_down: AtomicBool::new(false),
            crash_on_submit: AtomicBool::new(false),
            submit_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            next_slot: AtomicU64::new(100),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submits(&self) -> Vec<(Pubkey, u16)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit(w, s) => Some((w, s)),
                _ => None,
            })
            .collect()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_queries(&self) -> Result<(), RegistryError> {
        if self.queries_down.load(Ordering::SeqCst) {
            return Err(RegistryError::Rpc("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreRegistry for MockRegistry {
    fn oracle_address(&self) -> Pubkey {
        self.oracle
    }

    async fn submit_score(&self, wallet: &Pubkey, score: u16) -> Result<PendingUpdate, RegistryError> {
        self.log(Call::Submit(*wallet, score));
        if self.crash_on_submit.load(Ordering::SeqCst) {
            panic!("signer crashed");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.reject_submit.lock().unwrap().contains(wallet) {
            return Err(RegistryError::Rpc("node rejected transaction".into()));
        }
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst);
        Ok(PendingUpdate {
            signature: Signature::from([slot as u8; 64]),
            wallet: *wallet,
            score,
            last_valid_block_height: slot + 150,
            dry_run: false,
        })
    }

    async fn await_confirmation(&self, pending: &PendingUpdate) -> Result<Confirmation, RegistryError> {
        self.log(Call::Confirm(pending.wallet));
        if self.revert.lock().unwrap().contains(&pending.wallet) {
            return Err(RegistryError::TransactionFailed("custom program error: 0x1770".into()));
        }
        self.scores.lock().unwrap().insert(pending.wallet, pending.score);
        Ok(Confirmation {
            tx_hash: pending.signature.to_string(),
            slot: pending.last_valid_block_height - 150,
        })
    }

    async fn score_of(&self, wallet: &Pubkey) -> Result<Option<OnChainScore>, RegistryError> {
        self.log(Call::HasScore(*wallet));
        self.check_queries()?;
        Ok(self.scores.lock().unwrap().get(wallet).map(|score| OnChainScore {
            wallet: *wallet,
            score: *score,
            updated_at: 0,
        }))
    }

    async fn current_oracle_address(&self) -> Result<Pubkey, RegistryError> {
        self.log(Call::Oracle);
        self.check_queries()?;
        Ok(*self.registry_oracle.lock().unwrap())
    }

    async fn balance(&self) -> Result<f64, RegistryError> {
        self.log(Call::Balance);
        self.check_queries()?;
        Ok(*self.balance.lock().unwrap())
    }
}

/// Serves fixed snapshots; unknown wallets fail like an unreachable indexer.
#[derive(Default)]
pub struct StaticProvider {
    pub snapshots: Mutex<HashMap<Pubkey, ActivitySnapshot>>,
    pub fetches: AtomicUsize,
}

impl StaticProvider {
    pub fn insert(&self, wallet: Pubkey, snapshot: ActivitySnapshot) {
        self.snapshots.lock().unwrap().insert(wallet, snapshot);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityProvider for StaticProvider {
    async fn fetch(&self, wallet: &Pubkey) -> Result<ActivitySnapshot, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .unwrap()
            .get(wallet)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("indexer timed out for {wallet}")))
    }
}

pub fn snapshot(
    wallet: &Pubkey,
    lending: bool,
    never_liquidated: bool,
    age: u32,
    protocols: u32,
    repayment: RepaymentHistory,
) -> ActivitySnapshot {
    ActivitySnapshot {
        address: wallet.to_string(),
        has_lending_activity: lending,
        never_liquidated,
        account_age_months: age,
        protocol_count: protocols,
        repayment_history: repayment,
        total_borrowed_usd: 2_500.0,
        total_repaid_usd: 2_400.0,
    }
}

/// Wallet whose fixed snapshot scores 710.
pub fn average_wallet(provider: &StaticProvider) -> Pubkey {
    let wallet = Pubkey::new_unique();
    provider.insert(wallet, snapshot(&wallet, true, true, 4, 1, RepaymentHistory::Average));
    wallet
}
