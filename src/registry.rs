use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RegistryError;

pub const REGISTRY_SEED: &[u8] = b"registry";
pub const SCORE_SEED: &[u8] = b"credit_score";

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0; 32]);

/// A submitted (or simulated) `update_score` transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub signature: Signature,
    pub wallet: Pubkey,
    pub score: u16,
    /// Block height after which the blockhash, and the transaction, expire.
    pub last_valid_block_height: u64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: String,
    pub slot: u64,
}

/// Decoded score account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainScore {
    pub wallet: Pubkey,
    pub score: u16,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub authority: Pubkey,
    pub oracle: Pubkey,
    pub bump: u8,
}

/// Operations of the on-chain score registry, always through the oracle identity.
#[async_trait]
pub trait ScoreRegistry: Send + Sync {
    /// Address of the signing identity.
    fn oracle_address(&self) -> Pubkey;

    /// Signs and submits `update_score(wallet, score)`. Does not wait for inclusion.
    async fn submit_score(&self, wallet: &Pubkey, score: u16) -> Result<PendingUpdate, RegistryError>;

    /// Suspends until the transaction is confirmed, fails, or expires.
    async fn await_confirmation(&self, pending: &PendingUpdate) -> Result<Confirmation, RegistryError>;

    async fn score_of(&self, wallet: &Pubkey) -> Result<Option<OnChainScore>, RegistryError>;

    async fn has_score(&self, wallet: &Pubkey) -> Result<bool, RegistryError> {
        Ok(self.score_of(wallet).await?.is_some())
    }

    /// The oracle address the registry currently authorizes.
    async fn current_oracle_address(&self) -> Result<Pubkey, RegistryError>;

    /// Native balance of the signing account, in SOL.
    async fn balance(&self) -> Result<f64, RegistryError>;
}

// --- account / instruction layout ---

fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = hash(format!("{namespace}:{name}").as_bytes()).to_bytes();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub fn update_score_discriminator() -> [u8; 8] {
    discriminator("global", "update_score")
}

pub fn score_account_discriminator() -> [u8; 8] {
    discriminator("account", "CreditScore")
}

pub fn registry_account_discriminator() -> [u8; 8] {
    discriminator("account", "Registry")
}

pub fn registry_pda(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[REGISTRY_SEED], program_id).0
}

pub fn score_pda(program_id: &Pubkey, wallet: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[SCORE_SEED, wallet.as_ref()], program_id).0
}

pub fn update_score_instruction(
    program_id: &Pubkey,
    oracle: &Pubkey,
    wallet: &Pubkey,
    score: u16,
) -> Result<Instruction, RegistryError> {
    let mut data = update_score_discriminator().to_vec();
    let args = bincode::serialize(&(wallet, score)).map_err(|e| RegistryError::Decode(e.to_string()))?;
    data.extend_from_slice(&args);

    Ok(Instruction::new_with_bytes(
        *program_id,
        &data,
        vec![
            AccountMeta::new_readonly(registry_pda(program_id), false),
            AccountMeta::new(score_pda(program_id, wallet), false),
            AccountMeta::new(*oracle, true),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
    ))
}

fn decode_account<T: serde::de::DeserializeOwned>(
    data: &[u8],
    expected: [u8; 8],
    what: &str,
) -> Result<T, RegistryError> {
    if data.len() < 8 || data[..8] != expected {
        return Err(RegistryError::Decode(format!("{what}: unexpected discriminator")));
    }
    bincode::deserialize(&data[8..]).map_err(|e| RegistryError::Decode(format!("{what}: {e}")))
}

pub fn decode_score_account(data: &[u8]) -> Result<OnChainScore, RegistryError> {
    decode_account(data, score_account_discriminator(), "score account")
}

pub fn decode_registry_state(data: &[u8]) -> Result<RegistryState, RegistryError> {
    decode_account(data, registry_account_discriminator(), "registry state")
}

fn commitment_from_str(level: &str) -> CommitmentConfig {
    match level {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}

/// Registry client backed by a Solana JSON-RPC endpoint.
pub struct RegistryClient {
    rpc: RpcClient,
    program_id: Pubkey,
    keypair: Keypair,
    commitment: CommitmentConfig,
    confirm_timeout: Duration,
    poll_interval: Duration,
    dry_run: bool,
}

impl RegistryClient {
    pub fn new(cfg: &Config) -> Result<Self, RegistryError> {
        let program_id = Pubkey::from_str(&cfg.registry_program_id)
            .map_err(|e| RegistryError::Configuration(format!("REGISTRY_PROGRAM_ID: {e}")))?;
        let keypair = load_keypair(&cfg.oracle_keypair_path)?;
        let commitment = commitment_from_str(&cfg.commitment);
        let rpc = RpcClient::new_with_commitment(cfg.rpc_url.clone(), commitment);

        info!(
            rpc_url = %cfg.rpc_url,
            program_id = %program_id,
            oracle = %keypair.pubkey(),
            dry_run = cfg.dry_run,
            "registry.init"
        );

        Ok(Self {
            rpc,
            program_id,
            keypair,
            commitment,
            confirm_timeout: cfg.confirm_timeout(),
            poll_interval: cfg.confirm_poll_interval(),
            dry_run: cfg.dry_run,
        })
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    async fn poll_confirmation(&self, pending: &PendingUpdate) -> Result<Confirmation, RegistryError> {
        let sig = pending.signature;
        loop {
            let status = self.rpc.get_signature_statuses(&[sig]).await?.value.into_iter().next().flatten();
            match status {
                Some(status) => {
                    if let Some(err) = &status.err {
                        return Err(RegistryError::TransactionFailed(format!("{sig}: {err:?}")));
                    }
                    if status.satisfies_commitment(self.commitment) {
                        return Ok(Confirmation { tx_hash: sig.to_string(), slot: status.slot });
                    }
                    // Landed without error, so it can no longer expire; only the timeout applies.
                    debug!(signature = %sig, slot = status.slot, "registry.confirm.landed");
                }
                None => {
                    let height = self.rpc.get_block_height().await?;
                    if height > pending.last_valid_block_height {
                        return Err(RegistryError::TransactionFailed(format!(
                            "{sig}: blockhash expired at height {height} before confirmation"
                        )));
                    }
                    debug!(signature = %sig, height, "registry.confirm.pending");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn load_keypair(path: &str) -> Result<Keypair, RegistryError> {
    read_keypair_file(path)
        .map_err(|e| RegistryError::Configuration(format!("cannot read oracle keypair {path}: {e}")))
}

#[async_trait]
impl ScoreRegistry for RegistryClient {
    fn oracle_address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn submit_score(&self, wallet: &Pubkey, score: u16) -> Result<PendingUpdate, RegistryError> {
        let oracle = self.keypair.pubkey();
        let ix = update_score_instruction(&self.program_id, &oracle, wallet, score)?;

        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&oracle), &[&self.keypair], blockhash);

        if self.dry_run {
            let sim = self.rpc.simulate_transaction(&tx).await?;
            if let Some(err) = sim.value.err {
                return Err(RegistryError::TransactionFailed(format!("simulation failed: {err:?}")));
            }
            info!(%wallet, score, "registry.submit.dry_run");
            return Ok(PendingUpdate {
                signature: tx.signatures.first().copied().unwrap_or_default(),
                wallet: *wallet,
                score,
                last_valid_block_height,
                dry_run: true,
            });
        }

        let signature = self.rpc.send_transaction(&tx).await?;
        info!(%wallet, score, %signature, "registry.submit");

        Ok(PendingUpdate {
            signature,
            wallet: *wallet,
            score,
            last_valid_block_height,
            dry_run: false,
        })
    }

    async fn await_confirmation(&self, pending: &PendingUpdate) -> Result<Confirmation, RegistryError> {
        if pending.dry_run {
            return Ok(Confirmation { tx_hash: "DRY_RUN".into(), slot: 0 });
        }

        match tokio::time::timeout(self.confirm_timeout, self.poll_confirmation(pending)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(signature = %pending.signature, timeout = ?self.confirm_timeout, "registry.confirm.timeout");
                Err(RegistryError::TransactionFailed(format!(
                    "{}: not confirmed within {:?}",
                    pending.signature, self.confirm_timeout
                )))
            }
        }
    }

    async fn score_of(&self, wallet: &Pubkey) -> Result<Option<OnChainScore>, RegistryError> {
        let pda = score_pda(&self.program_id, wallet);
        let account = self
            .rpc
            .get_account_with_commitment(&pda, self.commitment)
            .await?
            .value;

        match account {
            Some(acc) if acc.owner == self.program_id => Ok(Some(decode_score_account(&acc.data)?)),
            _ => Ok(None),
        }
    }

    async fn current_oracle_address(&self) -> Result<Pubkey, RegistryError> {
        let data = self.rpc.get_account_data(&registry_pda(&self.program_id)).await?;
        Ok(decode_registry_state(&data)?.oracle)
    }

    async fn balance(&self) -> Result<f64, RegistryError> {
        let lamports = self.rpc.get_balance(&self.keypair.pubkey()).await?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_score_instruction_layout() {
        let program = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();

        let ix = update_score_instruction(&program, &oracle, &wallet, 712).unwrap();

        assert_eq!(ix.program_id, program);
        assert_eq!(ix.data.len(), 8 + 32 + 2);
        assert_eq!(ix.data[..8], update_score_discriminator());
        assert_eq!(ix.data[8..40], wallet.to_bytes());
        assert_eq!(ix.data[40..], 712u16.to_le_bytes());

        let oracle_meta = &ix.accounts[2];
        assert_eq!(oracle_meta.pubkey, oracle);
        assert!(oracle_meta.is_signer && oracle_meta.is_writable);
        assert_eq!(ix.accounts[1].pubkey, score_pda(&program, &wallet));
        assert!(ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[4].pubkey, SYSTEM_PROGRAM_ID);
        assert_eq!(SYSTEM_PROGRAM_ID.to_string(), "11111111111111111111111111111111");
    }

    #[test]
    fn score_pda_is_per_wallet() {
        let program = Pubkey::new_unique();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_eq!(score_pda(&program, &a), score_pda(&program, &a));
        assert_ne!(score_pda(&program, &a), score_pda(&program, &b));
        assert_ne!(score_pda(&program, &a), registry_pda(&program));
    }

    #[test]
    fn decodes_score_account_and_tolerates_padding() {
        let wallet = Pubkey::new_unique();
        let mut data = score_account_discriminator().to_vec();
        data.extend_from_slice(&wallet.to_bytes());
        data.extend_from_slice(&640u16.to_le_bytes());
        data.extend_from_slice(&1_760_000_000i64.to_le_bytes());
        data.extend_from_slice(&[0u8; 16]);

        let decoded = decode_score_account(&data).unwrap();
        assert_eq!(decoded, OnChainScore { wallet, score: 640, updated_at: 1_760_000_000 });
    }

    #[test]
    fn decodes_registry_oracle() {
        let authority = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        let mut data = registry_account_discriminator().to_vec();
        data.extend_from_slice(&authority.to_bytes());
        data.extend_from_slice(&oracle.to_bytes());
        data.push(254);

        assert_eq!(decode_registry_state(&data).unwrap().oracle, oracle);
    }

    #[test]
    fn rejects_foreign_accounts() {
        let mut data = registry_account_discriminator().to_vec();
        data.extend_from_slice(&[0u8; 42]);
        assert!(matches!(decode_score_account(&data), Err(RegistryError::Decode(_))));
        assert!(matches!(decode_score_account(&[1, 2, 3]), Err(RegistryError::Decode(_))));
    }

    #[test]
    fn discriminators_differ() {
        assert_ne!(score_account_discriminator(), registry_account_discriminator());
        assert_ne!(update_score_discriminator(), score_account_discriminator());
    }

    mod confirmation {
        use super::*;
        use serde_json::{json, Value};
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn client(uri: String, commitment: CommitmentConfig, confirm_timeout: Duration) -> RegistryClient {
            RegistryClient {
                rpc: RpcClient::new_with_commitment(uri, commitment),
                program_id: Pubkey::new_unique(),
                keypair: Keypair::new(),
                commitment,
                confirm_timeout,
                poll_interval: Duration::from_millis(10),
                dry_run: false,
            }
        }

        fn pending(last_valid_block_height: u64) -> PendingUpdate {
            PendingUpdate {
                signature: Signature::from([9u8; 64]),
                wallet: Pubkey::new_unique(),
                score: 710,
                last_valid_block_height,
                dry_run: false,
            }
        }

        fn rpc_result(result: Value) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
        }

        fn statuses(status: Value) -> Value {
            json!({ "context": { "slot": 1_000 }, "value": [status] })
        }

        fn landed(slot: u64, confirmations: Option<u64>, level: &str) -> Value {
            json!({
                "slot": slot,
                "confirmations": confirmations,
                "status": { "Ok": null },
                "err": null,
                "confirmationStatus": level,
            })
        }

        async fn mount(server: &MockServer, rpc_method: &str, result: Value) {
            Mock::given(method("POST"))
                .and(body_partial_json(json!({ "method": rpc_method })))
                .respond_with(rpc_result(result))
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn landed_transaction_outlives_its_blockhash_until_finalized() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(body_partial_json(json!({ "method": "getSignatureStatuses" })))
                .respond_with(rpc_result(statuses(landed(999, Some(0), "processed"))))
                .up_to_n_times(3)
                .with_priority(1)
                .mount(&server)
                .await;
            mount(&server, "getSignatureStatuses", statuses(landed(999, None, "finalized"))).await;
            mount(&server, "getBlockHeight", json!(501)).await;

            let client = client(server.uri(), CommitmentConfig::finalized(), Duration::from_secs(5));
            let confirmation = client.await_confirmation(&pending(500)).await.unwrap();

            assert_eq!(confirmation.slot, 999);
            assert_eq!(confirmation.tx_hash, Signature::from([9u8; 64]).to_string());
        }

        #[tokio::test]
        async fn unseen_transaction_fails_once_blockhash_expires() {
            let server = MockServer::start().await;
            mount(&server, "getSignatureStatuses", statuses(Value::Null)).await;
            mount(&server, "getBlockHeight", json!(501)).await;

            let client = client(server.uri(), CommitmentConfig::confirmed(), Duration::from_secs(5));
            let err = client.await_confirmation(&pending(500)).await.unwrap_err();

            assert!(matches!(&err, RegistryError::TransactionFailed(msg) if msg.contains("expired at height 501")));
        }

        #[tokio::test]
        async fn gives_up_after_confirm_timeout() {
            let server = MockServer::start().await;
            mount(&server, "getSignatureStatuses", statuses(Value::Null)).await;
            mount(&server, "getBlockHeight", json!(100)).await;

            let client = client(server.uri(), CommitmentConfig::confirmed(), Duration::from_millis(200));
            let err = client.await_confirmation(&pending(500)).await.unwrap_err();

            assert!(matches!(&err, RegistryError::TransactionFailed(msg) if msg.contains("not confirmed within")));
        }

        #[tokio::test]
        async fn program_error_fails_the_confirmation() {
            let server = MockServer::start().await;
            let program_error = json!({ "InstructionError": [0, { "Custom": 6000 }] });
            mount(
                &server,
                "getSignatureStatuses",
                statuses(json!({
                    "slot": 640,
                    "confirmations": 1,
                    "status": { "Err": program_error },
                    "err": program_error,
                    "confirmationStatus": "confirmed",
                })),
            )
            .await;

            let client = client(server.uri(), CommitmentConfig::confirmed(), Duration::from_secs(5));
            let err = client.await_confirmation(&pending(500)).await.unwrap_err();

            assert!(matches!(&err, RegistryError::TransactionFailed(msg) if msg.contains("6000")));
        }

        #[tokio::test]
        async fn dry_run_confirms_without_rpc() {
            let server = MockServer::start().await;
            let client = client(server.uri(), CommitmentConfig::confirmed(), Duration::from_secs(5));
            let pending = PendingUpdate { dry_run: true, ..pending(500) };

            let confirmation = client.await_confirmation(&pending).await.unwrap();

            assert_eq!(confirmation, Confirmation { tx_hash: "DRY_RUN".into(), slot: 0 });
            assert!(server.received_requests().await.unwrap_or_default().is_empty());
        }
    }
}
