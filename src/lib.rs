//! Credit-score oracle: scores a wallet's lending activity and publishes the
//! score to an on-chain registry through a single authorized signing key.

pub mod activity;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod journal;
pub mod monitoring;
pub mod notifier;
pub mod registry;
pub mod scoring;
pub mod service;
pub mod startup;

pub use coordinator::{Coordinator, UpdateStage};
pub use domain::{ActivitySnapshot, RepaymentHistory, ScoreUpdate};
pub use error::{ErrorKind, OracleError};
pub use registry::{RegistryClient, ScoreRegistry};
pub use scoring::{score, score_breakdown, MAX_SCORE, MIN_SCORE};
pub use service::OracleService;
