//! Fixed-weight credit score over an [`ActivitySnapshot`].
//!
//! Pure and deterministic: no I/O, no hidden state.

use serde::{Deserialize, Serialize};

use crate::domain::{ActivitySnapshot, RepaymentHistory};

pub const MIN_SCORE: u16 = 300;
pub const MAX_SCORE: u16 = 850;

pub const BASE_SCORE: u32 = 500;
pub const LENDING_ACTIVITY_BONUS: u32 = 100;
pub const NEVER_LIQUIDATED_BONUS: u32 = 50;
pub const ACCOUNT_AGE_BONUS: u32 = 100;
pub const PROTOCOL_DIVERSITY_BONUS: u32 = 50;
pub const PERFECT_REPAYMENT_BONUS: u32 = 150;

pub const MIN_ACCOUNT_AGE_MONTHS: u32 = 6;
pub const MIN_PROTOCOL_COUNT: u32 = 2;

impl RepaymentHistory {
    /// Repayment bonus for this tier. Tiers are mutually exclusive.
    pub fn bonus(self) -> u32 {
        match self {
            RepaymentHistory::Strong => PERFECT_REPAYMENT_BONUS,
            // floor(150 * 0.7)
            RepaymentHistory::Good => PERFECT_REPAYMENT_BONUS * 7 / 10,
            // floor(150 * 0.4)
            RepaymentHistory::Average => PERFECT_REPAYMENT_BONUS * 4 / 10,
            RepaymentHistory::Poor | RepaymentHistory::None | RepaymentHistory::Unknown => 0,
        }
    }
}

/// Every component that went into a score, kept for audit trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base: u32,
    pub lending_activity: u32,
    pub never_liquidated: u32,
    pub account_age: u32,
    pub protocol_diversity: u32,
    pub repayment: u32,
    /// Sum before clamping.
    pub raw: u32,
    pub score: u16,
}

pub fn score_breakdown(activity: &ActivitySnapshot) -> ScoreBreakdown {
    let bonus = |cond: bool, value: u32| if cond { value } else { 0 };

    let lending_activity = bonus(activity.has_lending_activity, LENDING_ACTIVITY_BONUS);
    let never_liquidated = bonus(activity.never_liquidated, NEVER_LIQUIDATED_BONUS);
    let account_age = bonus(
        activity.account_age_months >= MIN_ACCOUNT_AGE_MONTHS,
        ACCOUNT_AGE_BONUS,
    );
    let protocol_diversity = bonus(
        activity.protocol_count >= MIN_PROTOCOL_COUNT,
        PROTOCOL_DIVERSITY_BONUS,
    );
    let repayment = activity.repayment_history.bonus();

    let raw = BASE_SCORE
        + lending_activity
        + never_liquidated
        + account_age
        + protocol_diversity
        + repayment;

    ScoreBreakdown {
        base: BASE_SCORE,
        lending_activity,
        never_liquidated,
        account_age,
        protocol_diversity,
        repayment,
        raw,
        score: clamp_score(raw),
    }
}

/// Credit score in `[MIN_SCORE, MAX_SCORE]`.
pub fn score(activity: &ActivitySnapshot) -> u16 {
    score_breakdown(activity).score
}

fn clamp_score(raw: u32) -> u16 {
    raw.clamp(u32::from(MIN_SCORE), u32::from(MAX_SCORE)) as u16
}
