//! Data models for the scoring pipeline
//!
//! Raw events come in from a block explorer or an action log, become
//! canonical transactions, are aggregated into one feature vector per wallet,
//! and leave as score results.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LendscoreError, LendscoreResult};

/// Recency value for wallets with no recorded activity.
pub const NEVER_ACTIVE_DAYS: f64 = 99999.0;

pub const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// Latest accepted event time (9999-12-31T23:59:59Z). Later or non-positive
/// timestamps are rejected at decode time.
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

pub fn is_valid_timestamp(ts: i64) -> bool {
    ts > 0 && ts <= MAX_TIMESTAMP
}

// =============================================================================
// Actions
// =============================================================================

/// Canonical category of a lending-protocol interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Supply,
    Borrow,
    Repay,
    Redeem,
    Withdraw,
    Liquidation,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Supply => write!(f, "supply"),
            ActionKind::Borrow => write!(f, "borrow"),
            ActionKind::Repay => write!(f, "repay"),
            ActionKind::Redeem => write!(f, "redeem"),
            ActionKind::Withdraw => write!(f, "withdraw"),
            ActionKind::Liquidation => write!(f, "liquidation"),
        }
    }
}

impl ActionKind {
    /// Map a symbolic action label (as found in pre-extracted action logs).
    /// Unknown labels return `None` and are dropped by the caller.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "deposit" | "supply" | "mint" => Some(ActionKind::Supply),
            "borrow" => Some(ActionKind::Borrow),
            "repay" => Some(ActionKind::Repay),
            "redeem" | "redeemunderlying" => Some(ActionKind::Redeem),
            "withdraw" => Some(ActionKind::Withdraw),
            "liquidation" | "liquidationcall" => Some(ActionKind::Liquidation),
            _ => None,
        }
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Lower-case and trim an address so every comparison downstream is case-insensitive.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// `0x` followed by 40 hex characters, any case.
pub fn is_valid_address(address: &str) -> bool {
    let address = address.trim();
    address.len() == 42
        && (address.starts_with("0x") || address.starts_with("0X"))
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate and normalize a wallet address.
pub fn parse_wallet(address: &str) -> LendscoreResult<String> {
    if !is_valid_address(address) {
        return Err(LendscoreError::InvalidAddress(address.trim().to_string()));
    }
    Ok(normalize_address(address))
}

// =============================================================================
// Raw events
// =============================================================================

/// What the event says it did: either raw call data or an explicit label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum EventPayload {
    /// Hex-encoded call data; the first 10 characters are the function selector
    CallData(String),
    /// Symbolic action name, e.g. "deposit" or "liquidationcall"
    Label(String),
}

/// One on-chain interaction attempt, as fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Sending wallet
    pub wallet: String,

    /// Destination contract, if the source records one
    pub to: Option<String>,

    pub payload: EventPayload,

    /// Token amount in base units, as text (may exceed u64)
    pub amount: Option<String>,

    pub asset_symbol: Option<String>,

    /// USD price of the asset at execution time
    pub asset_price_usd: Option<Decimal>,

    /// Unix seconds
    pub timestamp: i64,

    pub gas_used: u64,
    pub gas_price: u64,
    pub tx_hash: String,
    pub block_number: u64,
    pub success: bool,
}

// =============================================================================
// Canonical transactions
// =============================================================================

/// A raw event that matched a recognized protocol action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Lower-cased wallet address
    pub wallet: String,
    pub timestamp: i64,
    pub action: ActionKind,
    /// Symbolic market name (e.g. "cUSDC") when the destination is a registered
    /// market, else the lower-cased pool address from a labelled record; `None`
    /// when the source gives no destination
    pub contract: Option<String>,
    /// Upper-cased asset symbol, when the source provides one
    pub asset: Option<String>,
    pub amount_usd: Decimal,
    pub gas_used: u64,
    pub tx_hash: String,
    pub success: bool,
}

impl CanonicalTransaction {
    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

// =============================================================================
// Features
// =============================================================================

/// Fixed-shape per-wallet feature row.
///
/// Every field has an explicit zero-activity default (see [`FeatureVector::inactive`]);
/// ratios whose denominator is zero are 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub wallet: String,

    pub total_transactions: u64,
    pub num_supplies: u64,
    pub num_borrows: u64,
    pub num_repays: u64,
    pub num_redeems: u64,
    pub num_withdraws: u64,
    pub num_liquidations: u64,

    pub total_gas_used: u64,
    pub avg_gas_per_tx: f64,

    /// Days between first and last transaction; 0 with one or no transactions
    pub wallet_age_days: f64,
    pub tx_frequency_per_day: f64,

    pub has_liquidation: bool,
    pub liquidation_ratio: f64,

    /// Repay count over borrow count
    pub borrow_repay_ratio: f64,
    /// Redeem + withdraw count over supply count
    pub supply_redeem_ratio: f64,

    pub unique_contracts: u64,
    pub diversification_score: f64,

    /// Days since the last transaction, or [`NEVER_ACTIVE_DAYS`]
    pub recent_activity_days: f64,

    pub total_supply_usd: Decimal,
    pub total_borrow_usd: Decimal,
    pub total_repay_usd: Decimal,
    pub total_redeem_usd: Decimal,
    pub net_borrow_usd: Decimal,
    /// Repay USD over borrow USD
    pub repay_to_borrow_ratio: f64,
    pub borrow_to_deposit_ratio: f64,
    pub redeem_to_deposit_ratio: f64,
    pub liquidation_to_total_ratio: f64,
    pub unique_assets: u64,
    pub avg_transaction_usd: Decimal,
}

impl FeatureVector {
    /// Column names of [`FeatureVector::numeric_columns`], in order.
    pub const NUMERIC_COLUMNS: [&'static str; 29] = [
        "total_transactions",
        "num_supplies",
        "num_borrows",
        "num_repays",
        "num_redeems",
        "num_withdraws",
        "num_liquidations",
        "total_gas_used",
        "avg_gas_per_tx",
        "wallet_age_days",
        "tx_frequency_per_day",
        "has_liquidation",
        "liquidation_ratio",
        "borrow_repay_ratio",
        "supply_redeem_ratio",
        "unique_contracts",
        "diversification_score",
        "recent_activity_days",
        "total_supply_usd",
        "total_borrow_usd",
        "total_repay_usd",
        "total_redeem_usd",
        "net_borrow_usd",
        "repay_to_borrow_ratio",
        "borrow_to_deposit_ratio",
        "redeem_to_deposit_ratio",
        "liquidation_to_total_ratio",
        "unique_assets",
        "avg_transaction_usd",
    ];

    /// Row for a wallet with no recorded activity.
    pub fn inactive(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            total_transactions: 0,
            num_supplies: 0,
            num_borrows: 0,
            num_repays: 0,
            num_redeems: 0,
            num_withdraws: 0,
            num_liquidations: 0,
            total_gas_used: 0,
            avg_gas_per_tx: 0.0,
            wallet_age_days: 0.0,
            tx_frequency_per_day: 0.0,
            has_liquidation: false,
            liquidation_ratio: 0.0,
            borrow_repay_ratio: 0.0,
            supply_redeem_ratio: 0.0,
            unique_contracts: 0,
            diversification_score: 0.0,
            recent_activity_days: NEVER_ACTIVE_DAYS,
            total_supply_usd: Decimal::ZERO,
            total_borrow_usd: Decimal::ZERO,
            total_repay_usd: Decimal::ZERO,
            total_redeem_usd: Decimal::ZERO,
            net_borrow_usd: Decimal::ZERO,
            repay_to_borrow_ratio: 0.0,
            borrow_to_deposit_ratio: 0.0,
            redeem_to_deposit_ratio: 0.0,
            liquidation_to_total_ratio: 0.0,
            unique_assets: 0,
            avg_transaction_usd: Decimal::ZERO,
        }
    }

    pub fn is_active(&self) -> bool {
        self.total_transactions > 0
    }

    /// Numeric view used for standardization and clustering; booleans become 0/1.
    pub fn numeric_columns(&self) -> [f64; 29] {
        [
            self.total_transactions as f64,
            self.num_supplies as f64,
            self.num_borrows as f64,
            self.num_repays as f64,
            self.num_redeems as f64,
            self.num_withdraws as f64,
            self.num_liquidations as f64,
            self.total_gas_used as f64,
            self.avg_gas_per_tx,
            self.wallet_age_days,
            self.tx_frequency_per_day,
            if self.has_liquidation { 1.0 } else { 0.0 },
            self.liquidation_ratio,
            self.borrow_repay_ratio,
            self.supply_redeem_ratio,
            self.unique_contracts as f64,
            self.diversification_score,
            self.recent_activity_days,
            usd(self.total_supply_usd),
            usd(self.total_borrow_usd),
            usd(self.total_repay_usd),
            usd(self.total_redeem_usd),
            usd(self.net_borrow_usd),
            self.repay_to_borrow_ratio,
            self.borrow_to_deposit_ratio,
            self.redeem_to_deposit_ratio,
            self.liquidation_to_total_ratio,
            self.unique_assets as f64,
            usd(self.avg_transaction_usd),
        ]
    }
}

fn usd(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

// =============================================================================
// Scores
// =============================================================================

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 1000.0;

/// Final per-wallet score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    #[serde(rename = "wallet_id")]
    pub wallet: String,
    pub score: u16,
}

impl ScoreResult {
    /// Clamp to [0, 1000] and round half away from zero.
    pub fn from_raw(wallet: impl Into<String>, raw: f64) -> Self {
        let clamped = if raw.is_nan() {
            MIN_SCORE
        } else {
            raw.clamp(MIN_SCORE, MAX_SCORE)
        };
        Self {
            wallet: wallet.into(),
            score: clamped.round() as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_label() {
        assert_eq!(ActionKind::from_label("deposit"), Some(ActionKind::Supply));
        assert_eq!(ActionKind::from_label("RedeemUnderlying"), Some(ActionKind::Redeem));
        assert_eq!(ActionKind::from_label(" LiquidationCall "), Some(ActionKind::Liquidation));
        assert_eq!(ActionKind::from_label("flashloan"), None);
        assert_eq!(ActionKind::from_label(""), None);
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0x0039f22efb07a647557c7c5d17854cfd6d489ef3"));
        assert!(is_valid_address("0x5d3a536E4D6DbD6114cc1Ead35777bAB948E3643"));
        assert!(!is_valid_address("0x0039f22efb07a647557c7c5d17854cfd6d489ef"));
        assert!(!is_valid_address("0039f22efb07a647557c7c5d17854cfd6d489ef3ab"));
        assert!(!is_valid_address("0xzz39f22efb07a647557c7c5d17854cfd6d489ef3"));

        assert_eq!(
            parse_wallet(" 0x5d3a536E4D6DbD6114cc1Ead35777bAB948E3643 ").unwrap(),
            "0x5d3a536e4d6dbd6114cc1ead35777bab948e3643"
        );
        assert!(parse_wallet("not-a-wallet").is_err());
    }

    #[test]
    fn test_inactive_vector_defaults() {
        let fv = FeatureVector::inactive("0xabc");
        assert!(!fv.is_active());
        assert_eq!(fv.recent_activity_days, NEVER_ACTIVE_DAYS);
        assert!(fv.numeric_columns()[..17].iter().all(|v| *v == 0.0));
        assert_eq!(fv.numeric_columns().len(), FeatureVector::NUMERIC_COLUMNS.len());
    }

    #[test]
    fn test_numeric_columns_convert_usd() {
        let mut fv = FeatureVector::inactive("0xabc");
        fv.total_supply_usd = Decimal::new(123_456, 2);
        fv.net_borrow_usd = Decimal::new(-5, 1);
        let cols = fv.numeric_columns();
        assert_eq!(cols[18], 1234.56);
        assert_eq!(cols[22], -0.5);
    }

    #[test]
    fn test_timestamp_range() {
        assert!(is_valid_timestamp(1_629_178_166));
        assert!(is_valid_timestamp(MAX_TIMESTAMP));
        assert!(!is_valid_timestamp(0));
        assert!(!is_valid_timestamp(-1));
        assert!(!is_valid_timestamp(i64::MIN));
        assert!(!is_valid_timestamp(i64::MAX));
    }

    #[test]
    fn test_score_result_clamps_and_rounds() {
        assert_eq!(ScoreResult::from_raw("w", 1004.6).score, 1000);
        assert_eq!(ScoreResult::from_raw("w", -12.0).score, 0);
        assert_eq!(ScoreResult::from_raw("w", 412.5).score, 413);
        assert_eq!(ScoreResult::from_raw("w", 412.49).score, 412);
        assert_eq!(ScoreResult::from_raw("w", f64::NAN).score, 0);
    }
}
