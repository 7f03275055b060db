//! Wire formats of the two event sources
//!
//! - Block-explorer `txlist` rows (Etherscan-compatible API)
//! - Pre-extracted JSON action logs (one record per lending action)
//!
//! Both are decoded leniently: numeric fields arrive as strings or numbers,
//! and anything unparseable becomes a default rather than an error. The one
//! exception is the timestamp: a record without a usable time is dropped.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{is_valid_timestamp, EventPayload, RawEvent};

// ============================================================================
// Block explorer
// ============================================================================

/// Envelope of an Etherscan-style `account/txlist` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ExplorerResponse {
    /// Transactions on success, an empty list for "No transactions found",
    /// and the API's message otherwise.
    pub fn into_transactions(self) -> Result<Vec<ExplorerTransaction>, String> {
        if self.status == "1" {
            return serde_json::from_value(self.result)
                .map_err(|e| format!("malformed txlist result: {}", e));
        }
        if self.message.eq_ignore_ascii_case("No transactions found") {
            return Ok(Vec::new());
        }
        let detail = match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Err(format!("{}: {}", self.message, detail))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    #[serde(default)]
    pub block_number: String,
    #[serde(default)]
    pub time_stamp: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Wei sent with the call
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub gas_used: String,
    #[serde(default)]
    pub is_error: String,
    #[serde(default)]
    pub input: String,
}

impl ExplorerTransaction {
    /// `None` when the row has no usable timestamp.
    pub fn to_raw_event(&self) -> Option<RawEvent> {
        let Some(timestamp) = self
            .time_stamp
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|ts| is_valid_timestamp(*ts))
        else {
            tracing::warn!(
                tx_hash = %self.hash,
                time_stamp = %self.time_stamp,
                "Dropping explorer row with invalid timestamp"
            );
            return None;
        };

        let to = Some(self.to.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        // Only native-ETH markets carry a value; there is no price in a txlist row.
        let value = self.value.trim();
        let (amount, asset_symbol) = if value.is_empty() || value == "0" {
            (None, None)
        } else {
            (Some(value.to_string()), Some("ETH".to_string()))
        };

        Some(RawEvent {
            wallet: self.from.clone(),
            to,
            payload: EventPayload::CallData(self.input.clone()),
            amount,
            asset_symbol,
            asset_price_usd: None,
            timestamp,
            gas_used: self.gas_used.trim().parse().unwrap_or(0),
            gas_price: self.gas_price.trim().parse().unwrap_or(0),
            tx_hash: self.hash.clone(),
            block_number: self.block_number.trim().parse().unwrap_or(0),
            success: self.is_error.trim() != "1",
        })
    }
}

// ============================================================================
// Action log
// ============================================================================

/// One record of a pre-extracted action log.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogRecord {
    pub user_wallet: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub block_number: Value,
    #[serde(default)]
    pub action_data: Option<ActionData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub asset_symbol: Option<String>,
    #[serde(rename = "assetPriceUSD", default)]
    pub asset_price_usd: Value,
    /// Reserve/pool contract, used as the destination address
    #[serde(default)]
    pub pool_id: Option<String>,
}

impl ActionLogRecord {
    /// `None` when the record has no usable timestamp.
    pub fn to_raw_event(&self) -> Option<RawEvent> {
        let Some(timestamp) = value_as_i64(&self.timestamp).filter(|ts| is_valid_timestamp(*ts))
        else {
            tracing::warn!(
                wallet = %self.user_wallet,
                tx_hash = ?self.tx_hash,
                timestamp = %self.timestamp,
                "Dropping action record with invalid timestamp"
            );
            return None;
        };

        let data = self.action_data.clone().unwrap_or_default();

        Some(RawEvent {
            wallet: self.user_wallet.clone(),
            to: data.pool_id.filter(|p| !p.trim().is_empty()),
            payload: EventPayload::Label(self.action.clone()),
            amount: value_as_integer_text(&data.amount),
            asset_symbol: data.asset_symbol,
            asset_price_usd: value_as_decimal(&data.asset_price_usd),
            timestamp,
            gas_used: 0,
            gas_price: 0,
            tx_hash: self.tx_hash.clone().unwrap_or_default(),
            block_number: value_as_i64(&self.block_number)
                .and_then(|b| u64::try_from(b).ok())
                .unwrap_or(0),
            success: true,
        })
    }
}

/// Parse a JSON action log (an array of records).
pub fn parse_action_log(json: &str) -> Result<Vec<ActionLogRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

fn value_as_integer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) if n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Prices arrive as long decimal strings or JSON numbers.
fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(Decimal::from_f64))
        }
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        _ => None,
    }
}

/// Integral values only; fractional or out-of-range numbers give `None`.
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
