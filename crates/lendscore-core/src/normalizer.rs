//! Canonical transactions from classified raw events
//!
//! USD values are exact decimals: base units are scaled by the asset's
//! decimals and multiplied by the event's price without passing through
//! floating point.

use rust_decimal::Decimal;

use crate::models::{normalize_address, ActionKind, CanonicalTransaction, EventPayload, RawEvent};
use crate::registry::{AssetTable, MarketRegistry};

pub struct EventNormalizer<'a> {
    registry: &'a MarketRegistry,
    assets: &'a AssetTable,
}

impl<'a> EventNormalizer<'a> {
    pub fn new(registry: &'a MarketRegistry, assets: &'a AssetTable) -> Self {
        Self { registry, assets }
    }

    /// Build the canonical record for a classified event.
    ///
    /// Never fails: a bad amount, symbol or price yields `amount_usd = 0`.
    /// Registered destinations resolve to their market name. Labelled records
    /// keep their pool address as the contract; unregistered call-data
    /// destinations yield `contract = None`.
    pub fn normalize(&self, event: &RawEvent, action: ActionKind) -> CanonicalTransaction {
        let contract = event.to.as_deref().and_then(|to| self.contract_for(event, to));

        let asset = event
            .asset_symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase);

        CanonicalTransaction {
            wallet: normalize_address(&event.wallet),
            timestamp: event.timestamp,
            action,
            contract,
            amount_usd: self.amount_usd(event),
            asset,
            gas_used: event.gas_used,
            tx_hash: event.tx_hash.to_lowercase(),
            success: event.success,
        }
    }

    fn contract_for(&self, event: &RawEvent, to: &str) -> Option<String> {
        if let Some(market) = self.registry.lookup(to) {
            return Some(market.name().to_string());
        }
        match &event.payload {
            // Action logs name the pool directly; each pool is its own contract.
            EventPayload::Label(_) => Some(normalize_address(to)).filter(|a| !a.is_empty()),
            EventPayload::CallData(_) => {
                tracing::trace!(
                    tx_hash = %event.tx_hash,
                    to = %to,
                    "No market registered for destination"
                );
                None
            }
        }
    }

    /// `(raw_amount / 10^decimals) * price_usd`, or 0 when any input is unusable.
    pub fn amount_usd(&self, event: &RawEvent) -> Decimal {
        let (Some(amount), Some(symbol), Some(price)) = (
            event.amount.as_deref(),
            event.asset_symbol.as_deref(),
            event.asset_price_usd,
        ) else {
            return Decimal::ZERO;
        };

        if symbol.trim().is_empty() || price.is_sign_negative() {
            return Decimal::ZERO;
        }

        let Some(raw) = parse_base_units(amount) else {
            tracing::debug!(tx_hash = %event.tx_hash, amount = %amount, "Malformed amount, using 0 USD");
            return Decimal::ZERO;
        };

        let decimals = self.assets.decimals_for(symbol);
        let tokens = match Decimal::try_from_i128_with_scale(raw, decimals) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::debug!(
                    tx_hash = %event.tx_hash,
                    amount = %amount,
                    decimals = decimals,
                    error = %e,
                    "Amount out of decimal range, using 0 USD"
                );
                return Decimal::ZERO;
            }
        };

        tokens.checked_mul(price).unwrap_or_else(|| {
            tracing::debug!(tx_hash = %event.tx_hash, "USD value overflow, using 0 USD");
            Decimal::ZERO
        })
    }
}

/// Parse an unsigned integer amount in base units.
fn parse_base_units(amount: &str) -> Option<i128> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    amount.parse::<i128>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn label_event(amount: Option<&str>, symbol: Option<&str>, price: Option<Decimal>) -> RawEvent {
        RawEvent {
            wallet: "0x0039F22EFB07A647557C7C5D17854CFD6D489EF3".to_string(),
            to: None,
            payload: EventPayload::Label("deposit".to_string()),
            amount: amount.map(str::to_string),
            asset_symbol: symbol.map(str::to_string),
            asset_price_usd: price,
            timestamp: 1_629_178_166,
            gas_used: 0,
            gas_price: 0,
            tx_hash: "0xABC".to_string(),
            block_number: 1_629_178_166,
            success: true,
        }
    }

    #[test]
    fn test_usd_conversion_by_decimals() {
        let registry = MarketRegistry::compound();
        let assets = AssetTable::default();
        let normalizer = EventNormalizer::new(&registry, &assets);

        // 2000 USDC at $1
        let usdc = label_event(Some("2000000000"), Some("USDC"), Some(dec!(1)));
        assert_eq!(normalizer.amount_usd(&usdc), dec!(2000));

        // 1.5 WETH at $2000
        let weth = label_event(Some("1500000000000000000"), Some("WETH"), Some(dec!(2000)));
        assert_eq!(normalizer.amount_usd(&weth), dec!(3000));

        // 0.5 WBTC at $30000, 8 decimals
        let wbtc = label_event(Some("50000000"), Some("WBTC"), Some(dec!(30000)));
        assert_eq!(normalizer.amount_usd(&wbtc), dec!(15000));
    }

    #[test]
    fn test_usd_conversion_is_exact() {
        let registry = MarketRegistry::compound();
        let assets = AssetTable::default();
        let normalizer = EventNormalizer::new(&registry, &assets);

        // 0.1 + 0.2 style inputs stay exact
        let event = label_event(Some("300000"), Some("USDC"), Some(dec!(0.1)));
        assert_eq!(normalizer.amount_usd(&event), dec!(0.03));

        // 1 wei of an 18-decimal asset
        let wei = label_event(Some("1"), Some("DAI"), Some(dec!(1)));
        assert_eq!(normalizer.amount_usd(&wei), dec!(0.000000000000000001));
    }

    #[test]
    fn test_malformed_fields_give_zero_usd() {
        let registry = MarketRegistry::compound();
        let assets = AssetTable::default();
        let normalizer = EventNormalizer::new(&registry, &assets);

        let cases = [
            label_event(None, Some("USDC"), Some(dec!(1))),
            label_event(Some("1000"), None, Some(dec!(1))),
            label_event(Some("1000"), Some("USDC"), None),
            label_event(Some("12abc"), Some("USDC"), Some(dec!(1))),
            label_event(Some("1.5"), Some("USDC"), Some(dec!(1))),
            label_event(Some("-5"), Some("USDC"), Some(dec!(1))),
            label_event(Some("+5"), Some("USDC"), Some(dec!(1))),
            label_event(Some("1000"), Some("  "), Some(dec!(1))),
            label_event(Some("1000"), Some("USDC"), Some(dec!(-3))),
            // beyond the 96-bit decimal mantissa
            label_event(
                Some("340282366920938463463374607431768211455"),
                Some("USDC"),
                Some(dec!(1)),
            ),
        ];
        for event in &cases {
            let tx = normalizer.normalize(event, ActionKind::Supply);
            assert_eq!(tx.amount_usd, Decimal::ZERO, "{:?}", event);
        }
    }

    #[test]
    fn test_addresses_lower_cased_and_contract_resolved() {
        let registry = MarketRegistry::compound();
        let assets = AssetTable::default();
        let normalizer = EventNormalizer::new(&registry, &assets);

        let mut event = label_event(Some("1"), Some("usdc"), Some(dec!(1)));
        event.to = Some("0x39AA39c021dfbaE8faC545936693aC917d5E7563".to_string());
        event.payload = EventPayload::CallData("0xa0712d68".to_string());

        let tx = normalizer.normalize(&event, ActionKind::Supply);
        assert_eq!(tx.wallet, "0x0039f22efb07a647557c7c5d17854cfd6d489ef3");
        assert_eq!(tx.contract.as_deref(), Some("cUSDC"));
        assert_eq!(tx.asset.as_deref(), Some("USDC"));
        assert_eq!(tx.tx_hash, "0xabc");
    }

    #[test]
    fn test_unknown_call_destination_tolerated() {
        let registry = MarketRegistry::compound();
        let assets = AssetTable::default();
        let normalizer = EventNormalizer::new(&registry, &assets);

        let mut event = label_event(None, None, None);
        event.payload = EventPayload::CallData("0xc5ebeaec".to_string());
        event.to = Some("0x1111111111111111111111111111111111111111".to_string());
        let tx = normalizer.normalize(&event, ActionKind::Borrow);
        assert_eq!(tx.contract, None);
        assert_eq!(tx.action, ActionKind::Borrow);
    }

    #[test]
    fn test_labelled_record_keeps_pool_as_contract() {
        let registry = MarketRegistry::compound();
        let assets = AssetTable::default();
        let normalizer = EventNormalizer::new(&registry, &assets);

        let mut event = label_event(None, None, None);
        event.to = Some("0x2791BCA1F2DE4661ED88A30C99A7A9449AA84174".to_string());
        let tx = normalizer.normalize(&event, ActionKind::Supply);
        assert_eq!(
            tx.contract.as_deref(),
            Some("0x2791bca1f2de4661ed88a30c99a7a9449aa84174")
        );

        event.to = None;
        assert_eq!(normalizer.normalize(&event, ActionKind::Supply).contract, None);
    }
}
