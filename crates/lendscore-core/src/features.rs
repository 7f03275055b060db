//! Per-wallet feature aggregation
//!
//! Groups canonical transactions by wallet and computes one [`FeatureVector`]
//! per wallet of the universe. Wallets without activity still get a row, with
//! explicit defaults. Ratios with a zero denominator are 0.

use std::collections::{BTreeSet, HashMap, HashSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{
    normalize_address, ActionKind, CanonicalTransaction, FeatureVector, SECONDS_PER_DAY,
};

/// Normalize and de-duplicate wallet identifiers, keeping first-seen order.
pub fn build_universe<I, S>(wallets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    wallets
        .into_iter()
        .map(|w| normalize_address(w.as_ref()))
        .filter(|w| !w.is_empty() && seen.insert(w.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureAggregator {
    /// Reference time for recency, Unix seconds
    as_of: i64,
}

impl FeatureAggregator {
    pub fn new(as_of: i64) -> Self {
        Self { as_of }
    }

    pub fn as_of(&self) -> i64 {
        self.as_of
    }

    /// One feature vector per universe wallet, in universe order.
    ///
    /// Failed transactions and transactions of wallets outside the universe
    /// are ignored.
    pub fn aggregate(
        &self,
        universe: &[String],
        transactions: &[CanonicalTransaction],
    ) -> Vec<FeatureVector> {
        let universe = build_universe(universe);
        let members: HashSet<&str> = universe.iter().map(String::as_str).collect();

        let mut grouped: HashMap<String, Vec<&CanonicalTransaction>> = HashMap::new();
        let mut failed = 0usize;
        let mut outside = 0usize;

        for tx in transactions {
            if !tx.success {
                failed += 1;
                continue;
            }
            let wallet = normalize_address(&tx.wallet);
            if !members.contains(wallet.as_str()) {
                outside += 1;
                continue;
            }
            grouped.entry(wallet).or_default().push(tx);
        }

        tracing::debug!(
            wallets = universe.len(),
            active_wallets = grouped.len(),
            transactions = transactions.len(),
            failed = failed,
            outside_universe = outside,
            "Aggregating wallet features"
        );

        universe
            .into_iter()
            .map(|wallet| match grouped.remove(&wallet) {
                Some(txs) => self.compute(wallet, &txs),
                None => FeatureVector::inactive(wallet),
            })
            .collect()
    }

    fn compute(&self, wallet: String, txs: &[&CanonicalTransaction]) -> FeatureVector {
        let total = txs.len() as u64;
        let mut fv = FeatureVector::inactive(wallet);
        if total == 0 {
            return fv;
        }
        let n = total as f64;

        let mut contracts = BTreeSet::new();
        let mut assets = BTreeSet::new();
        let mut total_usd = Decimal::ZERO;
        let mut first_ts = i64::MAX;
        let mut last_ts = i64::MIN;

        for tx in txs.iter() {
            match tx.action {
                ActionKind::Supply => {
                    fv.num_supplies += 1;
                    fv.total_supply_usd += tx.amount_usd;
                }
                ActionKind::Borrow => {
                    fv.num_borrows += 1;
                    fv.total_borrow_usd += tx.amount_usd;
                }
                ActionKind::Repay => {
                    fv.num_repays += 1;
                    fv.total_repay_usd += tx.amount_usd;
                }
                ActionKind::Redeem => {
                    fv.num_redeems += 1;
                    fv.total_redeem_usd += tx.amount_usd;
                }
                ActionKind::Withdraw => {
                    fv.num_withdraws += 1;
                    fv.total_redeem_usd += tx.amount_usd;
                }
                ActionKind::Liquidation => fv.num_liquidations += 1,
            }

            total_usd += tx.amount_usd;
            first_ts = first_ts.min(tx.timestamp);
            last_ts = last_ts.max(tx.timestamp);
            fv.total_gas_used = fv.total_gas_used.saturating_add(tx.gas_used);
            if let Some(contract) = &tx.contract {
                contracts.insert(contract.as_str());
            }
            if let Some(asset) = &tx.asset {
                assets.insert(asset.as_str());
            }
        }

        fv.total_transactions = total;
        fv.avg_gas_per_tx = fv.total_gas_used as f64 / n;

        fv.wallet_age_days = if total > 1 {
            days_between(first_ts, last_ts)
        } else {
            0.0
        };
        fv.tx_frequency_per_day = if fv.wallet_age_days > 0.0 {
            n / fv.wallet_age_days.max(1.0)
        } else {
            0.0
        };

        fv.has_liquidation = fv.num_liquidations > 0;
        fv.liquidation_ratio = fv.num_liquidations as f64 / n;
        fv.liquidation_to_total_ratio = fv.liquidation_ratio;

        fv.borrow_repay_ratio = ratio(fv.num_repays as f64, fv.num_borrows as f64);
        fv.supply_redeem_ratio = ratio(
            (fv.num_redeems + fv.num_withdraws) as f64,
            fv.num_supplies as f64,
        );

        fv.unique_contracts = contracts.len() as u64;
        fv.diversification_score = fv.unique_contracts as f64 / n;
        fv.unique_assets = assets.len() as u64;

        fv.recent_activity_days = days_between(last_ts, self.as_of).max(0.0);

        fv.net_borrow_usd = fv.total_borrow_usd - fv.total_repay_usd;
        fv.repay_to_borrow_ratio = usd_ratio(fv.total_repay_usd, fv.total_borrow_usd);
        fv.borrow_to_deposit_ratio = usd_ratio(fv.total_borrow_usd, fv.total_supply_usd);
        fv.redeem_to_deposit_ratio = usd_ratio(fv.total_redeem_usd, fv.total_supply_usd);
        fv.avg_transaction_usd = total_usd
            .checked_div(Decimal::from(total))
            .unwrap_or(Decimal::ZERO);

        tracing::trace!(
            wallet = %fv.wallet,
            transactions = total,
            age_days = fv.wallet_age_days,
            liquidations = fv.num_liquidations,
            "Wallet features computed"
        );

        fv
    }
}

/// `numerator / denominator`, or 0 when the denominator is not positive.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn usd_ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator <= Decimal::ZERO {
        return 0.0;
    }
    numerator
        .checked_div(denominator)
        .and_then(|r| r.to_f64())
        .unwrap_or(0.0)
}

/// `to - from` in days, computed in i128 so no pair of i64 timestamps overflows.
fn days_between(from: i64, to: i64) -> f64 {
    (i128::from(to) - i128::from(from)) as f64 / SECONDS_PER_DAY
}
