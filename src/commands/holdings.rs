// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::replay;
use crate::config::Settings;
use crate::db;
use crate::ledger::LedgerOutcome;
use crate::pricing::{PriceTable, SqlitePrices};
use crate::utils::{fmt_timestamp, id_for_wallet, maybe_print_json, opt_str, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingRow {
    pub asset: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub cost_basis: Decimal,
    pub lots: usize,
    pub last_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_gain: Option<Decimal>,
    /// Percent of the priced portfolio's market value.
    pub share_pct: Option<Decimal>,
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let (settings, outcome) = open_positions(conn, m)?;
    let prices = SqlitePrices::new(conn).latest_all()?;

    if m.get_flag("lots") {
        return print_lots(&outcome, m);
    }

    let rows = holding_rows(&outcome, &prices);
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &rows)? {
        return Ok(());
    }

    let fmt_opt = |d: Option<Decimal>| d.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".into());
    let total_value = total(rows.iter().filter_map(|r| r.market_value));
    let total_unrealized = total(rows.iter().filter_map(|r| r.unrealized_gain));
    let table_rows = rows
        .iter()
        .map(|r| {
            vec![
                r.asset.clone(),
                format!("{}", r.quantity.normalize()),
                format!("{:.2}", r.average_cost),
                format!("{:.2}", r.cost_basis),
                fmt_opt(r.last_price),
                fmt_opt(r.market_value),
                fmt_opt(r.unrealized_gain),
                fmt_opt(r.share_pct),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Asset", "Qty", "Avg Cost", "Basis", "Price", "Value", "Unrealized", "Share %"],
            table_rows
        )
    );
    println!(
        "Total value {} {:.2}, unrealized {} {:.2} (policy {})",
        settings.fiat_currency,
        total_value,
        settings.fiat_currency,
        total_unrealized,
        settings.lot_policy
    );
    Ok(())
}

/// Replays the log, then narrows open lots to `--wallet` when given.
pub fn open_positions(conn: &Connection, m: &clap::ArgMatches) -> Result<(Settings, LedgerOutcome)> {
    let (settings, mut outcome) = replay(conn, m)?;
    if let Some(wallet) = opt_str(m, "wallet") {
        keep_wallet_lots(conn, &mut outcome, wallet)?;
    }
    Ok((settings, outcome))
}

/// Drops open lots that were not acquired into `wallet`.
fn keep_wallet_lots(conn: &Connection, outcome: &mut LedgerOutcome, wallet: &str) -> Result<()> {
    id_for_wallet(conn, wallet)?;
    let ids: HashSet<i64> = db::load_transactions(conn)?
        .into_iter()
        .filter(|t| t.wallet.as_deref() == Some(wallet))
        .map(|t| t.id)
        .collect();
    outcome.open_lots.retain(|l| ids.contains(&l.id));
    Ok(())
}

/// Open positions valued at the latest recorded price, when there is one.
/// A value too large for `Decimal` is reported as unpriced.
pub fn holding_rows(outcome: &LedgerOutcome, prices: &PriceTable) -> Vec<HoldingRow> {
    let mut rows: Vec<HoldingRow> = outcome
        .holdings()
        .into_iter()
        .map(|h| {
            let last_price = prices.latest(&h.asset);
            let market_value = last_price.and_then(|p| p.checked_mul(h.quantity));
            HoldingRow {
                average_cost: h.average_cost(),
                unrealized_gain: market_value.and_then(|v| v.checked_sub(h.cost_basis)),
                asset: h.asset,
                quantity: h.quantity,
                cost_basis: h.cost_basis,
                lots: h.lots,
                last_price,
                market_value,
                share_pct: None,
            }
        })
        .collect();

    let total_value = total(rows.iter().filter_map(|r| r.market_value));
    if total_value > Decimal::ZERO {
        for row in &mut rows {
            row.share_pct = row
                .market_value
                .and_then(|v| v.checked_div(total_value))
                .map(|share| (share * Decimal::ONE_HUNDRED).round_dp(2));
        }
    }
    rows
}

fn total(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}

fn print_lots(outcome: &LedgerOutcome, m: &clap::ArgMatches) -> Result<()> {
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &outcome.open_lots)? {
        return Ok(());
    }
    let rows = outcome
        .open_lots
        .iter()
        .map(|l| {
            vec![
                l.id.to_string(),
                l.asset.clone(),
                fmt_timestamp(&l.acquired_at),
                format!("{}", l.quantity.normalize()),
                format!("{}", l.original_quantity.normalize()),
                format!("{:.2}", l.unit_cost()),
                format!("{:.2}", l.cost_basis),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Lot", "Asset", "Acquired", "Qty", "Orig Qty", "Unit Cost", "Basis"],
            rows
        )
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerConfig, compute};
    use crate::models::{Transaction, TxKind};
    use crate::utils::parse_timestamp;
    use rust_decimal_macros::dec;

    #[test]
    fn unrealized_gain_uses_latest_price_and_remaining_basis() {
        let at = |s: &str| parse_timestamp(s).unwrap();
        let txs = vec![
            Transaction::new(1, at("2024-01-01"), "BTC", TxKind::Acquire, dec!(1), dec!(100)),
            Transaction::new(2, at("2024-02-01"), "BTC", TxKind::Acquire, dec!(1), dec!(200)),
            Transaction::new(3, at("2024-03-01"), "BTC", TxKind::Dispose, dec!(1.5), dec!(300)),
            Transaction::new(4, at("2024-03-02"), "ETH", TxKind::Acquire, dec!(2), dec!(50)),
        ];
        let outcome = compute(&txs, LedgerConfig::default()).unwrap();
        let mut prices = PriceTable::new();
        prices.insert("BTC", at("2024-04-01"), dec!(400));

        let rows = holding_rows(&outcome, &prices);
        assert_eq!(rows.len(), 2);
        let btc = &rows[0];
        assert_eq!(btc.quantity, dec!(0.5));
        assert_eq!(btc.average_cost, dec!(200));
        assert_eq!(btc.market_value, Some(dec!(200)));
        assert_eq!(btc.unrealized_gain, Some(dec!(100)));
        assert_eq!(btc.share_pct, Some(dec!(100)));

        let eth = &rows[1];
        assert_eq!(eth.last_price, None);
        assert_eq!(eth.unrealized_gain, None);
        assert_eq!(eth.cost_basis, dec!(100));
        assert_eq!(eth.share_pct, None);
    }

    #[test]
    fn share_splits_priced_value_and_survives_huge_prices() {
        let at = |s: &str| parse_timestamp(s).unwrap();
        let txs = vec![
            Transaction::new(1, at("2024-01-01"), "BTC", TxKind::Acquire, dec!(1), dec!(100)),
            Transaction::new(2, at("2024-01-02"), "ETH", TxKind::Acquire, dec!(3), dec!(10)),
            Transaction::new(3, at("2024-01-03"), "DOGE", TxKind::Acquire, dec!(1000000), dec!(1)),
        ];
        let outcome = compute(&txs, LedgerConfig::default()).unwrap();
        let mut prices = PriceTable::new();
        prices.insert("BTC", at("2024-02-01"), dec!(300));
        prices.insert("ETH", at("2024-02-01"), dec!(100));

        let rows = holding_rows(&outcome, &prices);
        let share = |asset: &str| rows.iter().find(|r| r.asset == asset).unwrap().share_pct;
        assert_eq!(share("BTC"), Some(dec!(50)));
        assert_eq!(share("ETH"), Some(dec!(50)));
        assert_eq!(share("DOGE"), None);

        prices.insert("DOGE", at("2024-02-02"), Decimal::MAX);
        let rows = holding_rows(&outcome, &prices);
        let doge = rows.iter().find(|r| r.asset == "DOGE").unwrap();
        assert_eq!(doge.market_value, None);
        assert_eq!(doge.unrealized_gain, None);
        let btc = rows.iter().find(|r| r.asset == "BTC").unwrap();
        assert_eq!(btc.share_pct, Some(dec!(50)));
    }
}
