// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use crate::db;
use crate::ledger::{Ledger, LotPolicy};
use crate::models::TxKind;
use crate::pricing::SqlitePrices;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection) -> Result<()> {
    let issues = find_issues(conn)?;
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues.into_iter().map(|(k, d)| vec![k, d]).collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Replays the log one transaction at a time and keeps going past
/// rejected ones, so every problem is reported rather than the first.
pub fn find_issues(conn: &Connection) -> Result<Vec<(String, String)>> {
    let settings = Settings::load(conn)?;
    let config = settings.ledger_config(None);
    let mut issues = Vec::new();
    let mut ledger = Ledger::new(config);

    for tx in db::load_transactions(conn)? {
        if let Some(lot) = tx.lot_ref {
            if tx.kind != TxKind::Acquire && config.policy != LotPolicy::Specific {
                issues.push((
                    "lot_ref_ignored".to_string(),
                    format!("tx {} names lot {} under {}", tx.id, lot, config.policy),
                ));
            }
        }
        if let Err(e) = ledger.apply(&tx) {
            tracing::debug!(tx_id = tx.id, error = %e, "doctor: transaction rejected");
            issues.push(("ledger_error".to_string(), e.to_string()));
        }
    }

    let prices = SqlitePrices::new(conn).latest_all()?;
    for h in ledger.holdings() {
        if prices.latest(&h.asset).is_none() {
            issues.push((
                "missing_price".to_string(),
                format!("{} held with no recorded price", h.asset),
            ));
        }
    }
    Ok(issues)
}
