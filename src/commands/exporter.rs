// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db;
use crate::models::Transaction;
use crate::utils::{arg_str, fmt_timestamp, id_for_wallet, opt_str};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde::Serialize;

const HEADER: [&str; 9] = [
    "timestamp", "type", "asset", "quantity", "price", "fee", "wallet", "lot", "note",
];

/// Same columns the importer reads, so an export can be re-imported.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub asset: String,
    pub quantity: String,
    pub price: String,
    pub fee: String,
    pub wallet: Option<String>,
    pub lot: Option<i64>,
    pub note: Option<String>,
}

impl From<Transaction> for ExportRow {
    fn from(t: Transaction) -> Self {
        Self {
            timestamp: fmt_timestamp(&t.timestamp),
            kind: t.kind.as_str().to_string(),
            asset: t.asset,
            quantity: t.quantity.to_string(),
            price: t.unit_price.to_string(),
            fee: t.fee.to_string(),
            wallet: t.wallet,
            lot: t.lot_ref,
            note: t.note,
        }
    }
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        _ => Ok(()),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = arg_str(sub, "format")?.to_lowercase();
    let out = arg_str(sub, "out")?;
    if fmt != "csv" && fmt != "json" {
        return Err(anyhow!("Unknown format: {} (use csv|json)", fmt));
    }

    let wallet = opt_str(sub, "wallet");
    if let Some(name) = wallet {
        id_for_wallet(conn, name)?;
    }

    let rows: Vec<ExportRow> = db::load_transactions(conn)?
        .into_iter()
        .filter(|t| wallet.is_none() || t.wallet.as_deref() == wallet)
        .map(ExportRow::from)
        .collect();

    if fmt == "csv" {
        let mut wtr = csv::Writer::from_path(out).with_context(|| format!("Create {}", out))?;
        if rows.is_empty() {
            wtr.write_record(HEADER)?;
        }
        for row in &rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    } else {
        std::fs::write(out, serde_json::to_string_pretty(&rows)?)
            .with_context(|| format!("Write {}", out))?;
    }
    tracing::info!(count = rows.len(), out, "transactions exported");
    println!("Exported {} transactions to {}", rows.len(), out);
    Ok(())
}
