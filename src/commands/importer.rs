// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::{ensure_consistent, resolve_price};
use crate::db;
use crate::models::{Transaction, TxKind};
use crate::pricing::SqlitePrices;
use crate::utils::{arg_str, id_for_wallet, normalize_symbol, opt_str, parse_decimal, parse_timestamp};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, hash_map::Entry};

/// One line of `timestamp,type,asset,quantity,price,fee,wallet,lot,note`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
    asset: String,
    quantity: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    fee: Option<String>,
    #[serde(default)]
    wallet: Option<String>,
    #[serde(default)]
    lot: Option<i64>,
    #[serde(default)]
    note: Option<String>,
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => import_transactions(conn, sub),
        _ => Ok(()),
    }
}

fn import_transactions(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let path = arg_str(sub, "path")?;
    let default_wallet = opt_str(sub, "wallet");
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let tx = conn.transaction()?;
    let mut wallet_cache: HashMap<String, i64> = HashMap::new();
    let mut count = 0usize;

    for (idx, result) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = idx + 2;
        let row = result.with_context(|| format!("Malformed row at line {}", line))?;

        let timestamp = parse_timestamp(&row.timestamp)
            .with_context(|| format!("Line {}: invalid timestamp", line))?;
        let kind: TxKind = row
            .kind
            .parse()
            .with_context(|| format!("Line {}: invalid type", line))?;
        let asset = normalize_symbol(&row.asset).with_context(|| format!("Line {}", line))?;
        let quantity = parse_decimal(&row.quantity)
            .with_context(|| format!("Line {}: invalid quantity", line))?;
        let fee = match non_blank(&row.fee) {
            Some(raw) => parse_decimal(raw).with_context(|| format!("Line {}: invalid fee", line))?,
            None => Decimal::ZERO,
        };
        let unit_price = resolve_price(&SqlitePrices::new(&tx), non_blank(&row.price), &asset, timestamp)
            .with_context(|| format!("Line {}: price", line))?;

        let wallet_id = match non_blank(&row.wallet).or(default_wallet) {
            Some(name) => {
                let id = match wallet_cache.entry(name.to_string()) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        let fetched = id_for_wallet(&tx, name)
                            .with_context(|| format!("Line {}", line))?;
                        *entry.insert(fetched)
                    }
                };
                Some(id)
            }
            None => None,
        };

        let mut record = Transaction::new(0, timestamp, &asset, kind, quantity, unit_price).with_fee(fee);
        record.lot_ref = row.lot;
        record.note = non_blank(&row.note).map(str::to_string);
        db::insert_transaction(&tx, &record, wallet_id)?;
        count += 1;
    }

    ensure_consistent(&tx).context("Import rejected, nothing was saved")?;
    tx.commit()?;
    tracing::info!(count, path, "transactions imported");
    println!("Imported {} transactions from {}", count, path);
    Ok(())
}
