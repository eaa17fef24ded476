// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::replay;
use crate::models::RealizedGain;
use crate::utils::{fmt_timestamp, maybe_print_json, normalize_symbol, opt_str, parse_year, pretty_table};
use anyhow::Result;
use chrono::Datelike;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let rows = gain_rows(conn, m)?;
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &rows)? {
        return Ok(());
    }
    let table_rows = rows
        .iter()
        .map(|g| {
            vec![
                g.tx_id.to_string(),
                fmt_timestamp(&g.disposed_at),
                g.asset.clone(),
                format!("{}", g.quantity.normalize()),
                format!("{:.2}", g.proceeds),
                format!("{:.2}", g.cost_basis),
                format!("{:.2}", g.gain),
                g.term.to_string(),
                g.slices.len().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Tx", "Disposed", "Asset", "Qty", "Proceeds", "Basis", "Gain", "Term", "Lots"],
            table_rows
        )
    );
    Ok(())
}

/// Realized gains from a full replay, narrowed by `--year` / `--asset`.
pub fn gain_rows(conn: &Connection, m: &clap::ArgMatches) -> Result<Vec<RealizedGain>> {
    let year = opt_str(m, "year").map(parse_year).transpose()?;
    let asset = opt_str(m, "asset").map(normalize_symbol).transpose()?;
    let (_, outcome) = replay(conn, m)?;
    Ok(outcome
        .gains
        .into_iter()
        .filter(|g| year.is_none_or(|y| g.disposed_at.year() == y))
        .filter(|g| asset.as_deref().is_none_or(|a| g.asset == a))
        .collect())
}
