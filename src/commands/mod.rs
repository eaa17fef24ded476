// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod config;
pub mod doctor;
pub mod exporter;
pub mod gains;
pub mod holdings;
pub mod importer;
pub mod prices;
pub mod tax;
pub mod transactions;
pub mod wallets;

use crate::config::Settings;
use crate::db;
use crate::ledger::{LedgerOutcome, LotPolicy, compute};
use crate::utils::opt_str;
use anyhow::{Context, Result};
use rusqlite::Connection;

/// Replays the stored log with the saved settings and an optional
/// `--policy` override taken from `m`.
pub fn replay(conn: &Connection, m: &clap::ArgMatches) -> Result<(Settings, LedgerOutcome)> {
    let policy = opt_str(m, "policy")
        .map(|p| p.parse::<LotPolicy>())
        .transpose()?;
    replay_with(conn, policy)
}

pub fn replay_with(
    conn: &Connection,
    policy: Option<LotPolicy>,
) -> Result<(Settings, LedgerOutcome)> {
    let settings = Settings::load(conn)?;
    let txs = db::load_transactions(conn)?;
    let outcome = compute(&txs, settings.ledger_config(policy))
        .context("Replaying transaction log")?;
    Ok((settings, outcome))
}
