// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{Transaction, TxKind};
use crate::utils::{fmt_timestamp, parse_timestamp};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Lotkeeper", "lotkeeper"));

/// Overrides the platform data directory location of the database file.
pub const DB_ENV: &str = "LOTKEEPER_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("lotkeeper.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS wallets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        wallet_id INTEGER,
        kind TEXT NOT NULL CHECK(kind IN ('acquire','dispose','transfer')),
        asset TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        quantity TEXT NOT NULL,
        unit_price TEXT NOT NULL,
        fee TEXT NOT NULL DEFAULT '0',
        lot_ref INTEGER,
        note TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(wallet_id) REFERENCES wallets(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(timestamp);
    CREATE INDEX IF NOT EXISTS idx_transactions_asset ON transactions(asset);

    -- Manually recorded unit prices in the fiat currency
    CREATE TABLE IF NOT EXISTS prices(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset TEXT NOT NULL,
        as_of TEXT NOT NULL,
        price TEXT NOT NULL,
        source TEXT NOT NULL,
        UNIQUE(asset, as_of)
    );
    "#,
    )?;
    Ok(())
}

/// Stores a transaction and returns its new id. `tx.id` is ignored.
pub fn insert_transaction(
    conn: &Connection,
    tx: &Transaction,
    wallet_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(wallet_id, kind, asset, timestamp, quantity, unit_price, fee, lot_ref, note)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            wallet_id,
            tx.kind.as_str(),
            tx.asset,
            fmt_timestamp(&tx.timestamp),
            tx.quantity.to_string(),
            tx.unit_price.to_string(),
            tx.fee.to_string(),
            tx.lot_ref,
            tx.note.as_deref()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rewrites every column of transaction `id`. Returns false when it does not exist.
pub fn update_transaction(
    conn: &Connection,
    id: i64,
    tx: &Transaction,
    wallet_id: Option<i64>,
) -> Result<bool> {
    let n = conn.execute(
        "UPDATE transactions SET wallet_id=?2, kind=?3, asset=?4, timestamp=?5, quantity=?6,
                unit_price=?7, fee=?8, lot_ref=?9, note=?10
         WHERE id=?1",
        params![
            id,
            wallet_id,
            tx.kind.as_str(),
            tx.asset,
            fmt_timestamp(&tx.timestamp),
            tx.quantity.to_string(),
            tx.unit_price.to_string(),
            tx.fee.to_string(),
            tx.lot_ref,
            tx.note.as_deref()
        ],
    )?;
    Ok(n > 0)
}

/// The full log in ledger order: timestamp, then insertion (id).
pub fn load_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.id, t.timestamp, t.asset, t.kind, t.quantity, t.unit_price, t.fee,
                t.lot_ref, w.name, t.note
         FROM transactions t LEFT JOIN wallets w ON t.wallet_id=w.id
         ORDER BY t.timestamp, t.id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, Option<i64>>(7)?,
            r.get::<_, Option<String>>(8)?,
            r.get::<_, Option<String>>(9)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, ts_s, asset, kind_s, qty_s, price_s, fee_s, lot_ref, wallet, note) = row?;
        let timestamp = parse_timestamp(&ts_s)
            .with_context(|| format!("Invalid timestamp '{}' on transaction {}", ts_s, id))?;
        let kind: TxKind = kind_s
            .parse()
            .with_context(|| format!("Invalid kind on transaction {}", id))?;
        let quantity = Decimal::from_str_exact(&qty_s)
            .with_context(|| format!("Invalid quantity '{}' on transaction {}", qty_s, id))?;
        let unit_price = Decimal::from_str_exact(&price_s)
            .with_context(|| format!("Invalid price '{}' on transaction {}", price_s, id))?;
        let fee = Decimal::from_str_exact(&fee_s)
            .with_context(|| format!("Invalid fee '{}' on transaction {}", fee_s, id))?;
        out.push(Transaction {
            id,
            timestamp,
            asset,
            kind,
            quantity,
            unit_price,
            fee,
            lot_ref,
            wallet,
            note,
        });
    }
    Ok(out)
}
