// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::replay_with;
use crate::db;
use crate::models::{Transaction, TxKind};
use crate::pricing::{PriceSource, SqlitePrices};
use crate::utils::{
    arg_str, end_bound, fmt_timestamp, id_for_wallet, maybe_print_json, normalize_symbol,
    now_utc, opt_str, parse_decimal, parse_timestamp, parse_year, pretty_table,
};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("edit", sub)) => edit(conn, sub)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Fills in a missing unit price from recorded prices.
pub fn resolve_price(
    prices: &dyn PriceSource,
    raw: Option<&str>,
    asset: &str,
    at: NaiveDateTime,
) -> Result<Decimal> {
    match raw {
        Some(raw) => parse_decimal(raw),
        None => prices.price_at(asset, at)?.with_context(|| {
            format!(
                "No price given and none recorded for {} on or before {}",
                asset,
                fmt_timestamp(&at)
            )
        }),
    }
}

/// Replays the whole log; used after writes so a rejected change rolls back.
pub fn ensure_consistent(conn: &Connection) -> Result<()> {
    replay_with(conn, None).map(|_| ())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let kind: TxKind = arg_str(sub, "kind")?.parse()?;
    let asset = normalize_symbol(arg_str(sub, "asset")?)?;
    let quantity = parse_decimal(arg_str(sub, "quantity")?)?;
    let timestamp = match opt_str(sub, "date") {
        Some(raw) => parse_timestamp(raw)?,
        None => now_utc(),
    };
    let fee = match opt_str(sub, "fee") {
        Some(raw) => parse_decimal(raw)?,
        None => Decimal::ZERO,
    };
    let unit_price = resolve_price(
        &SqlitePrices::new(conn),
        opt_str(sub, "price"),
        &asset,
        timestamp,
    )?;
    let wallet_id = opt_str(sub, "wallet")
        .map(|w| id_for_wallet(conn, w))
        .transpose()?;

    let mut tx = Transaction::new(0, timestamp, &asset, kind, quantity, unit_price).with_fee(fee);
    tx.lot_ref = sub.get_one::<i64>("lot").copied();
    tx.note = opt_str(sub, "note").map(str::to_string);

    let dbtx = conn.transaction()?;
    let id = db::insert_transaction(&dbtx, &tx, wallet_id)?;
    ensure_consistent(&dbtx).context("Transaction rejected")?;
    dbtx.commit()?;

    tracing::info!(id, kind = %kind, asset = %asset, "transaction recorded");
    println!(
        "Recorded #{} {} {} {} @ {} (fee {}) on {}",
        id,
        kind,
        quantity,
        asset,
        unit_price,
        fee,
        fmt_timestamp(&timestamp)
    );
    Ok(())
}

/// Changes only the fields given; the rest keep their stored values.
fn edit(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("id").context("Missing --id")?;
    let mut tx = db::load_transactions(conn)?
        .into_iter()
        .find(|t| t.id == id)
        .with_context(|| format!("Transaction {} not found", id))?;

    if let Some(raw) = opt_str(sub, "kind") {
        tx.kind = raw.parse()?;
    }
    if let Some(raw) = opt_str(sub, "asset") {
        tx.asset = normalize_symbol(raw)?;
    }
    if let Some(raw) = opt_str(sub, "quantity") {
        tx.quantity = parse_decimal(raw)?;
    }
    if let Some(raw) = opt_str(sub, "price") {
        tx.unit_price = parse_decimal(raw)?;
    }
    if let Some(raw) = opt_str(sub, "fee") {
        tx.fee = parse_decimal(raw)?;
    }
    if let Some(raw) = opt_str(sub, "date") {
        tx.timestamp = parse_timestamp(raw)?;
    }
    if let Some(lot) = sub.get_one::<i64>("lot") {
        tx.lot_ref = Some(*lot);
    }
    if let Some(note) = opt_str(sub, "note") {
        tx.note = Some(note.to_string());
    }
    if let Some(wallet) = opt_str(sub, "wallet") {
        tx.wallet = Some(wallet.to_string());
    }
    let wallet_id = tx
        .wallet
        .as_deref()
        .map(|w| id_for_wallet(conn, w))
        .transpose()?;

    let dbtx = conn.transaction()?;
    db::update_transaction(&dbtx, id, &tx, wallet_id)?;
    ensure_consistent(&dbtx).with_context(|| format!("Cannot edit transaction {}", id))?;
    dbtx.commit()?;

    tracing::info!(id, kind = %tx.kind, asset = %tx.asset, "transaction edited");
    println!(
        "Updated #{} {} {} {} @ {} (fee {}) on {}",
        id,
        tx.kind,
        tx.quantity,
        tx.asset,
        tx.unit_price,
        tx.fee,
        fmt_timestamp(&tx.timestamp)
    );
    Ok(())
}

fn remove(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("id").context("Missing --id")?;
    let dbtx = conn.transaction()?;
    let n = dbtx.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("Transaction {} not found", id));
    }
    ensure_consistent(&dbtx).with_context(|| format!("Cannot delete transaction {}", id))?;
    dbtx.commit()?;
    println!("Deleted transaction {}", id);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.timestamp.clone(),
                    r.wallet.clone(),
                    r.kind.clone(),
                    r.asset.clone(),
                    r.quantity.clone(),
                    r.unit_price.clone(),
                    r.fee.clone(),
                    r.lot_ref.map(|l| l.to_string()).unwrap_or_default(),
                    r.note.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Timestamp", "Wallet", "Kind", "Asset", "Qty", "Price", "Fee", "Lot",
                    "Note"
                ],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub timestamp: String,
    pub wallet: String,
    pub kind: String,
    pub asset: String,
    pub quantity: String,
    pub unit_price: String,
    pub fee: String,
    pub lot_ref: Option<i64>,
    pub note: String,
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let mut sql = String::from(
        "SELECT t.id, t.timestamp, w.name, t.kind, t.asset, t.quantity, t.unit_price, t.fee, t.lot_ref, t.note
         FROM transactions t LEFT JOIN wallets w ON t.wallet_id=w.id WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    if let Some(asset) = opt_str(sub, "asset") {
        sql.push_str(" AND t.asset=?");
        params_vec.push(normalize_symbol(asset)?);
    }
    if let Some(wallet) = opt_str(sub, "wallet") {
        sql.push_str(" AND w.name=?");
        params_vec.push(wallet.into());
    }
    if let Some(kind) = opt_str(sub, "kind") {
        sql.push_str(" AND t.kind=?");
        params_vec.push(kind.parse::<TxKind>()?.as_str().into());
    }
    if let Some(year) = opt_str(sub, "year") {
        sql.push_str(" AND substr(t.timestamp,1,4)=?");
        params_vec.push(parse_year(year)?.to_string());
    }
    if let Some(start) = opt_str(sub, "start") {
        sql.push_str(" AND t.timestamp>=?");
        params_vec.push(fmt_timestamp(&parse_timestamp(start)?));
    }
    if let Some(end) = opt_str(sub, "end") {
        sql.push_str(" AND t.timestamp<?");
        params_vec.push(fmt_timestamp(&end_bound(end)?));
    }
    sql.push_str(" ORDER BY t.timestamp DESC, t.id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params_vec.iter()))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let wallet: Option<String> = r.get(2)?;
        let note: Option<String> = r.get(9)?;
        data.push(TransactionRow {
            id: r.get(0)?,
            timestamp: r.get(1)?,
            wallet: wallet.unwrap_or_default(),
            kind: r.get(3)?,
            asset: r.get(4)?,
            quantity: r.get(5)?,
            unit_price: r.get(6)?,
            fee: r.get(7)?,
            lot_ref: r.get(8)?,
            note: note.unwrap_or_default(),
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceTable;
    use rust_decimal_macros::dec;

    #[test]
    fn resolve_price_prefers_explicit_value() {
        let mut prices = PriceTable::new();
        let at = parse_timestamp("2024-05-01").unwrap();
        prices.insert("BTC", parse_timestamp("2024-04-30").unwrap(), dec!(60000));

        assert_eq!(
            resolve_price(&prices, Some(" 61000.5 "), "BTC", at).unwrap(),
            dec!(61000.5)
        );
        assert_eq!(resolve_price(&prices, None, "BTC", at).unwrap(), dec!(60000));
        let err = resolve_price(&prices, None, "ETH", at).unwrap_err();
        assert!(err.to_string().contains("none recorded for ETH"));
    }
}
