// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::PricePoint;
use crate::utils::{
    arg_str, fmt_timestamp, normalize_symbol, now_utc, opt_str, parse_decimal, parse_timestamp,
    pretty_table,
};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set_price(conn, sub),
        Some(("list", sub)) => list_prices(conn, sub),
        _ => Ok(()),
    }
}

fn set_price(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let asset = normalize_symbol(arg_str(sub, "asset")?)?;
    let price = parse_decimal(arg_str(sub, "price")?)?;
    if price < Decimal::ZERO {
        return Err(anyhow!("Price cannot be negative"));
    }
    let as_of = match opt_str(sub, "date") {
        Some(raw) => parse_timestamp(raw)?,
        None => now_utc(),
    };
    let source = opt_str(sub, "source").unwrap_or("manual");

    conn.execute(
        "INSERT INTO prices(asset, as_of, price, source) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(asset, as_of) DO UPDATE SET price=excluded.price, source=excluded.source",
        params![asset, fmt_timestamp(&as_of), price.to_string(), source],
    )?;
    println!(
        "Price {} = {} at {} ({})",
        asset,
        price,
        fmt_timestamp(&as_of),
        source
    );
    Ok(())
}

pub fn query_prices(
    conn: &Connection,
    asset: Option<&str>,
    limit: usize,
) -> Result<Vec<PricePoint>> {
    let asset = asset.map(normalize_symbol).transpose()?;
    let mut stmt = conn.prepare(
        "SELECT asset, as_of, price, source FROM prices
         WHERE ?1 IS NULL OR asset=?1
         ORDER BY as_of DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![asset, limit as i64], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (asset, as_of_s, price_s, source) = row?;
        let as_of = parse_timestamp(&as_of_s)
            .with_context(|| format!("Invalid stored price date '{}' for {}", as_of_s, asset))?;
        let price = Decimal::from_str_exact(&price_s)
            .with_context(|| format!("Invalid stored price '{}' for {}", price_s, asset))?;
        out.push(PricePoint {
            asset,
            as_of,
            price,
            source,
        });
    }
    Ok(out)
}

fn list_prices(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let limit = sub.get_one::<usize>("limit").copied().unwrap_or(50);
    let points = query_prices(conn, opt_str(sub, "asset"), limit)?;
    let data = points
        .into_iter()
        .map(|p| {
            vec![
                p.asset,
                fmt_timestamp(&p.as_of),
                p.price.to_string(),
                p.source,
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Asset", "As Of", "Price", "Source"], data)
    );
    Ok(())
}
