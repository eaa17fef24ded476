// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::fmt_timestamp;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Supplies a unit price for an asset when a transaction was recorded
/// without one. Returns the closest price on or before `at`.
pub trait PriceSource {
    fn price_at(&self, asset: &str, at: NaiveDateTime) -> Result<Option<Decimal>>;
}

#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    points: BTreeMap<String, BTreeMap<NaiveDateTime, Decimal>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: &str, at: NaiveDateTime, price: Decimal) {
        self.points
            .entry(asset.to_ascii_uppercase())
            .or_default()
            .insert(at, price);
    }

    pub fn latest(&self, asset: &str) -> Option<Decimal> {
        self.points
            .get(asset)
            .and_then(|series| series.values().next_back().copied())
    }
}

impl PriceSource for PriceTable {
    fn price_at(&self, asset: &str, at: NaiveDateTime) -> Result<Option<Decimal>> {
        Ok(self
            .points
            .get(asset)
            .and_then(|series| series.range(..=at).next_back())
            .map(|(_, px)| *px))
    }
}

/// Prices recorded in the `prices` table.
pub struct SqlitePrices<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePrices<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Most recent price per asset.
    pub fn latest_all(&self) -> Result<PriceTable> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT asset, as_of, price FROM (
                 SELECT asset,
                        as_of,
                        price,
                        ROW_NUMBER() OVER (
                            PARTITION BY asset
                            ORDER BY as_of DESC, rowid DESC
                        ) AS rn
                 FROM prices
             ) WHERE rn = 1",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;
        let mut table = PriceTable::new();
        for row in rows {
            let (asset, as_of_s, price_s) = row?;
            let as_of = crate::utils::parse_timestamp(&as_of_s)
                .with_context(|| format!("Invalid stored price date '{}' for {}", as_of_s, asset))?;
            let price = Decimal::from_str_exact(&price_s)
                .with_context(|| format!("Invalid stored price '{}' for {}", price_s, asset))?;
            table.insert(&asset, as_of, price);
        }
        Ok(table)
    }
}

impl PriceSource for SqlitePrices<'_> {
    fn price_at(&self, asset: &str, at: NaiveDateTime) -> Result<Option<Decimal>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT price FROM prices WHERE asset=?1 AND as_of<=?2
             ORDER BY as_of DESC, id DESC LIMIT 1",
        )?;
        let raw: Option<String> = stmt
            .query_row(params![asset, fmt_timestamp(&at)], |r| r.get(0))
            .optional()?;
        raw.map(|s| {
            Decimal::from_str_exact(&s)
                .with_context(|| format!("Invalid stored price '{}' for {}", s, asset))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_timestamp;
    use rust_decimal_macros::dec;

    #[test]
    fn table_returns_closest_on_or_before() {
        let mut table = PriceTable::new();
        table.insert("btc", parse_timestamp("2024-01-01").unwrap(), dec!(40000));
        table.insert("BTC", parse_timestamp("2024-02-01").unwrap(), dec!(45000));

        let before = parse_timestamp("2023-12-31").unwrap();
        let between = parse_timestamp("2024-01-15 08:00:00").unwrap();
        let exact = parse_timestamp("2024-02-01").unwrap();
        assert_eq!(table.price_at("BTC", before).unwrap(), None);
        assert_eq!(table.price_at("BTC", between).unwrap(), Some(dec!(40000)));
        assert_eq!(table.price_at("BTC", exact).unwrap(), Some(dec!(45000)));
        assert_eq!(table.latest("BTC"), Some(dec!(45000)));
        assert_eq!(table.latest("ETH"), None);
    }

    #[test]
    fn sqlite_prices_pick_latest_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO prices(asset, as_of, price, source) VALUES
             ('ETH', '2024-01-01 00:00:00', '2000', 'manual'),
             ('ETH', '2024-03-01 00:00:00', '3500.5', 'manual'),
             ('BTC', '2024-02-01 00:00:00', '50000', 'manual')",
            [],
        )
        .unwrap();

        let prices = SqlitePrices::new(&conn);
        let feb = parse_timestamp("2024-02-15").unwrap();
        assert_eq!(prices.price_at("ETH", feb).unwrap(), Some(dec!(2000)));
        assert_eq!(prices.price_at("SOL", feb).unwrap(), None);

        let latest = prices.latest_all().unwrap();
        assert_eq!(latest.latest("ETH"), Some(dec!(3500.5)));
        assert_eq!(latest.latest("BTC"), Some(dec!(50000)));
    }
}
