// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::RealizedGain;
use crate::utils::fmt_timestamp;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Realized gains for one calendar tax year, split by holding term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxReport {
    pub year: i32,
    pub fiat_currency: String,
    pub short_term_gain: Decimal,
    pub long_term_gain: Decimal,
    pub total_gain: Decimal,
    pub records: Vec<RealizedGain>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub record_count: usize,
    pub assets: Vec<String>,
    /// Zero when no disposal made money.
    pub largest_gain: Decimal,
    /// Zero when no disposal lost money.
    pub largest_loss: Decimal,
    pub average_gain: Decimal,
    pub average_holding_days: Decimal,
}

impl TaxReport {
    /// `gains` must come from a replay of the full history so that lots
    /// opened or consumed in earlier years are accounted for.
    pub fn build(gains: &[RealizedGain], year: i32, fiat_currency: &str) -> Self {
        let records: Vec<RealizedGain> = gains
            .iter()
            .filter(|g| g.disposed_at.year() == year)
            .cloned()
            .collect();
        let short_term_gain = total(records.iter().map(RealizedGain::short_term_gain));
        let long_term_gain = total(records.iter().map(RealizedGain::long_term_gain));
        Self {
            year,
            fiat_currency: fiat_currency.to_string(),
            short_term_gain,
            long_term_gain,
            total_gain: short_term_gain.saturating_add(long_term_gain),
            records,
        }
    }

    pub fn summary(&self) -> ReportSummary {
        let assets: BTreeSet<&str> = self.records.iter().map(|r| r.asset.as_str()).collect();
        let gains = self.records.iter().map(|r| r.gain);
        let largest_gain = gains.clone().fold(Decimal::ZERO, Decimal::max);
        let largest_loss = gains.clone().fold(Decimal::ZERO, Decimal::min);

        let average_gain = if self.records.is_empty() {
            Decimal::ZERO
        } else {
            total(gains) / Decimal::from(self.records.len())
        };

        let slices: Vec<i64> = self
            .records
            .iter()
            .flat_map(|r| r.slices.iter().map(|s| s.holding_days))
            .collect();
        let average_holding_days = if slices.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(slices.iter().sum::<i64>()) / Decimal::from(slices.len())).round_dp(1)
        };

        ReportSummary {
            record_count: self.records.len(),
            assets: assets.into_iter().map(str::to_string).collect(),
            largest_gain,
            largest_loss,
            average_gain: average_gain.round_dp(2),
            average_holding_days,
        }
    }

    /// One row per consumed lot slice.
    pub fn write_detail_csv<W: io::Write>(&self, w: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record([
            "tx_id",
            "asset",
            "lot_id",
            "acquired_at",
            "disposed_at",
            "quantity",
            "cost_basis",
            "proceeds",
            "gain",
            "term",
            "holding_days",
        ])?;
        for r in &self.records {
            for s in &r.slices {
                wtr.write_record([
                    r.tx_id.to_string(),
                    r.asset.clone(),
                    s.lot_id.to_string(),
                    fmt_timestamp(&s.acquired_at),
                    fmt_timestamp(&r.disposed_at),
                    s.quantity.to_string(),
                    s.cost_basis.round_dp(2).to_string(),
                    s.proceeds.round_dp(2).to_string(),
                    s.gain().round_dp(2).to_string(),
                    s.term.to_string(),
                    s.holding_days.to_string(),
                ])?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_summary_csv<W: io::Write>(&self, w: W, generated_on: NaiveDateTime) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record([
            "year",
            "short_term_gain",
            "long_term_gain",
            "total_gain",
            "currency",
            "generated_on",
        ])?;
        wtr.write_record([
            self.year.to_string(),
            self.short_term_gain.round_dp(2).to_string(),
            self.long_term_gain.round_dp(2).to_string(),
            self.total_gain.round_dp(2).to_string(),
            self.fiat_currency.clone(),
            fmt_timestamp(&generated_on),
        ])?;
        wtr.flush()?;
        Ok(())
    }

    /// Writes the detail and summary files into `dir`, creating it if needed.
    pub fn export(&self, dir: &Path, generated_on: NaiveDateTime) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir).with_context(|| format!("Create directory {}", dir.display()))?;
        let detail = dir.join(format!(
            "tax_report_{}_{}.csv",
            self.year, self.fiat_currency
        ));
        let summary = dir.join(format!(
            "tax_summary_{}_{}.csv",
            self.year, self.fiat_currency
        ));
        let f = fs::File::create(&detail)
            .with_context(|| format!("Create {}", detail.display()))?;
        self.write_detail_csv(f)?;
        let f = fs::File::create(&summary)
            .with_context(|| format!("Create {}", summary.display()))?;
        self.write_summary_csv(f, generated_on)?;
        Ok((detail, summary))
    }
}

/// Totals across assets saturate rather than overflow.
fn total(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerConfig, compute};
    use crate::models::{Transaction, TxKind};
    use crate::utils::parse_timestamp;
    use rust_decimal_macros::dec;

    fn tx(id: i64, at: &str, kind: TxKind, asset: &str, qty: Decimal, px: Decimal) -> Transaction {
        Transaction::new(id, parse_timestamp(at).unwrap(), asset, kind, qty, px)
    }

    fn sample_gains() -> Vec<RealizedGain> {
        let txs = vec![
            tx(1, "2022-01-10", TxKind::Acquire, "BTC", dec!(1), dec!(30000)),
            tx(2, "2023-11-01", TxKind::Acquire, "BTC", dec!(1), dec!(35000)),
            tx(3, "2023-12-01", TxKind::Acquire, "ETH", dec!(10), dec!(2000)),
            tx(4, "2023-12-15", TxKind::Dispose, "ETH", dec!(2), dec!(2100)),
            tx(5, "2024-03-01", TxKind::Dispose, "BTC", dec!(1.5), dec!(60000)),
            tx(6, "2024-04-01", TxKind::Dispose, "ETH", dec!(4), dec!(1800)),
        ];
        compute(&txs, LedgerConfig::default()).unwrap().gains
    }

    #[test]
    fn report_filters_by_disposal_year_and_splits_terms() {
        let report = TaxReport::build(&sample_gains(), 2024, "USD");
        assert_eq!(report.records.len(), 2);
        // BTC: 1.0 long (60000 - 30000) + 0.5 short (30000 - 17500); ETH: 4 short at -200 each
        assert_eq!(report.long_term_gain, dec!(30000));
        assert_eq!(report.short_term_gain, dec!(12500) - dec!(800));
        assert_eq!(report.total_gain, dec!(41700));

        let prior = TaxReport::build(&sample_gains(), 2023, "USD");
        assert_eq!(prior.records.len(), 1);
        assert_eq!(prior.total_gain, dec!(200));
    }

    #[test]
    fn summary_statistics() {
        let report = TaxReport::build(&sample_gains(), 2024, "USD");
        let s = report.summary();
        assert_eq!(s.record_count, 2);
        assert_eq!(s.assets, vec!["BTC".to_string(), "ETH".to_string()]);
        assert_eq!(s.largest_gain, dec!(42500));
        assert_eq!(s.largest_loss, dec!(-800));
        assert_eq!(s.average_gain, dec!(20850));

        let empty = TaxReport::build(&[], 2024, "USD").summary();
        assert_eq!(empty.record_count, 0);
        assert_eq!(empty.largest_gain, Decimal::ZERO);
        assert_eq!(empty.average_holding_days, Decimal::ZERO);
    }

    #[test]
    fn detail_csv_has_one_row_per_slice() {
        let report = TaxReport::build(&sample_gains(), 2024, "USD");
        let mut buf = Vec::new();
        report.write_detail_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("tx_id,asset,lot_id"));
        assert!(lines[1].starts_with("5,BTC,1,2022-01-10 00:00:00,2024-03-01 00:00:00,1,"));
        assert!(lines[1].ends_with(",long,781"));
        assert!(lines[3].contains(",short,"));
    }
}
