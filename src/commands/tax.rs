// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::replay;
use crate::report::TaxReport;
use crate::utils::{arg_str, fmt_money, now_utc, opt_str, parse_year, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("report", sub)) => report(conn, sub),
        Some(("export", sub)) => export(conn, sub),
        _ => Ok(()),
    }
}

pub fn build_report(conn: &Connection, sub: &clap::ArgMatches) -> Result<TaxReport> {
    let year = parse_year(arg_str(sub, "year")?)?;
    let (settings, outcome) = replay(conn, sub)?;
    Ok(TaxReport::build(
        &outcome.gains,
        year,
        &settings.fiat_currency,
    ))
}

fn report(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let report = build_report(conn, sub)?;
    let summary = report.summary();

    if sub.get_flag("json") {
        let v = json!({ "report": report, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&v)?);
        return Ok(());
    }

    let ccy = report.fiat_currency.as_str();
    let rows = vec![
        vec!["Short-term gain".into(), fmt_money(&report.short_term_gain, ccy)],
        vec!["Long-term gain".into(), fmt_money(&report.long_term_gain, ccy)],
        vec!["Total gain".into(), fmt_money(&report.total_gain, ccy)],
        vec!["Disposals".into(), summary.record_count.to_string()],
        vec!["Assets".into(), summary.assets.join(", ")],
        vec!["Largest gain".into(), fmt_money(&summary.largest_gain, ccy)],
        vec!["Largest loss".into(), fmt_money(&summary.largest_loss, ccy)],
        vec!["Average gain".into(), fmt_money(&summary.average_gain, ccy)],
        vec![
            "Average holding (days)".into(),
            summary.average_holding_days.to_string(),
        ],
    ];
    println!("Tax year {}", report.year);
    println!("{}", pretty_table(&["Metric", "Value"], rows));
    Ok(())
}

fn export(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let report = build_report(conn, sub)?;
    let dir = opt_str(sub, "dir").unwrap_or(".");
    let (detail, summary) = report.export(Path::new(dir), now_utc())?;
    tracing::info!(year = report.year, records = report.records.len(), "tax report exported");
    println!(
        "Wrote {} and {}",
        detail.display(),
        summary.display()
    );
    Ok(())
}
