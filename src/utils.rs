// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

/// Storage format for timestamps; sorts lexicographically.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,10}$").unwrap());

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM:SS` and
/// RFC 3339 (converted to UTC). A bare date means midnight.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in [
        TS_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .with_context(|| {
            format!(
                "Invalid timestamp '{}', expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS",
                s
            )
        })
}

pub fn fmt_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Current UTC time truncated to whole seconds, matching `TS_FORMAT`.
pub fn now_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Exclusive upper bound for an `--end` filter. A bare date covers the
/// whole day; a date-time covers up to and including that second.
pub fn end_bound(s: &str) -> Result<NaiveDateTime> {
    if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return d
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN))
            .with_context(|| format!("End date '{}' out of range", s.trim()));
    }
    let ts = parse_timestamp(s)?;
    ts.checked_add_signed(chrono::Duration::seconds(1))
        .with_context(|| format!("End date '{}' out of range", s.trim()))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_year(s: &str) -> Result<i32> {
    let year: i32 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid year '{}'", s))?;
    if !(1970..=9999).contains(&year) {
        return Err(anyhow!("Year {} out of range", year));
    }
    Ok(year)
}

/// Upper-cases and validates an asset symbol (1-10 ASCII letters/digits).
pub fn normalize_symbol(s: &str) -> Result<String> {
    let sym = s.trim().to_ascii_uppercase();
    if !SYMBOL_RE.is_match(&sym) {
        return Err(anyhow!(
            "Invalid asset symbol '{}', expected 1-10 letters or digits",
            s.trim()
        ));
    }
    Ok(sym)
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {:.2}", ccy, d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

/// Trimmed value of a required string argument.
pub fn arg_str<'a>(m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.trim())
        .with_context(|| format!("Missing --{}", name))
}

/// Trimmed value of an optional string argument; blank counts as absent.
pub fn opt_str<'a>(m: &'a clap::ArgMatches, name: &str) -> Option<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub fn id_for_wallet(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM wallets WHERE name=?1")?;
    let id: i64 = stmt
        .query_row(params![name], |r| r.get(0))
        .with_context(|| format!("Wallet '{}' not found", name))?;
    Ok(id)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_dates_and_datetimes() {
        let date = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(fmt_timestamp(&date), "2024-03-01 00:00:00");
        let dt = parse_timestamp(" 2024-03-01 14:30:05 ").unwrap();
        assert_eq!(fmt_timestamp(&dt), "2024-03-01 14:30:05");
        let rfc = parse_timestamp("2024-03-01T14:30:05+02:00").unwrap();
        assert_eq!(fmt_timestamp(&rfc), "2024-03-01 12:30:05");
        assert!(parse_timestamp("03/01/2024").is_err());
    }

    #[test]
    fn end_bound_covers_whole_day_or_second() {
        assert_eq!(
            fmt_timestamp(&end_bound("2024-03-01").unwrap()),
            "2024-03-02 00:00:00"
        );
        assert_eq!(
            fmt_timestamp(&end_bound("2024-12-31 23:59:59").unwrap()),
            "2025-01-01 00:00:00"
        );
        assert!(end_bound("yesterday").is_err());
        assert_eq!(now_utc().nanosecond(), 0);
    }

    #[test]
    fn symbols_are_normalized() {
        assert_eq!(normalize_symbol(" btc ").unwrap(), "BTC");
        assert_eq!(normalize_symbol("1inch").unwrap(), "1INCH");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("BTC-USD").is_err());
        assert!(normalize_symbol("VERYLONGSYMBOL").is_err());
    }

    #[test]
    fn money_is_rounded_to_cents() {
        let d = Decimal::new(123456, 3);
        assert_eq!(fmt_money(&d, "USD"), "USD 123.46");
    }
}
