// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{DEFAULT_LONG_TERM_DAYS, LedgerConfig, LotPolicy};
use crate::utils::{get_setting, set_setting};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde::Serialize;

pub const KEY_POLICY: &str = "lot_policy";
pub const KEY_LONG_TERM_DAYS: &str = "long_term_days";
pub const KEY_FIAT: &str = "fiat_currency";

pub const KEYS: [&str; 3] = [KEY_POLICY, KEY_LONG_TERM_DAYS, KEY_FIAT];

/// Persistent settings kept in the `settings` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub lot_policy: LotPolicy,
    pub long_term_days: i64,
    pub fiat_currency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lot_policy: LotPolicy::Fifo,
            long_term_days: DEFAULT_LONG_TERM_DAYS,
            fiat_currency: "USD".to_string(),
        }
    }
}

impl Settings {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut s = Settings::default();
        if let Some(v) = get_setting(conn, KEY_POLICY)? {
            s.lot_policy = v
                .parse()
                .with_context(|| format!("Invalid stored setting {}", KEY_POLICY))?;
        }
        if let Some(v) = get_setting(conn, KEY_LONG_TERM_DAYS)? {
            s.long_term_days = parse_days(&v)
                .with_context(|| format!("Invalid stored setting {}", KEY_LONG_TERM_DAYS))?;
        }
        if let Some(v) = get_setting(conn, KEY_FIAT)? {
            s.fiat_currency = v;
        }
        Ok(s)
    }

    /// Ledger configuration, with an optional one-off policy override.
    pub fn ledger_config(&self, policy_override: Option<LotPolicy>) -> LedgerConfig {
        LedgerConfig {
            policy: policy_override.unwrap_or(self.lot_policy),
            long_term_days: self.long_term_days,
        }
    }

    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            KEY_POLICY => Ok(self.lot_policy.to_string()),
            KEY_LONG_TERM_DAYS => Ok(self.long_term_days.to_string()),
            KEY_FIAT => Ok(self.fiat_currency.clone()),
            other => Err(unknown_key(other)),
        }
    }
}

/// Validates then stores one setting; values are normalized before saving.
pub fn store(conn: &Connection, key: &str, value: &str) -> Result<String> {
    let normalized = match key {
        KEY_POLICY => value.parse::<LotPolicy>()?.to_string(),
        KEY_LONG_TERM_DAYS => parse_days(value)?.to_string(),
        KEY_FIAT => {
            let ccy = value.trim().to_ascii_uppercase();
            if ccy.len() != 3 || !ccy.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(anyhow!("Invalid currency code '{}'", value.trim()));
            }
            ccy
        }
        other => return Err(unknown_key(other)),
    };
    set_setting(conn, key, &normalized)?;
    tracing::info!(key, value = %normalized, "setting updated");
    Ok(normalized)
}

fn parse_days(s: &str) -> Result<i64> {
    let days: i64 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid day count '{}'", s.trim()))?;
    if days < 0 {
        return Err(anyhow!("Day count cannot be negative"));
    }
    Ok(days)
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!("Unknown setting '{}' (use {})", key, KEYS.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let s = Settings::load(&conn()).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.ledger_config(None), LedgerConfig::default());
    }

    #[test]
    fn stored_values_round_trip_and_override() {
        let conn = conn();
        assert_eq!(store(&conn, KEY_POLICY, " LIFO ").unwrap(), "lifo");
        assert_eq!(store(&conn, KEY_LONG_TERM_DAYS, "730").unwrap(), "730");
        assert_eq!(store(&conn, KEY_FIAT, "eur").unwrap(), "EUR");

        let s = Settings::load(&conn).unwrap();
        assert_eq!(s.lot_policy, LotPolicy::Lifo);
        assert_eq!(s.long_term_days, 730);
        assert_eq!(s.get(KEY_FIAT).unwrap(), "EUR");
        assert_eq!(
            s.ledger_config(Some(LotPolicy::Fifo)).policy,
            LotPolicy::Fifo
        );
    }

    #[test]
    fn rejects_bad_values() {
        let conn = conn();
        assert!(store(&conn, KEY_POLICY, "hifo").is_err());
        assert!(store(&conn, KEY_LONG_TERM_DAYS, "-1").is_err());
        assert!(store(&conn, KEY_FIAT, "EURO").is_err());
        assert!(store(&conn, "theme", "dark").is_err());
        assert_eq!(Settings::load(&conn).unwrap(), Settings::default());
    }
}
