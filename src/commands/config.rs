// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::ensure_consistent;
use crate::config::{KEYS, Settings, store};
use crate::utils::{arg_str, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", _)) => {
            let settings = Settings::load(conn)?;
            let mut rows = Vec::new();
            for key in KEYS {
                rows.push(vec![key.to_string(), settings.get(key)?]);
            }
            println!("{}", pretty_table(&["Key", "Value"], rows));
        }
        Some(("get", sub)) => {
            let settings = Settings::load(conn)?;
            println!("{}", settings.get(arg_str(sub, "key")?)?);
        }
        Some(("set", sub)) => {
            let key = arg_str(sub, "key")?;
            let dbtx = conn.transaction()?;
            let value = store(&dbtx, key, arg_str(sub, "value")?)?;
            ensure_consistent(&dbtx)
                .with_context(|| format!("Cannot set {} to {}", key, value))?;
            dbtx.commit()?;
            println!("{} = {}", key, value);
        }
        _ => {}
    }
    Ok(())
}
