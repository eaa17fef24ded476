// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::ensure_consistent;
use crate::models::Wallet;
use crate::utils::{arg_str, maybe_print_json, opt_str, pretty_table};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = arg_str(sub, "name")?;
            if name.is_empty() {
                return Err(anyhow!("Wallet name cannot be empty"));
            }
            let description = opt_str(sub, "description");
            conn.execute(
                "INSERT INTO wallets(name, description) VALUES (?1, ?2)",
                params![name, description],
            )?;
            println!("Added wallet '{}'", name);
        }
        Some(("list", sub)) => {
            let wallets = list_wallets(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &wallets)? {
                let data = wallets
                    .into_iter()
                    .map(|w| vec![w.name, w.description.unwrap_or_default()])
                    .collect();
                println!("{}", pretty_table(&["Name", "Description"], data));
            }
        }
        Some(("rm", sub)) => {
            let name = arg_str(sub, "name")?;
            let dbtx = conn.transaction()?;
            let n = dbtx.execute("DELETE FROM wallets WHERE name=?1", params![name])?;
            if n == 0 {
                return Err(anyhow!("Wallet '{}' not found", name));
            }
            ensure_consistent(&dbtx)
                .with_context(|| format!("Cannot remove wallet '{}'", name))?;
            dbtx.commit()?;
            tracing::info!(wallet = name, "wallet removed with its transactions");
            println!("Removed wallet '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

pub fn list_wallets(conn: &Connection) -> Result<Vec<Wallet>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM wallets ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok(Wallet {
            id: r.get(0)?,
            name: r.get(1)?,
            description: r.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
