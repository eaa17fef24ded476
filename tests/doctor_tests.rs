// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use lotkeeper::commands::doctor;
use lotkeeper::models::{Transaction, TxKind};
use lotkeeper::utils::parse_timestamp;
use lotkeeper::db;
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn record(conn: &Connection, at: &str, asset: &str, kind: TxKind, qty: Decimal, lot: Option<i64>) {
    let mut tx = Transaction::new(0, parse_timestamp(at).unwrap(), asset, kind, qty, dec!(100));
    tx.lot_ref = lot;
    db::insert_transaction(conn, &tx, None).unwrap();
}

#[test]
fn clean_log_has_no_issues() {
    let conn = conn();
    record(&conn, "2024-01-01", "BTC", TxKind::Acquire, dec!(1), None);
    conn.execute(
        "INSERT INTO prices(asset, as_of, price, source) VALUES ('BTC','2024-02-01 00:00:00','150','manual')",
        [],
    )
    .unwrap();
    assert!(doctor::find_issues(&conn).unwrap().is_empty());
}

#[test]
fn reports_every_problem_and_keeps_going() {
    let conn = conn();
    record(&conn, "2024-01-01", "BTC", TxKind::Acquire, dec!(1), None);
    // written behind the ledger's back
    record(&conn, "2024-02-01", "BTC", TxKind::Dispose, dec!(2), None);
    record(&conn, "2024-03-01", "BTC", TxKind::Dispose, dec!(0.5), Some(1));
    record(&conn, "2024-04-01", "ETH", TxKind::Acquire, dec!(1), None);
    conn.execute(
        "INSERT INTO prices(asset, as_of, price, source) VALUES ('BTC','2024-05-01 00:00:00','150','manual')",
        [],
    )
    .unwrap();

    let issues = doctor::find_issues(&conn).unwrap();
    let kinds: Vec<&str> = issues.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(kinds, ["ledger_error", "lot_ref_ignored", "missing_price"]);
    assert!(issues[0].1.contains("Insufficient balance for BTC in transaction 2"));
    assert_eq!(issues[1].1, "tx 3 names lot 1 under fifo");
    assert_eq!(issues[2].1, "ETH held with no recorded price");
}
