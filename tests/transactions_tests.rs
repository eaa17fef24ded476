// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use lotkeeper::{cli, commands::prices, commands::transactions, commands::wallets, db};
use rusqlite::Connection;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn tx(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["lotkeeper", "tx"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("tx", tx_m)) = matches.subcommand() {
        transactions::handle(conn, tx_m)
    } else {
        panic!("no tx subcommand");
    }
}

fn wallet(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["lotkeeper", "wallet"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let sub = matches.subcommand_matches("wallet").unwrap();
    wallets::handle(conn, sub)
}

fn count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn list_limit_respected_newest_first() {
    let mut conn = setup();
    for day in 1..=3 {
        let date = format!("2025-01-0{}", day);
        tx(
            &mut conn,
            &["add", "--kind", "buy", "--asset", "btc", "--quantity", "1", "--price", "100", "--date", &date],
        )
        .unwrap();
    }

    let matches = cli::build_cli().get_matches_from(["lotkeeper", "tx", "list", "--limit", "2"]);
    if let Some(("tx", tx_m)) = matches.subcommand() {
        if let Some(("list", list_m)) = tx_m.subcommand() {
            let rows = transactions::query_rows(&conn, list_m).unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].timestamp, "2025-01-03 00:00:00");
            assert_eq!(rows[0].kind, "acquire");
            assert_eq!(rows[0].asset, "BTC");
        } else {
            panic!("no list subcommand");
        }
    } else {
        panic!("no tx subcommand");
    }
}

#[test]
fn oversell_is_rejected_and_not_saved() {
    let mut conn = setup();
    tx(
        &mut conn,
        &["add", "--kind", "acquire", "--asset", "BTC", "--quantity", "1", "--price", "100", "--date", "2024-01-01"],
    )
    .unwrap();

    let err = tx(
        &mut conn,
        &["add", "--kind", "sell", "--asset", "BTC", "--quantity", "2", "--price", "300", "--date", "2024-02-01"],
    )
    .unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("Transaction rejected"));
    assert!(msg.contains("Insufficient balance for BTC"));
    assert_eq!(count(&conn), 1);
}

#[test]
fn disposal_of_unheld_asset_is_rejected() {
    let mut conn = setup();
    let err = tx(
        &mut conn,
        &["add", "--kind", "dispose", "--asset", "ETH", "--quantity", "1", "--price", "10", "--date", "2024-02-01"],
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("Unknown asset ETH"));
    assert_eq!(count(&conn), 0);
}

#[test]
fn missing_price_is_taken_from_recorded_prices() {
    let mut conn = setup();
    let matches = cli::build_cli().get_matches_from([
        "lotkeeper", "price", "set", "--asset", "eth", "--price", "2500", "--date", "2024-03-01",
    ]);
    if let Some(("price", price_m)) = matches.subcommand() {
        prices::handle(&conn, price_m).unwrap();
    } else {
        panic!("no price subcommand");
    }

    tx(
        &mut conn,
        &["add", "--kind", "buy", "--asset", "ETH", "--quantity", "2", "--date", "2024-03-05"],
    )
    .unwrap();
    let price: String = conn
        .query_row("SELECT unit_price FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(price, "2500");

    let err = tx(
        &mut conn,
        &["add", "--kind", "buy", "--asset", "ETH", "--quantity", "2", "--date", "2024-02-01"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("none recorded for ETH"));
}

#[test]
fn removing_a_lot_still_needed_is_rejected() {
    let mut conn = setup();
    tx(
        &mut conn,
        &["add", "--kind", "buy", "--asset", "BTC", "--quantity", "1", "--price", "100", "--date", "2024-01-01"],
    )
    .unwrap();
    tx(
        &mut conn,
        &["add", "--kind", "sell", "--asset", "BTC", "--quantity", "1", "--price", "150", "--date", "2024-02-01"],
    )
    .unwrap();

    let err = tx(&mut conn, &["rm", "--id", "1"]).unwrap_err();
    assert!(err.to_string().contains("Cannot delete transaction 1"));
    assert_eq!(count(&conn), 2);

    tx(&mut conn, &["rm", "--id", "2"]).unwrap();
    assert_eq!(count(&conn), 1);
    assert!(tx(&mut conn, &["rm", "--id", "2"]).is_err());
}

#[test]
fn wallet_removal_is_refused_when_it_breaks_the_log() {
    let mut conn = setup();
    wallet(&mut conn, &["add", "Cold"]).unwrap();
    wallet(&mut conn, &["add", "Spare"]).unwrap();
    tx(
        &mut conn,
        &["add", "--kind", "buy", "--asset", "BTC", "--quantity", "1", "--price", "100", "--date", "2024-01-01", "--wallet", "Cold"],
    )
    .unwrap();
    tx(
        &mut conn,
        &["add", "--kind", "sell", "--asset", "BTC", "--quantity", "1", "--price", "150", "--date", "2024-02-01"],
    )
    .unwrap();

    let err = wallet(&mut conn, &["rm", "Cold"]).unwrap_err();
    assert!(err.to_string().contains("Cannot remove wallet 'Cold'"));
    assert_eq!(count(&conn), 2);

    wallet(&mut conn, &["rm", "Spare"]).unwrap();
    assert!(wallet(&mut conn, &["rm", "Spare"]).is_err());
}

fn list(conn: &Connection, args: &[&str]) -> Vec<transactions::TransactionRow> {
    let mut argv = vec!["lotkeeper", "tx", "list"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let list_m = matches
        .subcommand_matches("tx")
        .and_then(|m| m.subcommand_matches("list"))
        .unwrap();
    transactions::query_rows(conn, list_m).unwrap()
}

#[test]
fn list_date_range_includes_whole_end_day() {
    let mut conn = setup();
    for date in ["2025-01-01", "2025-01-02 10:30:00", "2025-01-03"] {
        tx(
            &mut conn,
            &["add", "--kind", "buy", "--asset", "BTC", "--quantity", "1", "--price", "100", "--date", date],
        )
        .unwrap();
    }

    let day = list(&conn, &["--start", "2025-01-02", "--end", "2025-01-02"]);
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].timestamp, "2025-01-02 10:30:00");

    assert_eq!(list(&conn, &["--start", "2025-01-02"]).len(), 2);
    assert_eq!(list(&conn, &["--end", "2025-01-02 10:29:59"]).len(), 1);
    assert_eq!(list(&conn, &["--end", "2025-01-02 10:30:00"]).len(), 2);
}

#[test]
fn edit_updates_given_fields_and_keeps_the_rest() {
    let mut conn = setup();
    wallet(&mut conn, &["add", "Cold"]).unwrap();
    tx(
        &mut conn,
        &["add", "--kind", "buy", "--asset", "BTC", "--quantity", "1", "--price", "100", "--date", "2024-01-01"],
    )
    .unwrap();
    tx(
        &mut conn,
        &["add", "--kind", "sell", "--asset", "BTC", "--quantity", "1", "--price", "150", "--date", "2024-02-01"],
    )
    .unwrap();

    tx(
        &mut conn,
        &["edit", "--id", "2", "--price", "175", "--fee", "2", "--note", "fixed", "--wallet", "Cold"],
    )
    .unwrap();
    let rows = list(&conn, &[]);
    let sell = &rows[0];
    assert_eq!(sell.id, 2);
    assert_eq!(sell.unit_price, "175");
    assert_eq!(sell.fee, "2");
    assert_eq!(sell.note, "fixed");
    assert_eq!(sell.wallet, "Cold");
    assert_eq!(sell.quantity, "1");
    assert_eq!(sell.timestamp, "2024-02-01 00:00:00");
    assert_eq!(count(&conn), 2);
}

#[test]
fn edit_that_breaks_the_log_is_rolled_back() {
    let mut conn = setup();
    tx(
        &mut conn,
        &["add", "--kind", "buy", "--asset", "BTC", "--quantity", "1", "--price", "100", "--date", "2024-01-01"],
    )
    .unwrap();
    tx(
        &mut conn,
        &["add", "--kind", "sell", "--asset", "BTC", "--quantity", "1", "--price", "150", "--date", "2024-02-01"],
    )
    .unwrap();

    let err = tx(&mut conn, &["edit", "--id", "1", "--quantity", "0.5"]).unwrap_err();
    assert!(format!("{:#}", err).contains("Cannot edit transaction 1"));
    let err = tx(&mut conn, &["edit", "--id", "1", "--date", "2024-03-01"]).unwrap_err();
    assert!(format!("{:#}", err).contains("Cannot edit transaction 1"));
    assert!(tx(&mut conn, &["edit", "--id", "2", "--quantity", "-1"]).is_err());
    assert!(tx(&mut conn, &["edit", "--id", "2", "--price", "abc"]).is_err());
    assert!(tx(&mut conn, &["edit", "--id", "2", "--wallet", "Nowhere"]).is_err());

    let rows = list(&conn, &[]);
    assert_eq!(rows[1].quantity, "1");
    assert_eq!(rows[1].timestamp, "2024-01-01 00:00:00");
    assert_eq!(rows[0].quantity, "1");

    let err = tx(&mut conn, &["edit", "--id", "99", "--fee", "1"]).unwrap_err();
    assert!(err.to_string().contains("Transaction 99 not found"));
}
