// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).num_args(1)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .action(ArgAction::SetTrue)
}

fn json_flags() -> [Arg; 2] {
    [
        flag("json", "Print pretty JSON"),
        flag("jsonl", "Print one JSON object per line"),
    ]
}

fn policy_opt() -> Arg {
    opt("policy", "Lot matching policy for this run: fifo|lifo|specific")
}

pub fn build_cli() -> Command {
    Command::new("lotkeeper")
        .version(clap::crate_version!())
        .about("Crypto transaction ledger with tax-lot accounting and capital gains reports")
        .subcommand(Command::new("init").about("Create the database if missing"))
        .subcommand(
            Command::new("wallet")
                .about("Manage wallets")
                .subcommand(
                    Command::new("add")
                        .about("Add a wallet")
                        .arg(Arg::new("name").required(true))
                        .arg(opt("description", "Free-form description")),
                )
                .subcommand(Command::new("list").about("List wallets").args(json_flags()))
                .subcommand(
                    Command::new("rm")
                        .about("Remove a wallet and its transactions")
                        .arg(Arg::new("name").required(true)),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and list transactions")
                .subcommand(
                    Command::new("add")
                        .about("Record an acquisition, disposal or transfer")
                        .arg(req(
                            "kind",
                            "acquire|dispose|transfer (aliases: buy, sell, transfer_in, transfer_out)",
                        ))
                        .arg(req("asset", "Asset symbol, e.g. BTC"))
                        .arg(req("quantity", "Units moved (> 0)"))
                        .arg(opt(
                            "price",
                            "Unit price in fiat; looked up from recorded prices when omitted",
                        ))
                        .arg(opt("fee", "Fee in fiat (default 0)"))
                        .arg(opt("date", "YYYY-MM-DD[ HH:MM:SS] (default now, UTC)"))
                        .arg(opt("wallet", "Wallet name"))
                        .arg(
                            opt("lot", "Lot id (acquiring transaction id) for specific identification")
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(opt("note", "Note")),
                )
                .subcommand(
                    Command::new("list")
                        .about("List transactions, newest first")
                        .arg(opt("asset", "Filter by asset"))
                        .arg(opt("wallet", "Filter by wallet"))
                        .arg(opt("kind", "Filter by kind"))
                        .arg(opt("year", "Filter by calendar year"))
                        .arg(opt("start", "Only on or after this date"))
                        .arg(opt("end", "Only on or before this date (a bare date includes the whole day)"))
                        .arg(opt("limit", "Max rows").value_parser(value_parser!(usize)))
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("edit")
                        .about("Change fields of a recorded transaction")
                        .arg(req("id", "Transaction id").value_parser(value_parser!(i64)))
                        .arg(opt("kind", "acquire|dispose|transfer"))
                        .arg(opt("asset", "Asset symbol"))
                        .arg(opt("quantity", "Units moved (> 0)"))
                        .arg(opt("price", "Unit price in fiat"))
                        .arg(opt("fee", "Fee in fiat"))
                        .arg(opt("date", "YYYY-MM-DD[ HH:MM:SS]"))
                        .arg(opt("wallet", "Wallet name"))
                        .arg(
                            opt("lot", "Lot id (acquiring transaction id) for specific identification")
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(opt("note", "Note")),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete a transaction")
                        .arg(req("id", "Transaction id").value_parser(value_parser!(i64))),
                ),
        )
        .subcommand(
            Command::new("price")
                .about("Record and list unit prices")
                .subcommand(
                    Command::new("set")
                        .about("Record a price")
                        .arg(req("asset", "Asset symbol"))
                        .arg(req("price", "Unit price in fiat"))
                        .arg(opt("date", "YYYY-MM-DD[ HH:MM:SS] (default now, UTC)"))
                        .arg(opt("source", "Where the price came from (default manual)")),
                )
                .subcommand(
                    Command::new("list")
                        .about("List recorded prices, newest first")
                        .arg(opt("asset", "Filter by asset"))
                        .arg(opt("limit", "Max rows (default 50)").value_parser(value_parser!(usize))),
                ),
        )
        .subcommand(
            Command::new("holdings")
                .about("Open positions with cost basis and unrealized gains")
                .arg(flag("lots", "Show individual open lots"))
                .arg(opt("wallet", "Only lots acquired into this wallet"))
                .arg(policy_opt())
                .args(json_flags()),
        )
        .subcommand(
            Command::new("gains")
                .about("Realized gain records")
                .arg(opt("year", "Only disposals in this calendar year"))
                .arg(opt("asset", "Only this asset"))
                .arg(policy_opt())
                .args(json_flags()),
        )
        .subcommand(
            Command::new("tax")
                .about("Tax year reports")
                .subcommand(
                    Command::new("report")
                        .about("Short/long-term totals and statistics for a year")
                        .arg(req("year", "Calendar year"))
                        .arg(policy_opt())
                        .arg(flag("json", "Print pretty JSON")),
                )
                .subcommand(
                    Command::new("export")
                        .about("Write detail and summary CSV files for a year")
                        .arg(req("year", "Calendar year"))
                        .arg(opt("dir", "Output directory (default .)"))
                        .arg(policy_opt()),
                ),
        )
        .subcommand(
            Command::new("import").about("Import data").subcommand(
                Command::new("transactions")
                    .about("Import transactions from CSV")
                    .arg(req("path", "CSV file"))
                    .arg(opt("wallet", "Wallet for rows without a wallet column value")),
            ),
        )
        .subcommand(
            Command::new("export").about("Export data").subcommand(
                Command::new("transactions")
                    .about("Export all transactions")
                    .arg(req("format", "csv|json"))
                    .arg(req("out", "Output file"))
                    .arg(opt("wallet", "Only transactions in this wallet")),
            ),
        )
        .subcommand(
            Command::new("config")
                .about("Read and change settings")
                .subcommand(Command::new("list").about("Show all settings"))
                .subcommand(
                    Command::new("get")
                        .about("Show one setting")
                        .arg(Arg::new("key").required(true)),
                )
                .subcommand(
                    Command::new("set")
                        .about("Change a setting: lot_policy, long_term_days, fiat_currency")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                ),
        )
        .subcommand(Command::new("doctor").about("Check the transaction log for problems"))
}
