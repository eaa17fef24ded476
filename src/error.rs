// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised while applying a transaction to the ledger. The ledger is
/// left untouched by the transaction that produced the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid transaction {tx_id}: {reason}")]
    InvalidTransaction { tx_id: i64, reason: String },

    #[error(
        "Insufficient balance for {asset} in transaction {tx_id}: requested {requested}, available {available}"
    )]
    InsufficientBalance {
        tx_id: i64,
        asset: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Unknown asset {asset} in transaction {tx_id}: no open lots")]
    UnknownAsset { tx_id: i64, asset: String },

    #[error("Unknown lot {lot_id} referenced by transaction {tx_id}")]
    UnknownLot { tx_id: i64, lot_id: i64 },
}

impl LedgerError {
    pub fn invalid(tx_id: i64, reason: impl Into<String>) -> Self {
        LedgerError::InvalidTransaction {
            tx_id,
            reason: reason.into(),
        }
    }

    pub fn tx_id(&self) -> i64 {
        match self {
            LedgerError::InvalidTransaction { tx_id, .. }
            | LedgerError::InsufficientBalance { tx_id, .. }
            | LedgerError::UnknownAsset { tx_id, .. }
            | LedgerError::UnknownLot { tx_id, .. } => *tx_id,
        }
    }
}
