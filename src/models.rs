// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::anyhow;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Acquire,
    Dispose,
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Acquire => "acquire",
            TxKind::Dispose => "dispose",
            TxKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = anyhow::Error;

    /// Accepts the canonical names plus the exchange-style aliases found in
    /// CSV exports (`buy`, `sell`, `transfer_in`, `transfer_out`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acquire" | "buy" | "transfer_in" => Ok(TxKind::Acquire),
            "dispose" | "sell" => Ok(TxKind::Dispose),
            "transfer" | "transfer_out" => Ok(TxKind::Transfer),
            other => Err(anyhow!(
                "Unknown transaction type '{}' (use acquire|dispose|transfer)",
                other
            )),
        }
    }
}

/// A recorded acquisition, disposal or outbound transfer of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub asset: String,
    pub kind: TxKind,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub fee: Decimal,
    /// Lot (acquiring transaction id) to consume under specific identification.
    pub lot_ref: Option<i64>,
    pub wallet: Option<String>,
    pub note: Option<String>,
}

impl Transaction {
    pub fn new(
        id: i64,
        timestamp: NaiveDateTime,
        asset: &str,
        kind: TxKind,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id,
            timestamp,
            asset: asset.trim().to_ascii_uppercase(),
            kind,
            quantity,
            unit_price,
            fee: Decimal::ZERO,
            lot_ref: None,
            wallet: None,
            note: None,
        }
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_lot_ref(mut self, lot_id: i64) -> Self {
        self.lot_ref = Some(lot_id);
        self
    }

    /// `quantity * unit_price`, or `None` when the product does not fit.
    pub fn gross_value(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// An open acquisition. `cost_basis` is the basis of the remaining quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub asset: String,
    pub acquired_at: NaiveDateTime,
    pub original_quantity: Decimal,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
}

impl Lot {
    /// Saturates at `Decimal::MAX` for dust quantities carrying a large basis.
    pub fn unit_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost_basis
                .checked_div(self.quantity)
                .unwrap_or(Decimal::MAX)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingTerm {
    Short,
    Long,
    /// Disposal touched both short- and long-term lots.
    Mixed,
}

impl HoldingTerm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldingTerm::Short => "short",
            HoldingTerm::Long => "long",
            HoldingTerm::Mixed => "mixed",
        }
    }
}

impl fmt::Display for HoldingTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of a single lot consumed by a disposal or transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotSlice {
    pub lot_id: i64,
    pub acquired_at: NaiveDateTime,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub holding_days: i64,
    pub term: HoldingTerm,
}

impl LotSlice {
    pub fn gain(&self) -> Decimal {
        self.proceeds - self.cost_basis
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedGain {
    pub tx_id: i64,
    pub disposed_at: NaiveDateTime,
    pub asset: String,
    pub quantity: Decimal,
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub gain: Decimal,
    pub term: HoldingTerm,
    pub slices: Vec<LotSlice>,
}

impl RealizedGain {
    pub fn short_term_gain(&self) -> Decimal {
        self.gain_for(HoldingTerm::Short)
    }

    pub fn long_term_gain(&self) -> Decimal {
        self.gain_for(HoldingTerm::Long)
    }

    fn gain_for(&self, term: HoldingTerm) -> Decimal {
        self.slices
            .iter()
            .filter(|s| s.term == term)
            .map(LotSlice::gain)
            .sum()
    }
}

/// Basis moved out of the ledger by a transfer; no gain is realized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotTransfer {
    pub tx_id: i64,
    pub transferred_at: NaiveDateTime,
    pub asset: String,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub fee: Decimal,
    pub slices: Vec<LotSlice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset: String,
    pub as_of: NaiveDateTime,
    pub price: Decimal,
    pub source: String,
}
