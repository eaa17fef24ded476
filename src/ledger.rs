// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Tax-lot accounting.
//!
//! A [`Ledger`] keeps one ordered book of open lots per asset. Acquisitions
//! append a lot; disposals and transfers consume lots in the order chosen by
//! the configured [`LotPolicy`]. Every disposal yields exactly one
//! [`RealizedGain`] that aggregates the slices of all lots it touched.

use crate::error::LedgerError;
use crate::models::{HoldingTerm, Lot, LotSlice, LotTransfer, RealizedGain, Transaction, TxKind};
use anyhow::anyhow;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LONG_TERM_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotPolicy {
    #[default]
    Fifo,
    Lifo,
    /// Consume the lot named by the transaction's `lot_ref`.
    Specific,
}

impl LotPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotPolicy::Fifo => "fifo",
            LotPolicy::Lifo => "lifo",
            LotPolicy::Specific => "specific",
        }
    }
}

impl fmt::Display for LotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LotPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(LotPolicy::Fifo),
            "lifo" => Ok(LotPolicy::Lifo),
            "specific" | "specific-id" | "specific_id" => Ok(LotPolicy::Specific),
            other => Err(anyhow!(
                "Unknown lot policy '{}' (use fifo|lifo|specific)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub policy: LotPolicy,
    /// Lots held strictly longer than this many days are long-term.
    pub long_term_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            policy: LotPolicy::Fifo,
            long_term_days: DEFAULT_LONG_TERM_DAYS,
        }
    }
}

impl LedgerConfig {
    pub fn with_policy(policy: LotPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

/// What a single transaction did to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Opened(Lot),
    Realized(RealizedGain),
    Transferred(LotTransfer),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub asset: String,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub lots: usize,
}

impl Holding {
    pub fn average_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost_basis
                .checked_div(self.quantity)
                .unwrap_or(Decimal::MAX)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerOutcome {
    pub gains: Vec<RealizedGain>,
    pub transfers: Vec<LotTransfer>,
    pub open_lots: Vec<Lot>,
}

impl LedgerOutcome {
    pub fn holdings(&self) -> Vec<Holding> {
        summarize(self.open_lots.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    books: BTreeMap<String, Vec<Lot>>,
    gains: Vec<RealizedGain>,
    transfers: Vec<LotTransfer>,
    last_seen: Option<NaiveDateTime>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            books: BTreeMap::new(),
            gains: Vec::new(),
            transfers: Vec::new(),
            last_seen: None,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validate and apply one transaction. On error nothing is changed, so
    /// results of earlier transactions stay valid.
    pub fn apply(&mut self, tx: &Transaction) -> Result<Applied, LedgerError> {
        self.validate(tx)?;
        let applied = match tx.kind {
            TxKind::Acquire => {
                let basis = tx
                    .gross_value()
                    .and_then(|v| v.checked_add(tx.fee))
                    .ok_or_else(|| overflow(tx))?;
                Applied::Opened(self.open_lot(tx, basis)?)
            }
            TxKind::Dispose => {
                let proceeds = tx.gross_value().ok_or_else(|| overflow(tx))? - tx.fee;
                let plan = self.plan(tx)?;
                let book = self.open_lots(&tx.asset);
                let basis: Decimal = plan
                    .iter()
                    .map(|&(idx, quantity)| slice_basis(&book[idx], quantity))
                    .sum();
                proceeds.checked_sub(basis).ok_or_else(|| overflow(tx))?;
                let slices = self.take(tx, plan);
                let gain = realize(tx, proceeds, slices);
                tracing::debug!(
                    tx = tx.id,
                    asset = %gain.asset,
                    proceeds = %gain.proceeds,
                    basis = %gain.cost_basis,
                    gain = %gain.gain,
                    "realized disposal"
                );
                self.gains.push(gain.clone());
                Applied::Realized(gain)
            }
            TxKind::Transfer => {
                let plan = self.plan(tx)?;
                let slices = self.take(tx, plan);
                let transfer = LotTransfer {
                    tx_id: tx.id,
                    transferred_at: tx.timestamp,
                    asset: tx.asset.clone(),
                    quantity: tx.quantity,
                    cost_basis: slices.iter().map(|s| s.cost_basis).sum(),
                    fee: tx.fee,
                    slices,
                };
                self.transfers.push(transfer.clone());
                Applied::Transferred(transfer)
            }
        };
        self.last_seen = Some(tx.timestamp);
        Ok(applied)
    }

    pub fn gains(&self) -> &[RealizedGain] {
        &self.gains
    }

    pub fn transfers(&self) -> &[LotTransfer] {
        &self.transfers
    }

    pub fn open_lots(&self, asset: &str) -> &[Lot] {
        self.books.get(asset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn quantity_of(&self, asset: &str) -> Decimal {
        self.open_lots(asset).iter().map(|l| l.quantity).sum()
    }

    pub fn holdings(&self) -> Vec<Holding> {
        summarize(self.books.values().flatten())
    }

    pub fn into_outcome(self) -> LedgerOutcome {
        LedgerOutcome {
            gains: self.gains,
            transfers: self.transfers,
            open_lots: self.books.into_values().flatten().collect(),
        }
    }

    fn validate(&self, tx: &Transaction) -> Result<(), LedgerError> {
        if tx.asset.trim().is_empty() {
            return Err(LedgerError::invalid(tx.id, "asset symbol is empty"));
        }
        if tx.quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid(
                tx.id,
                format!("quantity must be greater than zero (got {})", tx.quantity),
            ));
        }
        if tx.unit_price < Decimal::ZERO {
            return Err(LedgerError::invalid(tx.id, "unit price cannot be negative"));
        }
        if tx.fee < Decimal::ZERO {
            return Err(LedgerError::invalid(tx.id, "fee cannot be negative"));
        }
        if let Some(last) = self.last_seen {
            if tx.timestamp < last {
                return Err(LedgerError::invalid(
                    tx.id,
                    format!("timestamp {} precedes previous {}", tx.timestamp, last),
                ));
            }
        }
        Ok(())
    }

    fn open_lot(&mut self, tx: &Transaction, cost_basis: Decimal) -> Result<Lot, LedgerError> {
        let book = self.open_lots(&tx.asset);
        if book.iter().any(|l| l.id == tx.id) {
            return Err(LedgerError::invalid(
                tx.id,
                format!("lot {} is already open", tx.id),
            ));
        }
        // Per-asset totals must stay representable so later sums cannot overflow.
        let quantity_fits = book
            .iter()
            .try_fold(tx.quantity, |acc, l| acc.checked_add(l.quantity))
            .is_some();
        let basis_fits = book
            .iter()
            .try_fold(cost_basis, |acc, l| acc.checked_add(l.cost_basis))
            .is_some();
        if !quantity_fits || !basis_fits {
            return Err(overflow(tx));
        }

        let lot = Lot {
            id: tx.id,
            asset: tx.asset.clone(),
            acquired_at: tx.timestamp,
            original_quantity: tx.quantity,
            quantity: tx.quantity,
            cost_basis,
        };
        let book = self.books.entry(tx.asset.clone()).or_default();
        book.push(lot.clone());
        Ok(lot)
    }

    /// Pick `(book index, quantity)` pairs to consume without touching state.
    fn plan(&self, tx: &Transaction) -> Result<Vec<(usize, Decimal)>, LedgerError> {
        let book = self
            .books
            .get(&tx.asset)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| LedgerError::UnknownAsset {
                tx_id: tx.id,
                asset: tx.asset.clone(),
            })?;

        match self.config.policy {
            LotPolicy::Specific => {
                let lot_id = tx.lot_ref.ok_or_else(|| {
                    LedgerError::invalid(tx.id, "specific identification requires a lot reference")
                })?;
                let Some(idx) = book.iter().position(|l| l.id == lot_id) else {
                    return Err(self.missing_lot(tx, lot_id));
                };
                let available = book[idx].quantity;
                if tx.quantity > available {
                    return Err(LedgerError::InsufficientBalance {
                        tx_id: tx.id,
                        asset: tx.asset.clone(),
                        requested: tx.quantity,
                        available,
                    });
                }
                Ok(vec![(idx, tx.quantity)])
            }
            LotPolicy::Fifo | LotPolicy::Lifo => {
                if tx.lot_ref.is_some() {
                    tracing::debug!(
                        tx = tx.id,
                        policy = %self.config.policy,
                        "lot reference ignored outside specific identification"
                    );
                }
                let available: Decimal = book.iter().map(|l| l.quantity).sum();
                if tx.quantity > available {
                    return Err(LedgerError::InsufficientBalance {
                        tx_id: tx.id,
                        asset: tx.asset.clone(),
                        requested: tx.quantity,
                        available,
                    });
                }
                let mut order: Vec<usize> = (0..book.len()).collect();
                if self.config.policy == LotPolicy::Lifo {
                    order.reverse();
                }
                let mut remaining = tx.quantity;
                let mut plan = Vec::new();
                for idx in order {
                    if remaining.is_zero() {
                        break;
                    }
                    let take = remaining.min(book[idx].quantity);
                    if take.is_zero() {
                        continue;
                    }
                    plan.push((idx, take));
                    remaining -= take;
                }
                Ok(plan)
            }
        }
    }

    fn missing_lot(&self, tx: &Transaction, lot_id: i64) -> LedgerError {
        let owner = self
            .books
            .iter()
            .find(|(_, book)| book.iter().any(|l| l.id == lot_id))
            .map(|(asset, _)| asset.as_str());
        match owner {
            Some(asset) => LedgerError::invalid(
                tx.id,
                format!("lot {} holds {}, not {}", lot_id, asset, tx.asset),
            ),
            None => LedgerError::UnknownLot {
                tx_id: tx.id,
                lot_id,
            },
        }
    }

    fn take(&mut self, tx: &Transaction, plan: Vec<(usize, Decimal)>) -> Vec<LotSlice> {
        let long_term_days = self.config.long_term_days;
        let Some(book) = self.books.get_mut(&tx.asset) else {
            return Vec::new();
        };

        let mut slices = Vec::with_capacity(plan.len());
        for (idx, quantity) in plan {
            let lot = &mut book[idx];
            let basis = slice_basis(lot, quantity);
            lot.quantity -= quantity;
            lot.cost_basis -= basis;

            let holding_days = (tx.timestamp - lot.acquired_at).num_days();
            tracing::debug!(
                tx = tx.id,
                lot = lot.id,
                quantity = %quantity,
                basis = %basis,
                "consumed lot"
            );
            slices.push(LotSlice {
                lot_id: lot.id,
                acquired_at: lot.acquired_at,
                quantity,
                cost_basis: basis,
                proceeds: Decimal::ZERO,
                holding_days,
                term: classify(holding_days, long_term_days),
            });
        }

        book.retain(|l| !l.quantity.is_zero());
        if book.is_empty() {
            self.books.remove(&tx.asset);
        }
        slices
    }
}

/// Replay an ordered transaction log. Stops at the first failing transaction.
pub fn compute(
    transactions: &[Transaction],
    config: LedgerConfig,
) -> Result<LedgerOutcome, LedgerError> {
    let mut ledger = Ledger::new(config);
    for tx in transactions {
        ledger.apply(tx).inspect_err(|e| {
            tracing::warn!(tx = tx.id, error = %e, "ledger replay stopped");
        })?;
    }
    tracing::info!(
        "ledger replay: {} transactions, {} disposals, policy {}",
        transactions.len(),
        ledger.gains.len(),
        config.policy
    );
    Ok(ledger.into_outcome())
}

/// Stable sort by timestamp; equal timestamps keep insertion order.
pub fn sort_chronologically(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| t.timestamp);
}

fn overflow(tx: &Transaction) -> LedgerError {
    LedgerError::invalid(tx.id, "value overflows")
}

/// A lot consumed in full hands over its exact remaining basis.
fn slice_basis(lot: &Lot, quantity: Decimal) -> Decimal {
    if quantity == lot.quantity {
        lot.cost_basis
    } else {
        pro_rata(lot.cost_basis, quantity, lot.quantity)
    }
}

/// `amount * part / whole` for `part <= whole`. Multiplies first for exact
/// results and falls back to the ratio when the product would not fit.
fn pro_rata(amount: Decimal, part: Decimal, whole: Decimal) -> Decimal {
    amount
        .checked_mul(part)
        .and_then(|v| v.checked_div(whole))
        .unwrap_or_else(|| amount * (part / whole))
}

fn classify(holding_days: i64, long_term_days: i64) -> HoldingTerm {
    if holding_days > long_term_days {
        HoldingTerm::Long
    } else {
        HoldingTerm::Short
    }
}

fn realize(tx: &Transaction, proceeds: Decimal, mut slices: Vec<LotSlice>) -> RealizedGain {
    // Pro-rata by quantity; the last slice absorbs the rounding remainder so
    // slice proceeds always sum to the disposal's proceeds.
    let last = slices.len().saturating_sub(1);
    let mut allocated = Decimal::ZERO;
    for (i, slice) in slices.iter_mut().enumerate() {
        slice.proceeds = if i == last {
            proceeds - allocated
        } else {
            pro_rata(proceeds, slice.quantity, tx.quantity)
        };
        allocated += slice.proceeds;
    }

    let cost_basis: Decimal = slices.iter().map(|s| s.cost_basis).sum();
    let term = slices
        .iter()
        .map(|s| s.term)
        .reduce(|acc, t| if acc == t { acc } else { HoldingTerm::Mixed })
        .unwrap_or(HoldingTerm::Short);

    RealizedGain {
        tx_id: tx.id,
        disposed_at: tx.timestamp,
        asset: tx.asset.clone(),
        quantity: tx.quantity,
        proceeds,
        cost_basis,
        gain: proceeds - cost_basis,
        term,
        slices,
    }
}

fn summarize<'a>(lots: impl Iterator<Item = &'a Lot>) -> Vec<Holding> {
    let mut by_asset: BTreeMap<&str, Holding> = BTreeMap::new();
    for lot in lots {
        let entry = by_asset.entry(lot.asset.as_str()).or_insert_with(|| Holding {
            asset: lot.asset.clone(),
            quantity: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            lots: 0,
        });
        entry.quantity += lot.quantity;
        entry.cost_basis += lot.cost_basis;
        entry.lots += 1;
    }
    by_asset.into_values().collect()
}
