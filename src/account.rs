// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-photographer balance rows.
//!
//! A [`BalanceAccount`] is the only shared mutable resource in the ledger.
//! Every mutation appends a [`LedgerEntry`] and adjusts the cached
//! `available`/`held` split under one lock acquisition, so operations on the
//! same photographer serialize while different photographers proceed in
//! parallel.
//!
//! # Example
//!
//! ```
//! use payout_ledger_rs::{BalanceAccount, Money, PhotographerId, SaleId};
//! use chrono::Utc;
//!
//! let account = BalanceAccount::new(PhotographerId(1));
//! account.credit_held(SaleId(1), Money::from_centavos(10_000), Utc::now()).unwrap();
//! assert_eq!(account.held(), Money::from_centavos(10_000));
//! ```

use crate::base::{EntryId, PhotographerId, SaleId, WithdrawalId};
use crate::entry::{EntryKind, EntryRef, LedgerEntry};
use crate::error::LedgerError;
use crate::money::Money;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// Tracks one sale credit for hold-release bookkeeping.
///
/// `released` makes the holding-period sweep idempotent: a credit moves from
/// held to available at most once, no matter how often the sweep fires.
#[derive(Debug, Clone)]
struct SaleCreditRecord {
    amount: Money,
    credited_at: DateTime<Utc>,
    released: bool,
}

#[derive(Debug)]
struct BalanceData {
    photographer_id: PhotographerId,
    available: Money,
    held: Money,
    /// Append-only audit trail; the balance fields above are the cache.
    entries: Vec<LedgerEntry>,
    /// Sale credits indexed by sale ID for dedup and release tracking.
    sales: HashMap<SaleId, SaleCreditRecord>,
}

impl BalanceData {
    fn new(photographer_id: PhotographerId) -> Self {
        Self {
            photographer_id,
            available: Money::ZERO,
            held: Money::ZERO,
            entries: Vec::new(),
            sales: HashMap::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            !self.available.is_negative(),
            "Invariant violated: available balance went negative: {}",
            self.available
        );
        debug_assert!(
            !self.held.is_negative(),
            "Invariant violated: held balance went negative: {}",
            self.held
        );
        debug_assert_eq!(
            self.entries
                .iter()
                .fold(Money::ZERO, |sum, e| sum + e.amount),
            self.available + self.held,
            "Invariant violated: entries no longer reconstruct the balance"
        );
    }

    fn append_entry(
        &mut self,
        kind: EntryKind,
        amount: Money,
        related: EntryRef,
        now: DateTime<Utc>,
    ) {
        let id = EntryId(self.entries.len() as u64 + 1);
        self.entries.push(LedgerEntry {
            id,
            photographer_id: self.photographer_id,
            kind,
            amount,
            related,
            created_at: now,
        });
    }

    /// Credits `held`. Returns `false` when the sale was already credited.
    fn credit_held(
        &mut self,
        sale_id: SaleId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        if self.sales.contains_key(&sale_id) {
            return Ok(false);
        }
        self.held += amount;
        self.sales.insert(
            sale_id,
            SaleCreditRecord {
                amount,
                credited_at: now,
                released: false,
            },
        );
        self.append_entry(EntryKind::SaleCredit, amount, EntryRef::Sale(sale_id), now);
        self.assert_invariants();
        Ok(true)
    }

    /// Moves one matured sale credit from held to available. Returns `false`
    /// when the credit was already released.
    fn release_held(&mut self, sale_id: SaleId, now: DateTime<Utc>) -> Result<bool, LedgerError> {
        let record = self
            .sales
            .get(&sale_id)
            .ok_or(LedgerError::SaleCreditNotFound)?;
        if record.released {
            return Ok(false);
        }
        let amount = record.amount;
        if self.held < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        self.held -= amount;
        self.available += amount;
        self.sales
            .get_mut(&sale_id)
            .ok_or(LedgerError::SaleCreditNotFound)?
            .released = true;
        // Net-zero pair: the release is visible in the trail but does not
        // change the entry sum.
        self.append_entry(EntryKind::HoldRelease, Money::ZERO, EntryRef::Sale(sale_id), now);
        self.assert_invariants();
        Ok(true)
    }

    /// Debits `available` for a withdrawal.
    fn debit_available(
        &mut self,
        withdrawal_id: WithdrawalId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        if self.available < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        self.available -= amount;
        self.append_entry(
            EntryKind::WithdrawalDebit,
            -amount,
            EntryRef::Withdrawal(withdrawal_id),
            now,
        );
        self.assert_invariants();
        Ok(())
    }

    /// Returns a withdrawal's debit to `available` after failure or
    /// cancellation.
    fn reverse_debit(
        &mut self,
        withdrawal_id: WithdrawalId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        self.available += amount;
        self.append_entry(
            EntryKind::WithdrawalReversal,
            amount,
            EntryRef::Withdrawal(withdrawal_id),
            now,
        );
        self.assert_invariants();
        Ok(())
    }

    fn matured_sales(&self, as_of: DateTime<Utc>, hold_period: Duration) -> Vec<SaleId> {
        let mut ids: Vec<SaleId> = self
            .sales
            .iter()
            .filter(|(_, record)| !record.released && record.credited_at + hold_period <= as_of)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Point-in-time view of one balance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub photographer: PhotographerId,
    pub available: Money,
    pub held: Money,
    pub total: Money,
}

/// A photographer's balance row.
///
/// The mutex stands in for row-level locking on the balance record: each
/// public operation is one atomic append-entry-and-adjust transaction.
#[derive(Debug)]
pub struct BalanceAccount {
    inner: Mutex<BalanceData>,
}

impl BalanceAccount {
    pub fn new(photographer_id: PhotographerId) -> Self {
        Self {
            inner: Mutex::new(BalanceData::new(photographer_id)),
        }
    }

    /// Funds the photographer may withdraw now.
    pub fn available(&self) -> Money {
        self.inner.lock().available
    }

    /// Funds credited from sales but still inside the clearing window.
    pub fn held(&self) -> Money {
        self.inner.lock().held
    }

    /// Returns `available + held`.
    pub fn total(&self) -> Money {
        let data = self.inner.lock();
        data.available + data.held
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        let data = self.inner.lock();
        BalanceSnapshot {
            photographer: data.photographer_id,
            available: data.available,
            held: data.held,
            total: data.available + data.held,
        }
    }

    /// Full audit trail, in append order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries.clone()
    }

    /// Credits a sale to the held balance. Idempotent on `sale_id`; returns
    /// `false` for a duplicate delivery.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for non-positive amounts.
    pub fn credit_held(
        &self,
        sale_id: SaleId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        self.inner.lock().credit_held(sale_id, amount, now)
    }

    /// Releases one matured sale credit from held to available. Idempotent;
    /// returns `false` when the credit was already released.
    ///
    /// # Errors
    ///
    /// [`LedgerError::SaleCreditNotFound`] for an unknown sale id.
    pub fn release_held(&self, sale_id: SaleId, now: DateTime<Utc>) -> Result<bool, LedgerError> {
        self.inner.lock().release_held(sale_id, now)
    }

    /// Debits the available balance for a withdrawal request.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientFunds`] when `amount` exceeds `available`;
    /// the balance is left unchanged.
    pub fn debit_available(
        &self,
        withdrawal_id: WithdrawalId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.inner.lock().debit_available(withdrawal_id, amount, now)
    }

    /// Reverses a withdrawal's debit after failure or cancellation.
    pub fn reverse_debit(
        &self,
        withdrawal_id: WithdrawalId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.inner.lock().reverse_debit(withdrawal_id, amount, now)
    }

    /// Unreleased sale credits whose holding period elapsed by `as_of`.
    pub fn matured_sales(&self, as_of: DateTime<Utc>, hold_period: Duration) -> Vec<SaleId> {
        self.inner.lock().matured_sales(as_of, hold_period)
    }
}
