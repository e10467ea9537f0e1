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

//! Ledger engine.
//!
//! The [`LedgerEngine`] is the single entry point for everything that moves
//! money: sale credits, hold releases, withdrawal creation, payout dispatch,
//! and the admin reconciliation actions. Admin actions always run through the
//! withdrawal state machine; nothing mutates a balance directly.
//!
//! # Locking
//!
//! Balance rows and withdrawal rows are independent lock domains. Operations
//! that touch both always take the withdrawal row first and the balance row
//! second, never the reverse. Contention on a withdrawal row is surfaced as
//! [`LedgerError::ConcurrencyConflict`]; the caller retries from a fresh read.

use crate::account::{BalanceAccount, BalanceSnapshot};
use crate::base::{PhotographerId, SaleId, WithdrawalId};
use crate::dispatcher::PayoutDispatcher;
use crate::entry::LedgerEntry;
use crate::error::LedgerError;
use crate::money::Money;
use crate::notify::{Notifier, NoopNotifier};
use crate::provider::{PaymentProvider, TransferOutcome};
use crate::withdrawal::{WithdrawalRequest, WithdrawalStatus};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use dashmap::try_result::TryResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Platform policy knobs.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Smallest withdrawal the platform accepts.
    pub min_withdrawal: Money,
    /// Clearing window before a sale credit becomes withdrawable.
    pub hold_period: Duration,
    /// Hard timeout for one provider transfer attempt.
    pub provider_timeout: std::time::Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_withdrawal: Money::from_centavos(5_000),
            hold_period: Duration::days(14),
            provider_timeout: std::time::Duration::from_secs(5),
        }
    }
}

/// Balance and payout ledger for the marketplace.
///
/// # Invariants
///
/// - For every photographer, `available + held` equals the sum of their
///   ledger entries at all times, and neither balance goes negative.
/// - Sale credits are idempotent on the sale id.
/// - Exactly one transition can succeed from a given withdrawal state;
///   racing admin actions observe a conflict or an invalid transition.
pub struct LedgerEngine {
    /// Balance rows indexed by photographer, created lazily on first credit.
    accounts: DashMap<PhotographerId, BalanceAccount>,
    /// All withdrawal requests, kept forever for audit.
    withdrawals: DashMap<WithdrawalId, WithdrawalRequest>,
    dispatcher: PayoutDispatcher,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn Notifier>,
    config: LedgerConfig,
    next_withdrawal_id: AtomicU64,
}

impl LedgerEngine {
    /// Creates an engine with default platform policy and no notifier.
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self::with_config(provider, LedgerConfig::default())
    }

    pub fn with_config(provider: Arc<dyn PaymentProvider>, config: LedgerConfig) -> Self {
        let dispatcher = PayoutDispatcher::new(Arc::clone(&provider), config.provider_timeout);
        Self {
            accounts: DashMap::new(),
            withdrawals: DashMap::new(),
            dispatcher,
            provider,
            notifier: Arc::new(NoopNotifier),
            config,
            next_withdrawal_id: AtomicU64::new(1),
        }
    }

    /// Wires up an outbound notification channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // === Sale credits and hold release ===

    /// Consumes a "sale completed" fact and credits the seller's held
    /// balance. Creates the balance row lazily. Idempotent on `sale_id`;
    /// returns `false` for a duplicate delivery.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for non-positive amounts.
    pub fn credit_sale(
        &self,
        photographer_id: PhotographerId,
        sale_id: SaleId,
        amount: Money,
    ) -> Result<bool, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self
            .accounts
            .entry(photographer_id)
            .or_insert_with(|| BalanceAccount::new(photographer_id));
        let credited = account.credit_held(sale_id, amount, Utc::now())?;
        if credited {
            debug!(%photographer_id, %sale_id, %amount, "sale credited to held balance");
        } else {
            debug!(%photographer_id, %sale_id, "duplicate sale event ignored");
        }
        Ok(credited)
    }

    /// Releases one sale credit from held to available. Idempotent; the
    /// external scheduler may call it repeatedly for the same credit.
    pub fn release_held(
        &self,
        photographer_id: PhotographerId,
        sale_id: SaleId,
    ) -> Result<bool, LedgerError> {
        let account = self
            .accounts
            .get(&photographer_id)
            .ok_or(LedgerError::BalanceNotFound)?;
        account.release_held(sale_id, Utc::now())
    }

    /// Sweep entry point: releases every unreleased credit whose holding
    /// period elapsed by `as_of`. Returns the released sale ids.
    pub fn release_matured(
        &self,
        photographer_id: PhotographerId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SaleId>, LedgerError> {
        let account = self
            .accounts
            .get(&photographer_id)
            .ok_or(LedgerError::BalanceNotFound)?;
        let matured = account.matured_sales(as_of, self.config.hold_period);
        let mut released = Vec::with_capacity(matured.len());
        for sale_id in matured {
            if account.release_held(sale_id, Utc::now())? {
                released.push(sale_id);
            }
        }
        if !released.is_empty() {
            info!(%photographer_id, count = released.len(), "matured sale credits released");
        }
        Ok(released)
    }

    // === Withdrawal lifecycle ===

    /// Creates a withdrawal request: validates the amount and payout key,
    /// debits the available balance, and records the request as `PENDENTE`.
    ///
    /// The debit and the request creation happen under the balance row lock;
    /// two racing requests whose sum exceeds the available balance cannot
    /// both succeed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`], [`LedgerError::BelowMinimum`],
    /// [`LedgerError::MissingPayoutKey`], [`LedgerError::BalanceNotFound`],
    /// or [`LedgerError::InsufficientFunds`] — all without side effects.
    pub fn create_withdrawal(
        &self,
        photographer_id: PhotographerId,
        amount: Money,
        payout_key: &str,
    ) -> Result<WithdrawalRequest, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        if amount < self.config.min_withdrawal {
            return Err(LedgerError::BelowMinimum {
                minimum: self.config.min_withdrawal,
            });
        }
        let payout_key = payout_key.trim();
        if payout_key.is_empty() {
            return Err(LedgerError::MissingPayoutKey);
        }

        let id = WithdrawalId(self.next_withdrawal_id.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();
        {
            let account = self
                .accounts
                .get(&photographer_id)
                .ok_or(LedgerError::BalanceNotFound)?;
            account.debit_available(id, amount, now)?;
        }

        // The id is fresh, so no other caller can observe the request before
        // this insert; the debit above already committed under the row lock.
        let request = WithdrawalRequest::new(id, photographer_id, amount, payout_key.to_owned(), now);
        self.withdrawals.insert(id, request.clone());
        info!(%photographer_id, withdrawal = %id, %amount, "withdrawal requested");
        Ok(request)
    }

    /// Dispatches a `PENDENTE` withdrawal to the payment provider.
    ///
    /// - Accepted: the request becomes `PROCESSADO`; the debit stands.
    /// - Rejected: the debit is reversed and the request becomes `FALHOU`.
    /// - Unknown (timeout / transport failure): no reversal — a transfer may
    ///   still land — the request stays `PENDENTE` flagged for review and
    ///   [`LedgerError::ProviderUnknownOutcome`] is returned.
    ///
    /// The withdrawal row stays locked for the whole attempt, so a racing
    /// admin action sees [`LedgerError::ConcurrencyConflict`] instead of
    /// operating on a request that is mid-flight.
    pub fn dispatch(&self, id: WithdrawalId) -> Result<WithdrawalRequest, LedgerError> {
        let mut row = self.lock_withdrawal(id)?;
        let request = row.value_mut();
        if request.status != WithdrawalStatus::Pendente {
            return Err(LedgerError::InvalidStateTransition {
                from: request.status,
                action: "dispatch",
            });
        }

        let outcome = self.dispatcher.send(&request.payout_key, request.amount);
        let now = Utc::now();
        match outcome {
            TransferOutcome::Accepted { reference } => {
                request.mark_processed(reference, now)?;
                info!(withdrawal = %id, "payout accepted by provider");
            }
            TransferOutcome::Rejected { reason } => {
                self.account_of(request.photographer_id)?
                    .reverse_debit(id, request.amount, now)?;
                request.mark_failed(reason, now)?;
                warn!(withdrawal = %id, reason = request.failure_reason.as_deref().unwrap_or(""),
                    "payout rejected; debit reversed");
            }
            TransferOutcome::Unknown => {
                request.mark_review(now)?;
                warn!(withdrawal = %id, "payout outcome unknown; left pending for reconciliation");
                return Err(LedgerError::ProviderUnknownOutcome);
            }
        }

        let updated = request.clone();
        drop(row);
        self.notify(&updated);
        Ok(updated)
    }

    // === Admin reconciliation actions ===

    /// Approves a `PENDENTE` withdrawal and runs the dispatch flow. Approval
    /// itself moves no money.
    pub fn admin_approve(&self, id: WithdrawalId) -> Result<WithdrawalRequest, LedgerError> {
        {
            let row = self.lock_withdrawal(id)?;
            if row.status != WithdrawalStatus::Pendente {
                return Err(LedgerError::InvalidStateTransition {
                    from: row.status,
                    action: "approve",
                });
            }
        }
        info!(withdrawal = %id, "admin approved withdrawal");
        self.dispatch(id)
    }

    /// Reprocesses a `FALHOU` withdrawal: re-validates funds, re-debits the
    /// available balance (the failure already reversed the first debit),
    /// returns the request to `PENDENTE`, and dispatches again.
    pub fn admin_reprocess(&self, id: WithdrawalId) -> Result<WithdrawalRequest, LedgerError> {
        {
            let mut row = self.lock_withdrawal(id)?;
            let request = row.value_mut();
            if request.status != WithdrawalStatus::Falhou {
                return Err(LedgerError::InvalidStateTransition {
                    from: request.status,
                    action: "reprocess",
                });
            }
            let now = Utc::now();
            self.account_of(request.photographer_id)?
                .debit_available(id, request.amount, now)?;
            request.mark_reprocessing(now)?;
            info!(withdrawal = %id, "admin reprocessing failed withdrawal");
        }
        // The row is released before dispatch re-acquires it; dispatch
        // re-validates the state in case another action slipped in.
        self.dispatch(id)
    }

    /// Cancels a withdrawal. From `PENDENTE` the debit is reversed; from
    /// `FALHOU` the failure already reversed it, so only the status changes.
    /// Cancelling never double-reverses.
    pub fn admin_cancel(&self, id: WithdrawalId) -> Result<WithdrawalRequest, LedgerError> {
        let mut row = self.lock_withdrawal(id)?;
        let request = row.value_mut();
        let now = Utc::now();
        match request.status {
            WithdrawalStatus::Pendente => {
                self.account_of(request.photographer_id)?
                    .reverse_debit(id, request.amount, now)?;
                request.mark_cancelled(now)?;
            }
            WithdrawalStatus::Falhou => {
                request.mark_cancelled(now)?;
            }
            from => {
                return Err(LedgerError::InvalidStateTransition {
                    from,
                    action: "cancel",
                });
            }
        }
        info!(withdrawal = %id, "admin cancelled withdrawal");
        let updated = request.clone();
        drop(row);
        self.notify(&updated);
        Ok(updated)
    }

    /// Confirms that an operator paid a `FALHOU` withdrawal manually outside
    /// the automated rail.
    ///
    /// The failure had already reversed the debit, so the photographer must
    /// be charged again before the confirmation is recorded; otherwise they
    /// would keep the funds and receive the manual payment. Fails with
    /// [`LedgerError::InsufficientFunds`] (and changes nothing) when the
    /// balance no longer covers the amount.
    pub fn admin_confirm_manual(&self, id: WithdrawalId) -> Result<WithdrawalRequest, LedgerError> {
        let mut row = self.lock_withdrawal(id)?;
        let request = row.value_mut();
        if request.status != WithdrawalStatus::Falhou {
            return Err(LedgerError::InvalidStateTransition {
                from: request.status,
                action: "confirm manually",
            });
        }
        let now = Utc::now();
        self.account_of(request.photographer_id)?
            .debit_available(id, request.amount, now)?;
        request.mark_confirmed_manual(now)?;
        info!(withdrawal = %id, "admin confirmed manual transfer");
        let updated = request.clone();
        drop(row);
        self.notify(&updated);
        Ok(updated)
    }

    // === Reads ===

    /// Platform float balance at the provider, for manual cross-checking
    /// against the sum of pending withdrawals. Never gates transfers.
    pub fn provider_balance(&self) -> Result<Money, LedgerError> {
        self.provider
            .account_balance()
            .ok_or(LedgerError::ProviderUnknownOutcome)
    }

    pub fn balance(&self, photographer_id: PhotographerId) -> Option<BalanceSnapshot> {
        self.accounts
            .get(&photographer_id)
            .map(|account| account.snapshot())
    }

    /// Snapshots of every balance row, ordered by photographer id.
    pub fn balances(&self) -> Vec<BalanceSnapshot> {
        let mut all: Vec<BalanceSnapshot> = self
            .accounts
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        all.sort_by_key(|snapshot| snapshot.photographer);
        all
    }

    /// Audit trail for one photographer, in append order. Empty when no
    /// balance row exists.
    pub fn entries(&self, photographer_id: PhotographerId) -> Vec<LedgerEntry> {
        self.accounts
            .get(&photographer_id)
            .map(|account| account.entries())
            .unwrap_or_default()
    }

    pub fn withdrawal(&self, id: WithdrawalId) -> Option<WithdrawalRequest> {
        self.withdrawals.get(&id).map(|row| row.clone())
    }

    /// A photographer's withdrawal requests, newest first.
    pub fn withdrawals(
        &self,
        photographer_id: PhotographerId,
        limit: usize,
    ) -> Vec<WithdrawalRequest> {
        let mut requests: Vec<WithdrawalRequest> = self
            .withdrawals
            .iter()
            .filter(|row| row.photographer_id == photographer_id)
            .map(|row| row.clone())
            .collect();
        requests.sort_by(|a, b| b.id.cmp(&a.id));
        requests.truncate(limit);
        requests
    }

    // === Internals ===

    fn lock_withdrawal(
        &self,
        id: WithdrawalId,
    ) -> Result<RefMut<'_, WithdrawalId, WithdrawalRequest>, LedgerError> {
        match self.withdrawals.try_get_mut(&id) {
            TryResult::Present(row) => Ok(row),
            TryResult::Absent => Err(LedgerError::WithdrawalNotFound),
            TryResult::Locked => Err(LedgerError::ConcurrencyConflict),
        }
    }

    fn account_of(
        &self,
        photographer_id: PhotographerId,
    ) -> Result<dashmap::mapref::one::Ref<'_, PhotographerId, BalanceAccount>, LedgerError> {
        self.accounts
            .get(&photographer_id)
            .ok_or(LedgerError::BalanceNotFound)
    }

    fn notify(&self, request: &WithdrawalRequest) {
        if let Err(error) = self.notifier.withdrawal_update(request) {
            // Notification failure never rolls back a committed transition.
            warn!(withdrawal = %request.id, %error, "withdrawal notification failed");
        }
    }
}
