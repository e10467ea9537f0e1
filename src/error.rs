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

//! Error types for ledger and payout operations.

use crate::money::Money;
use crate::withdrawal::WithdrawalStatus;
use thiserror::Error;

/// Ledger operation errors.
///
/// Validation failures (amount, key, funds, state) are returned before any
/// side effect: a failed operation leaves balances and withdrawal requests
/// exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero, negative, or not a valid decimal
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Withdrawal amount is below the platform minimum
    #[error("withdrawal amount is below the minimum of {minimum}")]
    BelowMinimum { minimum: Money },

    /// No destination key was supplied for the payout
    #[error("missing payout key")]
    MissingPayoutKey,

    /// Debit would exceed the available (or held) balance
    #[error("insufficient available funds")]
    InsufficientFunds,

    /// Action invoked from a state that does not permit it
    #[error("cannot {action} a withdrawal in status {from}")]
    InvalidStateTransition {
        from: WithdrawalStatus,
        action: &'static str,
    },

    /// Provider outcome is unknown (timeout or network failure); the
    /// withdrawal stays pending for manual reconciliation
    #[error("payment provider outcome unknown; withdrawal remains pending")]
    ProviderUnknownOutcome,

    /// Another operation holds the withdrawal row; retry from a fresh read
    #[error("concurrent operation in progress; retry")]
    ConcurrencyConflict,

    /// Photographer has no balance row yet
    #[error("no balance exists for this photographer")]
    BalanceNotFound,

    /// Referenced withdrawal request does not exist
    #[error("withdrawal request not found")]
    WithdrawalNotFound,

    /// Referenced sale credit does not exist on this balance
    #[error("sale credit not found")]
    SaleCreditNotFound,
}
