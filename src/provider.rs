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

//! External payment provider interface.
//!
//! The provider is an untrusted, possibly-slow black box. Every transfer
//! attempt is classified into exactly one of [`TransferOutcome`]'s variants;
//! `Unknown` is never collapsed into `Accepted` or `Rejected`.

use crate::money::Money;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Result of one transfer attempt, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The provider accepted the transfer and returned its reference.
    Accepted { reference: String },
    /// The provider explicitly rejected the transfer.
    Rejected { reason: String },
    /// Timeout or transport failure; the transfer may still land.
    Unknown,
}

/// Instant-payment rail used to pay out withdrawals.
pub trait PaymentProvider: Send + Sync {
    /// Attempts one transfer of `amount` to `payout_key`.
    fn transfer(&self, payout_key: &str, amount: Money) -> TransferOutcome;

    /// Platform-level float balance at the provider, for manual
    /// cross-checking against pending withdrawals. `None` when the provider
    /// cannot answer.
    fn account_balance(&self) -> Option<Money>;
}

/// Provider with pre-scripted outcomes, consumed in order.
///
/// Used by the replay binary and the test suite. An exhausted script yields
/// [`TransferOutcome::Unknown`], the same as an unreachable provider.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<TransferOutcome>>,
    balance: Mutex<Option<Money>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome for the next transfer attempt.
    pub fn push(&self, outcome: TransferOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn set_balance(&self, balance: Money) {
        *self.balance.lock() = Some(balance);
    }
}

impl PaymentProvider for ScriptedProvider {
    fn transfer(&self, _payout_key: &str, _amount: Money) -> TransferOutcome {
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(TransferOutcome::Unknown)
    }

    fn account_balance(&self) -> Option<Money> {
        *self.balance.lock()
    }
}
