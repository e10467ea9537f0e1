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

//! Append-only ledger entries.
//!
//! One entry is written per balance-affecting event. The entries for a
//! photographer are the audit trail; the balance row is the cache. At all
//! times `available + held` equals the sum of entry amounts.

use crate::base::{EntryId, PhotographerId, SaleId, WithdrawalId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of event an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// A sale credited the held balance.
    SaleCredit,
    /// Held funds matured and moved to available.
    HoldRelease,
    /// A withdrawal request debited the available balance.
    WithdrawalDebit,
    /// A failed or cancelled withdrawal returned funds to available.
    WithdrawalReversal,
}

/// The entity an entry relates to.
///
/// Every entry carries an explicit reference; no consumer should infer the
/// nature of a movement from sign or kind heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryRef {
    Sale(SaleId),
    Withdrawal(WithdrawalId),
}

/// An immutable, signed record of one balance-affecting event.
///
/// Credits are positive, debits negative. Entries are created once and never
/// mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub photographer_id: PhotographerId,
    pub kind: EntryKind,
    pub amount: Money,
    pub related: EntryRef,
    pub created_at: DateTime<Utc>,
}
