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

//! Fire-and-forget notifications to the photographer.
//!
//! Delivery failures are logged and swallowed by the engine; they never roll
//! back a money-moving operation that already committed.

use crate::withdrawal::WithdrawalRequest;
use thiserror::Error;

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound channel telling a photographer that their withdrawal changed
/// state (processed, failed, cancelled, ...).
pub trait Notifier: Send + Sync {
    fn withdrawal_update(&self, request: &WithdrawalRequest) -> Result<(), NotifyError>;
}

/// Notifier that drops everything. Default for engines without an outbound
/// channel wired up.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn withdrawal_update(&self, _request: &WithdrawalRequest) -> Result<(), NotifyError> {
        Ok(())
    }
}
