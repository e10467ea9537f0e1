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

//! Payout dispatch with a bounded timeout.
//!
//! One `send` is exactly one transfer attempt. Retries are explicit admin
//! actions, never automatic; an automatic retry after a timeout could pay
//! the same withdrawal twice.

use crate::money::Money;
use crate::provider::{PaymentProvider, TransferOutcome};
use crossbeam::channel::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Wraps the payment provider call with a hard timeout.
///
/// The provider runs on a worker thread; the caller waits at most `timeout`
/// for its answer. A timeout is reported as [`TransferOutcome::Unknown`]:
/// the transfer may still land, so the caller must not treat it as a
/// rejection.
pub struct PayoutDispatcher {
    provider: Arc<dyn PaymentProvider>,
    timeout: Duration,
}

impl PayoutDispatcher {
    pub fn new(provider: Arc<dyn PaymentProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Performs a single transfer attempt, bounded by the configured timeout.
    pub fn send(&self, payout_key: &str, amount: Money) -> TransferOutcome {
        let (tx, rx) = channel::bounded(1);
        let provider = Arc::clone(&self.provider);
        let key = payout_key.to_owned();

        thread::spawn(move || {
            // The receiver may be gone after a timeout; the late result is
            // discarded and the request stays pending for reconciliation.
            let _ = tx.send(provider.transfer(&key, amount));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "payout transfer timed out");
                TransferOutcome::Unknown
            }
            Err(RecvTimeoutError::Disconnected) => TransferOutcome::Unknown,
        }
    }
}
