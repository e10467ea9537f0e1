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

//! Withdrawal requests (saques) and their state machine.
//!
//! Lifecycle:
//!
//! ```text
//! PENDENTE ──dispatch accepted──► PROCESSADO
//!     │ │
//!     │ └──dispatch rejected────► FALHOU ──reprocess──► PENDENTE
//!     │                             │ │
//!     │                             │ └──confirm manual──► APROVADO
//!     └──────────cancel──────────► CANCELADO ◄──cancel────┘
//! ```
//!
//! `PROCESSADO`, `APROVADO`, and `CANCELADO` are terminal. A dispatch with an
//! unknown provider outcome leaves the request `PENDENTE` and flagged for
//! manual review; no funds move until an operator resolves it.

use crate::base::{PhotographerId, WithdrawalId};
use crate::error::LedgerError;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a withdrawal request.
///
/// The names follow the marketplace's domain language (Portuguese).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    /// Created and debited; awaiting provider dispatch or manual review.
    Pendente,
    /// Provider accepted the transfer.
    Processado,
    /// Operator confirmed an out-of-band manual transfer.
    Aprovado,
    /// Provider rejected the transfer; funds were returned to available.
    Falhou,
    /// Cancelled by an operator.
    Cancelado,
}

impl WithdrawalStatus {
    /// Terminal states permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processado | Self::Aprovado | Self::Cancelado)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pendente => "PENDENTE",
            Self::Processado => "PROCESSADO",
            Self::Aprovado => "APROVADO",
            Self::Falhou => "FALHOU",
            Self::Cancelado => "CANCELADO",
        };
        write!(f, "{name}")
    }
}

/// A photographer's instruction to pay out an amount to a verified
/// destination key.
///
/// The amount is fixed at creation and never changes. Requests are never
/// deleted; terminal requests remain for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub photographer_id: PhotographerId,
    pub amount: Money,
    /// Verified destination key for the instant transfer (e.g. a
    /// tax-id-bound PIX key).
    pub payout_key: String,
    pub status: WithdrawalStatus,
    /// Provider's reference for an accepted transfer.
    pub provider_ref: Option<String>,
    /// Provider's rejection reason, when the last dispatch failed.
    pub failure_reason: Option<String>,
    /// Set when a dispatch ended with an unknown provider outcome; an
    /// operator must reconcile against the provider statement.
    pub needs_review: bool,
    /// Operator-facing annotation (observação).
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the request reached a terminal state.
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    pub(crate) fn new(
        id: WithdrawalId,
        photographer_id: PhotographerId,
        amount: Money,
        payout_key: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            photographer_id,
            amount,
            payout_key,
            status: WithdrawalStatus::Pendente,
            provider_ref: None,
            failure_reason: None,
            needs_review: false,
            note: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    fn guard(&self, allowed: WithdrawalStatus, action: &'static str) -> Result<(), LedgerError> {
        if self.status == allowed {
            Ok(())
        } else {
            Err(LedgerError::InvalidStateTransition {
                from: self.status,
                action,
            })
        }
    }

    /// Pendente -> Processado (provider accepted).
    pub(crate) fn mark_processed(
        &mut self,
        reference: String,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.guard(WithdrawalStatus::Pendente, "process")?;
        self.status = WithdrawalStatus::Processado;
        self.provider_ref = Some(reference);
        self.failure_reason = None;
        self.needs_review = false;
        self.note = Some("processed via instant transfer".to_owned());
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Pendente -> Falhou (provider rejected; the caller reverses the debit).
    pub(crate) fn mark_failed(
        &mut self,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.guard(WithdrawalStatus::Pendente, "fail")?;
        self.status = WithdrawalStatus::Falhou;
        self.failure_reason = Some(reason);
        self.needs_review = false;
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Stays Pendente; flags the request for manual reconciliation after an
    /// unknown provider outcome. No failure reason is set.
    pub(crate) fn mark_review(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.guard(WithdrawalStatus::Pendente, "flag for review")?;
        self.needs_review = true;
        self.note = Some("provider outcome unknown; awaiting reconciliation".to_owned());
        self.updated_at = now;
        Ok(())
    }

    /// Falhou -> Pendente (admin reprocess; the caller re-debits first).
    pub(crate) fn mark_reprocessing(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.guard(WithdrawalStatus::Falhou, "reprocess")?;
        self.status = WithdrawalStatus::Pendente;
        self.failure_reason = None;
        self.needs_review = false;
        self.note = None;
        self.processed_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Pendente or Falhou -> Cancelado. The caller reverses the debit only
    /// when cancelling from Pendente; a Falhou request was already reversed.
    pub(crate) fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        match self.status {
            WithdrawalStatus::Pendente | WithdrawalStatus::Falhou => {
                self.status = WithdrawalStatus::Cancelado;
                self.note = Some("cancelled by administrator".to_owned());
                self.processed_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
            from => Err(LedgerError::InvalidStateTransition {
                from,
                action: "cancel",
            }),
        }
    }

    /// Falhou -> Aprovado (operator transferred the funds outside the
    /// automated rail; the caller re-debits first).
    pub(crate) fn mark_confirmed_manual(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.guard(WithdrawalStatus::Falhou, "confirm manually")?;
        self.status = WithdrawalStatus::Aprovado;
        self.failure_reason = None;
        self.needs_review = false;
        self.note = Some("confirmed as manual transfer".to_owned());
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: WithdrawalStatus) -> WithdrawalRequest {
        let mut r = WithdrawalRequest::new(
            WithdrawalId(1),
            PhotographerId(1),
            Money::from_centavos(10_000),
            "123.456.789-00".to_owned(),
            Utc::now(),
        );
        r.status = status;
        r
    }

    #[test]
    fn process_only_from_pendente() {
        let now = Utc::now();
        for status in [
            WithdrawalStatus::Processado,
            WithdrawalStatus::Aprovado,
            WithdrawalStatus::Falhou,
            WithdrawalStatus::Cancelado,
        ] {
            let mut r = request(status);
            assert_eq!(
                r.mark_processed("REF".into(), now),
                Err(LedgerError::InvalidStateTransition {
                    from: status,
                    action: "process",
                })
            );
        }

        let mut r = request(WithdrawalStatus::Pendente);
        r.mark_processed("REF".into(), now).unwrap();
        assert_eq!(r.status, WithdrawalStatus::Processado);
        assert_eq!(r.provider_ref.as_deref(), Some("REF"));
        assert_eq!(r.processed_at, Some(now));
    }

    #[test]
    fn fail_records_reason() {
        let mut r = request(WithdrawalStatus::Pendente);
        r.mark_failed("invalid key".into(), Utc::now()).unwrap();
        assert_eq!(r.status, WithdrawalStatus::Falhou);
        assert_eq!(r.failure_reason.as_deref(), Some("invalid key"));
    }

    #[test]
    fn review_flag_keeps_pendente_without_failure_reason() {
        let mut r = request(WithdrawalStatus::Pendente);
        r.mark_review(Utc::now()).unwrap();
        assert_eq!(r.status, WithdrawalStatus::Pendente);
        assert!(r.needs_review);
        assert_eq!(r.failure_reason, None);
        assert_eq!(r.processed_at, None);
    }

    #[test]
    fn reprocess_only_from_falhou() {
        let mut r = request(WithdrawalStatus::Falhou);
        r.failure_reason = Some("invalid key".into());
        r.mark_reprocessing(Utc::now()).unwrap();
        assert_eq!(r.status, WithdrawalStatus::Pendente);
        assert_eq!(r.failure_reason, None);

        let mut r = request(WithdrawalStatus::Pendente);
        assert!(r.mark_reprocessing(Utc::now()).is_err());
    }

    #[test]
    fn cancel_from_pendente_and_falhou_only() {
        for status in [WithdrawalStatus::Pendente, WithdrawalStatus::Falhou] {
            let mut r = request(status);
            r.mark_cancelled(Utc::now()).unwrap();
            assert_eq!(r.status, WithdrawalStatus::Cancelado);
        }
        for status in [
            WithdrawalStatus::Processado,
            WithdrawalStatus::Aprovado,
            WithdrawalStatus::Cancelado,
        ] {
            let mut r = request(status);
            assert_eq!(
                r.mark_cancelled(Utc::now()),
                Err(LedgerError::InvalidStateTransition {
                    from: status,
                    action: "cancel",
                })
            );
        }
    }

    #[test]
    fn confirm_manual_only_from_falhou() {
        let mut r = request(WithdrawalStatus::Falhou);
        r.mark_confirmed_manual(Utc::now()).unwrap();
        assert_eq!(r.status, WithdrawalStatus::Aprovado);

        let mut r = request(WithdrawalStatus::Pendente);
        assert!(r.mark_confirmed_manual(Utc::now()).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(WithdrawalStatus::Processado.is_terminal());
        assert!(WithdrawalStatus::Aprovado.is_terminal());
        assert!(WithdrawalStatus::Cancelado.is_terminal());
        assert!(!WithdrawalStatus::Pendente.is_terminal());
        assert!(!WithdrawalStatus::Falhou.is_terminal());
    }
}
