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

//! # Payout Ledger
//!
//! Balance and payout ledger for a photo marketplace: photographers earn
//! money from sales and withdraw it (a "saque") over an instant-payment rail.
//! This crate tracks each photographer's available/held funds, validates and
//! records withdrawal requests, drives them through an external payment
//! provider, and reconciles provider outcomes back into the ledger.
//!
//! ## Core Components
//!
//! - [`LedgerEngine`]: entry point for every money-moving operation
//! - [`BalanceAccount`]: per-photographer balance row with its audit trail
//! - [`WithdrawalRequest`]: withdrawal state machine (PENDENTE → PROCESSADO /
//!   FALHOU / CANCELADO / APROVADO)
//! - [`PaymentProvider`]: seam to the external instant-payment rail
//! - [`LedgerError`]: error taxonomy for validation and reconciliation
//!
//! ## Example
//!
//! ```
//! use payout_ledger_rs::{
//!     LedgerEngine, Money, PhotographerId, SaleId, ScriptedProvider, TransferOutcome,
//!     WithdrawalStatus,
//! };
//! use std::sync::Arc;
//!
//! let provider = Arc::new(ScriptedProvider::new());
//! provider.push(TransferOutcome::Accepted { reference: "E2E-1".into() });
//!
//! let engine = LedgerEngine::new(provider);
//! let photographer = PhotographerId(1);
//!
//! // A sale credits the held balance; the clearing sweep releases it.
//! engine.credit_sale(photographer, SaleId(10), Money::from_centavos(20_000)).unwrap();
//! engine.release_held(photographer, SaleId(10)).unwrap();
//!
//! // The photographer withdraws half of it.
//! let saque = engine
//!     .create_withdrawal(photographer, Money::from_centavos(10_000), "123.456.789-00")
//!     .unwrap();
//! let saque = engine.dispatch(saque.id).unwrap();
//!
//! assert_eq!(saque.status, WithdrawalStatus::Processado);
//! assert_eq!(saque.provider_ref.as_deref(), Some("E2E-1"));
//! assert_eq!(engine.balance(photographer).unwrap().available, Money::from_centavos(10_000));
//! ```
//!
//! ## Concurrency
//!
//! Balance rows are locked per photographer: operations on different
//! photographers run in parallel, operations on the same photographer
//! serialize. Withdrawal transitions are atomic read-modify-writes on the
//! request row, so racing admin actions cannot both succeed from the same
//! source state.

pub mod account;
mod base;
mod dispatcher;
mod engine;
mod entry;
pub mod error;
mod money;
mod notify;
mod provider;
mod withdrawal;

pub use account::{BalanceAccount, BalanceSnapshot};
pub use base::{EntryId, PhotographerId, SaleId, WithdrawalId};
pub use dispatcher::PayoutDispatcher;
pub use engine::{LedgerConfig, LedgerEngine};
pub use entry::{EntryKind, EntryRef, LedgerEntry};
pub use error::LedgerError;
pub use money::Money;
pub use notify::{Notifier, NotifyError, NoopNotifier};
pub use provider::{PaymentProvider, ScriptedProvider, TransferOutcome};
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus};
