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

//! Engine public API integration tests: withdrawal lifecycle, provider
//! outcomes, and admin reconciliation.

use chrono::{Duration, Utc};
use payout_ledger_rs::{
    EntryKind, LedgerConfig, LedgerEngine, LedgerError, Money, Notifier, NotifyError,
    PaymentProvider, PhotographerId, SaleId, ScriptedProvider, TransferOutcome, WithdrawalRequest,
    WithdrawalStatus,
};
use std::sync::Arc;

const PHOTOGRAPHER: PhotographerId = PhotographerId(1);
const PIX_KEY: &str = "123.456.789-00";

fn money(centavos: i64) -> Money {
    Money::from_centavos(centavos)
}

/// Engine plus its scripted provider, with `available` already funded.
fn funded_engine(available_centavos: i64) -> (LedgerEngine, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new());
    let engine = LedgerEngine::new(Arc::clone(&provider) as Arc<dyn PaymentProvider>);
    engine
        .credit_sale(PHOTOGRAPHER, SaleId(1_000), money(available_centavos))
        .unwrap();
    engine.release_held(PHOTOGRAPHER, SaleId(1_000)).unwrap();
    (engine, provider)
}

fn accepted(reference: &str) -> TransferOutcome {
    TransferOutcome::Accepted {
        reference: reference.to_owned(),
    }
}

fn rejected(reason: &str) -> TransferOutcome {
    TransferOutcome::Rejected {
        reason: reason.to_owned(),
    }
}

// === Creation validation ===

#[test]
fn create_debits_available_and_records_pendente() {
    let (engine, _) = funded_engine(10_000);

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pendente);
    assert_eq!(request.amount, money(5_000));
    assert_eq!(request.payout_key, PIX_KEY);

    let balance = engine.balance(PHOTOGRAPHER).unwrap();
    assert_eq!(balance.available, money(5_000));

    let debits: Vec<_> = engine
        .entries(PHOTOGRAPHER)
        .into_iter()
        .filter(|e| e.kind == EntryKind::WithdrawalDebit)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].amount, -money(5_000));
}

#[test]
fn create_rejects_below_minimum() {
    let (engine, _) = funded_engine(10_000);

    // Default platform minimum is 50.00.
    let result = engine.create_withdrawal(PHOTOGRAPHER, money(4_999), PIX_KEY);
    assert_eq!(
        result,
        Err(LedgerError::BelowMinimum {
            minimum: money(5_000)
        })
    );
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));
}

#[test]
fn create_rejects_non_positive_amount() {
    let (engine, _) = funded_engine(10_000);
    assert_eq!(
        engine.create_withdrawal(PHOTOGRAPHER, Money::ZERO, PIX_KEY),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        engine.create_withdrawal(PHOTOGRAPHER, money(-5_000), PIX_KEY),
        Err(LedgerError::InvalidAmount)
    );
}

#[test]
fn create_rejects_blank_payout_key() {
    let (engine, _) = funded_engine(10_000);
    assert_eq!(
        engine.create_withdrawal(PHOTOGRAPHER, money(5_000), "  "),
        Err(LedgerError::MissingPayoutKey)
    );
}

#[test]
fn create_rejects_insufficient_funds_without_side_effects() {
    let (engine, _) = funded_engine(10_000);
    let entries_before = engine.entries(PHOTOGRAPHER).len();

    let result = engine.create_withdrawal(PHOTOGRAPHER, money(10_001), PIX_KEY);
    assert_eq!(result, Err(LedgerError::InsufficientFunds));
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));
    assert_eq!(engine.entries(PHOTOGRAPHER).len(), entries_before);
}

#[test]
fn create_without_balance_row_fails() {
    let provider = Arc::new(ScriptedProvider::new());
    let engine = LedgerEngine::new(provider);
    assert_eq!(
        engine.create_withdrawal(PhotographerId(99), money(5_000), PIX_KEY),
        Err(LedgerError::BalanceNotFound)
    );
}

// === Dispatch outcomes ===

#[test]
fn happy_path_dispatch_processes_request() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(accepted("PIX-REF-1"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let request = engine.dispatch(request.id).unwrap();

    assert_eq!(request.status, WithdrawalStatus::Processado);
    assert_eq!(request.provider_ref.as_deref(), Some("PIX-REF-1"));
    assert!(request.processed_at.is_some());

    // The debit stands; no reversal was written.
    let balance = engine.balance(PHOTOGRAPHER).unwrap();
    assert_eq!(balance.available, money(5_000));
    assert!(
        engine
            .entries(PHOTOGRAPHER)
            .iter()
            .all(|e| e.kind != EntryKind::WithdrawalReversal)
    );
}

#[test]
fn rejected_dispatch_reverses_debit() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("invalid key"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let request = engine.dispatch(request.id).unwrap();

    assert_eq!(request.status, WithdrawalStatus::Falhou);
    assert_eq!(request.failure_reason.as_deref(), Some("invalid key"));
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));

    let reversals: Vec<_> = engine
        .entries(PHOTOGRAPHER)
        .into_iter()
        .filter(|e| e.kind == EntryKind::WithdrawalReversal)
        .collect();
    assert_eq!(reversals.len(), 1);
    assert_eq!(reversals[0].amount, money(5_000));
}

#[test]
fn unknown_outcome_leaves_request_pending_and_debited() {
    let (engine, _provider) = funded_engine(10_000);
    // No scripted outcome: the provider behaves as unreachable.

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let result = engine.dispatch(request.id);
    assert_eq!(result, Err(LedgerError::ProviderUnknownOutcome));

    let request = engine.withdrawal(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pendente);
    assert!(request.needs_review);
    assert_eq!(request.failure_reason, None);

    // The money's fate is unknown: no reversal.
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}

#[test]
fn dispatch_twice_fails_on_terminal_request() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(accepted("REF"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();

    assert_eq!(
        engine.dispatch(request.id),
        Err(LedgerError::InvalidStateTransition {
            from: WithdrawalStatus::Processado,
            action: "dispatch",
        })
    );
    // Balance untouched by the rejected transition.
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}

#[test]
fn dispatch_unknown_id_fails() {
    let (engine, _) = funded_engine(10_000);
    assert_eq!(
        engine.dispatch(payout_ledger_rs::WithdrawalId(42)),
        Err(LedgerError::WithdrawalNotFound)
    );
}

// === Admin actions ===

#[test]
fn admin_approve_runs_dispatch_flow() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(accepted("REF"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let request = engine.admin_approve(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Processado);
}

#[test]
fn admin_approve_rejects_non_pendente() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("invalid key"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();

    assert_eq!(
        engine.admin_approve(request.id),
        Err(LedgerError::InvalidStateTransition {
            from: WithdrawalStatus::Falhou,
            action: "approve",
        })
    );
}

#[test]
fn reprocess_after_failure_re_debits_and_dispatches() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("temporary outage"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));

    provider.push(accepted("REF-2"));
    let request = engine.admin_reprocess(request.id).unwrap();

    assert_eq!(request.status, WithdrawalStatus::Processado);
    assert_eq!(request.provider_ref.as_deref(), Some("REF-2"));
    assert_eq!(request.failure_reason, None);
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}

#[test]
fn reprocess_fails_without_funds() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("temporary outage"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(8_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();

    // The reversal restored 100.00; drain it with a second withdrawal.
    engine
        .create_withdrawal(PHOTOGRAPHER, money(6_000), PIX_KEY)
        .unwrap();

    assert_eq!(
        engine.admin_reprocess(request.id),
        Err(LedgerError::InsufficientFunds)
    );
    let request = engine.withdrawal(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Falhou);
}

#[test]
fn reprocess_requires_falhou() {
    let (engine, _) = funded_engine(10_000);
    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    assert_eq!(
        engine.admin_reprocess(request.id),
        Err(LedgerError::InvalidStateTransition {
            from: WithdrawalStatus::Pendente,
            action: "reprocess",
        })
    );
}

#[test]
fn cancel_pendente_reverses_debit() {
    let (engine, _) = funded_engine(10_000);
    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();

    let request = engine.admin_cancel(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Cancelado);
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));
}

#[test]
fn cancel_falhou_does_not_double_reverse() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("invalid key"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));

    let request = engine.admin_cancel(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Cancelado);
    // Still exactly one reversal; the balance did not grow.
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));
    let reversals = engine
        .entries(PHOTOGRAPHER)
        .into_iter()
        .filter(|e| e.kind == EntryKind::WithdrawalReversal)
        .count();
    assert_eq!(reversals, 1);
}

#[test]
fn cancel_terminal_request_fails() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(accepted("REF"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();

    assert_eq!(
        engine.admin_cancel(request.id),
        Err(LedgerError::InvalidStateTransition {
            from: WithdrawalStatus::Processado,
            action: "cancel",
        })
    );
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}

#[test]
fn confirm_manual_re_debits_before_approving() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("rail unavailable"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();
    // Failure reversed the debit.
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(10_000));

    let request = engine.admin_confirm_manual(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Aprovado);
    // The photographer is charged for the manual transfer.
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}

#[test]
fn confirm_manual_fails_without_funds_and_changes_nothing() {
    let (engine, provider) = funded_engine(10_000);
    provider.push(rejected("rail unavailable"));

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(8_000), PIX_KEY)
        .unwrap();
    engine.dispatch(request.id).unwrap();

    // Drain the restored balance below the failed amount.
    engine
        .create_withdrawal(PHOTOGRAPHER, money(6_000), PIX_KEY)
        .unwrap();

    assert_eq!(
        engine.admin_confirm_manual(request.id),
        Err(LedgerError::InsufficientFunds)
    );
    let request = engine.withdrawal(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Falhou);
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(4_000));
}

#[test]
fn confirm_manual_requires_falhou() {
    let (engine, _) = funded_engine(10_000);
    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    assert_eq!(
        engine.admin_confirm_manual(request.id),
        Err(LedgerError::InvalidStateTransition {
            from: WithdrawalStatus::Pendente,
            action: "confirm manually",
        })
    );
}

// === Sale credits and hold release ===

#[test]
fn duplicate_sale_event_credits_once() {
    let provider = Arc::new(ScriptedProvider::new());
    let engine = LedgerEngine::new(provider);

    assert!(engine.credit_sale(PHOTOGRAPHER, SaleId(1), money(7_500)).unwrap());
    assert!(!engine.credit_sale(PHOTOGRAPHER, SaleId(1), money(7_500)).unwrap());

    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().held, money(7_500));
    assert_eq!(engine.entries(PHOTOGRAPHER).len(), 1);
}

#[test]
fn release_matured_sweep_is_idempotent() {
    let provider = Arc::new(ScriptedProvider::new());
    let config = LedgerConfig {
        hold_period: Duration::days(0),
        ..LedgerConfig::default()
    };
    let engine = LedgerEngine::with_config(provider, config);

    engine.credit_sale(PHOTOGRAPHER, SaleId(1), money(3_000)).unwrap();
    engine.credit_sale(PHOTOGRAPHER, SaleId(2), money(2_000)).unwrap();

    let released = engine.release_matured(PHOTOGRAPHER, Utc::now()).unwrap();
    assert_eq!(released, vec![SaleId(1), SaleId(2)]);
    let balance = engine.balance(PHOTOGRAPHER).unwrap();
    assert_eq!(balance.available, money(5_000));
    assert_eq!(balance.held, Money::ZERO);

    // The sweep fires again: nothing moves.
    let released = engine.release_matured(PHOTOGRAPHER, Utc::now()).unwrap();
    assert!(released.is_empty());
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}

#[test]
fn unmatured_credits_stay_held() {
    let provider = Arc::new(ScriptedProvider::new());
    let engine = LedgerEngine::new(provider);

    engine.credit_sale(PHOTOGRAPHER, SaleId(1), money(3_000)).unwrap();
    // Default hold period is 14 days; the credit is brand new.
    let released = engine.release_matured(PHOTOGRAPHER, Utc::now()).unwrap();
    assert!(released.is_empty());
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().held, money(3_000));
}

// === Reads ===

#[test]
fn withdrawals_list_newest_first_with_limit() {
    let (engine, _) = funded_engine(30_000);
    let first = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let second = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let third = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();

    let listed = engine.withdrawals(PHOTOGRAPHER, 2);
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, third.id);
    assert_eq!(listed[1].id, second.id);

    let all = engine.withdrawals(PHOTOGRAPHER, 20);
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].id, first.id);
}

#[test]
fn provider_balance_surfaces_float() {
    let (engine, provider) = funded_engine(10_000);

    assert_eq!(engine.provider_balance(), Err(LedgerError::ProviderUnknownOutcome));
    provider.set_balance(money(1_000_000));
    assert_eq!(engine.provider_balance(), Ok(money(10_000_00)));
}

// === Notifications ===

/// Notifier that always fails, to prove failures never roll back state.
struct BrokenNotifier;

impl Notifier for BrokenNotifier {
    fn withdrawal_update(&self, _request: &WithdrawalRequest) -> Result<(), NotifyError> {
        Err(NotifyError("smtp down".into()))
    }
}

#[test]
fn notification_failure_does_not_roll_back() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push(accepted("REF"));
    let engine =
        LedgerEngine::new(Arc::clone(&provider) as Arc<dyn PaymentProvider>)
            .with_notifier(Arc::new(BrokenNotifier));

    engine.credit_sale(PHOTOGRAPHER, SaleId(1), money(10_000)).unwrap();
    engine.release_held(PHOTOGRAPHER, SaleId(1)).unwrap();

    let request = engine
        .create_withdrawal(PHOTOGRAPHER, money(5_000), PIX_KEY)
        .unwrap();
    let request = engine.dispatch(request.id).unwrap();
    assert_eq!(request.status, WithdrawalStatus::Processado);
    assert_eq!(engine.balance(PHOTOGRAPHER).unwrap().available, money(5_000));
}
