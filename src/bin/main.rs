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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use payout_ledger_rs::{
    LedgerEngine, LedgerError, Money, PaymentProvider, PhotographerId, SaleId, ScriptedProvider,
    TransferOutcome, WithdrawalId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Payout Ledger - Replay ledger operation CSV files
///
/// Reads ledger operations from a CSV file, replays them against a fresh
/// ledger with scripted provider outcomes, and prints the final balances
/// to stdout.
#[derive(Parser, Debug)]
#[command(name = "payout-ledger-rs")]
#[command(about = "Replays ledger operation CSVs and prints final balances", long_about = None)]
struct Args {
    /// Path to CSV file with ledger operations
    ///
    /// Expected format: op,photographer,reference,amount,detail
    /// Example: cargo run -- operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match replay_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_balances(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, photographer, reference, amount, detail`
///
/// `reference` is a replay-local number: the sale id for `sale`/`release`,
/// or a caller-chosen handle that names a withdrawal across rows.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    photographer: Option<u64>,
    reference: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    detail: Option<String>,
}

/// Parses a scripted provider outcome from the `detail` column:
/// `accepted=REF`, `rejected=reason`, or `unknown`.
fn parse_outcome(detail: &str) -> Option<TransferOutcome> {
    if detail == "unknown" {
        return Some(TransferOutcome::Unknown);
    }
    if let Some(reference) = detail.strip_prefix("accepted=") {
        return Some(TransferOutcome::Accepted {
            reference: reference.to_owned(),
        });
    }
    if let Some(reason) = detail.strip_prefix("rejected=") {
        return Some(TransferOutcome::Rejected {
            reason: reason.to_owned(),
        });
    }
    None
}

/// Replays operations from a CSV reader against a fresh engine.
///
/// Malformed rows and failed operations are logged and skipped; the replay
/// continues with the next row. A dispatch that ends with an unknown
/// provider outcome is a normal pending result, not a replay failure.
fn replay_operations<R: Read>(reader: R) -> Result<LedgerEngine, csv::Error> {
    let provider = Arc::new(ScriptedProvider::new());
    let engine = LedgerEngine::new(Arc::clone(&provider) as Arc<dyn PaymentProvider>);

    // Maps the CSV's withdrawal handles to engine-assigned ids.
    let mut handles: HashMap<u64, WithdrawalId> = HashMap::new();

    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    for (line, result) in csv_reader.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed row");
                continue;
            }
        };
        if let Err(error) = apply_record(&engine, &provider, &mut handles, &record) {
            match error {
                // Pending-for-reconciliation is the expected unknown-outcome
                // result; everything else is a rejected row.
                LedgerError::ProviderUnknownOutcome => {
                    warn!(line, op = %record.op, "withdrawal left pending for reconciliation");
                }
                error => {
                    warn!(line, op = %record.op, %error, "operation rejected");
                }
            }
        }
    }

    Ok(engine)
}

fn apply_record(
    engine: &LedgerEngine,
    provider: &ScriptedProvider,
    handles: &mut HashMap<u64, WithdrawalId>,
    record: &CsvRecord,
) -> Result<(), LedgerError> {
    let photographer = record.photographer.map(PhotographerId);
    let reference = record.reference;
    let amount = record.amount.map(Money::from_decimal);

    match record.op.to_lowercase().as_str() {
        "sale" => {
            let (Some(photographer), Some(sale), Some(amount)) = (photographer, reference, amount)
            else {
                return Err(LedgerError::InvalidAmount);
            };
            engine.credit_sale(photographer, SaleId(sale), amount)?;
        }
        "release" => {
            let (Some(photographer), Some(sale)) = (photographer, reference) else {
                return Err(LedgerError::SaleCreditNotFound);
            };
            engine.release_held(photographer, SaleId(sale))?;
        }
        "withdraw" => {
            let (Some(photographer), Some(handle), Some(amount), Some(key)) =
                (photographer, reference, amount, record.detail.as_deref())
            else {
                return Err(LedgerError::MissingPayoutKey);
            };
            let request = engine.create_withdrawal(photographer, amount, key)?;
            handles.insert(handle, request.id);
        }
        op @ ("dispatch" | "approve" | "reprocess") => {
            let id = reference
                .and_then(|handle| handles.get(&handle).copied())
                .ok_or(LedgerError::WithdrawalNotFound)?;
            if let Some(outcome) = record.detail.as_deref().and_then(parse_outcome) {
                provider.push(outcome);
            }
            match op {
                "dispatch" => engine.dispatch(id)?,
                "approve" => engine.admin_approve(id)?,
                _ => engine.admin_reprocess(id)?,
            };
        }
        "cancel" => {
            let id = reference
                .and_then(|handle| handles.get(&handle).copied())
                .ok_or(LedgerError::WithdrawalNotFound)?;
            engine.admin_cancel(id)?;
        }
        "confirm_manual" => {
            let id = reference
                .and_then(|handle| handles.get(&handle).copied())
                .ok_or(LedgerError::WithdrawalNotFound)?;
            engine.admin_confirm_manual(id)?;
        }
        other => {
            warn!(op = other, "unknown operation");
        }
    }
    Ok(())
}

/// Writes final balances as CSV: `photographer,available,held,total`.
fn write_balances<W: Write>(engine: &LedgerEngine, output: W) -> Result<(), csv::Error> {
    let mut writer = Writer::from_writer(output);
    for snapshot in engine.balances() {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;
    Ok(())
}
