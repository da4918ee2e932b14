//! Ledger verification
//!
//! Recomputes every balance from its opening amount and the entries the
//! account owns, and checks that each transfer is a matched pair. Runs against
//! a single commit boundary so concurrent transfers cannot produce false
//! alarms.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{Account, AccountId, Money, ReferenceNumber, Transaction};
use crate::storage::{LedgerState, Storage};

/// A single inconsistency found in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Opening balance plus owned entries does not add up to the balance
    BalanceMismatch {
        account_number: String,
        expected: Money,
        actual: Money,
    },
    /// The newest entry records a different balance than the account holds
    StaleBalanceAfter {
        account_number: String,
        recorded: Money,
        actual: Money,
    },
    /// A transfer reference without exactly one debit and one credit
    UnpairedTransfer {
        reference_number: ReferenceNumber,
        legs: usize,
        reason: String,
    },
    /// An entry owned by an account that does not exist
    OrphanEntry {
        reference_number: ReferenceNumber,
        account_id: AccountId,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::BalanceMismatch {
                account_number,
                expected,
                actual,
            } => write!(
                f,
                "{}: entries add up to {} but balance is {}",
                account_number, expected, actual
            ),
            Discrepancy::StaleBalanceAfter {
                account_number,
                recorded,
                actual,
            } => write!(
                f,
                "{}: newest entry records {} but balance is {}",
                account_number, recorded, actual
            ),
            Discrepancy::UnpairedTransfer {
                reference_number,
                legs,
                reason,
            } => write!(f, "{} ({} legs): {}", reference_number, legs, reason),
            Discrepancy::OrphanEntry {
                reference_number,
                account_id,
            } => write!(
                f,
                "{}: entry owned by unknown account {}",
                reference_number, account_id
            ),
        }
    }
}

/// Result of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub accounts_checked: usize,
    pub entries_checked: usize,
    pub as_of_seq: u64,
    pub discrepancies: Vec<Discrepancy>,
}

impl VerificationReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Service for checking ledger integrity
pub struct VerificationService<'a> {
    storage: &'a Storage,
}

impl<'a> VerificationService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn verify(&self) -> VerificationReport {
        let report = verify_state(&self.storage.consistent_state());

        if report.is_consistent() {
            tracing::info!(
                accounts = report.accounts_checked,
                entries = report.entries_checked,
                as_of_seq = report.as_of_seq,
                "ledger verified"
            );
        } else {
            tracing::warn!(
                discrepancies = report.discrepancies.len(),
                as_of_seq = report.as_of_seq,
                "ledger verification found discrepancies"
            );
        }
        report
    }
}

/// Check a ledger state; entries must be in commit order
pub fn verify_state(state: &LedgerState) -> VerificationReport {
    let mut discrepancies = Vec::new();

    let mut owned: BTreeMap<AccountId, Vec<&Transaction>> = BTreeMap::new();
    for entry in &state.entries {
        owned.entry(entry.account_id).or_default().push(entry);
    }

    for account in &state.accounts {
        let entries = owned.remove(&account.id).unwrap_or_default();
        check_account(account, &entries, &mut discrepancies);
    }
    for (account_id, entries) in owned {
        for entry in entries {
            discrepancies.push(Discrepancy::OrphanEntry {
                reference_number: entry.reference_number.clone(),
                account_id,
            });
        }
    }

    let mut by_reference: BTreeMap<&ReferenceNumber, Vec<&Transaction>> = BTreeMap::new();
    for entry in state.entries.iter().filter(|e| e.is_transfer()) {
        by_reference
            .entry(&entry.reference_number)
            .or_default()
            .push(entry);
    }
    for (reference, legs) in by_reference {
        if let Some(reason) = check_pair(&legs) {
            discrepancies.push(Discrepancy::UnpairedTransfer {
                reference_number: reference.clone(),
                legs: legs.len(),
                reason,
            });
        }
    }

    VerificationReport {
        accounts_checked: state.accounts.len(),
        entries_checked: state.entries.len(),
        as_of_seq: state.as_of_seq,
        discrepancies,
    }
}

fn check_account(account: &Account, entries: &[&Transaction], out: &mut Vec<Discrepancy>) {
    let expected = entries
        .iter()
        .try_fold(account.opening_balance, |sum, e| sum.checked_add(e.amount));

    match expected {
        Some(expected) if expected == account.balance() => {}
        Some(expected) => out.push(Discrepancy::BalanceMismatch {
            account_number: account.account_number.clone(),
            expected,
            actual: account.balance(),
        }),
        None => out.push(Discrepancy::BalanceMismatch {
            account_number: account.account_number.clone(),
            expected: Money::zero(),
            actual: account.balance(),
        }),
    }

    if let Some(newest) = entries.last() {
        if newest.balance_after_transaction != account.balance() {
            out.push(Discrepancy::StaleBalanceAfter {
                account_number: account.account_number.clone(),
                recorded: newest.balance_after_transaction,
                actual: account.balance(),
            });
        }
    }
}

fn check_pair(legs: &[&Transaction]) -> Option<String> {
    match legs {
        [a, b] => {
            let (debit, credit) = if a.is_debit() { (*a, *b) } else { (*b, *a) };
            Transaction::validate_pair(debit, credit)
                .err()
                .map(|e| e.to_string())
        }
        _ => Some("expected exactly one debit and one credit".into()),
    }
}
