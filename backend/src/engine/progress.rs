//! Loan Progress Tracker
//!
//! Recomputes a loan's outstanding balance, paid weeks and status after a
//! payment has been stored.
//!
//! # Progression Rules
//!
//! ```text
//! new_balance   = max(0, outstanding_balance - amount_paid)
//! week complete = completes_week flag
//!              || (full payment && status == Paid)
//!              || (partial && Σ partial amount_paid for the week >= amortization)
//! paid_weeks    = max(paid_weeks + 1, week_number)   if week complete
//!               = paid_weeks                          otherwise
//! status        = Paid if new_balance == 0 || paid_weeks >= payment_period_weeks
//! ```
//!
//! Overdue and Default are never derived here.
//!
//! # Critical Invariants
//!
//! - **Non-negative balance**: `outstanding_balance >= 0` after every update
//! - **Monotone progress**: `paid_weeks` never decreases, balance never increases
//! - **Single write**: balance, paid weeks and status are persisted together,
//!   compare-and-set against the values that were read

use crate::error::LendingError;
use crate::models::loan::{Loan, LoanProgress, LoanStatus};
use crate::models::payment::Payment;
use crate::store::LendingStore;
use chrono::{DateTime, Utc};
use tracing::debug;

/// How a week came to be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekCompletion {
    /// The payment did not complete its week
    Open,
    /// Caller flag, or a full payment with status Paid
    Explicit,
    /// Accumulated partial payments reached the amortization
    Accumulated,
}

impl WeekCompletion {
    pub fn is_complete(&self) -> bool {
        !matches!(self, WeekCompletion::Open)
    }
}

/// Result of advancing a loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOutcome {
    pub loan_id: u64,
    pub week_number: u32,
    pub previous: LoanProgress,
    pub progress: LoanProgress,
    pub completion: WeekCompletion,
    /// Partial payments flipped to `completes_week`
    pub marked_payments: usize,
}

impl ProgressOutcome {
    /// Loan moved to Paid with this payment
    pub fn paid_off(&self) -> bool {
        self.previous.status != LoanStatus::Paid && self.progress.status == LoanStatus::Paid
    }
}

/// Decide whether `payment` completes its week
///
/// The accumulated check reads the store, so `payment` must already be
/// persisted for its own amount to count.
pub fn week_completion<S: LendingStore + ?Sized>(
    store: &S,
    loan: &Loan,
    payment: &Payment,
) -> Result<WeekCompletion, LendingError> {
    if payment.completes_week() || payment.is_settled_full() {
        return Ok(WeekCompletion::Explicit);
    }

    if payment.is_partial() {
        let total = store.partial_total(loan.id(), payment.week_number())?;
        if total >= loan.amortization() {
            return Ok(WeekCompletion::Accumulated);
        }
    }

    Ok(WeekCompletion::Open)
}

/// Compute the loan's new progress from a completion decision
pub fn next_progress(loan: &Loan, payment: &Payment, completion: WeekCompletion) -> LoanProgress {
    let outstanding_balance = loan
        .outstanding_balance()
        .saturating_sub(payment.amount_paid().max(0))
        .max(0);

    let paid_weeks = if completion.is_complete() {
        loan.paid_weeks().saturating_add(1).max(payment.week_number())
    } else {
        loan.paid_weeks()
    };

    let status = if outstanding_balance == 0 || paid_weeks >= loan.payment_period_weeks() {
        LoanStatus::Paid
    } else {
        loan.status()
    };

    LoanProgress {
        outstanding_balance,
        paid_weeks,
        status,
    }
}

/// Apply a stored payment to its loan
///
/// `loan` is the view read before the payment was stored. The progress write
/// fails with a stale-loan store error if another writer changed the loan's
/// progress in between.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use lending_core::engine::progress::advance_loan;
/// use lending_core::{InMemoryStore, LendingStore, Loan, NewLoan, Payment, PaymentStatus};
///
/// let mut store = InMemoryStore::new();
/// let now = Utc::now();
/// let terms = NewLoan {
///     client_id: 1,
///     control_number: String::new(),
///     total_amount: 2_000,
///     amortization: 500,
///     terms: 4,
///     payment_period_weeks: 4,
///     mode: String::new(),
///     outstanding_balance: None,
///     status: None,
///     amount_release: 2_000,
///     date_of_release: None,
///     due_date: None,
/// };
/// let loan = store
///     .insert_loan(Loan::new(terms, "LN-1".into(), "Weekly".into(), now))
///     .unwrap();
/// let payment = store
///     .insert_payment(
///         Payment::new(loan.id(), 1, 500, 500, now, now).with_status(PaymentStatus::Paid),
///     )
///     .unwrap();
///
/// let outcome = advance_loan(&mut store, &loan, &payment, now).unwrap();
/// assert_eq!(outcome.progress.paid_weeks, 1);
/// assert_eq!(outcome.progress.outstanding_balance, 1_500);
/// ```
pub fn advance_loan<S: LendingStore + ?Sized>(
    store: &mut S,
    loan: &Loan,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<ProgressOutcome, LendingError> {
    let completion = week_completion(store, loan, payment)?;

    let marked_payments = if completion == WeekCompletion::Accumulated {
        store.mark_week_completed(loan.id(), payment.week_number(), now)?
    } else {
        0
    };

    let previous = loan.progress();
    let progress = next_progress(loan, payment, completion);

    store.update_loan_progress(loan.id(), previous, progress, now)?;

    debug!(
        loan_id = loan.id(),
        week = payment.week_number(),
        ?completion,
        balance = progress.outstanding_balance,
        paid_weeks = progress.paid_weeks,
        status = %progress.status,
        "loan progress updated"
    );

    Ok(ProgressOutcome {
        loan_id: loan.id(),
        week_number: payment.week_number(),
        previous,
        progress,
        completion,
        marked_payments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loan::NewLoan;
    use crate::models::payment::PaymentStatus;
    use crate::store::InMemoryStore;

    fn stored_loan(store: &mut InMemoryStore, weeks: u32) -> Loan {
        let terms = NewLoan {
            client_id: 1,
            control_number: String::new(),
            total_amount: 500 * weeks as i64,
            amortization: 500,
            terms: weeks,
            payment_period_weeks: weeks,
            mode: String::new(),
            outstanding_balance: None,
            status: None,
            amount_release: 500 * weeks as i64,
            date_of_release: None,
            due_date: None,
        };
        store
            .insert_loan(Loan::new(terms, "LN-T".to_string(), "Weekly".to_string(), Utc::now()))
            .unwrap()
    }

    #[test]
    fn test_pending_full_payment_does_not_complete_week() {
        let mut store = InMemoryStore::new();
        let loan = stored_loan(&mut store, 4);
        let now = Utc::now();
        let payment = store
            .insert_payment(Payment::new(loan.id(), 1, 500, 500, now, now))
            .unwrap();

        let outcome = advance_loan(&mut store, &loan, &payment, now).unwrap();

        assert_eq!(outcome.completion, WeekCompletion::Open);
        assert_eq!(outcome.progress.paid_weeks, 0);
        assert_eq!(outcome.progress.outstanding_balance, 1_500);
    }

    #[test]
    fn test_explicit_flag_completes_without_marking() {
        let mut store = InMemoryStore::new();
        let loan = stored_loan(&mut store, 4);
        let now = Utc::now();
        let payment = store
            .insert_payment(
                Payment::new(loan.id(), 1, 500, 100, now, now)
                    .as_partial(400)
                    .with_completes_week(true),
            )
            .unwrap();

        let outcome = advance_loan(&mut store, &loan, &payment, now).unwrap();

        assert_eq!(outcome.completion, WeekCompletion::Explicit);
        assert_eq!(outcome.marked_payments, 0);
        assert_eq!(outcome.progress.paid_weeks, 1);
    }

    #[test]
    fn test_balance_floors_at_zero_and_pays_off() {
        let mut store = InMemoryStore::new();
        let loan = stored_loan(&mut store, 4);
        let now = Utc::now();
        let payment = store
            .insert_payment(
                Payment::new(loan.id(), 1, 500, 5_000, now, now).with_status(PaymentStatus::Paid),
            )
            .unwrap();

        let outcome = advance_loan(&mut store, &loan, &payment, now).unwrap();

        assert_eq!(outcome.progress.outstanding_balance, 0);
        assert_eq!(outcome.progress.status, LoanStatus::Paid);
        assert!(outcome.paid_off());
    }

    #[test]
    fn test_overdue_status_is_kept_when_not_finished() {
        let mut store = InMemoryStore::new();
        let mut loan = stored_loan(&mut store, 4);
        loan.set_progress(
            LoanProgress {
                outstanding_balance: 2_000,
                paid_weeks: 0,
                status: LoanStatus::Overdue,
            },
            Utc::now(),
        );
        store.save_loan(&loan).unwrap();
        let now = Utc::now();
        let payment = store
            .insert_payment(
                Payment::new(loan.id(), 1, 500, 500, now, now).with_status(PaymentStatus::Paid),
            )
            .unwrap();

        let outcome = advance_loan(&mut store, &loan, &payment, now).unwrap();

        assert_eq!(outcome.progress.status, LoanStatus::Overdue);
        assert_eq!(outcome.progress.paid_weeks, 1);
    }

    #[test]
    fn test_stale_loan_view_is_rejected() {
        let mut store = InMemoryStore::new();
        let loan = stored_loan(&mut store, 4);
        let now = Utc::now();
        let first = store
            .insert_payment(
                Payment::new(loan.id(), 1, 500, 500, now, now).with_status(PaymentStatus::Paid),
            )
            .unwrap();
        let second = store
            .insert_payment(
                Payment::new(loan.id(), 2, 500, 500, now, now).with_status(PaymentStatus::Paid),
            )
            .unwrap();

        advance_loan(&mut store, &loan, &first, now).unwrap();
        let err = advance_loan(&mut store, &loan, &second, now).unwrap_err();

        assert!(matches!(
            err,
            LendingError::Store(crate::store::StoreError::StaleLoan { .. })
        ));
        let reloaded = store.find_loan(loan.id()).unwrap().unwrap();
        assert_eq!(reloaded.paid_weeks(), 1);
    }
}
