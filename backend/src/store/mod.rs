//! Persistence collaborator
//!
//! The engine talks to storage only through [`LendingStore`], passed in at
//! construction. There is no process-wide handle.
//!
//! # Store Contract
//!
//! 1. **Soft delete**: `find_*` and list operations never return deleted rows
//! 2. **Full-payment uniqueness**: `insert_payment` rejects a second live
//!    non-partial payment for the same (loan, week) with
//!    [`StoreError::UniqueViolation`]
//! 3. **Progress compare-and-set**: `update_loan_progress` only writes when the
//!    loan's current progress equals `expected`, otherwise
//!    [`StoreError::StaleLoan`]
//! 4. **Id assignment**: inserts assign a fresh non-zero id

pub mod memory;
pub mod snapshot;

pub use memory::InMemoryStore;
pub use snapshot::{SnapshotError, StoreSnapshot};

use crate::models::loan::{Loan, LoanProgress};
use crate::models::payment::Payment;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors reported by a store implementation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    #[error("loan {loan_id} progress changed since it was read")]
    StaleLoan { loan_id: u64 },

    #[error("{entity} {id} missing")]
    Missing { entity: &'static str, id: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Constraint name for the one-full-payment-per-week rule
pub const FULL_PAYMENT_PER_WEEK: &str = "payments_loan_week_full_unique";

/// Constraint name for loan control numbers
pub const LOAN_CONTROL_NUMBER: &str = "loans_control_number_unique";

/// Storage operations used by the engine
pub trait LendingStore {
    // ------------------------------------------------------------------
    // Loans
    // ------------------------------------------------------------------

    /// Insert a new loan and return it with its assigned id
    fn insert_loan(&mut self, loan: Loan) -> Result<Loan, StoreError>;

    fn find_loan(&self, id: u64) -> Result<Option<Loan>, StoreError>;

    fn find_loan_by_control_number(&self, control_number: &str)
        -> Result<Option<Loan>, StoreError>;

    /// Overwrite a whole loan row (manual updates, soft delete)
    fn save_loan(&mut self, loan: &Loan) -> Result<(), StoreError>;

    /// Atomically write balance, paid weeks and status if the stored progress
    /// still equals `expected`
    fn update_loan_progress(
        &mut self,
        loan_id: u64,
        expected: LoanProgress,
        progress: LoanProgress,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn list_loans(&self) -> Result<Vec<Loan>, StoreError>;

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Insert a new payment and return it with its assigned id
    fn insert_payment(&mut self, payment: Payment) -> Result<Payment, StoreError>;

    fn find_payment(&self, id: u64) -> Result<Option<Payment>, StoreError>;

    /// Overwrite a whole payment row (corrections, soft delete)
    fn save_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    /// All live payments of a loan, ordered by week number then id
    fn payments_for_loan(&self, loan_id: u64) -> Result<Vec<Payment>, StoreError>;

    /// Live partial payments for (loan, week), ordered by id
    fn partial_payments(&self, loan_id: u64, week_number: u32)
        -> Result<Vec<Payment>, StoreError>;

    /// The live non-partial payment for (loan, week), if any
    fn full_payment(&self, loan_id: u64, week_number: u32) -> Result<Option<Payment>, StoreError>;

    /// Set `completes_week` on every live partial payment of (loan, week).
    /// Returns the number of rows changed.
    fn mark_week_completed(
        &mut self,
        loan_id: u64,
        week_number: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Sum of `amount_paid` over live partial payments for (loan, week),
    /// saturating at `i64::MAX`
    fn partial_total(&self, loan_id: u64, week_number: u32) -> Result<i64, StoreError> {
        Ok(sum_paid(&self.partial_payments(loan_id, week_number)?))
    }
}

/// Saturating sum of `amount_paid`
pub(crate) fn sum_paid(payments: &[Payment]) -> i64 {
    payments
        .iter()
        .fold(0i64, |total, p| total.saturating_add(p.amount_paid()))
}
