//! In-memory store
//!
//! Holds loans and payments in ordered maps keyed by id. Used by tests, by the
//! CLI (persisted through [`StoreSnapshot`](super::StoreSnapshot)) and as the
//! reference behavior for the [`LendingStore`] contract.
//!
//! # Critical Invariants
//!
//! 1. **Id Uniqueness**: ids are assigned from monotonically increasing counters
//! 2. **Full Payment Uniqueness**: at most one live non-partial payment per (loan, week)
//! 3. **Control Number Uniqueness**: across all loans, including deleted ones

use super::{LendingStore, StoreError, FULL_PAYMENT_PER_WEEK, LOAN_CONTROL_NUMBER};
use crate::models::loan::{Loan, LoanProgress};
use crate::models::payment::Payment;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Loans and payments kept in process memory
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use lending_core::{InMemoryStore, LendingStore, Payment, PaymentStatus};
///
/// let mut store = InMemoryStore::new();
/// let now = Utc::now();
///
/// let first = store
///     .insert_payment(Payment::new(1, 1, 500, 500, now, now).with_status(PaymentStatus::Paid))
///     .unwrap();
/// assert_eq!(first.id(), 1);
///
/// // A second full payment for the same week violates the constraint
/// let dup = store.insert_payment(Payment::new(1, 1, 500, 500, now, now));
/// assert!(dup.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    loans: BTreeMap<u64, Loan>,
    payments: BTreeMap<u64, Payment>,
    next_loan_id: u64,
    next_payment_id: u64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            loans: BTreeMap::new(),
            payments: BTreeMap::new(),
            next_loan_id: 1,
            next_payment_id: 1,
        }
    }

    /// Rebuild a store from persisted rows
    ///
    /// Id counters resume after the largest id seen, or at the given values
    /// when those are larger.
    pub fn from_parts(
        loans: Vec<Loan>,
        payments: Vec<Payment>,
        next_loan_id: u64,
        next_payment_id: u64,
    ) -> Self {
        let max_loan = loans.iter().map(|l| l.id()).max().unwrap_or(0);
        let max_payment = payments.iter().map(|p| p.id()).max().unwrap_or(0);

        Self {
            loans: loans.into_iter().map(|l| (l.id(), l)).collect(),
            payments: payments.into_iter().map(|p| (p.id(), p)).collect(),
            next_loan_id: next_loan_id.max(max_loan + 1),
            next_payment_id: next_payment_id.max(max_payment + 1),
        }
    }

    /// All loans, including soft-deleted ones
    pub fn all_loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    /// All payments, including soft-deleted ones
    pub fn all_payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    pub fn next_loan_id(&self) -> u64 {
        self.next_loan_id
    }

    pub fn next_payment_id(&self) -> u64 {
        self.next_payment_id
    }

    pub fn num_loans(&self) -> usize {
        self.loans.values().filter(|l| !l.is_deleted()).count()
    }

    pub fn num_payments(&self) -> usize {
        self.payments.values().filter(|p| !p.is_deleted()).count()
    }

    fn live_payments(&self, loan_id: u64) -> impl Iterator<Item = &Payment> {
        self.payments
            .values()
            .filter(move |p| p.loan_id() == loan_id && !p.is_deleted())
    }

    fn full_payment_exists(&self, loan_id: u64, week_number: u32, except: u64) -> bool {
        self.live_payments(loan_id)
            .any(|p| p.id() != except && p.week_number() == week_number && p.is_full())
    }
}

impl LendingStore for InMemoryStore {
    fn insert_loan(&mut self, mut loan: Loan) -> Result<Loan, StoreError> {
        if self
            .loans
            .values()
            .any(|l| l.control_number() == loan.control_number())
        {
            return Err(StoreError::UniqueViolation {
                constraint: LOAN_CONTROL_NUMBER.to_string(),
            });
        }

        let id = self.next_loan_id;
        self.next_loan_id += 1;
        loan.assign_id(id);
        self.loans.insert(id, loan.clone());
        Ok(loan)
    }

    fn find_loan(&self, id: u64) -> Result<Option<Loan>, StoreError> {
        Ok(self.loans.get(&id).filter(|l| !l.is_deleted()).cloned())
    }

    fn find_loan_by_control_number(
        &self,
        control_number: &str,
    ) -> Result<Option<Loan>, StoreError> {
        Ok(self
            .loans
            .values()
            .find(|l| !l.is_deleted() && l.control_number() == control_number)
            .cloned())
    }

    fn save_loan(&mut self, loan: &Loan) -> Result<(), StoreError> {
        match self.loans.get_mut(&loan.id()) {
            Some(slot) => {
                *slot = loan.clone();
                Ok(())
            }
            None => Err(StoreError::Missing {
                entity: "loan",
                id: loan.id(),
            }),
        }
    }

    fn update_loan_progress(
        &mut self,
        loan_id: u64,
        expected: LoanProgress,
        progress: LoanProgress,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let loan = self
            .loans
            .get_mut(&loan_id)
            .filter(|l| !l.is_deleted())
            .ok_or(StoreError::Missing {
                entity: "loan",
                id: loan_id,
            })?;

        if loan.progress() != expected {
            return Err(StoreError::StaleLoan { loan_id });
        }

        loan.set_progress(progress, now);
        Ok(())
    }

    fn list_loans(&self) -> Result<Vec<Loan>, StoreError> {
        Ok(self
            .loans
            .values()
            .filter(|l| !l.is_deleted())
            .cloned()
            .collect())
    }

    fn insert_payment(&mut self, mut payment: Payment) -> Result<Payment, StoreError> {
        if payment.is_full() && self.full_payment_exists(payment.loan_id(), payment.week_number(), 0)
        {
            return Err(StoreError::UniqueViolation {
                constraint: FULL_PAYMENT_PER_WEEK.to_string(),
            });
        }

        let id = self.next_payment_id;
        self.next_payment_id += 1;
        payment.assign_id(id);
        self.payments.insert(id, payment.clone());
        Ok(payment)
    }

    fn find_payment(&self, id: u64) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.get(&id).filter(|p| !p.is_deleted()).cloned())
    }

    fn save_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if !payment.is_deleted()
            && payment.is_full()
            && self.full_payment_exists(payment.loan_id(), payment.week_number(), payment.id())
        {
            return Err(StoreError::UniqueViolation {
                constraint: FULL_PAYMENT_PER_WEEK.to_string(),
            });
        }

        match self.payments.get_mut(&payment.id()) {
            Some(slot) => {
                *slot = payment.clone();
                Ok(())
            }
            None => Err(StoreError::Missing {
                entity: "payment",
                id: payment.id(),
            }),
        }
    }

    fn payments_for_loan(&self, loan_id: u64) -> Result<Vec<Payment>, StoreError> {
        let mut payments: Vec<Payment> = self.live_payments(loan_id).cloned().collect();
        payments.sort_by_key(|p| (p.week_number(), p.id()));
        Ok(payments)
    }

    fn partial_payments(
        &self,
        loan_id: u64,
        week_number: u32,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .live_payments(loan_id)
            .filter(|p| p.week_number() == week_number && p.is_partial())
            .cloned()
            .collect())
    }

    fn full_payment(&self, loan_id: u64, week_number: u32) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .live_payments(loan_id)
            .find(|p| p.week_number() == week_number && p.is_full())
            .cloned())
    }

    fn mark_week_completed(
        &mut self,
        loan_id: u64,
        week_number: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut changed = 0;
        for payment in self.payments.values_mut().filter(|p| {
            p.loan_id() == loan_id
                && p.week_number() == week_number
                && p.is_partial()
                && !p.is_deleted()
        }) {
            if !payment.completes_week() {
                payment.mark_completes_week(now);
                changed += 1;
            }
        }
        Ok(changed)
    }
}
