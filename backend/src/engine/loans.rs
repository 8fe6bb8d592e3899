//! Loan lifecycle
//!
//! Creation on application approval, manual updates, soft delete and
//! portfolio statistics.
//!
//! Status is only set by hand here (Overdue, Default) or by the progress
//! tracker (Paid). Nothing sweeps loans past their due date.

use super::LendingEngine;
use crate::core::clock::Clock;
use crate::error::{LendingError, LendingResult};
use crate::models::event::LedgerEvent;
use crate::models::loan::{Loan, LoanStatus, LoanUpdateRequest, NewLoan};
use crate::store::{LendingStore, StoreError, LOAN_CONTROL_NUMBER};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Portfolio totals over live loans
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanStats {
    pub total_loans: usize,
    pub active_loans: usize,
    pub paid_loans: usize,
    pub overdue_loans: usize,
    pub defaulted_loans: usize,
    /// Σ total_amount (cents)
    pub total_disbursed: i64,
    /// Σ outstanding_balance (cents)
    pub total_outstanding: i64,
}

impl LoanStats {
    fn record(&mut self, loan: &Loan) {
        self.total_loans += 1;
        match loan.status() {
            LoanStatus::Active => self.active_loans += 1,
            LoanStatus::Paid => self.paid_loans += 1,
            LoanStatus::Overdue => self.overdue_loans += 1,
            LoanStatus::Default => self.defaulted_loans += 1,
        }
        self.total_disbursed = self.total_disbursed.saturating_add(loan.total_amount());
        self.total_outstanding = self.total_outstanding.saturating_add(loan.outstanding_balance());
    }
}

impl<S: LendingStore, C: Clock> LendingEngine<S, C> {
    /// Create a loan from approved application terms
    ///
    /// # Errors
    ///
    /// - `Validation` for a zero client id, non-positive amounts, a zero
    ///   payment period or a negative starting balance
    /// - `Conflict` if the control number is already taken
    pub fn create_loan(&mut self, terms: NewLoan) -> LendingResult<Loan> {
        validate_terms(&terms)?;

        let now = self.clock.now();
        let control_number = match terms.control_number.trim() {
            "" => generate_control_number(&self.config.control_number_prefix),
            given => given.to_string(),
        };
        let mode = match terms.mode.trim() {
            "" => self.config.default_mode.clone(),
            given => given.to_string(),
        };

        let created = self
            .store
            .insert_loan(Loan::new(terms, control_number.clone(), mode, now))
            .map_err(|e| match e {
                StoreError::UniqueViolation { ref constraint } if constraint == LOAN_CONTROL_NUMBER => {
                    LendingError::Conflict(format!(
                        "control number {} already exists",
                        control_number
                    ))
                }
                other => LendingError::Store(other),
            })?;

        info!(
            loan_id = created.id(),
            control_number = created.control_number(),
            total_amount = created.total_amount(),
            "loan created"
        );
        self.log_event(LedgerEvent::LoanCreated {
            at: now,
            loan_id: created.id(),
            control_number: created.control_number().to_string(),
            total_amount: created.total_amount(),
        });

        Ok(created)
    }

    pub fn loan(&self, id: u64) -> LendingResult<Loan> {
        self.live_loan(id)
    }

    pub fn loan_by_control_number(&self, control_number: &str) -> LendingResult<Loan> {
        let control_number = control_number.trim();
        self.store
            .find_loan_by_control_number(control_number)?
            .ok_or_else(|| LendingError::UnknownControlNumber(control_number.to_string()))
    }

    pub fn list_loans(&self) -> LendingResult<Vec<Loan>> {
        Ok(self.store.list_loans()?)
    }

    /// Apply a manual update to a loan
    ///
    /// Any status may be set, including Overdue and Default.
    pub fn update_loan(&mut self, update: &LoanUpdateRequest) -> LendingResult<Loan> {
        if update.outstanding_balance.is_some_and(|balance| balance < 0) {
            return Err(LendingError::Validation(
                "outstanding balance cannot be negative".to_string(),
            ));
        }
        if update.payment_period_weeks == Some(0) {
            return Err(LendingError::Validation(
                "payment period must be at least one week".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut loan = self.live_loan(update.id)?;
        loan.apply_update(update, now);
        self.store.save_loan(&loan)?;

        info!(loan_id = loan.id(), status = %loan.status(), "loan updated");
        self.log_event(LedgerEvent::LoanUpdated {
            at: now,
            loan_id: loan.id(),
            status: loan.status(),
        });
        Ok(loan)
    }

    /// Soft-delete a loan. Its payments are left in place.
    pub fn delete_loan(&mut self, id: u64) -> LendingResult<()> {
        let now = self.clock.now();
        let mut loan = self.live_loan(id)?;
        loan.mark_deleted(now);
        self.store.save_loan(&loan)?;

        info!(loan_id = id, "loan deleted");
        self.log_event(LedgerEvent::LoanDeleted { at: now, loan_id: id });
        Ok(())
    }

    pub fn loan_stats(&self) -> LendingResult<LoanStats> {
        let mut stats = LoanStats::default();
        for loan in self.store.list_loans()? {
            stats.record(&loan);
        }
        Ok(stats)
    }
}

fn validate_terms(terms: &NewLoan) -> LendingResult<()> {
    let problem = if terms.client_id == 0 {
        Some("client id is required")
    } else if terms.total_amount <= 0 {
        Some("total amount must be positive")
    } else if terms.amortization <= 0 {
        Some("amortization must be positive")
    } else if terms.payment_period_weeks == 0 {
        Some("payment period must be at least one week")
    } else if terms.outstanding_balance.is_some_and(|balance| balance < 0) {
        Some("outstanding balance cannot be negative")
    } else {
        None
    };

    match problem {
        Some(message) => Err(LendingError::Validation(message.to_string())),
        None => Ok(()),
    }
}

/// `PREFIX-XXXXXXXX` from the first 8 hex digits of a v4 UUID
fn generate_control_number(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}", prefix, &hex[..8])
}
