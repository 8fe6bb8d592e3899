//! Payment Application Engine
//!
//! # Application Flow
//!
//! ```text
//! request ─→ load loan ─→ resolve week ─┬─ full:    reject if a full payment exists for the week
//!                                       └─ partial: remaining = amortization - Σ partials - amount_paid
//!         ─→ insert payment ─→ advance loan (best effort) ─→ payment
//! ```
//!
//! The payment row is the source of truth. If the loan progress update fails
//! after the insert, the payment is kept, a warning is logged and a
//! `ProgressUpdateFailed` ledger event records the payment for reconciliation.
//!
//! # Critical Invariants
//!
//! - **One full payment per week**: checked before insert and enforced again by the store
//! - **Non-negative week balance**: `remaining_balance >= 0` on every payment
//! - **No rollback**: a failed progress update never removes the payment

use super::progress::{advance_loan, WeekCompletion};
use super::LendingEngine;
use crate::config::OverpaymentPolicy;
use crate::core::clock::Clock;
use crate::error::{LendingError, LendingResult};
use crate::models::event::LedgerEvent;
use crate::models::loan::Loan;
use crate::models::payment::{Payment, PaymentCreateRequest, PaymentUpdate};
use crate::store::{sum_paid, LendingStore, StoreError, FULL_PAYMENT_PER_WEEK};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Payment progress of a loan's current week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProgress {
    pub loan_id: u64,
    /// `paid_weeks + 1`
    pub current_week: u32,
    pub paid_weeks: u32,
    pub total_weeks: u32,
    pub amortization: i64,
    /// Still due for the current week
    pub remaining_balance: i64,
    pub partial_payments: Vec<Payment>,
    pub is_week_completed: bool,
}

impl<S: LendingStore, C: Clock> LendingEngine<S, C> {
    // ========================================================================
    // Payment application
    // ========================================================================

    /// Validate a boundary request, then apply it
    pub fn submit_payment(&mut self, request: &PaymentCreateRequest) -> LendingResult<Payment> {
        request.validate()?;
        self.apply_payment(request)
    }

    /// Apply a payment to a loan week and advance the loan
    ///
    /// A missing or zero `week_number` targets the loan's next unsatisfied
    /// week. A missing or unparsable `payment_date` becomes the current time.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the loan does not exist or is deleted
    /// - `Conflict` for a second full payment on the same week
    /// - `Validation` for a negative `amount_paid`, a non-positive `amount_due`
    ///   or an overpayment under [`OverpaymentPolicy::Reject`]
    /// - `ScheduleExhausted` when no week is given and the loan has no next week
    ///
    /// A failure of the loan progress update is NOT returned.
    pub fn apply_payment(&mut self, request: &PaymentCreateRequest) -> LendingResult<Payment> {
        let now = self.clock.now();
        let loan = self.live_loan(request.loan_id)?;

        let week_number = match request.week_number.filter(|week| *week > 0) {
            Some(week) => week,
            None => Self::open_week(&loan)?,
        };

        let amount_paid = self.admit_amount(request)?;

        let payment_date = match request.parsed_payment_date() {
            Some(date) => date,
            None => {
                if let Some(raw) = request.payment_date.as_deref() {
                    debug!(raw, "unparsable payment date, using processing time");
                }
                now
            }
        };

        let mut payment = Payment::new(
            loan.id(),
            week_number,
            request.amount_due,
            amount_paid,
            payment_date,
            now,
        )
        .with_status(request.status)
        .with_method(request.payment_method.clone())
        .with_completes_week(request.completes_week);

        if request.is_partial {
            let remaining_before = Self::week_remaining(
                &loan,
                self.store.partial_total(loan.id(), week_number)?,
            );
            payment = payment.as_partial(remaining_before.saturating_sub(amount_paid).max(0));
        } else if self.store.full_payment(loan.id(), week_number)?.is_some() {
            return Err(duplicate_full_payment(week_number));
        }

        let mut created = self.store.insert_payment(payment).map_err(|e| match e {
            StoreError::UniqueViolation { ref constraint } if constraint == FULL_PAYMENT_PER_WEEK => {
                duplicate_full_payment(week_number)
            }
            other => LendingError::Store(other),
        })?;

        info!(
            loan_id = loan.id(),
            payment_id = created.id(),
            week = week_number,
            amount_paid,
            partial = created.is_partial(),
            "payment applied"
        );
        self.log_event(LedgerEvent::PaymentApplied {
            at: now,
            loan_id: loan.id(),
            payment_id: created.id(),
            week_number,
            amount_paid,
            is_partial: created.is_partial(),
        });

        match advance_loan(&mut self.store, &loan, &created, now) {
            Ok(outcome) => {
                if outcome.completion.is_complete() {
                    self.log_event(LedgerEvent::WeekCompleted {
                        at: now,
                        loan_id: loan.id(),
                        week_number,
                        via_partials: outcome.completion == WeekCompletion::Accumulated,
                    });
                }
                if outcome.paid_off() {
                    info!(loan_id = loan.id(), "loan paid off");
                }
                self.log_event(LedgerEvent::LoanProgressed {
                    at: now,
                    loan_id: loan.id(),
                    outstanding_balance: outcome.progress.outstanding_balance,
                    paid_weeks: outcome.progress.paid_weeks,
                    status: outcome.progress.status,
                });

                if outcome.completion == WeekCompletion::Accumulated {
                    created.mark_completes_week(now);
                }
            }
            Err(err) => {
                let failure = LendingError::DependencyFailure(err.to_string());
                warn!(
                    loan_id = loan.id(),
                    payment_id = created.id(),
                    error = %failure,
                    "payment stored but loan progress was not updated"
                );
                self.log_event(LedgerEvent::ProgressUpdateFailed {
                    at: now,
                    loan_id: loan.id(),
                    payment_id: created.id(),
                    reason: err.to_string(),
                });
            }
        }

        Ok(created)
    }

    /// Amount to record after applying the overpayment policy
    fn admit_amount(&self, request: &PaymentCreateRequest) -> LendingResult<i64> {
        if request.amount_due <= 0 {
            return Err(LendingError::Validation(
                "amount due must be positive".to_string(),
            ));
        }
        if request.amount_paid < 0 {
            return Err(LendingError::Validation(
                "amount paid cannot be negative".to_string(),
            ));
        }
        if request.amount_paid <= request.amount_due {
            return Ok(request.amount_paid);
        }

        match self.config.overpayment_policy {
            OverpaymentPolicy::Accept => Ok(request.amount_paid),
            OverpaymentPolicy::Cap => {
                debug!(
                    amount_paid = request.amount_paid,
                    amount_due = request.amount_due,
                    "capping overpayment"
                );
                Ok(request.amount_due)
            }
            OverpaymentPolicy::Reject => Err(LendingError::Validation(format!(
                "amount paid {} exceeds amount due {}",
                request.amount_paid, request.amount_due
            ))),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Amount still due for a week: amortization minus partial payments, floored at 0
    ///
    /// Side-effect free.
    pub fn remaining_balance_for_week(&self, loan_id: u64, week_number: u32) -> LendingResult<i64> {
        let loan = self.live_loan(loan_id)?;
        let paid = self.store.partial_total(loan_id, week_number)?;
        Ok(Self::week_remaining(&loan, paid))
    }

    /// First week at or after `paid_weeks + 1` without a settled full payment
    ///
    /// # Errors
    ///
    /// `ScheduleExhausted` when more than `payment_period_weeks` consecutive
    /// weeks are already settled, which only happens on inconsistent data.
    /// Also when `paid_weeks` is already `u32::MAX`.
    pub fn next_payment_week(&self, loan_id: u64) -> LendingResult<u32> {
        let loan = self.live_loan(loan_id)?;
        let start = Self::open_week(&loan)?;
        let limit = start.saturating_add(loan.payment_period_weeks());

        for week in start..=limit {
            match self.store.full_payment(loan_id, week)? {
                Some(existing) if existing.is_settled_full() => continue,
                _ => return Ok(week),
            }
        }

        warn!(loan_id, start, limit, "no open week within the loan schedule");
        Err(LendingError::ScheduleExhausted {
            loan_id,
            searched_to: limit,
        })
    }

    /// Progress of the loan's current week
    pub fn payment_progress(&self, loan_id: u64) -> LendingResult<PaymentProgress> {
        let loan = self.live_loan(loan_id)?;
        let current_week = Self::open_week(&loan)?;
        let partial_payments = self.store.partial_payments(loan_id, current_week)?;
        let paid = sum_paid(&partial_payments);
        let remaining_balance = Self::week_remaining(&loan, paid);

        Ok(PaymentProgress {
            loan_id,
            current_week,
            paid_weeks: loan.paid_weeks(),
            total_weeks: loan.payment_period_weeks(),
            amortization: loan.amortization(),
            remaining_balance,
            partial_payments,
            is_week_completed: remaining_balance == 0,
        })
    }

    pub fn payment(&self, id: u64) -> LendingResult<Payment> {
        self.store
            .find_payment(id)?
            .ok_or_else(|| LendingError::payment_not_found(id))
    }

    /// Live payments of a live loan, ordered by week
    pub fn payments_for_loan(&self, loan_id: u64) -> LendingResult<Vec<Payment>> {
        self.live_loan(loan_id)?;
        Ok(self.store.payments_for_loan(loan_id)?)
    }

    /// Partial payments recorded for one week
    pub fn partial_payments(&self, loan_id: u64, week_number: u32) -> LendingResult<Vec<Payment>> {
        self.live_loan(loan_id)?;
        Ok(self.store.partial_payments(loan_id, week_number)?)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Correct a stored payment
    ///
    /// Loan progress is not recomputed.
    pub fn update_payment(&mut self, id: u64, update: &PaymentUpdate) -> LendingResult<Payment> {
        if update.amount_due.is_some_and(|due| due <= 0) {
            return Err(LendingError::Validation(
                "amount due must be positive".to_string(),
            ));
        }
        if update.amount_paid.is_some_and(|paid| paid < 0) {
            return Err(LendingError::Validation(
                "amount paid cannot be negative".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut payment = self.payment(id)?;
        payment.apply_update(update, now);
        self.store.save_payment(&payment)?;

        self.log_event(LedgerEvent::PaymentCorrected {
            at: now,
            loan_id: payment.loan_id(),
            payment_id: id,
        });
        Ok(payment)
    }

    /// Soft-delete a payment
    pub fn delete_payment(&mut self, id: u64) -> LendingResult<()> {
        let now = self.clock.now();
        let mut payment = self.payment(id)?;
        payment.mark_deleted(now);
        self.store.save_payment(&payment)?;

        info!(payment_id = id, loan_id = payment.loan_id(), "payment deleted");
        self.log_event(LedgerEvent::PaymentDeleted {
            at: now,
            loan_id: payment.loan_id(),
            payment_id: id,
        });
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn live_loan(&self, loan_id: u64) -> LendingResult<Loan> {
        self.store
            .find_loan(loan_id)?
            .ok_or_else(|| LendingError::loan_not_found(loan_id))
    }

    fn week_remaining(loan: &Loan, paid: i64) -> i64 {
        loan.amortization().saturating_sub(paid).max(0)
    }

    /// `paid_weeks + 1`, or `ScheduleExhausted` past the last representable week
    fn open_week(loan: &Loan) -> LendingResult<u32> {
        loan.current_week().ok_or(LendingError::ScheduleExhausted {
            loan_id: loan.id(),
            searched_to: u32::MAX,
        })
    }
}

fn duplicate_full_payment(week_number: u32) -> LendingError {
    LendingError::Conflict(format!(
        "full payment already exists for week {}",
        week_number
    ))
}
