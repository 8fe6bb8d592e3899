//! Loan progress tests
//!
//! Paid-week advancement, payoff rules and the best-effort behavior when the
//! loan progress write fails after the payment was stored.

use chrono::{DateTime, TimeZone, Utc};
use lending_core::{
    FixedClock, InMemoryStore, LedgerEvent, LendingConfig, LendingEngine, LendingStore, Loan,
    LoanProgress, LoanStatus, NewLoan, Payment, PaymentCreateRequest, PaymentStatus, StoreError,
};

// ============================================================================
// Helpers
// ============================================================================

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 8, 30, 0).unwrap())
}

fn engine() -> LendingEngine<InMemoryStore, FixedClock> {
    LendingEngine::with_clock(InMemoryStore::new(), clock(), LendingConfig::default())
}

fn terms(weeks: u32, amortization: i64, total: i64) -> NewLoan {
    NewLoan {
        client_id: 3,
        control_number: String::new(),
        total_amount: total,
        amortization,
        terms: weeks,
        payment_period_weeks: weeks,
        mode: String::new(),
        outstanding_balance: None,
        status: None,
        amount_release: total,
        date_of_release: None,
        due_date: None,
    }
}

fn full(loan_id: u64, week: Option<u32>, amount: i64) -> PaymentCreateRequest {
    PaymentCreateRequest {
        loan_id,
        week_number: week,
        amount_due: amount,
        amount_paid: amount,
        status: PaymentStatus::Paid,
        payment_method: "Cash".to_string(),
        is_partial: false,
        completes_week: false,
        payment_date: None,
    }
}

/// Store whose progress write and payment reads can be switched to fail
struct FlakyStore {
    inner: InMemoryStore,
    fail_progress: bool,
    fail_payment_reads: bool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_progress: false,
            fail_payment_reads: false,
        }
    }
}

impl LendingStore for FlakyStore {
    fn insert_loan(&mut self, loan: Loan) -> Result<Loan, StoreError> {
        self.inner.insert_loan(loan)
    }

    fn find_loan(&self, id: u64) -> Result<Option<Loan>, StoreError> {
        self.inner.find_loan(id)
    }

    fn find_loan_by_control_number(
        &self,
        control_number: &str,
    ) -> Result<Option<Loan>, StoreError> {
        self.inner.find_loan_by_control_number(control_number)
    }

    fn save_loan(&mut self, loan: &Loan) -> Result<(), StoreError> {
        self.inner.save_loan(loan)
    }

    fn update_loan_progress(
        &mut self,
        loan_id: u64,
        expected: LoanProgress,
        progress: LoanProgress,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_progress {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.update_loan_progress(loan_id, expected, progress, now)
    }

    fn list_loans(&self) -> Result<Vec<Loan>, StoreError> {
        self.inner.list_loans()
    }

    fn insert_payment(&mut self, payment: Payment) -> Result<Payment, StoreError> {
        self.inner.insert_payment(payment)
    }

    fn find_payment(&self, id: u64) -> Result<Option<Payment>, StoreError> {
        if self.fail_payment_reads {
            return Err(StoreError::Unavailable("read timeout".to_string()));
        }
        self.inner.find_payment(id)
    }

    fn save_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.inner.save_payment(payment)
    }

    fn payments_for_loan(&self, loan_id: u64) -> Result<Vec<Payment>, StoreError> {
        self.inner.payments_for_loan(loan_id)
    }

    fn partial_payments(
        &self,
        loan_id: u64,
        week_number: u32,
    ) -> Result<Vec<Payment>, StoreError> {
        self.inner.partial_payments(loan_id, week_number)
    }

    fn full_payment(&self, loan_id: u64, week_number: u32) -> Result<Option<Payment>, StoreError> {
        self.inner.full_payment(loan_id, week_number)
    }

    fn mark_week_completed(
        &mut self,
        loan_id: u64,
        week_number: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.inner.mark_week_completed(loan_id, week_number, now)
    }
}

// ============================================================================
// Paid-week advancement
// ============================================================================

#[test]
fn test_full_payment_advances_one_week() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();

    engine.apply_payment(&full(loan.id(), Some(1), 500)).unwrap();

    let reloaded = engine.loan(loan.id()).unwrap();
    assert_eq!(reloaded.paid_weeks(), 1);
    assert_eq!(reloaded.outstanding_balance(), 4_500);
    assert_eq!(reloaded.status(), LoanStatus::Active);
}

#[test]
fn test_out_of_order_full_payment_jumps_ahead() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();

    engine.apply_payment(&full(loan.id(), Some(3), 500)).unwrap();

    assert_eq!(engine.loan(loan.id()).unwrap().paid_weeks(), 3);
}

#[test]
fn test_behind_week_still_advances_by_one() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();

    engine.apply_payment(&full(loan.id(), Some(3), 500)).unwrap();
    engine.apply_payment(&full(loan.id(), Some(1), 500)).unwrap();

    assert_eq!(engine.loan(loan.id()).unwrap().paid_weeks(), 4);
}

#[test]
fn test_completes_week_flag_on_short_partial() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();

    engine
        .apply_payment(&PaymentCreateRequest {
            loan_id: loan.id(),
            week_number: Some(1),
            amount_due: 500,
            amount_paid: 450,
            status: PaymentStatus::Partial,
            payment_method: "Cash".to_string(),
            is_partial: true,
            completes_week: true,
            payment_date: None,
        })
        .unwrap();

    let reloaded = engine.loan(loan.id()).unwrap();
    assert_eq!(reloaded.paid_weeks(), 1);
    assert_eq!(reloaded.outstanding_balance(), 4_550);
}

// ============================================================================
// Payoff
// ============================================================================

#[test]
fn test_last_week_pays_off_despite_one_cent_left() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(4, 500, 2_001)).unwrap();

    for week in 1..=3 {
        engine.apply_payment(&full(loan.id(), Some(week), 500)).unwrap();
        assert_eq!(engine.loan(loan.id()).unwrap().status(), LoanStatus::Active);
    }
    engine.apply_payment(&full(loan.id(), Some(4), 500)).unwrap();

    let reloaded = engine.loan(loan.id()).unwrap();
    assert_eq!(reloaded.paid_weeks(), 4);
    assert_eq!(reloaded.outstanding_balance(), 1);
    assert_eq!(reloaded.status(), LoanStatus::Paid);
}

#[test]
fn test_zero_balance_pays_off_early() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();

    let mut lump = full(loan.id(), Some(1), 500);
    lump.amount_paid = 6_000;
    engine.apply_payment(&lump).unwrap();

    let reloaded = engine.loan(loan.id()).unwrap();
    assert_eq!(reloaded.outstanding_balance(), 0);
    assert_eq!(reloaded.status(), LoanStatus::Paid);
    assert_eq!(reloaded.paid_weeks(), 1);
}

#[test]
fn test_overdue_loan_keeps_status_until_finished() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();
    engine
        .update_loan(&lending_core::LoanUpdateRequest {
            id: loan.id(),
            status: Some(LoanStatus::Overdue),
            ..Default::default()
        })
        .unwrap();

    engine.apply_payment(&full(loan.id(), None, 500)).unwrap();

    assert_eq!(engine.loan(loan.id()).unwrap().status(), LoanStatus::Overdue);
}

// ============================================================================
// Progress write failure
// ============================================================================

#[test]
fn test_failed_progress_write_keeps_the_payment() {
    let mut engine = LendingEngine::with_clock(FlakyStore::new(), clock(), LendingConfig::default());
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();
    engine.store_mut().fail_progress = true;

    let payment = engine.apply_payment(&full(loan.id(), None, 500)).unwrap();

    assert!(engine.payment(payment.id()).is_ok());
    let reloaded = engine.loan(loan.id()).unwrap();
    assert_eq!(reloaded.paid_weeks(), 0);
    assert_eq!(reloaded.outstanding_balance(), 5_000);

    assert_eq!(engine.event_log().unreconciled_payments(), vec![payment.id()]);
    let failures = engine.event_log().events_of_type("ProgressUpdateFailed");
    assert!(matches!(
        failures[0],
        LedgerEvent::ProgressUpdateFailed { reason, .. } if reason.contains("connection reset")
    ));
}

#[test]
fn test_progress_resumes_after_store_recovers() {
    let mut engine = LendingEngine::with_clock(FlakyStore::new(), clock(), LendingConfig::default());
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();
    engine.store_mut().fail_progress = true;

    engine.apply_payment(&full(loan.id(), Some(1), 500)).unwrap();
    engine.store_mut().fail_progress = false;
    engine.apply_payment(&full(loan.id(), Some(2), 500)).unwrap();

    let reloaded = engine.loan(loan.id()).unwrap();
    assert_eq!(reloaded.paid_weeks(), 2);
    assert_eq!(reloaded.outstanding_balance(), 4_500);
}

#[test]
fn test_week_completing_partial_needs_no_payment_reread() {
    let mut engine = LendingEngine::with_clock(FlakyStore::new(), clock(), LendingConfig::default());
    let loan = engine.create_loan(terms(10, 500, 5_000)).unwrap();
    let mut partial = full(loan.id(), Some(1), 300);
    partial.amount_due = 500;
    partial.is_partial = true;
    partial.status = PaymentStatus::Partial;
    engine.apply_payment(&partial).unwrap();
    engine.store_mut().fail_payment_reads = true;

    partial.amount_paid = 200;
    let completing = engine.apply_payment(&partial).unwrap();

    assert!(completing.completes_week());
    assert_eq!(completing.remaining_balance(), 0);
    engine.store_mut().fail_payment_reads = false;
    assert_eq!(engine.payment(completing.id()).unwrap(), completing);
    assert_eq!(engine.loan(loan.id()).unwrap().paid_weeks(), 1);
    assert!(engine.event_log().unreconciled_payments().is_empty());
}

// ============================================================================
// Event log hand-off
// ============================================================================

#[test]
fn test_take_events_hands_over_and_resets_log() {
    let mut engine = engine();
    let loan = engine.create_loan(terms(4, 500, 2_000)).unwrap();
    engine.apply_payment(&full(loan.id(), None, 500)).unwrap();

    let events = engine.take_events();

    let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        kinds,
        vec!["LoanCreated", "PaymentApplied", "WeekCompleted", "LoanProgressed"]
    );
    assert!(engine.event_log().is_empty());

    engine.apply_payment(&full(loan.id(), None, 500)).unwrap();
    assert_eq!(engine.event_log().events_for_loan(loan.id()).len(), 3);
}
