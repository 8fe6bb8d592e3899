//! Property tests for balance invariants under arbitrary payment sequences.

use proptest::prelude::*;

use lending_core::{
    InMemoryStore, LendingConfig, LendingEngine, LendingError, LoanStatus, NewLoan,
    PaymentCreateRequest, PaymentStatus,
};

#[derive(Debug, Clone)]
struct Step {
    week: Option<u32>,
    amount_paid: i64,
    is_partial: bool,
    status: PaymentStatus,
    completes_week: bool,
}

fn step() -> impl Strategy<Value = Step> {
    (
        prop::option::of(1u32..=8),
        0i64..=1_500,
        any::<bool>(),
        prop_oneof![
            Just(PaymentStatus::Pending),
            Just(PaymentStatus::Partial),
            Just(PaymentStatus::Paid),
        ],
        prop::bool::weighted(0.1),
    )
        .prop_map(|(week, amount_paid, is_partial, status, completes_week)| Step {
            week,
            amount_paid,
            is_partial,
            status,
            completes_week,
        })
}

fn engine_with_loan(weeks: u32) -> (LendingEngine<InMemoryStore>, u64) {
    let mut engine = LendingEngine::new(InMemoryStore::new(), LendingConfig::default());
    let loan = engine
        .create_loan(NewLoan {
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
        })
        .unwrap();
    (engine, loan.id())
}

fn request(loan_id: u64, step: &Step) -> PaymentCreateRequest {
    PaymentCreateRequest {
        loan_id,
        week_number: step.week,
        amount_due: 500,
        amount_paid: step.amount_paid,
        status: step.status,
        payment_method: "Cash".to_string(),
        is_partial: step.is_partial,
        completes_week: step.completes_week,
        payment_date: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: loan and week balances never go negative, and progress never
    /// moves backwards.
    #[test]
    fn property_balances_stay_non_negative(
        steps in prop::collection::vec(step(), 1..24)
    ) {
        let (mut engine, loan_id) = engine_with_loan(6);
        let mut last_balance = engine.loan(loan_id).unwrap().outstanding_balance();
        let mut last_paid_weeks = 0;

        for step in &steps {
            match engine.apply_payment(&request(loan_id, step)) {
                Ok(payment) => prop_assert!(payment.remaining_balance() >= 0),
                Err(LendingError::Conflict(_)) => prop_assert!(!step.is_partial),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }

            let loan = engine.loan(loan_id).unwrap();
            prop_assert!(loan.outstanding_balance() >= 0);
            prop_assert!(loan.outstanding_balance() <= last_balance);
            prop_assert!(loan.paid_weeks() >= last_paid_weeks);
            if loan.outstanding_balance() == 0 {
                prop_assert_eq!(loan.status(), LoanStatus::Paid);
            }
            last_balance = loan.outstanding_balance();
            last_paid_weeks = loan.paid_weeks();

            for week in 1..=8 {
                prop_assert!(engine.remaining_balance_for_week(loan_id, week).unwrap() >= 0);
            }
        }
    }

    /// PROPERTY: at most one live full payment per week, whatever is submitted.
    #[test]
    fn property_one_full_payment_per_week(
        steps in prop::collection::vec(step(), 1..24)
    ) {
        let (mut engine, loan_id) = engine_with_loan(6);

        for step in &steps {
            let _ = engine.apply_payment(&request(loan_id, step));
        }

        for week in 1..=40 {
            let fulls = engine
                .payments_for_loan(loan_id)
                .unwrap()
                .into_iter()
                .filter(|p| p.week_number() == week && p.is_full())
                .count();
            prop_assert!(fulls <= 1, "week {} has {} full payments", week, fulls);
        }
    }

    /// PROPERTY: the remaining-balance query has no side effects.
    #[test]
    fn property_remaining_balance_is_idempotent(
        steps in prop::collection::vec(step(), 0..12),
        week in 1u32..=8
    ) {
        let (mut engine, loan_id) = engine_with_loan(6);
        for step in &steps {
            let _ = engine.apply_payment(&request(loan_id, step));
        }
        let events_before = engine.event_log().len();

        let first = engine.remaining_balance_for_week(loan_id, week).unwrap();
        let second = engine.remaining_balance_for_week(loan_id, week).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(engine.event_log().len(), events_before);
    }
}
