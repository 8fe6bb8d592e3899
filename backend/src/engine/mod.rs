//! Lending engine
//!
//! Owns the persistence collaborator, the clock, the configuration and the
//! ledger event log, and exposes every loan and payment operation:
//!
//! - **payments**: payment application, remaining-balance query, next-week
//!   resolution, progress view, corrections
//! - **progress**: the loan progress tracker invoked after each payment
//! - **loans**: loan creation on approval, manual updates, statistics
//!
//! # Example
//!
//! ```rust
//! use lending_core::{
//!     InMemoryStore, LendingConfig, LendingEngine, NewLoan, PaymentCreateRequest, PaymentStatus,
//! };
//!
//! let mut engine = LendingEngine::new(InMemoryStore::new(), LendingConfig::default());
//!
//! let loan = engine
//!     .create_loan(NewLoan {
//!         client_id: 1,
//!         control_number: String::new(),
//!         total_amount: 200_000,
//!         amortization: 50_000,
//!         terms: 4,
//!         payment_period_weeks: 4,
//!         mode: String::new(),
//!         outstanding_balance: None,
//!         status: None,
//!         amount_release: 190_000,
//!         date_of_release: None,
//!         due_date: None,
//!     })
//!     .unwrap();
//!
//! let payment = engine
//!     .apply_payment(&PaymentCreateRequest {
//!         loan_id: loan.id(),
//!         week_number: None,
//!         amount_due: 50_000,
//!         amount_paid: 50_000,
//!         status: PaymentStatus::Paid,
//!         payment_method: "Cash".to_string(),
//!         is_partial: false,
//!         completes_week: false,
//!         payment_date: None,
//!     })
//!     .unwrap();
//!
//! assert_eq!(payment.week_number(), 1);
//! assert_eq!(engine.loan(loan.id()).unwrap().paid_weeks(), 1);
//! ```

pub mod loans;
pub mod payments;
pub mod progress;

pub use loans::LoanStats;
pub use payments::PaymentProgress;
pub use progress::{advance_loan, ProgressOutcome, WeekCompletion};

use crate::config::LendingConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::models::event::{EventLog, LedgerEvent};
use crate::store::LendingStore;

/// Loan and payment operations over an injected store
pub struct LendingEngine<S: LendingStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    config: LendingConfig,
    event_log: EventLog,
}

impl<S: LendingStore> LendingEngine<S, SystemClock> {
    /// Engine using wall-clock time
    pub fn new(store: S, config: LendingConfig) -> Self {
        Self::with_clock(store, SystemClock, config)
    }
}

impl<S: LendingStore, C: Clock> LendingEngine<S, C> {
    pub fn with_clock(store: S, clock: C, config: LendingConfig) -> Self {
        Self {
            store,
            clock,
            config,
            event_log: EventLog::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give the store back, e.g. to snapshot it
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Hand over the recorded ledger events and start a fresh log
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        self.event_log.drain()
    }

    fn log_event(&mut self, event: LedgerEvent) {
        self.event_log.log(event);
    }
}
