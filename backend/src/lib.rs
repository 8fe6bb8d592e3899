//! Micro-Lending Core - Payment Application and Loan Progression
//!
//! Applies client payments to weekly loan installments and keeps each loan's
//! outstanding balance, paid weeks and status in step.
//!
//! # Architecture
//!
//! - **core**: Clock abstraction and date parsing
//! - **models**: Domain types (Loan, Payment, ledger events)
//! - **store**: Persistence collaborator trait, in-memory store, snapshots
//! - **engine**: Payment application, progress tracking, loan lifecycle
//! - **config**: TOML + environment configuration
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents)
//! 2. Balances never go negative (loan outstanding balance, week remaining balance)
//! 3. At most one full payment per (loan, week)
//! 4. The payment row is the source of truth; loan progress is derived from it

// Module declarations
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;

// Re-exports for convenience
pub use config::{ConfigError, LendingConfig, OverpaymentPolicy};
pub use core::clock::{Clock, FixedClock, SystemClock};
pub use engine::{LendingEngine, LoanStats, PaymentProgress, ProgressOutcome, WeekCompletion};
pub use error::{LendingError, LendingResult};
pub use models::{
    event::{EventLog, LedgerEvent},
    loan::{Loan, LoanProgress, LoanStatus, LoanUpdateRequest, NewLoan},
    payment::{Payment, PaymentCreateRequest, PaymentStatus, PaymentUpdate},
};
pub use store::{InMemoryStore, LendingStore, SnapshotError, StoreError, StoreSnapshot};
