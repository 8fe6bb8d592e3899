//! Domain models for the lending core

pub mod event;
pub mod loan;
pub mod payment;

// Re-exports
pub use event::{EventLog, LedgerEvent};
pub use loan::{Loan, LoanProgress, LoanStatus, LoanUpdateRequest, NewLoan};
pub use payment::{Payment, PaymentCreateRequest, PaymentStatus, PaymentUpdate};
