//! Ledger event log
//!
//! Records what the engine did to loans and payments. Events make the
//! best-effort parts of payment application observable: when the loan
//! progress update fails after a payment was stored, a
//! [`LedgerEvent::ProgressUpdateFailed`] entry names the payment that needs
//! reconciliation.
//!
//! The log keeps every event until it is drained. Long-lived embeddings
//! should call [`EventLog::drain`] (or `LendingEngine::take_events`)
//! after forwarding events elsewhere.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use lending_core::models::{EventLog, LedgerEvent};
//!
//! let mut log = EventLog::new();
//! log.log(LedgerEvent::WeekCompleted {
//!     at: Utc::now(),
//!     loan_id: 4,
//!     week_number: 2,
//!     via_partials: true,
//! });
//!
//! assert_eq!(log.events_for_loan(4).len(), 1);
//! assert_eq!(log.events()[0].event_type(), "WeekCompleted");
//! ```

use crate::models::loan::LoanStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger event capturing a state change.
///
/// Events are logged in the order they occur within a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Loan created from an approved application
    LoanCreated {
        at: DateTime<Utc>,
        loan_id: u64,
        control_number: String,
        total_amount: i64,
    },

    /// Payment stored against a loan week
    PaymentApplied {
        at: DateTime<Utc>,
        loan_id: u64,
        payment_id: u64,
        week_number: u32,
        amount_paid: i64,
        is_partial: bool,
    },

    /// A week's amortization was satisfied
    WeekCompleted {
        at: DateTime<Utc>,
        loan_id: u64,
        week_number: u32,
        /// Completed by accumulated partial payments rather than a flag
        via_partials: bool,
    },

    /// Loan progress written after a payment
    LoanProgressed {
        at: DateTime<Utc>,
        loan_id: u64,
        outstanding_balance: i64,
        paid_weeks: u32,
        status: LoanStatus,
    },

    /// Payment was stored but the loan progress update failed
    ProgressUpdateFailed {
        at: DateTime<Utc>,
        loan_id: u64,
        payment_id: u64,
        reason: String,
    },

    /// Manual loan update
    LoanUpdated {
        at: DateTime<Utc>,
        loan_id: u64,
        status: LoanStatus,
    },

    LoanDeleted {
        at: DateTime<Utc>,
        loan_id: u64,
    },

    /// Payment correction (does not re-run progression)
    PaymentCorrected {
        at: DateTime<Utc>,
        loan_id: u64,
        payment_id: u64,
    },

    PaymentDeleted {
        at: DateTime<Utc>,
        loan_id: u64,
        payment_id: u64,
    },
}

impl LedgerEvent {
    /// When the event happened
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::LoanCreated { at, .. }
            | LedgerEvent::PaymentApplied { at, .. }
            | LedgerEvent::WeekCompleted { at, .. }
            | LedgerEvent::LoanProgressed { at, .. }
            | LedgerEvent::ProgressUpdateFailed { at, .. }
            | LedgerEvent::LoanUpdated { at, .. }
            | LedgerEvent::LoanDeleted { at, .. }
            | LedgerEvent::PaymentCorrected { at, .. }
            | LedgerEvent::PaymentDeleted { at, .. } => *at,
        }
    }

    /// Loan the event belongs to
    pub fn loan_id(&self) -> u64 {
        match self {
            LedgerEvent::LoanCreated { loan_id, .. }
            | LedgerEvent::PaymentApplied { loan_id, .. }
            | LedgerEvent::WeekCompleted { loan_id, .. }
            | LedgerEvent::LoanProgressed { loan_id, .. }
            | LedgerEvent::ProgressUpdateFailed { loan_id, .. }
            | LedgerEvent::LoanUpdated { loan_id, .. }
            | LedgerEvent::LoanDeleted { loan_id, .. }
            | LedgerEvent::PaymentCorrected { loan_id, .. }
            | LedgerEvent::PaymentDeleted { loan_id, .. } => *loan_id,
        }
    }

    /// Payment the event belongs to, if any
    pub fn payment_id(&self) -> Option<u64> {
        match self {
            LedgerEvent::PaymentApplied { payment_id, .. }
            | LedgerEvent::ProgressUpdateFailed { payment_id, .. }
            | LedgerEvent::PaymentCorrected { payment_id, .. }
            | LedgerEvent::PaymentDeleted { payment_id, .. } => Some(*payment_id),
            _ => None,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::LoanCreated { .. } => "LoanCreated",
            LedgerEvent::PaymentApplied { .. } => "PaymentApplied",
            LedgerEvent::WeekCompleted { .. } => "WeekCompleted",
            LedgerEvent::LoanProgressed { .. } => "LoanProgressed",
            LedgerEvent::ProgressUpdateFailed { .. } => "ProgressUpdateFailed",
            LedgerEvent::LoanUpdated { .. } => "LoanUpdated",
            LedgerEvent::LoanDeleted { .. } => "LoanDeleted",
            LedgerEvent::PaymentCorrected { .. } => "PaymentCorrected",
            LedgerEvent::PaymentDeleted { .. } => "PaymentDeleted",
        }
    }
}

/// Ledger events in recording order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&LedgerEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_loan(&self, loan_id: u64) -> Vec<&LedgerEvent> {
        self.events
            .iter()
            .filter(|e| e.loan_id() == loan_id)
            .collect()
    }

    /// Payments stored without a matching loan progress update
    pub fn unreconciled_payments(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::ProgressUpdateFailed { payment_id, .. } => Some(*payment_id),
                _ => None,
            })
            .collect()
    }

    /// Remove and return every recorded event, oldest first
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
