//! Payment model
//!
//! A payment is a ledger entry against one week of a loan's amortization
//! schedule. Each payment has:
//! - Loan ID and week number (week numbers are NOT unique per loan)
//! - Amount due, amount paid and the week's remaining balance after it
//! - Partial / week-completion flags
//! - Status (Pending, Partial, Paid, Overdue)
//!
//! After insert only `completes_week` is flipped by progression. Corrections
//! go through [`PaymentUpdate`].
//!
//! CRITICAL: All money values are i64 (cents)

use crate::core::clock::parse_payment_date;
use crate::error::LendingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            "overdue" => Ok(PaymentStatus::Overdue),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Incoming payment request (body of `POST /payments`)
///
/// `week_number` of `None` means "next unsatisfied week". `payment_date` is
/// kept as the raw string; unparsable dates fall back to the processing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCreateRequest {
    pub loan_id: u64,

    #[serde(default)]
    pub week_number: Option<u32>,

    pub amount_due: i64,

    pub amount_paid: i64,

    #[serde(default)]
    pub status: PaymentStatus,

    pub payment_method: String,

    #[serde(default)]
    pub is_partial: bool,

    #[serde(default)]
    pub completes_week: bool,

    #[serde(default)]
    pub payment_date: Option<String>,
}

impl PaymentCreateRequest {
    /// Boundary checks that reject a request before it reaches the engine
    ///
    /// # Example
    /// ```
    /// use lending_core::{PaymentCreateRequest, PaymentStatus};
    ///
    /// let mut req = PaymentCreateRequest {
    ///     loan_id: 1,
    ///     week_number: None,
    ///     amount_due: 50_000,
    ///     amount_paid: 50_000,
    ///     status: PaymentStatus::Paid,
    ///     payment_method: "Cash".to_string(),
    ///     is_partial: false,
    ///     completes_week: false,
    ///     payment_date: None,
    /// };
    /// assert!(req.validate().is_ok());
    ///
    /// req.week_number = Some(0);
    /// assert!(req.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), LendingError> {
        if self.loan_id == 0 {
            return Err(LendingError::Validation("loan id is required".to_string()));
        }
        if self.week_number == Some(0) {
            return Err(LendingError::Validation(
                "week number must be at least 1".to_string(),
            ));
        }
        if self.amount_due <= 0 {
            return Err(LendingError::Validation(
                "amount due must be positive".to_string(),
            ));
        }
        if self.amount_paid < 0 {
            return Err(LendingError::Validation(
                "amount paid cannot be negative".to_string(),
            ));
        }
        if self.payment_method.trim().is_empty() {
            return Err(LendingError::Validation(
                "payment method is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed payment date, if present and well-formed
    pub fn parsed_payment_date(&self) -> Option<DateTime<Utc>> {
        self.payment_date.as_deref().and_then(parse_payment_date)
    }
}

/// Correction of an existing payment. Only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    #[serde(default)]
    pub amount_due: Option<i64>,

    #[serde(default)]
    pub amount_paid: Option<i64>,

    #[serde(default)]
    pub status: Option<PaymentStatus>,

    #[serde(default)]
    pub payment_method: Option<String>,

    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

/// A payment applied against one week of a loan
///
/// # Example
/// ```
/// use chrono::Utc;
/// use lending_core::{Payment, PaymentStatus};
///
/// let now = Utc::now();
/// let payment = Payment::new(1, 2, 50_000, 20_000, now, now)
///     .with_status(PaymentStatus::Partial)
///     .with_method("GCash")
///     .as_partial(30_000);
///
/// assert!(payment.is_partial());
/// assert_eq!(payment.remaining_balance(), 30_000);
/// assert!(!payment.completes_week());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Store-assigned identifier
    id: u64,

    loan_id: u64,

    /// 1-based amortization period this payment applies to
    week_number: u32,

    payment_date: DateTime<Utc>,

    amount_due: i64,

    amount_paid: i64,

    /// Balance left for this week after this payment (never negative)
    remaining_balance: i64,

    status: PaymentStatus,

    payment_method: String,

    /// Does not clear the week's amortization by itself
    is_partial: bool,

    /// Set once the week's amortization is satisfied
    completes_week: bool,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Create an unsaved full payment with status Pending
    pub fn new(
        loan_id: u64,
        week_number: u32,
        amount_due: i64,
        amount_paid: i64,
        payment_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            loan_id,
            week_number,
            payment_date,
            amount_due,
            amount_paid,
            remaining_balance: 0,
            status: PaymentStatus::Pending,
            payment_method: String::new(),
            is_partial: false,
            completes_week: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Set status (builder pattern)
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Set payment method (builder pattern)
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = method.into();
        self
    }

    /// Mark as partial with the week's remaining balance after this payment
    pub fn as_partial(mut self, remaining_balance: i64) -> Self {
        self.is_partial = true;
        self.remaining_balance = remaining_balance.max(0);
        self
    }

    /// Caller asserts this payment completes its week
    pub fn with_completes_week(mut self, completes_week: bool) -> Self {
        self.completes_week = completes_week;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn loan_id(&self) -> u64 {
        self.loan_id
    }

    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    pub fn payment_date(&self) -> DateTime<Utc> {
        self.payment_date
    }

    pub fn amount_due(&self) -> i64 {
        self.amount_due
    }

    pub fn amount_paid(&self) -> i64 {
        self.amount_paid
    }

    pub fn remaining_balance(&self) -> i64 {
        self.remaining_balance
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    /// Full payment (`is_partial == false`)
    pub fn is_full(&self) -> bool {
        !self.is_partial
    }

    pub fn completes_week(&self) -> bool {
        self.completes_week
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Full payment with status Paid, i.e. a settled week
    pub fn is_settled_full(&self) -> bool {
        self.is_full() && self.status == PaymentStatus::Paid
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    pub(crate) fn mark_completes_week(&mut self, now: DateTime<Utc>) {
        if !self.completes_week {
            self.completes_week = true;
            self.updated_at = now;
        }
    }

    pub(crate) fn apply_update(&mut self, update: &PaymentUpdate, now: DateTime<Utc>) {
        if let Some(due) = update.amount_due {
            self.amount_due = due;
        }
        if let Some(paid) = update.amount_paid {
            self.amount_paid = paid;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(method) = &update.payment_method {
            self.payment_method = method.clone();
        }
        if let Some(date) = update.payment_date {
            self.payment_date = date;
        }
        self.updated_at = now;
    }

    pub(crate) fn mark_deleted(&mut self, now: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.updated_at = now;
        }
    }
}
