//! Loan model
//!
//! A loan is the aggregate root for repayment. It carries:
//! - Terms (total amount, weekly amortization, number of weeks)
//! - Progress (outstanding balance, paid weeks, status)
//! - Audit timestamps and a soft-delete marker
//!
//! CRITICAL: All money values are i64 (cents)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default payment frequency label
pub const DEFAULT_MODE: &str = "Weekly";

/// Loan status
///
/// Only `Active -> Paid` is derived by payment progression. `Overdue` and
/// `Default` are set by an explicit loan update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoanStatus {
    #[default]
    Active,
    Paid,
    Overdue,
    Default,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Active",
            LoanStatus::Paid => "Paid",
            LoanStatus::Overdue => "Overdue",
            LoanStatus::Default => "Default",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(LoanStatus::Active),
            "paid" => Ok(LoanStatus::Paid),
            "overdue" => Ok(LoanStatus::Overdue),
            "default" => Ok(LoanStatus::Default),
            other => Err(format!("unknown loan status '{}'", other)),
        }
    }
}

/// Progress fields of a loan, written together by the progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanProgress {
    pub outstanding_balance: i64,
    pub paid_weeks: u32,
    pub status: LoanStatus,
}

/// Terms of an approved loan application, used to create a [`Loan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub client_id: u64,

    /// Empty means "generate one"
    #[serde(default)]
    pub control_number: String,

    pub total_amount: i64,

    /// Amount due per week (cents)
    pub amortization: i64,

    /// Number of installments agreed on the application
    pub terms: u32,

    pub payment_period_weeks: u32,

    /// Empty means the configured default mode
    #[serde(default)]
    pub mode: String,

    /// Defaults to `total_amount`
    #[serde(default)]
    pub outstanding_balance: Option<i64>,

    /// Defaults to Active
    #[serde(default)]
    pub status: Option<LoanStatus>,

    /// Amount actually handed out after deductions
    #[serde(default)]
    pub amount_release: i64,

    #[serde(default)]
    pub date_of_release: Option<NaiveDate>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Manual loan update. Only provided fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanUpdateRequest {
    pub id: u64,

    #[serde(default)]
    pub outstanding_balance: Option<i64>,

    #[serde(default)]
    pub status: Option<LoanStatus>,

    #[serde(default)]
    pub payment_period_weeks: Option<u32>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// A disbursed loan with its repayment progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Store-assigned identifier (never zero once persisted)
    id: u64,

    client_id: u64,

    /// Unique human-readable identifier
    control_number: String,

    total_amount: i64,
    amortization: i64,
    terms: u32,
    payment_period_weeks: u32,
    mode: String,
    amount_release: i64,
    date_of_release: Option<NaiveDate>,
    due_date: Option<NaiveDate>,

    /// Never negative
    outstanding_balance: i64,

    /// Count of fully satisfied weeks
    paid_weeks: u32,

    status: LoanStatus,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// Build an unsaved loan from approved terms.
    ///
    /// `control_number` and `mode` must already be resolved by the caller.
    /// The id stays zero until the store assigns one.
    ///
    /// # Example
    /// ```
    /// use chrono::Utc;
    /// use lending_core::{Loan, LoanStatus, NewLoan};
    ///
    /// let terms = NewLoan {
    ///     client_id: 7,
    ///     control_number: String::new(),
    ///     total_amount: 240_000,
    ///     amortization: 20_000,
    ///     terms: 12,
    ///     payment_period_weeks: 12,
    ///     mode: String::new(),
    ///     outstanding_balance: None,
    ///     status: None,
    ///     amount_release: 228_000,
    ///     date_of_release: None,
    ///     due_date: None,
    /// };
    /// let loan = Loan::new(terms, "LN-0001".to_string(), "Weekly".to_string(), Utc::now());
    ///
    /// assert_eq!(loan.outstanding_balance(), 240_000);
    /// assert_eq!(loan.paid_weeks(), 0);
    /// assert_eq!(loan.status(), LoanStatus::Active);
    /// ```
    pub fn new(terms: NewLoan, control_number: String, mode: String, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            client_id: terms.client_id,
            control_number,
            total_amount: terms.total_amount,
            amortization: terms.amortization,
            terms: terms.terms,
            payment_period_weeks: terms.payment_period_weeks,
            mode,
            amount_release: terms.amount_release,
            date_of_release: terms.date_of_release,
            due_date: terms.due_date,
            outstanding_balance: terms.outstanding_balance.unwrap_or(terms.total_amount).max(0),
            paid_weeks: 0,
            status: terms.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn control_number(&self) -> &str {
        &self.control_number
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    /// Amount due per week (cents)
    pub fn amortization(&self) -> i64 {
        self.amortization
    }

    pub fn terms(&self) -> u32 {
        self.terms
    }

    /// Total number of weekly periods
    pub fn payment_period_weeks(&self) -> u32 {
        self.payment_period_weeks
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn amount_release(&self) -> i64 {
        self.amount_release
    }

    pub fn date_of_release(&self) -> Option<NaiveDate> {
        self.date_of_release
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn outstanding_balance(&self) -> i64 {
        self.outstanding_balance
    }

    pub fn paid_weeks(&self) -> u32 {
        self.paid_weeks
    }

    pub fn status(&self) -> LoanStatus {
        self.status
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

    /// Next week that has not been satisfied yet
    ///
    /// `None` once `paid_weeks` has reached `u32::MAX`.
    pub fn current_week(&self) -> Option<u32> {
        self.paid_weeks.checked_add(1)
    }

    /// Snapshot of the fields the progress tracker owns
    pub fn progress(&self) -> LoanProgress {
        LoanProgress {
            outstanding_balance: self.outstanding_balance,
            paid_weeks: self.paid_weeks,
            status: self.status,
        }
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    pub(crate) fn set_progress(&mut self, progress: LoanProgress, now: DateTime<Utc>) {
        self.outstanding_balance = progress.outstanding_balance.max(0);
        self.paid_weeks = progress.paid_weeks;
        self.status = progress.status;
        self.updated_at = now;
    }

    /// Apply a manual update; only `Some` fields change
    pub(crate) fn apply_update(&mut self, update: &LoanUpdateRequest, now: DateTime<Utc>) {
        if let Some(balance) = update.outstanding_balance {
            self.outstanding_balance = balance.max(0);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(weeks) = update.payment_period_weeks {
            self.payment_period_weeks = weeks;
        }
        if let Some(due) = update.due_date {
            self.due_date = Some(due);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> NewLoan {
        NewLoan {
            client_id: 1,
            control_number: String::new(),
            total_amount: 100_000,
            amortization: 25_000,
            terms: 4,
            payment_period_weeks: 4,
            mode: String::new(),
            outstanding_balance: None,
            status: None,
            amount_release: 95_000,
            date_of_release: None,
            due_date: None,
        }
    }

    #[test]
    fn test_outstanding_defaults_to_total() {
        let loan = Loan::new(terms(), "LN-1".to_string(), DEFAULT_MODE.to_string(), Utc::now());
        assert_eq!(loan.outstanding_balance(), 100_000);
        assert_eq!(loan.current_week(), Some(1));
        assert!(!loan.is_deleted());
    }

    #[test]
    fn test_current_week_stops_at_last_representable_week() {
        let mut loan = Loan::new(terms(), "LN-1".to_string(), DEFAULT_MODE.to_string(), Utc::now());
        let mut progress = loan.progress();
        progress.paid_weeks = u32::MAX - 1;
        loan.set_progress(progress, Utc::now());
        assert_eq!(loan.current_week(), Some(u32::MAX));

        progress.paid_weeks = u32::MAX;
        loan.set_progress(progress, Utc::now());
        assert_eq!(loan.current_week(), None);
    }

    #[test]
    fn test_negative_outstanding_is_floored() {
        let mut t = terms();
        t.outstanding_balance = Some(-5);
        let loan = Loan::new(t, "LN-1".to_string(), DEFAULT_MODE.to_string(), Utc::now());
        assert_eq!(loan.outstanding_balance(), 0);
    }

    #[test]
    fn test_apply_update_only_touches_given_fields() {
        let mut loan = Loan::new(terms(), "LN-1".to_string(), DEFAULT_MODE.to_string(), Utc::now());
        let update = LoanUpdateRequest {
            id: 1,
            status: Some(LoanStatus::Overdue),
            ..Default::default()
        };

        loan.apply_update(&update, Utc::now());

        assert_eq!(loan.status(), LoanStatus::Overdue);
        assert_eq!(loan.outstanding_balance(), 100_000);
        assert_eq!(loan.payment_period_weeks(), 4);
    }

    #[test]
    fn test_mark_deleted_is_idempotent() {
        let mut loan = Loan::new(terms(), "LN-1".to_string(), DEFAULT_MODE.to_string(), Utc::now());
        let first = Utc::now();
        loan.mark_deleted(first);
        loan.mark_deleted(first + chrono::Duration::seconds(30));
        assert_eq!(loan.deleted_at(), Some(first));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("paid".parse::<LoanStatus>(), Ok(LoanStatus::Paid));
        assert_eq!(" Default ".parse::<LoanStatus>(), Ok(LoanStatus::Default));
        assert!("closed".parse::<LoanStatus>().is_err());
    }
}
