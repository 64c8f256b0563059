//! Loan data models and API response types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// Lifecycle of a funded loan.
///
/// `Active` becomes `Completed` when a payment clears the balance, or
/// `Defaulted` when staff write it off. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Defaulted => "defaulted",
        }
    }

    /// Status after a payment, given whether it cleared the balance.
    pub fn after_payment(is_paid_off: bool) -> Self {
        if is_paid_off {
            LoanStatus::Completed
        } else {
            LoanStatus::Active
        }
    }
}

impl TryFrom<String> for LoanStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(LoanStatus::Active),
            "completed" => Ok(LoanStatus::Completed),
            "defaulted" => Ok(LoanStatus::Defaulted),
            _ => Err(UnknownVariant {
                kind: "loan status",
                value,
            }),
        }
    }
}

/// Represents a loan record from the database.
///
/// # Database Table
///
/// Maps to the `loans` table. All money is in cents. `total_cents` and
/// `installment_cents` are fixed at funding; `remaining_balance_cents` and
/// `terms_remaining` move with every payment.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Loan {
    pub id: Uuid,
    pub application_id: Uuid,
    pub profile_id: Uuid,

    /// Spreadsheet loan number, set only for imported loans
    pub loan_no: Option<String>,

    pub principal_cents: i64,
    pub interest_rate_percent: Decimal,
    pub interest_cents: i64,
    pub total_cents: i64,
    pub installment_cents: i64,

    /// Never negative, never increases
    pub remaining_balance_cents: i64,

    pub terms_weeks: i32,
    pub terms_remaining: i32,
    pub start_date: NaiveDate,
    pub next_payment_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub signed_date: Option<NaiveDate>,
    pub paid_by: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: LoanStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repayment progress derived from a loan's stored state.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct LoanProgress {
    pub paid_cents: i64,
    pub terms_paid: i32,
}

impl Loan {
    pub fn progress(&self) -> LoanProgress {
        LoanProgress {
            paid_cents: self.total_cents - self.remaining_balance_cents,
            // terms_remaining is recomputed from the balance, so it can
            // briefly exceed terms_weeks when the installment rounded down.
            terms_paid: (self.terms_weeks - self.terms_remaining).max(0),
        }
    }
}

/// Response body for loan endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "principal_cents": 100000,
///   "total_cents": 140000,
///   "installment_cents": 11667,
///   "remaining_balance_cents": 128333,
///   "terms_weeks": 12,
///   "terms_remaining": 11,
///   "status": "active",
///   "progress": { "paid_cents": 11667, "terms_paid": 1 }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    #[serde(flatten)]
    pub loan: Loan,
    pub progress: LoanProgress,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            progress: loan.progress(),
            loan,
        }
    }
}
