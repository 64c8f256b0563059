//! Payment data models and API request/response types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a payment record from the database.
///
/// # Database Table
///
/// Maps to the `payments` table. Rows are written once and never updated.
/// `balance_after_cents` is what the loan's remaining balance became.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub profile_id: Uuid,
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub paid_by: Option<String>,

    /// Optional idempotency key for preventing duplicates
    pub idempotency_key: Option<String>,

    /// API key of the staff member who recorded it; empty for imports
    pub recorded_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

/// Request to record a repayment.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": "116.67",
///   "payment_date": "2025-03-10",
///   "notes": "Cash at depot",
///   "idempotency_key": "loan-42-week-1"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,

    /// Defaults to today (UTC)
    pub payment_date: Option<NaiveDate>,

    pub notes: Option<String>,
    pub paid_by: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Response returned for payment operations.
///
/// `overpayment_cents` is the part of the amount that exceeded the balance.
/// It is reported here and not credited anywhere.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub overpayment_cents: i64,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub paid_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        let applied = payment.balance_before_cents - payment.balance_after_cents;
        Self {
            id: payment.id,
            loan_id: payment.loan_id,
            amount_cents: payment.amount_cents,
            balance_before_cents: payment.balance_before_cents,
            balance_after_cents: payment.balance_after_cents,
            overpayment_cents: payment.amount_cents - applied,
            payment_date: payment.payment_date,
            notes: payment.notes,
            paid_by: payment.paid_by,
            created_at: payment.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: i64, before: i64, after: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            loan_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            amount_cents: amount,
            balance_before_cents: before,
            balance_after_cents: after,
            payment_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            notes: None,
            paid_by: None,
            idempotency_key: Some("key".to_string()),
            recorded_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_regular_payment_has_no_overpayment() {
        let response = PaymentResponse::from(payment(11_667, 140_000, 128_333));
        assert_eq!(response.overpayment_cents, 0);
    }

    #[test]
    fn test_overpayment_reported() {
        let response = PaymentResponse::from(payment(20_000, 5_000, 0));
        assert_eq!(response.overpayment_cents, 15_000);
        assert_eq!(response.balance_after_cents, 0);
    }
}
