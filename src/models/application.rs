//! Loan application models and the review workflow.
//!
//! This module defines:
//! - `LoanApplication`: Database entity for a submitted application
//! - `ApplicationStatus`: Workflow states and the moves allowed between them
//! - Request bodies for submitting, reviewing, and funding

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{UnknownVariant, profile::ProfileUpdate};

/// Workflow states of a loan application.
///
/// ```text
/// submitted <-> pending <-> approved <-> rejected   (staff review, any order)
///      \            |           |
///       `-----------+-----------+--> cancelled      (borrower or staff)
///                               `--> funded         (staff, terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Submitted,
    Pending,
    Approved,
    Rejected,
    Funded,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Funded => "funded",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a reviewer may assign.
    pub fn is_review_outcome(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::Pending
                | ApplicationStatus::Approved
                | ApplicationStatus::Rejected
        )
    }

    /// Funded and cancelled applications are closed to review.
    pub fn can_review(self) -> bool {
        self.is_review_outcome()
    }

    pub fn can_cancel(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted | ApplicationStatus::Pending | ApplicationStatus::Approved
        )
    }

    pub fn can_fund(self) -> bool {
        self == ApplicationStatus::Approved
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "submitted" => Ok(ApplicationStatus::Submitted),
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "funded" => Ok(ApplicationStatus::Funded),
            "cancelled" => Ok(ApplicationStatus::Cancelled),
            _ => Err(UnknownVariant {
                kind: "application status",
                value,
            }),
        }
    }
}

/// Represents a loan application record from the database.
///
/// # Database Table
///
/// Maps to the `loan_applications` table. Amounts are stored in cents;
/// `weekly_payment_cents` is the installment quoted at submission time.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct LoanApplication {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub requested_amount_cents: i64,

    /// Set when approved; funding lends this amount
    pub approved_amount_cents: Option<i64>,

    pub interest_rate_percent: Decimal,
    pub terms_weeks: i32,
    pub weekly_payment_cents: i64,

    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,

    pub rejection_reason: Option<String>,
    pub pending_notes: Option<String>,
    pub driver_license_url: Option<String>,
    pub taxi_front_url: Option<String>,
    pub taxi_back_url: Option<String>,
    pub face_photo_url: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,

    /// API key of the reviewing staff member
    pub reviewed_by: Option<Uuid>,

    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Links to identity and vehicle documents already uploaded to storage.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentUrls {
    pub driver_license_url: Option<String>,
    pub taxi_front_url: Option<String>,
    pub taxi_back_url: Option<String>,
    pub face_photo_url: Option<String>,
}

impl DocumentUrls {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            &self.driver_license_url,
            &self.taxi_front_url,
            &self.taxi_back_url,
            &self.face_photo_url,
        ]
        .into_iter()
        .filter_map(|url| url.as_deref())
    }
}

/// Request body for submitting an application.
///
/// # JSON Example
///
/// ```json
/// {
///   "requested_amount": "1000.00",
///   "terms_weeks": 12,
///   "documents": {
///     "driver_license_url": "https://files.example.com/dl.jpg"
///   },
///   "profile": { "phone_number": "021 555 0192" }
/// }
/// ```
///
/// # Validation
///
/// - `requested_amount`: positive, whole cents after rounding
/// - `terms_weeks`: one of the configured term choices
/// - document URLs: http(s), at most 2048 characters
#[derive(Debug, Deserialize)]
pub struct SubmitApplicationRequest {
    pub requested_amount: Decimal,
    pub terms_weeks: u32,

    #[serde(default)]
    pub documents: DocumentUrls,

    #[serde(default)]
    pub profile: ProfileUpdate,
}

/// Request body for a staff review.
///
/// Only the field matching the new status is kept; the others are cleared.
///
/// ```json
/// { "status": "approved", "approved_amount": "800.00" }
/// ```
#[derive(Debug, Deserialize)]
pub struct ReviewApplicationRequest {
    pub status: ApplicationStatus,

    /// Defaults to the requested amount
    pub approved_amount: Option<Decimal>,

    pub rejection_reason: Option<String>,
    pub pending_notes: Option<String>,
}

/// Request body for funding an approved application.
///
/// ```json
/// { "start_date": "2025-03-03", "paid_by": "bank transfer" }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FundLoanRequest {
    /// Defaults to today (UTC)
    pub start_date: Option<NaiveDate>,
    pub signed_date: Option<NaiveDate>,
    pub paid_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ApplicationStatus::Submitted, true, true, false)]
    #[case(ApplicationStatus::Pending, true, true, false)]
    #[case(ApplicationStatus::Approved, true, true, true)]
    #[case(ApplicationStatus::Rejected, true, false, false)]
    #[case(ApplicationStatus::Funded, false, false, false)]
    #[case(ApplicationStatus::Cancelled, false, false, false)]
    fn test_allowed_moves(
        #[case] status: ApplicationStatus,
        #[case] review: bool,
        #[case] cancel: bool,
        #[case] fund: bool,
    ) {
        assert_eq!(status.can_review(), review);
        assert_eq!(status.can_cancel(), cancel);
        assert_eq!(status.can_fund(), fund);
    }

    #[test]
    fn test_status_round_trips_through_storage_string() {
        for status in [
            ApplicationStatus::Submitted,
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
            ApplicationStatus::Funded,
            ApplicationStatus::Cancelled,
        ] {
            assert_eq!(
                ApplicationStatus::try_from(status.as_str().to_string()).unwrap(),
                status
            );
        }
        assert!(ApplicationStatus::try_from("archived".to_string()).is_err());
    }

    #[test]
    fn test_funded_is_not_a_review_outcome() {
        let request: Result<ReviewApplicationRequest, _> =
            serde_json::from_str(r#"{"status": "funded"}"#);
        assert!(!request.unwrap().status.is_review_outcome());
    }

    #[test]
    fn test_submit_request_accepts_numbers_and_strings() {
        let from_number: SubmitApplicationRequest =
            serde_json::from_str(r#"{"requested_amount": 1000, "terms_weeks": 12}"#).unwrap();
        let from_string: SubmitApplicationRequest =
            serde_json::from_str(r#"{"requested_amount": "1000.00", "terms_weeks": 12}"#).unwrap();

        assert_eq!(from_number.requested_amount, from_string.requested_amount);
        assert!(from_number.profile.is_empty());
        assert_eq!(from_number.documents.iter().count(), 0);
    }
}
