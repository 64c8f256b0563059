//! Borrower profile models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a borrower profile from the database.
///
/// # Database Table
///
/// Maps to the `profiles` table. `client_no` is only set for clients that
/// arrived through bulk import; it is how later imports recognize them.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub client_no: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub bank_account: Option<String>,
    pub occupation: Option<String>,
    pub id1_type: Option<String>,
    pub id1_number: Option<String>,
    pub id2_type: Option<String>,
    pub id2_number: Option<String>,
    pub vehicle_number_plate: Option<String>,
    pub taxi_company: Option<String>,

    /// Number of late repayments carried over from previous records
    pub late_history: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a profile.
///
/// # JSON Example
///
/// ```json
/// {
///   "full_name": "Tama Ngata",
///   "phone_number": "021 555 0192",
///   "vehicle_number_plate": "TAXI42"
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct CreateProfileRequest {
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub bank_account: Option<String>,
    pub occupation: Option<String>,
    pub id1_type: Option<String>,
    pub id1_number: Option<String>,
    pub id2_type: Option<String>,
    pub id2_number: Option<String>,
    pub vehicle_number_plate: Option<String>,
    pub taxi_company: Option<String>,
}

/// Contact details a borrower may refresh when applying.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub bank_account: Option<String>,
    pub taxi_company: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone_number.is_none()
            && self.address.is_none()
            && self.bank_account.is_none()
            && self.taxi_company.is_none()
    }
}
