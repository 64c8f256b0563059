//! Bulk import payloads and reports.
//!
//! The payload is the already-parsed content of the "Client List" and
//! "Loan List" spreadsheets. Dates are ISO `YYYY-MM-DD`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which parts of the payload to import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Clients,
    Loans,
    #[default]
    All,
}

impl ImportMode {
    pub fn includes_clients(self) -> bool {
        matches!(self, ImportMode::Clients | ImportMode::All)
    }

    pub fn includes_loans(self) -> bool {
        matches!(self, ImportMode::Loans | ImportMode::All)
    }
}

/// Request body for `POST /api/v1/imports`.
#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub mode: ImportMode,

    #[serde(default)]
    pub clients: Vec<ImportClient>,

    #[serde(default)]
    pub loans: Vec<ImportLoan>,
}

/// One row of the client sheet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportClient {
    pub client_no: String,
    pub full_name: String,
    pub email: Option<String>,
    pub occupation: Option<String>,
    pub id1_type: Option<String>,
    pub id1_number: Option<String>,
    pub id2_type: Option<String>,
    pub id2_number: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub vehicle_number_plate: Option<String>,
    pub late_history: Option<i32>,
}

/// One row of the loan sheet, with its dated payment columns.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportLoan {
    pub loan_no: String,
    pub client_no: String,
    #[serde(default)]
    pub client_name: String,
    pub amount: Decimal,
    #[serde(default)]
    pub interests: Decimal,
    pub total_amount: Decimal,
    pub terms_weeks: u32,

    /// Zero means "derive from total / terms"
    #[serde(default)]
    pub weekly_repay_min: Decimal,

    pub signed_date: Option<NaiveDate>,
    pub paid_by: Option<String>,
    pub start_date: NaiveDate,
    pub first_repayment_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// Free text from the sheet; anything containing "finish" is closed
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub payments: Vec<ImportPayment>,
}

impl ImportLoan {
    pub fn is_marked_finished(&self) -> bool {
        self.status.to_lowercase().contains("finish")
    }

    /// `"L-001 - Tama Ngata"`, used to label report lines.
    pub fn describe(&self) -> String {
        format!("{} - {}", self.loan_no, self.client_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportPayment {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Outcome counts for clients or loans.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub success: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PaymentsReport {
    pub success: usize,
    pub errors: Vec<String>,
}

/// Response body for `POST /api/v1/imports`.
///
/// ```json
/// {
///   "clients": { "success": 12, "skipped": 3, "errors": [] },
///   "loans": { "success": 10, "skipped": 0, "errors": ["L-007 - Ana: Client C-99 not found"] },
///   "payments": { "success": 143, "errors": [] }
/// }
/// ```
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub clients: SectionReport,
    pub loans: SectionReport,
    pub payments: PaymentsReport,
}

/// Response body for `DELETE /api/v1/imports`.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub payments: u64,
    pub loans: u64,
    pub applications: u64,
    pub profiles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults_to_all() {
        let request: ImportRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.mode, ImportMode::All);
        assert!(request.mode.includes_clients());
        assert!(request.mode.includes_loans());
        assert!(!ImportMode::Clients.includes_loans());
        assert!(!ImportMode::Loans.includes_clients());
    }

    #[test]
    fn test_loan_row_parses() {
        let loan: ImportLoan = serde_json::from_str(
            r#"{
                "loan_no": "L-001",
                "client_no": "C-001",
                "client_name": "Tama Ngata",
                "amount": 1000,
                "interests": 400,
                "total_amount": 1400,
                "terms_weeks": 12,
                "weekly_repay_min": 116.67,
                "start_date": "2024-01-08",
                "status": "Finished",
                "payments": [{ "date": "2024-01-15", "amount": 116.67 }]
            }"#,
        )
        .unwrap();

        assert!(loan.is_marked_finished());
        assert_eq!(loan.payments.len(), 1);
        assert_eq!(loan.describe(), "L-001 - Tama Ngata");
    }
}
