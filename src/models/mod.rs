//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies built from them.

/// API key authentication model
pub mod api_key;
/// Loan applications and their review workflow
pub mod application;
/// Bulk import payloads and reports
pub mod import;
/// Funded loans
pub mod loan;
/// List query parameters and paged responses
pub mod pagination;
/// Repayments recorded against loans
pub mod payment;
/// Borrower profiles
pub mod profile;

/// A stored status or role string that matches no known variant.
///
/// Returned when decoding database rows; the CHECK constraints on the
/// status columns make this unreachable unless the schema drifts.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
