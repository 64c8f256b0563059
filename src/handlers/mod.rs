//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Checks the caller's role
//! 3. Delegates to a service and returns the JSON response

/// Application workflow endpoints
pub mod applications;
/// Health check endpoint
pub mod health;
/// Bulk import endpoints
pub mod imports;
/// Loan and payment endpoints
pub mod loans;
/// Profile and API key endpoints
pub mod profiles;
/// Public loan quote
pub mod quote;
