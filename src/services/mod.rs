//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.
//! `amortization` is the pure loan arithmetic the others build on.

pub mod amortization;
pub mod api_key_service;
pub mod application_service;
pub mod import_service;
pub mod loan_service;
pub mod profile_service;
