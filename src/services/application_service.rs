//! Loan application workflow: submit, review, cancel.
//!
//! Every status change locks the application row (`FOR UPDATE`) and checks
//! the current status inside the same transaction, so two reviewers or a
//! reviewer racing a cancellation cannot both win.

use uuid::Uuid;

use crate::{
    config::LoanSettings,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        application::{
            ApplicationStatus, LoanApplication, ReviewApplicationRequest,
            SubmitApplicationRequest,
        },
        pagination::{ListQuery, PageResponse},
    },
    services::{
        amortization::{compute_loan_terms, from_cents, to_cents},
        profile_service,
    },
};

const MAX_URL_LENGTH: usize = 2048;

/// Submit a new application for the borrower's own profile.
///
/// # Process
///
/// 1. Validate amount, term choice and document links
/// 2. Quote the weekly installment at the configured rate
/// 3. Apply any profile updates and insert the application in one transaction
///
/// # Errors
///
/// - `InvalidRequest`: amount not positive, term not offered, bad URL
/// - `ProfileNotFound`: the borrower's profile is gone
/// - `Database`: Database error occurred
pub async fn submit_application(
    pool: &DbPool,
    settings: &LoanSettings,
    profile_id: Uuid,
    request: SubmitApplicationRequest,
) -> Result<LoanApplication, AppError> {
    let amount_cents = to_cents(request.requested_amount)?;
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Requested amount must be positive".to_string(),
        ));
    }

    if !settings.is_allowed_term(request.terms_weeks) {
        return Err(AppError::InvalidRequest(format!(
            "terms_weeks must be one of {:?}",
            settings.allowed_terms_weeks
        )));
    }

    for url in request.documents.iter() {
        validate_document_url(url)?;
    }

    let rate = settings.default_interest_rate_percent;
    let terms = compute_loan_terms(from_cents(amount_cents), rate, request.terms_weeks)?;
    let terms_weeks = term_count_column(request.terms_weeks)?;

    let mut tx = pool.begin().await?;

    if let Err(e) =
        profile_service::apply_profile_update(&mut tx, profile_id, &request.profile).await
    {
        tx.rollback().await?;
        return Err(e);
    }

    let documents = request.documents;
    let application = sqlx::query_as::<_, LoanApplication>(
        r#"
        INSERT INTO loan_applications (
            profile_id, requested_amount_cents, interest_rate_percent, terms_weeks,
            weekly_payment_cents, status,
            driver_license_url, taxi_front_url, taxi_back_url, face_photo_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(profile_id)
    .bind(amount_cents)
    .bind(rate)
    .bind(terms_weeks)
    .bind(terms.installment_cents)
    .bind(ApplicationStatus::Submitted.as_str())
    .bind(documents.driver_license_url)
    .bind(documents.taxi_front_url)
    .bind(documents.taxi_back_url)
    .bind(documents.face_photo_url)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        application_id = %application.id,
        profile_id = %profile_id,
        amount_cents,
        terms_weeks,
        "Application submitted"
    );

    Ok(application)
}

/// Column values written by a review.
#[derive(Debug, PartialEq, Eq)]
struct ReviewFields {
    status: ApplicationStatus,
    approved_amount_cents: Option<i64>,
    weekly_payment_cents: i64,
    rejection_reason: Option<String>,
    pending_notes: Option<String>,
}

/// Work out what a review writes. Only the note matching the new status is
/// kept; an approval re-quotes the installment for the approved amount.
fn review_fields(
    application: &LoanApplication,
    request: ReviewApplicationRequest,
) -> Result<ReviewFields, AppError> {
    if !application.status.can_review() || !request.status.is_review_outcome() {
        return Err(AppError::InvalidStatusTransition {
            from: application.status.as_str().to_string(),
            to: request.status.as_str().to_string(),
        });
    }

    let mut fields = ReviewFields {
        status: request.status,
        approved_amount_cents: None,
        weekly_payment_cents: application.weekly_payment_cents,
        rejection_reason: None,
        pending_notes: None,
    };

    match request.status {
        ApplicationStatus::Approved => {
            let approved_cents = match request.approved_amount {
                Some(amount) => to_cents(amount)?,
                None => application.requested_amount_cents,
            };
            if approved_cents <= 0 {
                return Err(AppError::InvalidRequest(
                    "Approved amount must be positive".to_string(),
                ));
            }

            let terms_weeks = u32::try_from(application.terms_weeks).map_err(|_| {
                AppError::InvalidRequest("Stored term count is invalid".to_string())
            })?;
            let terms = compute_loan_terms(
                from_cents(approved_cents),
                application.interest_rate_percent,
                terms_weeks,
            )?;

            fields.approved_amount_cents = Some(approved_cents);
            fields.weekly_payment_cents = terms.installment_cents;
        }
        ApplicationStatus::Rejected => fields.rejection_reason = request.rejection_reason,
        ApplicationStatus::Pending => fields.pending_notes = request.pending_notes,
        _ => {}
    }

    Ok(fields)
}

/// Record a staff review decision.
///
/// # Errors
///
/// - `ApplicationNotFound`: no such application
/// - `InvalidStatusTransition`: application is funded or cancelled, or the
///   requested status is not a review outcome
/// - `InvalidRequest`: approved amount not positive
/// - `Database`: Database error occurred
pub async fn review_application(
    pool: &DbPool,
    reviewer_key_id: Uuid,
    application_id: Uuid,
    request: ReviewApplicationRequest,
) -> Result<LoanApplication, AppError> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
    )
    .bind(application_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(application) = locked else {
        tx.rollback().await?;
        return Err(AppError::ApplicationNotFound);
    };

    let fields = match review_fields(&application, request) {
        Ok(fields) => fields,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    let updated = sqlx::query_as::<_, LoanApplication>(
        r#"
        UPDATE loan_applications
        SET status = $2,
            approved_amount_cents = $3,
            weekly_payment_cents = $4,
            rejection_reason = $5,
            pending_notes = $6,
            reviewed_at = NOW(),
            reviewed_by = $7,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(application_id)
    .bind(fields.status.as_str())
    .bind(fields.approved_amount_cents)
    .bind(fields.weekly_payment_cents)
    .bind(fields.rejection_reason)
    .bind(fields.pending_notes)
    .bind(reviewer_key_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        application_id = %application_id,
        from = application.status.as_str(),
        to = updated.status.as_str(),
        "Application reviewed"
    );

    Ok(updated)
}

/// Cancel an application that has not been funded or decided against.
///
/// Borrowers can only cancel their own; staff can cancel any.
pub async fn cancel_application(
    pool: &DbPool,
    auth: &AuthContext,
    application_id: Uuid,
) -> Result<LoanApplication, AppError> {
    let visible_profile = auth.visible_profile()?;

    let mut tx = pool.begin().await?;

    let locked = sqlx::query_as::<_, LoanApplication>(
        r#"
        SELECT * FROM loan_applications
        WHERE id = $1 AND ($2::UUID IS NULL OR profile_id = $2)
        FOR UPDATE
        "#,
    )
    .bind(application_id)
    .bind(visible_profile)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(application) = locked else {
        tx.rollback().await?;
        return Err(AppError::ApplicationNotFound);
    };

    if !application.status.can_cancel() {
        tx.rollback().await?;
        return Err(AppError::InvalidStatusTransition {
            from: application.status.as_str().to_string(),
            to: ApplicationStatus::Cancelled.as_str().to_string(),
        });
    }

    let cancelled = sqlx::query_as::<_, LoanApplication>(
        r#"
        UPDATE loan_applications
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(application_id)
    .bind(ApplicationStatus::Cancelled.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(application_id = %application_id, "Application cancelled");

    Ok(cancelled)
}

/// Get one application. `visible_profile` restricts borrowers to their own.
pub async fn get_application(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    application_id: Uuid,
) -> Result<LoanApplication, AppError> {
    sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM loan_applications WHERE id = $1 AND ($2::UUID IS NULL OR profile_id = $2)",
    )
    .bind(application_id)
    .bind(visible_profile)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::ApplicationNotFound)
}

/// List applications, newest first.
pub async fn list_applications(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    query: &ListQuery<ApplicationStatus>,
) -> Result<PageResponse<LoanApplication>, AppError> {
    let page = query.page();
    let status = query.status.map(ApplicationStatus::as_str);

    let applications = sqlx::query_as::<_, LoanApplication>(
        r#"
        SELECT * FROM loan_applications
        WHERE ($1::UUID IS NULL OR profile_id = $1)
          AND ($2::TEXT IS NULL OR status = $2)
        ORDER BY submitted_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(visible_profile)
    .bind(status)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM loan_applications
        WHERE ($1::UUID IS NULL OR profile_id = $1)
          AND ($2::TEXT IS NULL OR status = $2)
        "#,
    )
    .bind(visible_profile)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(PageResponse::new(applications, page, total))
}

/// Term counts are validated as `u32` and stored as `INTEGER`.
pub(crate) fn term_count_column(terms_weeks: u32) -> Result<i32, AppError> {
    i32::try_from(terms_weeks)
        .map_err(|_| AppError::InvalidRequest("terms_weeks is too large".to_string()))
}

/// Validate a document link.
///
/// # Rules
///
/// - Must be a valid absolute URL with a host
/// - Must be HTTP or HTTPS
/// - Maximum 2048 characters
fn validate_document_url(url: &str) -> Result<(), AppError> {
    if url.len() > MAX_URL_LENGTH {
        return Err(AppError::InvalidRequest(
            "Document URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidRequest(format!("Invalid document URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(AppError::InvalidRequest(
            "Document URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn application(status: ApplicationStatus) -> LoanApplication {
        let now = Utc::now();
        LoanApplication {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            requested_amount_cents: 100_000,
            approved_amount_cents: None,
            interest_rate_percent: dec!(40),
            terms_weeks: 12,
            weekly_payment_cents: 11_667,
            status,
            rejection_reason: Some("old reason".to_string()),
            pending_notes: Some("old note".to_string()),
            driver_license_url: None,
            taxi_front_url: None,
            taxi_back_url: None,
            face_photo_url: None,
            reviewed_at: None,
            reviewed_by: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    fn review(status: ApplicationStatus) -> ReviewApplicationRequest {
        ReviewApplicationRequest {
            status,
            approved_amount: None,
            rejection_reason: Some("Incomplete documents".to_string()),
            pending_notes: Some("Waiting on licence".to_string()),
        }
    }

    #[test]
    fn test_approval_defaults_to_requested_amount() {
        let fields =
            review_fields(&application(ApplicationStatus::Submitted), review(ApplicationStatus::Approved))
                .unwrap();

        assert_eq!(fields.approved_amount_cents, Some(100_000));
        assert_eq!(fields.weekly_payment_cents, 11_667);
        assert_eq!(fields.rejection_reason, None);
        assert_eq!(fields.pending_notes, None);
    }

    #[test]
    fn test_partial_approval_requotes_installment() {
        let mut request = review(ApplicationStatus::Approved);
        request.approved_amount = Some(dec!(800));

        let fields = review_fields(&application(ApplicationStatus::Pending), request).unwrap();

        // 800.00 + 40% = 1120.00 over 12 weeks
        assert_eq!(fields.approved_amount_cents, Some(80_000));
        assert_eq!(fields.weekly_payment_cents, 9_333);
    }

    #[test]
    fn test_rejection_keeps_only_reason() {
        let fields =
            review_fields(&application(ApplicationStatus::Pending), review(ApplicationStatus::Rejected))
                .unwrap();

        assert_eq!(fields.status, ApplicationStatus::Rejected);
        assert_eq!(fields.rejection_reason.as_deref(), Some("Incomplete documents"));
        assert_eq!(fields.pending_notes, None);
        assert_eq!(fields.approved_amount_cents, None);
    }

    #[test]
    fn test_pending_keeps_only_notes() {
        let fields =
            review_fields(&application(ApplicationStatus::Rejected), review(ApplicationStatus::Pending))
                .unwrap();

        assert_eq!(fields.pending_notes.as_deref(), Some("Waiting on licence"));
        assert_eq!(fields.rejection_reason, None);
    }

    #[rstest]
    #[case(ApplicationStatus::Funded, ApplicationStatus::Approved)]
    #[case(ApplicationStatus::Cancelled, ApplicationStatus::Pending)]
    #[case(ApplicationStatus::Submitted, ApplicationStatus::Funded)]
    #[case(ApplicationStatus::Approved, ApplicationStatus::Cancelled)]
    fn test_review_refused(#[case] current: ApplicationStatus, #[case] target: ApplicationStatus) {
        let result = review_fields(&application(current), review(target));
        assert!(matches!(
            result,
            Err(AppError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_zero_approved_amount_rejected() {
        let mut request = review(ApplicationStatus::Approved);
        request.approved_amount = Some(dec!(0.004));

        let result = review_fields(&application(ApplicationStatus::Submitted), request);
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[rstest]
    #[case("https://files.example.com/licence.jpg", true)]
    #[case("http://storage.local:9000/taxi-front.png", true)]
    #[case("ftp://files.example.com/licence.jpg", false)]
    #[case("not a url", false)]
    #[case("file:///etc/passwd", false)]
    fn test_document_url(#[case] url: &str, #[case] valid: bool) {
        assert_eq!(validate_document_url(url).is_ok(), valid);
    }

    #[test]
    fn test_document_url_length_limit() {
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(validate_document_url(&long).is_err());
    }
}
