//! Loan service - funding and repayment.
//!
//! This service handles:
//! - Turning an approved application into a loan
//! - Recording repayments against a loan's remaining balance
//! - Idempotency checking
//! - Writing loans off as defaulted
//!
//! # Atomicity Guarantees
//!
//! Balance changes run inside a PostgreSQL transaction with the loan row
//! locked `FOR UPDATE`. Concurrent payments on one loan serialize; each one
//! sees the balance the previous one left.

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    config::LoanSettings,
    db::DbPool,
    error::AppError,
    models::{
        application::{ApplicationStatus, FundLoanRequest, LoanApplication},
        loan::{Loan, LoanStatus},
        pagination::{ListQuery, PageQuery, PageResponse},
        payment::{Payment, RecordPaymentRequest},
    },
    services::amortization::{apply_payment, compute_loan_terms, from_cents, to_cents},
};

/// First due date and final due date of a new loan.
#[derive(Debug, PartialEq, Eq)]
struct Schedule {
    next_payment_date: NaiveDate,
    end_date: NaiveDate,
}

fn schedule(start: NaiveDate, interval: Duration, terms_weeks: u32) -> Result<Schedule, AppError> {
    let out_of_range = || AppError::InvalidRequest("Repayment schedule out of range".to_string());

    let next_payment_date = start.checked_add_signed(interval).ok_or_else(out_of_range)?;
    let end_date = interval
        .checked_mul(i32::try_from(terms_weeks).map_err(|_| out_of_range())?)
        .and_then(|span| start.checked_add_signed(span))
        .ok_or_else(out_of_range)?;

    Ok(Schedule {
        next_payment_date,
        end_date,
    })
}

fn next_due(payment_date: NaiveDate, interval: Duration) -> Result<NaiveDate, AppError> {
    payment_date
        .checked_add_signed(interval)
        .ok_or_else(|| AppError::InvalidRequest("Payment date out of range".to_string()))
}

fn terms_column(terms: u32) -> Result<i32, AppError> {
    i32::try_from(terms).map_err(|_| AppError::InvalidRequest("Term count too large".to_string()))
}

/// The answer to a request whose idempotency key was already used.
fn replayed(existing: Payment, loan_id: Uuid) -> Result<Payment, AppError> {
    if existing.loan_id != loan_id {
        return Err(AppError::InvalidRequest(
            "Idempotency key already used for another loan".to_string(),
        ));
    }
    Ok(existing)
}

/// Fund an approved application.
///
/// # Process
///
/// 1. Lock the application and check it is approved
/// 2. Compute terms from the approved amount, the application's rate and term count
/// 3. Insert the loan with the full total outstanding
/// 4. Mark the application funded
/// 5. Commit (or rollback on error)
///
/// # Errors
///
/// - `ApplicationNotFound`: no such application
/// - `InvalidStatusTransition`: application is not approved
/// - `LoanArithmetic`: stored amounts violate the loan math preconditions
/// - `Database`: Database error occurred
pub async fn fund_loan(
    pool: &DbPool,
    settings: &LoanSettings,
    application_id: Uuid,
    request: FundLoanRequest,
) -> Result<Loan, AppError> {
    let start_date = request
        .start_date
        .unwrap_or_else(|| Utc::now().date_naive());

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

    if !application.status.can_fund() {
        tx.rollback().await?;
        return Err(AppError::InvalidStatusTransition {
            from: application.status.as_str().to_string(),
            to: ApplicationStatus::Funded.as_str().to_string(),
        });
    }

    let principal_cents = application
        .approved_amount_cents
        .unwrap_or(application.requested_amount_cents);

    let prepared = u32::try_from(application.terms_weeks)
        .map_err(|_| AppError::InvalidRequest("Stored term count is invalid".to_string()))
        .and_then(|terms_weeks| {
            let terms = compute_loan_terms(
                from_cents(principal_cents),
                application.interest_rate_percent,
                terms_weeks,
            )?;
            let dates = schedule(start_date, settings.payment_interval(), terms_weeks)?;
            Ok((terms, dates))
        });

    let (terms, dates) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    let loan = sqlx::query_as::<_, Loan>(
        r#"
        INSERT INTO loans (
            application_id, profile_id, principal_cents, interest_rate_percent,
            interest_cents, total_cents, installment_cents, remaining_balance_cents,
            terms_weeks, terms_remaining, start_date, next_payment_date, end_date,
            signed_date, paid_by, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $8, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(application.id)
    .bind(application.profile_id)
    .bind(terms.principal_cents)
    .bind(application.interest_rate_percent)
    .bind(terms.interest_cents)
    .bind(terms.total_payable_cents)
    .bind(terms.installment_cents)
    .bind(application.terms_weeks)
    .bind(start_date)
    .bind(dates.next_payment_date)
    .bind(dates.end_date)
    .bind(request.signed_date)
    .bind(request.paid_by)
    .bind(LoanStatus::Active.as_str())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE loan_applications SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(application.id)
        .bind(ApplicationStatus::Funded.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        loan_id = %loan.id,
        application_id = %application.id,
        principal_cents = loan.principal_cents,
        total_cents = loan.total_cents,
        installment_cents = loan.installment_cents,
        "Loan funded"
    );

    Ok(loan)
}

/// Record a repayment.
///
/// # Process
///
/// 1. Check for duplicate idempotency key
/// 2. Start database transaction
/// 3. Lock the loan and check it is active
/// 4. Apply the payment to the remaining balance
/// 5. Record the payment and update the loan
/// 6. Commit (or rollback on error)
///
/// # Returns
///
/// The created (or existing) payment record
///
/// # Errors
///
/// - `LoanNotFound`: Loan doesn't exist
/// - `LoanNotActive`: Loan is completed or defaulted
/// - `InvalidRequest`: Amount is zero or negative, or the idempotency key
///   belongs to another loan
/// - `Database`: Database error occurred
pub async fn record_payment(
    pool: &DbPool,
    settings: &LoanSettings,
    recorded_by: Uuid,
    loan_id: Uuid,
    request: RecordPaymentRequest,
) -> Result<Payment, AppError> {
    let amount_cents = to_cents(request.amount)?;
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    // Checked outside the transaction. A concurrent insert with the same key
    // fails on the unique index instead.
    if let Some(ref key) = request.idempotency_key {
        if let Some(existing) =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(pool)
                .await?
        {
            return replayed(existing, loan_id);
        }
    }

    let payment_date = request
        .payment_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let next_payment_date = next_due(payment_date, settings.payment_interval())?;

    let mut tx = pool.begin().await?;

    let locked = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(loan) = locked else {
        tx.rollback().await?;
        return Err(AppError::LoanNotFound);
    };

    if loan.status != LoanStatus::Active {
        tx.rollback().await?;
        return Err(AppError::LoanNotActive);
    }

    let applied = apply_payment(
        loan.remaining_balance_cents,
        loan.installment_cents,
        amount_cents,
    )
    .map_err(AppError::from)
    .and_then(|outcome| Ok((terms_column(outcome.terms_remaining)?, outcome)));

    let (terms_remaining, outcome) = match applied {
        Ok(applied) => applied,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (
            loan_id, profile_id, amount_cents, balance_before_cents, balance_after_cents,
            payment_date, notes, paid_by, idempotency_key, recorded_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(loan.id)
    .bind(loan.profile_id)
    .bind(amount_cents)
    .bind(outcome.balance_before_cents)
    .bind(outcome.balance_after_cents)
    .bind(payment_date)
    .bind(request.notes)
    .bind(request.paid_by)
    .bind(request.idempotency_key)
    .bind(recorded_by)
    .fetch_one(&mut *tx)
    .await?;

    let status = LoanStatus::after_payment(outcome.is_paid_off);

    sqlx::query(
        r#"
        UPDATE loans
        SET remaining_balance_cents = $2,
            terms_remaining = $3,
            next_payment_date = $4,
            status = $5,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(loan.id)
    .bind(outcome.balance_after_cents)
    .bind(terms_remaining)
    .bind(next_payment_date)
    .bind(status.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        loan_id = %loan.id,
        payment_id = %payment.id,
        amount_cents,
        balance_after_cents = outcome.balance_after_cents,
        terms_remaining,
        "Payment recorded"
    );
    if outcome.overpayment_cents > 0 {
        tracing::warn!(
            loan_id = %loan.id,
            overpayment_cents = outcome.overpayment_cents,
            "Payment exceeded remaining balance"
        );
    }
    if outcome.is_paid_off {
        tracing::info!(loan_id = %loan.id, "Loan completed");
    }

    Ok(payment)
}

/// Write off an active loan.
pub async fn mark_defaulted(pool: &DbPool, loan_id: Uuid) -> Result<Loan, AppError> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(loan) = locked else {
        tx.rollback().await?;
        return Err(AppError::LoanNotFound);
    };

    if loan.status != LoanStatus::Active {
        tx.rollback().await?;
        return Err(AppError::LoanNotActive);
    }

    let loan = sqlx::query_as::<_, Loan>(
        "UPDATE loans SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(loan_id)
    .bind(LoanStatus::Defaulted.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::warn!(
        loan_id = %loan.id,
        remaining_balance_cents = loan.remaining_balance_cents,
        "Loan marked defaulted"
    );

    Ok(loan)
}

/// Get one loan. `visible_profile` restricts borrowers to their own.
pub async fn get_loan(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    loan_id: Uuid,
) -> Result<Loan, AppError> {
    sqlx::query_as::<_, Loan>(
        "SELECT * FROM loans WHERE id = $1 AND ($2::UUID IS NULL OR profile_id = $2)",
    )
    .bind(loan_id)
    .bind(visible_profile)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::LoanNotFound)
}

/// List loans, newest first.
pub async fn list_loans(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    query: &ListQuery<LoanStatus>,
) -> Result<PageResponse<Loan>, AppError> {
    let page = query.page();
    let status = query.status.map(LoanStatus::as_str);

    let loans = sqlx::query_as::<_, Loan>(
        r#"
        SELECT * FROM loans
        WHERE ($1::UUID IS NULL OR profile_id = $1)
          AND ($2::TEXT IS NULL OR status = $2)
        ORDER BY created_at DESC
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
        SELECT COUNT(*) FROM loans
        WHERE ($1::UUID IS NULL OR profile_id = $1)
          AND ($2::TEXT IS NULL OR status = $2)
        "#,
    )
    .bind(visible_profile)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(PageResponse::new(loans, page, total))
}

/// All payments on one loan, in the order they were applied.
pub async fn list_loan_payments(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    loan_id: Uuid,
) -> Result<Vec<Payment>, AppError> {
    let loan = get_loan(pool, visible_profile, loan_id).await?;

    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE loan_id = $1 ORDER BY payment_date, created_at",
    )
    .bind(loan.id)
    .fetch_all(pool)
    .await?;

    Ok(payments)
}

/// List payments across loans, most recent payment date first.
pub async fn list_payments(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    query: &PageQuery,
) -> Result<PageResponse<Payment>, AppError> {
    let page = query.page();

    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT * FROM payments
        WHERE $1::UUID IS NULL OR profile_id = $1
        ORDER BY payment_date DESC, created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(visible_profile)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE $1::UUID IS NULL OR profile_id = $1")
            .bind(visible_profile)
            .fetch_one(pool)
            .await?;

    Ok(PageResponse::new(payments, page, total))
}

pub async fn get_payment(
    pool: &DbPool,
    visible_profile: Option<Uuid>,
    payment_id: Uuid,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE id = $1 AND ($2::UUID IS NULL OR profile_id = $2)",
    )
    .bind(payment_id)
    .bind(visible_profile)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::PaymentNotFound)
}
