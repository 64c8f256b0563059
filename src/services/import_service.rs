//! Bulk import of historical clients and loans, and its undo.
//!
//! Each loan row is written in its own transaction together with its
//! application and payments, so one bad row never leaves half a loan behind
//! and never stops the rest of the import.

use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::{
    config::LoanSettings,
    db::DbPool,
    error::AppError,
    models::{
        application::ApplicationStatus,
        import::{
            ImportClient, ImportLoan, ImportReport, ImportRequest, PurgeReport, SectionReport,
        },
        loan::LoanStatus,
    },
    services::amortization::{PaymentOutcome, from_cents, replay_payments, to_cents},
};

/// A loan row resolved into the values that get stored.
#[derive(Debug)]
struct LoanPlan {
    principal_cents: i64,
    interest_cents: i64,
    total_cents: i64,
    installment_cents: i64,
    interest_rate_percent: Decimal,
    terms_weeks: i32,
    remaining_balance_cents: i64,
    terms_remaining: i32,
    status: LoanStatus,
    next_payment_date: NaiveDate,
    end_date: NaiveDate,

    /// Accepted payments in the order they were applied, with outcomes
    payments: Vec<(NaiveDate, i64, PaymentOutcome)>,

    /// Payment rows that could not be used
    rejected_payments: Vec<String>,

    /// Row imported, but something about it looks off
    warnings: Vec<String>,
}

/// Resolve one loan row: validate amounts, replay its payments from the
/// sheet total and work out where the loan stands now.
fn plan_loan(row: &ImportLoan, interval: Duration) -> Result<LoanPlan, String> {
    let principal_cents = to_cents(row.amount).map_err(|e| e.to_string())?;
    let interest_cents = to_cents(row.interests).map_err(|e| e.to_string())?;
    let total_cents = to_cents(row.total_amount).map_err(|e| e.to_string())?;

    if principal_cents <= 0 {
        return Err("Loan amount must be positive".to_string());
    }
    if total_cents < principal_cents {
        return Err("Total amount is less than the loan amount".to_string());
    }
    if principal_cents.checked_add(interest_cents) != Some(total_cents) {
        return Err(format!(
            "Total amount {} does not equal amount {} plus interest {}",
            from_cents(total_cents),
            from_cents(principal_cents),
            from_cents(interest_cents)
        ));
    }
    if row.terms_weeks == 0 {
        return Err("Terms must be at least one week".to_string());
    }
    let terms_weeks =
        i32::try_from(row.terms_weeks).map_err(|_| "Terms out of range".to_string())?;

    let installment_cents = if row.weekly_repay_min > Decimal::ZERO {
        to_cents(row.weekly_repay_min).map_err(|e| e.to_string())?
    } else {
        to_cents(from_cents(total_cents) / Decimal::from(row.terms_weeks))
            .map_err(|e| e.to_string())?
    };
    if installment_cents <= 0 {
        return Err("Weekly repayment rounds to zero".to_string());
    }

    // One cent of rounding per term is tolerated.
    let mut warnings = Vec::new();
    let covered = installment_cents
        .checked_mul(i64::from(row.terms_weeks))
        .unwrap_or(i64::MAX);
    if covered < total_cents - i64::from(row.terms_weeks) {
        warnings.push(format!(
            "{}: weekly minimum {} does not cover the total over {} weeks",
            row.describe(),
            from_cents(installment_cents),
            row.terms_weeks
        ));
    }

    let interest_rate_percent = (Decimal::from(interest_cents) * Decimal::ONE_HUNDRED
        / Decimal::from(principal_cents))
    .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);

    let mut dated = Vec::with_capacity(row.payments.len());
    let mut rejected_payments = Vec::new();
    for payment in &row.payments {
        match to_cents(payment.amount) {
            Ok(cents) if cents > 0 => dated.push((payment.date, cents)),
            Ok(_) => rejected_payments.push(format!(
                "{}: payment on {} ignored, amount must be positive",
                row.describe(),
                payment.date
            )),
            Err(e) => rejected_payments.push(format!(
                "{}: payment on {} ignored, {e}",
                row.describe(),
                payment.date
            )),
        }
    }
    // Stable, so same-day payments keep sheet order.
    dated.sort_by_key(|(date, _)| *date);

    let outcomes = replay_payments(
        total_cents,
        installment_cents,
        dated.iter().map(|(_, cents)| *cents),
    )
    .map_err(|e| e.to_string())?;

    let (remaining_balance_cents, terms_remaining) = match outcomes.last() {
        Some(last) => (
            last.balance_after_cents,
            i32::try_from(last.terms_remaining).map_err(|_| "Terms out of range".to_string())?,
        ),
        None => (total_cents, terms_weeks),
    };

    let status = if row.is_marked_finished() || remaining_balance_cents == 0 {
        LoanStatus::Completed
    } else {
        LoanStatus::Active
    };

    let out_of_range = || "Date out of range".to_string();
    let next_payment_date = match dated.last() {
        Some((last_date, _)) => last_date.checked_add_signed(interval),
        None => row
            .first_repayment_date
            .or_else(|| row.start_date.checked_add_signed(interval)),
    }
    .ok_or_else(out_of_range)?;
    let end_date = match row.end_date {
        Some(end_date) => end_date,
        None => interval
            .checked_mul(terms_weeks)
            .and_then(|span| row.start_date.checked_add_signed(span))
            .ok_or_else(out_of_range)?,
    };

    let payments = dated
        .into_iter()
        .zip(outcomes)
        .map(|((date, cents), outcome)| (date, cents, outcome))
        .collect();

    Ok(LoanPlan {
        principal_cents,
        interest_cents,
        total_cents,
        installment_cents,
        interest_rate_percent,
        terms_weeks,
        remaining_balance_cents,
        terms_remaining,
        status,
        next_payment_date,
        end_date,
        payments,
        rejected_payments,
        warnings,
    })
}

/// Import clients and loans from parsed spreadsheet rows.
///
/// Rows already present (by `client_no` / `loan_no`) are skipped, so the
/// same file can be imported twice. Failures are reported per row.
pub async fn import(
    pool: &DbPool,
    settings: &LoanSettings,
    request: ImportRequest,
) -> Result<ImportReport, AppError> {
    let mut report = ImportReport::default();

    if request.mode.includes_clients() {
        for client in &request.clients {
            import_client(pool, client, &mut report.clients).await?;
        }
    }

    if request.mode.includes_loans() {
        for row in &request.loans {
            import_loan(pool, settings, row, &mut report).await?;
        }
    }

    tracing::info!(
        clients = report.clients.success,
        clients_skipped = report.clients.skipped,
        loans = report.loans.success,
        loans_skipped = report.loans.skipped,
        payments = report.payments.success,
        errors = report.clients.errors.len() + report.loans.errors.len() + report.payments.errors.len(),
        "Import finished"
    );

    Ok(report)
}

async fn import_client(
    pool: &DbPool,
    client: &ImportClient,
    section: &mut SectionReport,
) -> Result<(), AppError> {
    let client_no = client.client_no.trim();
    let full_name = client.full_name.trim();
    if client_no.is_empty() || full_name.is_empty() {
        section
            .errors
            .push(format!("{client_no} - {full_name}: client number and name are required"));
        return Ok(());
    }

    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM profiles WHERE client_no = $1")
        .bind(client_no)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        section.skipped += 1;
        return Ok(());
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO profiles (
            client_no, full_name, email, occupation, id1_type, id1_number,
            id2_type, id2_number, address, phone_number, vehicle_number_plate, late_history
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(client_no)
    .bind(full_name)
    .bind(&client.email)
    .bind(&client.occupation)
    .bind(&client.id1_type)
    .bind(&client.id1_number)
    .bind(&client.id2_type)
    .bind(&client.id2_number)
    .bind(&client.address)
    .bind(&client.phone_number)
    .bind(&client.vehicle_number_plate)
    .bind(client.late_history.unwrap_or(0).max(0))
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => section.success += 1,
        Err(e) => {
            tracing::warn!(client_no, error = %e, "Client import failed");
            section.errors.push(format!("{client_no} - {full_name}: {e}"));
        }
    }

    Ok(())
}

async fn import_loan(
    pool: &DbPool,
    settings: &LoanSettings,
    row: &ImportLoan,
    report: &mut ImportReport,
) -> Result<(), AppError> {
    let loan_no = row.loan_no.trim();
    if loan_no.is_empty() {
        report
            .loans
            .errors
            .push(format!("{}: loan number is required", row.describe()));
        return Ok(());
    }

    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM loans WHERE loan_no = $1")
        .bind(loan_no)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        report.loans.skipped += 1;
        return Ok(());
    }

    let profile_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM profiles WHERE client_no = $1")
            .bind(row.client_no.trim())
            .fetch_optional(pool)
            .await?;
    let Some(profile_id) = profile_id else {
        tracing::warn!(loan_no, client_no = %row.client_no, "Loan import skipped, unknown client");
        report.loans.errors.push(format!(
            "{}: Client {} not found",
            row.describe(),
            row.client_no
        ));
        return Ok(());
    };

    let plan = match plan_loan(row, settings.payment_interval()) {
        Ok(plan) => plan,
        Err(message) => {
            tracing::warn!(loan_no, %message, "Loan import rejected");
            report.loans.errors.push(format!("{}: {message}", row.describe()));
            return Ok(());
        }
    };

    for warning in &plan.warnings {
        tracing::warn!(loan_no, %warning, "Suspicious loan row");
    }

    match write_loan(pool, profile_id, loan_no, row, &plan).await {
        Ok(()) => {
            report.loans.success += 1;
            report.payments.success += plan.payments.len();
            report.payments.errors.extend(plan.rejected_payments);
        }
        Err(e) => {
            tracing::error!(loan_no, error = %e, "Loan import failed");
            report.loans.errors.push(format!("{}: {e}", row.describe()));
        }
    }

    Ok(())
}

/// Write the application, loan and payments for one planned row.
async fn write_loan(
    pool: &DbPool,
    profile_id: Uuid,
    loan_no: &str,
    row: &ImportLoan,
    plan: &LoanPlan,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let application_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO loan_applications (
            profile_id, requested_amount_cents, approved_amount_cents,
            interest_rate_percent, terms_weeks, weekly_payment_cents, status
        )
        VALUES ($1, $2, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(profile_id)
    .bind(plan.principal_cents)
    .bind(plan.interest_rate_percent)
    .bind(plan.terms_weeks)
    .bind(plan.installment_cents)
    .bind(ApplicationStatus::Funded.as_str())
    .fetch_one(&mut *tx)
    .await?;

    let loan_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO loans (
            application_id, profile_id, loan_no, principal_cents, interest_rate_percent,
            interest_cents, total_cents, installment_cents, remaining_balance_cents,
            terms_weeks, terms_remaining, start_date, next_payment_date, end_date,
            signed_date, paid_by, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING id
        "#,
    )
    .bind(application_id)
    .bind(profile_id)
    .bind(loan_no)
    .bind(plan.principal_cents)
    .bind(plan.interest_rate_percent)
    .bind(plan.interest_cents)
    .bind(plan.total_cents)
    .bind(plan.installment_cents)
    .bind(plan.remaining_balance_cents)
    .bind(plan.terms_weeks)
    .bind(plan.terms_remaining)
    .bind(row.start_date)
    .bind(plan.next_payment_date)
    .bind(plan.end_date)
    .bind(row.signed_date)
    .bind(&row.paid_by)
    .bind(plan.status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    for (payment_date, amount_cents, outcome) in &plan.payments {
        sqlx::query(
            r#"
            INSERT INTO payments (
                loan_id, profile_id, amount_cents, balance_before_cents,
                balance_after_cents, payment_date, paid_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(loan_id)
        .bind(profile_id)
        .bind(amount_cents)
        .bind(outcome.balance_before_cents)
        .bind(outcome.balance_after_cents)
        .bind(payment_date)
        .bind(&row.paid_by)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(loan_no, %loan_id, payments = plan.payments.len(), "Imported loan");

    Ok(())
}

/// Delete everything bulk import created: numbered loans with their
/// payments and applications, then numbered client profiles.
///
/// Profiles cascade to their API keys and any remaining applications.
pub async fn purge(pool: &DbPool) -> Result<PurgeReport, AppError> {
    let mut tx = pool.begin().await?;

    let application_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT application_id FROM loans WHERE loan_no IS NOT NULL")
            .fetch_all(&mut *tx)
            .await?;

    let payments = sqlx::query(
        "DELETE FROM payments WHERE loan_id IN (SELECT id FROM loans WHERE loan_no IS NOT NULL)",
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let loans = sqlx::query("DELETE FROM loans WHERE loan_no IS NOT NULL")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let applications = sqlx::query("DELETE FROM loan_applications WHERE id = ANY($1)")
        .bind(&application_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let profiles = sqlx::query("DELETE FROM profiles WHERE client_no IS NOT NULL")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    let report = PurgeReport {
        payments,
        loans,
        applications,
        profiles,
    };
    tracing::info!(?report, "Imported data purged");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::import::ImportPayment;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row() -> ImportLoan {
        ImportLoan {
            loan_no: "L-001".to_string(),
            client_no: "C-001".to_string(),
            client_name: "Tama Ngata".to_string(),
            amount: dec!(1000),
            interests: dec!(400),
            total_amount: dec!(1400),
            terms_weeks: 12,
            weekly_repay_min: Decimal::ZERO,
            signed_date: None,
            paid_by: None,
            start_date: date(2024, 1, 8),
            first_repayment_date: None,
            end_date: None,
            status: "Active".to_string(),
            payments: Vec::new(),
        }
    }

    fn payment(day: u32, amount: Decimal) -> ImportPayment {
        ImportPayment {
            date: date(2024, 1, day),
            amount,
        }
    }

    #[test]
    fn test_unpaid_loan_keeps_full_balance() {
        let plan = plan_loan(&row(), Duration::days(7)).unwrap();

        assert_eq!(plan.total_cents, 140_000);
        assert_eq!(plan.installment_cents, 11_667);
        assert_eq!(plan.interest_rate_percent, dec!(40));
        assert_eq!(plan.remaining_balance_cents, 140_000);
        assert_eq!(plan.terms_remaining, 12);
        assert_eq!(plan.status, LoanStatus::Active);
        assert_eq!(plan.next_payment_date, date(2024, 1, 15));
        assert_eq!(plan.end_date, date(2024, 4, 1));
    }

    #[test]
    fn test_payments_replayed_in_date_order() {
        let mut loan = row();
        loan.weekly_repay_min = dec!(116.67);
        loan.payments = vec![payment(22, dec!(200)), payment(15, dec!(116.67))];

        let plan = plan_loan(&loan, Duration::days(7)).unwrap();

        let balances: Vec<_> = plan
            .payments
            .iter()
            .map(|(date, cents, outcome)| (*date, *cents, outcome.balance_after_cents))
            .collect();
        assert_eq!(
            balances,
            vec![
                (date(2024, 1, 15), 11_667, 128_333),
                (date(2024, 1, 22), 20_000, 108_333),
            ]
        );
        assert_eq!(plan.remaining_balance_cents, 108_333);
        assert_eq!(plan.terms_remaining, 10);
        assert_eq!(plan.next_payment_date, date(2024, 1, 29));
    }

    #[test]
    fn test_paid_off_loan_completed() {
        let mut loan = row();
        loan.payments = vec![payment(15, dec!(1500))];

        let plan = plan_loan(&loan, Duration::days(7)).unwrap();

        assert_eq!(plan.remaining_balance_cents, 0);
        assert_eq!(plan.terms_remaining, 0);
        assert_eq!(plan.status, LoanStatus::Completed);
    }

    #[test]
    fn test_finished_status_wins_over_balance() {
        let mut loan = row();
        loan.status = "FINISHED".to_string();

        let plan = plan_loan(&loan, Duration::days(7)).unwrap();

        assert_eq!(plan.status, LoanStatus::Completed);
        assert_eq!(plan.remaining_balance_cents, 140_000);
    }

    #[test]
    fn test_non_positive_payments_reported_not_applied() {
        let mut loan = row();
        loan.payments = vec![payment(15, dec!(0)), payment(22, dec!(-5)), payment(29, dec!(100))];

        let plan = plan_loan(&loan, Duration::days(7)).unwrap();

        assert_eq!(plan.payments.len(), 1);
        assert_eq!(plan.rejected_payments.len(), 2);
        assert_eq!(plan.remaining_balance_cents, 130_000);
    }

    #[test]
    fn test_total_below_amount_rejected() {
        let mut loan = row();
        loan.total_amount = dec!(900);

        assert_eq!(
            plan_loan(&loan, Duration::days(7)).unwrap_err(),
            "Total amount is less than the loan amount"
        );
    }

    #[test]
    fn test_total_must_equal_amount_plus_interest() {
        let mut loan = row();
        loan.total_amount = dec!(1500);

        let message = plan_loan(&loan, Duration::days(7)).unwrap_err();
        assert_eq!(
            message,
            "Total amount 1500.00 does not equal amount 1000.00 plus interest 400.00"
        );
    }

    #[test]
    fn test_stored_amounts_add_up() {
        let plan = plan_loan(&row(), Duration::days(7)).unwrap();
        assert_eq!(plan.principal_cents + plan.interest_cents, plan.total_cents);
    }

    #[rstest]
    #[case(dec!(0.01), true)]
    #[case(dec!(100), true)]
    #[case(dec!(116.66), false)]
    #[case(dec!(116.67), false)]
    #[case(dec!(200), false)]
    fn test_low_weekly_minimum_flagged(#[case] weekly: Decimal, #[case] flagged: bool) {
        let mut loan = row();
        loan.weekly_repay_min = weekly;

        let plan = plan_loan(&loan, Duration::days(7)).unwrap();
        assert_eq!(!plan.warnings.is_empty(), flagged);
    }

    #[test]
    fn test_zero_terms_rejected() {
        let mut loan = row();
        loan.terms_weeks = 0;
        assert!(plan_loan(&loan, Duration::days(7)).is_err());
    }

    #[test]
    fn test_sheet_dates_preferred() {
        let mut loan = row();
        loan.first_repayment_date = Some(date(2024, 1, 19));
        loan.end_date = Some(date(2024, 4, 5));

        let plan = plan_loan(&loan, Duration::days(7)).unwrap();

        assert_eq!(plan.next_payment_date, date(2024, 1, 19));
        assert_eq!(plan.end_date, date(2024, 4, 5));
    }
}
