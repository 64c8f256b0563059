//! Loan arithmetic engine.
//!
//! Flat-rate loan terms and payment application, computed in integer cents.
//!
//! # Money representation
//!
//! Every step that mixes multiplication/division with subtraction runs on
//! `i64` cents, so a series of payments that sums to the total payable
//! always drives the balance to exactly zero. `Decimal` only appears at the
//! edges, where amounts enter (`to_cents`) or leave (`from_cents`) the engine.
//!
//! All functions are pure: no I/O, no clock, no shared state. Callers are
//! responsible for holding a consistent snapshot of the balance (the loan
//! service locks the loan row `FOR UPDATE` for that).

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Serialize;

/// Precondition violations.
///
/// Inputs are validated at the HTTP boundary, so reaching one of these means
/// a caller skipped validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmortizationError {
    #[error("Principal must be positive")]
    NonPositivePrincipal,

    #[error("Interest rate cannot be negative")]
    NegativeRate,

    #[error("Term count must be at least 1")]
    ZeroTermCount,

    #[error("Installment must be positive")]
    NonPositiveInstallment,

    #[error("Balance cannot be negative")]
    NegativeBalance,

    #[error("Payment amount must be positive")]
    NonPositivePayment,

    #[error("Amount is out of range")]
    Overflow,
}

/// Derived terms of a flat-rate loan.
///
/// # Example
///
/// Principal 1000.00 at 40% over 12 weeks:
///
/// ```json
/// {
///   "principal_cents": 100000,
///   "interest_cents": 40000,
///   "total_payable_cents": 140000,
///   "installment_cents": 11667,
///   "term_count": 12
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoanTerms {
    pub principal_cents: i64,
    pub interest_cents: i64,
    pub total_payable_cents: i64,
    pub installment_cents: i64,
    pub term_count: u32,
}

impl LoanTerms {
    /// Total payable in currency units, 2 decimal places.
    pub fn total_payable(&self) -> Decimal {
        from_cents(self.total_payable_cents)
    }

    /// Per-period installment in currency units, 2 decimal places.
    pub fn installment(&self) -> Decimal {
        from_cents(self.installment_cents)
    }
}

/// Result of applying one payment to a loan balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentOutcome {
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,

    /// `ceil(balance_after / installment)`, or 0 once paid off.
    ///
    /// Recomputed from the balance rather than decremented, so a large
    /// payment can clear several terms at once.
    pub terms_remaining: u32,

    pub is_paid_off: bool,

    /// Part of the payment beyond the outstanding balance.
    ///
    /// Absorbed, never carried as credit.
    pub overpayment_cents: i64,
}

/// Convert a currency amount to cents, rounding half away from zero.
pub fn to_cents(amount: Decimal) -> Result<i64, AmortizationError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(AmortizationError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AmortizationError::Overflow)
}

/// Convert cents back to a currency amount with exactly 2 decimal places.
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Compute total payable and installment for a flat-rate loan.
///
/// # Algorithm
///
/// 1. `principal_cents = round(principal * 100)`
/// 2. `interest_cents = round(principal_cents * rate / 100)`
/// 3. `total = principal_cents + interest_cents`
/// 4. `installment = round(total / term_count)`
///
/// The remainder of step 4 is not spread across periods. The last payment
/// settles whatever balance is left, so rounding never overcharges in total.
///
/// # Errors
///
/// - `NonPositivePrincipal`: principal rounds to zero cents or below
/// - `NegativeRate`: annual rate below zero
/// - `ZeroTermCount`: no repayment periods
/// - `Overflow`: amounts outside the `i64` cents range
pub fn compute_loan_terms(
    principal: Decimal,
    annual_rate_percent: Decimal,
    term_count: u32,
) -> Result<LoanTerms, AmortizationError> {
    if annual_rate_percent < Decimal::ZERO {
        return Err(AmortizationError::NegativeRate);
    }
    if term_count == 0 {
        return Err(AmortizationError::ZeroTermCount);
    }

    let principal_cents = to_cents(principal)?;
    if principal_cents <= 0 {
        return Err(AmortizationError::NonPositivePrincipal);
    }

    let interest_cents = Decimal::from(principal_cents)
        .checked_mul(annual_rate_percent)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(AmortizationError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AmortizationError::Overflow)?;

    let total_payable_cents = principal_cents
        .checked_add(interest_cents)
        .ok_or(AmortizationError::Overflow)?;

    Ok(LoanTerms {
        principal_cents,
        interest_cents,
        total_payable_cents,
        installment_cents: div_round_half_up(total_payable_cents, i64::from(term_count)),
        term_count,
    })
}

/// Apply a payment to a balance.
///
/// The balance floors at zero; anything paid beyond it is reported in
/// `overpayment_cents` and otherwise dropped.
///
/// # Errors
///
/// - `NegativeBalance`, `NonPositiveInstallment`, `NonPositivePayment`:
///   caller passed values that validation should have rejected
/// - `Overflow`: terms remaining does not fit in `u32`
pub fn apply_payment(
    balance_before_cents: i64,
    installment_cents: i64,
    payment_cents: i64,
) -> Result<PaymentOutcome, AmortizationError> {
    if balance_before_cents < 0 {
        return Err(AmortizationError::NegativeBalance);
    }
    if installment_cents <= 0 {
        return Err(AmortizationError::NonPositiveInstallment);
    }
    if payment_cents <= 0 {
        return Err(AmortizationError::NonPositivePayment);
    }

    // Both operands are non-negative, so this cannot overflow.
    let balance_after_cents = (balance_before_cents - payment_cents).max(0);
    let overpayment_cents = (payment_cents - balance_before_cents).max(0);

    let terms_remaining = if balance_after_cents == 0 {
        0
    } else {
        u32::try_from(div_ceil(balance_after_cents, installment_cents))
            .map_err(|_| AmortizationError::Overflow)?
    };

    Ok(PaymentOutcome {
        balance_before_cents,
        balance_after_cents,
        terms_remaining,
        is_paid_off: balance_after_cents == 0,
        overpayment_cents,
    })
}

/// Run payments, in chronological order, against a loan that starts at
/// `total_payable_cents`.
///
/// Returns one outcome per payment. Bulk import uses this so historical
/// loans end in the same state as loans built up through
/// [`apply_payment`] one payment at a time.
pub fn replay_payments<I>(
    total_payable_cents: i64,
    installment_cents: i64,
    payments: I,
) -> Result<Vec<PaymentOutcome>, AmortizationError>
where
    I: IntoIterator<Item = i64>,
{
    let mut balance = total_payable_cents;
    let mut outcomes = Vec::new();

    for amount in payments {
        let outcome = apply_payment(balance, installment_cents, amount)?;
        balance = outcome.balance_after_cents;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// `round(numerator / denominator)` with halves rounded up.
///
/// Both arguments must be non-negative and the denominator non-zero.
fn div_round_half_up(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder >= denominator - remainder {
        quotient + 1
    } else {
        quotient
    }
}

fn div_ceil(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    if numerator % denominator == 0 {
        quotient
    } else {
        quotient + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_forty_percent_over_twelve_weeks() {
        let terms = compute_loan_terms(dec!(1000), dec!(40), 12).unwrap();

        assert_eq!(terms.principal_cents, 100_000);
        assert_eq!(terms.interest_cents, 40_000);
        assert_eq!(terms.total_payable_cents, 140_000);
        assert_eq!(terms.installment_cents, 11_667);
        assert_eq!(terms.total_payable(), dec!(1400.00));
        assert_eq!(terms.installment(), dec!(116.67));
    }

    #[rstest]
    #[case(dec!(500), dec!(40), 8, 70_000, 8_750)]
    #[case(dec!(1000), dec!(0), 24, 100_000, 4_167)]
    #[case(dec!(333.33), dec!(40), 16, 46_666, 2_917)]
    #[case(dec!(0.01), dec!(50), 1, 2, 2)]
    #[case(dec!(2500), dec!(12.5), 20, 281_250, 14_063)]
    fn test_compute_loan_terms_cases(
        #[case] principal: Decimal,
        #[case] rate: Decimal,
        #[case] term_count: u32,
        #[case] total_cents: i64,
        #[case] installment_cents: i64,
    ) {
        let terms = compute_loan_terms(principal, rate, term_count).unwrap();
        assert_eq!(terms.total_payable_cents, total_cents);
        assert_eq!(terms.installment_cents, installment_cents);
    }

    #[rstest]
    #[case(dec!(0), dec!(40), 12, AmortizationError::NonPositivePrincipal)]
    #[case(dec!(-10), dec!(40), 12, AmortizationError::NonPositivePrincipal)]
    #[case(dec!(0.004), dec!(40), 12, AmortizationError::NonPositivePrincipal)]
    #[case(dec!(1000), dec!(-1), 12, AmortizationError::NegativeRate)]
    #[case(dec!(1000), dec!(40), 0, AmortizationError::ZeroTermCount)]
    fn test_compute_loan_terms_rejects_bad_input(
        #[case] principal: Decimal,
        #[case] rate: Decimal,
        #[case] term_count: u32,
        #[case] expected: AmortizationError,
    ) {
        assert_eq!(
            compute_loan_terms(principal, rate, term_count),
            Err(expected)
        );
    }

    #[test]
    fn test_first_installment_payment() {
        let outcome = apply_payment(140_000, 11_667, 11_667).unwrap();

        assert_eq!(outcome.balance_after_cents, 128_333);
        assert_eq!(outcome.terms_remaining, 11);
        assert!(!outcome.is_paid_off);
        assert_eq!(outcome.overpayment_cents, 0);
    }

    #[test]
    fn test_overpayment_is_absorbed() {
        let outcome = apply_payment(5_000, 11_667, 20_000).unwrap();

        assert_eq!(outcome.balance_after_cents, 0);
        assert_eq!(outcome.terms_remaining, 0);
        assert!(outcome.is_paid_off);
        assert_eq!(outcome.overpayment_cents, 15_000);
    }

    #[test]
    fn test_large_payment_skips_terms() {
        let outcome = apply_payment(140_000, 11_667, 50_000).unwrap();

        assert_eq!(outcome.balance_after_cents, 90_000);
        // 90000 / 11667 = 7.71
        assert_eq!(outcome.terms_remaining, 8);
    }

    #[rstest]
    #[case(-1, 100, 100, AmortizationError::NegativeBalance)]
    #[case(1_000, 0, 100, AmortizationError::NonPositiveInstallment)]
    #[case(1_000, 100, 0, AmortizationError::NonPositivePayment)]
    #[case(1_000, 100, -5, AmortizationError::NonPositivePayment)]
    fn test_apply_payment_rejects_bad_input(
        #[case] balance: i64,
        #[case] installment: i64,
        #[case] payment: i64,
        #[case] expected: AmortizationError,
    ) {
        assert_eq!(apply_payment(balance, installment, payment), Err(expected));
    }

    #[test]
    fn test_twelve_installments_end_at_exactly_zero() {
        let terms = compute_loan_terms(dec!(1000), dec!(40), 12).unwrap();
        let outcomes = replay_payments(
            terms.total_payable_cents,
            terms.installment_cents,
            std::iter::repeat_n(terms.installment_cents, 12),
        )
        .unwrap();

        let last = outcomes.last().unwrap();
        assert_eq!(last.balance_after_cents, 0);
        assert!(last.is_paid_off);
        // 12 * 11667 overshoots 140000 by 4 cents; the last payment absorbs it.
        assert_eq!(last.balance_before_cents, 11_663);
        assert_eq!(last.overpayment_cents, 4);
        assert!(outcomes[..11].iter().all(|o| !o.is_paid_off));
    }

    #[test]
    fn test_replay_with_no_payments() {
        assert!(replay_payments(140_000, 11_667, Vec::new()).unwrap().is_empty());
    }

    #[rstest]
    #[case(dec!(116.67), 11_667)]
    #[case(dec!(0.005), 1)]
    #[case(dec!(10.004), 1_000)]
    #[case(dec!(-0.005), -1)]
    fn test_to_cents(#[case] amount: Decimal, #[case] cents: i64) {
        assert_eq!(to_cents(amount), Ok(cents));
    }

    #[test]
    fn test_to_cents_overflow() {
        assert_eq!(to_cents(Decimal::MAX), Err(AmortizationError::Overflow));
    }

    #[test]
    fn test_from_cents_keeps_two_places() {
        assert_eq!(from_cents(128_333).to_string(), "1283.33");
        assert_eq!(from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_div_round_half_up() {
        assert_eq!(div_round_half_up(140_000, 12), 11_667);
        assert_eq!(div_round_half_up(5, 2), 3);
        assert_eq!(div_round_half_up(7, 4), 2);
        assert_eq!(div_round_half_up(9, 4), 2);
        assert_eq!(div_round_half_up(0, 3), 0);
    }

    proptest! {
        #[test]
        fn prop_total_covers_principal_and_installments_track_total(
            principal_cents in 1i64..100_000_000,
            rate_hundredths in 0i64..20_000,
            term_count in 1u32..=104,
        ) {
            let terms = compute_loan_terms(
                Decimal::new(principal_cents, 2),
                Decimal::new(rate_hundredths, 2),
                term_count,
            ).unwrap();

            prop_assert!(terms.total_payable_cents >= principal_cents);

            // Each installment is within half a cent of total / n.
            let n = i64::from(term_count);
            let drift = (terms.installment_cents * n - terms.total_payable_cents).abs();
            prop_assert!(2 * drift <= n);
        }

        #[test]
        fn prop_payments_summing_to_total_reach_exactly_zero(
            payments in prop::collection::vec(1i64..500_000, 1..40),
            installment in 1i64..200_000,
        ) {
            let total: i64 = payments.iter().sum();
            let outcomes = replay_payments(total, installment, payments.clone()).unwrap();

            let (last, earlier) = outcomes.split_last().unwrap();
            prop_assert_eq!(last.balance_after_cents, 0);
            prop_assert_eq!(last.overpayment_cents, 0);
            for outcome in earlier {
                prop_assert!(outcome.balance_after_cents > 0);
                prop_assert!(outcome.terms_remaining > 0);
            }
        }

        #[test]
        fn prop_balance_never_negative(
            balance in 0i64..10_000_000,
            installment in 1i64..1_000_000,
            payment in 1i64..20_000_000,
        ) {
            let outcome = apply_payment(balance, installment, payment).unwrap();
            prop_assert!(outcome.balance_after_cents >= 0);
            prop_assert!(outcome.balance_after_cents <= balance);
            prop_assert_eq!(outcome.is_paid_off, outcome.balance_after_cents == 0);
        }

        #[test]
        fn prop_deterministic(
            principal_cents in 1i64..10_000_000,
            rate_hundredths in 0i64..10_000,
            term_count in 1u32..=52,
        ) {
            let principal = Decimal::new(principal_cents, 2);
            let rate = Decimal::new(rate_hundredths, 2);
            prop_assert_eq!(
                compute_loan_terms(principal, rate, term_count),
                compute_loan_terms(principal, rate, term_count)
            );
        }
    }
}
