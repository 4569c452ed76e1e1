//! Loan decision policy.
//!
//! A customer may borrow at most half of their monthly income, and only with a
//! credit score of at least [`MIN_APPROVAL_SCORE`].

use crate::models::LoanStatus;
use rust_decimal::Decimal;

/// Lowest score that can be approved.
pub const MIN_APPROVAL_SCORE: i32 = 400;

/// Share of monthly income that may be borrowed (0.5).
pub const INCOME_SHARE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Largest amount a customer with `monthly_income` may request.
pub fn max_loan(monthly_income: Decimal) -> Decimal {
    monthly_income * INCOME_SHARE
}

/// Returns `Approved` iff `requested_amount <= monthly_income * 0.5` and
/// `score >= 400`, otherwise `Rejected`.
pub fn decide(score: i32, monthly_income: Decimal, requested_amount: Decimal) -> LoanStatus {
    if requested_amount <= max_loan(monthly_income) && score >= MIN_APPROVAL_SCORE {
        LoanStatus::Approved
    } else {
        LoanStatus::Rejected
    }
}

/// Explains a `Rejected` decision; `None` when the loan would be approved.
pub fn rejection_reason(
    score: i32,
    monthly_income: Decimal,
    requested_amount: Decimal,
) -> Option<&'static str> {
    if requested_amount > max_loan(monthly_income) {
        Some("Requested amount exceeds 50% of monthly income")
    } else if score < MIN_APPROVAL_SCORE {
        Some("Credit score below minimum")
    } else {
        None
    }
}
