use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Domain Models ============

/// A customer's enrolment in the loan service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Externally assigned customer identifier (unique key).
    pub customer_number: String,
    /// Generated opaque identifier.
    pub subscription_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// The single in-flight application for this customer, if any.
    pub active_loan_id: Option<Uuid>,
}

/// Lifecycle state of a loan application.
///
/// `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Processing,
    Approved,
    Rejected,
    Failed,
}

impl LoanStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LoanStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Processing => "PROCESSING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity status reported by the KYC service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,
    Inactive,
}

impl CustomerStatus {
    /// `ACTIVE` in any casing is active; every other value is inactive.
    pub fn from_kyc(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("active") {
            CustomerStatus::Active
        } else {
            CustomerStatus::Inactive
        }
    }
}

/// Customer record returned by the KYC lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_number: String,
    pub status: CustomerStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub monthly_income: Decimal,
}

impl CustomerRecord {
    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }
}

/// A loan application and its processing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub application_id: Uuid,
    pub customer_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    /// Set only on the terminal transition.
    pub processed_at: Option<DateTime<Utc>>,
    /// Set only for `REJECTED` and `FAILED`.
    pub reason: Option<String>,
    pub score: Option<i32>,
    pub kyc_snapshot: Option<CustomerRecord>,
}

impl LoanApplication {
    pub fn new(customer_number: impl Into<String>, amount: Decimal) -> Self {
        Self {
            application_id: Uuid::new_v4(),
            customer_number: customer_number.into(),
            amount,
            status: LoanStatus::Processing,
            created_at: Utc::now(),
            processed_at: None,
            reason: None,
            score: None,
            kyc_snapshot: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Terminal fields written to an application in a single update.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: LoanStatus,
    pub reason: Option<String>,
    pub score: Option<i32>,
    pub kyc_snapshot: Option<CustomerRecord>,
}

impl Outcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: LoanStatus::Rejected,
            reason: Some(reason.into()),
            score: None,
            kyc_snapshot: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: LoanStatus::Failed,
            reason: Some(reason.into()),
            score: None,
            kyc_snapshot: None,
        }
    }
}

/// Counters exposed by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub subscription_count: usize,
    pub loans_in_processing_count: usize,
}

// ============ API Request/Response Models ============

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub customer_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub subscription_id: Uuid,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoanRequest {
    pub customer_number: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequestResponse {
    pub application_id: Uuid,
    pub status: LoanStatus,
}

/// Status view of an application. Outcome fields appear only once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanStatusResponse {
    pub application_id: Uuid,
    pub status: LoanStatus,
    pub customer_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: Option<LoanOutcomeView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOutcomeView {
    pub processed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub score: Option<i32>,
}

impl From<LoanApplication> for LoanStatusResponse {
    fn from(app: LoanApplication) -> Self {
        let outcome = app.is_terminal().then(|| LoanOutcomeView {
            processed_at: app.processed_at,
            reason: app.reason.clone(),
            score: app.score,
        });

        Self {
            application_id: app.application_id,
            status: app.status,
            customer_number: app.customer_number,
            amount: app.amount,
            created_at: app.created_at,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_subscriptions: usize,
    pub active_loans: usize,
}
