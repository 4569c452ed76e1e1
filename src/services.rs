//! External collaborators consulted by the loan workflow.
//!
//! Both services report expected unavailability as `Ok(None)`. An `Err` is
//! reserved for defects (e.g. a client that could not even build its request)
//! and ends the workflow in `FAILED`.

use crate::errors::AppError;
use crate::models::CustomerRecord;
use async_trait::async_trait;
use std::time::Duration;

/// Identity / KYC lookup.
#[async_trait]
pub trait KycService: Send + Sync {
    /// Returns the customer's record, or `None` when the service is
    /// unreachable, answers with a non-success status, or sends a body that
    /// cannot be parsed. Performs exactly one outbound call.
    async fn lookup(&self, customer_number: &str) -> Result<Option<CustomerRecord>, AppError>;
}

/// Asynchronous credit scoring.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Returns the customer's score, or `None` when no score could be
    /// obtained within the client's retry budget.
    async fn score(&self, customer_number: &str) -> Result<Option<i32>, AppError>;
}

/// Basic-auth credential presented to the external services.
#[derive(Debug, Clone)]
pub struct ServiceCredentials {
    pub username: String,
    pub password: String,
}

/// Builds the shared outbound HTTP client.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::ExternalApiError(format!("Failed to create HTTP client: {}", e)))
}
