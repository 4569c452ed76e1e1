use crate::errors::AppError;
use crate::services::{ScoringService, ServiceCredentials};
use async_trait::async_trait;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Scores outside this range are treated as an invalid poll response.
pub const SCORE_RANGE: RangeInclusive<i32> = 0..=1000;

/// How often, and how far apart, the score is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Upper bound on time spent waiting between polls.
    pub fn worst_case_wait(&self) -> Duration {
        self.retry_delay * self.max_retries
    }
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: i32,
}

/// Client for the scoring engine's initiate/poll protocol.
#[derive(Clone)]
pub struct HttpScoringClient {
    client: reqwest::Client,
    base_url: String,
    credentials: ServiceCredentials,
    policy: RetryPolicy,
}

impl HttpScoringClient {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        credentials: ServiceCredentials,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            policy,
        }
    }

    /// Requests a scoring token for the customer.
    async fn initiate(&self, customer_number: &str) -> Result<String, AppError> {
        let url = format!(
            "{}/api/v1/scoring/initiateQueryScore/{}",
            self.base_url, customer_number
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Scoring initiate failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Scoring initiate returned status {}",
                response.status()
            )));
        }

        let body: InitiateResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse scoring token: {}", e))
        })?;

        body.token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::ExternalApiError("Scoring token missing".to_string()))
    }

    /// One poll for the score behind `token`.
    async fn query(&self, token: &str) -> Result<i32, AppError> {
        let url = format!("{}/api/v1/scoring/queryScore/{}", self.base_url, token);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Scoring query failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Scoring query returned status {}",
                response.status()
            )));
        }

        let body: ScoreResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse score: {}", e))
        })?;

        if !SCORE_RANGE.contains(&body.score) {
            return Err(AppError::ExternalApiError(format!(
                "Score {} outside {:?}",
                body.score, SCORE_RANGE
            )));
        }

        Ok(body.score)
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    async fn score(&self, customer_number: &str) -> Result<Option<i32>, AppError> {
        let token = match self.initiate(customer_number).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Scoring unavailable for {}: {}", customer_number, e);
                return Ok(None);
            }
        };

        for attempt in 1..=self.policy.max_retries {
            match self.query(&token).await {
                Ok(score) => {
                    tracing::info!(
                        "Scoring: Customer {} scored {} (attempt {})",
                        customer_number,
                        score,
                        attempt
                    );
                    return Ok(Some(score));
                }
                Err(e) => {
                    tracing::debug!(
                        "Scoring attempt {}/{} for {} not ready: {}",
                        attempt,
                        self.policy.max_retries,
                        customer_number,
                        e
                    );
                }
            }

            if attempt < self.policy.max_retries {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        tracing::warn!(
            "Scoring: No score for {} after {} attempts",
            customer_number,
            self.policy.max_retries
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(3));
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(9));
    }

    #[test]
    fn test_score_range() {
        assert!(SCORE_RANGE.contains(&0));
        assert!(SCORE_RANGE.contains(&750));
        assert!(!SCORE_RANGE.contains(&-1));
        assert!(!SCORE_RANGE.contains(&1001));
    }
}
