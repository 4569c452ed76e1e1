use crate::errors::AppError;
use crate::models::{LoanApplication, LoanStatus, Outcome};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory store of loan applications.
///
/// Terminal fields are written in one locked update, so readers observe either
/// the `PROCESSING` record or the complete outcome.
#[derive(Default, Clone)]
pub struct ApplicationStore {
    applications: Arc<RwLock<HashMap<Uuid, LoanApplication>>>,
}

impl ApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, application: LoanApplication) -> Result<(), AppError> {
        let mut applications = self.applications.write().await;
        if applications.contains_key(&application.application_id) {
            return Err(AppError::InternalError(format!(
                "Duplicate application id {}",
                application.application_id
            )));
        }
        applications.insert(application.application_id, application);
        Ok(())
    }

    pub async fn get(&self, application_id: Uuid) -> Result<LoanApplication, AppError> {
        let applications = self.applications.read().await;
        applications
            .get(&application_id)
            .cloned()
            .ok_or_else(|| not_found(application_id))
    }

    /// Applies a terminal outcome and stamps `processed_at`.
    ///
    /// Fails if the application is unknown or already terminal.
    pub async fn complete(
        &self,
        application_id: Uuid,
        outcome: Outcome,
    ) -> Result<LoanApplication, AppError> {
        if !outcome.status.is_terminal() {
            return Err(AppError::InternalError(format!(
                "Cannot complete application {} with non-terminal status",
                application_id
            )));
        }

        let mut applications = self.applications.write().await;
        let application = applications
            .get_mut(&application_id)
            .ok_or_else(|| not_found(application_id))?;

        if application.is_terminal() {
            return Err(AppError::InternalError(format!(
                "Application {} already {}",
                application_id, application.status
            )));
        }

        application.status = outcome.status;
        application.reason = outcome.reason;
        application.score = outcome.score;
        application.kyc_snapshot = outcome.kyc_snapshot;
        application.processed_at = Some(Utc::now());

        Ok(application.clone())
    }

    pub async fn count_by_status(&self, status: LoanStatus) -> usize {
        let applications = self.applications.read().await;
        applications.values().filter(|a| a.status == status).count()
    }
}

fn not_found(application_id: Uuid) -> AppError {
    AppError::NotFound(format!("Application ID: {} not found", application_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = ApplicationStore::new();
        let id = Uuid::new_v4();
        let err = store.get(id).await.unwrap_err();
        assert_eq!(
            err,
            AppError::NotFound(format!("Application ID: {} not found", id))
        );
    }

    #[tokio::test]
    async fn test_complete_is_write_once() {
        let store = ApplicationStore::new();
        let app = LoanApplication::new("C1", dec!(100));
        let id = app.application_id;
        store.insert(app).await.unwrap();

        let done = store
            .complete(id, Outcome::rejected("KYC check failed"))
            .await
            .unwrap();
        assert_eq!(done.status, LoanStatus::Rejected);
        assert!(done.processed_at.is_some());

        let second = store.complete(id, Outcome::failed("boom")).await;
        assert!(second.is_err());

        let read = store.get(id).await.unwrap();
        assert_eq!(read, done);
    }

    #[tokio::test]
    async fn test_complete_rejects_non_terminal_outcome() {
        let store = ApplicationStore::new();
        let app = LoanApplication::new("C1", dec!(100));
        let id = app.application_id;
        store.insert(app).await.unwrap();

        let outcome = Outcome {
            status: LoanStatus::Processing,
            reason: None,
            score: None,
            kyc_snapshot: None,
        };
        assert!(store.complete(id, outcome).await.is_err());
        assert_eq!(store.get(id).await.unwrap().status, LoanStatus::Processing);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = ApplicationStore::new();
        let a = LoanApplication::new("C1", dec!(1));
        let b = LoanApplication::new("C2", dec!(1));
        let a_id = a.application_id;
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        store.complete(a_id, Outcome::failed("x")).await.unwrap();
        assert_eq!(store.count_by_status(LoanStatus::Processing).await, 1);
        assert_eq!(store.count_by_status(LoanStatus::Failed).await, 1);
    }
}
