use crate::errors::AppError;
use crate::models::{HealthSnapshot, LoanApplication, LoanStatus, Outcome};
use crate::registry::SubscriptionRegistry;
use crate::services::{KycService, ScoringService};
use crate::store::ApplicationStore;
use crate::workflow::WorkflowEngine;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use uuid::Uuid;

static CUSTOMER_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("customer number pattern is valid")
});

/// Entry point used by the request layer.
///
/// Owns the subscription registry, the application store and the workflow
/// engine for the lifetime of the process.
#[derive(Clone)]
pub struct LoanService {
    registry: SubscriptionRegistry,
    store: ApplicationStore,
    engine: Arc<WorkflowEngine>,
}

impl LoanService {
    pub fn new(
        kyc: Arc<dyn KycService>,
        scoring: Arc<dyn ScoringService>,
        max_concurrent_workflows: usize,
    ) -> Self {
        let registry = SubscriptionRegistry::new();
        let store = ApplicationStore::new();
        let engine = WorkflowEngine::new(
            store.clone(),
            registry.clone(),
            kyc,
            scoring,
            max_concurrent_workflows,
        );

        Self {
            registry,
            store,
            engine: Arc::new(engine),
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub async fn subscribe(&self, customer_number: &str) -> Result<Uuid, AppError> {
        let customer_number = validate_customer_number(customer_number)?;
        self.registry.subscribe(&customer_number).await
    }

    /// Creates a `PROCESSING` application and starts its workflow.
    ///
    /// Returns as soon as the workflow is scheduled; the outcome is read back
    /// with [`LoanService::get_application`].
    pub async fn request_loan(
        &self,
        customer_number: &str,
        amount: Decimal,
    ) -> Result<Uuid, AppError> {
        let customer_number = validate_customer_number(customer_number)?;
        let amount = validate_amount(amount)?;

        if !self.engine.is_accepting() {
            return Err(AppError::InternalError(
                "Service is shutting down".to_string(),
            ));
        }

        let application = LoanApplication::new(customer_number.clone(), amount);
        let application_id = application.application_id;

        // Claim the slot before anything is stored; refused requests leave no record.
        self.registry.begin_loan(&customer_number, application_id).await?;
        if let Err(e) = self.store.insert(application.clone()).await {
            self.registry.end_loan(&customer_number, application_id).await;
            return Err(e);
        }

        tracing::info!(
            "Loan {} for {} (amount {}) is PROCESSING",
            application_id,
            customer_number,
            amount
        );

        self.start_workflow(&application).await?;
        Ok(application_id)
    }

    /// Hands a stored `PROCESSING` application to the engine.
    ///
    /// If the engine has closed in the meantime the application is recorded as
    /// `FAILED` and its slot released, so it never stays `PROCESSING`.
    async fn start_workflow(&self, application: &LoanApplication) -> Result<(), AppError> {
        let application_id = application.application_id;
        if let Err(e) = self.engine.spawn(application) {
            tracing::error!("Could not start workflow for {}: {}", application_id, e);
            self.store
                .complete(application_id, Outcome::failed(e.to_string()))
                .await?;
            self.registry
                .end_loan(&application.customer_number, application_id)
                .await;
        }
        Ok(())
    }

    pub async fn get_application(&self, application_id: Uuid) -> Result<LoanApplication, AppError> {
        self.store.get(application_id).await
    }

    pub async fn health_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            subscription_count: self.registry.len().await,
            loans_in_processing_count: self.store.count_by_status(LoanStatus::Processing).await,
        }
    }

    /// Stops accepting loans and waits up to `grace` for in-flight workflows.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.engine.shutdown(grace).await
    }
}

/// Trims and checks a customer number: 1-64 characters of `[A-Za-z0-9_-]`.
pub fn validate_customer_number(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "customer_number is required".to_string(),
        ));
    }
    if !CUSTOMER_NUMBER.is_match(trimmed) {
        return Err(AppError::BadRequest(format!(
            "Invalid customer_number: {}",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_amount(amount: Decimal) -> Result<Decimal, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}
