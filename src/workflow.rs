//! Loan processing workflow.
//!
//! Each application is evaluated off the request path:
//! KYC lookup, then scoring, then the decision policy. The outcome is written
//! to the [`ApplicationStore`] in one update and the customer's active-loan
//! slot is released right after.

use crate::decision;
use crate::errors::{AppError, ResultExt};
use crate::models::{LoanApplication, LoanStatus, Outcome};
use crate::registry::SubscriptionRegistry;
use crate::services::{KycService, ScoringService};
use crate::store::ApplicationStore;
use rust_decimal::Decimal;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

pub const KYC_FAILED: &str = "KYC check failed";
pub const SCORING_UNAVAILABLE: &str = "Scoring service unavailable";

/// Runs loan workflows as tracked background tasks.
///
/// At most `max_concurrent` workflows consult the external services at once;
/// the rest wait for a permit while their applications stay `PROCESSING`.
pub struct WorkflowEngine {
    store: ApplicationStore,
    registry: SubscriptionRegistry,
    kyc: Arc<dyn KycService>,
    scoring: Arc<dyn ScoringService>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl WorkflowEngine {
    pub fn new(
        store: ApplicationStore,
        registry: SubscriptionRegistry,
        kyc: Arc<dyn KycService>,
        scoring: Arc<dyn ScoringService>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            registry,
            kyc,
            scoring,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tracker: TaskTracker::new(),
        }
    }

    pub fn is_accepting(&self) -> bool {
        !self.tracker.is_closed()
    }

    /// Starts the workflow for a freshly created `PROCESSING` application.
    ///
    /// The returned handle resolves to the terminal record; callers on the
    /// request path drop it.
    pub fn spawn(
        &self,
        application: &LoanApplication,
    ) -> Result<JoinHandle<Option<LoanApplication>>, AppError> {
        if !self.is_accepting() {
            return Err(AppError::InternalError(
                "Workflow engine is shutting down".to_string(),
            ));
        }

        let job = WorkflowJob {
            application_id: application.application_id,
            customer_number: application.customer_number.clone(),
            amount: application.amount,
            store: self.store.clone(),
            registry: self.registry.clone(),
            kyc: Arc::clone(&self.kyc),
            scoring: Arc::clone(&self.scoring),
            permits: Arc::clone(&self.permits),
        };

        let span = tracing::info_span!(
            "loan_workflow",
            application_id = %application.application_id,
            customer_number = %application.customer_number
        );

        Ok(self.tracker.spawn(job.run().instrument(span)))
    }

    /// Stops accepting workflows and waits up to `grace` for running ones.
    ///
    /// Returns `true` if every workflow finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!("Waiting for {} loan workflow(s) to finish", pending);
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    "{} loan workflow(s) still running after {:?}",
                    self.tracker.len(),
                    grace
                );
                false
            }
        }
    }
}

struct WorkflowJob {
    application_id: Uuid,
    customer_number: String,
    amount: Decimal,
    store: ApplicationStore,
    registry: SubscriptionRegistry,
    kyc: Arc<dyn KycService>,
    scoring: Arc<dyn ScoringService>,
    permits: Arc<Semaphore>,
}

impl WorkflowJob {
    async fn run(self) -> Option<LoanApplication> {
        let outcome = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(_permit) => {
                tracing::info!("Starting loan processing");
                let kyc = Arc::clone(&self.kyc);
                let scoring = Arc::clone(&self.scoring);
                let customer_number = self.customer_number.clone();
                let amount = self.amount;

                // Run the steps in their own task so a panic surfaces as a JoinError.
                let steps = tokio::spawn(
                    async move {
                        evaluate(kyc.as_ref(), scoring.as_ref(), &customer_number, amount).await
                    }
                    .in_current_span(),
                );

                match steps.await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => Outcome::failed(e.to_string()),
                    Err(join_error) if join_error.is_panic() => Outcome::failed(format!(
                        "Workflow panicked: {}",
                        panic_message(join_error.into_panic())
                    )),
                    Err(join_error) => {
                        Outcome::failed(format!("Workflow aborted: {}", join_error))
                    }
                }
            }
            Err(_) => Outcome::failed("Workflow pool closed before processing started"),
        };

        self.finish(outcome).await
    }

    async fn finish(&self, outcome: Outcome) -> Option<LoanApplication> {
        let completed = match self.store.complete(self.application_id, outcome).await {
            Ok(application) => {
                log_terminal(&application);
                Some(application)
            }
            Err(e) => {
                tracing::error!("Failed to record loan outcome: {}", e);
                None
            }
        };

        if self
            .registry
            .end_loan(&self.customer_number, self.application_id)
            .await
        {
            tracing::debug!("Released active loan for {}", self.customer_number);
        }

        completed
    }
}

/// Evaluates one application: KYC, then scoring, then the decision policy.
///
/// External unavailability yields a `REJECTED` outcome. An `Err` means a
/// defect and is recorded as `FAILED` by the caller.
pub async fn evaluate(
    kyc: &dyn KycService,
    scoring: &dyn ScoringService,
    customer_number: &str,
    amount: Decimal,
) -> Result<Outcome, AppError> {
    let record = match kyc.lookup(customer_number).await.context("KYC lookup")? {
        Some(record) if record.is_active() => record,
        Some(record) => {
            tracing::info!("KYC status {:?} for {}", record.status, customer_number);
            return Ok(Outcome {
                kyc_snapshot: Some(record),
                ..Outcome::rejected(KYC_FAILED)
            });
        }
        None => return Ok(Outcome::rejected(KYC_FAILED)),
    };

    let Some(score) = scoring
        .score(customer_number)
        .await
        .context("Credit scoring")?
    else {
        return Ok(Outcome {
            kyc_snapshot: Some(record),
            ..Outcome::rejected(SCORING_UNAVAILABLE)
        });
    };

    let status = decision::decide(score, record.monthly_income, amount);
    let reason = match status {
        LoanStatus::Rejected => {
            decision::rejection_reason(score, record.monthly_income, amount).map(str::to_string)
        }
        _ => None,
    };

    Ok(Outcome {
        status,
        reason,
        score: Some(score),
        kyc_snapshot: Some(record),
    })
}

fn log_terminal(application: &LoanApplication) {
    match application.status {
        LoanStatus::Approved => tracing::info!(
            "Loan {} APPROVED (score {:?})",
            application.application_id,
            application.score
        ),
        status => tracing::warn!(
            "Loan {} {}: {}",
            application.application_id,
            status,
            application.reason.as_deref().unwrap_or("no reason recorded")
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
