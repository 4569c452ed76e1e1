#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_lms_api::errors::AppError;
use rust_lms_api::lending::LoanService;
use rust_lms_api::models::{CustomerRecord, CustomerStatus, LoanApplication};
use rust_lms_api::services::{KycService, ScoringService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// What the fake KYC service does for every lookup.
#[derive(Clone)]
pub enum KycBehavior {
    Record(CustomerStatus, Decimal),
    Unavailable,
    Defect(String),
    Panic,
}

pub struct FakeKyc {
    behavior: KycBehavior,
    pub calls: AtomicUsize,
}

impl FakeKyc {
    pub fn new(behavior: KycBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn active(income: Decimal) -> Arc<Self> {
        Self::new(KycBehavior::Record(CustomerStatus::Active, income))
    }
}

#[async_trait]
impl KycService for FakeKyc {
    async fn lookup(&self, customer_number: &str) -> Result<Option<CustomerRecord>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            KycBehavior::Record(status, income) => Ok(Some(CustomerRecord {
                customer_number: customer_number.to_string(),
                status: *status,
                monthly_income: *income,
            })),
            KycBehavior::Unavailable => Ok(None),
            KycBehavior::Defect(msg) => Err(AppError::InternalError(msg.clone())),
            KycBehavior::Panic => panic!("kyc adapter exploded"),
        }
    }
}

/// Fake scoring engine. With a gate, each call waits for one permit first.
pub struct FakeScoring {
    score: Option<i32>,
    gate: Option<Arc<Semaphore>>,
    pub calls: AtomicUsize,
}

impl FakeScoring {
    pub fn returning(score: Option<i32>) -> Arc<Self> {
        Arc::new(Self {
            score,
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(score: Option<i32>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            score,
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ScoringService for FakeScoring {
    async fn score(&self, _customer_number: &str) -> Result<Option<i32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;
            permit.forget();
        }
        Ok(self.score)
    }
}

pub fn service(kyc: Arc<FakeKyc>, scoring: Arc<FakeScoring>) -> LoanService {
    LoanService::new(kyc, scoring, 8)
}

/// Polls until the application leaves `PROCESSING`.
pub async fn wait_for_terminal(service: &LoanService, id: Uuid) -> LoanApplication {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let app = service
            .get_application(id)
            .await
            .expect("application should exist");
        if app.is_terminal() {
            return app;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "application {} still PROCESSING",
            id
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Polls until the customer's active-loan slot is free.
pub async fn wait_for_release(service: &LoanService, customer_number: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let sub = service
            .registry()
            .get(customer_number)
            .await
            .expect("customer should be subscribed");
        if sub.active_loan_id.is_none() {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "active loan for {} never released",
            customer_number
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
