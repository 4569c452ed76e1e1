//! Loan workflow and state machine tests against in-process fake services.
mod common;

use common::*;
use rust_decimal_macros::dec;
use rust_lms_api::errors::AppError;
use rust_lms_api::models::{CustomerStatus, LoanStatus};
use rust_lms_api::workflow::{KYC_FAILED, SCORING_UNAVAILABLE};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

#[tokio::test]
async fn test_approved_loan_end_to_end() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(Some(750)));
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(400)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Approved);
    assert_eq!(app.score, Some(750));
    assert_eq!(app.reason, None);
    assert_eq!(app.amount, dec!(400));
    assert!(app.processed_at.is_some());
    let snapshot = app.kyc_snapshot.unwrap();
    assert_eq!(snapshot.status, CustomerStatus::Active);
    assert_eq!(snapshot.monthly_income, dec!(1000));

    wait_for_release(&service, "C1").await;
}

#[tokio::test]
async fn test_inactive_customer_rejected_regardless_of_score() {
    let kyc = FakeKyc::new(KycBehavior::Record(CustomerStatus::Inactive, dec!(100000)));
    let scoring = FakeScoring::returning(Some(999));
    let service = service(kyc, scoring.clone());
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(1)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Rejected);
    assert_eq!(app.reason.as_deref(), Some(KYC_FAILED));
    assert_eq!(app.score, None);
    assert_eq!(scoring.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_kyc_unavailable_rejected() {
    let scoring = FakeScoring::returning(Some(700));
    let service = service(FakeKyc::new(KycBehavior::Unavailable), scoring.clone());
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(10)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Rejected);
    assert_eq!(app.reason.as_deref(), Some(KYC_FAILED));
    assert_eq!(scoring.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scoring_unavailable_rejected() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(None));
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(10)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Rejected);
    assert_eq!(app.reason.as_deref(), Some(SCORING_UNAVAILABLE));
    assert_eq!(app.score, None);
}

#[tokio::test]
async fn test_policy_rejection_records_score() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(Some(350)));
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(100)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Rejected);
    assert_eq!(app.score, Some(350));
    assert!(app.kyc_snapshot.is_some());
}

#[tokio::test]
async fn test_zero_income_rejected() {
    let service = service(FakeKyc::active(dec!(0)), FakeScoring::returning(Some(500)));
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(1)).await.unwrap();
    assert_eq!(wait_for_terminal(&service, id).await.status, LoanStatus::Rejected);
}

#[tokio::test]
async fn test_defect_becomes_failed() {
    let kyc = FakeKyc::new(KycBehavior::Defect("adapter misconfigured".into()));
    let service = service(kyc, FakeScoring::returning(Some(700)));
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(10)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Failed);
    let reason = app.reason.unwrap();
    assert!(reason.contains("adapter misconfigured"), "reason: {}", reason);
    assert!(app.processed_at.is_some());

    wait_for_release(&service, "C1").await;
}

#[tokio::test]
async fn test_panic_becomes_failed() {
    let service = service(
        FakeKyc::new(KycBehavior::Panic),
        FakeScoring::returning(Some(700)),
    );
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(10)).await.unwrap();
    let app = wait_for_terminal(&service, id).await;

    assert_eq!(app.status, LoanStatus::Failed);
    assert!(app.reason.unwrap().contains("kyc adapter exploded"));
    wait_for_release(&service, "C1").await;
}

#[tokio::test]
async fn test_terminal_state_is_stable() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(Some(750)));
    service.subscribe("C1").await.unwrap();

    let id = service.request_loan("C1", dec!(400)).await.unwrap();
    let first = wait_for_terminal(&service, id).await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(service.get_application(id).await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_unknown_application_is_not_found() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(Some(750)));
    let err = service.get_application(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_request_requires_subscription_and_valid_input() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(Some(750)));

    let err = service.request_loan("C1", dec!(10)).await.unwrap_err();
    assert_eq!(err, AppError::NotSubscribed("C1".into()));

    service.subscribe("C1").await.unwrap();
    assert!(matches!(
        service.request_loan("C1", dec!(0)).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        service.request_loan("", dec!(10)).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        service.subscribe("C1").await,
        Err(AppError::AlreadySubscribed(_))
    ));

    // Rejected requests leave no application behind.
    assert_eq!(service.health_snapshot().await.loans_in_processing_count, 0);
}

#[tokio::test]
async fn test_second_loan_blocked_until_first_finishes() {
    let gate = Arc::new(Semaphore::new(0));
    let service = service(
        FakeKyc::active(dec!(1000)),
        FakeScoring::gated(Some(750), gate.clone()),
    );
    service.subscribe("C1").await.unwrap();

    let first = service.request_loan("C1", dec!(100)).await.unwrap();
    let err = service.request_loan("C1", dec!(100)).await.unwrap_err();
    assert_eq!(err, AppError::LoanAlreadyActive("C1".into()));

    let snapshot = service.health_snapshot().await;
    assert_eq!(snapshot.subscription_count, 1);
    assert_eq!(snapshot.loans_in_processing_count, 1);

    gate.add_permits(1);
    assert_eq!(wait_for_terminal(&service, first).await.status, LoanStatus::Approved);
    wait_for_release(&service, "C1").await;

    // No status read is needed to free the slot.
    gate.add_permits(1);
    let second = service.request_loan("C1", dec!(100)).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(wait_for_terminal(&service, second).await.status, LoanStatus::Approved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_single_winner() {
    let gate = Arc::new(Semaphore::new(0));
    let service = service(
        FakeKyc::active(dec!(1000)),
        FakeScoring::gated(Some(750), gate.clone()),
    );
    service.subscribe("C1").await.unwrap();

    let mut handles = vec![];
    for _ in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.request_loan("C1", dec!(50)).await
        }));
    }

    let mut winners = vec![];
    for handle in handles {
        match handle.await.unwrap() {
            Ok(id) => winners.push(id),
            Err(e) => assert_eq!(e, AppError::LoanAlreadyActive("C1".into())),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(service.health_snapshot().await.loans_in_processing_count, 1);

    gate.add_permits(1);
    wait_for_terminal(&service, winners[0]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refused_requests_never_show_as_processing() {
    let gate = Arc::new(Semaphore::new(0));
    let service = service(
        FakeKyc::active(dec!(1000)),
        FakeScoring::gated(Some(750), gate.clone()),
    );
    service.subscribe("C1").await.unwrap();
    let held = service.request_loan("C1", dec!(50)).await.unwrap();

    let mut refused = vec![];
    for worker in 0..4 {
        let service = service.clone();
        refused.push(tokio::spawn(async move {
            for _ in 0..2000 {
                let customer = if worker % 2 == 0 { "C1" } else { "NOBODY" };
                assert!(service.request_loan(customer, dec!(50)).await.is_err());
            }
        }));
    }

    let mut max_seen = service.health_snapshot().await.loans_in_processing_count;
    while refused.iter().any(|handle| !handle.is_finished()) {
        let snapshot = service.health_snapshot().await;
        max_seen = max_seen.max(snapshot.loans_in_processing_count);
        tokio::task::yield_now().await;
    }
    for handle in refused {
        handle.await.unwrap();
    }

    assert_eq!(max_seen, 1);
    assert_eq!(service.health_snapshot().await.loans_in_processing_count, 1);

    gate.add_permits(1);
    wait_for_terminal(&service, held).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_customers_processed_independently() {
    let service = service(FakeKyc::active(dec!(1000)), FakeScoring::returning(Some(600)));

    let mut ids = vec![];
    for i in 0..10 {
        let customer = format!("C{}", i);
        service.subscribe(&customer).await.unwrap();
        ids.push(service.request_loan(&customer, dec!(100)).await.unwrap());
    }

    for id in ids {
        assert_eq!(wait_for_terminal(&service, id).await.status, LoanStatus::Approved);
    }
    assert_eq!(service.health_snapshot().await.subscription_count, 10);
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    let gate = Arc::new(Semaphore::new(0));
    let kyc = FakeKyc::active(dec!(1000));
    let scoring = FakeScoring::gated(Some(750), gate.clone());
    let service = rust_lms_api::lending::LoanService::new(kyc.clone(), scoring.clone(), 1);

    service.subscribe("A").await.unwrap();
    service.subscribe("B").await.unwrap();
    let a = service.request_loan("A", dec!(10)).await.unwrap();
    let b = service.request_loan("B", dec!(10)).await.unwrap();

    // Only one workflow may be inside the external services at a time.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(kyc.calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.health_snapshot().await.loans_in_processing_count, 2);

    gate.add_permits(2);
    wait_for_terminal(&service, a).await;
    wait_for_terminal(&service, b).await;
    assert_eq!(kyc.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_shutdown_drains_and_refuses_new_loans() {
    let gate = Arc::new(Semaphore::new(0));
    let service = service(
        FakeKyc::active(dec!(1000)),
        FakeScoring::gated(Some(750), gate.clone()),
    );
    service.subscribe("C1").await.unwrap();
    service.subscribe("C2").await.unwrap();
    let id = service.request_loan("C1", dec!(10)).await.unwrap();

    // Still blocked: the grace period expires.
    assert!(!service.shutdown(Duration::from_millis(20)).await);

    gate.add_permits(1);
    assert!(service.shutdown(Duration::from_secs(5)).await);
    assert_eq!(
        service.get_application(id).await.unwrap().status,
        LoanStatus::Approved
    );

    assert!(matches!(
        service.request_loan("C2", dec!(10)).await,
        Err(AppError::InternalError(_))
    ));
}
