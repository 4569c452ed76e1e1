use crate::auth::{self, OperatorCredentials};
use crate::errors::AppError;
use crate::lending::LoanService;
use crate::models::*;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loan origination core.
    pub loans: LoanService,
    /// Credential checked on `/api/v1/*`.
    pub operator: OperatorCredentials,
}

/// Builds the HTTP router.
///
/// `/health` and `/` are public; everything under `/api/v1` requires the
/// operator credential.
pub fn router(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/subscribe", post(subscribe_customer))
        .route("/api/v1/request-loan", post(request_loan))
        .route("/api/v1/loan-status/:application_id", get(loan_status))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::require_operator,
                ))
                // Request bodies are tiny JSON objects; cap at 1MB
                .layer(RequestBodyLimitLayer::new(1024 * 1024)),
        );

    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
///
/// Reports subscription count and loans still `PROCESSING`.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.loans.health_snapshot().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            active_subscriptions: snapshot.subscription_count,
            active_loans: snapshot.loans_in_processing_count,
        }),
    )
}

pub async fn hello() -> &'static str {
    "Loan Management Service"
}

/// POST /api/v1/subscribe
///
/// Subscribes a customer for loan services.
pub async fn subscribe_customer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<SubscribeResponse>, AppError> {
    let Json(body) = payload?;
    let customer_number = body.customer_number.unwrap_or_default();
    tracing::info!("POST /subscribe - customer: {}", customer_number);

    let subscription_id = state.loans.subscribe(&customer_number).await?;

    Ok(Json(SubscribeResponse {
        subscription_id,
        status: "active".to_string(),
    }))
}

/// POST /api/v1/request-loan
///
/// Creates a loan application and processes it in the background.
/// Poll `/api/v1/loan-status/{application_id}` for the outcome.
pub async fn request_loan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoanRequest>, JsonRejection>,
) -> Result<Json<LoanRequestResponse>, AppError> {
    let Json(body) = payload?;
    let customer_number = body.customer_number.unwrap_or_default();
    let amount = body.amount.unwrap_or(Decimal::ZERO);
    tracing::info!(
        "POST /request-loan - customer: {}, amount: {}",
        customer_number,
        amount
    );

    if customer_number.trim().is_empty() || amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Valid customer_number and amount required".to_string(),
        ));
    }

    let application_id = state.loans.request_loan(&customer_number, amount).await?;

    Ok(Json(LoanRequestResponse {
        application_id,
        status: LoanStatus::Processing,
    }))
}

/// GET /api/v1/loan-status/:application_id
pub async fn loan_status(
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<String>,
) -> Result<Json<LoanStatusResponse>, AppError> {
    tracing::debug!("GET /loan-status/{}", application_id);

    let id = Uuid::parse_str(&application_id)
        .map_err(|_| AppError::NotFound(format!("Application ID: {} not found", application_id)))?;

    let application = state.loans.get_application(id).await?;
    Ok(Json(LoanStatusResponse::from(application)))
}
