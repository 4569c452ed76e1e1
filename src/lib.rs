//! Loan Management Service Library
//!
//! Accepts loan requests for subscribed customers, checks them against an
//! external KYC service and an asynchronous scoring engine, and exposes the
//! resulting application state for polling.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `auth`: Operator HTTP Basic authentication.
//! - `config`: Configuration management.
//! - `decision`: Loan decision policy.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `kyc_client`: SOAP KYC client.
//! - `lending`: Loan service facade (subscribe, request, status, health).
//! - `models`: Core data models.
//! - `registry`: Subscription registry.
//! - `scoring_client`: Scoring engine client (initiate/poll).
//! - `services`: External service traits.
//! - `store`: Loan application store.
//! - `workflow`: Background loan processing workflow.

pub mod api;
pub mod core;
pub mod integrations;

pub mod auth;
pub mod config;
pub mod decision;
pub mod errors;
pub mod handlers;
pub mod kyc_client;
pub mod lending;
pub mod models;
pub mod registry;
pub mod scoring_client;
pub mod services;
pub mod store;
pub mod workflow;
