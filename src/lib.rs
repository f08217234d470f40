#![deny(missing_docs)]

//! Core library for the Modal Gate dispatch gateway.

/// HTTP routing and REST handlers.
pub mod api;
/// Clients for the per-modality processing backends.
pub mod backend;
/// Query classification into modalities.
pub mod classify;
/// Environment-driven configuration management.
pub mod config;
/// Modality specialist handlers.
pub mod handlers;
/// Asynchronous job lifecycle management.
pub mod jobs;
/// Structured logging and tracing setup.
pub mod logging;
/// Gateway activity counters.
pub mod metrics;
/// Pipeline orchestration: classify, route, dispatch, envelope.
pub mod orchestrator;
/// Query and file domain types.
pub mod query;
/// The enum-keyed handler registry.
pub mod registry;
/// Static routing from classifications to handlers.
pub mod routing;
