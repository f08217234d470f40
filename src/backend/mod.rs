//! External processing adapter.
//!
//! Every modality gets its own backend service speaking a small HTTP contract:
//! `POST /process-{modality}` (multipart file + operations), `POST /store-analysis`,
//! `POST /search-similar`, and `GET /health`. The clients here are the only code
//! that talks to those services; handlers stay transport-agnostic.

mod client;
mod types;

pub use client::BackendClient;
pub use types::{BackendError, ProcessingResponse, SimilarMatch};
