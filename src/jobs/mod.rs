//! Asynchronous job lifecycle: submit → PROCESSING → {COMPLETED | ERROR}.
//!
//! The store owns the volatile job map behind a narrow API; the manager owns
//! validation, dispatch, and the retention sweeper. Both terminal states are
//! final — a job's status never regresses.

mod manager;
mod store;
mod types;

pub use manager::{GatewayApi, GatewaySnapshot, JobManager, SubmitLimits};
pub use store::JobStore;
pub use types::{
    Job, JobAccessError, JobStatus, JobStatusView, JobSummary, SubmitError, SubmitReceipt,
    estimate_time,
};
