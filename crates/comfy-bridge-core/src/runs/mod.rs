//! Run submission and status tracking.
//!
//! ```text
//! RunOrchestrator::run ──► POST /prompt ──► run_id
//!        │
//!        └── wait_for ──► resolve_status (per poll)
//!                             ├─ GET /api/jobs/{id}   (if probed available)
//!                             ├─ GET /history/{id}
//!                             └─ GET /queue
//! ```

pub mod orchestrator;
pub mod reconciler;
pub mod status;

pub use orchestrator::{RunHandle, RunOrchestrator, RunOutcome, RunRequest, DEFAULT_POLL_INTERVAL};
pub use reconciler::resolve_status;
pub use status::{collect_artifacts, normalize_state, Artifact, RunStatus, StatusReport, StatusSource};
