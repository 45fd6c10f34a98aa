//! HTTP API for the chore board.
//!
//! ## Endpoints
//!
//! Kiosk (no session needed):
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange the supervisor PIN for a session token
//! - `GET /api/board` - Board snapshot (generates due recurring tasks first)
//! - `POST /api/tasks/:id/claim` - Claim an open task
//! - `POST /api/tasks/:id/unclaim` - Give a claimed task back
//! - `POST /api/tasks/:id/complete` - Mark a claimed task done
//! - `POST /api/rewards/:id/request` - Ask to redeem a reward
//! - `POST /api/job-requests` - Ask for a new job
//!
//! Supervisor (`Authorization: Bearer <jwt>`):
//! - `GET /api/dashboard` - Supervisor snapshot
//! - `POST /api/scheduler/run` - Generate due recurring tasks
//! - `POST /api/logs/:id/approve|reject|unapprove` - Completion approvals
//! - `POST /api/reward-requests/:id/approve|reject` - Redemption approvals
//! - `POST /api/participants/:id/adjust` - Manual spend or penalty
//! - `POST /api/tasks/:id/unclaim-override` - Return any claimed task to the board
//! - `POST /api/tasks/:id/remove` - Take a task off the board
//! - `POST|DELETE /api/tasks/:id/blocks/:participant_id` - Block list
//! - `POST /api/job-requests/:id/handled` - Close a job request
//! - `GET|PUT /api/settings` - Board settings
//! - Catalog: `POST /api/participants`, `POST /api/participants/:id/deactivate`,
//!   `POST /api/tasks`, `PATCH /api/tasks/:id`, `POST /api/templates`,
//!   `PATCH /api/templates/:id`, `POST /api/templates/:id/active`,
//!   `POST /api/rewards`, `POST /api/rewards/:id/active`

mod auth;
mod board;
mod error;
mod extract;
mod routes;
mod supervisor;
pub mod types;

pub use error::ErrorResponse;
pub use routes::{router, serve, AppState};
pub use types::*;
