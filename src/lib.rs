//! # choreboard
//!
//! Household chore-economy ledger: tasks are claimed, completed and
//! approved by a small set of participants, and finished work turns into
//! points that can be spent on rewards or taken away as penalties.
//!
//! ## Architecture
//!
//! ```text
//!   kiosk / dashboard (HTTP)
//!            │
//!            ▼
//!   ┌─────────────────┐     lifecycle  (transition rules)
//!   │  ChoreService   │───▶ ledger     (point arithmetic)
//!   └────────┬────────┘     scheduler  (recurring tasks)
//!            │ one unit of work per operation
//!            ▼
//!   ┌─────────────────┐
//!   │   ChoreStore    │  memory | sqlite
//!   └─────────────────┘
//! ```
//!
//! ## Modules
//! - `service`: every ledger operation as one atomic unit of work
//! - `lifecycle`: task state machine checks
//! - `ledger`: balance and lifetime arithmetic
//! - `scheduler`: recurring template due-checks
//! - `store`: pluggable persistence
//! - `api`: HTTP surface and supervisor gate

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{ChoreError, ErrorKind};
pub use lifecycle::Actor;
pub use service::{ChoreService, CompletionOutcome};
pub use store::{create_store, ChoreStore, StoreType};
