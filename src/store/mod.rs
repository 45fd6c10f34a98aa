//! Chore storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database
//!
//! Every mutation goes through [`transact`]: the closure runs against a
//! [`UnitOfWork`] and its writes become visible all together when it
//! returns `Ok`, or not at all when it returns `Err`. Backends serialize
//! units of work, so a read followed by a write inside one closure is a
//! single atomic decision.

mod memory;
mod sqlite;

pub use memory::InMemoryChoreStore;
pub use sqlite::SqliteChoreStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::path::PathBuf;

use crate::error::ChoreError;
use crate::ledger::Balance;
use crate::model::{
    BlockEdge, BoardSettings, CompletionLog, JobRequest, JobRequestId, LogId, LogStatus,
    Participant, ParticipantId, PointTransaction, Reward, RewardId, RewardRequest,
    RewardRequestId, Task, TaskId, TaskStatus, Template, TemplateId,
};

/// Row-level access available inside one unit of work.
///
/// `get_*` return `Ok(None)` for unknown ids; `update_*` on an unknown id
/// returns `NotFound`.
pub trait UnitOfWork {
    // === Participants ===

    fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, ChoreError>;
    fn insert_participant(&mut self, participant: &Participant) -> Result<(), ChoreError>;
    fn update_participant(&mut self, participant: &Participant) -> Result<(), ChoreError>;
    /// Write balance and lifetime together.
    fn update_balance(&mut self, id: ParticipantId, balance: Balance) -> Result<(), ChoreError>;
    fn list_participants(&self, active_only: bool) -> Result<Vec<Participant>, ChoreError>;

    // === Tasks ===

    fn get_task(&self, id: TaskId) -> Result<Option<Task>, ChoreError>;
    /// Insert a task. A generated task whose template already has an
    /// outstanding task fails with `Conflict`.
    fn insert_task(&mut self, task: &Task) -> Result<(), ChoreError>;
    /// Set a task's lifecycle state. Reopening a generated task while its
    /// template has another outstanding task fails with `Conflict`.
    fn update_task_status(&mut self, id: TaskId, status: TaskStatus) -> Result<(), ChoreError>;
    /// Overwrite a task's descriptive fields. Status and origin are untouched.
    fn update_task_details(&mut self, task: &Task) -> Result<(), ChoreError>;
    /// Compare-and-set claim: succeeds only if the task is still open.
    fn claim_if_open(&mut self, id: TaskId, participant: ParticipantId) -> Result<bool, ChoreError>;
    fn list_tasks(&self, active_only: bool) -> Result<Vec<Task>, ChoreError>;
    fn has_outstanding_task(&self, template_id: TemplateId) -> Result<bool, ChoreError>;

    // === Templates ===

    fn get_template(&self, id: TemplateId) -> Result<Option<Template>, ChoreError>;
    fn insert_template(&mut self, template: &Template) -> Result<(), ChoreError>;
    fn update_template(&mut self, template: &Template) -> Result<(), ChoreError>;
    fn set_last_generated(&mut self, ids: &[TemplateId], at: DateTime<Utc>) -> Result<(), ChoreError>;
    fn list_templates(&self) -> Result<Vec<Template>, ChoreError>;

    // === Completion logs ===

    fn get_log(&self, id: LogId) -> Result<Option<CompletionLog>, ChoreError>;
    fn insert_log(&mut self, log: &CompletionLog) -> Result<(), ChoreError>;
    fn update_log(&mut self, log: &CompletionLog) -> Result<(), ChoreError>;
    /// Logs with `status`, newest first.
    fn list_logs(&self, status: LogStatus, limit: Option<usize>) -> Result<Vec<CompletionLog>, ChoreError>;

    // === Point transactions ===

    fn insert_transaction(&mut self, tx: &PointTransaction) -> Result<(), ChoreError>;
    /// Newest first.
    fn list_transactions(&self, limit: usize) -> Result<Vec<PointTransaction>, ChoreError>;

    // === Rewards ===

    fn get_reward(&self, id: RewardId) -> Result<Option<Reward>, ChoreError>;
    fn insert_reward(&mut self, reward: &Reward) -> Result<(), ChoreError>;
    fn update_reward(&mut self, reward: &Reward) -> Result<(), ChoreError>;
    fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, ChoreError>;

    fn get_reward_request(&self, id: RewardRequestId) -> Result<Option<RewardRequest>, ChoreError>;
    fn insert_reward_request(&mut self, request: &RewardRequest) -> Result<(), ChoreError>;
    fn update_reward_request(&mut self, request: &RewardRequest) -> Result<(), ChoreError>;
    /// Newest first.
    fn list_reward_requests(&self, limit: usize) -> Result<Vec<RewardRequest>, ChoreError>;

    // === Block edges ===

    /// Idempotent.
    fn insert_block(&mut self, edge: BlockEdge) -> Result<(), ChoreError>;
    /// Idempotent; returns whether an edge was removed.
    fn delete_block(&mut self, edge: BlockEdge) -> Result<bool, ChoreError>;
    fn is_blocked(&self, edge: BlockEdge) -> Result<bool, ChoreError>;
    fn list_blocks(&self) -> Result<Vec<BlockEdge>, ChoreError>;

    // === Job requests ===

    fn get_job_request(&self, id: JobRequestId) -> Result<Option<JobRequest>, ChoreError>;
    fn insert_job_request(&mut self, request: &JobRequest) -> Result<(), ChoreError>;
    fn update_job_request(&mut self, request: &JobRequest) -> Result<(), ChoreError>;
    /// Newest first.
    fn list_job_requests(&self, unhandled_only: bool) -> Result<Vec<JobRequest>, ChoreError>;

    // === Settings ===

    fn get_settings(&self) -> Result<BoardSettings, ChoreError>;
    fn put_settings(&mut self, settings: BoardSettings) -> Result<(), ChoreError>;
}

/// Type-erased unit of work handed to a backend.
pub type Work =
    Box<dyn FnOnce(&mut dyn UnitOfWork) -> Result<Box<dyn Any + Send>, ChoreError> + Send>;

/// Chore store trait - implemented by all storage backends.
#[async_trait]
pub trait ChoreStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Run `work` as one all-or-nothing unit.
    ///
    /// Units of work against the same store are serialized.
    async fn run(&self, work: Work) -> Result<Box<dyn Any + Send>, ChoreError>;
}

/// Run a typed closure as one unit of work.
pub async fn transact<T, F>(store: &dyn ChoreStore, work: F) -> Result<T, ChoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T, ChoreError> + Send + 'static,
{
    let out = store
        .run(Box::new(move |uow: &mut dyn UnitOfWork| {
            work(uow).map(|value| Box::new(value) as Box<dyn Any + Send>)
        }))
        .await?;
    out.downcast::<T>()
        .map(|value| *value)
        .map_err(|_| ChoreError::Persistence("unit of work returned an unexpected type".to_string()))
}

/// Store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    Memory,
    #[default]
    Sqlite,
}

impl StoreType {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a chore store based on type and configuration.
pub async fn create_store(
    store_type: StoreType,
    data_dir: PathBuf,
) -> Result<Box<dyn ChoreStore>, ChoreError> {
    match store_type {
        StoreType::Memory => Ok(Box::new(InMemoryChoreStore::new())),
        StoreType::Sqlite => {
            let store = SqliteChoreStore::new(data_dir).await?;
            Ok(Box::new(store))
        }
    }
}
