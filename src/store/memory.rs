//! In-memory chore store (non-persistent).
//!
//! Every unit of work clones the whole state, transaction history included,
//! so cost grows with the ledger. Meant for tests and short demos; a
//! long-running board should use the SQLite store.

use super::{ChoreStore, UnitOfWork, Work};
use crate::error::ChoreError;
use crate::ledger::Balance;
use crate::model::{
    BlockEdge, BoardSettings, CompletionLog, JobRequest, JobRequestId, LogId, LogStatus,
    Participant, ParticipantId, PointTransaction, Reward, RewardId, RewardRequest,
    RewardRequestId, Task, TaskId, TaskStatus, Template, TemplateId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    participants: HashMap<ParticipantId, Participant>,
    tasks: HashMap<TaskId, Task>,
    templates: HashMap<TemplateId, Template>,
    logs: HashMap<LogId, CompletionLog>,
    transactions: Vec<PointTransaction>,
    rewards: HashMap<RewardId, Reward>,
    reward_requests: HashMap<RewardRequestId, RewardRequest>,
    blocks: BTreeSet<BlockEdge>,
    job_requests: HashMap<JobRequestId, JobRequest>,
    settings: BoardSettings,
}

#[derive(Clone)]
pub struct InMemoryChoreStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryChoreStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }
}

impl Default for InMemoryChoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChoreStore for InMemoryChoreStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn run(&self, work: Work) -> Result<Box<dyn Any + Send>, ChoreError> {
        let mut state = self.state.lock().await;
        // Work on a staged copy; it replaces the live state only on success.
        let mut staged = state.clone();
        let out = work(&mut staged)?;
        *state = staged;
        Ok(out)
    }
}

impl MemoryState {
    /// Mirrors the SQLite partial unique index on outstanding generated tasks.
    fn check_template_slot(&self, task_id: TaskId, task: &Task) -> Result<(), ChoreError> {
        let Some(template_id) = task.origin.template_id() else {
            return Ok(());
        };
        if !task.status.is_outstanding() {
            return Ok(());
        }
        let taken = self.tasks.values().any(|other| {
            other.id != task_id
                && other.origin.template_id() == Some(template_id)
                && other.status.is_outstanding()
        });
        if taken {
            return Err(ChoreError::Conflict(format!(
                "template {} already has an outstanding task",
                template_id
            )));
        }
        Ok(())
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F, limit: Option<usize>) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

fn oldest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| key(item));
    items
}

impl UnitOfWork for MemoryState {
    fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, ChoreError> {
        Ok(self.participants.get(&id).cloned())
    }

    fn insert_participant(&mut self, participant: &Participant) -> Result<(), ChoreError> {
        if self.participants.contains_key(&participant.id) {
            return Err(ChoreError::Conflict(format!(
                "participant {} already exists",
                participant.id
            )));
        }
        self.participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    fn update_participant(&mut self, participant: &Participant) -> Result<(), ChoreError> {
        let slot = self
            .participants
            .get_mut(&participant.id)
            .ok_or_else(|| ChoreError::not_found("Participant", participant.id))?;
        *slot = participant.clone();
        Ok(())
    }

    fn update_balance(&mut self, id: ParticipantId, balance: Balance) -> Result<(), ChoreError> {
        let participant = self
            .participants
            .get_mut(&id)
            .ok_or_else(|| ChoreError::not_found("Participant", id))?;
        balance.apply_to(participant);
        Ok(())
    }

    fn list_participants(&self, active_only: bool) -> Result<Vec<Participant>, ChoreError> {
        let items = self
            .participants
            .values()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        Ok(oldest_first(items, |p: &Participant| p.created_at))
    }

    fn get_task(&self, id: TaskId) -> Result<Option<Task>, ChoreError> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn insert_task(&mut self, task: &Task) -> Result<(), ChoreError> {
        if self.tasks.contains_key(&task.id) {
            return Err(ChoreError::Conflict(format!("task {} already exists", task.id)));
        }
        self.check_template_slot(task.id, task)?;
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    fn update_task_status(&mut self, id: TaskId, status: TaskStatus) -> Result<(), ChoreError> {
        let mut task = self
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| ChoreError::not_found("Task", id))?;
        task.status = status;
        self.check_template_slot(id, &task)?;
        self.tasks.insert(id, task);
        Ok(())
    }

    fn update_task_details(&mut self, t: &Task) -> Result<(), ChoreError> {
        let task = self
            .tasks
            .get_mut(&t.id)
            .ok_or_else(|| ChoreError::not_found("Task", t.id))?;
        task.name = t.name.clone();
        task.description = t.description.clone();
        task.base_points = t.base_points;
        task.requires_approval = t.requires_approval;
        task.min_age = t.min_age;
        Ok(())
    }

    fn claim_if_open(&mut self, id: TaskId, participant: ParticipantId) -> Result<bool, ChoreError> {
        match self.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Open => {
                task.status = TaskStatus::Claimed {
                    claimed_by: participant,
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_tasks(&self, active_only: bool) -> Result<Vec<Task>, ChoreError> {
        let items = self
            .tasks
            .values()
            .filter(|t| !active_only || t.is_active())
            .cloned()
            .collect();
        Ok(oldest_first(items, |t: &Task| t.created_at))
    }

    fn has_outstanding_task(&self, template_id: TemplateId) -> Result<bool, ChoreError> {
        Ok(self.tasks.values().any(|t| {
            t.origin.template_id() == Some(template_id) && t.status.is_outstanding()
        }))
    }

    fn get_template(&self, id: TemplateId) -> Result<Option<Template>, ChoreError> {
        Ok(self.templates.get(&id).cloned())
    }

    fn insert_template(&mut self, template: &Template) -> Result<(), ChoreError> {
        if self.templates.contains_key(&template.id) {
            return Err(ChoreError::Conflict(format!(
                "template {} already exists",
                template.id
            )));
        }
        self.templates.insert(template.id, template.clone());
        Ok(())
    }

    fn update_template(&mut self, template: &Template) -> Result<(), ChoreError> {
        let slot = self
            .templates
            .get_mut(&template.id)
            .ok_or_else(|| ChoreError::not_found("Template", template.id))?;
        *slot = template.clone();
        Ok(())
    }

    fn set_last_generated(&mut self, ids: &[TemplateId], at: DateTime<Utc>) -> Result<(), ChoreError> {
        for id in ids {
            let template = self
                .templates
                .get_mut(id)
                .ok_or_else(|| ChoreError::not_found("Template", id))?;
            template.last_generated_at = Some(at);
        }
        Ok(())
    }

    fn list_templates(&self) -> Result<Vec<Template>, ChoreError> {
        let items = self.templates.values().cloned().collect();
        Ok(oldest_first(items, |t: &Template| t.created_at))
    }

    fn get_log(&self, id: LogId) -> Result<Option<CompletionLog>, ChoreError> {
        Ok(self.logs.get(&id).cloned())
    }

    fn insert_log(&mut self, log: &CompletionLog) -> Result<(), ChoreError> {
        if self.logs.contains_key(&log.id) {
            return Err(ChoreError::Conflict(format!("log {} already exists", log.id)));
        }
        self.logs.insert(log.id, log.clone());
        Ok(())
    }

    fn update_log(&mut self, log: &CompletionLog) -> Result<(), ChoreError> {
        let slot = self
            .logs
            .get_mut(&log.id)
            .ok_or_else(|| ChoreError::not_found("Completion log", log.id))?;
        *slot = log.clone();
        Ok(())
    }

    fn list_logs(&self, status: LogStatus, limit: Option<usize>) -> Result<Vec<CompletionLog>, ChoreError> {
        let items = self
            .logs
            .values()
            .filter(|l| l.status == status)
            .cloned()
            .collect();
        Ok(newest_first(
            items,
            |l: &CompletionLog| l.approved_at.unwrap_or(l.created_at),
            limit,
        ))
    }

    fn insert_transaction(&mut self, tx: &PointTransaction) -> Result<(), ChoreError> {
        self.transactions.push(tx.clone());
        Ok(())
    }

    fn list_transactions(&self, limit: usize) -> Result<Vec<PointTransaction>, ChoreError> {
        Ok(newest_first(
            self.transactions.clone(),
            |t: &PointTransaction| t.created_at,
            Some(limit),
        ))
    }

    fn get_reward(&self, id: RewardId) -> Result<Option<Reward>, ChoreError> {
        Ok(self.rewards.get(&id).cloned())
    }

    fn insert_reward(&mut self, reward: &Reward) -> Result<(), ChoreError> {
        if self.rewards.contains_key(&reward.id) {
            return Err(ChoreError::Conflict(format!(
                "reward {} already exists",
                reward.id
            )));
        }
        self.rewards.insert(reward.id, reward.clone());
        Ok(())
    }

    fn update_reward(&mut self, reward: &Reward) -> Result<(), ChoreError> {
        let slot = self
            .rewards
            .get_mut(&reward.id)
            .ok_or_else(|| ChoreError::not_found("Reward", reward.id))?;
        *slot = reward.clone();
        Ok(())
    }

    fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, ChoreError> {
        let items = self
            .rewards
            .values()
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect();
        Ok(oldest_first(items, |r: &Reward| r.created_at))
    }

    fn get_reward_request(&self, id: RewardRequestId) -> Result<Option<RewardRequest>, ChoreError> {
        Ok(self.reward_requests.get(&id).cloned())
    }

    fn insert_reward_request(&mut self, request: &RewardRequest) -> Result<(), ChoreError> {
        if self.reward_requests.contains_key(&request.id) {
            return Err(ChoreError::Conflict(format!(
                "reward request {} already exists",
                request.id
            )));
        }
        self.reward_requests.insert(request.id, request.clone());
        Ok(())
    }

    fn update_reward_request(&mut self, request: &RewardRequest) -> Result<(), ChoreError> {
        let slot = self
            .reward_requests
            .get_mut(&request.id)
            .ok_or_else(|| ChoreError::not_found("Reward request", request.id))?;
        *slot = request.clone();
        Ok(())
    }

    fn list_reward_requests(&self, limit: usize) -> Result<Vec<RewardRequest>, ChoreError> {
        let items = self.reward_requests.values().cloned().collect();
        Ok(newest_first(
            items,
            |r: &RewardRequest| r.created_at,
            Some(limit),
        ))
    }

    fn insert_block(&mut self, edge: BlockEdge) -> Result<(), ChoreError> {
        self.blocks.insert(edge);
        Ok(())
    }

    fn delete_block(&mut self, edge: BlockEdge) -> Result<bool, ChoreError> {
        Ok(self.blocks.remove(&edge))
    }

    fn is_blocked(&self, edge: BlockEdge) -> Result<bool, ChoreError> {
        Ok(self.blocks.contains(&edge))
    }

    fn list_blocks(&self) -> Result<Vec<BlockEdge>, ChoreError> {
        Ok(self.blocks.iter().copied().collect())
    }

    fn get_job_request(&self, id: JobRequestId) -> Result<Option<JobRequest>, ChoreError> {
        Ok(self.job_requests.get(&id).cloned())
    }

    fn insert_job_request(&mut self, request: &JobRequest) -> Result<(), ChoreError> {
        if self.job_requests.contains_key(&request.id) {
            return Err(ChoreError::Conflict(format!(
                "job request {} already exists",
                request.id
            )));
        }
        self.job_requests.insert(request.id, request.clone());
        Ok(())
    }

    fn update_job_request(&mut self, request: &JobRequest) -> Result<(), ChoreError> {
        let slot = self
            .job_requests
            .get_mut(&request.id)
            .ok_or_else(|| ChoreError::not_found("Job request", request.id))?;
        *slot = request.clone();
        Ok(())
    }

    fn list_job_requests(&self, unhandled_only: bool) -> Result<Vec<JobRequest>, ChoreError> {
        let items = self
            .job_requests
            .values()
            .filter(|r| !unhandled_only || !r.handled)
            .cloned()
            .collect();
        Ok(newest_first(items, |r: &JobRequest| r.created_at, None))
    }

    fn get_settings(&self) -> Result<BoardSettings, ChoreError> {
        Ok(self.settings)
    }

    fn put_settings(&mut self, settings: BoardSettings) -> Result<(), ChoreError> {
        self.settings = settings;
        Ok(())
    }
}
