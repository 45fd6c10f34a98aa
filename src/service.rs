//! Chore ledger operations.
//!
//! Each public method is one atomic unit of work against the store: the
//! rows it reads and the rows it writes commit together or not at all.
//! Transition rules live in [`crate::lifecycle`], point arithmetic in
//! [`crate::ledger`] and due-checks in [`crate::scheduler`]; this module
//! only sequences reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ChoreError;
use crate::ledger::Balance;
use crate::lifecycle::{self, Actor};
use crate::model::{
    BlockEdge, BoardSettings, CompletionLog, JobRequest, JobRequestId, LogId, LogStatus,
    Participant, ParticipantId, PointTransaction, RequestStatus, Reward, RewardId, RewardRequest,
    RewardRequestId, Task, TaskId, TaskOrigin, TaskStatus, Template, TemplateId, TransactionId,
    TransactionType,
};
use crate::scheduler;
use crate::store::{transact, ChoreStore, UnitOfWork};

/// How many recent rows the dashboard shows per history list.
pub const DASHBOARD_HISTORY_LIMIT: usize = 50;

/// Result of marking a task done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// Logged; waits for a supervisor
    PendingApproval { log_id: LogId },
    /// Points were credited immediately
    Awarded { log_id: LogId, points: u64 },
}

/// What the participant kiosk shows.
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub participants: Vec<Participant>,
    pub tasks: Vec<Task>,
    pub blocks: Vec<BlockEdge>,
    pub settings: BoardSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewards: Option<Vec<Reward>>,
}

/// What the supervisor dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub participants: Vec<Participant>,
    pub tasks: Vec<Task>,
    pub templates: Vec<Template>,
    pub rewards: Vec<Reward>,
    pub pending_logs: Vec<CompletionLog>,
    pub recent_approved_logs: Vec<CompletionLog>,
    pub recent_transactions: Vec<PointTransaction>,
    pub recent_reward_requests: Vec<RewardRequest>,
    pub job_requests: Vec<JobRequest>,
    pub blocks: Vec<BlockEdge>,
    pub settings: BoardSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewParticipant {
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_points: u64,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub min_age: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_points: u64,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub min_age: Option<u32>,
    pub frequency_days: u32,
}

/// Partial edit of a board task. Absent fields are left alone; an explicit
/// `null` clears `description` or `min_age`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub base_points: Option<u64>,
    #[serde(default)]
    pub requires_approval: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_age: Option<Option<u32>>,
}

/// Partial edit of a recurring template. Changes apply to tasks generated
/// afterwards, never to instances already on the board.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub base_points: Option<u64>,
    #[serde(default)]
    pub requires_approval: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_age: Option<Option<u32>>,
    #[serde(default)]
    pub frequency_days: Option<u32>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReward {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub cost_points: u64,
}

/// Entry point for every ledger operation.
#[derive(Clone)]
pub struct ChoreService {
    store: Arc<dyn ChoreStore>,
}

impl ChoreService {
    pub fn new(store: Arc<dyn ChoreStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ChoreStore {
        self.store.as_ref()
    }

    // === Task lifecycle ===

    /// Claim an open task for `participant_id`.
    ///
    /// The write is a compare-and-set on the task still being open, so of
    /// two racing claims exactly one wins and the other gets `Conflict`.
    pub async fn claim_task(
        &self,
        task_id: TaskId,
        participant_id: ParticipantId,
    ) -> Result<Task, ChoreError> {
        let task = transact(self.store(), move |uow| {
            let task = load_task(uow, task_id)?;
            let participant = load_participant(uow, participant_id)?;
            let blocked = uow.is_blocked(BlockEdge {
                task_id,
                participant_id,
            })?;
            lifecycle::check_claim(&task, &participant, blocked)?;

            if !uow.claim_if_open(task_id, participant_id)? {
                return Err(ChoreError::Conflict(format!(
                    "task {} is already claimed",
                    task_id
                )));
            }
            load_task(uow, task_id)
        })
        .await?;

        tracing::info!(task_id = %task_id, participant_id = %participant_id, "Task claimed");
        Ok(task)
    }

    /// Return a claimed task to the board. Participants may only unclaim
    /// their own tasks; the supervisor may unclaim any.
    pub async fn unclaim_task(&self, task_id: TaskId, actor: Actor) -> Result<Task, ChoreError> {
        let task = transact(self.store(), move |uow| {
            let task = load_task(uow, task_id)?;
            lifecycle::check_unclaim(&task, actor)?;
            uow.update_task_status(task_id, TaskStatus::Open)?;
            load_task(uow, task_id)
        })
        .await?;

        tracing::info!(task_id = %task_id, actor = ?actor, "Task unclaimed");
        Ok(task)
    }

    /// Mark a claimed task done.
    ///
    /// Tasks that need approval get a pending completion log. Others are
    /// awarded right away: credit, approved log and task state commit as
    /// one unit.
    pub async fn complete_task(
        &self,
        task_id: TaskId,
        participant_id: ParticipantId,
    ) -> Result<CompletionOutcome, ChoreError> {
        let outcome = transact(self.store(), move |uow| {
            let task = load_task(uow, task_id)?;
            let participant = load_participant(uow, participant_id)?;
            let next = lifecycle::check_complete(&task, participant_id)?;
            let now = Utc::now();

            let mut log = CompletionLog {
                id: LogId::new(),
                task_id,
                participant_id,
                status: LogStatus::Completed,
                points_at_completion: task.base_points,
                created_at: now,
                completed_at: Some(now),
                approved_at: None,
                points_awarded: None,
            };

            let outcome = match next {
                TaskStatus::Approved => {
                    let points = award(uow, &participant, &mut log, now)?;
                    CompletionOutcome::Awarded {
                        log_id: log.id,
                        points,
                    }
                }
                _ => CompletionOutcome::PendingApproval { log_id: log.id },
            };

            uow.insert_log(&log)?;
            uow.update_task_status(task_id, next)?;
            Ok(outcome)
        })
        .await?;

        tracing::info!(
            task_id = %task_id,
            participant_id = %participant_id,
            outcome = ?outcome,
            "Task completed"
        );
        Ok(outcome)
    }

    /// Approve a pending completion and credit the points the task was
    /// worth when it was completed.
    pub async fn approve_completion(&self, log_id: LogId) -> Result<CompletionLog, ChoreError> {
        let log = transact(self.store(), move |uow| {
            let mut log = load_log(uow, log_id)?;
            lifecycle::check_log_pending(&log)?;
            let task = load_task(uow, log.task_id)?;
            lifecycle::check_task_status(&task, TaskStatus::PendingApproval)?;
            let participant = load_participant(uow, log.participant_id)?;

            award(uow, &participant, &mut log, Utc::now())?;
            uow.update_log(&log)?;
            uow.update_task_status(task.id, TaskStatus::Approved)?;
            Ok(log)
        })
        .await?;

        tracing::info!(
            log_id = %log_id,
            participant_id = %log.participant_id,
            points = ?log.points_awarded,
            "Completion approved"
        );
        Ok(log)
    }

    /// Reject a pending completion. No points move and the task stays off
    /// the board.
    pub async fn reject_completion(&self, log_id: LogId) -> Result<CompletionLog, ChoreError> {
        let log = transact(self.store(), move |uow| {
            let mut log = load_log(uow, log_id)?;
            lifecycle::check_log_pending(&log)?;
            let task = load_task(uow, log.task_id)?;
            lifecycle::check_task_status(&task, TaskStatus::PendingApproval)?;

            log.status = LogStatus::Rejected;
            uow.update_log(&log)?;
            uow.update_task_status(task.id, TaskStatus::Rejected)?;
            Ok(log)
        })
        .await?;

        tracing::info!(log_id = %log_id, task_id = %log.task_id, "Completion rejected");
        Ok(log)
    }

    /// Take back an approved award and put the task back on the board.
    ///
    /// Exactly the stored `points_awarded` is reversed, whatever the task
    /// is worth now.
    pub async fn unapprove_and_return(&self, log_id: LogId) -> Result<CompletionLog, ChoreError> {
        let log = transact(self.store(), move |uow| {
            let mut log = load_log(uow, log_id)?;
            let amount = lifecycle::check_log_reversible(&log)?;
            let task = load_task(uow, log.task_id)?;
            lifecycle::check_task_status(&task, TaskStatus::Approved)?;
            let participant = load_participant(uow, log.participant_id)?;

            let balance = Balance::of(&participant).reverse(amount)?;
            uow.update_balance(participant.id, balance)?;

            log.status = LogStatus::Rejected;
            uow.update_log(&log)?;
            uow.update_task_status(task.id, TaskStatus::Open)?;
            Ok(log)
        })
        .await?;

        tracing::info!(
            log_id = %log_id,
            task_id = %log.task_id,
            participant_id = %log.participant_id,
            points = ?log.points_awarded,
            "Award reversed, task returned to board"
        );
        Ok(log)
    }

    /// Take an open or claimed task off the board.
    pub async fn remove_task(&self, task_id: TaskId) -> Result<Task, ChoreError> {
        let task = transact(self.store(), move |uow| {
            let task = load_task(uow, task_id)?;
            lifecycle::check_on_board(&task)?;
            uow.update_task_status(task_id, TaskStatus::Removed)?;
            load_task(uow, task_id)
        })
        .await?;

        tracing::info!(task_id = %task_id, "Task removed from board");
        Ok(task)
    }

    // === Recurring tasks ===

    pub async fn generate_due_tasks(&self) -> Result<Vec<TaskId>, ChoreError> {
        self.generate_due_tasks_at(Utc::now()).await
    }

    /// Materialize one open task for every template due at `now`.
    ///
    /// The due-check, the inserts and the `last_generated_at` bump are one
    /// unit. A racing generator that slips a task in first makes the
    /// insert fail with `Conflict` and this batch rolls back.
    pub async fn generate_due_tasks_at(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>, ChoreError> {
        let created = transact(self.store(), move |uow| {
            let mut created = Vec::new();
            let mut processed = Vec::new();

            for template in uow.list_templates()? {
                let outstanding = uow.has_outstanding_task(template.id)?;
                if !scheduler::is_due(&template, outstanding, now) {
                    continue;
                }
                let task = scheduler::materialize(&template, now);
                uow.insert_task(&task)?;
                created.push(task.id);
                processed.push(template.id);
            }

            if !processed.is_empty() {
                uow.set_last_generated(&processed, now)?;
            }
            Ok(created)
        })
        .await?;

        if created.is_empty() {
            tracing::debug!("No recurring tasks due");
        } else {
            tracing::info!(count = created.len(), "Generated recurring tasks");
        }
        Ok(created)
    }

    // === Rewards ===

    /// File a redemption request. The balance is not checked here; it is
    /// checked when the request is approved.
    pub async fn request_reward(
        &self,
        participant_id: ParticipantId,
        reward_id: RewardId,
    ) -> Result<RewardRequest, ChoreError> {
        let request = transact(self.store(), move |uow| {
            let participant = load_participant(uow, participant_id)?;
            if !participant.is_active {
                return Err(ChoreError::Permission(format!(
                    "participant {} is inactive",
                    participant_id
                )));
            }
            let reward = load_reward(uow, reward_id)?;
            if !reward.is_active {
                return Err(ChoreError::Conflict(format!(
                    "reward {} is no longer available",
                    reward_id
                )));
            }
            if !Balance::of(&participant).can_afford(reward.cost_points) {
                tracing::debug!(
                    participant_id = %participant_id,
                    reward_id = %reward_id,
                    "Reward requested without enough points yet"
                );
            }

            let request = RewardRequest {
                id: RewardRequestId::new(),
                participant_id,
                reward_id,
                status: RequestStatus::Pending,
                note: None,
                created_at: Utc::now(),
                handled_at: None,
            };
            uow.insert_reward_request(&request)?;
            Ok(request)
        })
        .await?;

        tracing::info!(
            request_id = %request.id,
            participant_id = %participant_id,
            reward_id = %reward_id,
            "Reward requested"
        );
        Ok(request)
    }

    /// Approve a redemption: re-check the balance now, debit it, record the
    /// spend and close the request.
    pub async fn approve_reward(
        &self,
        request_id: RewardRequestId,
    ) -> Result<RewardRequest, ChoreError> {
        let request = transact(self.store(), move |uow| {
            let mut request = load_reward_request(uow, request_id)?;
            check_request_pending(&request)?;
            let reward = load_reward(uow, request.reward_id)?;
            let participant = load_participant(uow, request.participant_id)?;

            let balance = Balance::of(&participant).debit(reward.cost_points)?;
            uow.update_balance(participant.id, balance)?;

            let now = Utc::now();
            uow.insert_transaction(&PointTransaction {
                id: TransactionId::new(),
                participant_id: participant.id,
                kind: TransactionType::Spend,
                amount: reward.cost_points,
                description: format!("Redeemed for \"{}\"", reward.name),
                created_at: now,
            })?;

            request.status = RequestStatus::Approved;
            request.handled_at = Some(now);
            uow.update_reward_request(&request)?;
            Ok(request)
        })
        .await?;

        tracing::info!(
            request_id = %request_id,
            participant_id = %request.participant_id,
            "Reward approved"
        );
        Ok(request)
    }

    pub async fn reject_reward(
        &self,
        request_id: RewardRequestId,
    ) -> Result<RewardRequest, ChoreError> {
        let request = transact(self.store(), move |uow| {
            let mut request = load_reward_request(uow, request_id)?;
            check_request_pending(&request)?;
            request.status = RequestStatus::Rejected;
            request.handled_at = Some(Utc::now());
            uow.update_reward_request(&request)?;
            Ok(request)
        })
        .await?;

        tracing::info!(request_id = %request_id, "Reward rejected");
        Ok(request)
    }

    /// Manual spend or penalty entered by the supervisor.
    ///
    /// A spend fails with `InsufficientFunds` when it exceeds the balance
    /// and leaves lifetime alone; a penalty floors both figures at zero.
    pub async fn adjust_points(
        &self,
        participant_id: ParticipantId,
        amount: u64,
        kind: TransactionType,
        description: String,
    ) -> Result<Participant, ChoreError> {
        let description = description.trim().to_string();
        if description.is_empty() {
            return Err(ChoreError::Validation(
                "description is required".to_string(),
            ));
        }

        let participant = transact(self.store(), move |uow| {
            let mut participant = load_participant(uow, participant_id)?;
            let current = Balance::of(&participant);
            let balance = match kind {
                TransactionType::Spend => current.debit(amount)?,
                TransactionType::Penalty => current.penalize(amount)?,
            };
            uow.update_balance(participant_id, balance)?;
            uow.insert_transaction(&PointTransaction {
                id: TransactionId::new(),
                participant_id,
                kind,
                amount,
                description,
                created_at: Utc::now(),
            })?;
            balance.apply_to(&mut participant);
            Ok(participant)
        })
        .await?;

        tracing::info!(
            participant_id = %participant_id,
            kind = kind.as_str(),
            amount,
            balance = participant.balance,
            "Points adjusted"
        );
        Ok(participant)
    }

    // === Blocks ===

    pub async fn block_participant(
        &self,
        task_id: TaskId,
        participant_id: ParticipantId,
    ) -> Result<(), ChoreError> {
        transact(self.store(), move |uow| {
            load_task(uow, task_id)?;
            load_participant(uow, participant_id)?;
            uow.insert_block(BlockEdge {
                task_id,
                participant_id,
            })
        })
        .await?;

        tracing::info!(task_id = %task_id, participant_id = %participant_id, "Participant blocked");
        Ok(())
    }

    pub async fn unblock_participant(
        &self,
        task_id: TaskId,
        participant_id: ParticipantId,
    ) -> Result<(), ChoreError> {
        let removed = transact(self.store(), move |uow| {
            uow.delete_block(BlockEdge {
                task_id,
                participant_id,
            })
        })
        .await?;

        if removed {
            tracing::info!(task_id = %task_id, participant_id = %participant_id, "Participant unblocked");
        }
        Ok(())
    }

    // === Job requests ===

    pub async fn request_new_job(
        &self,
        participant_id: ParticipantId,
        message: Option<String>,
    ) -> Result<JobRequest, ChoreError> {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let request = transact(self.store(), move |uow| {
            load_participant(uow, participant_id)?;
            let request = JobRequest {
                id: JobRequestId::new(),
                participant_id,
                message,
                handled: false,
                created_at: Utc::now(),
            };
            uow.insert_job_request(&request)?;
            Ok(request)
        })
        .await?;

        tracing::info!(request_id = %request.id, participant_id = %participant_id, "New job requested");
        Ok(request)
    }

    pub async fn mark_job_request_handled(&self, id: JobRequestId) -> Result<JobRequest, ChoreError> {
        let request = transact(self.store(), move |uow| {
            let mut request = uow
                .get_job_request(id)?
                .ok_or_else(|| ChoreError::not_found("Job request", id))?;
            if request.handled {
                return Err(ChoreError::Conflict(format!(
                    "job request {} was already handled",
                    id
                )));
            }
            request.handled = true;
            uow.update_job_request(&request)?;
            Ok(request)
        })
        .await?;

        tracing::info!(request_id = %id, "Job request handled");
        Ok(request)
    }

    // === Settings and snapshots ===

    pub async fn settings(&self) -> Result<BoardSettings, ChoreError> {
        transact(self.store(), |uow| uow.get_settings()).await
    }

    pub async fn update_settings(&self, settings: BoardSettings) -> Result<BoardSettings, ChoreError> {
        transact(self.store(), move |uow| uow.put_settings(settings)).await?;

        tracing::info!(show_rewards_on_board = settings.show_rewards_on_board, "Board settings updated");
        Ok(settings)
    }

    /// Participant-facing snapshot. Due recurring tasks are generated
    /// first; a generation failure is logged and the board still loads.
    pub async fn board(&self) -> Result<Board, ChoreError> {
        if let Err(e) = self.generate_due_tasks().await {
            tracing::warn!(error = %e, "Recurring task generation failed");
        }

        transact(self.store(), |uow| {
            let settings = uow.get_settings()?;
            let rewards = if settings.show_rewards_on_board {
                Some(uow.list_rewards(true)?)
            } else {
                None
            };
            Ok(Board {
                participants: uow.list_participants(true)?,
                tasks: uow.list_tasks(true)?,
                blocks: uow.list_blocks()?,
                settings,
                rewards,
            })
        })
        .await
    }

    pub async fn dashboard(&self) -> Result<Dashboard, ChoreError> {
        transact(self.store(), |uow| {
            Ok(Dashboard {
                participants: uow.list_participants(false)?,
                tasks: uow.list_tasks(false)?,
                templates: uow.list_templates()?,
                rewards: uow.list_rewards(false)?,
                pending_logs: uow.list_logs(LogStatus::Completed, None)?,
                recent_approved_logs: uow
                    .list_logs(LogStatus::Approved, Some(DASHBOARD_HISTORY_LIMIT))?,
                recent_transactions: uow.list_transactions(DASHBOARD_HISTORY_LIMIT)?,
                recent_reward_requests: uow.list_reward_requests(DASHBOARD_HISTORY_LIMIT)?,
                job_requests: uow.list_job_requests(true)?,
                blocks: uow.list_blocks()?,
                settings: uow.get_settings()?,
            })
        })
        .await
    }

    // === Catalog ===

    pub async fn create_participant(&self, new: NewParticipant) -> Result<Participant, ChoreError> {
        let participant = Participant {
            id: ParticipantId::new(),
            name: require_name(&new.name)?,
            age: new.age,
            color: new.color.filter(|c| !c.trim().is_empty()),
            balance: 0,
            lifetime: 0,
            is_active: true,
            created_at: Utc::now(),
        };

        let participant = transact(self.store(), move |uow| {
            uow.insert_participant(&participant)?;
            Ok(participant)
        })
        .await?;

        tracing::info!(participant_id = %participant.id, name = %participant.name, "Participant created");
        Ok(participant)
    }

    /// Participants are never deleted, only deactivated.
    pub async fn deactivate_participant(&self, id: ParticipantId) -> Result<Participant, ChoreError> {
        let participant = transact(self.store(), move |uow| {
            let mut participant = load_participant(uow, id)?;
            participant.is_active = false;
            uow.update_participant(&participant)?;
            Ok(participant)
        })
        .await?;

        tracing::info!(participant_id = %id, "Participant deactivated");
        Ok(participant)
    }

    pub async fn create_task(&self, new: NewTask) -> Result<Task, ChoreError> {
        let task = Task {
            id: TaskId::new(),
            name: require_name(&new.name)?,
            description: new.description,
            base_points: require_points("base_points", new.base_points)?,
            requires_approval: new.requires_approval,
            min_age: new.min_age,
            status: TaskStatus::Open,
            origin: TaskOrigin::Manual,
            created_at: Utc::now(),
        };

        let task = transact(self.store(), move |uow| {
            uow.insert_task(&task)?;
            Ok(task)
        })
        .await?;

        tracing::info!(task_id = %task.id, name = %task.name, "Task created");
        Ok(task)
    }

    /// Edit a task still on the board. Logs already written keep the
    /// points they captured at completion.
    pub async fn update_task(&self, id: TaskId, patch: TaskPatch) -> Result<Task, ChoreError> {
        let name = patch.name.as_deref().map(require_name).transpose()?;
        let base_points = patch
            .base_points
            .map(|p| require_points("base_points", p))
            .transpose()?;

        let task = transact(self.store(), move |uow| {
            let mut task = load_task(uow, id)?;
            lifecycle::check_on_board(&task)?;
            if let Some(name) = name {
                task.name = name;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(points) = base_points {
                task.base_points = points;
            }
            if let Some(requires_approval) = patch.requires_approval {
                task.requires_approval = requires_approval;
            }
            if let Some(min_age) = patch.min_age {
                task.min_age = min_age;
            }
            uow.update_task_details(&task)?;
            Ok(task)
        })
        .await?;

        tracing::info!(task_id = %id, base_points = task.base_points, "Task updated");
        Ok(task)
    }

    pub async fn create_template(&self, new: NewTemplate) -> Result<Template, ChoreError> {
        let template = Template {
            id: TemplateId::new(),
            name: require_name(&new.name)?,
            description: new.description,
            base_points: require_points("base_points", new.base_points)?,
            requires_approval: new.requires_approval,
            min_age: new.min_age,
            frequency_days: require_frequency(new.frequency_days)?,
            is_active: true,
            last_generated_at: None,
            created_at: Utc::now(),
        };

        let template = transact(self.store(), move |uow| {
            uow.insert_template(&template)?;
            Ok(template)
        })
        .await?;

        tracing::info!(template_id = %template.id, name = %template.name, "Template created");
        Ok(template)
    }

    pub async fn update_template(
        &self,
        id: TemplateId,
        patch: TemplatePatch,
    ) -> Result<Template, ChoreError> {
        let name = patch.name.as_deref().map(require_name).transpose()?;
        let base_points = patch
            .base_points
            .map(|p| require_points("base_points", p))
            .transpose()?;
        let frequency_days = patch.frequency_days.map(require_frequency).transpose()?;

        let template = transact(self.store(), move |uow| {
            let mut template = uow
                .get_template(id)?
                .ok_or_else(|| ChoreError::not_found("Template", id))?;
            if let Some(name) = name {
                template.name = name;
            }
            if let Some(description) = patch.description {
                template.description = description;
            }
            if let Some(points) = base_points {
                template.base_points = points;
            }
            if let Some(requires_approval) = patch.requires_approval {
                template.requires_approval = requires_approval;
            }
            if let Some(min_age) = patch.min_age {
                template.min_age = min_age;
            }
            if let Some(days) = frequency_days {
                template.frequency_days = days;
            }
            uow.update_template(&template)?;
            Ok(template)
        })
        .await?;

        tracing::info!(template_id = %id, frequency_days = template.frequency_days, "Template updated");
        Ok(template)
    }

    pub async fn set_template_active(
        &self,
        id: TemplateId,
        is_active: bool,
    ) -> Result<Template, ChoreError> {
        let template = transact(self.store(), move |uow| {
            let mut template = uow
                .get_template(id)?
                .ok_or_else(|| ChoreError::not_found("Template", id))?;
            template.is_active = is_active;
            uow.update_template(&template)?;
            Ok(template)
        })
        .await?;

        tracing::info!(template_id = %id, is_active, "Template toggled");
        Ok(template)
    }

    pub async fn create_reward(&self, new: NewReward) -> Result<Reward, ChoreError> {
        let reward = Reward {
            id: RewardId::new(),
            name: require_name(&new.name)?,
            description: new.description,
            cost_points: require_points("cost_points", new.cost_points)?,
            is_active: true,
            created_at: Utc::now(),
        };

        let reward = transact(self.store(), move |uow| {
            uow.insert_reward(&reward)?;
            Ok(reward)
        })
        .await?;

        tracing::info!(reward_id = %reward.id, name = %reward.name, "Reward created");
        Ok(reward)
    }

    pub async fn set_reward_active(&self, id: RewardId, is_active: bool) -> Result<Reward, ChoreError> {
        let reward = transact(self.store(), move |uow| {
            let mut reward = load_reward(uow, id)?;
            reward.is_active = is_active;
            uow.update_reward(&reward)?;
            Ok(reward)
        })
        .await?;

        tracing::info!(reward_id = %id, is_active, "Reward toggled");
        Ok(reward)
    }
}

/// Credit the log's completion-time points and mark it approved.
fn award(
    uow: &mut dyn UnitOfWork,
    participant: &Participant,
    log: &mut CompletionLog,
    now: DateTime<Utc>,
) -> Result<u64, ChoreError> {
    let points = log.points_at_completion;
    let balance = Balance::of(participant).credit(points)?;
    uow.update_balance(participant.id, balance)?;

    log.status = LogStatus::Approved;
    log.approved_at = Some(now);
    log.points_awarded = Some(points);
    Ok(points)
}

fn check_request_pending(request: &RewardRequest) -> Result<(), ChoreError> {
    if request.status != RequestStatus::Pending {
        return Err(ChoreError::Conflict(format!(
            "reward request {} was already handled ({})",
            request.id,
            request.status.as_str()
        )));
    }
    Ok(())
}

fn require_name(name: &str) -> Result<String, ChoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChoreError::Validation("name is required".to_string()));
    }
    Ok(name.to_string())
}

fn require_points(field: &str, value: u64) -> Result<u64, ChoreError> {
    if value == 0 {
        return Err(ChoreError::Validation(format!("{} must be positive", field)));
    }
    Ok(value)
}

fn require_frequency(days: u32) -> Result<u32, ChoreError> {
    if days == 0 {
        return Err(ChoreError::Validation(
            "frequency_days must be positive".to_string(),
        ));
    }
    Ok(days)
}

fn load_task(uow: &dyn UnitOfWork, id: TaskId) -> Result<Task, ChoreError> {
    uow.get_task(id)?
        .ok_or_else(|| ChoreError::not_found("Task", id))
}

fn load_participant(uow: &dyn UnitOfWork, id: ParticipantId) -> Result<Participant, ChoreError> {
    uow.get_participant(id)?
        .ok_or_else(|| ChoreError::not_found("Participant", id))
}

fn load_log(uow: &dyn UnitOfWork, id: LogId) -> Result<CompletionLog, ChoreError> {
    uow.get_log(id)?
        .ok_or_else(|| ChoreError::not_found("Completion log", id))
}

fn load_reward(uow: &dyn UnitOfWork, id: RewardId) -> Result<Reward, ChoreError> {
    uow.get_reward(id)?
        .ok_or_else(|| ChoreError::not_found("Reward", id))
}

fn load_reward_request(
    uow: &dyn UnitOfWork,
    id: RewardRequestId,
) -> Result<RewardRequest, ChoreError> {
    uow.get_reward_request(id)?
        .ok_or_else(|| ChoreError::not_found("Reward request", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::InMemoryChoreStore;
    use chrono::Duration;

    fn service() -> ChoreService {
        ChoreService::new(Arc::new(InMemoryChoreStore::new()))
    }

    async fn kid(svc: &ChoreService, name: &str, age: Option<u32>) -> Participant {
        svc.create_participant(NewParticipant {
            name: name.to_string(),
            age,
            color: None,
        })
        .await
        .unwrap()
    }

    async fn chore(svc: &ChoreService, points: u64, requires_approval: bool, min_age: Option<u32>) -> Task {
        svc.create_task(NewTask {
            name: "Take out trash".to_string(),
            description: None,
            base_points: points,
            requires_approval,
            min_age,
        })
        .await
        .unwrap()
    }

    async fn participant(svc: &ChoreService, id: ParticipantId) -> Participant {
        transact(svc.store(), move |uow| load_participant(uow, id))
            .await
            .unwrap()
    }

    async fn task(svc: &ChoreService, id: TaskId) -> Task {
        transact(svc.store(), move |uow| load_task(uow, id))
            .await
            .unwrap()
    }

    async fn set_balance(svc: &ChoreService, id: ParticipantId, balance: u64, lifetime: u64) {
        transact(svc.store(), move |uow| {
            uow.update_balance(id, Balance::new(balance, lifetime))
        })
        .await
        .unwrap();
    }

    /// Claim and complete an approval-required task, returning its log.
    async fn pending_log(svc: &ChoreService, who: &Participant, points: u64) -> (Task, LogId) {
        let t = chore(svc, points, true, None).await;
        svc.claim_task(t.id, who.id).await.unwrap();
        match svc.complete_task(t.id, who.id).await.unwrap() {
            CompletionOutcome::PendingApproval { log_id } => (t, log_id),
            other => panic!("expected pending approval, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_under_age_claim_is_refused() {
        let svc = service();
        let young = kid(&svc, "Mia", Some(8)).await;
        let t = chore(&svc, 5, false, Some(10)).await;

        let err = svc.claim_task(t.id, young.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(task(&svc, t.id).await.status, TaskStatus::Open);
    }

    #[tokio::test]
    async fn test_claim_and_complete_awards_once() {
        let svc = service();
        let p = kid(&svc, "Leo", Some(12)).await;
        let t = chore(&svc, 5, false, None).await;

        let claimed = svc.claim_task(t.id, p.id).await.unwrap();
        assert_eq!(claimed.claimed_by(), Some(p.id));

        let outcome = svc.complete_task(t.id, p.id).await.unwrap();
        assert!(matches!(outcome, CompletionOutcome::Awarded { points: 5, .. }));

        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (5, 5));
        let done = task(&svc, t.id).await;
        assert!(!done.is_active());
        assert_eq!(done.status, TaskStatus::Approved);

        // Off the board: a second completion is refused and pays nothing.
        let err = svc.complete_task(t.id, p.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (5, 5));
    }

    #[tokio::test]
    async fn test_second_claim_conflicts() {
        let svc = service();
        let a = kid(&svc, "Ada", None).await;
        let b = kid(&svc, "Bo", None).await;
        let t = chore(&svc, 2, false, None).await;

        svc.claim_task(t.id, a.id).await.unwrap();
        let err = svc.claim_task(t.id, b.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(task(&svc, t.id).await.claimed_by(), Some(a.id));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let svc = service();
        let t = chore(&svc, 2, false, None).await;
        let mut kids = Vec::new();
        for i in 0..8 {
            kids.push(kid(&svc, &format!("kid{}", i), None).await);
        }

        let handles: Vec<_> = kids
            .iter()
            .map(|k| {
                let svc = svc.clone();
                let (task_id, kid_id) = (t.id, k.id);
                tokio::spawn(async move { svc.claim_task(task_id, kid_id).await })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(task) => winners.push(task.claimed_by()),
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(task(&svc, t.id).await.claimed_by(), winners[0]);
    }

    #[tokio::test]
    async fn test_blocked_participant_cannot_claim() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let t = chore(&svc, 2, false, None).await;

        svc.block_participant(t.id, p.id).await.unwrap();
        svc.block_participant(t.id, p.id).await.unwrap();
        let err = svc.claim_task(t.id, p.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        svc.unblock_participant(t.id, p.id).await.unwrap();
        svc.unblock_participant(t.id, p.id).await.unwrap();
        svc.claim_task(t.id, p.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unclaim_only_by_claimant_or_supervisor() {
        let svc = service();
        let a = kid(&svc, "Ada", None).await;
        let b = kid(&svc, "Bo", None).await;
        let t = chore(&svc, 2, false, None).await;

        svc.claim_task(t.id, a.id).await.unwrap();
        let err = svc
            .unclaim_task(t.id, Actor::Participant { id: b.id })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        let reopened = svc
            .unclaim_task(t.id, Actor::Participant { id: a.id })
            .await
            .unwrap();
        assert_eq!(reopened.status, TaskStatus::Open);

        svc.claim_task(t.id, b.id).await.unwrap();
        let reopened = svc.unclaim_task(t.id, Actor::Supervisor).await.unwrap();
        assert_eq!(reopened.claimed_by(), None);
    }

    #[tokio::test]
    async fn test_only_claimant_completes() {
        let svc = service();
        let a = kid(&svc, "Ada", None).await;
        let b = kid(&svc, "Bo", None).await;
        let t = chore(&svc, 2, false, None).await;

        let err = svc.complete_task(t.id, a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        svc.claim_task(t.id, a.id).await.unwrap();
        let err = svc.complete_task(t.id, b.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn test_approval_flow_and_idempotency() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let (t, log_id) = pending_log(&svc, &p, 4).await;

        assert_eq!(task(&svc, t.id).await.status, TaskStatus::PendingApproval);
        assert_eq!(participant(&svc, p.id).await.balance, 0);

        let log = svc.approve_completion(log_id).await.unwrap();
        assert_eq!(log.status, LogStatus::Approved);
        assert_eq!(log.points_awarded, Some(4));
        assert!(log.approved_at.is_some());

        let err = svc.approve_completion(log_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = svc.reject_completion(log_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (4, 4));
    }

    #[tokio::test]
    async fn test_reject_leaves_task_off_board() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let (t, log_id) = pending_log(&svc, &p, 4).await;

        let log = svc.reject_completion(log_id).await.unwrap();
        assert_eq!(log.status, LogStatus::Rejected);
        assert_eq!(task(&svc, t.id).await.status, TaskStatus::Rejected);
        assert_eq!(participant(&svc, p.id).await.balance, 0);

        let err = svc.approve_completion(log_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_unapprove_floors_and_reopens() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let t = chore(&svc, 7, false, None).await;
        svc.claim_task(t.id, p.id).await.unwrap();
        let log_id = match svc.complete_task(t.id, p.id).await.unwrap() {
            CompletionOutcome::Awarded { log_id, points } => {
                assert_eq!(points, 7);
                log_id
            }
            other => panic!("expected award, got {:?}", other),
        };

        // Points were spent elsewhere since the award.
        set_balance(&svc, p.id, 3, 3).await;

        let log = svc.unapprove_and_return(log_id).await.unwrap();
        assert_eq!(log.status, LogStatus::Rejected);

        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (0, 0));
        let reopened = task(&svc, t.id).await;
        assert_eq!(reopened.status, TaskStatus::Open);
        assert_eq!(reopened.claimed_by(), None);

        let err = svc.unapprove_and_return(log_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_unapprove_reverses_stored_award() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let (t, log_id) = pending_log(&svc, &p, 6).await;
        svc.approve_completion(log_id).await.unwrap();
        set_balance(&svc, p.id, 20, 30).await;

        // The task is repriced after the award; only the 6 awarded comes back.
        let t_id = t.id;
        transact(svc.store(), move |uow| {
            let mut t = load_task(uow, t_id)?;
            t.base_points = 40;
            uow.update_task_details(&t)
        })
        .await
        .unwrap();

        let log = svc.unapprove_and_return(log_id).await.unwrap();
        assert_eq!(log.points_awarded, Some(6));
        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (14, 24));

        // Back on the board, the next completion earns the new price.
        let reopened = task(&svc, t.id).await;
        assert_eq!(reopened.base_points, 40);
        svc.claim_task(t.id, p.id).await.unwrap();
        let CompletionOutcome::PendingApproval { log_id } = svc.complete_task(t.id, p.id).await.unwrap() else {
            panic!("expected pending approval");
        };
        svc.approve_completion(log_id).await.unwrap();
        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (54, 64));
    }

    #[tokio::test]
    async fn test_update_task() {
        let svc = service();
        let p = kid(&svc, "Ada", Some(9)).await;
        let t = chore(&svc, 5, false, Some(12)).await;

        let edited = svc
            .update_task(
                t.id,
                TaskPatch {
                    name: Some("  Fold laundry ".to_string()),
                    base_points: Some(8),
                    min_age: Some(None),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Fold laundry");
        assert_eq!(edited.base_points, 8);
        assert_eq!(edited.min_age, None);
        assert!(!edited.requires_approval);

        // The age limit is gone, so the claim now goes through and the new price pays out.
        svc.claim_task(t.id, p.id).await.unwrap();
        let outcome = svc.complete_task(t.id, p.id).await.unwrap();
        assert!(matches!(outcome, CompletionOutcome::Awarded { points: 8, .. }));

        // Off the board: edits are refused.
        let err = svc
            .update_task(t.id, TaskPatch { base_points: Some(1), ..TaskPatch::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(task(&svc, t.id).await.base_points, 8);
    }

    #[tokio::test]
    async fn test_update_task_keeps_pending_log_points() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let t = chore(&svc, 4, true, None).await;
        svc.claim_task(t.id, p.id).await.unwrap();

        // Repricing a claimed task is allowed and keeps the claim.
        let edited = svc
            .update_task(t.id, TaskPatch { base_points: Some(10), ..TaskPatch::default() })
            .await
            .unwrap();
        assert_eq!(edited.claimed_by(), Some(p.id));

        let CompletionOutcome::PendingApproval { log_id } = svc.complete_task(t.id, p.id).await.unwrap() else {
            panic!("expected pending approval");
        };
        let err = svc
            .update_task(t.id, TaskPatch { base_points: Some(1), ..TaskPatch::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        svc.approve_completion(log_id).await.unwrap();
        assert_eq!(participant(&svc, p.id).await.balance, 10);
    }

    #[tokio::test]
    async fn test_update_template() {
        let svc = service();
        let tpl = svc
            .create_template(NewTemplate {
                name: "Vacuum".to_string(),
                description: Some("Living room".to_string()),
                base_points: 3,
                requires_approval: false,
                min_age: None,
                frequency_days: 2,
            })
            .await
            .unwrap();

        let edited = svc
            .update_template(
                tpl.id,
                TemplatePatch {
                    base_points: Some(6),
                    frequency_days: Some(7),
                    description: Some(None),
                    ..TemplatePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Vacuum");
        assert_eq!(edited.base_points, 6);
        assert_eq!(edited.frequency_days, 7);
        assert_eq!(edited.description, None);
        assert!(edited.is_active);

        for patch in [
            TemplatePatch { frequency_days: Some(0), ..TemplatePatch::default() },
            TemplatePatch { base_points: Some(0), ..TemplatePatch::default() },
            TemplatePatch { name: Some("   ".to_string()), ..TemplatePatch::default() },
        ] {
            let err = svc.update_template(tpl.id, patch).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let created = svc.generate_due_tasks().await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(task(&svc, created[0]).await.base_points, 6);

        let err = svc
            .update_template(TemplateId::new(), TemplatePatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_patch_null_clears_absent_keeps() {
        let patch: TaskPatch = serde_json::from_str(r#"{"min_age": null}"#).unwrap();
        assert_eq!(patch.min_age, Some(None));
        assert_eq!(patch.description, None);

        let patch: TaskPatch = serde_json::from_str(r#"{"min_age": 7}"#).unwrap();
        assert_eq!(patch.min_age, Some(Some(7)));
    }

    #[tokio::test]
    async fn test_generate_due_template() {
        let svc = service();
        let tpl = svc
            .create_template(NewTemplate {
                name: "Vacuum".to_string(),
                description: None,
                base_points: 3,
                requires_approval: false,
                min_age: None,
                frequency_days: 2,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let tpl_id = tpl.id;
        transact(svc.store(), move |uow| {
            let mut tpl = uow.get_template(tpl_id)?.unwrap();
            tpl.last_generated_at = Some(now - Duration::days(3));
            uow.update_template(&tpl)
        })
        .await
        .unwrap();

        let created = svc.generate_due_tasks_at(now).await.unwrap();
        assert_eq!(created.len(), 1);
        let generated = task(&svc, created[0]).await;
        assert_eq!(generated.status, TaskStatus::Open);
        assert_eq!(generated.origin.template_id(), Some(tpl_id));
        assert_eq!(generated.base_points, 3);

        let tpl = transact(svc.store(), move |uow| uow.get_template(tpl_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tpl.last_generated_at, Some(now));

        // Outstanding instance: repeated runs add nothing, even much later.
        assert!(svc.generate_due_tasks_at(now).await.unwrap().is_empty());
        assert!(svc
            .generate_due_tasks_at(now + Duration::days(10))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_generated_task_cycle() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let tpl = svc
            .create_template(NewTemplate {
                name: "Feed fish".to_string(),
                description: None,
                base_points: 1,
                requires_approval: true,
                min_age: None,
                frequency_days: 1,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let first = svc.generate_due_tasks_at(now).await.unwrap();
        assert_eq!(first.len(), 1);

        // Pending approval still counts as outstanding.
        svc.claim_task(first[0], p.id).await.unwrap();
        svc.complete_task(first[0], p.id).await.unwrap();
        let later = now + Duration::days(2);
        assert!(svc.generate_due_tasks_at(later).await.unwrap().is_empty());

        let log_id = transact(svc.store(), |uow| uow.list_logs(LogStatus::Completed, None))
            .await
            .unwrap()[0]
            .id;
        svc.approve_completion(log_id).await.unwrap();
        let second = svc.generate_due_tasks_at(later).await.unwrap();
        assert_eq!(second.len(), 1);

        // The old instance can't come back while the new one is outstanding.
        let err = svc.unapprove_and_return(log_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let after = participant(&svc, p.id).await;
        assert_eq!(after.balance, 1);
        assert_eq!(task(&svc, first[0]).await.status, TaskStatus::Approved);

        svc.set_template_active(tpl.id, false).await.unwrap();
        svc.remove_task(second[0]).await.unwrap();
        assert!(svc
            .generate_due_tasks_at(later + Duration::days(5))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_generation_single_instance() {
        let svc = service();
        svc.create_template(NewTemplate {
            name: "Make bed".to_string(),
            description: None,
            base_points: 1,
            requires_approval: false,
            min_age: None,
            frequency_days: 1,
        })
        .await
        .unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.generate_due_tasks().await })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            if let Ok(ids) = handle.await.unwrap() {
                total += ids.len();
            }
        }
        assert_eq!(total, 1);
        let tasks = transact(svc.store(), |uow| uow.list_tasks(true)).await.unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_reward_revalidated_at_approval() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let reward = svc
            .create_reward(NewReward {
                name: "Movie night".to_string(),
                description: None,
                cost_points: 10,
            })
            .await
            .unwrap();

        set_balance(&svc, p.id, 12, 12).await;
        let request = svc.request_reward(p.id, reward.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        set_balance(&svc, p.id, 6, 12).await;
        let err = svc.approve_reward(request.id).await.unwrap_err();
        assert_eq!(
            err,
            ChoreError::InsufficientFunds {
                needed: 10,
                available: 6
            }
        );
        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (6, 12));
        let txs = transact(svc.store(), |uow| uow.list_transactions(10)).await.unwrap();
        assert!(txs.is_empty());

        set_balance(&svc, p.id, 15, 20).await;
        let approved = svc.approve_reward(request.id).await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.handled_at.is_some());

        let after = participant(&svc, p.id).await;
        assert_eq!((after.balance, after.lifetime), (5, 20));
        let txs = transact(svc.store(), |uow| uow.list_transactions(10)).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionType::Spend);
        assert_eq!(txs[0].description, "Redeemed for \"Movie night\"");

        let err = svc.reject_reward(request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_reject_reward_no_ledger_effect() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let reward = svc
            .create_reward(NewReward {
                name: "Ice cream".to_string(),
                description: None,
                cost_points: 3,
            })
            .await
            .unwrap();
        set_balance(&svc, p.id, 5, 5).await;

        let request = svc.request_reward(p.id, reward.id).await.unwrap();
        let rejected = svc.reject_reward(request.id).await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(participant(&svc, p.id).await.balance, 5);
        assert_eq!(
            svc.approve_reward(request.id).await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }

    #[tokio::test]
    async fn test_adjust_points() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        set_balance(&svc, p.id, 4, 10).await;

        let err = svc
            .adjust_points(p.id, 2, TransactionType::Penalty, "   ".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc
            .adjust_points(p.id, 5, TransactionType::Spend, "candy".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let after = svc
            .adjust_points(p.id, 3, TransactionType::Spend, "candy".to_string())
            .await
            .unwrap();
        assert_eq!((after.balance, after.lifetime), (1, 10));

        let after = svc
            .adjust_points(p.id, 6, TransactionType::Penalty, " fighting ".to_string())
            .await
            .unwrap();
        assert_eq!((after.balance, after.lifetime), (0, 4));

        let txs = transact(svc.store(), |uow| uow.list_transactions(10)).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().any(|t| t.description == "fighting"));
    }

    #[tokio::test]
    async fn test_failed_award_leaves_no_trace() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let t = chore(&svc, 5, false, None).await;
        svc.claim_task(t.id, p.id).await.unwrap();

        // Credit would overflow: the whole completion rolls back.
        set_balance(&svc, p.id, u64::MAX, 0).await;
        let err = svc.complete_task(t.id, p.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(task(&svc, t.id).await.claimed_by(), Some(p.id));
        let logs = transact(svc.store(), |uow| uow.list_logs(LogStatus::Approved, None))
            .await
            .unwrap();
        assert!(logs.is_empty());
        assert_eq!(participant(&svc, p.id).await.balance, u64::MAX);
    }

    #[tokio::test]
    async fn test_remove_task() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let t = chore(&svc, 2, false, None).await;
        svc.claim_task(t.id, p.id).await.unwrap();

        let removed = svc.remove_task(t.id).await.unwrap();
        assert_eq!(removed.status, TaskStatus::Removed);
        assert_eq!(removed.claimed_by(), None);
        assert_eq!(
            svc.claim_task(t.id, p.id).await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            svc.remove_task(t.id).await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }

    #[tokio::test]
    async fn test_job_requests() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let request = svc
            .request_new_job(p.id, Some("  bored!  ".to_string()))
            .await
            .unwrap();
        assert_eq!(request.message.as_deref(), Some("bored!"));

        let dash = svc.dashboard().await.unwrap();
        assert_eq!(dash.job_requests.len(), 1);

        svc.mark_job_request_handled(request.id).await.unwrap();
        assert_eq!(
            svc.mark_job_request_handled(request.id)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::Conflict
        );
        assert!(svc.dashboard().await.unwrap().job_requests.is_empty());

        let err = svc
            .request_new_job(ParticipantId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_board_snapshot() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let gone = kid(&svc, "Old", None).await;
        svc.deactivate_participant(gone.id).await.unwrap();
        chore(&svc, 2, false, None).await;
        svc.create_template(NewTemplate {
            name: "Set table".to_string(),
            description: None,
            base_points: 1,
            requires_approval: false,
            min_age: None,
            frequency_days: 1,
        })
        .await
        .unwrap();
        svc.create_reward(NewReward {
            name: "Sticker".to_string(),
            description: None,
            cost_points: 1,
        })
        .await
        .unwrap();

        let board = svc.board().await.unwrap();
        assert_eq!(board.participants.len(), 1);
        assert_eq!(board.participants[0].id, p.id);
        // Loading the board generated the due template instance.
        assert_eq!(board.tasks.len(), 2);
        assert!(board.rewards.is_none());

        svc.update_settings(BoardSettings {
            show_rewards_on_board: true,
        })
        .await
        .unwrap();
        let board = svc.board().await.unwrap();
        assert_eq!(board.tasks.len(), 2);
        assert_eq!(board.rewards.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn test_catalog_validation() {
        let svc = service();
        let err = svc
            .create_participant(NewParticipant {
                name: "  ".to_string(),
                age: None,
                color: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc
            .create_task(NewTask {
                name: "Dust".to_string(),
                description: None,
                base_points: 0,
                requires_approval: false,
                min_age: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc
            .create_template(NewTemplate {
                name: "Dust".to_string(),
                description: None,
                base_points: 1,
                requires_approval: false,
                min_age: None,
                frequency_days: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc
            .set_reward_active(RewardId::new(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_inactive_reward_cannot_be_requested() {
        let svc = service();
        let p = kid(&svc, "Ada", None).await;
        let reward = svc
            .create_reward(NewReward {
                name: "Sleepover".to_string(),
                description: None,
                cost_points: 30,
            })
            .await
            .unwrap();
        svc.set_reward_active(reward.id, false).await.unwrap();
        let err = svc.request_reward(p.id, reward.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
