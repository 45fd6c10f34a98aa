//! Records kept by the chore board.
//!
//! Every record is addressable by a typed id. Balances live on
//! [`Participant`] and are only changed through [`crate::ledger`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse the textual form stored in the database.
            pub fn parse(value: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(value).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a participant (a kid on the board).
    ParticipantId
);
id_type!(TaskId);
id_type!(TemplateId);
id_type!(
    /// Identifies a completion log row.
    LogId
);
id_type!(RewardId);
id_type!(RewardRequestId);
id_type!(TransactionId);
id_type!(JobRequestId);

/// Someone who claims and completes tasks and holds a points balance.
///
/// # Invariants
/// - `balance` and `lifetime` never go below zero (they are unsigned and
///   every decrement is floored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub age: Option<u32>,
    pub color: Option<String>,
    /// Points available to spend
    pub balance: u64,
    /// Points ever earned (minus penalties and reversals)
    pub lifetime: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Where a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOrigin {
    /// Created by hand from the catalog
    Manual,
    /// Materialized by the recurring scheduler
    Generated { template_id: TemplateId },
}

impl TaskOrigin {
    pub fn template_id(&self) -> Option<TemplateId> {
        match self {
            TaskOrigin::Manual => None,
            TaskOrigin::Generated { template_id } => Some(*template_id),
        }
    }
}

/// Lifecycle state of a task.
///
/// # State Machine
/// ```text
/// Open -> Claimed -> PendingApproval -> Approved
///   ^        |                      \-> Rejected
///   |        \-> Approved (no approval required)
///   +-- Claimed (unclaim)
///   +-- Approved (unapprove-and-return)
/// Open | Claimed -> Removed (supervisor)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Claimed { claimed_by: ParticipantId },
    PendingApproval,
    Approved,
    Rejected,
    Removed,
}

impl TaskStatus {
    /// Whether the task is visible on the board.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::Claimed { .. })
    }

    /// Whether the task still counts against its template's single slot.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            TaskStatus::Open | TaskStatus::Claimed { .. } | TaskStatus::PendingApproval
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Claimed { .. } => "claimed",
            TaskStatus::PendingApproval => "pending_approval",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Removed => "removed",
        }
    }
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub base_points: u64,
    pub requires_approval: bool,
    pub min_age: Option<u32>,
    pub status: TaskStatus,
    pub origin: TaskOrigin,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn claimed_by(&self) -> Option<ParticipantId> {
        match self.status {
            TaskStatus::Claimed { claimed_by } => Some(claimed_by),
            _ => None,
        }
    }
}

/// Blueprint for recurring tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
    pub base_points: u64,
    pub requires_approval: bool,
    pub min_age: Option<u32>,
    /// Cadence in days; always positive
    pub frequency_days: u32,
    pub is_active: bool,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Status of a completion log row. Moves forward only, except for the
/// unapprove-and-return reversal which ends in `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Completed,
    Approved,
    Rejected,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Completed => "COMPLETED",
            LogStatus::Approved => "APPROVED",
            LogStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COMPLETED" => Some(LogStatus::Completed),
            "APPROVED" => Some(LogStatus::Approved),
            "REJECTED" => Some(LogStatus::Rejected),
            _ => None,
        }
    }
}

/// Audit record of a task being marked done and its approval outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionLog {
    pub id: LogId,
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
    pub status: LogStatus,
    /// The task's `base_points` when it was marked done
    pub points_at_completion: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Fixed when the log becomes `Approved`; the only amount a reversal uses
    pub points_awarded: Option<u64>,
}

/// Manual ledger movement recorded for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Spend,
    Penalty,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Spend => "SPEND",
            TransactionType::Penalty => "PENALTY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SPEND" => Some(TransactionType::Spend),
            "PENALTY" => Some(TransactionType::Penalty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: TransactionId,
    pub participant_id: ParticipantId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: u64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    pub description: Option<String>,
    pub cost_points: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(RequestStatus::Pending),
            "APPROVED" => Some(RequestStatus::Approved),
            "REJECTED" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A participant asking to redeem points for a reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRequest {
    pub id: RewardRequestId,
    pub participant_id: ParticipantId,
    pub reward_id: RewardId,
    pub status: RequestStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub handled_at: Option<DateTime<Utc>>,
}

/// Forbids one participant from claiming one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockEdge {
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
}

/// "I'm ready for a new job" nudge from a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: JobRequestId,
    pub participant_id: ParticipantId,
    pub message: Option<String>,
    pub handled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSettings {
    pub show_rewards_on_board: bool,
}
