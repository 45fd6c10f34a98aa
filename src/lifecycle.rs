//! Task lifecycle rules.
//!
//! These functions decide whether a transition is allowed and what the
//! next state is. They never touch storage: the service reads the rows,
//! asks here, and writes the outcome inside one unit of work.
//!
//! ```text
//! Open -> Claimed -> PendingApproval -> Approved | Rejected
//!            \-> Approved            (no approval required)
//! Claimed -> Open                    (unclaim)
//! Approved -> Open                   (unapprove-and-return)
//! Open | Claimed -> Removed          (supervisor)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChoreError;
use crate::model::{CompletionLog, LogStatus, Participant, ParticipantId, Task, TaskStatus};

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Participant { id: ParticipantId },
    Supervisor,
}

/// Check that `participant` may move `task` from open to claimed.
///
/// # Errors
/// - `Conflict` if the task is not open
/// - `Permission` if the participant is inactive, blocked, or too young
pub fn check_claim(task: &Task, participant: &Participant, blocked: bool) -> Result<(), ChoreError> {
    match task.status {
        TaskStatus::Open => {}
        TaskStatus::Claimed { .. } => {
            return Err(ChoreError::Conflict(format!(
                "task {} is already claimed",
                task.id
            )))
        }
        other => {
            return Err(ChoreError::Conflict(format!(
                "task {} is not on the board ({})",
                task.id,
                other.as_str()
            )))
        }
    }

    if !participant.is_active {
        return Err(ChoreError::Permission(format!(
            "participant {} is inactive",
            participant.id
        )));
    }

    if blocked {
        return Err(ChoreError::Permission(format!(
            "{} is not allowed to do this task",
            participant.name
        )));
    }

    // Unknown age is not checked.
    if let (Some(min_age), Some(age)) = (task.min_age, participant.age) {
        if age < min_age {
            return Err(ChoreError::Permission(format!(
                "must be at least {} to do this task",
                min_age
            )));
        }
    }

    Ok(())
}

/// Check that `actor` may return a claimed task to the board.
pub fn check_unclaim(task: &Task, actor: Actor) -> Result<(), ChoreError> {
    let claimed_by = task
        .claimed_by()
        .ok_or_else(|| ChoreError::Conflict(format!("task {} is not claimed", task.id)))?;

    match actor {
        Actor::Supervisor => Ok(()),
        Actor::Participant { id } if id == claimed_by => Ok(()),
        Actor::Participant { .. } => Err(ChoreError::Permission(
            "only the participant who claimed a task can unclaim it".to_string(),
        )),
    }
}

/// Check that `participant` may mark `task` as done and return the state
/// the task moves to.
pub fn check_complete(task: &Task, participant: ParticipantId) -> Result<TaskStatus, ChoreError> {
    match task.status {
        TaskStatus::Claimed { claimed_by } if claimed_by == participant => {
            Ok(completion_status(task))
        }
        TaskStatus::Claimed { .. } => Err(ChoreError::Permission(
            "this task is claimed by someone else".to_string(),
        )),
        TaskStatus::Open => Err(ChoreError::Conflict(format!(
            "task {} must be claimed before it is completed",
            task.id
        ))),
        other => Err(ChoreError::Conflict(format!(
            "task {} is not on the board ({})",
            task.id,
            other.as_str()
        ))),
    }
}

/// Next state of a task that has just been marked done.
pub fn completion_status(task: &Task) -> TaskStatus {
    if task.requires_approval {
        TaskStatus::PendingApproval
    } else {
        TaskStatus::Approved
    }
}

/// A completion log can be approved or rejected only while it is pending.
pub fn check_log_pending(log: &CompletionLog) -> Result<(), ChoreError> {
    if log.status != LogStatus::Completed {
        return Err(ChoreError::Conflict(format!(
            "completion {} was already handled ({})",
            log.id,
            log.status.as_str()
        )));
    }
    Ok(())
}

/// Returns the amount a reversal must take back.
pub fn check_log_reversible(log: &CompletionLog) -> Result<u64, ChoreError> {
    if log.status != LogStatus::Approved {
        return Err(ChoreError::Conflict(format!(
            "completion {} is not approved ({})",
            log.id,
            log.status.as_str()
        )));
    }
    log.points_awarded.ok_or_else(|| {
        ChoreError::Persistence(format!("approved completion {} has no award", log.id))
    })
}

pub fn check_task_status(task: &Task, expected: TaskStatus) -> Result<(), ChoreError> {
    if task.status != expected {
        return Err(ChoreError::Conflict(format!(
            "task {} is {}, expected {}",
            task.id,
            task.status.as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

/// Supervisors may edit or remove a task only while it is open or claimed.
pub fn check_on_board(task: &Task) -> Result<(), ChoreError> {
    if !task.is_active() {
        return Err(ChoreError::Conflict(format!(
            "task {} is already off the board ({})",
            task.id,
            task.status.as_str()
        )));
    }
    Ok(())
}
