//! Supervisor endpoints. Mounted behind [`super::auth::require_auth`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::error::ChoreError;
use crate::lifecycle::Actor;
use crate::model::{
    BoardSettings, CompletionLog, JobRequest, JobRequestId, LogId, Participant, ParticipantId,
    Reward, RewardId, RewardRequest, RewardRequestId, Task, TaskId, Template, TemplateId,
};
use crate::service::{
    Dashboard, NewParticipant, NewReward, NewTask, NewTemplate, TaskPatch, TemplatePatch,
};

use super::extract::{AppJson, AppPath};
use super::routes::AppState;
use super::types::{AdjustPointsRequest, GenerateResponse, SetActiveRequest};

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Dashboard>, ChoreError> {
    Ok(Json(state.service.dashboard().await?))
}

pub async fn run_scheduler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GenerateResponse>, ChoreError> {
    let created = state.service.generate_due_tasks().await?;
    Ok(Json(GenerateResponse { created }))
}

// === Completion approvals ===

pub async fn approve_log(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<LogId>,
) -> Result<Json<CompletionLog>, ChoreError> {
    Ok(Json(state.service.approve_completion(id).await?))
}

pub async fn reject_log(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<LogId>,
) -> Result<Json<CompletionLog>, ChoreError> {
    Ok(Json(state.service.reject_completion(id).await?))
}

pub async fn unapprove_log(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<LogId>,
) -> Result<Json<CompletionLog>, ChoreError> {
    Ok(Json(state.service.unapprove_and_return(id).await?))
}

// === Reward approvals ===

pub async fn approve_reward_request(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<RewardRequestId>,
) -> Result<Json<RewardRequest>, ChoreError> {
    Ok(Json(state.service.approve_reward(id).await?))
}

pub async fn reject_reward_request(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<RewardRequestId>,
) -> Result<Json<RewardRequest>, ChoreError> {
    Ok(Json(state.service.reject_reward(id).await?))
}

pub async fn adjust_points(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<ParticipantId>,
    AppJson(req): AppJson<AdjustPointsRequest>,
) -> Result<Json<Participant>, ChoreError> {
    Ok(Json(
        state
            .service
            .adjust_points(id, req.amount, req.kind, req.description)
            .await?,
    ))
}

// === Board management ===

pub async fn unclaim_override(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<TaskId>,
) -> Result<Json<Task>, ChoreError> {
    Ok(Json(state.service.unclaim_task(id, Actor::Supervisor).await?))
}

pub async fn remove_task(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<TaskId>,
) -> Result<Json<Task>, ChoreError> {
    Ok(Json(state.service.remove_task(id).await?))
}

pub async fn block_participant(
    State(state): State<Arc<AppState>>,
    AppPath((task_id, participant_id)): AppPath<(TaskId, ParticipantId)>,
) -> Result<StatusCode, ChoreError> {
    state
        .service
        .block_participant(task_id, participant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unblock_participant(
    State(state): State<Arc<AppState>>,
    AppPath((task_id, participant_id)): AppPath<(TaskId, ParticipantId)>,
) -> Result<StatusCode, ChoreError> {
    state
        .service
        .unblock_participant(task_id, participant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_job_request_handled(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<JobRequestId>,
) -> Result<Json<JobRequest>, ChoreError> {
    Ok(Json(state.service.mark_job_request_handled(id).await?))
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BoardSettings>, ChoreError> {
    Ok(Json(state.service.settings().await?))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    AppJson(settings): AppJson<BoardSettings>,
) -> Result<Json<BoardSettings>, ChoreError> {
    Ok(Json(state.service.update_settings(settings).await?))
}

// === Catalog ===

pub async fn create_participant(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<NewParticipant>,
) -> Result<(StatusCode, Json<Participant>), ChoreError> {
    let participant = state.service.create_participant(req).await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn deactivate_participant(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<ParticipantId>,
) -> Result<Json<Participant>, ChoreError> {
    Ok(Json(state.service.deactivate_participant(id).await?))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<NewTask>,
) -> Result<(StatusCode, Json<Task>), ChoreError> {
    let task = state.service.create_task(req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<TaskId>,
    AppJson(patch): AppJson<TaskPatch>,
) -> Result<Json<Task>, ChoreError> {
    Ok(Json(state.service.update_task(id, patch).await?))
}

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<NewTemplate>,
) -> Result<(StatusCode, Json<Template>), ChoreError> {
    let template = state.service.create_template(req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<TemplateId>,
    AppJson(patch): AppJson<TemplatePatch>,
) -> Result<Json<Template>, ChoreError> {
    Ok(Json(state.service.update_template(id, patch).await?))
}

pub async fn set_template_active(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<TemplateId>,
    AppJson(req): AppJson<SetActiveRequest>,
) -> Result<Json<Template>, ChoreError> {
    Ok(Json(
        state.service.set_template_active(id, req.is_active).await?,
    ))
}

pub async fn create_reward(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<NewReward>,
) -> Result<(StatusCode, Json<Reward>), ChoreError> {
    let reward = state.service.create_reward(req).await?;
    Ok((StatusCode::CREATED, Json(reward)))
}

pub async fn set_reward_active(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<RewardId>,
    AppJson(req): AppJson<SetActiveRequest>,
) -> Result<Json<Reward>, ChoreError> {
    Ok(Json(state.service.set_reward_active(id, req.is_active).await?))
}
