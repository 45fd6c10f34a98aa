//! Kiosk endpoints: what participants can do from the shared board.

use std::sync::Arc;

use axum::{
    extract::State,
    Json,
};

use crate::error::ChoreError;
use crate::lifecycle::Actor;
use crate::model::{JobRequest, RewardId, RewardRequest, Task, TaskId};
use crate::service::{Board, CompletionOutcome};

use super::extract::{AppJson, AppPath};
use super::routes::AppState;
use super::types::{JobRequestBody, ParticipantRequest};

pub async fn get_board(State(state): State<Arc<AppState>>) -> Result<Json<Board>, ChoreError> {
    Ok(Json(state.service.board().await?))
}

pub async fn claim_task(
    State(state): State<Arc<AppState>>,
    AppPath(task_id): AppPath<TaskId>,
    AppJson(req): AppJson<ParticipantRequest>,
) -> Result<Json<Task>, ChoreError> {
    Ok(Json(
        state.service.claim_task(task_id, req.participant_id).await?,
    ))
}

pub async fn unclaim_task(
    State(state): State<Arc<AppState>>,
    AppPath(task_id): AppPath<TaskId>,
    AppJson(req): AppJson<ParticipantRequest>,
) -> Result<Json<Task>, ChoreError> {
    let actor = Actor::Participant {
        id: req.participant_id,
    };
    Ok(Json(state.service.unclaim_task(task_id, actor).await?))
}

pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    AppPath(task_id): AppPath<TaskId>,
    AppJson(req): AppJson<ParticipantRequest>,
) -> Result<Json<CompletionOutcome>, ChoreError> {
    Ok(Json(
        state
            .service
            .complete_task(task_id, req.participant_id)
            .await?,
    ))
}

pub async fn request_reward(
    State(state): State<Arc<AppState>>,
    AppPath(reward_id): AppPath<RewardId>,
    AppJson(req): AppJson<ParticipantRequest>,
) -> Result<Json<RewardRequest>, ChoreError> {
    Ok(Json(
        state
            .service
            .request_reward(req.participant_id, reward_id)
            .await?,
    ))
}

pub async fn request_new_job(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<JobRequestBody>,
) -> Result<Json<JobRequest>, ChoreError> {
    Ok(Json(
        state
            .service
            .request_new_job(req.participant_id, req.message)
            .await?,
    ))
}
