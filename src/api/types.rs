//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::model::{ParticipantId, TaskId, TransactionType};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the server is running in dev mode (supervisor gate open)
    pub dev_mode: bool,

    /// Whether supervisor routes require a session token
    pub auth_required: bool,

    /// Whether data survives a restart
    pub persistent_store: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration unix seconds
    pub exp: i64,
}

/// Body of kiosk actions taken on behalf of one participant.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantRequest {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobRequestBody {
    pub participant_id: ParticipantId,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustPointsRequest {
    pub amount: u64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Tasks created by this run
    pub created: Vec<TaskId>,
}
