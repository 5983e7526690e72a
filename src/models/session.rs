use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reward emitted once when a session finishes its last step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub session_id: Uuid,
    pub practice_id: String,
    pub title: String,
    pub xp: u32,
    pub completed_at: DateTime<Utc>,
}
