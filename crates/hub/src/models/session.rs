use chrono::{DateTime, Utc};
use serde::Serialize;

/// Done/active state of the session currently assigned to a platform.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    #[serde(rename = "isDone")]
    pub is_done: bool,
    #[serde(rename = "sessionName")]
    pub session_name: String,
    #[serde(rename = "lastActivity")]
    pub last_activity: DateTime<Utc>,
}

impl SessionStatus {
    pub fn new(now: DateTime<Utc>) -> Self {
        SessionStatus {
            is_done: false,
            session_name: String::new(),
            last_activity: now,
        }
    }
}
