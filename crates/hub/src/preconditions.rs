//! Precondition negotiation.
//!
//! After every data frame is folded, the hub checks what it is still
//! missing and answers 428 so the producer resends it. The database request
//! is rate limited: once asked for, further data frames get a 202 for a
//! second instead of another 428, which keeps a chatty producer from
//! turning one gap into a storm.

use std::time::{Duration, Instant};

use protocol::Response;

use crate::state::HubState;

pub(crate) const DATABASE_REQUEST_WINDOW: Duration = Duration::from_millis(1000);

/// Frame types the producer must resend, in the order they should arrive.
pub(crate) fn missing_preconditions(state: &HubState) -> Vec<String> {
    let mut missing = Vec::new();
    if state
        .database
        .as_ref()
        .map_or(true, |db| db.athletes.is_empty())
    {
        missing.push("database".to_string());
    }
    if state.translations.is_empty() {
        missing.push("translations_zip".to_string());
    }
    for kind in &state.plugin_preconditions {
        if !state.ready.flag(kind) && !missing.contains(kind) {
            missing.push(kind.clone());
        }
    }
    missing
}

/// Response for a data frame whose merge already succeeded.
pub(crate) fn data_frame_response(state: &mut HubState, kind: &str, now: Instant) -> Response {
    let missing = missing_preconditions(state);
    if missing.is_empty() {
        return Response::processed(kind);
    }

    if missing.iter().any(|m| m == "database") {
        if let Some(asked) = state.last_database_request {
            if now.duration_since(asked) < DATABASE_REQUEST_WINDOW {
                return Response::waiting_for_database();
            }
        }
        state.last_database_request = Some(now);
    }

    Response::precondition_required(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HubState;

    #[test]
    fn test_missing_everything_at_start() {
        let state = HubState::new();
        assert_eq!(
            missing_preconditions(&state),
            vec!["database".to_string(), "translations_zip".to_string()]
        );
    }

    #[test]
    fn test_plugin_preconditions_append_until_ready() {
        let mut state = HubState::new();
        state.plugin_preconditions.insert("flags_zip".to_string());
        assert!(missing_preconditions(&state).contains(&"flags_zip".to_string()));
        state.ready.flags = true;
        assert!(!missing_preconditions(&state).contains(&"flags_zip".to_string()));
    }

    #[test]
    fn test_database_request_is_debounced() {
        let mut state = HubState::new();
        let t0 = Instant::now();

        let first = data_frame_response(&mut state, "update", t0);
        assert_eq!(first.status, 428);

        let soon = data_frame_response(&mut state, "update", t0 + Duration::from_millis(300));
        assert_eq!(soon.status, 202);
        assert_eq!(soon.reason.as_deref(), Some("waiting_for_database"));

        let later = data_frame_response(&mut state, "update", t0 + Duration::from_millis(1500));
        assert_eq!(later.status, 428);
    }
}
