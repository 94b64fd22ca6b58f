//! Per-platform session lifecycle.
//!
//! A session goes done when the producer announces `GroupDone` and comes
//! back as soon as anything at all happens on the platform. Both
//! transitions fire an event on the edge only, so subscribers can flip
//! "results final" banners without chatter.

use chrono::{DateTime, Utc};

use crate::models::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEdge {
    Done,
    Reopened,
}

/// Applies an update frame to the session state. An update is a done
/// marker when either the UI event or the break type says so; every other
/// update, including one with no `uiEvent` at all, counts as activity.
pub(crate) fn observe_update(
    status: &mut SessionStatus,
    ui_event: Option<&str>,
    break_type: Option<&str>,
    session_name: Option<&str>,
    now: DateTime<Utc>,
) -> Option<SessionEdge> {
    if let Some(name) = session_name {
        status.session_name = name.to_string();
    }
    status.last_activity = now;

    let group_done = ui_event == Some("GroupDone") || break_type == Some("GROUP_DONE");
    if group_done {
        if !status.is_done {
            status.is_done = true;
            return Some(SessionEdge::Done);
        }
        None
    } else if status.is_done {
        status.is_done = false;
        Some(SessionEdge::Reopened)
    } else {
        None
    }
}

/// Timer and decision frames are unconditional activity.
pub(crate) fn observe_activity(
    status: &mut SessionStatus,
    now: DateTime<Utc>,
) -> Option<SessionEdge> {
    status.last_activity = now;
    if status.is_done {
        status.is_done = false;
        Some(SessionEdge::Reopened)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SessionStatus {
        SessionStatus::new(Utc::now())
    }

    #[test]
    fn test_group_done_edge_fires_once() {
        let mut s = fresh();
        let now = Utc::now();
        assert_eq!(
            observe_update(&mut s, Some("GroupDone"), None, Some("M1"), now),
            Some(SessionEdge::Done)
        );
        assert!(s.is_done);
        assert_eq!(s.session_name, "M1");
        // Repeating the marker is not a new edge.
        assert_eq!(
            observe_update(&mut s, Some("GroupDone"), None, None, now),
            None
        );
    }

    #[test]
    fn test_break_type_marks_done_too() {
        let mut s = fresh();
        assert_eq!(
            observe_update(&mut s, None, Some("GROUP_DONE"), None, Utc::now()),
            Some(SessionEdge::Done)
        );
    }

    #[test]
    fn test_timer_activity_reopens() {
        let mut s = fresh();
        observe_update(&mut s, Some("GroupDone"), None, None, Utc::now());
        assert_eq!(
            observe_activity(&mut s, Utc::now()),
            Some(SessionEdge::Reopened)
        );
        assert!(!s.is_done);
        assert_eq!(observe_activity(&mut s, Utc::now()), None);
    }

    #[test]
    fn test_update_without_ui_event_reopens() {
        let mut s = fresh();
        observe_update(&mut s, Some("GroupDone"), None, None, Utc::now());
        assert_eq!(
            observe_update(&mut s, None, None, None, Utc::now()),
            Some(SessionEdge::Reopened)
        );
    }

    #[test]
    fn test_edges_alternate() {
        // Done must be followed by at most one Reopened before another Done.
        let mut s = fresh();
        let now = Utc::now();
        let mut edges = Vec::new();
        for ui in [
            "GroupDone",
            "GroupDone",
            "LiftingOrderUpdated",
            "LiftingOrderUpdated",
            "GroupDone",
        ] {
            if let Some(edge) = observe_update(&mut s, Some(ui), None, None, now) {
                edges.push(edge);
            }
        }
        assert_eq!(
            edges,
            vec![SessionEdge::Done, SessionEdge::Reopened, SessionEdge::Done]
        );
    }
}
