//! Incremental folding of update, timer, and decision frames into the
//! per-platform snapshot.
//!
//! Folding is idempotent for identical payloads and monotonic in the
//! version counter: every data-bearing update bumps it, timers and
//! decisions never do. Timer state survives non-timer updates untouched.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{
    Athlete, DecisionEventType, FopUpdate, OrderEntry, SessionRow, SpacerKind, TimerEventType,
};
use crate::normalize::{self, NormalizeContext};

/// Payload fields that producers occasionally deliver as JSON-encoded
/// strings rather than structures. They are re-parsed at the boundary so
/// nothing downstream ever sees the string form.
const STRING_WRAPPED_FIELDS: &[&str] = &[
    "sessionAthletes",
    "startOrderKeys",
    "liftingOrderKeys",
    "startOrderAthletes",
    "liftingOrderAthletes",
    "leaders",
    "records",
];

/// What the session tracker needs from an update payload.
pub(crate) struct UpdateSummary {
    pub ui_event: Option<String>,
    pub break_type: Option<String>,
    pub session_name: Option<String>,
}

pub(crate) fn resolve_fop_name(payload: &Map<String, Value>) -> String {
    payload
        .get("fop")
        .or_else(|| payload.get("fopName"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("A")
        .to_string()
}

pub(crate) fn unwrap_string_fields(payload: &mut Map<String, Value>) {
    for name in STRING_WRAPPED_FIELDS {
        if let Some(Value::String(s)) = payload.get(*name) {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                payload.insert((*name).to_string(), parsed);
            }
        }
    }
}

pub(crate) fn summarize(payload: &Map<String, Value>) -> UpdateSummary {
    let text = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    UpdateSummary {
        ui_event: text("uiEvent"),
        break_type: text("breakType"),
        session_name: text("sessionName").or_else(|| text("groupName")),
    }
}

/// Folds a data-bearing update into the snapshot and re-derives the
/// denormalized views. The version counter bump happens here.
pub(crate) fn merge_update(
    fop: &mut FopUpdate,
    mut payload: Map<String, Value>,
    ctx: &NormalizeContext,
    now: DateTime<Utc>,
) {
    unwrap_string_fields(&mut payload);

    payload.remove("fop");
    payload.remove("fopName");

    // A payload that stops mentioning the current athlete retires any
    // stale one; the alternative is a ghost lifter on every idle screen.
    fop.current_athlete_key = payload
        .remove("currentAthleteKey")
        .as_ref()
        .and_then(normalize::value_to_key);
    if let Some(v) = payload.remove("nextAthleteKey") {
        fop.next_athlete_key = normalize::value_to_key(&v);
    }
    if let Some(v) = payload.remove("previousAthleteKey") {
        fop.previous_athlete_key = normalize::value_to_key(&v);
    }

    if let Some(v) = payload.remove("sessionAthletes") {
        fop.session_athletes = athlete_rows(&v, ctx);
    }
    if let Some(v) = payload.remove("startOrderKeys") {
        fop.start_order = parse_order_entries(&v, SpacerKind::Category);
    }
    if let Some(v) = payload.remove("liftingOrderKeys") {
        fop.lifting_order = parse_order_entries(&v, SpacerKind::LiftType);
    }

    if let Some(v) = payload.remove("fopState") {
        fop.fop_state = v.as_str().map(str::to_string);
    }
    if let Some(v) = payload.remove("break") {
        fop.in_break = v.as_bool().unwrap_or(false);
    }
    if let Some(v) = payload.remove("breakType") {
        fop.break_type = v.as_str().map(str::to_string);
    }
    if let Some(v) = payload.remove("mode") {
        fop.mode = v.as_str().map(str::to_string);
    }

    // The resolved athlete lists are recomputed below from session
    // athletes; producer-sent copies and clock/counter fields must not
    // shadow the snapshot's own.
    for reserved in [
        "startOrderAthletes",
        "liftingOrderAthletes",
        "version",
        "lastUpdate",
        "lastDataUpdate",
    ] {
        payload.remove(reserved);
    }

    for (k, v) in payload {
        fop.fields.insert(k, v);
    }

    derive_views(fop, ctx);

    fop.version += 1;
    fop.last_update = now;
    fop.last_data_update = now;
}

/// Recomputes the resolved athlete lists and the current/next row
/// classnames. Also run after a database swap refreshes the indexes.
pub(crate) fn derive_views(fop: &mut FopUpdate, ctx: &NormalizeContext) {
    for athlete in &mut fop.session_athletes {
        normalize::reresolve(athlete, ctx);
        let computed = if Some(athlete.key.as_str()) == fop.current_athlete_key.as_deref() {
            Some("current")
        } else if Some(athlete.key.as_str()) == fop.next_athlete_key.as_deref() {
            Some("next")
        } else {
            None
        };
        // Only fill in what the producer left blank, and clear what this
        // hub computed for a previous snapshot.
        match (&athlete.classname, computed) {
            (Some(existing), _) if existing != "current" && existing != "next" => {}
            _ => athlete.classname = computed.map(str::to_string),
        }
    }

    fop.start_order_athletes = resolve_rows(&fop.start_order, &fop.session_athletes);
    fop.lifting_order_athletes = resolve_rows(&fop.lifting_order, &fop.session_athletes);
}

/// Timer frames touch only their clock slice, plus the snapshot clock.
pub(crate) fn merge_timer(fop: &mut FopUpdate, payload: &Map<String, Value>, now: DateTime<Utc>) {
    if let Some(event) = timer_event(payload, "athleteTimerEventType") {
        fop.athlete_timer.event_type = Some(event);
        fop.athlete_timer.millis_remaining = int_field(payload, "athleteMillisRemaining");
        fop.athlete_timer.start_time_millis = int_field(payload, "athleteStartTimeMillis");
        if let Some(allowed) = int_field(payload, "timeAllowed") {
            fop.athlete_timer.time_allowed = Some(allowed);
        }
        if event == TimerEventType::StartTime {
            // A running athlete clock ends any break interpretation.
            fop.in_break = false;
        }
    }

    if let Some(event) = timer_event(payload, "breakTimerEventType") {
        if event == TimerEventType::Pause {
            fop.break_timer.millis_remaining = None;
            fop.break_timer.start_time_millis = None;
            fop.break_timer.event_type = Some(TimerEventType::Pause);
        } else {
            fop.break_timer.event_type = Some(event);
            fop.break_timer.millis_remaining = int_field(payload, "breakMillisRemaining");
            fop.break_timer.start_time_millis = int_field(payload, "breakStartTimeMillis");
        }
    }

    fop.last_update = now;
}

pub(crate) fn merge_decision(fop: &mut FopUpdate, payload: &Map<String, Value>, now: DateTime<Utc>) {
    let event = payload
        .get("decisionEventType")
        .and_then(Value::as_str)
        .and_then(DecisionEventType::from_wire);

    if event == Some(DecisionEventType::Reset) {
        fop.decision = Default::default();
        fop.decision.event_type = Some(DecisionEventType::Reset);
    } else {
        if event.is_some() {
            fop.decision.event_type = event;
        }
        if let Some(v) = payload.get("decisionsVisible") {
            fop.decision.decisions_visible = v.as_bool();
        }
        for (field, slot) in [("d1", 0), ("d2", 1), ("d3", 2)] {
            if let Some(v) = payload.get(field) {
                let value = v.as_bool();
                match slot {
                    0 => fop.decision.d1 = value,
                    1 => fop.decision.d2 = value,
                    _ => fop.decision.d3 = value,
                }
            }
        }
        if let Some(v) = payload.get("down") {
            fop.decision.down = v.as_bool();
        }
    }

    fop.last_update = now;
}

/// Position of the current athlete's neighbor in the despacered lifting
/// order; `offset` is +1 for next, -1 for previous.
pub(crate) fn neighbor_key(fop: &FopUpdate, offset: i64) -> Option<String> {
    let keys: Vec<&str> = fop
        .lifting_order
        .iter()
        .filter_map(OrderEntry::athlete_key)
        .collect();
    let current = fop.current_athlete_key.as_deref()?;
    let index = keys.iter().position(|k| *k == current)? as i64 + offset;
    if index < 0 {
        return None;
    }
    keys.get(index as usize).map(|k| (*k).to_string())
}

fn athlete_rows(v: &Value, ctx: &NormalizeContext) -> Vec<Athlete> {
    let Some(items) = v.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| normalize::normalize_athlete(item, ctx))
        .collect()
}

/// Order entries arrive as bare keys, `{athleteKey}` objects, or
/// `{isSpacer:true}` sentinels. Spacers without an explicit type get the
/// kind this list interleaves.
fn parse_order_entries(v: &Value, default_spacer: SpacerKind) -> Vec<OrderEntry> {
    let Some(items) = v.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(o) => {
                if o.get("isSpacer").and_then(Value::as_bool) == Some(true) {
                    let kind = o
                        .get("spacerType")
                        .and_then(Value::as_str)
                        .and_then(|s| match s {
                            "category" => Some(SpacerKind::Category),
                            "liftType" => Some(SpacerKind::LiftType),
                            _ => None,
                        })
                        .unwrap_or(default_spacer);
                    Some(OrderEntry::Spacer(kind))
                } else {
                    o.get("athleteKey")
                        .or_else(|| o.get("key"))
                        .and_then(normalize::value_to_key)
                        .map(OrderEntry::Athlete)
                }
            }
            other => normalize::value_to_key(other).map(OrderEntry::Athlete),
        })
        .collect()
}

fn resolve_rows(entries: &[OrderEntry], athletes: &[Athlete]) -> Vec<SessionRow> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            OrderEntry::Spacer(kind) => Some(SessionRow::spacer(*kind)),
            OrderEntry::Athlete(key) => athletes
                .iter()
                .find(|a| &a.key == key)
                .map(|a| SessionRow::Athlete(Box::new(a.clone()))),
        })
        .collect()
}

fn timer_event(payload: &Map<String, Value>, field: &str) -> Option<TimerEventType> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .and_then(TimerEventType::from_wire)
}

fn int_field(payload: &Map<String, Value>, field: &str) -> Option<i64> {
    payload.get(field).and_then(Value::as_i64)
}
