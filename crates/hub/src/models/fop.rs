use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::athlete::Athlete;

/// Timer transition names shared by the athlete clock and the break clock.
/// `Pause` only ever occurs on the break clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerEventType {
    StartTime,
    StopTime,
    SetTime,
    Pause,
}

impl TimerEventType {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "StartTime" => Some(Self::StartTime),
            "StopTime" => Some(Self::StopTime),
            "SetTime" => Some(Self::SetTime),
            "Pause" => Some(Self::Pause),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionEventType {
    FullDecision,
    Reset,
    DownSignal,
}

impl DecisionEventType {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "FULL_DECISION" => Some(Self::FullDecision),
            "RESET" => Some(Self::Reset),
            "DOWN_SIGNAL" => Some(Self::DownSignal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiftKind {
    Snatch,
    CleanJerk,
}

/// Athlete clock slice of a platform snapshot. Serialized flat onto the
/// snapshot under the producer's field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AthleteTimer {
    #[serde(rename = "athleteTimerEventType", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<TimerEventType>,
    #[serde(rename = "athleteMillisRemaining", skip_serializing_if = "Option::is_none")]
    pub millis_remaining: Option<i64>,
    #[serde(rename = "athleteStartTimeMillis", skip_serializing_if = "Option::is_none")]
    pub start_time_millis: Option<i64>,
    #[serde(rename = "timeAllowed", skip_serializing_if = "Option::is_none")]
    pub time_allowed: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakTimer {
    #[serde(rename = "breakTimerEventType", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<TimerEventType>,
    #[serde(rename = "breakMillisRemaining", skip_serializing_if = "Option::is_none")]
    pub millis_remaining: Option<i64>,
    #[serde(rename = "breakStartTimeMillis", skip_serializing_if = "Option::is_none")]
    pub start_time_millis: Option<i64>,
}

impl BreakTimer {
    pub fn is_running(&self) -> bool {
        self.event_type == Some(TimerEventType::StartTime)
    }

    pub fn is_paused(&self) -> bool {
        self.event_type == Some(TimerEventType::Pause)
    }
}

/// Referee decisions are tristate: `None` until a lamp lights up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionSlice {
    #[serde(rename = "decisionEventType", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<DecisionEventType>,
    #[serde(rename = "decisionsVisible", skip_serializing_if = "Option::is_none")]
    pub decisions_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d2: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d3: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down: Option<bool>,
}

impl DecisionSlice {
    /// Anything worth putting on screen, a lone down signal included.
    pub fn is_visible(&self) -> bool {
        self.decisions_visible == Some(true)
            || self.down == Some(true)
            || self.event_type == Some(DecisionEventType::DownSignal)
    }
}

/// Sentinel rows interleaved into ordered athlete lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpacerKind {
    /// Between categories in the start order.
    Category,
    /// Between snatch and clean-and-jerk in the lifting order.
    LiftType,
}

/// One entry of a start or lifting order: an athlete key or a spacer.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEntry {
    Athlete(String),
    Spacer(SpacerKind),
}

impl OrderEntry {
    pub fn athlete_key(&self) -> Option<&str> {
        match self {
            Self::Athlete(key) => Some(key),
            Self::Spacer(_) => None,
        }
    }
}

impl Serialize for OrderEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Athlete(key) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("athleteKey", key)?;
                map.end()
            }
            Self::Spacer(kind) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("isSpacer", &true)?;
                map.serialize_entry("spacerType", kind)?;
                map.end()
            }
        }
    }
}

/// A spacer row in a resolved athlete list.
#[derive(Debug, Clone, Serialize)]
pub struct SpacerMarker {
    #[serde(rename = "isSpacer")]
    pub is_spacer: bool,
    #[serde(rename = "spacerType")]
    pub spacer_type: SpacerKind,
}

/// A resolved row of an ordered list: a full athlete or a spacer marker.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SessionRow {
    Athlete(Box<Athlete>),
    Spacer(SpacerMarker),
}

impl SessionRow {
    pub fn spacer(kind: SpacerKind) -> Self {
        Self::Spacer(SpacerMarker {
            is_spacer: true,
            spacer_type: kind,
        })
    }

    pub fn as_athlete(&self) -> Option<&Athlete> {
        match self {
            Self::Athlete(a) => Some(a),
            Self::Spacer(_) => None,
        }
    }
}

/// What a display should be showing right now, reduced from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Decision,
    Break,
    Athlete,
    None,
}

/// An athlete enriched with the attempt they are about to take. Returned by
/// the current/next/previous queries.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedAthlete {
    #[serde(flatten)]
    pub athlete: Athlete,
    #[serde(rename = "currentWeight", skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,
    #[serde(rename = "currentAttempt", skip_serializing_if = "Option::is_none")]
    pub current_attempt: Option<u8>,
    #[serde(rename = "currentLiftType", skip_serializing_if = "Option::is_none")]
    pub current_lift_type: Option<LiftKind>,
}

/// Per-platform snapshot, folded from successive update/timer/decision
/// frames. `fields` carries every merged payload field the hub does not
/// track in a typed slot, serialized flattened so consumers see the union.
#[derive(Debug, Clone, Serialize)]
pub struct FopUpdate {
    #[serde(rename = "fopName")]
    pub fop_name: String,
    #[serde(rename = "currentAthleteKey", skip_serializing_if = "Option::is_none")]
    pub current_athlete_key: Option<String>,
    #[serde(rename = "nextAthleteKey", skip_serializing_if = "Option::is_none")]
    pub next_athlete_key: Option<String>,
    #[serde(rename = "previousAthleteKey", skip_serializing_if = "Option::is_none")]
    pub previous_athlete_key: Option<String>,
    #[serde(rename = "sessionAthletes")]
    pub session_athletes: Vec<Athlete>,
    #[serde(rename = "startOrderKeys")]
    pub start_order: Vec<OrderEntry>,
    #[serde(rename = "liftingOrderKeys")]
    pub lifting_order: Vec<OrderEntry>,
    #[serde(rename = "startOrderAthletes")]
    pub start_order_athletes: Vec<SessionRow>,
    #[serde(rename = "liftingOrderAthletes")]
    pub lifting_order_athletes: Vec<SessionRow>,
    #[serde(flatten)]
    pub athlete_timer: AthleteTimer,
    #[serde(flatten)]
    pub break_timer: BreakTimer,
    #[serde(flatten)]
    pub decision: DecisionSlice,
    #[serde(rename = "fopState", skip_serializing_if = "Option::is_none")]
    pub fop_state: Option<String>,
    #[serde(rename = "break")]
    pub in_break: bool,
    #[serde(rename = "breakType", skip_serializing_if = "Option::is_none")]
    pub break_type: Option<String>,
    #[serde(rename = "mode", skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub version: u64,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    #[serde(rename = "lastDataUpdate")]
    pub last_data_update: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FopUpdate {
    pub fn new(fop_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        FopUpdate {
            fop_name: fop_name.into(),
            current_athlete_key: None,
            next_athlete_key: None,
            previous_athlete_key: None,
            session_athletes: Vec::new(),
            start_order: Vec::new(),
            lifting_order: Vec::new(),
            start_order_athletes: Vec::new(),
            lifting_order_athletes: Vec::new(),
            athlete_timer: AthleteTimer::default(),
            break_timer: BreakTimer::default(),
            decision: DecisionSlice::default(),
            fop_state: None,
            in_break: false,
            break_type: None,
            mode: None,
            version: 0,
            last_update: now,
            last_data_update: now,
            fields: Map::new(),
        }
    }

    /// Whether the platform is in some flavor of break.
    pub fn is_in_break(&self) -> bool {
        self.in_break || self.fop_state.as_deref() == Some("BREAK")
    }

    /// Reduces the orthogonal timer, break, and decision slices to the one
    /// thing a display should show. Priority: decision, then break, then
    /// the athlete clock. A running break timer with no decision on screen
    /// forces `Break` even when other flags disagree.
    pub fn display_mode(&self, session_done: bool) -> DisplayMode {
        if self.decision.is_visible() {
            return DisplayMode::Decision;
        }
        if self.break_timer.is_running() {
            return DisplayMode::Break;
        }
        if self.is_in_break()
            && !self.break_timer.is_paused()
            && self.athlete_timer.event_type != Some(TimerEventType::StartTime)
            && !session_done
        {
            return DisplayMode::Break;
        }
        if self.current_athlete_key.is_some() {
            return DisplayMode::Athlete;
        }
        DisplayMode::None
    }

    /// Literal label shown instead of a countdown while the competition is
    /// interrupted. Norwegian displays spell it their own way.
    pub fn break_label(&self, locale: &str) -> Option<&'static str> {
        if self.is_in_break() && self.mode.as_deref() == Some("INTERRUPTION") {
            let lang = locale.split('-').next().unwrap_or(locale);
            Some(if lang.eq_ignore_ascii_case("no") {
                "STOPP"
            } else {
                "STOP"
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FopUpdate {
        FopUpdate::new("A", Utc::now())
    }

    #[test]
    fn test_display_mode_priority_decision_wins() {
        let mut fop = snapshot();
        fop.in_break = true;
        fop.current_athlete_key = Some("1".into());
        fop.decision.decisions_visible = Some(true);
        assert_eq!(fop.display_mode(false), DisplayMode::Decision);
    }

    #[test]
    fn test_down_signal_alone_is_a_decision() {
        let mut fop = snapshot();
        fop.decision.event_type = Some(DecisionEventType::DownSignal);
        assert_eq!(fop.display_mode(false), DisplayMode::Decision);
    }

    #[test]
    fn test_running_break_timer_forces_break() {
        let mut fop = snapshot();
        fop.current_athlete_key = Some("1".into());
        fop.break_timer.event_type = Some(TimerEventType::StartTime);
        assert_eq!(fop.display_mode(false), DisplayMode::Break);
    }

    #[test]
    fn test_paused_break_falls_through_to_athlete() {
        let mut fop = snapshot();
        fop.in_break = true;
        fop.break_timer.event_type = Some(TimerEventType::Pause);
        fop.current_athlete_key = Some("1".into());
        assert_eq!(fop.display_mode(false), DisplayMode::Athlete);
    }

    #[test]
    fn test_starting_athlete_timer_supersedes_break() {
        let mut fop = snapshot();
        fop.in_break = true;
        fop.athlete_timer.event_type = Some(TimerEventType::StartTime);
        fop.current_athlete_key = Some("1".into());
        assert_eq!(fop.display_mode(false), DisplayMode::Athlete);
    }

    #[test]
    fn test_session_done_suppresses_break() {
        let mut fop = snapshot();
        fop.in_break = true;
        assert_eq!(fop.display_mode(true), DisplayMode::None);
    }

    #[test]
    fn test_interruption_label() {
        let mut fop = snapshot();
        fop.in_break = true;
        fop.mode = Some("INTERRUPTION".into());
        assert_eq!(fop.break_label("en"), Some("STOP"));
        assert_eq!(fop.break_label("no-NO"), Some("STOPP"));
        fop.mode = None;
        assert_eq!(fop.break_label("en"), None);
    }

    #[test]
    fn test_order_entry_serialization() {
        let athlete = serde_json::to_value(OrderEntry::Athlete("17".into())).unwrap();
        assert_eq!(athlete, serde_json::json!({"athleteKey": "17"}));
        let spacer = serde_json::to_value(OrderEntry::Spacer(SpacerKind::LiftType)).unwrap();
        assert_eq!(
            spacer,
            serde_json::json!({"isSpacer": true, "spacerType": "liftType"})
        );
    }

    #[test]
    fn test_decision_wire_names() {
        let v = serde_json::to_value(DecisionEventType::FullDecision).unwrap();
        assert_eq!(v, "FULL_DECISION");
        assert_eq!(
            DecisionEventType::from_wire("DOWN_SIGNAL"),
            Some(DecisionEventType::DownSignal)
        );
    }
}
