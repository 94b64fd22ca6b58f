use serde::Serialize;
use serde_json::Value;

/// Everything the hub ever pushes at subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Database,
    Update,
    Timer,
    Decision,
    FlagsLoaded,
    LogosLoaded,
    PicturesLoaded,
    TranslationsLoaded,
    DatabaseReady,
    HubReady,
    SessionDone,
    SessionReopened,
    /// Producer gone; state cleared until the next connection refills it.
    Waiting,
}

impl EventKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Database => "DATABASE",
            Self::Update => "UPDATE",
            Self::Timer => "TIMER",
            Self::Decision => "DECISION",
            Self::FlagsLoaded => "FLAGS_LOADED",
            Self::LogosLoaded => "LOGOS_LOADED",
            Self::PicturesLoaded => "PICTURES_LOADED",
            Self::TranslationsLoaded => "TRANSLATIONS_LOADED",
            Self::DatabaseReady => "DATABASE_READY",
            Self::HubReady => "HUB_READY",
            Self::SessionDone => "SESSION_DONE",
            Self::SessionReopened => "SESSION_REOPENED",
            Self::Waiting => "WAITING",
        }
    }

    /// Lifecycle edges are never debounced or dropped; losing one would
    /// leave subscribers stuck on a stale screen state.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::FlagsLoaded
                | Self::LogosLoaded
                | Self::PicturesLoaded
                | Self::TranslationsLoaded
                | Self::DatabaseReady
                | Self::HubReady
                | Self::SessionDone
                | Self::SessionReopened
                | Self::Waiting
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HubEvent {
    pub kind: EventKind,
    #[serde(rename = "fopName", skip_serializing_if = "Option::is_none")]
    pub fop_name: Option<String>,
    /// Producer UI event name; the debounce key for `UPDATE`.
    #[serde(rename = "uiEvent", skip_serializing_if = "Option::is_none")]
    pub ui_event: Option<String>,
    pub payload: Value,
}

impl HubEvent {
    pub fn new(kind: EventKind) -> Self {
        HubEvent {
            kind,
            fop_name: None,
            ui_event: None,
            payload: Value::Null,
        }
    }

    pub fn for_fop(kind: EventKind, fop_name: impl Into<String>) -> Self {
        HubEvent {
            kind,
            fop_name: Some(fop_name.into()),
            ui_event: None,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_ui_event(mut self, ui_event: Option<String>) -> Self {
        self.ui_event = ui_event;
        self
    }

    /// Key the debouncer tracks for this event. For updates the producer's
    /// `uiEvent` name distinguishes streams that must not suppress each
    /// other (`LiftingOrderUpdated` vs `SwitchGroup`).
    pub fn debounce_key(&self) -> String {
        match (self.kind, &self.ui_event) {
            (EventKind::Update, Some(ui)) => ui.clone(),
            _ => self.kind.as_wire().to_string(),
        }
    }
}
