pub mod athlete;
pub mod database;
pub mod event;
pub mod fop;
pub mod session;

pub use athlete::{Athlete, AttemptCell, LiftStatus};
pub use database::{
    AgeGroup, Category, CompetitionInfo, CompetitionRecord, DatabaseState, Team,
};
pub use event::{EventKind, HubEvent};
pub use fop::{
    AthleteTimer, BreakTimer, DecisionEventType, DecisionSlice, DisplayMode, EnrichedAthlete,
    FopUpdate, LiftKind, OrderEntry, SessionRow, SpacerKind, SpacerMarker, TimerEventType,
};
pub use session::SessionStatus;
