//! Competition hub: a single-writer state store for live weightlifting
//! competition data.
//!
//! The hub ingests the upstream producer's frame stream (full database
//! snapshots, per-platform updates, timers, decisions, resource archives),
//! folds it into a denormalized snapshot optimized for scoreboard queries,
//! and pushes change events at subscribers. State is rebuilt from upstream
//! on every connection; nothing but the extracted resource files persists.
//!
//! The transport lives in the `server` crate and hands this crate decoded,
//! version-checked, authenticated frames. The wire layer itself is the
//! `protocol` crate.

mod assemble;
mod fold;
mod preconditions;
mod queries;
mod session;
mod state;
mod urls;

pub mod bus;
pub mod error;
pub mod format;
pub mod hub;
pub mod models;
pub mod normalize;
pub mod resources;
pub mod scoring;
pub mod translations;

pub use bus::{SubscriberFn, SubscriptionId};
pub use error::{HubError, Result};
pub use hub::{Hub, ResourceRequester};
pub use models::{
    AgeGroup, Athlete, AttemptCell, Category, CompetitionInfo, CompetitionRecord, DatabaseState,
    DisplayMode, EnrichedAthlete, EventKind, FopUpdate, HubEvent, LiftKind, LiftStatus,
    OrderEntry, SessionRow, SessionStatus, SpacerKind, Team,
};
pub use translations::TranslationStore;
