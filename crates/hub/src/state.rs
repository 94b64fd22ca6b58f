//! The single mutable state record behind the hub handle.
//!
//! Everything in here is touched only under the hub's write guard, on the
//! frame dispatch path. Queries clone what they return, so readers never
//! hold references into this structure.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::models::{AgeGroup, Athlete, DatabaseState, FopUpdate, SessionStatus};
use crate::normalize::NormalizeContext;
use crate::translations::TranslationStore;

/// Which resource classes have been ingested since the last reset.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Readiness {
    pub database: bool,
    pub translations: bool,
    pub flags: bool,
    pub logos: bool,
    pub pictures: bool,
}

impl Readiness {
    /// Lookup by precondition name as it appears in 428 envelopes.
    pub fn flag(&self, name: &str) -> bool {
        match name {
            "database" => self.database,
            "translations_zip" => self.translations,
            "flags_zip" => self.flags,
            "logos_zip" => self.logos,
            "pictures_zip" => self.pictures,
            _ => false,
        }
    }

    pub fn set(&mut self, name: &str) {
        match name {
            "database" => self.database = true,
            "translations_zip" => self.translations = true,
            "flags_zip" => self.flags = true,
            "logos_zip" => self.logos = true,
            "pictures_zip" => self.pictures = true,
            _ => {}
        }
    }
}

pub(crate) struct HubState {
    pub database: Option<DatabaseState>,
    /// Athlete key to position in `database.athletes`.
    pub athlete_pos: HashMap<String, usize>,
    /// Resolution tables derived from the current database.
    pub ctx: NormalizeContext,
    /// Computed category code to owning age group; memoized per checksum.
    pub category_age_groups: HashMap<String, AgeGroup>,
    pub fops: HashMap<String, FopUpdate>,
    pub sessions: HashMap<String, SessionStatus>,
    /// Platforms seen in any frame, whether or not the database lists them.
    pub confirmed_fops: BTreeSet<String>,
    pub translations: TranslationStore,
    pub ready: Readiness,
    pub hub_ready_emitted: bool,
    /// Guard against overlapping snapshot loads (a pending database ZIP).
    pub database_loading: bool,
    pub last_database_request: Option<Instant>,
    /// Resource kinds subscribers asked the producer for.
    pub plugin_preconditions: BTreeSet<String>,
    pub local_files_dir: PathBuf,
    pub local_url_prefix: String,
}

impl HubState {
    pub fn new() -> Self {
        HubState {
            database: None,
            athlete_pos: HashMap::new(),
            ctx: NormalizeContext::default(),
            category_age_groups: HashMap::new(),
            fops: HashMap::new(),
            sessions: HashMap::new(),
            confirmed_fops: BTreeSet::new(),
            translations: TranslationStore::new(),
            ready: Readiness::default(),
            hub_ready_emitted: false,
            database_loading: false,
            last_database_request: None,
            plugin_preconditions: BTreeSet::new(),
            local_files_dir: default_files_dir(),
            local_url_prefix: "/local".to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.database && self.ready.translations
    }

    /// Removes a platform snapshot for in-place folding; pair with
    /// [`put_fop`]. Keeps the borrow checker out of the fold functions.
    pub fn take_fop(&mut self, name: &str, now: DateTime<Utc>) -> FopUpdate {
        self.confirmed_fops.insert(name.to_string());
        self.fops
            .remove(name)
            .unwrap_or_else(|| FopUpdate::new(name, now))
    }

    pub fn put_fop(&mut self, fop: FopUpdate) {
        self.fops.insert(fop.fop_name.clone(), fop);
    }

    pub fn session_mut(&mut self, name: &str, now: DateTime<Utc>) -> &mut SessionStatus {
        self.sessions
            .entry(name.to_string())
            .or_insert_with(|| SessionStatus::new(now))
    }

    /// Create-or-update merge of a session athlete into the database list,
    /// keeping the snapshot current between full refreshes.
    pub fn merge_athlete(&mut self, athlete: &Athlete) {
        let Some(db) = self.database.as_mut() else {
            return;
        };
        match self.athlete_pos.get(&athlete.key).copied() {
            Some(pos) => db.athletes[pos] = athlete.clone(),
            None => {
                self.athlete_pos.insert(athlete.key.clone(), db.athletes.len());
                db.athletes.push(athlete.clone());
            }
        }
    }

    pub fn reindex_athletes(&mut self) {
        self.athlete_pos.clear();
        if let Some(db) = &self.database {
            for (pos, athlete) in db.athletes.iter().enumerate() {
                self.athlete_pos.insert(athlete.key.clone(), pos);
            }
        }
    }

    /// First-connection wipe: the producer is guaranteed a blank slate and
    /// will resend everything through the 428 path.
    pub fn reset_all(&mut self) {
        self.database = None;
        self.athlete_pos.clear();
        self.ctx = NormalizeContext::default();
        self.category_age_groups.clear();
        self.fops.clear();
        self.sessions.clear();
        self.confirmed_fops.clear();
        self.translations.clear();
        self.ready = Readiness::default();
        self.hub_ready_emitted = false;
        self.database_loading = false;
        self.last_database_request = None;
    }

    /// Disconnect wipe: data goes, platform snapshots stay so version
    /// counters keep climbing across reconnects.
    pub fn clear_to_waiting(&mut self) {
        self.database = None;
        self.athlete_pos.clear();
        self.ctx = NormalizeContext::default();
        self.category_age_groups.clear();
        self.translations.clear();
        self.ready = Readiness::default();
        self.hub_ready_emitted = false;
        self.database_loading = false;
        self.last_database_request = None;
    }
}

fn default_files_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("local")
}
