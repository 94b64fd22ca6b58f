//! Read-only query surface.
//!
//! Every accessor takes a snapshot under the read guard and clones what it
//! returns; nothing here can observe a half-applied frame. Absent data is
//! `None` or empty, never an error.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::fold;
use crate::models::{
    AgeGroup, Athlete, DatabaseState, EnrichedAthlete, FopUpdate, OrderEntry, SessionRow,
    SessionStatus,
};
use crate::normalize;
use crate::state::HubState;
use crate::Hub;

impl Hub {
    /// Full database snapshot, or `None` before the first ingest.
    pub fn get_database_state(&self) -> Option<DatabaseState> {
        self.state().read().database.clone()
    }

    /// Folded per-platform snapshot.
    pub fn get_fop_update(&self, fop_name: &str) -> Option<FopUpdate> {
        self.state().read().fops.get(fop_name).cloned()
    }

    /// Current session's athletes; with spacers, the start-order rows with
    /// category markers interleaved.
    pub fn get_session_athletes(&self, fop_name: &str, include_spacer: bool) -> Vec<SessionRow> {
        let st = self.state().read();
        let Some(fop) = st.fops.get(fop_name) else {
            return Vec::new();
        };
        if include_spacer {
            fop.start_order_athletes.clone()
        } else {
            fop.session_athletes
                .iter()
                .map(|a| SessionRow::Athlete(Box::new(a.clone())))
                .collect()
        }
    }

    pub fn get_start_order_entries(&self, fop_name: &str, include_spacer: bool) -> Vec<OrderEntry> {
        self.order_entries(fop_name, include_spacer, |fop| &fop.start_order)
    }

    pub fn get_lifting_order_entries(&self, fop_name: &str, include_spacer: bool) -> Vec<OrderEntry> {
        self.order_entries(fop_name, include_spacer, |fop| &fop.lifting_order)
    }

    fn order_entries(
        &self,
        fop_name: &str,
        include_spacer: bool,
        pick: impl Fn(&FopUpdate) -> &Vec<OrderEntry>,
    ) -> Vec<OrderEntry> {
        let st = self.state().read();
        let Some(fop) = st.fops.get(fop_name) else {
            return Vec::new();
        };
        pick(fop)
            .iter()
            .filter(|e| include_spacer || e.athlete_key().is_some())
            .cloned()
            .collect()
    }

    /// The athlete on the platform, enriched with the attempt they are in
    /// for. `None` when no update named one.
    pub fn get_current_athlete(&self, fop_name: &str) -> Option<EnrichedAthlete> {
        let st = self.state().read();
        let fop = st.fops.get(fop_name)?;
        let key = fop.current_athlete_key.clone()?;
        find_athlete(&st, fop, &key).map(enrich)
    }

    pub fn get_next_athlete(&self, fop_name: &str) -> Option<EnrichedAthlete> {
        self.neighbor_athlete(fop_name, 1, |fop| fop.next_athlete_key.clone())
    }

    pub fn get_previous_athlete(&self, fop_name: &str) -> Option<EnrichedAthlete> {
        self.neighbor_athlete(fop_name, -1, |fop| fop.previous_athlete_key.clone())
    }

    fn neighbor_athlete(
        &self,
        fop_name: &str,
        offset: i64,
        explicit: impl Fn(&FopUpdate) -> Option<String>,
    ) -> Option<EnrichedAthlete> {
        let st = self.state().read();
        let fop = st.fops.get(fop_name)?;
        let key = explicit(fop).or_else(|| fold::neighbor_key(fop, offset))?;
        find_athlete(&st, fop, &key).map(enrich)
    }

    /// Translation map for a locale, following the fallback chain down to
    /// `en` and then to empty.
    pub fn get_translations(&self, locale: &str) -> BTreeMap<String, String> {
        self.state().read().translations.get(locale)
    }

    pub fn get_session_status(&self, fop_name: &str) -> SessionStatus {
        self.state()
            .read()
            .sessions
            .get(fop_name)
            .cloned()
            .unwrap_or_else(|| SessionStatus::new(chrono::Utc::now()))
    }

    pub fn is_session_done(&self, fop_name: &str) -> bool {
        self.state()
            .read()
            .sessions
            .get(fop_name)
            .map(|s| s.is_done)
            .unwrap_or(false)
    }

    pub fn get_team_name_by_id(&self, team_id: i64) -> Option<String> {
        self.state().read().ctx.teams.get(&team_id).cloned()
    }

    /// Both the database and at least one translation locale are in.
    pub fn is_ready(&self) -> bool {
        self.state().read().is_ready()
    }

    /// Monotonic per-platform counter; bumps on every data-bearing change,
    /// so it doubles as a cache key for denormalized views.
    pub fn get_fop_state_version(&self, fop_name: &str) -> u64 {
        self.state()
            .read()
            .fops
            .get(fop_name)
            .map(|f| f.version)
            .unwrap_or(0)
    }

    /// Computed category code to owning age group, rebuilt only when the
    /// database checksum changes.
    pub fn get_category_to_age_group_map(&self) -> HashMap<String, AgeGroup> {
        self.state().read().category_age_groups.clone()
    }

    /// Platforms from the database plus any seen only in update traffic.
    pub fn get_available_fops(&self) -> Vec<String> {
        let st = self.state().read();
        let mut fops: Vec<String> = st.confirmed_fops.iter().cloned().collect();
        if let Some(db) = &st.database {
            for fop in &db.fops {
                if !fops.contains(fop) {
                    fops.push(fop.clone());
                }
            }
        }
        fops.sort();
        fops
    }

    pub fn get_local_files_dir(&self) -> PathBuf {
        self.state().read().local_files_dir.clone()
    }

    pub fn set_local_files_dir(&self, dir: impl Into<PathBuf>) {
        self.state().write().local_files_dir = dir.into();
    }

    pub fn get_local_url_prefix(&self) -> String {
        self.state().read().local_url_prefix.clone()
    }

    pub fn set_local_url_prefix(&self, prefix: impl Into<String>) {
        self.state().write().local_url_prefix = prefix.into();
    }
}

fn find_athlete(st: &HubState, fop: &FopUpdate, key: &str) -> Option<Athlete> {
    fop.session_athletes
        .iter()
        .find(|a| a.key == key)
        .cloned()
        .or_else(|| {
            let pos = *st.athlete_pos.get(key)?;
            st.database.as_ref().map(|db| db.athletes[pos].clone())
        })
}

fn enrich(athlete: Athlete) -> EnrichedAthlete {
    let next = normalize::next_attempt(&athlete);
    let (current_lift_type, current_attempt, current_weight) = match next {
        Some((kind, attempt)) => (
            Some(kind),
            Some(attempt),
            normalize::requested_weight_from(&athlete.raw, kind, attempt),
        ),
        None => (None, None, None),
    };
    EnrichedAthlete {
        athlete,
        current_weight,
        current_attempt,
        current_lift_type,
    }
}

// End-to-end scenarios: a real hub driven through ingest calls, checked
// through the public queries and a bus collector.
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::models::{EventKind, LiftStatus};
    use crate::resources::test_support::archive;
    use crate::Hub;

    fn collector(hub: &Hub) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.subscribe(
            None,
            Box::new(move |event| {
                sink.lock().unwrap().push(event.kind.as_wire().to_string());
            }),
        );
        seen
    }

    fn count(seen: &Arc<Mutex<Vec<String>>>, kind: &str) -> usize {
        seen.lock().unwrap().iter().filter(|k| *k == kind).count()
    }

    fn s1_database() -> Value {
        json!({
            "competition": {"fops": ["A"]},
            "athletes": [
                {"key": "1", "firstName": "Jo", "lastName": "Doe", "team": 10, "categoryCode": "SR_M89"}
            ],
            "teams": [{"id": 10, "name": "USA"}],
            "ageGroups": [
                {"code": "SR", "categories": [{"gender": "M", "maximumWeight": 89, "categoryName": "M89 Senior"}]}
            ]
        })
    }

    fn translations_zip(locales: Value) -> Vec<u8> {
        archive(&[("translations.json", locales.to_string().as_bytes())])
    }

    #[test]
    fn test_s1_database_ingest_and_queries() {
        let hub = Hub::new();
        let response = hub.ingest_text("database", s1_database());
        assert_eq!(response.status, 200);

        assert!(hub.get_current_athlete("A").is_none());
        let db = hub.get_database_state().unwrap();
        assert_eq!(db.athletes[0].team_name.as_deref(), Some("USA"));
        assert_eq!(
            hub.get_category_to_age_group_map().get("SR_M89").unwrap().code,
            "SR"
        );
        assert_eq!(hub.get_team_name_by_id(10).as_deref(), Some("USA"));
        assert!(!hub.is_ready());
    }

    #[test]
    fn test_s2_translations_complete_readiness() {
        let hub = Hub::new();
        let seen = collector(&hub);
        hub.ingest_text("database", s1_database());

        let frame = protocol::BinaryFrame {
            version: Some("64.0.0".into()),
            kind: protocol::BinaryKind::TranslationsZip,
            payload: translations_zip(json!({"en": {"Snatch": "Snatch"}})),
        };
        let response = hub.ingest_binary(&frame);
        assert_eq!(response.status, 200);

        assert!(hub.is_ready());
        assert_eq!(hub.get_translations("en").get("Snatch").unwrap(), "Snatch");
        assert_eq!(count(&seen, "HUB_READY"), 1);

        // More translations never re-fire HUB_READY.
        let frame = protocol::BinaryFrame {
            version: None,
            kind: protocol::BinaryKind::TranslationsZip,
            payload: translations_zip(json!({"de": {"Snatch": "Reißen"}})),
        };
        hub.ingest_binary(&frame);
        assert_eq!(count(&seen, "HUB_READY"), 1);
    }

    #[test]
    fn test_s3_update_enriches_current_athlete() {
        let hub = Hub::new();
        hub.ingest_text("database", s1_database());
        hub.ingest_text(
            "update",
            json!({
                "fop": "A",
                "uiEvent": "LiftingOrderUpdated",
                "currentAthleteKey": "1",
                "sessionAthletes": [
                    {"key": "1", "snatch1Declaration": 100, "snatch1ActualLift": -100, "snatch2Declaration": 100}
                ],
                "liftingOrderKeys": ["1"]
            }),
        );

        let current = hub.get_current_athlete("A").unwrap();
        assert_eq!(current.current_attempt, Some(2));
        assert_eq!(current.current_lift_type, Some(crate::models::LiftKind::Snatch));
        assert_eq!(current.current_weight, Some(100.0));
        let cells = &current.athlete.sattempts;
        assert_eq!(cells[0].string_value, "100");
        assert_eq!(cells[0].lift_status, LiftStatus::Bad);
        assert_eq!(cells[1].string_value, "100");
        assert_eq!(cells[1].lift_status, LiftStatus::Request);
        assert_eq!(cells[2].string_value, "-");
        assert_eq!(cells[2].lift_status, LiftStatus::Empty);
    }

    #[test]
    fn test_s4_session_done_and_reopen() {
        let hub = Hub::new();
        let seen = collector(&hub);
        hub.ingest_text("database", s1_database());

        hub.ingest_text(
            "update",
            json!({"fop": "A", "uiEvent": "GroupDone", "breakType": "GROUP_DONE"}),
        );
        assert!(hub.is_session_done("A"));
        assert_eq!(count(&seen, "SESSION_DONE"), 1);

        hub.ingest_text(
            "timer",
            json!({"fop": "A", "athleteTimerEventType": "StartTime"}),
        );
        assert!(!hub.is_session_done("A"));
        assert_eq!(count(&seen, "SESSION_REOPENED"), 1);
    }

    #[test]
    fn test_s5_lone_update_gets_428() {
        let hub = Hub::new();
        let seen = collector(&hub);
        let response = hub.ingest_text(
            "update",
            json!({"fop": "A", "uiEvent": "LiftingOrderUpdated"}),
        );
        assert_eq!(response.status, 428);
        assert_eq!(
            response.missing.unwrap(),
            vec!["database".to_string(), "translations_zip".to_string()]
        );
        assert_eq!(count(&seen, "HUB_READY"), 0);
        // The merge still happened (B2).
        assert!(hub.get_fop_update("A").is_some());
    }

    #[test]
    fn test_s6_resource_request_needs_connection() {
        let hub = Hub::new();
        // Without a registered requester: logged no-op.
        hub.request_resources(&["flags_zip"]);

        let asked = Arc::new(Mutex::new(Vec::new()));
        let sink = asked.clone();
        hub.set_resource_requester(Box::new(move |kinds| {
            sink.lock().unwrap().extend(kinds.to_vec());
        }));
        hub.request_resources(&["flags_zip", "bogus_zip"]);
        assert_eq!(*asked.lock().unwrap(), vec!["flags_zip".to_string()]);

        // The requested resource joins the missing list for data frames.
        hub.ingest_text("database", s1_database());
        let response = hub.ingest_text("update", json!({"fop": "A", "uiEvent": "X"}));
        assert!(response
            .missing
            .unwrap()
            .contains(&"flags_zip".to_string()));
    }

    #[test]
    fn test_p4_versions_and_data_clock() {
        let hub = Hub::new();
        hub.ingest_text("database", s1_database());
        hub.ingest_text("update", json!({"fop": "A", "uiEvent": "A1"}));
        let v1 = hub.get_fop_state_version("A");
        hub.ingest_text("update", json!({"fop": "A", "uiEvent": "A2"}));
        let v2 = hub.get_fop_state_version("A");
        assert!(v2 > v1);

        let data_clock = hub.get_fop_update("A").unwrap().last_data_update;
        hub.ingest_text("timer", json!({"fop": "A", "athleteTimerEventType": "SetTime"}));
        hub.ingest_text(
            "decision",
            json!({"fop": "A", "decisionEventType": "DOWN_SIGNAL", "down": true}),
        );
        let after = hub.get_fop_update("A").unwrap();
        assert_eq!(after.last_data_update, data_clock);
        assert_eq!(hub.get_fop_state_version("A"), v2);
    }

    #[test]
    fn test_p8_duplicate_checksum_is_a_no_op() {
        let hub = Hub::new();
        let seen = collector(&hub);
        let mut payload = s1_database();
        payload["databaseChecksum"] = json!("deadbeef");

        assert_eq!(hub.ingest_text("database", payload.clone()).status, 200);
        let events_after_first = seen.lock().unwrap().len();
        let before = hub.get_database_state().unwrap();

        let response = hub.ingest_text("database", payload);
        assert_eq!(response.status, 200);
        assert_eq!(response.reason.as_deref(), Some("duplicate_checksum"));
        assert_eq!(response.cached, Some(true));
        assert_eq!(seen.lock().unwrap().len(), events_after_first);
        assert_eq!(
            hub.get_database_state().unwrap().last_update,
            before.last_update
        );
    }

    #[test]
    fn test_r1_identical_update_twice_debounced_but_applied() {
        let hub = Hub::new();
        let updates = Arc::new(AtomicUsize::new(0));
        let sink = updates.clone();
        hub.subscribe(
            Some(EventKind::Update),
            Box::new(move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );
        hub.ingest_text("database", s1_database());

        let payload = json!({"fop": "A", "uiEvent": "LiftingOrderUpdated", "currentAthleteKey": "1",
            "sessionAthletes": [{"key": "1"}], "liftingOrderKeys": ["1"]});
        hub.ingest_text("update", payload.clone());
        let v1 = hub.get_fop_state_version("A");
        hub.ingest_text("update", payload);
        let v2 = hub.get_fop_state_version("A");

        assert_eq!(v2, v1 + 1);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_r3_duplicate_translations_checksum_is_a_no_op() {
        let hub = Hub::new();
        let seen = collector(&hub);
        let bytes = translations_zip(
            json!({"locales": {"en": {"Snatch": "Snatch"}}, "translationsChecksum": "t1"}),
        );
        let frame = protocol::BinaryFrame {
            version: None,
            kind: protocol::BinaryKind::TranslationsZip,
            payload: bytes.clone(),
        };
        hub.ingest_binary(&frame);
        let loaded = count(&seen, "TRANSLATIONS_LOADED");

        let response = hub.ingest_binary(&frame);
        assert_eq!(response.reason.as_deref(), Some("duplicate_checksum"));
        assert_eq!(count(&seen, "TRANSLATIONS_LOADED"), loaded);
    }

    #[test]
    fn test_b2_fop_known_only_from_updates() {
        let hub = Hub::new();
        hub.ingest_text("database", s1_database());
        hub.ingest_text("update", json!({"fop": "B", "uiEvent": "SwitchGroup"}));

        assert!(hub.get_available_fops().contains(&"B".to_string()));
        assert!(hub.get_fop_update("B").is_some());
        let status = hub.get_session_status("B");
        assert!(!status.is_done);
    }

    #[test]
    fn test_orders_with_and_without_spacers() {
        let hub = Hub::new();
        hub.ingest_text("database", s1_database());
        hub.ingest_text(
            "update",
            json!({
                "fop": "A",
                "sessionAthletes": [{"key": "1"}, {"key": "2"}],
                "startOrderKeys": ["1", {"isSpacer": true}, "2"],
                "liftingOrderKeys": ["2", {"isSpacer": true}, "1"]
            }),
        );
        assert_eq!(hub.get_start_order_entries("A", true).len(), 3);
        assert_eq!(hub.get_start_order_entries("A", false).len(), 2);
        assert_eq!(hub.get_session_athletes("A", true).len(), 3);
        assert_eq!(hub.get_session_athletes("A", false).len(), 2);
    }

    #[test]
    fn test_neighbors_from_lifting_order() {
        let hub = Hub::new();
        hub.ingest_text("database", s1_database());
        hub.ingest_text(
            "update",
            json!({
                "fop": "A",
                "currentAthleteKey": "2",
                "sessionAthletes": [{"key": "1"}, {"key": "2"}, {"key": "3"}],
                "liftingOrderKeys": ["1", "2", "3"]
            }),
        );
        assert_eq!(hub.get_next_athlete("A").unwrap().athlete.key, "3");
        assert_eq!(hub.get_previous_athlete("A").unwrap().athlete.key, "1");
    }

    #[test]
    fn test_wait_for_database() {
        let hub = Hub::new();
        let err = hub.wait_for_database(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.to_string(), "database not ready after 10ms");

        hub.ingest_text("database", s1_database());
        assert!(hub.wait_for_database(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_disconnect_enters_waiting_state() {
        let hub = Hub::new();
        let seen = collector(&hub);
        hub.on_producer_connected();
        hub.ingest_text("database", s1_database());
        let frame = protocol::BinaryFrame {
            version: None,
            kind: protocol::BinaryKind::TranslationsZip,
            payload: translations_zip(json!({"en": {"A": "A"}})),
        };
        hub.ingest_binary(&frame);
        assert!(hub.is_ready());

        hub.on_producer_disconnected();
        assert!(!hub.is_ready());
        assert!(hub.get_database_state().is_none());
        assert_eq!(count(&seen, "WAITING"), 1);

        // A rebuilt hub fires HUB_READY again (P5: once per rebuild).
        hub.on_producer_connected();
        hub.ingest_text("database", s1_database());
        hub.ingest_binary(&frame);
        assert_eq!(count(&seen, "HUB_READY"), 2);
    }

    #[test]
    fn test_empty_database_announcement_then_zip() {
        let hub = Hub::new();
        let response = hub.ingest_text("database", json!({}));
        assert_eq!(response.status, 202);
        assert_eq!(response.timeout, Some(5000));

        // A second snapshot while the ZIP is pending is turned away.
        let response = hub.ingest_text("database", s1_database());
        assert_eq!(response.reason.as_deref(), Some("already_loading"));

        let zip = archive(&[(
            "competition.json",
            s1_database().to_string().as_bytes(),
        )]);
        let frame = protocol::BinaryFrame {
            version: Some("64.0.0".into()),
            kind: protocol::BinaryKind::DatabaseZip,
            payload: zip,
        };
        assert_eq!(hub.ingest_binary(&frame).status, 200);
        assert_eq!(hub.get_database_state().unwrap().athletes.len(), 1);
    }

    #[test]
    fn test_unknown_frame_types_are_ignored() {
        let hub = Hub::new();
        let response = hub.ingest_text("telemetry", json!({}));
        assert_eq!(response.status, 200);
        assert_eq!(response.reason.as_deref(), Some("unknown_type"));
        assert!(hub.get_database_state().is_none());
    }
}
