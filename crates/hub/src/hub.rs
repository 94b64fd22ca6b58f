//! The hub handle.
//!
//! One `Hub` exists per embedding process. It owns the state record behind
//! a read/write guard, the event bus, and the hooks the transport layer
//! registers. All mutation happens on the frame dispatch path: the caller
//! hands in decoded frames, the hub folds them under the write guard,
//! collects the resulting events, releases the guard, and only then
//! notifies subscribers. That release-then-publish order is what lets a
//! subscriber call back into the query API without deadlocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::{json, Value};

use protocol::{BinaryFrame, BinaryKind, Response};

use crate::assemble;
use crate::bus::{EventBus, SubscriberFn, SubscriptionId};
use crate::error::{HubError, Result};
use crate::fold;
use crate::models::{EventKind, HubEvent};
use crate::preconditions;
use crate::resources;
use crate::session::{self, SessionEdge};
use crate::state::HubState;

/// Window advertised with a 202 after an empty database announcement. The
/// producer is expected to follow up with a `database_zip` inside it; no
/// timer enforces it, missing preconditions re-request on the next frame.
const DATABASE_ZIP_TIMEOUT_MS: u64 = 5000;

/// Callback the transport layer registers so the hub can ask the producer
/// for resources without holding a connection object.
pub type ResourceRequester = Box<dyn Fn(&[String]) + Send + Sync + 'static>;

struct DbWait {
    ready: bool,
    /// Bumped when a disconnect aborts in-flight waits.
    epoch: u64,
}

struct Shared {
    state: RwLock<HubState>,
    bus: EventBus,
    db_wait: Mutex<DbWait>,
    db_cond: Condvar,
    resource_requester: Mutex<Option<ResourceRequester>>,
    first_connection_seen: AtomicBool,
}

#[derive(Clone)]
pub struct Hub {
    shared: Arc<Shared>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Hub {
            shared: Arc::new(Shared {
                state: RwLock::new(HubState::new()),
                bus: EventBus::new(),
                db_wait: Mutex::new(DbWait {
                    ready: false,
                    epoch: 0,
                }),
                db_cond: Condvar::new(),
                resource_requester: Mutex::new(None),
                first_connection_seen: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn state(&self) -> &RwLock<HubState> {
        &self.shared.state
    }

    // ---- ingest -----------------------------------------------------------

    /// Dispatches a decoded, version-checked, authenticated text frame.
    pub fn ingest_text(&self, kind: &str, payload: Value) -> Response {
        match kind {
            "database" => self.ingest_database(&payload, false),
            "update" => self.ingest_update(payload),
            "timer" => self.ingest_timer(payload),
            "decision" => self.ingest_decision(payload),
            other => {
                tracing::warn!(kind = other, "unknown text frame type, ignoring");
                Response::ignored(other)
            }
        }
    }

    pub fn ingest_binary(&self, frame: &BinaryFrame) -> Response {
        match &frame.kind {
            BinaryKind::DatabaseZip => match resources::read_database_archive(&frame.payload) {
                Ok(snapshot) => self.ingest_database(&snapshot, true),
                Err(e) => {
                    tracing::warn!("database archive rejected: {e}");
                    Response::server_error(format!("database archive rejected: {e}"), "bad_archive")
                }
            },
            BinaryKind::TranslationsZip => self.ingest_translations(&frame.payload),
            BinaryKind::FlagsZip => {
                self.ingest_image_archive("flags", "flags_zip", EventKind::FlagsLoaded, &frame.payload)
            }
            BinaryKind::LogosZip => {
                self.ingest_image_archive("logos", "logos_zip", EventKind::LogosLoaded, &frame.payload)
            }
            BinaryKind::PicturesZip => self.ingest_image_archive(
                "pictures",
                "pictures_zip",
                EventKind::PicturesLoaded,
                &frame.payload,
            ),
            BinaryKind::Unknown(name) => {
                tracing::warn!(kind = %name, "unknown binary frame type, ignoring");
                Response::ignored(name)
            }
        }
    }

    fn ingest_database(&self, payload: &Value, via_zip: bool) -> Response {
        let now = Utc::now();
        let mut events = Vec::new();

        let response = {
            let mut st = self.shared.state.write();

            if via_zip {
                // The archive this flag was waiting for.
                st.database_loading = false;
            } else if assemble::is_empty_announcement(payload) {
                st.database_loading = true;
                return Response::pending_database(DATABASE_ZIP_TIMEOUT_MS);
            } else if st.database_loading {
                return Response::already_loading();
            }

            let incoming_checksum = assemble::checksum_of(payload);
            let cached_checksum = st
                .database
                .as_ref()
                .and_then(|db| db.database_checksum.as_deref());
            if incoming_checksum.is_some() && incoming_checksum == cached_checksum {
                return Response::duplicate_checksum();
            }

            let assembly = assemble::assemble(payload, now);
            let athlete_count = assembly.database.athletes.len();

            st.database = Some(assembly.database);
            st.ctx = assembly.ctx;
            st.category_age_groups = assembly.category_age_groups;
            st.reindex_athletes();

            let fops = st.database.as_ref().map(|db| db.fops.clone()).unwrap_or_default();
            for fop in fops {
                st.confirmed_fops.insert(fop);
            }

            // A database change invalidates every platform view.
            let ctx = st.ctx.clone();
            for fop in st.fops.values_mut() {
                fold::derive_views(fop, &ctx);
                fop.version += 1;
                fop.last_data_update = now;
            }

            st.ready.database = athlete_count > 0;
            st.last_database_request = None;

            events.push(
                HubEvent::new(EventKind::Database)
                    .with_payload(json!({"athleteCount": athlete_count})),
            );
            if st.ready.database {
                events.push(HubEvent::new(EventKind::DatabaseReady));
            }
            push_hub_ready_if_due(&mut st, &mut events);

            Response::processed(if via_zip { "database_zip" } else { "database" })
        };

        let became_ready = events.iter().any(|e| e.kind == EventKind::DatabaseReady);
        self.shared.bus.publish(events);
        if became_ready {
            self.mark_database_ready();
        }
        response
    }

    fn ingest_update(&self, payload: Value) -> Response {
        let Some(obj) = payload.as_object().cloned() else {
            return Response::server_error("update payload must be an object", "bad_payload");
        };
        let now = Utc::now();
        let fop_name = fold::resolve_fop_name(&obj);
        let summary = fold::summarize(&obj);

        let mut events = Vec::new();
        let response = {
            let mut st = self.shared.state.write();

            let mut fop = st.take_fop(&fop_name, now);
            let ctx = st.ctx.clone();
            fold::merge_update(&mut fop, obj, &ctx, now);
            for athlete in &fop.session_athletes {
                st.merge_athlete(athlete);
            }
            st.put_fop(fop);

            let edge = session::observe_update(
                st.session_mut(&fop_name, now),
                summary.ui_event.as_deref(),
                summary.break_type.as_deref(),
                summary.session_name.as_deref(),
                now,
            );

            events.push(
                HubEvent::for_fop(EventKind::Update, fop_name.as_str())
                    .with_ui_event(summary.ui_event.clone())
                    .with_payload(payload),
            );
            push_session_edge(&mut st, &fop_name, edge, &mut events);

            preconditions::data_frame_response(&mut st, "update", Instant::now())
        };

        self.shared.bus.publish(events);
        response
    }

    fn ingest_timer(&self, payload: Value) -> Response {
        self.ingest_clock_frame(payload, EventKind::Timer, "timer")
    }

    fn ingest_decision(&self, payload: Value) -> Response {
        self.ingest_clock_frame(payload, EventKind::Decision, "decision")
    }

    /// Shared path for the two non-data frame kinds: fold the slice, count
    /// it as session activity, leave the data clock and version alone.
    fn ingest_clock_frame(&self, payload: Value, kind: EventKind, wire: &str) -> Response {
        let Some(obj) = payload.as_object().cloned() else {
            return Response::server_error(format!("{wire} payload must be an object"), "bad_payload");
        };
        let now = Utc::now();
        let fop_name = fold::resolve_fop_name(&obj);

        let mut events = Vec::new();
        let response = {
            let mut st = self.shared.state.write();

            let mut fop = st.take_fop(&fop_name, now);
            match kind {
                EventKind::Timer => fold::merge_timer(&mut fop, &obj, now),
                _ => fold::merge_decision(&mut fop, &obj, now),
            }
            st.put_fop(fop);

            let edge = session::observe_activity(st.session_mut(&fop_name, now), now);

            events.push(HubEvent::for_fop(kind, fop_name.as_str()).with_payload(payload));
            push_session_edge(&mut st, &fop_name, edge, &mut events);

            preconditions::data_frame_response(&mut st, wire, Instant::now())
        };

        self.shared.bus.publish(events);
        response
    }

    fn ingest_translations(&self, bytes: &[u8]) -> Response {
        let payload = match resources::read_translations_archive(bytes) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("translations archive rejected: {e}");
                return Response::server_error(
                    format!("translations archive rejected: {e}"),
                    "bad_archive",
                );
            }
        };

        let mut events = Vec::new();
        let response = {
            let mut st = self.shared.state.write();

            if let Some(checksum) = &payload.checksum {
                if st.translations.is_duplicate(checksum) {
                    return Response::duplicate_checksum();
                }
            }

            for (locale, map) in &payload.locales {
                st.translations.insert_locale(locale, map);
            }
            st.translations.set_checksum(payload.checksum.clone());
            st.ready.translations = !st.translations.is_empty();

            events.push(
                HubEvent::new(EventKind::TranslationsLoaded)
                    .with_payload(json!({"locales": st.translations.locales()})),
            );
            push_hub_ready_if_due(&mut st, &mut events);

            Response::processed("translations_zip")
        };

        self.shared.bus.publish(events);
        response
    }

    fn ingest_image_archive(
        &self,
        subdir: &str,
        wire: &str,
        loaded: EventKind,
        bytes: &[u8],
    ) -> Response {
        let dir = self.shared.state.read().local_files_dir.clone();

        // Disk writes run without the state guard; the readiness flag only
        // flips once everything is durable.
        let written = match resources::extract_archive(&dir, subdir, bytes) {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(kind = wire, "archive rejected: {e}");
                return Response::server_error(format!("{wire} rejected: {e}"), "bad_archive");
            }
        };
        tracing::info!(kind = wire, files = written, "resources extracted");

        {
            let mut st = self.shared.state.write();
            st.ready.set(wire);
        }
        self.shared
            .bus
            .publish(vec![HubEvent::new(loaded).with_payload(json!({"files": written}))]);
        Response::processed(wire)
    }

    // ---- subscriptions ----------------------------------------------------

    pub fn subscribe(&self, kind: Option<EventKind>, callback: SubscriberFn) -> SubscriptionId {
        self.shared.bus.subscribe(kind, callback)
    }

    pub fn subscribe_once(&self, kind: Option<EventKind>, callback: SubscriberFn) -> SubscriptionId {
        self.shared.bus.subscribe_once(kind, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.bus.unsubscribe(id)
    }

    // ---- connection lifecycle hooks ---------------------------------------

    /// Called by the transport when a producer connection is established.
    /// The very first connection of this hub's lifetime wipes all state so
    /// the producer is guaranteed to resend everything; reconnects rely on
    /// the 428 path instead.
    pub fn on_producer_connected(&self) {
        if !self.shared.first_connection_seen.swap(true, Ordering::SeqCst) {
            tracing::info!("first producer connection, resetting hub state");
            self.shared.state.write().reset_all();
            self.shared.bus.reset_debounce();
            let mut wait = self.shared.db_wait.lock();
            wait.ready = false;
        } else {
            tracing::info!("producer reconnected");
        }
    }

    /// Called by the transport when the producer connection goes away. The
    /// hub enters the waiting state and aborts in-flight database waits.
    pub fn on_producer_disconnected(&self) {
        tracing::info!("producer disconnected, hub waiting for data");
        self.shared.state.write().clear_to_waiting();
        {
            let mut wait = self.shared.db_wait.lock();
            wait.ready = false;
            wait.epoch += 1;
            self.shared.db_cond.notify_all();
        }
        self.shared.bus.publish(vec![HubEvent::new(EventKind::Waiting)]);
    }

    pub fn set_resource_requester(&self, requester: ResourceRequester) {
        *self.shared.resource_requester.lock() = Some(requester);
    }

    pub fn clear_resource_requester(&self) {
        *self.shared.resource_requester.lock() = None;
    }

    /// Subscriber-initiated resource request. Without a producer connection
    /// this is a logged no-op; with one, the registered callback sends a
    /// `plugin_preconditions` 428 on the producer socket and the kinds stay
    /// on the missing list until their archives arrive.
    pub fn request_resources(&self, kinds: &[&str]) {
        let normalized: Vec<String> = kinds
            .iter()
            .map(|k| BinaryKind::from_wire(k))
            .filter(|k| {
                matches!(
                    k,
                    BinaryKind::FlagsZip | BinaryKind::LogosZip | BinaryKind::PicturesZip
                )
            })
            .map(|k| k.as_wire().to_string())
            .collect();
        if normalized.is_empty() {
            return;
        }

        {
            let mut st = self.shared.state.write();
            for kind in &normalized {
                st.plugin_preconditions.insert(kind.clone());
            }
        }

        let requester = self.shared.resource_requester.lock();
        match requester.as_ref() {
            None => tracing::info!(?normalized, "no producer connection, resource request dropped"),
            Some(request) => request(&normalized),
        }
    }

    // ---- waiting ----------------------------------------------------------

    /// Blocks until `DATABASE_READY` fires or the timeout elapses. A
    /// producer disconnect aborts the wait immediately.
    pub fn wait_for_database(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let timeout_ms = timeout.as_millis() as u64;
        let mut wait = self.shared.db_wait.lock();
        let epoch = wait.epoch;
        loop {
            if wait.ready {
                return Ok(());
            }
            if wait.epoch != epoch {
                return Err(HubError::DatabaseNotReady(timeout_ms));
            }
            if self
                .shared
                .db_cond
                .wait_until(&mut wait, deadline)
                .timed_out()
            {
                return Err(HubError::DatabaseNotReady(timeout_ms));
            }
        }
    }

    fn mark_database_ready(&self) {
        let mut wait = self.shared.db_wait.lock();
        wait.ready = true;
        self.shared.db_cond.notify_all();
    }
}

fn push_hub_ready_if_due(st: &mut HubState, events: &mut Vec<HubEvent>) {
    if st.is_ready() && !st.hub_ready_emitted {
        st.hub_ready_emitted = true;
        events.push(HubEvent::new(EventKind::HubReady));
    }
}

fn push_session_edge(
    st: &mut HubState,
    fop_name: &str,
    edge: Option<SessionEdge>,
    events: &mut Vec<HubEvent>,
) {
    let Some(edge) = edge else {
        return;
    };
    let session_name = st
        .sessions
        .get(fop_name)
        .map(|s| s.session_name.clone())
        .unwrap_or_default();
    let kind = match edge {
        SessionEdge::Done => EventKind::SessionDone,
        SessionEdge::Reopened => EventKind::SessionReopened,
    };
    events.push(
        HubEvent::for_fop(kind, fop_name).with_payload(json!({"sessionName": session_name})),
    );
}
