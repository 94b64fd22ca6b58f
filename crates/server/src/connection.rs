//! Producer connection lifecycle.
//!
//! The hub holds at most one producer. A newcomer on the endpoint replaces
//! the predecessor, which is closed with a normal code. Text frames are
//! version-gated and authenticated before they reach the hub; binary
//! frames carry no key, so they are only accepted once the connection has
//! passed at least one authenticated text frame.

use std::sync::Mutex;

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use futures_util::StreamExt;
use uuid::Uuid;

use hub::Hub;
use protocol::{BinaryFrame, Envelope, ProtocolError, Response, MINIMUM_PROTOCOL_VERSION};

pub struct AppState {
    pub hub: Hub,
    pub update_key: Option<String>,
    pub producer: ProducerSlot,
}

/// The single-producer slot. Replacing hands back the predecessor so the
/// caller can close it politely.
#[derive(Default)]
pub struct ProducerSlot {
    current: Mutex<Option<(Uuid, Session)>>,
}

impl ProducerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn replace(&self, id: Uuid, session: Session) -> Option<(Uuid, Session)> {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        slot.replace((id, session))
    }

    /// Releases the slot if `id` still owns it; true when it did.
    fn release(&self, id: Uuid) -> bool {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().map(|(owner, _)| *owner) == Some(id) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    let peer = req.peer_addr();
    actix_web::rt::spawn(run_producer(data, session, msg_stream, peer));
    Ok(response)
}

/// What to do with one inbound frame.
#[derive(Debug)]
pub(crate) enum FrameOutcome {
    Reply(Response),
    ReplyAndClose(Response),
    Drop,
}

/// Version gate, authentication, then hub dispatch for a text frame. Pure
/// decision logic; the session loop owns the socket.
pub(crate) fn text_frame_outcome(
    hub: &Hub,
    update_key: Option<&str>,
    authenticated: &mut bool,
    text: &str,
) -> FrameOutcome {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e @ (ProtocolError::MissingVersion | ProtocolError::InvalidVersion)) => {
            return FrameOutcome::Reply(Response::envelope_error(&e.to_string()));
        }
        Err(e) => {
            tracing::warn!("dropping malformed text frame: {e}");
            return FrameOutcome::Drop;
        }
    };

    if !envelope.meets_minimum() {
        tracing::warn!(received = %envelope.version, "frame below minimum protocol version");
        return FrameOutcome::Reply(Response::version_rejected(
            &envelope.version,
            MINIMUM_PROTOCOL_VERSION,
        ));
    }

    let mut payload = envelope.payload;
    if let Some(expected) = update_key {
        let supplied = payload.get("updateKey").and_then(|v| v.as_str());
        if supplied != Some(expected) {
            tracing::warn!(kind = %envelope.kind, "update key mismatch");
            return FrameOutcome::ReplyAndClose(Response::unauthorized());
        }
        // The key has done its job; keep it out of the folded state.
        if let Some(obj) = payload.as_object_mut() {
            obj.remove("updateKey");
        }
    }
    *authenticated = true;

    FrameOutcome::Reply(hub.ingest_text(&envelope.kind, payload))
}

/// Decode, version-gate, and dispatch a binary frame. Unauthenticated
/// connections get their binaries dropped, not rejected: the header has no
/// key to judge.
pub(crate) fn binary_frame_outcome(
    hub: &Hub,
    requires_auth: bool,
    authenticated: bool,
    bytes: &[u8],
) -> FrameOutcome {
    if requires_auth && !authenticated {
        tracing::warn!("dropping binary frame before first authenticated text frame");
        return FrameOutcome::Drop;
    }
    let frame = match BinaryFrame::decode(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("dropping malformed binary frame: {e}");
            return FrameOutcome::Drop;
        }
    };
    if let Some(version) = &frame.version {
        if !protocol::version::meets_minimum(version).unwrap_or(false) {
            tracing::warn!(received = %version, "dropping binary frame below minimum version");
            return FrameOutcome::Drop;
        }
    }
    FrameOutcome::Reply(hub.ingest_binary(&frame))
}

async fn run_producer(
    data: web::Data<AppState>,
    mut session: Session,
    mut stream: MessageStream,
    peer: Option<std::net::SocketAddr>,
) {
    let id = Uuid::new_v4();
    tracing::info!(?peer, %id, "producer connected");

    if let Some((old_id, old_session)) = data.producer.replace(id, session.clone()) {
        tracing::info!(%old_id, "replacing previous producer");
        let _ = old_session
            .close(Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("replaced by a new producer".into()),
            }))
            .await;
    }

    data.hub.on_producer_connected();

    // One-way dependency injection: the hub gets a callback, never a
    // connection object. Requests queue on a channel the loop drains.
    let (request_tx, mut request_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    data.hub.set_resource_requester(Box::new(move |kinds| {
        let envelope = Response::plugin_preconditions(kinds.to_vec()).to_json();
        let _ = request_tx.send(envelope);
    }));

    let mut authenticated = false;
    let requires_auth = data.update_key.is_some();

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => {
                        let outcome = text_frame_outcome(
                            &data.hub,
                            data.update_key.as_deref(),
                            &mut authenticated,
                            &text,
                        );
                        match outcome {
                            FrameOutcome::Reply(response) => {
                                if session.text(response.to_json()).await.is_err() {
                                    break;
                                }
                            }
                            FrameOutcome::ReplyAndClose(response) => {
                                let _ = session.text(response.to_json()).await;
                                let _ = session.close(Some(CloseCode::Policy.into())).await;
                                cleanup(&data, id);
                                return;
                            }
                            FrameOutcome::Drop => {}
                        }
                    }
                    Message::Binary(bytes) => {
                        let outcome =
                            binary_frame_outcome(&data.hub, requires_auth, authenticated, &bytes);
                        if let FrameOutcome::Reply(response) = outcome {
                            if session.text(response.to_json()).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Ping(bytes) => {
                        let _ = session.pong(&bytes).await;
                    }
                    Message::Close(reason) => {
                        tracing::info!(?reason, %id, "producer closed the connection");
                        break;
                    }
                    _ => {}
                }
            }
            request = request_rx.recv() => {
                let Some(envelope) = request else { break };
                if session.text(envelope).await.is_err() {
                    break;
                }
            }
        }
    }

    cleanup(&data, id);
}

/// Only the connection that still owns the slot moves the hub to waiting;
/// a replaced predecessor must not clobber its successor's state.
fn cleanup(data: &web::Data<AppState>, id: Uuid) {
    if data.producer.release(id) {
        data.hub.clear_resource_requester();
        data.hub.on_producer_disconnected();
        tracing::info!(%id, "producer disconnected");
    } else {
        tracing::debug!(%id, "superseded producer finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_frame(version: &str, kind: &str, payload: serde_json::Value) -> String {
        json!({"version": version, "type": kind, "payload": payload}).to_string()
    }

    #[test]
    fn test_valid_frame_reaches_hub() {
        let hub = Hub::new();
        let mut authed = false;
        let frame = text_frame("64.0.0", "update", json!({"fop": "A", "uiEvent": "X"}));
        let outcome = text_frame_outcome(&hub, None, &mut authed, &frame);
        match outcome {
            FrameOutcome::Reply(r) => assert_eq!(r.status, 428),
            other => panic!("expected reply, got {other:?}"),
        }
        assert!(authed);
        assert!(hub.get_fop_update("A").is_some());
    }

    #[test]
    fn test_old_version_rejected_and_state_untouched() {
        let hub = Hub::new();
        let mut authed = false;
        let frame = text_frame("1.2.3", "update", json!({"fop": "A"}));
        match text_frame_outcome(&hub, None, &mut authed, &frame) {
            FrameOutcome::Reply(r) => {
                assert_eq!(r.status, 400);
                assert_eq!(r.error.as_deref(), Some("Protocol version check failed"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
        // P6: the gated frame changed nothing.
        assert!(hub.get_fop_update("A").is_none());
        assert!(!authed);
    }

    #[test]
    fn test_missing_version_gets_400() {
        let hub = Hub::new();
        let mut authed = false;
        let frame = json!({"type": "update", "payload": {}}).to_string();
        match text_frame_outcome(&hub, None, &mut authed, &frame) {
            FrameOutcome::Reply(r) => {
                assert_eq!(r.status, 400);
                assert_eq!(r.error.as_deref(), Some("missing version"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_dropped() {
        let hub = Hub::new();
        let mut authed = false;
        assert!(matches!(
            text_frame_outcome(&hub, None, &mut authed, "{nope"),
            FrameOutcome::Drop
        ));
    }

    #[test]
    fn test_wrong_update_key_closes() {
        let hub = Hub::new();
        let mut authed = false;
        let frame = text_frame(
            "64.0.0",
            "update",
            json!({"fop": "A", "updateKey": "wrong"}),
        );
        match text_frame_outcome(&hub, Some("secret"), &mut authed, &frame) {
            FrameOutcome::ReplyAndClose(r) => assert_eq!(r.status, 401),
            other => panic!("expected close, got {other:?}"),
        }
        // P6 again: nothing was folded.
        assert!(hub.get_fop_update("A").is_none());
        assert!(!authed);
    }

    #[test]
    fn test_update_key_is_stripped_before_folding() {
        let hub = Hub::new();
        let mut authed = false;
        let frame = text_frame(
            "64.0.0",
            "update",
            json!({"fop": "A", "updateKey": "secret", "uiEvent": "X"}),
        );
        match text_frame_outcome(&hub, Some("secret"), &mut authed, &frame) {
            FrameOutcome::Reply(_) => {}
            other => panic!("expected reply, got {other:?}"),
        }
        assert!(authed);
        let fop = hub.get_fop_update("A").unwrap();
        assert!(!fop.fields.contains_key("updateKey"));
    }

    #[test]
    fn test_binary_dropped_until_authenticated() {
        let hub = Hub::new();
        let frame = BinaryFrame::encode("64.0.0", &protocol::BinaryKind::FlagsZip, b"x");
        assert!(matches!(
            binary_frame_outcome(&hub, true, false, &frame),
            FrameOutcome::Drop
        ));
        // Without a configured key, no auth is required.
        assert!(matches!(
            binary_frame_outcome(&hub, false, false, &frame),
            FrameOutcome::Reply(_)
        ));
    }

    #[test]
    fn test_binary_below_minimum_dropped() {
        let hub = Hub::new();
        let frame = BinaryFrame::encode("2.0.0", &protocol::BinaryKind::FlagsZip, b"x");
        assert!(matches!(
            binary_frame_outcome(&hub, false, true, &frame),
            FrameOutcome::Drop
        ));
    }
}
