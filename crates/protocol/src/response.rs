//! Egress response envelopes.
//!
//! Every inbound frame gets exactly one of these back on the producer
//! socket. The shape varies by status, so the struct carries the union of
//! fields and serialization drops whatever a given response does not use.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Response {
    fn new(status: u16) -> Self {
        Response {
            status,
            message: None,
            error: None,
            reason: None,
            missing: None,
            details: None,
            retry: None,
            pending: None,
            cached: None,
            accepted: None,
            timeout: None,
        }
    }

    /// `{status:200, message:"<type> processed"}`
    pub fn processed(kind: &str) -> Self {
        let mut r = Self::new(200);
        r.message = Some(format!("{kind} processed"));
        r
    }

    /// 200 for frame types the hub does not recognize and drops.
    pub fn ignored(kind: &str) -> Self {
        let mut r = Self::new(200);
        r.message = Some(format!("{kind} ignored"));
        r.reason = Some("unknown_type".into());
        r
    }

    /// 200 for a snapshot whose checksum matches the one already ingested.
    pub fn duplicate_checksum() -> Self {
        let mut r = Self::new(200);
        r.reason = Some("duplicate_checksum".into());
        r.cached = Some(true);
        r.accepted = Some(true);
        r
    }

    /// 202 for an empty database announcement; the ZIP is expected within
    /// the advertised window.
    pub fn pending_database(timeout_ms: u64) -> Self {
        let mut r = Self::new(202);
        r.message = Some("waiting for database_zip".into());
        r.pending = Some(true);
        r.timeout = Some(timeout_ms);
        r
    }

    /// 202 while a recently requested database has not arrived yet.
    pub fn waiting_for_database() -> Self {
        let mut r = Self::new(202);
        r.message = Some("database already requested".into());
        r.reason = Some("waiting_for_database".into());
        r.retry = Some(true);
        r
    }

    /// 202 when a second snapshot arrives mid-ingest.
    pub fn already_loading() -> Self {
        let mut r = Self::new(202);
        r.message = Some("database load in progress".into());
        r.reason = Some("already_loading".into());
        r.retry = Some(true);
        r
    }

    /// 400 for an envelope that failed to parse (missing/invalid version).
    pub fn envelope_error(error: &str) -> Self {
        let mut r = Self::new(400);
        r.error = Some(error.to_string());
        r
    }

    /// 400 for a version below the hardcoded minimum.
    pub fn version_rejected(received: &str, minimum: &str) -> Self {
        let mut r = Self::new(400);
        r.error = Some("Protocol version check failed".into());
        r.reason = Some(format!("protocol version below minimum {minimum}"));
        r.details = Some(json!({
            "received": received,
            "info": format!("upgrade the producer to {minimum} or newer"),
        }));
        r
    }

    /// 401; the connection is closed right after this is sent.
    pub fn unauthorized() -> Self {
        let mut r = Self::new(401);
        r.message = Some("Access not authorized".into());
        r
    }

    /// 428 listing the frame types the producer must resend.
    pub fn precondition_required(missing: Vec<String>) -> Self {
        let mut r = Self::new(428);
        r.message = Some("Precondition Required: Missing required data".into());
        r.reason = Some("missing_preconditions".into());
        r.missing = Some(missing);
        r
    }

    /// 428 initiated by a subscriber rather than by frame processing.
    pub fn plugin_preconditions(missing: Vec<String>) -> Self {
        let mut r = Self::new(428);
        r.message = Some("Precondition Required: Missing required data".into());
        r.reason = Some("plugin_preconditions".into());
        r.missing = Some(missing);
        r
    }

    /// 500 with a machine-readable reason.
    pub fn server_error(message: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut r = Self::new(500);
        r.message = Some(message.into());
        r.reason = Some(reason.into());
        r
    }

    /// Serialized form for the socket. Response envelopes are built from
    /// plain fields, so serialization cannot fail.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":500}"#.to_string())
    }
}
