use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::version;

/// A parsed text frame: `{version, type, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Parses a UTF-8 JSON text frame.
    ///
    /// The version field is mandatory and must be a well-formed semver
    /// string; the errors are worded exactly as the producer expects to see
    /// them echoed back (`missing version` / `invalid version`). A missing
    /// `type` is tolerated here and rejected at dispatch, where the unknown
    /// name can be logged.
    pub fn parse(text: &str) -> Result<Envelope> {
        let value: Value = serde_json::from_str(text)?;

        let version = match value.get("version") {
            Some(Value::String(v)) => v.clone(),
            _ => return Err(ProtocolError::MissingVersion),
        };
        if version::parse(&version).is_none() {
            return Err(ProtocolError::InvalidVersion);
        }

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = value.get("payload").cloned().unwrap_or(Value::Null);

        Ok(Envelope {
            version,
            kind,
            payload,
        })
    }

    /// Whether this envelope's version clears the hardcoded minimum.
    pub fn meets_minimum(&self) -> bool {
        version::meets_minimum(&self.version).unwrap_or(false)
    }
}
