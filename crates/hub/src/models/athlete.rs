use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display status of a single attempt cell. The wire strings are what
/// scoreboards key their CSS off, so they are preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiftStatus {
    Good,
    Bad,
    Current,
    Next,
    Request,
    Empty,
}

impl LiftStatus {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "good" => Some(Self::Good),
            "bad" => Some(Self::Bad),
            "current" => Some(Self::Current),
            "next" => Some(Self::Next),
            "request" => Some(Self::Request),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }

    /// Whether this attempt already has a result on the board.
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Good | Self::Bad)
    }
}

/// One of the six attempt cells on a scoreboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptCell {
    #[serde(rename = "stringValue")]
    pub string_value: String,
    #[serde(rename = "liftStatus")]
    pub lift_status: LiftStatus,
}

impl AttemptCell {
    pub fn empty() -> Self {
        AttemptCell {
            string_value: "-".into(),
            lift_status: LiftStatus::Empty,
        }
    }

    pub fn new(string_value: impl Into<String>, lift_status: LiftStatus) -> Self {
        AttemptCell {
            string_value: string_value.into(),
            lift_status,
        }
    }
}

/// A denormalized session athlete.
///
/// The typed fields are the ones the hub derives or resolves; everything
/// else the producer sent rides along in `raw` and serializes flattened, so
/// a normalized athlete is a strict enrichment of the upstream record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Athlete {
    pub key: String,
    #[serde(rename = "athleteKey")]
    pub athlete_key: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "teamName", skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "yearOfBirth", skip_serializing_if = "Option::is_none")]
    pub year_of_birth: Option<String>,
    pub sattempts: Vec<AttemptCell>,
    pub cattempts: Vec<AttemptCell>,
    #[serde(rename = "bestSnatch")]
    pub best_snatch: String,
    #[serde(rename = "bestCleanJerk")]
    pub best_clean_jerk: String,
    pub total: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl Athlete {
    /// Raw producer field by its wire name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    /// Raw numeric field, tolerating numbers delivered as strings.
    pub fn numeric_field(&self, name: &str) -> Option<f64> {
        match self.raw.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
