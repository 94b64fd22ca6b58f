use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::athlete::Athlete;

/// Competition identification and preferences. Only the fields the hub
/// itself reads are typed; federations embed plenty of extra metadata and
/// all of it passes through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetitionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation: Option<String>,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub gender: String,
    #[serde(rename = "maximumWeight", skip_serializing_if = "Option::is_none")]
    pub maximum_weight: Option<f64>,
    #[serde(rename = "categoryName", skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl Category {
    /// The weight part of a computed category code: `999` stands in for
    /// the open-ended super-heavy class.
    pub fn weight_code(&self) -> String {
        match self.maximum_weight {
            Some(w) if w <= 130.0 => format!("{}", w.round() as i64),
            _ => "999".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeGroup {
    pub code: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl AgeGroup {
    /// Computed lookup code for one of this group's categories,
    /// `<ageGroupCode>_<gender><maxWeightOrSentinel>`.
    pub fn computed_code(&self, category: &Category) -> String {
        format!("{}_{}{}", self.code, category.gender, category.weight_code())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionRecord {
    #[serde(rename = "liftType", skip_serializing_if = "Option::is_none")]
    pub lift_type: Option<String>,
    #[serde(rename = "bodyWeightRange", skip_serializing_if = "Option::is_none")]
    pub body_weight_range: Option<String>,
    #[serde(rename = "recordValue", skip_serializing_if = "Option::is_none")]
    pub record_value: Option<f64>,
    #[serde(rename = "recordName", skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation: Option<String>,
    #[serde(rename = "groupNameString", default)]
    pub group_name_string: String,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl CompetitionRecord {
    /// Records set during the running competition carry the session name
    /// they were set in; pre-existing records carry an empty string.
    pub fn set_in_current_competition(&self) -> bool {
        !self.group_name_string.is_empty()
    }
}

/// The full denormalized snapshot, replaced atomically on each successful
/// ingest of a database frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseState {
    pub competition: CompetitionInfo,
    pub athletes: Vec<Athlete>,
    pub teams: Vec<Team>,
    #[serde(rename = "ageGroups")]
    pub age_groups: Vec<AgeGroup>,
    pub records: Vec<CompetitionRecord>,
    #[serde(rename = "databaseChecksum", skip_serializing_if = "Option::is_none")]
    pub database_checksum: Option<String>,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    pub initialized: bool,
    pub fops: Vec<String>,
}
