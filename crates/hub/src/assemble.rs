//! Full-snapshot assembly.
//!
//! A database frame (text or the `competition.json` inside a database ZIP)
//! is parsed into a [`DatabaseState`] plus the resolution indexes the
//! normalizer and the queries run on. Assembly is all-or-nothing: the hub
//! only swaps its state once the whole structure built.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{AgeGroup, Athlete, CompetitionInfo, CompetitionRecord, DatabaseState, Team};
use crate::normalize::{self, NormalizeContext};

pub(crate) struct Assembly {
    pub database: DatabaseState,
    pub ctx: NormalizeContext,
    /// Computed category code to its owning age group, rebuilt whenever the
    /// checksum changes and handed out as-is by the queries.
    pub category_age_groups: HashMap<String, AgeGroup>,
}

/// The competition block, whether the payload is flat or wrapped in
/// `{database: {...}}`.
pub(crate) fn competition_block(payload: &Value) -> &Value {
    match payload.get("database") {
        Some(inner) if inner.is_object() => inner,
        _ => payload,
    }
}

/// An empty database frame announces that a `database_zip` binary follows.
pub(crate) fn is_empty_announcement(payload: &Value) -> bool {
    let block = competition_block(payload);
    match block.as_object() {
        None => true,
        Some(map) => !map.contains_key("athletes") && !map.contains_key("competition"),
    }
}

pub(crate) fn checksum_of(payload: &Value) -> Option<&str> {
    competition_block(payload)
        .get("databaseChecksum")
        .and_then(Value::as_str)
}

pub(crate) fn assemble(payload: &Value, now: DateTime<Utc>) -> Assembly {
    let block = competition_block(payload);

    let competition: CompetitionInfo = block
        .get("competition")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let teams = typed_list::<Team>(block.get("teams"), "team");
    let age_groups = typed_list::<AgeGroup>(block.get("ageGroups"), "age group");
    let records = typed_list::<CompetitionRecord>(block.get("records"), "record");

    let mut ctx = NormalizeContext::default();
    for team in &teams {
        ctx.teams.insert(team.id, team.name.clone());
    }

    let mut category_age_groups = HashMap::new();
    for group in &age_groups {
        for category in &group.categories {
            let code = group.computed_code(category);
            let display = category
                .category_name
                .clone()
                .unwrap_or_else(|| code.clone());
            ctx.categories.insert(code.clone(), display);
            category_age_groups.insert(code, group.clone());
        }
    }

    let athletes = athlete_list(block.get("athletes"), &ctx);
    let fops = fop_list(block, &competition);

    let database = DatabaseState {
        competition,
        athletes,
        teams,
        age_groups,
        records,
        database_checksum: checksum_of(payload).map(str::to_string),
        last_update: now,
        initialized: true,
        fops,
    };

    Assembly {
        database,
        ctx,
        category_age_groups,
    }
}

fn typed_list<T: serde::de::DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<T> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("skipping malformed {what}: {e}");
                None
            }
        })
        .collect()
}

fn athlete_list(value: Option<&Value>, ctx: &NormalizeContext) -> Vec<Athlete> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut athletes = Vec::with_capacity(items.len());
    for item in items {
        match normalize::normalize_athlete(item, ctx) {
            Some(athlete) => athletes.push(athlete),
            None => tracing::warn!("skipping athlete record without a key"),
        }
    }
    athletes
}

/// Platform names come from `competition.fops`, from a `platforms` list, or
/// default to the single platform every small meet runs.
fn fop_list(block: &Value, competition: &CompetitionInfo) -> Vec<String> {
    let candidates = competition
        .raw
        .get("fops")
        .or_else(|| competition.raw.get("platforms"))
        .or_else(|| block.get("platforms"));

    let mut fops: Vec<String> = candidates
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(fop_name).collect())
        .unwrap_or_default();
    fops.dedup();
    if fops.is_empty() {
        fops.push("A".to_string());
    }
    fops
}

fn fop_name(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(o) => object_name(o),
        _ => None,
    }
}

fn object_name(o: &Map<String, Value>) -> Option<String> {
    o.get("name")
        .or_else(|| o.get("fopName"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
