//! Athlete normalization.
//!
//! Raw upstream records arrive in whatever shape the producer's exporter
//! was in the mood for: wrapped in `{athlete, displayInfo}`, attempt cells
//! as objects, bare numbers, or parenthesized strings. This module flattens
//! each record into one [`Athlete`] with the derived display fields the
//! scoreboards need. Producer-supplied values always win; the hub only
//! fills the gaps.

use serde_json::{Map, Value};

use crate::models::{Athlete, AttemptCell, LiftKind, LiftStatus};

/// Resolution tables the normalizer needs from the assembled database.
#[derive(Debug, Clone, Default)]
pub struct NormalizeContext {
    /// Team id to team name.
    pub teams: std::collections::HashMap<i64, String>,
    /// Computed category code to display name.
    pub categories: std::collections::HashMap<String, String>,
}

/// Fields the hub owns on a normalized athlete. They are lifted out of the
/// raw map so flattened serialization never emits a key twice.
const OWNED_KEYS: &[&str] = &[
    "key",
    "athleteKey",
    "fullName",
    "teamName",
    "category",
    "yearOfBirth",
    "sattempts",
    "cattempts",
    "bestSnatch",
    "bestCleanJerk",
    "total",
    "classname",
];

/// Opaque athlete keys are any string or number on the wire, negative
/// numbers included; everything is normalized to its string form.
pub fn value_to_key(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn normalize_athlete(raw: &Value, ctx: &NormalizeContext) -> Option<Athlete> {
    let mut map = unwrap_display_info(raw.as_object()?);

    let key = map
        .get("key")
        .or_else(|| map.get("athleteKey"))
        .or_else(|| map.get("id"))
        .and_then(value_to_key)?;

    let mut owned: Map<String, Value> = Map::new();
    for name in OWNED_KEYS {
        if let Some(v) = map.remove(*name) {
            owned.insert((*name).to_string(), v);
        }
    }

    let full_name = owned
        .get("fullName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| derived_full_name(&map));

    let team_name = owned
        .get("teamName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| team_id(&map).and_then(|id| ctx.teams.get(&id).cloned()));

    let category_code = map.get("categoryCode").and_then(Value::as_str);
    let category = owned
        .get("category")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            category_code.map(|code| ctx.categories.get(code).cloned().unwrap_or(code.to_string()))
        });

    let year_of_birth = owned
        .get("yearOfBirth")
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| {
            map.get("fullBirthDate")
                .and_then(Value::as_str)
                .filter(|s| s.len() >= 4)
                .map(|s| s[..4].to_string())
        });

    let sattempts = attempt_cells(owned.get("sattempts"), &map, LiftKind::Snatch);
    let cattempts = attempt_cells(owned.get("cattempts"), &map, LiftKind::CleanJerk);

    let best_snatch = owned
        .get("bestSnatch")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| best_of(&sattempts));
    let best_clean_jerk = owned
        .get("bestCleanJerk")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| best_of(&cattempts));

    let total = display_total(owned.get("total"));
    let classname = owned
        .get("classname")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Athlete {
        athlete_key: key.clone(),
        key,
        full_name,
        team_name,
        category,
        year_of_birth,
        sattempts,
        cattempts,
        best_snatch,
        best_clean_jerk,
        total,
        classname,
        raw: map,
    })
}

/// Refreshes the database-resolved fields after a new snapshot arrives,
/// leaving everything the producer said alone.
pub fn reresolve(athlete: &mut Athlete, ctx: &NormalizeContext) {
    if let Some(name) = team_id(&athlete.raw).and_then(|id| ctx.teams.get(&id)) {
        athlete.team_name = Some(name.clone());
    }
    if let Some(code) = athlete.raw.get("categoryCode").and_then(Value::as_str) {
        if let Some(name) = ctx.categories.get(code) {
            athlete.category = Some(name.clone());
        }
    }
}

/// `{athlete: {...}, displayInfo: {...}}` wrappers collapse to one map;
/// display info wins on overlap.
fn unwrap_display_info(map: &Map<String, Value>) -> Map<String, Value> {
    let Some(inner) = map.get("athlete").and_then(Value::as_object) else {
        return map.clone();
    };
    let mut merged = inner.clone();
    if let Some(display) = map.get("displayInfo").and_then(Value::as_object) {
        for (k, v) in display {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

fn derived_full_name(map: &Map<String, Value>) -> String {
    let first = map.get("firstName").and_then(Value::as_str).unwrap_or("");
    let last = map.get("lastName").and_then(Value::as_str).unwrap_or("");
    match (last.is_empty(), first.is_empty()) {
        (false, false) => format!("{}, {}", last.to_uppercase(), first),
        (false, true) => last.to_uppercase(),
        (true, false) => first.to_string(),
        (true, true) => String::new(),
    }
}

fn team_id(map: &Map<String, Value>) -> Option<i64> {
    match map.get("team")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn attempt_cells(supplied: Option<&Value>, map: &Map<String, Value>, kind: LiftKind) -> Vec<AttemptCell> {
    let mut cells: Vec<AttemptCell> = match supplied.and_then(Value::as_array) {
        Some(values) => values.iter().map(normalize_cell).collect(),
        None => (1..=3).map(|n| cell_from_columns(map, kind, n)).collect(),
    };
    cells.resize(3, AttemptCell::empty());
    cells.truncate(3);
    cells
}

/// Normalizes one attempt cell from any of the wire shapes. Already
/// normalized cells (`{stringValue, liftStatus}`) are a fixed point.
pub fn normalize_cell(v: &Value) -> AttemptCell {
    match v {
        Value::Null => AttemptCell::empty(),
        Value::Object(o) => {
            if let Some(sv) = o.get("stringValue") {
                let string_value = stringify(sv);
                let status = o
                    .get("liftStatus")
                    .and_then(Value::as_str)
                    .and_then(LiftStatus::from_wire)
                    .unwrap_or(if string_value == "-" {
                        LiftStatus::Empty
                    } else {
                        LiftStatus::Request
                    });
                return AttemptCell::new(string_value, status);
            }
            match o.get("value") {
                None | Some(Value::Null) => AttemptCell::empty(),
                Some(value) => {
                    let status = o
                        .get("status")
                        .or_else(|| o.get("liftStatus"))
                        .and_then(Value::as_str)
                        .and_then(LiftStatus::from_wire)
                        .unwrap_or(LiftStatus::Request);
                    match value {
                        Value::Number(n) => {
                            AttemptCell::new(fmt_num(n.as_f64().unwrap_or(0.0)), status)
                        }
                        other => normalize_cell(other),
                    }
                }
            }
        }
        Value::Number(n) => legacy_number_cell(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "-" {
                return AttemptCell::empty();
            }
            if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
                return AttemptCell::new(inner.trim(), LiftStatus::Bad);
            }
            match s.parse::<f64>() {
                Ok(n) => legacy_number_cell(n),
                Err(_) => AttemptCell::new(s, LiftStatus::Request),
            }
        }
        _ => AttemptCell::empty(),
    }
}

fn legacy_number_cell(n: f64) -> AttemptCell {
    if n > 0.0 {
        AttemptCell::new(fmt_num(n), LiftStatus::Good)
    } else if n < 0.0 {
        AttemptCell::new(fmt_num(-n), LiftStatus::Bad)
    } else {
        AttemptCell::empty()
    }
}

/// Builds a cell from the six attempt columns when the producer sent no
/// pre-built cell array. A signed `actualLift` decides the attempt; failing
/// that, the latest declared weight is an open request.
fn cell_from_columns(map: &Map<String, Value>, kind: LiftKind, attempt: u8) -> AttemptCell {
    let prefix = column_prefix(kind);
    if let Some(actual) = numeric_column(map, &format!("{prefix}{attempt}ActualLift")) {
        return legacy_number_cell(actual);
    }
    match requested_weight_from(map, kind, attempt) {
        Some(w) => AttemptCell::new(fmt_num(w), LiftStatus::Request),
        None => AttemptCell::empty(),
    }
}

/// The weight an athlete is in for on a given attempt:
/// change 2, then change 1, then the declaration, then automatic progression.
pub fn requested_weight_from(map: &Map<String, Value>, kind: LiftKind, attempt: u8) -> Option<f64> {
    let prefix = column_prefix(kind);
    ["Change2", "Change1", "Declaration", "AutomaticProgression"]
        .iter()
        .find_map(|col| numeric_column(map, &format!("{prefix}{attempt}{col}")))
}

/// First undecided attempt across the six cells, snatch first.
pub fn next_attempt(athlete: &Athlete) -> Option<(LiftKind, u8)> {
    for (kind, cells) in [
        (LiftKind::Snatch, &athlete.sattempts),
        (LiftKind::CleanJerk, &athlete.cattempts),
    ] {
        if let Some(idx) = cells.iter().position(|c| !c.lift_status.is_decided()) {
            return Some((kind, idx as u8 + 1));
        }
    }
    None
}

fn column_prefix(kind: LiftKind) -> &'static str {
    match kind {
        LiftKind::Snatch => "snatch",
        LiftKind::CleanJerk => "cleanJerk",
    }
}

fn numeric_column(map: &Map<String, Value>, name: &str) -> Option<f64> {
    match map.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn best_of(cells: &[AttemptCell]) -> String {
    cells
        .iter()
        .filter(|c| c.lift_status == LiftStatus::Good)
        .filter_map(|c| c.string_value.parse::<f64>().ok())
        .fold(None::<f64>, |best, v| Some(best.map_or(v, |b| b.max(v))))
        .map(fmt_num)
        .unwrap_or_else(|| "-".to_string())
}

fn display_total(total: Option<&Value>) -> Value {
    match total {
        Some(Value::Number(n)) if n.as_f64().unwrap_or(0.0) != 0.0 => Value::Number(n.clone()),
        Some(Value::String(s)) if !s.is_empty() => Value::String(s.clone()),
        _ => Value::String("-".to_string()),
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => fmt_num(n.as_f64().unwrap_or(0.0)),
        _ => "-".to_string(),
    }
}

/// Weights print without a trailing `.0`; fractional kilos keep theirs.
fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
