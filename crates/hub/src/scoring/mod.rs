//! Scoring helpers consumed by embedders.
//!
//! Pure functions with no coupling to the state machine: bodyweight
//! adjustment formulas, the GAMX percentile score, and team points. All
//! arithmetic runs in `f64`; the formulas are transcendental, so there is
//! nothing decimal arithmetic would buy here.

pub mod gamx;
pub mod qpoints;
pub mod sinclair;
pub mod team_points;

pub use gamx::{calculate_gamx, GamxTables, GamxVariant};
pub use qpoints::calculate_q_points;
pub use sinclair::{calculate_sinclair_2020, calculate_sinclair_2024, get_masters_age_factor};
pub use team_points::calculate_team_points;

/// Gender selector shared by the scoring tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Men,
    Women,
}

impl Gender {
    /// Tolerant parse of the wire spellings (`M`/`F`, `male`/`female`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "male" | "men" => Some(Self::Men),
            "f" | "w" | "female" | "women" => Some(Self::Women),
            _ => None,
        }
    }
}
