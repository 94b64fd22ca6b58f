//! Q-points: a generalized-logistic bodyweight adjustment.
//!
//! The denominator is a sigmoid in bodyweight, `a + (k - a) / (1 + q *
//! e^(-b (bw - v)))`, scaled so a reference-level total lands near 100
//! points. With an age, the masters correction from the Sinclair tables is
//! applied on top.

use super::sinclair::get_masters_age_factor;
use super::Gender;

struct QPointsConstants {
    a: f64,
    k: f64,
    q: f64,
    b: f64,
    v: f64,
}

const MEN: QPointsConstants = QPointsConstants {
    a: 155.2,
    k: 431.9,
    q: 2.47,
    b: 0.0521,
    v: 86.0,
};

const WOMEN: QPointsConstants = QPointsConstants {
    a: 94.6,
    k: 288.1,
    q: 2.13,
    b: 0.0569,
    v: 71.5,
};

pub fn calculate_q_points(total: f64, body_weight: f64, gender: Gender, age: Option<u32>) -> f64 {
    if total <= 0.0 || body_weight <= 0.0 {
        return 0.0;
    }
    let c = match gender {
        Gender::Men => &MEN,
        Gender::Women => &WOMEN,
    };
    let sigmoid = (c.k - c.a) / (1.0 + c.q * (-c.b * (body_weight - c.v)).exp());
    let points = total * 100.0 / (c.a + sigmoid);
    match age {
        Some(age) if age > 30 => points * get_masters_age_factor(age, gender),
        _ => points,
    }
}
