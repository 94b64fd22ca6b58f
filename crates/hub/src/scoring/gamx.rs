//! GAMX percentile scoring.
//!
//! `gamx = qnorm(pBCCG(total; mu, sigma, nu)) * 100 + 1000`, where the
//! distribution parameters come from variant-specific coefficient tables
//! interpolated linearly, by age row first when the variant has them, then
//! by body mass. Tables live as JSON in a data directory and are loaded
//! lazily on first use.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::Deserialize;

use super::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamxVariant {
    Senior,
    AgeAdjusted,
    U17,
    Masters,
}

impl GamxVariant {
    fn file_name(&self) -> &'static str {
        match self {
            Self::Senior => "gamx_senior.json",
            Self::AgeAdjusted => "gamx_age_adjusted.json",
            Self::U17 => "gamx_u17.json",
            Self::Masters => "gamx_masters.json",
        }
    }
}

/// One `(bodyweight, mu, sigma, nu)` support point.
#[derive(Debug, Clone, Deserialize)]
struct BwPoint {
    bw: f64,
    mu: f64,
    sigma: f64,
    nu: f64,
}

/// A run of support points, optionally pinned to an age.
#[derive(Debug, Clone, Deserialize)]
struct AgeRow {
    #[serde(default)]
    age: Option<f64>,
    points: Vec<BwPoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct VariantFile {
    men: Vec<AgeRow>,
    women: Vec<AgeRow>,
}

#[derive(Debug, Default)]
pub struct GamxTables {
    variants: HashMap<GamxVariant, VariantFile>,
}

impl GamxTables {
    /// Loads whichever variant files exist under `dir`. Missing files just
    /// leave their variant unavailable.
    pub fn load(dir: &Path) -> Self {
        let mut variants = HashMap::new();
        for variant in [
            GamxVariant::Senior,
            GamxVariant::AgeAdjusted,
            GamxVariant::U17,
            GamxVariant::Masters,
        ] {
            let path = dir.join(variant.file_name());
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<VariantFile>(&text) {
                Ok(file) => {
                    variants.insert(variant, file);
                }
                Err(e) => tracing::warn!(path = %path.display(), "bad gamx table: {e}"),
            }
        }
        GamxTables { variants }
    }

    pub fn calculate(
        &self,
        gender: Gender,
        body_weight: f64,
        total: f64,
        variant: GamxVariant,
        age: Option<f64>,
    ) -> Option<f64> {
        if total <= 0.0 || body_weight <= 0.0 {
            return None;
        }
        let file = self.variants.get(&variant)?;
        let rows = match gender {
            Gender::Men => &file.men,
            Gender::Women => &file.women,
        };
        let (mu, sigma, nu) = parameters_for(rows, age, body_weight)?;
        let p = p_bccg(total, mu, sigma, nu);
        Some(qnorm(p) * 100.0 + 1000.0)
    }
}

/// Resolves `(mu, sigma, nu)` by interpolating between age rows, then
/// between bodyweight support points inside each row.
fn parameters_for(rows: &[AgeRow], age: Option<f64>, bw: f64) -> Option<(f64, f64, f64)> {
    if rows.is_empty() {
        return None;
    }

    let aged: Vec<&AgeRow> = rows.iter().filter(|r| r.age.is_some()).collect();
    if aged.is_empty() || age.is_none() {
        // Variant without age rows (or no age supplied): first plain row.
        let row = rows.iter().find(|r| r.age.is_none()).or_else(|| rows.first())?;
        return params_at_bw(&row.points, bw);
    }

    let age = age.unwrap_or_default();
    let (below, above) = bracket(&aged, |r| r.age.unwrap_or_default(), age)?;
    let lo = params_at_bw(&below.points, bw)?;
    let hi = params_at_bw(&above.points, bw)?;
    let lo_age = below.age.unwrap_or_default();
    let hi_age = above.age.unwrap_or_default();
    if (hi_age - lo_age).abs() < f64::EPSILON {
        return Some(lo);
    }
    let t = ((age - lo_age) / (hi_age - lo_age)).clamp(0.0, 1.0);
    Some((
        lerp(lo.0, hi.0, t),
        lerp(lo.1, hi.1, t),
        lerp(lo.2, hi.2, t),
    ))
}

fn params_at_bw(points: &[BwPoint], bw: f64) -> Option<(f64, f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let (below, above) = bracket(&points.iter().collect::<Vec<_>>(), |p| p.bw, bw)?;
    if (above.bw - below.bw).abs() < f64::EPSILON {
        return Some((below.mu, below.sigma, below.nu));
    }
    let t = ((bw - below.bw) / (above.bw - below.bw)).clamp(0.0, 1.0);
    Some((
        lerp(below.mu, above.mu, t),
        lerp(below.sigma, above.sigma, t),
        lerp(below.nu, above.nu, t),
    ))
}

/// Nearest rows at or around `x`; clamps to the ends of the table.
fn bracket<'a, T>(rows: &[&'a T], key: impl Fn(&T) -> f64, x: f64) -> Option<(&'a T, &'a T)> {
    let mut sorted: Vec<&'a T> = rows.to_vec();
    sorted.sort_by(|a, b| key(a).total_cmp(&key(b)));
    let first = *sorted.first()?;
    let last = *sorted.last()?;
    if x <= key(first) {
        return Some((first, first));
    }
    if x >= key(last) {
        return Some((last, last));
    }
    let upper = sorted.iter().position(|r| key(r) >= x)?;
    Some((sorted[upper - 1], sorted[upper]))
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Box-Cox Cole-Green CDF at `y`.
fn p_bccg(y: f64, mu: f64, sigma: f64, nu: f64) -> f64 {
    if y <= 0.0 || mu <= 0.0 || sigma <= 0.0 {
        return 0.0;
    }
    let z = if nu.abs() < 1e-9 {
        (y / mu).ln() / sigma
    } else {
        ((y / mu).powf(nu) - 1.0) / (nu * sigma)
    };
    phi(z)
}

/// Standard normal CDF via the Abramowitz-Stegun erf approximation.
fn phi(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Inverse standard normal CDF (Acklam's rational approximation). Clamped
/// away from 0 and 1 so extreme totals stay finite.
fn qnorm(p: f64) -> f64 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

// ---- lazily loaded process-wide tables ------------------------------------

struct GamxCache {
    dir: Option<PathBuf>,
    tables: Option<Arc<GamxTables>>,
}

fn cache() -> &'static Mutex<GamxCache> {
    static CACHE: OnceLock<Mutex<GamxCache>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(GamxCache {
            dir: None,
            tables: None,
        })
    })
}

/// Points the lazy loader at a coefficient directory; clears any tables
/// loaded from a previous one.
pub fn set_gamx_data_dir(dir: impl Into<PathBuf>) {
    let mut cache = cache().lock().unwrap_or_else(|e| e.into_inner());
    cache.dir = Some(dir.into());
    cache.tables = None;
}

/// Convenience wrapper over [`GamxTables::calculate`] using the configured
/// data directory. `None` when no directory is set or the variant's table
/// is absent.
pub fn calculate_gamx(
    gender: Gender,
    body_weight: f64,
    total: f64,
    variant: GamxVariant,
    age: Option<f64>,
) -> Option<f64> {
    let tables = {
        let mut cache = cache().lock().unwrap_or_else(|e| e.into_inner());
        if cache.tables.is_none() {
            let dir = cache.dir.clone()?;
            cache.tables = Some(Arc::new(GamxTables::load(&dir)));
        }
        cache.tables.clone()?
    };
    tables.calculate(gender, body_weight, total, variant, age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_senior_table(dir: &Path) {
        let json = r#"{
            "men": [{"points": [
                {"bw": 60.0, "mu": 220.0, "sigma": 0.12, "nu": 0.8},
                {"bw": 100.0, "mu": 300.0, "sigma": 0.12, "nu": 0.8}
            ]}],
            "women": [{"points": [
                {"bw": 50.0, "mu": 150.0, "sigma": 0.13, "nu": 0.7},
                {"bw": 90.0, "mu": 210.0, "sigma": 0.13, "nu": 0.7}
            ]}]
        }"#;
        let mut f = fs::File::create(dir.join("gamx_senior.json")).unwrap();
        f.write_all(json.as_bytes()).unwrap();
    }

    #[test]
    fn test_qnorm_center_and_symmetry() {
        assert!(qnorm(0.5).abs() < 1e-9);
        assert!((qnorm(0.975) - 1.959964).abs() < 1e-3);
        assert!((qnorm(0.025) + qnorm(0.975)).abs() < 1e-6);
    }

    #[test]
    fn test_phi_matches_known_points() {
        assert!((phi(0.0) - 0.5).abs() < 1e-9);
        assert!((phi(1.96) - 0.975).abs() < 1e-3);
    }

    #[test]
    fn test_total_at_mu_scores_1000() {
        let dir = tempfile::tempdir().unwrap();
        write_senior_table(dir.path());
        let tables = GamxTables::load(dir.path());
        // At bw 80 the interpolated mu is 260; pBCCG(mu) = 0.5, qnorm = 0.
        let score = tables
            .calculate(Gender::Men, 80.0, 260.0, GamxVariant::Senior, None)
            .unwrap();
        assert!((score - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_bigger_total_scores_higher() {
        let dir = tempfile::tempdir().unwrap();
        write_senior_table(dir.path());
        let tables = GamxTables::load(dir.path());
        let base = tables
            .calculate(Gender::Men, 80.0, 260.0, GamxVariant::Senior, None)
            .unwrap();
        let better = tables
            .calculate(Gender::Men, 80.0, 290.0, GamxVariant::Senior, None)
            .unwrap();
        assert!(better > base);
    }

    #[test]
    fn test_bodyweight_clamps_to_table_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_senior_table(dir.path());
        let tables = GamxTables::load(dir.path());
        let at_edge = tables
            .calculate(Gender::Men, 60.0, 220.0, GamxVariant::Senior, None)
            .unwrap();
        let below_edge = tables
            .calculate(Gender::Men, 45.0, 220.0, GamxVariant::Senior, None)
            .unwrap();
        assert!((at_edge - below_edge).abs() < 1e-9);
    }

    #[test]
    fn test_missing_variant_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write_senior_table(dir.path());
        let tables = GamxTables::load(dir.path());
        assert!(tables
            .calculate(Gender::Men, 80.0, 260.0, GamxVariant::Masters, Some(50.0))
            .is_none());
    }
}
