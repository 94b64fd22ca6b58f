//! Sinclair bodyweight adjustment.
//!
//! `S = total * 10^(A * log10(bw / b)^2)` below the reference bodyweight
//! `b`, and the raw total at or above it. Coefficients are fixed per
//! Olympic cycle.

use super::Gender;

struct SinclairCoefficients {
    a: f64,
    b: f64,
}

const MEN_2020: SinclairCoefficients = SinclairCoefficients {
    a: 0.751945030,
    b: 175.508,
};
const WOMEN_2020: SinclairCoefficients = SinclairCoefficients {
    a: 0.783497476,
    b: 153.655,
};

const MEN_2024: SinclairCoefficients = SinclairCoefficients {
    a: 0.722762521,
    b: 193.609,
};
const WOMEN_2024: SinclairCoefficients = SinclairCoefficients {
    a: 0.787004341,
    b: 153.757,
};

pub fn calculate_sinclair_2024(total: f64, body_weight: f64, gender: Gender) -> f64 {
    let coefficients = match gender {
        Gender::Men => &MEN_2024,
        Gender::Women => &WOMEN_2024,
    };
    sinclair(total, body_weight, coefficients)
}

pub fn calculate_sinclair_2020(total: f64, body_weight: f64, gender: Gender) -> f64 {
    let coefficients = match gender {
        Gender::Men => &MEN_2020,
        Gender::Women => &WOMEN_2020,
    };
    sinclair(total, body_weight, coefficients)
}

fn sinclair(total: f64, body_weight: f64, coefficients: &SinclairCoefficients) -> f64 {
    if total <= 0.0 || body_weight <= 0.0 {
        return 0.0;
    }
    if body_weight >= coefficients.b {
        return total;
    }
    let x = (body_weight / coefficients.b).log10();
    total * 10f64.powf(coefficients.a * x * x)
}

/// Masters age correction, multiplied onto the Sinclair score. Rows are
/// ages 30 and up, one per year; younger lifters get no correction and the
/// table saturates at its last row.
const MEN_AGE_FACTORS: &[f64] = &[
    1.000, 1.012, 1.024, 1.036, 1.048, 1.060, 1.072, 1.084, 1.097, 1.110, // 30-39
    1.124, 1.138, 1.152, 1.167, 1.182, 1.198, 1.214, 1.230, 1.247, 1.264, // 40-49
    1.282, 1.300, 1.319, 1.338, 1.358, 1.378, 1.399, 1.421, 1.443, 1.466, // 50-59
    1.490, 1.514, 1.539, 1.565, 1.592, 1.620, 1.649, 1.679, 1.710, 1.742, // 60-69
    1.775, 1.809, 1.845, 1.882, 1.920, 1.960, 2.001, 2.044, 2.088, 2.134, // 70-79
    2.181, // 80+
];

const WOMEN_AGE_FACTORS: &[f64] = &[
    1.000, 1.014, 1.028, 1.043, 1.058, 1.073, 1.089, 1.105, 1.122, 1.139, // 30-39
    1.157, 1.175, 1.194, 1.213, 1.233, 1.253, 1.274, 1.296, 1.318, 1.341, // 40-49
    1.365, 1.390, 1.416, 1.443, 1.471, 1.500, 1.530, 1.561, 1.593, 1.626, // 50-59
    1.660, 1.695, 1.731, 1.768, 1.806, 1.845, 1.885, 1.926, 1.968, 2.011, // 60-69
    2.055, 2.100, 2.146, 2.193, 2.241, 2.290, 2.340, 2.391, 2.443, 2.496, // 70-79
    2.550, // 80+
];

pub fn get_masters_age_factor(age: u32, gender: Gender) -> f64 {
    let table = match gender {
        Gender::Men => MEN_AGE_FACTORS,
        Gender::Women => WOMEN_AGE_FACTORS,
    };
    if age < 30 {
        return 1.0;
    }
    let index = (age as usize - 30).min(table.len() - 1);
    table[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_passes_through_at_reference_weight() {
        assert_eq!(calculate_sinclair_2024(300.0, 200.0, Gender::Men), 300.0);
        assert_eq!(calculate_sinclair_2020(250.0, 180.0, Gender::Men), 250.0);
    }

    #[test]
    fn test_lighter_lifters_gain() {
        let light = calculate_sinclair_2024(300.0, 73.0, Gender::Men);
        let heavy = calculate_sinclair_2024(300.0, 109.0, Gender::Men);
        assert!(light > heavy);
        assert!(heavy > 300.0);
    }

    #[test]
    fn test_monotonic_in_total() {
        let lower = calculate_sinclair_2024(200.0, 76.0, Gender::Women);
        let higher = calculate_sinclair_2024(210.0, 76.0, Gender::Women);
        assert!(higher > lower);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(calculate_sinclair_2024(0.0, 80.0, Gender::Men), 0.0);
        assert_eq!(calculate_sinclair_2024(300.0, 0.0, Gender::Men), 0.0);
    }

    #[test]
    fn test_age_factor_boundaries() {
        assert_eq!(get_masters_age_factor(25, Gender::Men), 1.0);
        assert_eq!(get_masters_age_factor(30, Gender::Men), 1.0);
        assert!(get_masters_age_factor(45, Gender::Men) > 1.0);
        // Saturates past the table end.
        assert_eq!(
            get_masters_age_factor(95, Gender::Women),
            get_masters_age_factor(80, Gender::Women)
        );
    }

    #[test]
    fn test_age_factor_monotonic() {
        for age in 30..80 {
            assert!(
                get_masters_age_factor(age + 1, Gender::Men)
                    >= get_masters_age_factor(age, Gender::Men)
            );
        }
    }
}
