//! Team points for club rankings.

/// Points a placed lift earns its team. Podium ranks score the three fixed
/// values; below that, one point less per rank down to zero. Athletes
/// outside the team-size quota or without a successful lift score nothing.
pub fn calculate_team_points(
    rank: u32,
    lift_value: f64,
    is_team_member: bool,
    tp1: u32,
    tp2: u32,
    tp3: u32,
) -> u32 {
    if !is_team_member || lift_value <= 0.0 || rank == 0 {
        return 0;
    }
    match rank {
        1 => tp1,
        2 => tp2,
        3 => tp3,
        _ => tp3.saturating_sub(rank - 3),
    }
}

/// The IWF default scale: 28 / 25 / 23.
pub fn calculate_team_points_default(rank: u32, lift_value: f64, is_team_member: bool) -> u32 {
    calculate_team_points(rank, lift_value, is_team_member, 28, 25, 23)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_podium_values() {
        assert_eq!(calculate_team_points_default(1, 100.0, true), 28);
        assert_eq!(calculate_team_points_default(2, 100.0, true), 25);
        assert_eq!(calculate_team_points_default(3, 100.0, true), 23);
    }

    #[test]
    fn test_decreasing_below_podium() {
        assert_eq!(calculate_team_points_default(4, 100.0, true), 22);
        assert_eq!(calculate_team_points_default(10, 100.0, true), 16);
        // Deep fields bottom out at zero.
        assert_eq!(calculate_team_points_default(40, 100.0, true), 0);
    }

    #[test]
    fn test_non_members_and_bombouts_score_nothing() {
        assert_eq!(calculate_team_points_default(1, 100.0, false), 0);
        assert_eq!(calculate_team_points_default(1, 0.0, true), 0);
        assert_eq!(calculate_team_points_default(0, 100.0, true), 0);
    }
}
