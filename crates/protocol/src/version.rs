use semver::Version;

/// Oldest producer protocol the hub accepts. Frames announcing anything
/// strictly below this are rejected (text) or dropped (binary).
pub const MINIMUM_PROTOCOL_VERSION: &str = "64.0.0";

/// Parses a semver string down to its `(major, minor, patch)` triple.
/// Prerelease suffixes such as `-rc2` parse fine but never participate in
/// the comparison; only the numeric triple matters on this wire.
pub fn parse(s: &str) -> Option<(u64, u64, u64)> {
    let v = Version::parse(s.trim()).ok()?;
    Some((v.major, v.minor, v.patch))
}

/// Whether `s` is a well-formed version at or above the hardcoded minimum.
/// `None` means `s` did not parse at all.
pub fn meets_minimum(s: &str) -> Option<bool> {
    let min = parse(MINIMUM_PROTOCOL_VERSION).expect("minimum version constant is valid semver");
    Some(parse(s)? >= min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_triple() {
        assert_eq!(parse("64.1.2"), Some((64, 1, 2)));
    }

    #[test]
    fn test_parse_ignores_prerelease() {
        assert_eq!(parse("65.0.0-rc3"), Some((65, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("not-a-version"), None);
        assert_eq!(parse("64.0"), None);
    }

    #[test]
    fn test_minimum_boundary() {
        assert_eq!(meets_minimum(MINIMUM_PROTOCOL_VERSION), Some(true));
        assert_eq!(meets_minimum("63.9.9"), Some(false));
        assert_eq!(meets_minimum("64.0.1"), Some(true));
        assert_eq!(meets_minimum("garbage"), None);
    }

    #[test]
    fn test_prerelease_of_minimum_passes() {
        // 64.0.0-rc1 compares as 64.0.0 on this wire.
        assert_eq!(meets_minimum("64.0.0-rc1"), Some(true));
    }
}
