//! Asset URL resolution.
//!
//! Flags, team logos, and athlete pictures live under the local files
//! directory; the hub never serves them, it only answers "is there a file
//! for this name, and what URL would it have". Probing tries the exact
//! name first, then the uppercased one, across the usual image extensions.

use std::path::Path;

use crate::Hub;

const EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "webp"];

impl Hub {
    pub fn get_flag_url(&self, team_name: &str) -> Option<String> {
        self.probe("flags", team_name)
    }

    pub fn get_logo_url(&self, team_name: &str) -> Option<String> {
        self.probe("logos", team_name)
    }

    pub fn get_picture_url(&self, athlete_id: &str) -> Option<String> {
        self.probe("pictures", athlete_id)
    }

    /// First hit across a list of candidate logo base names.
    pub fn get_header_logo_url(&self, base_names: &[&str]) -> Option<String> {
        base_names.iter().find_map(|name| self.probe("logos", name))
    }

    fn probe(&self, subdir: &str, name: &str) -> Option<String> {
        let (dir, prefix) = {
            let st = self.state().read();
            (st.local_files_dir.clone(), st.local_url_prefix.clone())
        };
        probe_dir(&dir, &prefix, subdir, name)
    }
}

pub(crate) fn probe_dir(
    files_dir: &Path,
    url_prefix: &str,
    subdir: &str,
    name: &str,
) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let dir = files_dir.join(subdir);
    let upper = name.to_uppercase();
    let mut candidates = vec![name];
    if upper != name {
        candidates.push(&upper);
    }
    for candidate in candidates {
        for ext in EXTENSIONS {
            let file = format!("{candidate}.{ext}");
            if dir.join(&file).is_file() {
                return Some(format!("{url_prefix}/{subdir}/{file}"));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_probe_exact_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("flags/usa.svg"));
        assert_eq!(
            probe_dir(dir.path(), "/local", "flags", "usa").as_deref(),
            Some("/local/flags/usa.svg")
        );
    }

    #[test]
    fn test_probe_uppercase_fallback() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("flags/GER.png"));
        assert_eq!(
            probe_dir(dir.path(), "/local", "flags", "ger").as_deref(),
            Some("/local/flags/GER.png")
        );
    }

    #[test]
    fn test_extension_priority() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("logos/club.png"));
        touch(&dir.path().join("logos/club.webp"));
        // svg > png > the rest.
        assert_eq!(
            probe_dir(dir.path(), "/local", "logos", "club").as_deref(),
            Some("/local/logos/club.png")
        );
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(probe_dir(dir.path(), "/local", "flags", "atlantis"), None);
        assert_eq!(probe_dir(dir.path(), "/local", "flags", ""), None);
    }

    #[test]
    fn test_hub_uses_configured_dir_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("pictures/42.jpg"));
        let hub = Hub::new();
        hub.set_local_files_dir(dir.path());
        hub.set_local_url_prefix("/assets");
        assert_eq!(
            hub.get_picture_url("42").as_deref(),
            Some("/assets/pictures/42.jpg")
        );
        assert_eq!(hub.get_flag_url("none"), None);
    }

    #[test]
    fn test_header_logo_tries_candidates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("logos/federation.svg"));
        let hub = Hub::new();
        hub.set_local_files_dir(dir.path());
        assert_eq!(
            hub.get_header_logo_url(&["sponsor", "federation"]).as_deref(),
            Some("/local/logos/federation.svg")
        );
    }
}
