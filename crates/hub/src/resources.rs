//! Resource ZIP extraction.
//!
//! Binary frames carry archives of flags, logos, athlete pictures, or the
//! translations bundle. Image archives expand into the fixed subdirectory
//! layout under the local files directory; the hub never serves the files
//! itself, it only keeps the directory current and hands out URLs.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use serde_json::Value;
use zip::ZipArchive;

use crate::error::{HubError, Result};

/// The fixed layout consumers can rely on under the local files directory.
pub const SUBDIRS: &[&str] = &["flags", "logos", "pictures", "styles"];

pub fn ensure_layout(dir: &Path) -> std::io::Result<()> {
    for sub in SUBDIRS {
        fs::create_dir_all(dir.join(sub))?;
    }
    Ok(())
}

/// Expands an archive into `<dir>/<subdir>/`, entry by entry. Each file is
/// written beside its destination and renamed into place, so readers never
/// observe a half-written file. Entries that escape the target directory
/// are skipped without comment; the producer is trusted, the filesystem is
/// not negotiable.
pub(crate) fn extract_archive(dir: &Path, subdir: &str, bytes: &[u8]) -> Result<usize> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let target = dir.join(subdir);
    fs::create_dir_all(&target)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let dest = target.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tmp_name.push_str(".part");
        let tmp = dest.with_file_name(format!(".{tmp_name}"));

        let mut out = fs::File::create(&tmp)?;
        std::io::copy(&mut entry, &mut out)?;
        fs::rename(&tmp, &dest)?;
        written += 1;
    }
    Ok(written)
}

/// Parsed `translations.json` payload, either wrapper shape.
pub(crate) struct TranslationsPayload {
    pub locales: BTreeMap<String, BTreeMap<String, String>>,
    pub checksum: Option<String>,
}

/// Reads the single `translations.json` entry out of a translations
/// archive. Accepts the `{locales: {...}, translationsChecksum}` wrapper
/// and the bare `{locale: {...}}` map.
pub(crate) fn read_translations_archive(bytes: &[u8]) -> Result<TranslationsPayload> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive
        .by_name("translations.json")
        .map_err(|_| HubError::MissingTranslations)?;
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    let value: Value = serde_json::from_str(&text)?;

    let (locales_value, checksum) = match value.get("locales") {
        Some(locales) if locales.is_object() => (
            locales,
            value
                .get("translationsChecksum")
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        _ => (&value, None),
    };

    let mut locales = BTreeMap::new();
    if let Some(map) = locales_value.as_object() {
        for (locale, entries) in map {
            let Some(entries) = entries.as_object() else {
                continue;
            };
            let mut translated = BTreeMap::new();
            for (key, text) in entries {
                match text {
                    Value::String(s) => {
                        translated.insert(key.clone(), s.clone());
                    }
                    Value::Number(n) => {
                        translated.insert(key.clone(), n.to_string());
                    }
                    _ => {}
                }
            }
            locales.insert(locale.clone(), translated);
        }
    }

    Ok(TranslationsPayload { locales, checksum })
}

/// Reads the `competition.json` snapshot out of a database archive.
pub(crate) fn read_database_archive(bytes: &[u8]) -> Result<Value> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name("competition.json")?;
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Builds an in-memory ZIP from `(name, contents)` pairs.
    pub fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::archive;
    use super::*;

    #[test]
    fn test_extract_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = archive(&[("usa.svg", b"<svg/>"), ("sub/ger.svg", b"<svg/>")]);
        let written = extract_archive(dir.path(), "flags", &bytes).unwrap();
        assert_eq!(written, 2);
        assert!(dir.path().join("flags/usa.svg").exists());
        assert!(dir.path().join("flags/sub/ger.svg").exists());
        // No temp files left behind.
        assert!(!dir.path().join("flags/.usa.svg.part").exists());
    }

    #[test]
    fn test_extract_rejects_traversal_silently() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = archive(&[("../evil.txt", b"nope"), ("ok.txt", b"fine")]);
        let written = extract_archive(dir.path(), "flags", &bytes).unwrap();
        assert_eq!(written, 1);
        assert!(dir.path().join("flags/ok.txt").exists());
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_extract_malformed_archive_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_archive(dir.path(), "flags", b"not a zip at all");
        assert!(matches!(result, Err(HubError::Archive(_))));
    }

    #[test]
    fn test_translations_wrapper_shape() {
        let json = br#"{"locales":{"en":{"Snatch":"Snatch"}},"translationsChecksum":"abc"}"#;
        let bytes = archive(&[("translations.json", json)]);
        let payload = read_translations_archive(&bytes).unwrap();
        assert_eq!(payload.checksum.as_deref(), Some("abc"));
        assert_eq!(payload.locales["en"]["Snatch"], "Snatch");
    }

    #[test]
    fn test_translations_direct_shape() {
        let json = b"{\"en\":{\"Snatch\":\"Snatch\"},\"de\":{\"Snatch\":\"Rei\xc3\x9fen\"}}";
        let bytes = archive(&[("translations.json", json)]);
        let payload = read_translations_archive(&bytes).unwrap();
        assert_eq!(payload.checksum, None);
        assert_eq!(payload.locales.len(), 2);
    }

    #[test]
    fn test_translations_missing_entry() {
        let bytes = archive(&[("something_else.json", b"{}")]);
        assert!(matches!(
            read_translations_archive(&bytes),
            Err(HubError::MissingTranslations)
        ));
    }

    #[test]
    fn test_database_archive() {
        let bytes = archive(&[("competition.json", br#"{"athletes":[]}"#)]);
        let value = read_database_archive(&bytes).unwrap();
        assert!(value.get("athletes").is_some());
    }
}
