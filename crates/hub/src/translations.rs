//! Per-locale translation maps with base-locale fallback.
//!
//! Regional locales (`fr-CA`) store the union of their base language and
//! their own overrides, so lookups are a single map fetch. When a base
//! language arrives after its regionals, the stored regionals are rebuilt
//! against the new base.

use std::collections::{BTreeMap, HashMap};

/// The entity table upstream bundles actually use. Values are decoded once
/// at write time; lookups never touch them again.
const ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("#39", "'"),
    ("nbsp", "\u{00A0}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("copy", "\u{00A9}"),
    ("reg", "\u{00AE}"),
    ("trade", "\u{2122}"),
];

#[derive(Debug, Clone, Default)]
pub struct TranslationStore {
    locales: HashMap<String, BTreeMap<String, String>>,
    checksum: Option<String>,
}

impl TranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an incoming bundle checksum matches the one already merged.
    pub fn is_duplicate(&self, checksum: &str) -> bool {
        self.checksum.as_deref() == Some(checksum)
    }

    pub fn set_checksum(&mut self, checksum: Option<String>) {
        self.checksum = checksum;
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    pub fn clear(&mut self) {
        self.locales.clear();
        self.checksum = None;
    }

    pub fn locales(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locales.keys().cloned().collect();
        names.sort();
        names
    }

    /// Merges one `(locale, map)` pair. All values are entity-decoded here.
    pub fn insert_locale(&mut self, locale: &str, map: &BTreeMap<String, String>) {
        let decoded: BTreeMap<String, String> = map
            .iter()
            .map(|(k, v)| (k.clone(), decode_entities(v)))
            .collect();

        if let Some(base) = base_of(locale) {
            // Regional: layer the overrides on the stored base, if any.
            let mut merged = self.locales.get(base).cloned().unwrap_or_default();
            merged.extend(decoded);
            self.locales.insert(locale.to_string(), merged);
        } else {
            // Base language: replace, then rebuild every stored regional
            // of this language on top of the new base.
            let regionals: Vec<String> = self
                .locales
                .keys()
                .filter(|l| base_of(l) == Some(locale))
                .cloned()
                .collect();
            for regional in regionals {
                let overrides = self.locales.get(&regional).cloned().unwrap_or_default();
                let mut merged = decoded.clone();
                merged.extend(overrides);
                self.locales.insert(regional, merged);
            }
            self.locales.insert(locale.to_string(), decoded);
        }
    }

    /// Lookup with the `lang-REGION → lang → en → {}` fallback chain.
    pub fn get(&self, locale: &str) -> BTreeMap<String, String> {
        if let Some(map) = self.locales.get(locale) {
            return map.clone();
        }
        if let Some(base) = base_of(locale) {
            if let Some(map) = self.locales.get(base) {
                return map.clone();
            }
        }
        self.locales.get("en").cloned().unwrap_or_default()
    }
}

fn base_of(locale: &str) -> Option<&str> {
    locale.split_once('-').map(|(base, _)| base)
}

/// Single-pass decode of the fixed entity table. Unknown entities pass
/// through untouched, so already-decoded text is a fixed point.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) => match ENTITIES.iter().find(|(name, _)| *name == &after[..end]) {
                Some((_, decoded)) => {
                    out.push_str(decoded);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = after;
                }
            },
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
