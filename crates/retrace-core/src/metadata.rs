//! Versioned key/value metadata storage.
//!
//! Every document carries a [`MetadataStore`]: an append-only sequence of
//! immutable [`MetadataVersion`] snapshots, oldest first. Values are stored
//! as text and interpreted on read as string, number, or date-time.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date-time text forms accepted by [`MetadataValue::as_datetime`], tried in
/// order. The colon-separated date is the EXIF convention.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y:%m:%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d",
];

/// A metadata value: raw text interpretable as string, number, or date-time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataValue(String);

impl MetadataValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn number(value: f64) -> Self {
        Self(format!("{value}"))
    }

    pub fn datetime(value: DateTime<Utc>) -> Self {
        Self(value.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Interpret as a real number, if the text parses as one.
    pub fn as_number(&self) -> Option<f64> {
        self.0.trim().parse::<f64>().ok()
    }

    /// Interpret as a UTC date-time, accepting ISO-8601 and the EXIF
    /// colon-separated form.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(dt.and_utc());
            }
            if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, fmt) {
                return Some(d.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc());
            }
        }
        None
    }

    pub fn is_date(&self) -> bool {
        self.as_datetime().is_some()
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One immutable snapshot: `(category, key) → value`, ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataVersion {
    entries: BTreeMap<String, BTreeMap<String, MetadataValue>>,
}

impl MetadataVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&MetadataValue> {
        self.entries.get(category).and_then(|keys| keys.get(key))
    }

    pub fn set(&mut self, category: &str, key: &str, value: MetadataValue) {
        self.entries
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered iteration over `(category, key, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &MetadataValue)> {
        self.entries.iter().flat_map(|(category, keys)| {
            keys.iter()
                .map(move |(key, value)| (category.as_str(), key.as_str(), value))
        })
    }
}

/// Reference to a metadata version: a fixed index or the floating latest.
///
/// `Latest` re-resolves as new versions are appended, which is how a tag can
/// follow a document's newest snapshot. Resolution never yields an index
/// outside the stored range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VersionRef {
    #[default]
    Latest,
    At(usize),
}

impl VersionRef {
    /// Wire form: `Latest` is `-1`, `At(i)` is `i`.
    pub fn as_raw(&self) -> i64 {
        match self {
            VersionRef::Latest => -1,
            VersionRef::At(i) => *i as i64,
        }
    }

    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            VersionRef::Latest
        } else {
            VersionRef::At(raw as usize)
        }
    }
}

/// A document's versioned metadata: append-only snapshots, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataStore {
    versions: Vec<MetadataVersion>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Resolve a reference to a concrete index. `Latest` and out-of-range
    /// indices clamp to the newest version. `None` only when no version
    /// exists yet.
    pub fn resolve(&self, version: VersionRef) -> Option<usize> {
        let last = self.versions.len().checked_sub(1)?;
        Some(match version {
            VersionRef::Latest => last,
            VersionRef::At(i) => i.min(last),
        })
    }

    pub fn version(&self, version: VersionRef) -> Option<&MetadataVersion> {
        self.resolve(version).map(|i| &self.versions[i])
    }

    pub fn versions(&self) -> &[MetadataVersion] {
        &self.versions
    }

    /// Append a snapshot; returns its index.
    pub fn push_version(&mut self, version: MetadataVersion) -> usize {
        self.versions.push(version);
        self.versions.len() - 1
    }

    pub fn get(&self, category: &str, key: &str, version: VersionRef) -> Option<&MetadataValue> {
        self.version(version).and_then(|v| v.get(category, key))
    }

    /// Write into an existing version (clamped resolution). No-op while the
    /// store is empty; snapshots are created with [`push_version`].
    ///
    /// [`push_version`]: MetadataStore::push_version
    pub fn set(&mut self, category: &str, key: &str, value: MetadataValue, version: VersionRef) {
        if let Some(i) = self.resolve(version) {
            self.versions[i].set(category, key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_interpretations() {
        assert_eq!(MetadataValue::text("  42.5 ").as_number(), Some(42.5));
        assert_eq!(MetadataValue::text("n/a").as_number(), None);

        let v = MetadataValue::text("2014:03:02 10:20:30");
        let dt = v.as_datetime().expect("exif form parses");
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2014-03-02");
        assert!(v.is_date());
        assert!(!MetadataValue::text("next tuesday").is_date());
    }

    #[test]
    fn test_number_constructor_trims_integral() {
        assert_eq!(MetadataValue::number(3.0).as_str(), "3");
        assert_eq!(MetadataValue::number(3.25).as_str(), "3.25");
    }

    #[test]
    fn test_datetime_roundtrip() {
        let dt = MetadataValue::text("2020-06-01 08:00:00").as_datetime().unwrap();
        assert_eq!(MetadataValue::datetime(dt).as_datetime(), Some(dt));
    }

    #[test]
    fn test_version_resolution_clamps() {
        let mut store = MetadataStore::new();
        assert_eq!(store.resolve(VersionRef::Latest), None);

        store.push_version(MetadataVersion::new());
        store.push_version(MetadataVersion::new());
        assert_eq!(store.resolve(VersionRef::Latest), Some(1));
        assert_eq!(store.resolve(VersionRef::At(0)), Some(0));
        assert_eq!(store.resolve(VersionRef::At(99)), Some(1));
    }

    #[test]
    fn test_versions_are_independent_snapshots() {
        let mut store = MetadataStore::new();
        let mut v0 = MetadataVersion::new();
        v0.set("File", "Author", MetadataValue::text("ada"));
        store.push_version(v0);
        store.push_version(MetadataVersion::new());

        assert_eq!(
            store.get("File", "Author", VersionRef::At(0)).map(MetadataValue::as_str),
            Some("ada")
        );
        assert_eq!(store.get("File", "Author", VersionRef::Latest), None);
    }

    #[test]
    fn test_version_ref_raw() {
        assert_eq!(VersionRef::Latest.as_raw(), -1);
        assert_eq!(VersionRef::from_raw(-1), VersionRef::Latest);
        assert_eq!(VersionRef::from_raw(2), VersionRef::At(2));
    }
}
