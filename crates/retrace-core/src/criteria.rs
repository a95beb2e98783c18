//! Classification criteria: pluggable rules mapping metadata values to
//! category keys, with per-value visibility toggles.
//!
//! A [`SortCriterion`] reads one `(category, key)` metadata address and
//! normalizes its values into canonical keys whose *string* ordering matches
//! the criterion's comparison mode. The acceptance universe — the ordered,
//! checkable list of observed values — is rebuilt through a three-phase scan
//! (`begin_scan` / `record_observation` / `end_scan`) that preserves user
//! toggles across rescans.
//!
//! Acceptance is fail-open: a value the criterion has never observed is
//! accepted, so unclassified data is never silently hidden.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::{CRITERION_STALE_SWEEP_CAP, NUMERIC_KEY_WIDTH, PHASE_KEY_WIDTH};
use crate::metadata::MetadataValue;

/// Offset added to numeric values before zero-padding, so negatives order
/// correctly as strings.
const NUMERIC_KEY_OFFSET: f64 = 1.0e12;

/// Acceptance strength: `Weak` asks only whether the value may appear at
/// all, `Strong` additionally requires its check toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Weak,
    Strong,
}

/// Comparison mode for a criterion's canonical keys and ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionOrdering {
    #[default]
    Lexical,
    Numeric,
    Chronological,
}

impl std::fmt::Display for CriterionOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Numeric => write!(f, "numeric"),
            Self::Chronological => write!(f, "chronological"),
        }
    }
}

impl std::str::FromStr for CriterionOrdering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "numeric" => Ok(Self::Numeric),
            "chronological" => Ok(Self::Chronological),
            other => Err(format!("Invalid criterion ordering: {other}")),
        }
    }
}

/// One observed value in the acceptance universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionEntry {
    /// Raw metadata text as first observed.
    pub raw: String,
    /// UI-facing formatted label.
    pub label: String,
    /// User toggle; new values default to checked.
    pub checked: bool,
    /// Side annotation (e.g. a document-share percentage).
    pub annotation: String,
    #[serde(skip)]
    seen: bool,
}

/// A named classification rule over one metadata address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortCriterion {
    /// Slot name ("sort", "color", "cluster", ...), used in logs and
    /// persistence.
    pub name: String,
    /// Metadata address this criterion reads.
    pub category: String,
    pub key: String,
    pub ordering: CriterionOrdering,
    pub ascending: bool,
    /// When set, this criterion *is* the time axis: positions come from tag
    /// times, not metadata.
    pub timeline_axis: bool,
    /// Optional `(start, len)` window applied to formatted labels, grouping
    /// values by a label substring.
    pub truncation: Option<(usize, usize)>,
    entries: BTreeMap<String, CriterionEntry>,
    #[serde(skip)]
    scanning: bool,
}

impl SortCriterion {
    pub fn new(name: impl Into<String>, ordering: CriterionOrdering) -> Self {
        Self {
            name: name.into(),
            ordering,
            ascending: true,
            ..Self::default()
        }
    }

    /// Point the criterion at a metadata address.
    pub fn with_key(mut self, category: impl Into<String>, key: impl Into<String>) -> Self {
        self.category = category.into();
        self.key = key.into();
        self
    }

    pub fn with_timeline_axis(mut self) -> Self {
        self.timeline_axis = true;
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// A criterion with no metadata key configured classifies nothing and
    /// accepts everything.
    pub fn is_active(&self) -> bool {
        !self.key.is_empty()
    }

    /// The metadata key this criterion matches on; empty when inactive.
    pub fn match_name(&self) -> &str {
        &self.key
    }

    // =========================================================================
    // CLASSIFICATION
    // =========================================================================

    /// Normalize a raw value into its canonical category key. String
    /// comparison of canonical keys reproduces the criterion's ordering.
    pub fn classify(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        match self.ordering {
            CriterionOrdering::Lexical => self.truncate(&trimmed.to_lowercase()),
            CriterionOrdering::Numeric => match trimmed.parse::<f64>() {
                Ok(v) => format!("{:0>width$.4}", v + NUMERIC_KEY_OFFSET, width = NUMERIC_KEY_WIDTH),
                Err(_) => self.truncate(&trimmed.to_lowercase()),
            },
            CriterionOrdering::Chronological => match MetadataValue::text(trimmed).as_datetime() {
                Some(dt) => format!("{:012}", dt.timestamp().max(0)),
                None => self.truncate(&trimmed.to_lowercase()),
            },
        }
    }

    /// UI-facing label for a raw value.
    pub fn format_label(&self, raw: &str) -> String {
        self.truncate(raw.trim())
    }

    fn truncate(&self, label: &str) -> String {
        match self.truncation {
            Some((start, len)) => label.chars().skip(start).take(len).collect(),
            None => label.to_string(),
        }
    }

    // =========================================================================
    // SCAN PROTOCOL
    // =========================================================================

    /// Start rebuilding the acceptance universe. Prior checked/unchecked
    /// state is retained for values observed again before `end_scan`.
    pub fn begin_scan(&mut self) {
        self.scanning = true;
        for entry in self.entries.values_mut() {
            entry.seen = false;
        }
    }

    /// Record one observed value. Unknown values auto-register, checked by
    /// default. A non-empty `label` refreshes the entry's display label.
    pub fn record_observation(&mut self, raw: &str, label: &str) {
        let canonical = self.classify(raw);
        if canonical.is_empty() {
            return;
        }
        let fallback = self.format_label(raw);
        let entry = self.entries.entry(canonical).or_insert_with(|| CriterionEntry {
            raw: raw.trim().to_string(),
            label: fallback,
            checked: true,
            annotation: String::new(),
            seen: false,
        });
        entry.seen = true;
        if !label.is_empty() {
            entry.label = self.truncation
                .map(|(start, len)| label.chars().skip(start).take(len).collect())
                .unwrap_or_else(|| label.to_string());
        }
    }

    /// Attach a side annotation (share percentage etc.) to a value's entry.
    pub fn annotate(&mut self, raw: &str, annotation: impl Into<String>) {
        let canonical = self.classify(raw);
        if let Some(entry) = self.entries.get_mut(&canonical) {
            entry.annotation = annotation.into();
        }
    }

    /// Finish a scan: sweep entries no longer observed, unless more than
    /// the sweep cap would be lost — a partial-data rescan must not wipe
    /// the user's toggle list. Returns the number of entries swept.
    pub fn end_scan(&mut self) -> usize {
        self.scanning = false;
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.seen)
            .map(|(k, _)| k.clone())
            .collect();
        if stale.len() > CRITERION_STALE_SWEEP_CAP {
            tracing::warn!(
                criterion = %self.name,
                stale = stale.len(),
                "refusing stale sweep over cap; keeping entries"
            );
            return 0;
        }
        for key in &stale {
            self.entries.remove(key);
        }
        if !stale.is_empty() {
            tracing::debug!(criterion = %self.name, stale_swept = stale.len(), "swept stale entries");
        }
        stale.len()
    }

    // =========================================================================
    // ACCEPTANCE
    // =========================================================================

    /// Whether a raw value passes this criterion's filter. Never-observed
    /// values are accepted at either strength (fail-open).
    pub fn is_acceptable(&self, strength: Acceptance, raw: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        match self.entries.get(&self.classify(raw)) {
            None => true,
            Some(entry) => match strength {
                Acceptance::Weak => true,
                Acceptance::Strong => entry.checked,
            },
        }
    }

    /// The registered formatted label for a value, falling back to the
    /// trimmed raw text when it was never observed.
    pub fn accepted_label(&self, raw: &str) -> String {
        self.entries
            .get(&self.classify(raw))
            .map(|e| e.label.clone())
            .unwrap_or_else(|| self.format_label(raw))
    }

    pub fn set_checked(&mut self, raw: &str, checked: bool) {
        let canonical = self.classify(raw);
        if let Some(entry) = self.entries.get_mut(&canonical) {
            entry.checked = checked;
        }
    }

    pub fn is_checked(&self, raw: &str) -> Option<bool> {
        self.entries.get(&self.classify(raw)).map(|e| e.checked)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries in the criterion's display order.
    pub fn entries_sorted(&self) -> Vec<(&str, &CriterionEntry)> {
        let mut out: Vec<(&str, &CriterionEntry)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.as_str(), e))
            .collect();
        if !self.ascending {
            out.reverse();
        }
        out
    }

    /// Re-insert a persisted entry (used by the store when reloading a
    /// project, bypassing the scan protocol).
    pub fn restore_entry(&mut self, raw: &str, label: &str, checked: bool) {
        let canonical = self.classify(raw);
        if canonical.is_empty() {
            return;
        }
        self.entries.insert(
            canonical,
            CriterionEntry {
                raw: raw.trim().to_string(),
                label: if label.is_empty() { self.format_label(raw) } else { label.to_string() },
                checked,
                annotation: String::new(),
                seen: false,
            },
        );
    }

    // =========================================================================
    // AXIS MAPPING
    // =========================================================================

    /// Horizontal-axis coordinate for a value. On the timeline axis this is
    /// the tag's own time; otherwise values map to their rank in the
    /// ordered acceptance list (categorical columns). Unknown values land
    /// after the last column.
    pub fn position_value(&self, raw: &str, fallback_time: f64) -> f64 {
        if self.timeline_axis {
            return fallback_time;
        }
        let canonical = self.classify(raw);
        let sorted = self.entries_sorted();
        sorted
            .iter()
            .position(|(k, _)| *k == canonical)
            .unwrap_or(sorted.len()) as f64
    }

    /// Horizontal-axis extent of a duration: real on the timeline axis,
    /// zero on categorical axes.
    pub fn duration_value(&self, duration: f64) -> f64 {
        if self.timeline_axis {
            duration
        } else {
            0.0
        }
    }
}

// =============================================================================
// PHASE SCHEDULE
// =============================================================================

/// One phase boundary: observations before `date` (and after the previous
/// boundary) belong to the phase it closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseBoundary {
    pub date: DateTime<Utc>,
    pub name: String,
    pub checked: bool,
}

/// Segments the project's date range into phases wherever the observed
/// date-time values of one metadata key jump by at least `day_gap` days
/// *and* `minute_gap` minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSchedule {
    /// Metadata address whose date values drive the segmentation.
    pub category: String,
    pub key: String,
    pub enabled: bool,
    pub day_gap: i64,
    pub minute_gap: i64,
    boundaries: Vec<PhaseBoundary>,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self {
            category: String::new(),
            key: String::new(),
            enabled: false,
            day_gap: 1,
            minute_gap: 60,
            boundaries: Vec::new(),
        }
    }
}

impl PhaseSchedule {
    pub fn new(category: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn boundaries(&self) -> &[PhaseBoundary] {
        &self.boundaries
    }

    /// Rebuild boundaries from the observed date values (any order).
    /// Checked toggles carry over for boundaries landing on the same date.
    pub fn rebuild(&mut self, observations: &[DateTime<Utc>]) {
        let previous: Vec<PhaseBoundary> = std::mem::take(&mut self.boundaries);
        if observations.is_empty() {
            return;
        }
        let mut dates = observations.to_vec();
        dates.sort();

        let mut last = dates[0];
        for date in dates.iter().skip(1) {
            let gap = *date - last;
            if gap.num_days() >= self.day_gap && gap.num_minutes() >= self.minute_gap {
                self.push_boundary(*date, &previous);
            }
            last = *date;
        }
        // Trailing boundary just past the newest observation, so every
        // observed value falls before some boundary.
        self.push_boundary(last + chrono::Duration::seconds(1), &previous);
    }

    fn push_boundary(&mut self, date: DateTime<Utc>, previous: &[PhaseBoundary]) {
        let index = self.boundaries.len();
        let carried = previous.iter().find(|b| b.date == date);
        self.boundaries.push(PhaseBoundary {
            date,
            name: carried
                .map(|b| b.name.clone())
                .unwrap_or_else(|| format!("{}-{}", self.key, index + 1)),
            checked: carried.map(|b| b.checked).unwrap_or(true),
        });
    }

    /// Zero-padded rank key of the phase a date value falls into; empty for
    /// non-dates or a disabled/empty schedule (callers fall back to the
    /// groupe criterion key).
    pub fn phase_for(&self, value: &MetadataValue) -> String {
        if !self.enabled || self.boundaries.is_empty() {
            return String::new();
        }
        let Some(date) = value.as_datetime() else {
            return String::new();
        };
        let rank = self
            .boundaries
            .iter()
            .position(|b| date < b.date)
            .unwrap_or(self.boundaries.len() - 1);
        format!("{:0width$}", rank, width = PHASE_KEY_WIDTH)
    }

    /// Checked state of the phase owning a date value; fail-open for
    /// non-dates and out-of-range values.
    pub fn is_acceptable(&self, value: &MetadataValue) -> bool {
        if !self.enabled {
            return true;
        }
        match value.as_datetime() {
            None => true,
            Some(date) => self
                .boundaries
                .iter()
                .find(|b| date < b.date)
                .map(|b| b.checked)
                .unwrap_or(true),
        }
    }

    /// Human-readable name for a phase rank key.
    pub fn verbose_name(&self, phase_key: &str) -> String {
        phase_key
            .parse::<usize>()
            .ok()
            .and_then(|i| self.boundaries.get(i))
            .map(|b| b.name.clone())
            .unwrap_or_default()
    }

    pub fn set_phase_checked(&mut self, index: usize, checked: bool) {
        if let Some(boundary) = self.boundaries.get_mut(index) {
            boundary.checked = checked;
        }
    }

    /// Re-append a persisted boundary (used by the store when reloading a
    /// project, bypassing `rebuild`).
    pub fn restore_boundary(&mut self, date: DateTime<Utc>, name: &str, checked: bool) {
        self.boundaries.push(PhaseBoundary {
            date,
            name: name.to_string(),
            checked,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> DateTime<Utc> {
        MetadataValue::text(s).as_datetime().unwrap()
    }

    #[test]
    fn test_classify_lexical_normalizes() {
        let c = SortCriterion::new("sort", CriterionOrdering::Lexical).with_key("File", "Type");
        assert_eq!(c.classify("  Video "), "video");
        // Idempotent: classifying the canonical key yields itself.
        assert_eq!(c.classify("video"), "video");
    }

    #[test]
    fn test_classify_numeric_orders_as_strings() {
        let c = SortCriterion::new("sort", CriterionOrdering::Numeric).with_key("File", "Size");
        let keys: Vec<String> = ["-5", "-2", "0", "3.5", "10", "200"]
            .iter()
            .map(|v| c.classify(v))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "canonical keys must sort like the numbers");
    }

    #[test]
    fn test_classify_chronological() {
        let c = SortCriterion::new("sort", CriterionOrdering::Chronological).with_key("R", "Date");
        let a = c.classify("2014-01-02 10:00:00");
        let b = c.classify("2014-01-02 11:00:00");
        assert!(a < b);
        // Non-date input falls back to lexical instead of erroring.
        assert_eq!(c.classify("Draft"), "draft");
    }

    #[test]
    fn test_truncation_window_groups_by_substring() {
        let mut c = SortCriterion::new("sort", CriterionOrdering::Lexical).with_key("F", "Name");
        c.truncation = Some((0, 1));
        assert_eq!(c.classify("Banana"), "b");
        assert_eq!(c.classify("berry"), "b");
    }

    #[test]
    fn test_scan_preserves_checked_state() {
        let mut c = SortCriterion::new("filter", CriterionOrdering::Lexical).with_key("F", "Type");
        c.begin_scan();
        c.record_observation("Video", "Video");
        c.record_observation("Audio", "Audio");
        c.end_scan();
        c.set_checked("Video", false);

        c.begin_scan();
        c.record_observation("Video", "Video");
        c.record_observation("Image", "Image");
        c.end_scan();

        assert_eq!(c.is_checked("Video"), Some(false), "toggle survives rescan");
        assert_eq!(c.is_checked("Image"), Some(true), "new values default checked");
        assert_eq!(c.is_checked("Audio"), None, "stale entry swept");
    }

    #[test]
    fn test_stale_sweep_cap() {
        let mut c = SortCriterion::new("filter", CriterionOrdering::Lexical).with_key("F", "T");
        c.begin_scan();
        for i in 0..(CRITERION_STALE_SWEEP_CAP + 10) {
            c.record_observation(&format!("value-{i}"), "");
        }
        c.end_scan();

        // A rescan that sees nothing would drop everything; the cap blocks it.
        c.begin_scan();
        let swept = c.end_scan();
        assert_eq!(swept, 0);
        assert_eq!(c.entry_count(), CRITERION_STALE_SWEEP_CAP + 10);
    }

    #[test]
    fn test_acceptance_fail_open() {
        let mut c = SortCriterion::new("sort", CriterionOrdering::Lexical).with_key("F", "T");
        assert!(c.is_acceptable(Acceptance::Strong, "never seen"));

        c.begin_scan();
        c.record_observation("video", "");
        c.end_scan();
        c.set_checked("video", false);
        assert!(c.is_acceptable(Acceptance::Weak, "video"));
        assert!(!c.is_acceptable(Acceptance::Strong, "video"));
    }

    #[test]
    fn test_inactive_criterion_accepts_everything() {
        let c = SortCriterion::new("cluster", CriterionOrdering::Lexical);
        assert!(!c.is_active());
        assert!(c.is_acceptable(Acceptance::Strong, "anything"));
    }

    #[test]
    fn test_position_value_ranks() {
        let mut c = SortCriterion::new("horizontal", CriterionOrdering::Lexical).with_key("F", "T");
        c.begin_scan();
        c.record_observation("alpha", "");
        c.record_observation("beta", "");
        c.end_scan();
        assert_eq!(c.position_value("alpha", 99.0), 0.0);
        assert_eq!(c.position_value("beta", 99.0), 1.0);
        assert_eq!(c.position_value("zeta", 99.0), 2.0);
        assert_eq!(c.duration_value(7.0), 0.0);

        let axis = SortCriterion::new("horizontal", CriterionOrdering::Lexical)
            .with_key("F", "T")
            .with_timeline_axis();
        assert_eq!(axis.position_value("alpha", 99.0), 99.0);
        assert_eq!(axis.duration_value(7.0), 7.0);
    }

    #[test]
    fn test_phase_schedule_boundaries() {
        let mut phases = PhaseSchedule::new("Retrace", "Date/Time");
        phases.day_gap = 1;
        phases.minute_gap = 60;
        phases.rebuild(&[
            date("2014-01-01 10:00:00"),
            date("2014-01-01 10:30:00"), // same session: below both gaps
            date("2014-01-05 09:00:00"), // new phase
            date("2014-01-09 09:00:00"), // new phase
        ]);
        assert_eq!(phases.boundaries().len(), 3);

        assert_eq!(phases.phase_for(&MetadataValue::text("2014-01-01 10:15:00")), "0000");
        assert_eq!(phases.phase_for(&MetadataValue::text("2014-01-05 12:00:00")), "0001");
        assert_eq!(phases.phase_for(&MetadataValue::text("2014-01-09 09:00:00")), "0002");
        // Beyond the last boundary: last phase.
        assert_eq!(phases.phase_for(&MetadataValue::text("2019-01-01 00:00:00")), "0002");
        // Non-date: empty key, caller falls back.
        assert_eq!(phases.phase_for(&MetadataValue::text("not a date")), "");
    }

    #[test]
    fn test_phase_toggle_survives_rebuild() {
        let mut phases = PhaseSchedule::new("Retrace", "Date/Time");
        let obs = [date("2014-01-01 10:00:00"), date("2014-01-05 09:00:00")];
        phases.rebuild(&obs);
        phases.set_phase_checked(0, false);
        phases.rebuild(&obs);
        assert!(!phases.boundaries()[0].checked);
        assert!(!phases.is_acceptable(&MetadataValue::text("2014-01-03 00:00:00")));
    }

    #[test]
    fn test_phase_keys_sort_chronologically() {
        let ts = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        let mut phases = PhaseSchedule::new("Retrace", "Date/Time");
        let obs: Vec<_> = (0..12).map(|i| ts + chrono::Duration::days(i * 3)).collect();
        phases.rebuild(&obs);
        let keys: Vec<String> = (0..phases.boundaries().len())
            .map(|i| format!("{:04}", i))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
