//! Documents: corpus items (files or synthetic entries) carrying versioned
//! metadata and owning their tags.
//!
//! A document exclusively owns its [`Tag`] arena; everything else refers to
//! tags through [`TagHandle`]s, so there are no owner back-pointers to keep
//! alive.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::color::Rgba;
use crate::criteria::SortCriterion;
use crate::defaults::{
    SUFFIXES_AUDIO, SUFFIXES_DOC, SUFFIXES_IMAGE, SUFFIXES_PEOPLE, SUFFIXES_VIDEO,
};
use crate::error::Result;
use crate::metadata::{MetadataStore, MetadataValue, MetadataVersion, VersionRef};
use crate::person::PersonCard;
use crate::tag::{Tag, TagKind};

/// Metadata category owned by the application itself.
pub const META_APP: &str = "Retrace";
/// Metadata category for file-level facts.
pub const META_FILE: &str = "File";

/// What a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    File,
    Video,
    Audio,
    Image,
    Doc,
    Marker,
    People,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Doc => "doc",
            Self::Marker => "marker",
            Self::People => "people",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "image" => Ok(Self::Image),
            "doc" => Ok(Self::Doc),
            "marker" => Ok(Self::Marker),
            "people" => Ok(Self::People),
            other => Err(format!("Invalid document type: {other}")),
        }
    }
}

static SUFFIX_TYPES: Lazy<HashMap<&'static str, DocumentType>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for s in SUFFIXES_VIDEO {
        map.insert(*s, DocumentType::Video);
    }
    for s in SUFFIXES_AUDIO {
        map.insert(*s, DocumentType::Audio);
    }
    for s in SUFFIXES_IMAGE {
        map.insert(*s, DocumentType::Image);
    }
    for s in SUFFIXES_DOC {
        map.insert(*s, DocumentType::Doc);
    }
    for s in SUFFIXES_PEOPLE {
        map.insert(*s, DocumentType::People);
    }
    map
});

impl DocumentType {
    /// Classify by file suffix; unknown suffixes are plain files.
    pub fn from_extension(ext: &str) -> Self {
        SUFFIX_TYPES
            .get(ext.to_lowercase().as_str())
            .copied()
            .unwrap_or(DocumentType::File)
    }
}

/// How a document's tags are grouped and drawn: contextual annotations or
/// rendered media placed on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFunction {
    #[default]
    Contextual,
    Render,
}

impl std::fmt::Display for DocumentFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contextual => write!(f, "contextual"),
            Self::Render => write!(f, "render"),
        }
    }
}

impl std::str::FromStr for DocumentFunction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contextual" => Ok(Self::Contextual),
            "render" => Ok(Self::Render),
            other => Err(format!("Invalid document function: {other}")),
        }
    }
}

/// Extraction pipeline status. A document participates fully in the index
/// once `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Waiting,
    Processing,
    Ready,
}

/// Document identity: a file path, or a synthetic id for imports, notes,
/// and markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKey {
    Path(PathBuf),
    Synthetic(Uuid),
}

impl DocumentKey {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn synthetic() -> Self {
        Self::Synthetic(Uuid::new_v4())
    }

    pub fn label(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Synthetic(id) => id.to_string(),
        }
    }
}

/// A corpus item: identity, classification, versioned metadata, and tags.
#[derive(Debug, Clone)]
pub struct Document {
    pub key: DocumentKey,
    pub function: DocumentFunction,
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub metadata: MetadataStore,
    /// Seconds of underlying media; `<= 0` means unknown.
    pub media_duration: f64,
    /// Assigned by the color pass each rebuild.
    pub base_color: Rgba,
    pub tags: Vec<Tag>,
}

impl Document {
    pub fn new(key: DocumentKey) -> Self {
        Self {
            key,
            function: DocumentFunction::Contextual,
            doc_type: DocumentType::File,
            status: DocumentStatus::Waiting,
            metadata: MetadataStore::new(),
            media_duration: 0.0,
            base_color: Rgba::default(),
            tags: Vec::new(),
        }
    }

    /// A document for an on-disk file: type from the suffix, render
    /// function for playable media.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(DocumentType::from_extension)
            .unwrap_or_default();
        let mut doc = Self::new(DocumentKey::Path(path));
        doc.doc_type = doc_type;
        doc.function = match doc_type {
            DocumentType::Video | DocumentType::Audio | DocumentType::Image => {
                DocumentFunction::Render
            }
            _ => DocumentFunction::Contextual,
        };
        doc
    }

    /// A synthetic marker document.
    pub fn marker(name: &str, now: DateTime<Utc>) -> Self {
        let mut doc = Self::new(DocumentKey::synthetic());
        doc.doc_type = DocumentType::Marker;
        doc.status = DocumentStatus::Ready;
        doc.update_import(name, now);
        doc
    }

    // =========================================================================
    // VERSION APPENDERS
    // =========================================================================

    /// Append a metadata version for the file's current state. Heavy
    /// extraction (duration, thumbnails, hashes) arrives later through the
    /// probe; this stamps identity facts only. Returns the version index.
    pub fn update_file(&mut self, now: DateTime<Utc>) -> usize {
        let mut version = MetadataVersion::new();
        if let DocumentKey::Path(path) = &self.key {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                version.set(META_FILE, "File Name", MetadataValue::text(name));
            }
            if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
                version.set(META_APP, "Name", MetadataValue::text(stem));
            }
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                version.set(META_FILE, "Extension", MetadataValue::text(ext.to_lowercase()));
            }
            if let Some(folder) = path.parent() {
                version.set(META_APP, "Folder", MetadataValue::text(folder.display().to_string()));
            }
        }
        version.set(META_APP, "Type", MetadataValue::text(self.doc_type.to_string()));
        version.set(META_APP, "Date/Time", MetadataValue::datetime(now));
        self.metadata.push_version(version)
    }

    /// Append a version for a synthetic import (note, marker, feed item).
    pub fn update_import(&mut self, name: &str, now: DateTime<Utc>) -> usize {
        let mut version = MetadataVersion::new();
        version.set(META_APP, "Name", MetadataValue::text(name));
        version.set(META_APP, "Type", MetadataValue::text(self.doc_type.to_string()));
        version.set(META_APP, "Date/Time", MetadataValue::datetime(now));
        version.set(META_APP, "Import Date/Time", MetadataValue::datetime(now));
        self.metadata.push_version(version)
    }

    /// Append a version from a people card.
    pub fn update_card(&mut self, card: &PersonCard, now: DateTime<Utc>) -> usize {
        self.doc_type = DocumentType::People;
        let mut version = MetadataVersion::new();
        version.set(META_APP, "Name", MetadataValue::text(card.full_name()));
        version.set(META_APP, "Type", MetadataValue::text(self.doc_type.to_string()));
        version.set(META_APP, "Date/Time", MetadataValue::datetime(now));
        for (section, values) in card.iter() {
            if values.is_empty() {
                continue;
            }
            version.set("People", &section.label(), MetadataValue::text(values.join("; ")));
        }
        self.metadata.push_version(version)
    }

    /// Merge keywords into a version's `Keywords` entry, skipping ones
    /// already present.
    pub fn add_keywords(&mut self, keywords: &[&str], version: VersionRef) {
        let existing = self
            .metadata
            .get(META_APP, "Keywords", version)
            .map(|v| v.as_str().to_string())
            .unwrap_or_default();
        let mut all: Vec<String> = existing
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        for keyword in keywords {
            let keyword = keyword.trim();
            if !keyword.is_empty() && !all.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
                all.push(keyword.to_string());
            }
        }
        self.metadata
            .set(META_APP, "Keywords", MetadataValue::text(all.join(", ")), version);
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn name(&self, version: VersionRef) -> String {
        self.metadata
            .get(META_APP, "Name", version)
            .or_else(|| self.metadata.get(META_FILE, "File Name", version))
            .map(|v| v.as_str().to_string())
            .unwrap_or_else(|| self.key.label())
    }

    pub fn author(&self, version: VersionRef) -> String {
        self.metadata
            .get(META_APP, "Author", version)
            .map(|v| v.as_str().to_string())
            .unwrap_or_default()
    }

    pub fn content_hash(&self, version: VersionRef) -> String {
        self.metadata
            .get(META_FILE, "Hash", version)
            .map(|v| v.as_str().to_string())
            .unwrap_or_default()
    }

    /// Raw metadata text at a criterion's address; empty when absent.
    pub fn criteria_value(&self, criterion: &SortCriterion, version: VersionRef) -> String {
        if !criterion.is_active() {
            return String::new();
        }
        self.metadata
            .get(&criterion.category, &criterion.key, version)
            .map(|v| v.as_str().to_string())
            .unwrap_or_default()
    }

    /// Whether a tag references this document's newest version.
    pub fn is_tag_latest(&self, tag: &Tag) -> bool {
        match tag.version() {
            VersionRef::Latest => true,
            v => self.metadata.resolve(v) == self.metadata.resolve(VersionRef::Latest),
        }
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    /// Create a tag pinned to the current newest version. Interval tags get
    /// the given duration. Returns the tag's index in the arena.
    pub fn create_tag(&mut self, kind: TagKind, at: f64, duration: f64) -> usize {
        let version = match self.metadata.resolve(VersionRef::Latest) {
            Some(i) => VersionRef::At(i),
            None => VersionRef::Latest,
        };
        let mut tag = Tag::new(version);
        tag.set_kind(kind, Some(at));
        if kind == TagKind::Interval {
            tag.set_time_end(at + duration, self.media_duration);
        }
        self.tags.push(tag);
        self.tags.len() - 1
    }

    pub fn remove_tag(&mut self, index: usize) {
        if index < self.tags.len() {
            self.tags.remove(index);
        }
    }
}

/// SHA-256 content hash of a file, uppercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 3, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_type_from_extension() {
        assert_eq!(DocumentType::from_extension("MOV"), DocumentType::Video);
        assert_eq!(DocumentType::from_extension("wav"), DocumentType::Audio);
        assert_eq!(DocumentType::from_extension("vcf"), DocumentType::People);
        assert_eq!(DocumentType::from_extension("xyz"), DocumentType::File);
    }

    #[test]
    fn test_from_path_sets_render_function() {
        let video = Document::from_path("/corpus/take1.mov");
        assert_eq!(video.doc_type, DocumentType::Video);
        assert_eq!(video.function, DocumentFunction::Render);

        let note = Document::from_path("/corpus/notes.txt");
        assert_eq!(note.doc_type, DocumentType::Doc);
        assert_eq!(note.function, DocumentFunction::Contextual);
    }

    #[test]
    fn test_update_file_stamps_identity() {
        let mut doc = Document::from_path("/corpus/scene/take1.mov");
        let v = doc.update_file(now());
        assert_eq!(v, 0);
        assert_eq!(doc.name(VersionRef::At(0)), "take1");
        assert_eq!(
            doc.metadata
                .get(META_FILE, "Extension", VersionRef::At(0))
                .map(MetadataValue::as_str),
            Some("mov")
        );
    }

    #[test]
    fn test_import_and_marker() {
        let doc = Document::marker("Marker #1", now());
        assert_eq!(doc.doc_type, DocumentType::Marker);
        assert_eq!(doc.name(VersionRef::Latest), "Marker #1");
        assert!(matches!(doc.key, DocumentKey::Synthetic(_)));
    }

    #[test]
    fn test_card_version() {
        let mut card = PersonCard::new();
        card.push(
            crate::person::CardSection::from_parts(&["n"]),
            vec!["Lovelace".into(), "Ada".into()],
        );
        let mut doc = Document::new(DocumentKey::synthetic());
        doc.update_card(&card, now());
        assert_eq!(doc.name(VersionRef::Latest), "Ada Lovelace");
        assert_eq!(doc.doc_type, DocumentType::People);
    }

    #[test]
    fn test_add_keywords_dedups() {
        let mut doc = Document::marker("m", now());
        doc.add_keywords(&["rehearsal", "lighting"], VersionRef::Latest);
        doc.add_keywords(&["Lighting", "sound"], VersionRef::Latest);
        assert_eq!(
            doc.metadata
                .get(META_APP, "Keywords", VersionRef::Latest)
                .map(MetadataValue::as_str),
            Some("rehearsal, lighting, sound")
        );
    }

    #[test]
    fn test_create_tag_pins_version() {
        let mut doc = Document::from_path("/corpus/a.txt");
        doc.update_file(now());
        doc.update_file(now());
        let idx = doc.create_tag(TagKind::Global, 0.0, 0.0);
        assert_eq!(doc.tags[idx].version(), VersionRef::At(1));
        assert!(doc.is_tag_latest(&doc.tags[idx]));

        doc.update_file(now());
        assert!(!doc.is_tag_latest(&doc.tags[idx]));
    }

    #[test]
    fn test_criteria_value_reads_configured_address() {
        use crate::criteria::CriterionOrdering;
        let mut doc = Document::marker("m", now());
        doc.metadata
            .set(META_APP, "Author", MetadataValue::text("ada"), VersionRef::Latest);
        let criterion =
            SortCriterion::new("color", CriterionOrdering::Lexical).with_key(META_APP, "Author");
        assert_eq!(doc.criteria_value(&criterion, VersionRef::Latest), "ada");

        let inactive = SortCriterion::new("cluster", CriterionOrdering::Lexical);
        assert_eq!(doc.criteria_value(&inactive, VersionRef::Latest), "");
    }
}
