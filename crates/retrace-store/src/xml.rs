//! XML project persistence.
//!
//! A project serializes as a `project` root holding the criteria set and
//! one `document` element per document; documents carry their metadata
//! versions in order plus their tags. Reload reconstructs the document set
//! and criteria toggles; all derived structures (grouping index, clusters,
//! layout) are rebuilt by the first tick, so they are never persisted.
//!
//! Missing attributes read back as empty strings — a hand-edited or
//! partially written file degrades, it does not fail.

use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use uuid::Uuid;

use retrace_core::criteria::{CriterionOrdering, SortCriterion};
use retrace_core::document::{Document, DocumentFunction, DocumentKey, DocumentType};
use retrace_core::error::{Error, Result};
use retrace_core::metadata::{MetadataValue, MetadataVersion, VersionRef};
use retrace_core::tag::{Tag, TagKind};
use retrace_timeline::project::{CriteriaSet, Project};

fn xml_err(e: impl std::fmt::Display) -> Error {
    Error::Serialization(e.to_string())
}

/// Attribute value by name, unescaped; empty string when absent.
fn attr(e: &BytesStart, name: &[u8]) -> String {
    for a in e.attributes().flatten() {
        if a.key.as_ref() == name {
            if let Ok(value) = a.unescape_value() {
                return value.to_string();
            }
        }
    }
    String::new()
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Serialize a project to an XML string.
pub fn save_project(project: &Project) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Start(BytesStart::new("project")))
        .map_err(xml_err)?;

    write_criteria(&mut writer, &project.criteria)?;
    for document in &project.documents {
        write_document(&mut writer, document)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("project")))
        .map_err(xml_err)?;

    let bytes = writer.into_inner();
    String::from_utf8(bytes).map_err(xml_err)
}

/// Serialize a project to a file.
pub fn write_project(project: &Project, path: &Path) -> Result<()> {
    let xml = save_project(project)?;
    std::fs::write(path, xml)?;
    tracing::info!(subsystem = "store", op = "save", path = %path.display(), "project saved");
    Ok(())
}

fn write_criteria(writer: &mut Writer<Vec<u8>>, criteria: &CriteriaSet) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("criteria")))
        .map_err(xml_err)?;

    for criterion in [
        &criteria.sort,
        &criteria.color,
        &criteria.text,
        &criteria.cluster,
        &criteria.filter,
        &criteria.horizontal,
        &criteria.groupe,
    ] {
        write_criterion(writer, criterion)?;
    }

    let phases = &criteria.phases;
    let mut elem = BytesStart::new("phases");
    elem.push_attribute(("category", phases.category.as_str()));
    elem.push_attribute(("key", phases.key.as_str()));
    elem.push_attribute(("enabled", bool_str(phases.enabled)));
    elem.push_attribute(("dayGap", phases.day_gap.to_string().as_str()));
    elem.push_attribute(("minuteGap", phases.minute_gap.to_string().as_str()));
    writer.write_event(Event::Start(elem)).map_err(xml_err)?;
    for boundary in phases.boundaries() {
        let mut phase = BytesStart::new("phase");
        phase.push_attribute(("date", MetadataValue::datetime(boundary.date).as_str()));
        phase.push_attribute(("name", boundary.name.as_str()));
        phase.push_attribute(("checked", bool_str(boundary.checked)));
        writer.write_event(Event::Empty(phase)).map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("phases")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("criteria")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_criterion(writer: &mut Writer<Vec<u8>>, criterion: &SortCriterion) -> Result<()> {
    let mut elem = BytesStart::new("criterion");
    elem.push_attribute(("name", criterion.name.as_str()));
    elem.push_attribute(("category", criterion.category.as_str()));
    elem.push_attribute(("key", criterion.key.as_str()));
    elem.push_attribute(("ordering", criterion.ordering.to_string().as_str()));
    elem.push_attribute(("ascending", bool_str(criterion.ascending)));
    elem.push_attribute(("timelineAxis", bool_str(criterion.timeline_axis)));
    writer.write_event(Event::Start(elem)).map_err(xml_err)?;

    for (_, entry) in criterion.entries_sorted() {
        let mut check = BytesStart::new("check");
        check.push_attribute(("raw", entry.raw.as_str()));
        check.push_attribute(("label", entry.label.as_str()));
        check.push_attribute(("checked", bool_str(entry.checked)));
        writer.write_event(Event::Empty(check)).map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("criterion")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_document(writer: &mut Writer<Vec<u8>>, document: &Document) -> Result<()> {
    let mut elem = BytesStart::new("document");
    match &document.key {
        DocumentKey::Path(path) => {
            elem.push_attribute(("origin", "path"));
            elem.push_attribute(("key", path.display().to_string().as_str()));
        }
        DocumentKey::Synthetic(id) => {
            elem.push_attribute(("origin", "synthetic"));
            elem.push_attribute(("key", id.to_string().as_str()));
        }
    }
    elem.push_attribute(("function", document.function.to_string().as_str()));
    elem.push_attribute(("type", document.doc_type.to_string().as_str()));
    elem.push_attribute(("mediaDuration", document.media_duration.to_string().as_str()));
    writer.write_event(Event::Start(elem)).map_err(xml_err)?;

    for version in document.metadata.versions() {
        writer
            .write_event(Event::Start(BytesStart::new("meta")))
            .map_err(xml_err)?;
        for (category, key, value) in version.iter() {
            let mut entry = BytesStart::new("entry");
            entry.push_attribute(("category", category));
            entry.push_attribute(("key", key));
            entry.push_attribute(("value", value.as_str()));
            writer.write_event(Event::Empty(entry)).map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("meta")))
            .map_err(xml_err)?;
    }

    for tag in &document.tags {
        write_tag(writer, tag)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("document")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_tag(writer: &mut Writer<Vec<u8>>, tag: &Tag) -> Result<()> {
    let mut elem = BytesStart::new("tag");
    elem.push_attribute(("timeStart", tag.time_start().to_string().as_str()));
    elem.push_attribute(("timeEnd", tag.time_end().to_string().as_str()));
    elem.push_attribute(("mediaOffset", tag.time_media_offset().to_string().as_str()));
    elem.push_attribute(("kind", tag.kind().to_string().as_str()));
    elem.push_attribute(("version", tag.version().as_raw().to_string().as_str()));
    writer.write_event(Event::Empty(elem)).map_err(xml_err)?;
    Ok(())
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

// =============================================================================
// DESERIALIZATION
// =============================================================================

/// Reconstruct a project from its XML form. Derived structures stay empty
/// until the first recompute tick.
pub fn load_project(xml: &str) -> Result<Project> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut project = Project::new();
    let mut saw_root = false;
    let mut document: Option<Document> = None;
    let mut version: Option<MetadataVersion> = None;
    let mut criterion: Option<String> = None;
    let mut in_phases = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                match e.name().as_ref() {
                    b"project" => saw_root = true,
                    b"criteria" => {}
                    b"criterion" => {
                        let name = attr(e, b"name");
                        if let Some(slot) = criterion_slot(&mut project.criteria, &name) {
                            slot.category = attr(e, b"category");
                            slot.key = attr(e, b"key");
                            if let Ok(ordering) = CriterionOrdering::from_str(&attr(e, b"ordering")) {
                                slot.ordering = ordering;
                            }
                            slot.ascending = attr(e, b"ascending") != "false";
                            slot.timeline_axis = attr(e, b"timelineAxis") == "true";
                        }
                        criterion = Some(name);
                    }
                    b"check" => {
                        if let Some(name) = &criterion {
                            if let Some(slot) = criterion_slot(&mut project.criteria, name) {
                                slot.restore_entry(
                                    &attr(e, b"raw"),
                                    &attr(e, b"label"),
                                    attr(e, b"checked") != "false",
                                );
                            }
                        }
                    }
                    b"phases" => {
                        in_phases = true;
                        let phases = &mut project.criteria.phases;
                        phases.category = attr(e, b"category");
                        phases.key = attr(e, b"key");
                        phases.enabled = attr(e, b"enabled") == "true";
                        phases.day_gap = attr(e, b"dayGap").parse().unwrap_or(phases.day_gap);
                        phases.minute_gap =
                            attr(e, b"minuteGap").parse().unwrap_or(phases.minute_gap);
                    }
                    b"phase" if in_phases => {
                        if let Some(date) = MetadataValue::text(attr(e, b"date")).as_datetime() {
                            project.criteria.phases.restore_boundary(
                                date,
                                &attr(e, b"name"),
                                attr(e, b"checked") != "false",
                            );
                        }
                    }
                    b"document" => {
                        document = Some(read_document_open(e));
                    }
                    b"meta" => version = Some(MetadataVersion::new()),
                    b"entry" => {
                        if let Some(v) = &mut version {
                            v.set(
                                &attr(e, b"category"),
                                &attr(e, b"key"),
                                MetadataValue::text(attr(e, b"value")),
                            );
                        }
                    }
                    b"tag" => {
                        if let Some(doc) = &mut document {
                            doc.tags.push(read_tag(e, doc.media_duration));
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"meta" => {
                    if let (Some(doc), Some(v)) = (&mut document, version.take()) {
                        doc.metadata.push_version(v);
                    }
                }
                b"document" => {
                    if let Some(doc) = document.take() {
                        project.add_document(doc);
                    }
                }
                b"criterion" => criterion = None,
                b"phases" => in_phases = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(Error::MalformedProject("no project root element".into()));
    }
    tracing::debug!(
        subsystem = "store",
        op = "load",
        document_count = project.documents.len(),
        "project loaded"
    );
    Ok(project)
}

/// Load a project from a file.
pub fn read_project(path: &Path) -> Result<Project> {
    let xml = std::fs::read_to_string(path)?;
    load_project(&xml)
}

fn criterion_slot<'a>(criteria: &'a mut CriteriaSet, name: &str) -> Option<&'a mut SortCriterion> {
    match name {
        "sort" => Some(&mut criteria.sort),
        "color" => Some(&mut criteria.color),
        "text" => Some(&mut criteria.text),
        "cluster" => Some(&mut criteria.cluster),
        "filter" => Some(&mut criteria.filter),
        "horizontal" => Some(&mut criteria.horizontal),
        "groupe" => Some(&mut criteria.groupe),
        _ => None,
    }
}

fn read_document_open(e: &BytesStart) -> Document {
    let key = match attr(e, b"origin").as_str() {
        "synthetic" => {
            DocumentKey::Synthetic(Uuid::from_str(&attr(e, b"key")).unwrap_or(Uuid::nil()))
        }
        _ => DocumentKey::path(attr(e, b"key")),
    };
    let mut doc = Document::new(key);
    if let Ok(function) = DocumentFunction::from_str(&attr(e, b"function")) {
        doc.function = function;
    }
    if let Ok(doc_type) = DocumentType::from_str(&attr(e, b"type")) {
        doc.doc_type = doc_type;
    }
    doc.media_duration = attr(e, b"mediaDuration").parse().unwrap_or(0.0);
    doc
}

fn read_tag(e: &BytesStart, media_duration: f64) -> Tag {
    let version = VersionRef::from_raw(attr(e, b"version").parse().unwrap_or(-1));
    let kind = TagKind::from_str(&attr(e, b"kind")).unwrap_or_default();
    let start: f64 = attr(e, b"timeStart").parse().unwrap_or(0.0);
    let end: f64 = attr(e, b"timeEnd").parse().unwrap_or(start);
    let offset: f64 = attr(e, b"mediaOffset").parse().unwrap_or(0.0);

    let mut tag = Tag::new(version);
    tag.set_kind(kind, Some(start));
    if kind == TagKind::Interval {
        tag.set_time_end(end, media_duration);
        tag.set_time_media_offset(offset, media_duration);
    }
    tag
}
