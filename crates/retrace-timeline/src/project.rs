//! The project index: documents, criteria, and the recompute pass that
//! rebuilds grouping, links, clusters, ordering, layout, and colors.
//!
//! All recomputation is synchronous and runs at the top of a tick, gated by
//! the dirty flags in [`ViewState`]; rendering and hit-testing read the
//! rebuilt structures afterwards in the same tick. The grouping index is a
//! pure product of (documents, criteria, view state) — it is rebuilt from
//! scratch each pass, never mutated incrementally.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use retrace_core::color::{scale_color, COLOR_DISABLED, COLOR_RENDER, SEVEN_KEY_PALETTE};
use retrace_core::criteria::{Acceptance, CriterionOrdering, PhaseSchedule, SortCriterion};
use retrace_core::document::{Document, DocumentFunction, DocumentKey, DocumentStatus, DocumentType, META_APP};
use retrace_core::error::{Error, Result};
use retrace_core::events::{EventBus, ProjectEvent, TagSignal};
use retrace_core::geom::{Point, Rect};
use retrace_core::metadata::VersionRef;
use retrace_core::tag::{Tag, TagHandle, TagKeys, TagKind};
use retrace_core::Rgba;

use crate::animation;
use crate::cluster::{Cluster, ClusterKey};
use crate::layout::{self, AdvanceMode, CategoryBand, LayoutMetrics};
use crate::probe::{NotificationSink, ProbeReport};
use crate::viewstate::ViewState;

/// Extra vertical gap inserted between phases on the timeline.
const PHASE_GAP: f64 = 10.0;

/// The active criteria: one slot per classification concern, plus the
/// phase schedule driving the top grouping level.
#[derive(Debug, Clone)]
pub struct CriteriaSet {
    pub sort: SortCriterion,
    pub color: SortCriterion,
    pub text: SortCriterion,
    pub cluster: SortCriterion,
    pub filter: SortCriterion,
    pub horizontal: SortCriterion,
    pub groupe: SortCriterion,
    pub phases: PhaseSchedule,
}

impl Default for CriteriaSet {
    fn default() -> Self {
        Self {
            sort: SortCriterion::new("sort", CriterionOrdering::Lexical).with_key(META_APP, "Type"),
            color: SortCriterion::new("color", CriterionOrdering::Lexical)
                .with_key(META_APP, "Author"),
            text: SortCriterion::new("text", CriterionOrdering::Lexical)
                .with_key(META_APP, "Comments"),
            cluster: SortCriterion::new("cluster", CriterionOrdering::Lexical),
            filter: SortCriterion::new("filter", CriterionOrdering::Lexical)
                .with_key(META_APP, "Keywords"),
            horizontal: SortCriterion::new("horizontal", CriterionOrdering::Lexical)
                .with_timeline_axis(),
            groupe: SortCriterion::new("groupe", CriterionOrdering::Lexical),
            phases: PhaseSchedule::default(),
        }
    }
}

/// Three-level grouping: phase → sort key → cluster key → ordered tags.
pub type GroupingIndex = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<TagHandle>>>>;

/// Palette assignment for one color key.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorShare {
    pub color: Rgba,
    /// Documents carrying this key (strong-accepted).
    pub count: usize,
    /// Fraction of color-carrying documents.
    pub share: f64,
}

/// Counts reported by a timeline rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub tag_count: usize,
    pub cluster_count: usize,
    pub duplicate_pairs: usize,
    pub history_documents: usize,
}

/// A project: the document set and every structure derived from it.
pub struct Project {
    pub documents: Vec<Document>,
    pub criteria: CriteriaSet,
    pub events: EventBus,

    pub index: GroupingIndex,
    pub clusters: BTreeMap<ClusterKey, Cluster>,
    pub viewer_order: Vec<TagHandle>,
    pub events_order: Vec<TagHandle>,
    pub color_shares: BTreeMap<String, ColorShare>,
    pub category_bands: Vec<CategoryBand>,
    pub timeline_bounds: Rect,
    pub duplicate_pairs: usize,
    pub history_documents: usize,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            criteria: CriteriaSet::default(),
            events: EventBus::default(),
            index: GroupingIndex::new(),
            clusters: BTreeMap::new(),
            viewer_order: Vec::new(),
            events_order: Vec::new(),
            color_shares: BTreeMap::new(),
            category_bands: Vec::new(),
            timeline_bounds: Rect::default(),
            duplicate_pairs: 0,
            history_documents: 0,
        }
    }

    // =========================================================================
    // DOCUMENT MANAGEMENT
    // =========================================================================

    pub fn add_document(&mut self, document: Document) -> usize {
        self.documents.push(document);
        self.documents.len() - 1
    }

    pub fn find_document(&self, key: &DocumentKey) -> Option<usize> {
        self.documents.iter().position(|d| &d.key == key)
    }

    /// Register a file in the project: reuse the existing document or
    /// create one, stamp a metadata version, and give new documents their
    /// default tag. Heavy extraction arrives later via [`document_ready`].
    ///
    /// [`document_ready`]: Project::document_ready
    pub fn open_path(&mut self, path: impl Into<PathBuf>, now: DateTime<Utc>) -> usize {
        let path = path.into();
        let key = DocumentKey::path(path.clone());
        match self.find_document(&key) {
            Some(index) => {
                self.documents[index].status = DocumentStatus::Waiting;
                index
            }
            None => {
                let mut doc = Document::from_path(path);
                doc.update_file(now);
                let kind = Self::default_tag_kind(&doc);
                doc.create_tag(kind, 0.0, retrace_core::defaults::DEFAULT_TAG_DURATION);
                self.add_document(doc)
            }
        }
    }

    /// Add a synthetic marker at a playhead time.
    pub fn add_marker(&mut self, name: &str, at: f64, now: DateTime<Utc>) -> TagHandle {
        let mut doc = Document::marker(name, now);
        let tag = doc.create_tag(TagKind::Milestone, at, 0.0);
        let index = self.add_document(doc);
        TagHandle::new(index, tag)
    }

    fn default_tag_kind(doc: &Document) -> TagKind {
        if doc.function == DocumentFunction::Render {
            TagKind::Interval
        } else if doc.doc_type == DocumentType::Marker {
            TagKind::Milestone
        } else {
            TagKind::Global
        }
    }

    /// Apply a completed extraction to a document's newest version, flip it
    /// to `Ready`, and dirty every view.
    pub fn document_ready(
        &mut self,
        index: usize,
        report: &ProbeReport,
        view: &mut ViewState,
    ) -> Result<()> {
        let doc = self
            .documents
            .get_mut(index)
            .ok_or_else(|| Error::DocumentNotFound(index.to_string()))?;
        if let Some(doc_type) = report.doc_type {
            doc.doc_type = doc_type;
        }
        if let Some(function) = report.function {
            doc.function = function;
        }
        if let Some(duration) = report.media_duration {
            doc.media_duration = duration;
        }
        let v = VersionRef::Latest;
        use retrace_core::metadata::MetadataValue;
        if let Some(author) = &report.author {
            doc.metadata.set(META_APP, "Author", MetadataValue::text(author), v);
        }
        if let Some(hash) = &report.content_hash {
            doc.metadata
                .set(retrace_core::document::META_FILE, "Hash", MetadataValue::text(hash), v);
        }
        if let Some(at) = report.captured_at {
            doc.metadata.set(META_APP, "Date/Time", MetadataValue::datetime(at), v);
        }
        for (key, value) in &report.gps {
            doc.metadata.set("GPS", key, MetadataValue::text(value), v);
        }
        for (category, key, value) in &report.extra {
            doc.metadata.set(category, key, MetadataValue::text(value), v);
        }
        doc.status = DocumentStatus::Ready;
        self.events.emit(ProjectEvent::DocumentStatusChanged {
            document: doc.key.label(),
            status: DocumentStatus::Ready,
        });
        view.dirty.mark_all();
        Ok(())
    }

    /// Bulk clear at project close. Clusters are destroyed here and only
    /// here.
    pub fn close(&mut self, view: &mut ViewState) {
        self.documents.clear();
        self.index.clear();
        self.clusters.clear();
        self.viewer_order.clear();
        self.events_order.clear();
        self.color_shares.clear();
        self.category_bands.clear();
        self.timeline_bounds = Rect::default();
        self.duplicate_pairs = 0;
        self.history_documents = 0;
        view.clear_selection();
        view.dirty.mark_all();
        tracing::info!(subsystem = "index", "project closed");
    }

    // =========================================================================
    // HANDLE RESOLUTION
    // =========================================================================

    pub fn tag(&self, handle: TagHandle) -> Option<&Tag> {
        self.documents.get(handle.document)?.tags.get(handle.tag)
    }

    pub fn tag_mut(&mut self, handle: TagHandle) -> Option<&mut Tag> {
        self.documents.get_mut(handle.document)?.tags.get_mut(handle.tag)
    }

    pub fn document_of(&self, handle: TagHandle) -> Option<&Document> {
        self.documents.get(handle.document)
    }

    fn all_handles(&self) -> Vec<TagHandle> {
        let mut handles = Vec::new();
        for (d, doc) in self.documents.iter().enumerate() {
            for t in 0..doc.tags.len() {
                handles.push(TagHandle::new(d, t));
            }
        }
        handles
    }

    /// Latest tag end across the project.
    pub fn total_time(&self) -> f64 {
        let mut total = 0.0f64;
        for doc in &self.documents {
            for tag in &doc.tags {
                total = total.max(tag.time_end());
            }
        }
        total
    }

    fn history_ok(&self, doc: &Document, tag: &Tag, view: &ViewState) -> bool {
        view.show_history || doc.is_tag_latest(tag)
    }

    // =========================================================================
    // CLASSIFICATION
    // =========================================================================

    fn compute_keys(&self, d: usize, t: usize) -> TagKeys {
        let doc = &self.documents[d];
        let tag = &doc.tags[t];
        let v = tag.version();
        let c = &self.criteria;

        let sort_raw = doc.criteria_value(&c.sort, v);
        let color_raw = doc.criteria_value(&c.color, v);
        let cluster_raw = doc.criteria_value(&c.cluster, v);
        let filter_raw = doc.criteria_value(&c.filter, v);
        let horizontal_raw = doc.criteria_value(&c.horizontal, v);
        let text_raw = doc.criteria_value(&c.text, v);

        // Phase rank from the schedule when it is active; groupe key
        // otherwise.
        let mut phase = String::new();
        if c.phases.enabled {
            if let Some(value) = doc.metadata.get(&c.phases.category, &c.phases.key, v) {
                phase = c.phases.phase_for(value);
            }
        }
        if phase.is_empty() {
            phase = c.groupe.classify(&doc.criteria_value(&c.groupe, v));
        }

        TagKeys {
            phase,
            sort: c.sort.classify(&sort_raw),
            sort_label: c.sort.format_label(&sort_raw),
            color: c.color.classify(&color_raw),
            color_label: c.color.format_label(&color_raw),
            cluster: c.cluster.classify(&cluster_raw),
            cluster_label: c.cluster.accepted_label(&cluster_raw),
            filter: c.filter.classify(&filter_raw),
            horizontal: horizontal_raw,
            text: c.text.format_label(&text_raw),
        }
    }

    // =========================================================================
    // TIMELINE REBUILD
    // =========================================================================

    /// Rebuild classification keys, history and hash links, the grouping
    /// index, clusters and their chains, per-bucket ordering, and layout.
    pub fn rebuild_timeline(&mut self, view: &ViewState) -> RebuildSummary {
        self.rebuild_phases();

        self.index.clear();
        for cluster in self.clusters.values_mut() {
            cluster.clear();
        }

        let mut clusters_to_link: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut tag_count = 0usize;

        self.criteria.sort.begin_scan();

        for d in 0..self.documents.len() {
            for t in 0..self.documents[d].tags.len() {
                let handle = TagHandle::new(d, t);
                let keys = self.compute_keys(d, t);
                {
                    let tag = &mut self.documents[d].tags[t];
                    tag.keys = keys;
                    tag.history.clear();
                    tag.hash_links.clear();
                }

                let doc = &self.documents[d];
                let tag = &doc.tags[t];
                let sort_raw = doc.criteria_value(&self.criteria.sort, tag.version());
                if !self.history_ok(doc, tag, view)
                    || !self.criteria.sort.is_acceptable(Acceptance::Weak, &sort_raw)
                {
                    continue;
                }

                if self.criteria.sort.is_acceptable(Acceptance::Strong, &sort_raw) {
                    let phase = tag.keys.phase.clone();
                    let sort_key = tag.keys.sort.clone();
                    let cluster_raw = doc.criteria_value(&self.criteria.cluster, tag.version());

                    let clustered = !tag.keys.cluster.is_empty()
                        && self.criteria.cluster.is_active()
                        && self
                            .criteria
                            .cluster
                            .is_acceptable(Acceptance::Strong, &cluster_raw);
                    let bucket_cluster = if clustered {
                        tag.keys.cluster_label.clone()
                    } else {
                        tag.keys.cluster.clone()
                    };
                    if clustered {
                        let key: ClusterKey = (sort_key.clone(), bucket_cluster.clone());
                        self.clusters.entry(key).or_default().add(handle);
                        clusters_to_link
                            .entry(bucket_cluster.clone())
                            .or_default()
                            .insert(sort_key.clone());
                    }

                    self.index
                        .entry(phase)
                        .or_default()
                        .entry(sort_key)
                        .or_default()
                        .entry(bucket_cluster)
                        .or_default()
                        .push(handle);
                    tag_count += 1;
                }

                // Weak-but-not-strong tags still register, so they surface
                // unchecked in the filter list.
                if doc.function != DocumentFunction::Render {
                    let label = self.criteria.sort.format_label(&sort_raw);
                    self.criteria.sort.record_observation(&sort_raw, &label);
                }
            }
        }

        self.criteria.sort.end_scan();

        self.link_history(view);
        self.link_hash_duplicates(view);

        // Chain clusters sharing a cluster key across consecutive sort keys.
        for (cluster_key, sort_keys) in &clusters_to_link {
            let mut previous: Option<ClusterKey> = None;
            for sort_key in sort_keys {
                let key: ClusterKey = (sort_key.clone(), cluster_key.clone());
                if let Some(cluster) = self.clusters.get_mut(&key) {
                    cluster.set_linked(previous.clone());
                }
                previous = Some(key);
            }
        }

        self.order_buckets();
        self.pack_timeline(view);

        let summary = RebuildSummary {
            tag_count,
            cluster_count: self.clusters.values().filter(|c| !c.is_empty()).count(),
            duplicate_pairs: self.duplicate_pairs,
            history_documents: self.history_documents,
        };
        tracing::debug!(
            subsystem = "index",
            op = "rebuild_timeline",
            tag_count = summary.tag_count,
            cluster_count = summary.cluster_count,
            duplicate_pairs = summary.duplicate_pairs,
            history_count = summary.history_documents,
            "timeline index rebuilt"
        );
        summary
    }

    fn rebuild_phases(&mut self) {
        let phases = &self.criteria.phases;
        if !phases.enabled || phases.key.is_empty() {
            return;
        }
        let mut observations = Vec::new();
        for doc in &self.documents {
            for version in doc.metadata.versions() {
                if let Some(value) = version.get(&phases.category, &phases.key) {
                    if let Some(date) = value.as_datetime() {
                        observations.push(date);
                    }
                }
            }
        }
        self.criteria.phases.rebuild(&observations);
    }

    /// History chains: each tag links the tags of all strictly earlier
    /// versions of its document (history mode on); with history off only
    /// latest-version tags carry the (full) chain. A tag never links
    /// itself.
    fn link_history(&mut self, view: &ViewState) {
        self.history_documents = 0;
        for d in 0..self.documents.len() {
            let doc = &self.documents[d];
            if doc.metadata.version_count() <= 1 {
                continue;
            }
            self.history_documents += 1;

            let resolved: Vec<(usize, usize)> = doc
                .tags
                .iter()
                .enumerate()
                .filter_map(|(t, tag)| doc.metadata.resolve(tag.version()).map(|v| (t, v)))
                .collect();

            let mut assignments: Vec<(usize, Vec<TagHandle>)> = Vec::new();
            for &(t, v) in &resolved {
                let is_latest = doc.is_tag_latest(&doc.tags[t]);
                if !view.show_history && !is_latest {
                    continue;
                }
                let earlier: Vec<TagHandle> = resolved
                    .iter()
                    .filter(|&&(t2, v2)| t2 != t && v2 < v)
                    .map(|&(t2, _)| TagHandle::new(d, t2))
                    .collect();
                if !earlier.is_empty() {
                    assignments.push((t, earlier));
                }
            }
            for (t, earlier) in assignments {
                self.documents[d].tags[t].history = earlier;
            }
        }
    }

    /// Cross-link tags of documents whose content hashes match, counting
    /// unordered duplicate pairs.
    fn link_hash_duplicates(&mut self, view: &ViewState) {
        let mut hash_groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (d, doc) in self.documents.iter().enumerate() {
            let hash = doc.content_hash(VersionRef::Latest);
            if !hash.is_empty() {
                hash_groups.entry(hash).or_default().push(d);
            }
        }

        let mut directed_pairs = 0usize;
        for group in hash_groups.values() {
            if group.len() < 2 {
                continue;
            }
            for &a in group {
                for &b in group {
                    if a == b {
                        continue;
                    }
                    directed_pairs += 1;
                    if !view.show_hash_links {
                        continue;
                    }
                    let other: Vec<TagHandle> = (0..self.documents[b].tags.len())
                        .map(|t| TagHandle::new(b, t))
                        .collect();
                    for t in 0..self.documents[a].tags.len() {
                        let tag = &mut self.documents[a].tags[t];
                        for h in &other {
                            if !tag.hash_links.contains(h) {
                                tag.hash_links.push(*h);
                            }
                        }
                    }
                }
            }
        }
        // Each unordered pair was hit once per direction.
        self.duplicate_pairs = directed_pairs / 2;
    }

    /// Deterministic order inside every bucket: color key, then document
    /// name, then version index. Stale handles sort last.
    fn order_buckets(&mut self) {
        let mut index = std::mem::take(&mut self.index);
        for sorts in index.values_mut() {
            for buckets in sorts.values_mut() {
                for bucket in buckets.values_mut() {
                    bucket.sort_by_cached_key(|&h| self.color_order_key(h));
                }
            }
        }
        self.index = index;
    }

    fn color_order_key(&self, handle: TagHandle) -> (String, String, usize) {
        match (self.document_of(handle), self.tag(handle)) {
            (Some(doc), Some(tag)) => {
                let version = doc.metadata.resolve(tag.version()).unwrap_or(0);
                (tag.keys.color.clone(), doc.name(tag.version()), version)
            }
            // Stale handles compare equal among themselves and after
            // everything else.
            _ => ("\u{10FFFF}".to_string(), String::new(), usize::MAX),
        }
    }

    // =========================================================================
    // TIMELINE LAYOUT
    // =========================================================================

    fn pack_timeline(&mut self, view: &ViewState) {
        let m = view.metrics.clone();
        let timeline_axis = self.criteria.horizontal.timeline_axis;

        let mut zones: Vec<Rect> = Vec::new();
        let mut bands: Vec<CategoryBand> = Vec::new();
        let mut bounds = Rect::default();
        let mut y_offset = m.tag_vseparator;

        let index = std::mem::take(&mut self.index);
        let phase_count = index.len();
        for (phase, sorts) in &index {
            for (sort_key, buckets) in sorts {
                let category_top = y_offset;
                let mut y_max = category_top;
                let mut label = String::new();
                let mut is_render = false;

                for bucket in buckets.values() {
                    for &handle in bucket {
                        let Some(doc) = self.documents.get(handle.document) else { continue };
                        let Some(tag) = doc.tags.get(handle.tag) else { continue };
                        if label.is_empty() {
                            label = format!(" {}", tag.keys.sort_label.trim().to_uppercase());
                            is_render = doc.function == DocumentFunction::Render;
                        }

                        let rect0 = self.base_rect(tag, &m, timeline_axis);
                        let trial = rect0.translated(Point::new(0.0, y_offset));
                        let mode = if (tag.kind() == TagKind::Global && timeline_axis)
                            || !timeline_axis
                        {
                            let row_width = if timeline_axis {
                                m.dock_row_width()
                            } else {
                                m.categorical_row_width()
                            };
                            AdvanceMode::Shelf { row_width }
                        } else {
                            AdvanceMode::Stack
                        };
                        let (offset, placed) = layout::place(trial, &zones, mode, &m);

                        let dest = Point::new(
                            m.header_width + m.global_dock_width + offset.x,
                            y_offset + offset.y,
                        );
                        let tag = &mut self.documents[handle.document].tags[handle.tag];
                        tag.timeline_rect = rect0;
                        tag.timeline_slot.set_dest(dest);
                        tracing::trace!(
                            subsystem = "layout",
                            document = handle.document,
                            tag = handle.tag,
                            x = placed.x,
                            y = placed.y,
                            "placed tag"
                        );

                        zones.push(placed);
                        y_max = y_max.max(placed.bottom());
                        bounds = bounds.united(&placed);
                    }
                }

                bands.push(CategoryBand {
                    phase: phase.clone(),
                    sort_key: sort_key.clone(),
                    label,
                    rect: Rect::new(
                        0.0,
                        category_top - m.tag_vseparator,
                        m.header_width,
                        (y_max - category_top) + 2.0 * m.tag_vseparator,
                    ),
                    is_render,
                });
                y_offset = y_max + 2.0 * m.tag_vseparator;
            }
            if phase_count > 1 {
                y_offset += PHASE_GAP;
            }
        }
        self.index = index;
        self.category_bands = bands;
        self.timeline_bounds = bounds;
    }

    fn base_rect(&self, tag: &Tag, m: &LayoutMetrics, timeline_axis: bool) -> Rect {
        if timeline_axis && tag.kind() == TagKind::Global {
            // Global tags live in the dock left of the time origin.
            let width = (tag.drawable_duration() * m.time_unit).max(m.tag_height);
            return Rect::new(-m.global_dock_width, 0.0, width, m.tag_height);
        }
        let h = &self.criteria.horizontal;
        let pos = h.position_value(&tag.keys.horizontal, tag.time_start());
        let width = (h.duration_value(tag.drawable_duration()) * m.time_unit).max(m.tag_height);
        let mut rect = Rect::new(pos * m.time_unit, 0.0, width, m.tag_height);
        if tag.kind() == TagKind::Milestone {
            rect.x -= rect.w / 2.0;
        }
        rect
    }

    // =========================================================================
    // EVENTS REBUILD (colors, text, orderings, criteria universes)
    // =========================================================================

    /// Rebuild derived coloring, display text, the events ordering, and the
    /// acceptance universes of the secondary criteria.
    pub fn rebuild_events(&mut self, view: &ViewState) {
        // Render documents always carry interval tags.
        for doc in &mut self.documents {
            if doc.function == DocumentFunction::Render {
                for tag in &mut doc.tags {
                    if tag.kind() != TagKind::Interval {
                        tag.set_kind(TagKind::Interval, None);
                    }
                }
            }
        }

        self.assign_colors();

        // Text universe + display text.
        self.criteria.text.begin_scan();
        for d in 0..self.documents.len() {
            for t in 0..self.documents[d].tags.len() {
                let doc = &self.documents[d];
                let tag = &doc.tags[t];
                let raw = doc.criteria_value(&self.criteria.text, tag.version());
                if self.history_ok(doc, tag, view)
                    && self.criteria.text.is_acceptable(Acceptance::Weak, &raw)
                {
                    let label = self.criteria.text.format_label(&raw);
                    self.criteria.text.record_observation(&raw, &label);
                }
            }
        }
        self.criteria.text.end_scan();
        for d in 0..self.documents.len() {
            for t in 0..self.documents[d].tags.len() {
                let doc = &self.documents[d];
                let tag = &doc.tags[t];
                let raw = doc.criteria_value(&self.criteria.text, tag.version());
                let mut text = String::new();
                if self.history_ok(doc, tag, view)
                    && self.criteria.text.is_acceptable(Acceptance::Strong, &raw)
                {
                    if doc.doc_type == DocumentType::Marker {
                        text = format!("{} - ", doc.name(tag.version()));
                    }
                    text.push_str(&self.criteria.text.format_label(&raw));
                    if let Some(stripped) = text.strip_suffix(" - ") {
                        text = stripped.to_string();
                    }
                }
                self.documents[d].tags[t].display_text = text;
            }
        }

        // Events ordering: strong-accepted tags by start time.
        let mut order = Vec::new();
        for handle in self.all_handles() {
            let doc = &self.documents[handle.document];
            let tag = &doc.tags[handle.tag];
            let raw = doc.criteria_value(&self.criteria.sort, tag.version());
            if self.history_ok(doc, tag, view)
                && self.criteria.sort.is_acceptable(Acceptance::Strong, &raw)
            {
                order.push(handle);
            }
        }
        order.sort_by_cached_key(|&h| self.events_order_key(h));
        self.events_order = order;

        // Secondary acceptance universes.
        self.rescan_criterion(view, |c| &mut c.groupe);
        self.rescan_criterion(view, |c| &mut c.filter);
        self.rescan_criterion(view, |c| &mut c.horizontal);
        self.rescan_criterion(view, |c| &mut c.cluster);

        tracing::debug!(
            subsystem = "events",
            op = "rebuild_events",
            document_count = self.documents.len(),
            tag_count = self.events_order.len(),
            "events pass rebuilt"
        );
    }

    fn events_order_key(&self, handle: TagHandle) -> (u64, String, usize) {
        match (self.document_of(handle), self.tag(handle)) {
            (Some(doc), Some(tag)) => (
                order_bits(tag.time_start()),
                doc.name(tag.version()),
                doc.metadata.resolve(tag.version()).unwrap_or(0),
            ),
            _ => (u64::MAX, String::new(), usize::MAX),
        }
    }

    /// One weak-acceptance scan pass over a secondary criterion. The slot
    /// is taken out of the set for the duration so observations can be
    /// recorded while documents are read.
    fn rescan_criterion(&mut self, view: &ViewState, pick: fn(&mut CriteriaSet) -> &mut SortCriterion) {
        let mut criterion = std::mem::take(pick(&mut self.criteria));
        criterion.begin_scan();
        for doc in &self.documents {
            for tag in &doc.tags {
                if !(view.show_history || doc.is_tag_latest(tag)) {
                    continue;
                }
                let raw = doc.criteria_value(&criterion, tag.version());
                if criterion.is_acceptable(Acceptance::Weak, &raw) {
                    let label = criterion.format_label(&raw);
                    criterion.record_observation(&raw, &label);
                }
            }
        }
        criterion.end_scan();
        *pick(&mut self.criteria) = criterion;
    }

    fn assign_colors(&mut self) {
        self.criteria.color.begin_scan();
        self.color_shares.clear();

        // raw sample + count per canonical color key, strong-accepted only.
        let mut counts: BTreeMap<String, (String, usize)> = BTreeMap::new();
        let mut total = 0usize;
        for d in 0..self.documents.len() {
            let doc = &self.documents[d];
            let raw = doc.criteria_value(&self.criteria.color, VersionRef::Latest);
            if raw.trim().is_empty() {
                continue;
            }
            if self.criteria.color.is_acceptable(Acceptance::Weak, &raw) {
                let label = self.criteria.color.format_label(&raw);
                self.criteria.color.record_observation(&raw, &label);
            }
            if self.criteria.color.is_acceptable(Acceptance::Strong, &raw) {
                let canonical = self.criteria.color.classify(&raw);
                let entry = counts.entry(canonical).or_insert_with(|| (raw.clone(), 0));
                entry.1 += 1;
                total += 1;
            }
        }

        // Palette assignment: the 7-key fixed palette when exactly seven
        // distinct keys exist, the gradient otherwise. Zero matching
        // documents would divide by zero in the share; skip weighting then.
        let n = counts.len();
        for (i, (canonical, (raw, count))) in counts.iter().enumerate() {
            let color = if n == SEVEN_KEY_PALETTE.len() {
                SEVEN_KEY_PALETTE[i]
            } else {
                scale_color(i as f64 / n as f64)
            };
            let share = if total == 0 { 0.0 } else { *count as f64 / total as f64 };
            self.color_shares.insert(
                canonical.clone(),
                ColorShare { color, count: *count, share },
            );
            self.criteria
                .color
                .annotate(raw, format!("{:02}%", (share * 100.0).round() as u32));
        }
        self.criteria.color.end_scan();

        // Document base colors, and tag color destinations from them.
        for doc in &mut self.documents {
            let raw = doc.criteria_value(&self.criteria.color, VersionRef::Latest);
            let canonical = self.criteria.color.classify(&raw);
            doc.base_color = match self.color_shares.get(&canonical) {
                Some(share) => share.color,
                None if doc.function == DocumentFunction::Render => COLOR_RENDER,
                None => COLOR_DISABLED,
            };
            for tag in &mut doc.tags {
                tag.color_dest = doc.base_color;
            }
        }
    }

    // =========================================================================
    // VIEWER REBUILD
    // =========================================================================

    /// Rebuild the sequential viewer: strong-accepted contextual interval
    /// and milestone tags, ordered by playhead progression then start time,
    /// stacked vertically.
    pub fn rebuild_viewer(&mut self, view: &ViewState) {
        let mut order = Vec::new();
        for handle in self.all_handles() {
            let doc = &self.documents[handle.document];
            let tag = &doc.tags[handle.tag];
            let raw = doc.criteria_value(&self.criteria.sort, tag.version());
            if self.history_ok(doc, tag, view)
                && self.criteria.sort.is_acceptable(Acceptance::Strong, &raw)
                && doc.function == DocumentFunction::Contextual
                && tag.kind() != TagKind::Global
            {
                order.push(handle);
            }
        }
        order.sort_by(|&a, &b| self.viewer_cmp(a, b));

        let m = &view.metrics;
        let heights: Vec<f64> = order.iter().map(|_| m.viewer_row_height).collect();
        let offsets = layout::stack_rows(&heights, m.viewer_row_height / 2.0);
        for (i, &handle) in order.iter().enumerate() {
            let rect = Rect::new(0.0, 0.0, m.viewer_width, heights[i]);
            if let Some(tag) = self.tag_mut(handle) {
                tag.viewer_rect = rect;
                tag.viewer_slot.set_dest(Point::new(0.0, offsets[i]));
            }
        }
        self.viewer_order = order;
    }

    /// Viewer ordering: tags the playhead is inside (or sharing the same
    /// progression) order by start time; otherwise more-progressed tags
    /// float up.
    fn viewer_cmp(&self, a: TagHandle, b: TagHandle) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let (Some(ta), Some(tb)) = (self.tag(a), self.tag(b)) else {
            return Ordering::Equal;
        };
        let (pa, pb) = (ta.progression_dest, tb.progression_dest);
        let both_active = pa > 0.0 && pa < 1.0 && pb > 0.0 && pb < 1.0;
        if pa == pb || both_active {
            ta.time_start()
                .partial_cmp(&tb.time_start())
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.events_order_key(a).cmp(&self.events_order_key(b)))
        } else {
            pb.partial_cmp(&pa).unwrap_or(Ordering::Equal)
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// One cooperative tick: consume dirty flags (full rebuilds complete
    /// before any read), ease animations, and fire enter/leave cues against
    /// the playhead.
    pub fn tick(
        &mut self,
        view: &mut ViewState,
        sinks: &[&dyn NotificationSink],
        elapsed_ms: f64,
    ) {
        if view.dirty.events {
            view.dirty.events = false;
            self.rebuild_events(view);
        }
        if view.dirty.timeline {
            view.dirty.timeline = false;
            let summary = self.rebuild_timeline(view);
            self.events.emit(ProjectEvent::IndexRebuilt {
                tag_count: summary.tag_count,
                cluster_count: summary.cluster_count,
                duplicate_pairs: summary.duplicate_pairs,
                history_count: summary.history_documents,
            });
        }
        if view.dirty.viewer {
            view.dirty.viewer = false;
            self.rebuild_viewer(view);
        }

        for doc in &mut self.documents {
            for tag in &mut doc.tags {
                animation::animate_tag(tag, elapsed_ms);
            }
        }

        let order = self.events_order.clone();
        for handle in order {
            let Some(doc) = self.documents.get(handle.document) else { continue };
            let Some(version) = doc.tags.get(handle.tag).map(|t| t.version()) else { continue };
            let (doc_type, author, name, base_color) =
                (doc.doc_type, doc.author(version), doc.name(version), doc.base_color);
            let tag = &mut self.documents[handle.document].tags[handle.tag];
            let kind = tag.kind();
            let (start, end) = (tag.time_start(), tag.time_end());
            if let Some(active) = tag.playhead_crossing(view.playhead) {
                if kind == TagKind::Global {
                    continue;
                }
                let signal = TagSignal {
                    document_type: doc_type,
                    author,
                    name,
                    time_start: start,
                    time_end: end,
                    active,
                    color: base_color,
                };
                for sink in sinks {
                    sink.deliver(&signal);
                }
                self.events.emit(if active {
                    ProjectEvent::TagEntered { signal }
                } else {
                    ProjectEvent::TagLeft { signal }
                });
            }
        }

        // Progression reorders the viewer continuously while playing.
        if view.playing {
            view.dirty.viewer = true;
        }
    }

    // =========================================================================
    // CURSOR MAPPING & HIT TESTS
    // =========================================================================

    /// Screen x of a project time on the timeline.
    pub fn timeline_cursor_pos(&self, time: f64, m: &LayoutMetrics) -> Point {
        Point::new(m.header_width + m.global_dock_width + m.time_unit * time, 0.0)
    }

    /// Project time under a timeline cursor, snapping to the hovered tag's
    /// edges and latching the snap guides.
    pub fn timeline_cursor_time(&self, pos: Point, view: &mut ViewState) -> f64 {
        let m = &view.metrics;
        let mut time =
            ((pos.x - m.header_width - m.global_dock_width) / m.time_unit).max(0.0);
        view.snap.clear();
        if let Some(hover) = view.hover {
            if !view.selection_in_action.contains(&hover) {
                if let Some(tag) = self.tag(hover) {
                    if let Some((snapped, edge)) = tag.snap_time(time, view.snap_radius) {
                        time = snapped;
                        match edge {
                            retrace_core::SnapEdge::Start => view.snap.start = Some(snapped),
                            retrace_core::SnapEdge::End => view.snap.end = Some(snapped),
                        }
                    }
                }
            }
        }
        time
    }

    /// Non-linear viewer cursor: interpolates between the stacked rows'
    /// eased positions by where the time falls between their start times.
    pub fn viewer_cursor_pos(&self, time: f64) -> Point {
        let rows: Vec<(&Tag, f64)> = self
            .viewer_order
            .iter()
            .filter_map(|&h| self.tag(h))
            .map(|t| (t, t.viewer_slot.current.y))
            .collect();
        if rows.is_empty() {
            return Point::default();
        }

        if time < rows[0].0.time_start() {
            let first_start = rows[0].0.time_start().max(f64::EPSILON);
            return Point::new(0.0, (time / first_start) * rows[0].1);
        }
        for window in rows.windows(2) {
            let (a, ya) = window[0];
            let (b, yb) = window[1];
            if a.time_start() <= time && time <= b.time_start() {
                let span = (b.time_start() - a.time_start()).max(f64::EPSILON);
                let t = (time - a.time_start()) / span;
                return Point::new(0.0, ya * (1.0 - t) + yb * t);
            }
        }
        let (last, y_last) = rows[rows.len() - 1];
        let end = self.total_time().max(last.time_start() + f64::EPSILON);
        let t = ((time - last.time_start()) / (end - last.time_start())).clamp(0.0, 1.0);
        Point::new(0.0, y_last + t * last.viewer_rect.h)
    }

    /// Start time of the viewer row under a cursor.
    pub fn viewer_cursor_time(&self, pos: Point) -> f64 {
        let mut time = 0.0;
        for &handle in &self.viewer_order {
            if let Some(tag) = self.tag(handle) {
                if tag.viewer_rect.translated(tag.viewer_slot.current).contains(pos) {
                    time = tag.time_start();
                }
            }
        }
        time
    }

    /// Topmost tag under a timeline cursor position.
    pub fn hit_test_timeline(&self, pos: Point, m: &LayoutMetrics) -> Option<TagHandle> {
        let mut hit = None;
        for sorts in self.index.values() {
            for buckets in sorts.values() {
                for bucket in buckets.values() {
                    for &handle in bucket {
                        let Some(tag) = self.tag(handle) else { continue };
                        let rect = tag
                            .timeline_rect
                            .translated(tag.timeline_slot.current)
                            .translated(Point::new(0.0, m.header_height));
                        if rect.contains(pos) {
                            hit = Some(handle);
                        }
                    }
                }
            }
        }
        hit
    }

    pub fn hit_test_viewer(&self, pos: Point) -> Option<TagHandle> {
        self.viewer_order
            .iter()
            .copied()
            .find(|&h| {
                self.tag(h)
                    .map(|t| t.viewer_rect.translated(t.viewer_slot.current).contains(pos))
                    .unwrap_or(false)
            })
    }

    /// Category band under a timeline position, for band-level actions.
    pub fn category_at(&self, pos: Point, m: &LayoutMetrics) -> Option<&CategoryBand> {
        self.category_bands
            .iter()
            .find(|band| band.rect.translated(Point::new(0.0, m.header_height)).contains(pos))
    }
}

/// Order-preserving bit mapping for non-negative f64 sort keys.
fn order_bits(value: f64) -> u64 {
    value.max(0.0).to_bits()
}
