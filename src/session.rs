use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::canvas::{Raster, RasterBuffer};
use crate::components::colors::Colour;
use crate::components::history::{BrushCommand, HistoryManager, PixelPatch, SnapshotCommand};
use crate::components::legend::Legend;
use crate::components::registry::{ClassRegistry, ScanSummary};
use crate::components::selection::{HighlightSet, Modifiers, SelectionOutcome, SelectionSet};
use crate::components::tools::{
    self, BrushOffsets, BrushSettings, ClickEvent, ClickEventQueue, FromStrength, QueuePolicy,
};
use crate::config::Settings;
use crate::ops::apply::{self, AppliedEdit};
use crate::ops::colour_merge::{self, MergeReport};
use crate::ops::preprocess;

/// Why an analysis or hand-off was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// Chosen classifications have not been applied yet.
    PendingHighlights(usize),
    /// The raster changed since the last analysis.
    AnalysisPending,
    /// Groups still without a class.
    Unresolved(usize),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::PendingHighlights(n) => {
                write!(f, "{} classification(s) chosen but not applied", n)
            }
            GateError::AnalysisPending => write!(f, "map changed since the last analysis"),
            GateError::Unresolved(n) => write!(f, "{} colour(s) still need a class", n),
        }
    }
}

impl std::error::Error for GateError {}

/// Single open map being classified.
pub struct ClassificationSession {
    pub id: Uuid,
    /// `None` until saved or opened from a session file.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,
    /// Display name (derived from path or "Untitled")
    pub name: String,

    raster: RasterBuffer,
    legend: Legend,
    registry: ClassRegistry,
    selection: SelectionSet,
    highlights: HighlightSet,
    history: HistoryManager,

    brush: BrushSettings,
    offsets: BrushOffsets,
    clicks: ClickEventQueue,
    paint_colour: Option<Colour>,

    analysis_pending: bool,
}

impl ClassificationSession {
    pub fn new(raster: RasterBuffer, legend: Legend) -> Self {
        Self::with_settings(raster, legend, &Settings::default())
    }

    /// Alias colours in `raster` are folded into their primaries up front.
    pub fn with_settings(mut raster: RasterBuffer, legend: Legend, settings: &Settings) -> Self {
        let normalized = preprocess::normalize_aliases(&mut raster, &legend);
        if normalized > 0 {
            log_info!("Normalized {} alias pixel(s) to primary colours", normalized);
        }
        let brush = settings.brush();
        let offsets = BrushOffsets::compute(raster.width(), brush.radius);

        Self {
            id: Uuid::new_v4(),
            path: None,
            is_dirty: false,
            name: "Untitled".to_string(),
            raster,
            legend,
            registry: ClassRegistry::new(),
            selection: SelectionSet::new(),
            highlights: HighlightSet::new(),
            history: HistoryManager::new(settings.max_undo_steps),
            brush,
            offsets,
            clicks: ClickEventQueue::new(settings.queue_policy),
            paint_colour: None,
            analysis_pending: true,
        }
    }

    /// Rebuild a session from saved state: scan, then re-apply the chosen
    /// outputs and pending highlights. Assignments for colours no longer in
    /// the raster are dropped.
    pub fn restore(
        raster: RasterBuffer,
        legend: Legend,
        assignments: impl IntoIterator<Item = (Colour, Colour)>,
        highlights: impl IntoIterator<Item = Colour>,
    ) -> Self {
        let mut session = Self::new(raster, legend);
        session.reseed(assignments);
        session.highlights = highlights
            .into_iter()
            .filter(|c| session.registry.group(c).is_some())
            .collect();
        session
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn raster(&self) -> &RasterBuffer {
        &self.raster
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn highlights(&self) -> &HighlightSet {
        &self.highlights
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn brush(&self) -> BrushSettings {
        self.brush
    }

    pub fn analysis_pending(&self) -> bool {
        self.analysis_pending
    }

    pub fn classifications_needed(&self) -> usize {
        self.registry.classifications_needed()
    }

    /// Output assignments that differ from "unresolved", in colour order.
    pub fn assignments(&self) -> Vec<(Colour, Colour)> {
        self.registry
            .groups()
            .filter_map(|g| g.output.map(|out| (g.input, out)))
            .collect()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // ------------------------------------------------------------------
    // Analysis gating
    // ------------------------------------------------------------------

    pub fn can_analyze(&self) -> bool {
        self.highlights.is_empty()
    }

    /// Partition the raster into classification groups.
    pub fn analyze(&mut self) -> Result<ScanSummary, GateError> {
        if !self.highlights.is_empty() {
            return Err(GateError::PendingHighlights(self.highlights.len()));
        }
        let summary = self.rescan();
        log_info!(
            "Analyzed map: {} colour group(s), {} need classification",
            summary.groups,
            summary.classifications_needed
        );
        Ok(summary)
    }

    fn rescan(&mut self) -> ScanSummary {
        let summary = self.registry.scan(&self.raster, &self.legend);
        self.registry.refresh_labels(&self.legend);
        self.selection.set_order(self.registry.colours());
        self.analysis_pending = false;
        summary
    }

    /// Rescan, keeping the outputs chosen so far for colours still present,
    /// then layer `assignments` on top.
    fn reseed(&mut self, assignments: impl IntoIterator<Item = (Colour, Colour)>) {
        let kept = self.assignments();
        self.rescan();
        for (input, output) in kept.into_iter().chain(assignments) {
            self.registry.set_output(&input, output);
        }
        self.registry.refresh_labels(&self.legend);
    }

    pub fn check_ready(&self) -> Result<(), GateError> {
        if !self.highlights.is_empty() {
            return Err(GateError::PendingHighlights(self.highlights.len()));
        }
        if self.analysis_pending {
            return Err(GateError::AnalysisPending);
        }
        match self.registry.classifications_needed() {
            0 => Ok(()),
            n => Err(GateError::Unresolved(n)),
        }
    }

    /// The fully classified raster, ready for the generator.
    pub fn finalize(&self) -> Result<&RasterBuffer, GateError> {
        self.check_ready()?;
        Ok(&self.raster)
    }

    /// Replace the legend. Existing groups need a fresh analysis.
    pub fn set_legend(&mut self, legend: Legend) {
        self.legend = legend;
        let normalized = preprocess::normalize_aliases(&mut self.raster, &self.legend);
        if normalized > 0 {
            log_info!("Normalized {} alias pixel(s) to primary colours", normalized);
            self.history.clear();
        }
        self.analysis_pending = true;
    }

    // ------------------------------------------------------------------
    // Selection and classification
    // ------------------------------------------------------------------

    pub fn click_group(&mut self, colour: Colour, modifiers: Modifiers) -> SelectionOutcome {
        self.selection.click(colour, modifiers)
    }

    /// Select the group under a raster pixel.
    pub fn click_pixel(&mut self, index: usize, modifiers: Modifiers) -> SelectionOutcome {
        let Some(colour) = self
            .registry
            .group_at_pixel(&self.raster, index)
            .map(|g| g.input)
        else {
            return SelectionOutcome::Ignored;
        };
        self.selection.click(colour, modifiers)
    }

    /// Assign `target` to the selected groups. Returns how many changed.
    pub fn commit_selection(&mut self, target: Colour) -> usize {
        let assigned = self
            .selection
            .commit(target, &mut self.registry, &mut self.highlights);
        if assigned > 0 {
            self.registry.refresh_labels(&self.legend);
            self.mark_dirty();
        }
        assigned
    }

    /// Commit by class name (case-insensitive). `None` if the legend has no
    /// such class.
    pub fn commit_selection_by_name(&mut self, class_name: &str) -> Option<usize> {
        let target = self.legend.find_by_name(class_name)?.primary;
        Some(self.commit_selection(target))
    }

    pub fn apply_group(&mut self, colour: &Colour) -> usize {
        let Some(group) = self.registry.group(colour) else {
            return 0;
        };
        let edit = apply::apply_one(group, &mut self.raster, &mut self.highlights);
        self.record_apply(edit, "Apply Classification")
    }

    pub fn apply_all(&mut self) -> usize {
        let edit = apply::apply_all_highlighted(&self.registry, &mut self.highlights, &mut self.raster);
        self.record_apply(edit, "Apply All Classifications")
    }

    pub fn apply_selected(&mut self) -> usize {
        let edit = apply::apply_selected(
            &self.registry,
            &mut self.selection,
            &mut self.highlights,
            &mut self.raster,
        );
        self.record_apply(edit, "Apply Selected Classifications")
    }

    fn record_apply(&mut self, edit: AppliedEdit, description: &str) -> usize {
        if edit.is_empty() {
            return 0;
        }
        let pixels = edit.pixel_count();
        log_info!("{}: {} pixel(s)", description, pixels);
        self.history.push(Box::new(edit.into_command(description)));
        self.mark_dirty();
        pixels
    }

    // ------------------------------------------------------------------
    // Brush painting
    // ------------------------------------------------------------------

    pub fn set_brush(&mut self, brush: BrushSettings) {
        self.brush = brush;
        if !self.offsets.matches(self.raster.width(), brush.radius) {
            self.offsets = BrushOffsets::compute(self.raster.width(), brush.radius);
        }
    }

    pub fn set_queue_policy(&mut self, policy: QueuePolicy) {
        self.clicks.set_policy(policy);
    }

    pub fn set_paint_colour(&mut self, colour: Colour) {
        self.paint_colour = Some(colour);
    }

    pub fn paint_colour(&self) -> Option<Colour> {
        self.paint_colour
    }

    /// Queue a pointer event for the next [`paint`](Self::paint).
    pub fn push_click(&mut self, event: ClickEvent) -> bool {
        self.clicks.push(event)
    }

    pub fn pending_clicks(&self) -> usize {
        self.clicks.len()
    }

    /// Drain the click queue through the brush into the raster as one
    /// undoable stroke. Returns the number of distinct pixels written.
    ///
    /// Without a paint colour the queue is discarded.
    pub fn paint(&mut self) -> usize {
        let Some(colour) = self.paint_colour else {
            self.clicks.clear();
            return 0;
        };
        let size = self.raster.len();

        let mut seen = HashSet::new();
        let mut before = PixelPatch::default();
        loop {
            let event = self.clicks.pop();
            if event.is_none() {
                break;
            }
            let affected = tools::expand(event, &self.offsets, size, self.brush.strength, self.brush.edge);
            let fresh: Vec<usize> = affected
                .iter()
                .map(|(ev, _)| ev.pixel as usize)
                .filter(|idx| seen.insert(*idx))
                .collect();
            let patch = PixelPatch::capture(&self.raster, &fresh);
            before.indices.extend(patch.indices);
            before.colours.extend(patch.colours);
            tools::paint_class(&mut self.raster, &affected, colour);
        }

        if before.is_empty() {
            return 0;
        }
        let after = PixelPatch::capture(&self.raster, &before.indices);
        let written = after.indices.len();
        self.history
            .push(Box::new(BrushCommand::new("Brush Stroke".to_string(), before, after)));
        self.analysis_pending = true;
        self.mark_dirty();
        written
    }

    /// Drain the click queue into a scalar data layer laid out like the
    /// raster (temperature, humidity, ...). Not recorded in history and does
    /// not touch the class raster. Returns how many events were consumed.
    pub fn paint_layer<T>(&mut self, mask: &[bool], data: &mut [T], multiplier: f64) -> usize
    where
        T: Copy + Default + FromStrength,
    {
        let size = self.raster.len();
        let mut consumed = 0;
        loop {
            let event = self.clicks.pop();
            if event.is_none() {
                break;
            }
            let affected = tools::expand(event, &self.offsets, size, self.brush.strength, self.brush.edge);
            tools::draw_into_layer(&affected, mask, data, multiplier);
            consumed += 1;
        }
        consumed
    }

    // ------------------------------------------------------------------
    // Whole-raster passes
    // ------------------------------------------------------------------

    pub fn merge_similar(&mut self, severity: u32) -> MergeReport {
        let before = self.raster.clone();
        let report = colour_merge::merge_similar_colours(&mut self.raster, severity);
        log_info!(
            "Merged similar colours (severity {}): {} -> {} colours, {} pixel(s) changed",
            severity,
            report.colours_before,
            report.colours_after,
            report.pixels_changed
        );
        if report.pixels_changed > 0 {
            let after = self.raster.clone();
            self.history.push(Box::new(SnapshotCommand::new(
                "Merge Similar Colours".to_string(),
                before,
                after,
            )));
            self.analysis_pending = true;
            self.mark_dirty();
        }
        report
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Undo the last edit. The map must be analyzed again afterwards.
    ///
    /// Undoing an apply brings its highlights back. The groups are rebuilt
    /// around them so they can be applied or reselected again.
    pub fn undo(&mut self) -> Option<String> {
        let desc = self.history.undo(&mut self.raster, &mut self.highlights)?;
        let restored: Vec<(Colour, Colour)> = self
            .history
            .last_undone()
            .map(|cmd| cmd.restored_assignments().to_vec())
            .unwrap_or_default();
        if !restored.is_empty() {
            self.reseed(restored);
        }
        self.analysis_pending = true;
        self.mark_dirty();
        Some(desc)
    }

    pub fn redo(&mut self) -> Option<String> {
        let desc = self.history.redo(&mut self.raster, &mut self.highlights)?;
        self.analysis_pending = true;
        self.mark_dirty();
        Some(desc)
    }
}
