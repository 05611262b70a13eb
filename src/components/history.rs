use std::collections::VecDeque;

use crate::canvas::{Raster, RasterBuffer};
use crate::components::colors::Colour;
use crate::components::selection::HighlightSet;

// ============================================================================
// COMMAND TRAIT
// ============================================================================

/// Trait for undoable/redoable raster edits.
pub trait Command: Send + Sync {
    fn undo(&self, raster: &mut RasterBuffer, highlights: &mut HighlightSet);
    fn redo(&self, raster: &mut RasterBuffer, highlights: &mut HighlightSet);
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;

    /// `(input, output)` assignments handed back to the highlight set by
    /// `undo`. The caller rebuilds its groups from these.
    fn restored_assignments(&self) -> &[(Colour, Colour)] {
        &[]
    }
}

// ============================================================================
// PIXEL PATCH - sparse index/colour pairs
// ============================================================================

/// The colours of a set of raster indices at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelPatch {
    pub indices: Vec<usize>,
    pub colours: Vec<Colour>,
}

impl PixelPatch {
    /// Out-of-range indices are skipped.
    pub fn capture<R: Raster + ?Sized>(raster: &R, indices: &[usize]) -> Self {
        let mut patch = Self {
            indices: Vec::with_capacity(indices.len()),
            colours: Vec::with_capacity(indices.len()),
        };
        for &idx in indices {
            if let Some(colour) = raster.colour_at(idx) {
                patch.indices.push(idx);
                patch.colours.push(colour);
            }
        }
        patch
    }

    pub fn apply<R: Raster + ?Sized>(&self, raster: &mut R) {
        for (&idx, &colour) in self.indices.iter().zip(self.colours.iter()) {
            raster.set_colour_at(idx, colour);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn memory_size(&self) -> usize {
        self.indices.len() * (std::mem::size_of::<usize>() + std::mem::size_of::<Colour>())
    }
}

// ============================================================================
// BRUSH COMMAND
// ============================================================================

pub struct BrushCommand {
    description: String,
    before: PixelPatch,
    after: PixelPatch,
}

impl BrushCommand {
    pub fn new(description: String, before: PixelPatch, after: PixelPatch) -> Self {
        Self {
            description,
            before,
            after,
        }
    }
}

impl Command for BrushCommand {
    fn undo(&self, raster: &mut RasterBuffer, _highlights: &mut HighlightSet) {
        self.before.apply(raster);
    }

    fn redo(&self, raster: &mut RasterBuffer, _highlights: &mut HighlightSet) {
        self.after.apply(raster);
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        self.before.memory_size() + self.after.memory_size()
    }
}

// ============================================================================
// APPLY COMMAND - classification writes that also consumed highlights
// ============================================================================

pub struct ApplyCommand {
    description: String,
    before: PixelPatch,
    after: PixelPatch,
    /// Highlights the apply consumed, with their outputs; restored on undo.
    cleared: Vec<(Colour, Colour)>,
}

impl ApplyCommand {
    pub fn new(
        description: String,
        before: PixelPatch,
        after: PixelPatch,
        cleared: Vec<(Colour, Colour)>,
    ) -> Self {
        Self {
            description,
            before,
            after,
            cleared,
        }
    }
}

impl Command for ApplyCommand {
    fn undo(&self, raster: &mut RasterBuffer, highlights: &mut HighlightSet) {
        self.before.apply(raster);
        highlights.extend(self.cleared.iter().map(|(input, _)| *input));
    }

    fn redo(&self, raster: &mut RasterBuffer, highlights: &mut HighlightSet) {
        self.after.apply(raster);
        for (input, _) in &self.cleared {
            highlights.remove(input);
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        self.before.memory_size()
            + self.after.memory_size()
            + self.cleared.len() * 2 * std::mem::size_of::<Colour>()
    }

    fn restored_assignments(&self) -> &[(Colour, Colour)] {
        &self.cleared
    }
}

// ============================================================================
// SNAPSHOT COMMAND — whole-raster undo for global passes (merge, normalize)
// ============================================================================

pub struct SnapshotCommand {
    description: String,
    before: RasterBuffer,
    after: RasterBuffer,
}

impl SnapshotCommand {
    pub fn new(description: String, before: RasterBuffer, after: RasterBuffer) -> Self {
        Self {
            description,
            before,
            after,
        }
    }
}

impl Command for SnapshotCommand {
    fn undo(&self, raster: &mut RasterBuffer, _highlights: &mut HighlightSet) {
        *raster = self.before.clone();
    }

    fn redo(&self, raster: &mut RasterBuffer, _highlights: &mut HighlightSet) {
        *raster = self.after.clone();
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        (self.before.len() + self.after.len()) * std::mem::size_of::<Colour>()
    }
}

// ============================================================================
// HISTORY MANAGER
// ============================================================================

pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size,
            max_memory_bytes: Some(100 * 1024 * 1024), // 100 MB default limit
            total_memory: 0,
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        // A new edit invalidates everything that was undone
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);

        self.prune();
    }

    pub fn undo(&mut self, raster: &mut RasterBuffer, highlights: &mut HighlightSet) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description();
        command.undo(raster, highlights);
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, raster: &mut RasterBuffer, highlights: &mut HighlightSet) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description();
        command.redo(raster, highlights);
        self.undo_stack.push_back(command);
        Some(description)
    }

    /// The command most recently undone, i.e. the next one `redo` replays.
    pub fn last_undone(&self) -> Option<&dyn Command> {
        self.redo_stack.back().map(|c| &**c)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// Most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn set_max_history_size(&mut self, max: usize) {
        self.max_history_size = max;
        self.prune();
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Colour = Colour::new(255, 0, 0);

    fn paint(raster: &mut RasterBuffer, indices: &[usize], colour: Colour) -> BrushCommand {
        let before = PixelPatch::capture(raster, indices);
        for &i in indices {
            raster.set_colour_at(i, colour);
        }
        let after = PixelPatch::capture(raster, indices);
        BrushCommand::new("Brush Stroke".into(), before, after)
    }

    #[test]
    fn test_undo_redo_brush() {
        let mut raster = RasterBuffer::new_filled(3, 1, Colour::BLACK);
        let mut highlights = HighlightSet::new();
        let mut history = HistoryManager::new(10);
        let cmd = paint(&mut raster, &[0, 2, 7], RED);
        history.push(Box::new(cmd));

        assert_eq!(history.undo(&mut raster, &mut highlights).as_deref(), Some("Brush Stroke"));
        assert!(raster.pixels().iter().all(|c| *c == Colour::BLACK));
        assert!(history.can_redo());

        history.redo(&mut raster, &mut highlights);
        assert_eq!(raster.pixels(), &[RED, Colour::BLACK, RED]);
        assert!(history.undo(&mut raster, &mut highlights).is_some());
        assert!(history.undo(&mut raster, &mut highlights).is_none());
        assert_eq!(history.redo_description().as_deref(), Some("Brush Stroke"));
    }

    #[test]
    fn test_apply_command_restores_highlights() {
        let mut raster = RasterBuffer::new_filled(2, 1, Colour::BLACK);
        let mut highlights = HighlightSet::from([Colour::BLACK]);
        let before = PixelPatch::capture(&raster, &[0, 1]);
        raster.set_colour_at(0, RED);
        raster.set_colour_at(1, RED);
        let after = PixelPatch::capture(&raster, &[0, 1]);
        highlights.remove(&Colour::BLACK);

        let cmd = ApplyCommand::new("Apply".into(), before, after, vec![(Colour::BLACK, RED)]);
        cmd.undo(&mut raster, &mut highlights);
        assert!(highlights.contains(&Colour::BLACK));
        assert_eq!(cmd.restored_assignments(), &[(Colour::BLACK, RED)]);
        assert_eq!(raster.pixels(), &[Colour::BLACK, Colour::BLACK]);
        cmd.redo(&mut raster, &mut highlights);
        assert!(highlights.is_empty());
        assert_eq!(raster.pixels(), &[RED, RED]);
    }

    #[test]
    fn test_push_clears_redo_and_prunes() {
        let mut raster = RasterBuffer::new_filled(4, 1, Colour::BLACK);
        let mut highlights = HighlightSet::new();
        let mut history = HistoryManager::new(2);
        for i in 0..3 {
            let cmd = paint(&mut raster, &[i], RED);
            history.push(Box::new(cmd));
        }
        assert_eq!(history.undo_count(), 2);

        history.undo(&mut raster, &mut highlights);
        assert_eq!(history.redo_count(), 1);
        let cmd = paint(&mut raster, &[3], RED);
        history.push(Box::new(cmd));
        assert_eq!(history.redo_count(), 0);
        assert!(history.memory_usage() > 0);
        history.clear();
        assert_eq!(history.memory_usage(), 0);
    }
}
