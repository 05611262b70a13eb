use std::collections::BTreeSet;

use crate::components::colors::Colour;
use crate::components::registry::ClassRegistry;

/// Groups whose output has been chosen but not yet written to the raster.
pub type HighlightSet = BTreeSet<Colour>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true, ctrl: false };
    pub const CTRL: Modifiers = Modifiers { shift: false, ctrl: true };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// One group; choosing a class opens immediately.
    #[default]
    Single,
    /// Several groups; an explicit commit is required.
    Multi,
}

/// What the front end should do after a selection click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Show the class chooser for the single selected group.
    OpenChooser,
    /// Selection changed, nothing to open.
    Updated,
    /// The colour is not a known group.
    Ignored,
}

// ============================================================================
// SELECTION SET
// ============================================================================

/// Multi-selection over classification groups.
///
/// Shift-range selection works against `colour_order`, which is kept sorted
/// by the colour order so ranges are reproducible for the same input.
#[derive(Clone, Debug, Default)]
pub struct SelectionSet {
    colour_order: Vec<Colour>,
    selected: BTreeSet<Colour>,
    last_clicked: Option<Colour>,
    mode: SelectionMode,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the orderable colours (after every scan). Selected or anchor
    /// colours that no longer exist are dropped.
    pub fn set_order(&mut self, colours: impl IntoIterator<Item = Colour>) {
        let mut order: Vec<Colour> = colours.into_iter().collect();
        order.sort();
        order.dedup();
        self.colour_order = order;

        let order = &self.colour_order;
        self.selected.retain(|c| order.binary_search(c).is_ok());
        if let Some(last) = self.last_clicked
            && order.binary_search(&last).is_err()
        {
            self.last_clicked = None;
        }
        self.fix_mode();
    }

    pub fn click(&mut self, colour: Colour, modifiers: Modifiers) -> SelectionOutcome {
        if self.position(&colour).is_none() {
            return SelectionOutcome::Ignored;
        }

        if modifiers.shift {
            if let Some(anchor) = self.last_clicked {
                self.select_range(anchor, colour);
                self.mode = SelectionMode::Multi;
                return SelectionOutcome::Updated;
            }
            return self.click_single(colour);
        }

        if modifiers.ctrl {
            if !self.selected.remove(&colour) {
                self.selected.insert(colour);
            }
            self.last_clicked = Some(colour);
            self.mode = if self.selected.len() <= 1 {
                SelectionMode::Single
            } else {
                SelectionMode::Multi
            };
            return SelectionOutcome::Updated;
        }

        self.click_single(colour)
    }

    fn click_single(&mut self, colour: Colour) -> SelectionOutcome {
        self.selected.clear();
        self.selected.insert(colour);
        self.last_clicked = Some(colour);
        self.mode = SelectionMode::Single;
        SelectionOutcome::OpenChooser
    }

    /// Union the inclusive range between two colours into the selection.
    /// The anchor is left untouched.
    fn select_range(&mut self, a: Colour, b: Colour) {
        let (Some(mut i), Some(mut j)) = (self.position(&a), self.position(&b)) else {
            return;
        };
        if i > j {
            std::mem::swap(&mut i, &mut j);
        }
        self.selected.extend(self.colour_order[i..=j].iter().copied());
    }

    fn position(&self, colour: &Colour) -> Option<usize> {
        self.colour_order.binary_search(colour).ok()
    }

    fn fix_mode(&mut self) {
        if self.selected.len() <= 1 {
            self.mode = SelectionMode::Single;
        }
    }

    /// Assign `target` to every selected group and mark them pending.
    /// Returns how many groups were assigned.
    pub fn commit(
        &mut self,
        target: Colour,
        registry: &mut ClassRegistry,
        highlights: &mut HighlightSet,
    ) -> usize {
        let mut assigned = 0;
        for colour in &self.selected {
            if registry.set_output(colour, target) {
                highlights.insert(*colour);
                assigned += 1;
            }
        }
        self.selected.clear();
        self.mode = SelectionMode::Single;
        assigned
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.mode = SelectionMode::Single;
    }

    pub fn take_selected(&mut self) -> Vec<Colour> {
        let taken = std::mem::take(&mut self.selected).into_iter().collect();
        self.mode = SelectionMode::Single;
        taken
    }

    pub fn selected(&self) -> &BTreeSet<Colour> {
        &self.selected
    }

    pub fn is_selected(&self, colour: &Colour) -> bool {
        self.selected.contains(colour)
    }

    pub fn last_clicked(&self) -> Option<Colour> {
        self.last_clicked
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn colour_order(&self) -> &[Colour] {
        &self.colour_order
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
