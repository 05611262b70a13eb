// ============================================================================
// CLASSIFICATION APPLY — write chosen class colours back into the raster
// ============================================================================

use crate::canvas::Raster;
use crate::components::colors::Colour;
use crate::components::history::{ApplyCommand, PixelPatch};
use crate::components::registry::{ClassGroup, ClassRegistry};
use crate::components::selection::{HighlightSet, SelectionSet};

/// Before/after pixels of one apply, plus the highlights it consumed as
/// `(input, output)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedEdit {
    pub before: PixelPatch,
    pub after: PixelPatch,
    pub cleared: Vec<(Colour, Colour)>,
}

impl AppliedEdit {
    pub fn pixel_count(&self) -> usize {
        self.after.indices.len()
    }

    /// Nothing written and nothing un-highlighted.
    pub fn is_empty(&self) -> bool {
        self.after.is_empty() && self.cleared.is_empty()
    }

    pub fn into_command(self, description: impl Into<String>) -> ApplyCommand {
        ApplyCommand::new(description.into(), self.before, self.after, self.cleared)
    }
}

/// Group pixels that still carry the group's input colour. Pixels repainted
/// since the last scan belong to whatever they were painted with.
fn live_pixels<R: Raster + ?Sized>(group: &ClassGroup, raster: &R) -> Vec<usize> {
    group
        .pixels
        .iter()
        .copied()
        .filter(|&idx| raster.colour_at(idx) == Some(group.input))
        .collect()
}

/// Write the outputs of several groups. Live pixels are collected for every
/// group before anything is written, so one group's output never feeds
/// another group that uses it as input.
fn write_groups<'a, R: Raster + ?Sized>(
    groups: impl IntoIterator<Item = &'a ClassGroup>,
    raster: &mut R,
) -> AppliedEdit {
    let plan: Vec<(Colour, Colour, Vec<usize>)> = groups
        .into_iter()
        .filter_map(|g| g.output.map(|out| (g.input, out, live_pixels(g, &*raster))))
        .collect();

    let mut edit = AppliedEdit::default();
    for (input, output, indices) in plan {
        for &idx in &indices {
            raster.set_colour_at(idx, output);
        }
        edit.before.colours.extend(std::iter::repeat_n(input, indices.len()));
        edit.after.colours.extend(std::iter::repeat_n(output, indices.len()));
        edit.before.indices.extend_from_slice(&indices);
        edit.after.indices.extend(indices);
    }
    edit
}

/// Write one group's output colour into its pixels and drop its
/// highlight. Unresolved groups are left alone.
pub fn apply_one<R: Raster + ?Sized>(
    group: &ClassGroup,
    raster: &mut R,
    highlights: &mut HighlightSet,
) -> AppliedEdit {
    let Some(output) = group.output else {
        return AppliedEdit::default();
    };
    let mut edit = write_groups([group], raster);
    if highlights.remove(&group.input) {
        edit.cleared.push((group.input, output));
    }
    edit
}

/// Apply every highlighted group, then clear the highlight set.
///
/// Highlight keys without a resolved group (stale after a rescan) are
/// dropped and not recorded.
pub fn apply_all_highlighted<R: Raster + ?Sized>(
    registry: &ClassRegistry,
    highlights: &mut HighlightSet,
    raster: &mut R,
) -> AppliedEdit {
    let taken = std::mem::take(highlights);
    let groups: Vec<&ClassGroup> = taken
        .iter()
        .filter_map(|c| registry.group(c))
        .filter(|g| g.is_resolved())
        .collect();
    let mut edit = write_groups(groups.iter().copied(), raster);
    edit.cleared = groups
        .iter()
        .filter_map(|g| g.output.map(|out| (g.input, out)))
        .collect();
    edit
}

/// Apply every selected group's current output and clear the selection.
/// Applied groups also leave the highlight set.
pub fn apply_selected<R: Raster + ?Sized>(
    registry: &ClassRegistry,
    selection: &mut SelectionSet,
    highlights: &mut HighlightSet,
    raster: &mut R,
) -> AppliedEdit {
    let selected = selection.take_selected();
    let groups: Vec<&ClassGroup> = selected
        .iter()
        .filter_map(|c| registry.group(c))
        .filter(|g| g.is_resolved())
        .collect();
    let mut edit = write_groups(groups.iter().copied(), raster);
    for group in groups {
        if let Some(output) = group.output
            && highlights.remove(&group.input)
        {
            edit.cleared.push((group.input, output));
        }
    }
    edit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RasterBuffer;
    use crate::components::legend::{ClassDefinition, ClassKind, Legend};
    use crate::components::selection::Modifiers;

    const X: Colour = Colour::new(12, 34, 56);
    const Y: Colour = Colour::new(200, 100, 0);
    const DESERT: Colour = Colour::new(255, 200, 0);
    const TUNDRA: Colour = Colour::new(180, 180, 255);

    fn legend() -> Legend {
        Legend::from_classes([
            ClassDefinition::new(ClassKind::Climate, "Desert", DESERT),
            ClassDefinition::new(ClassKind::Climate, "Tundra", TUNDRA),
        ])
    }

    fn two_colour_raster() -> RasterBuffer {
        RasterBuffer::from_pixels(3, 2, vec![X, Y, X, Y, Y, X]).unwrap()
    }

    #[test]
    fn test_classify_and_apply_all() {
        let mut raster = two_colour_raster();
        let legend = legend();
        let mut registry = ClassRegistry::new();
        assert_eq!(registry.scan(&raster, &legend).classifications_needed, 2);

        let mut selection = SelectionSet::new();
        selection.set_order(registry.colours());
        let mut highlights = HighlightSet::new();

        selection.click(X, Modifiers::NONE);
        selection.commit(DESERT, &mut registry, &mut highlights);
        selection.click(Y, Modifiers::NONE);
        selection.commit(TUNDRA, &mut registry, &mut highlights);
        assert_eq!(highlights.len(), 2);

        let edit = apply_all_highlighted(&registry, &mut highlights, &mut raster);
        assert!(highlights.is_empty());
        assert_eq!(edit.pixel_count(), 6);
        assert_eq!(edit.cleared.len(), 2);
        for group in registry.groups() {
            for &idx in &group.pixels {
                assert_eq!(raster.colour_at(idx), group.output);
            }
        }

        assert!(registry.scan(&raster, &legend).is_resolved());
    }

    #[test]
    fn test_apply_one_clears_only_its_highlight() {
        let mut raster = two_colour_raster();
        let mut registry = ClassRegistry::new();
        registry.scan(&raster, &legend());
        registry.set_output(&X, DESERT);
        registry.set_output(&Y, TUNDRA);
        let mut highlights = HighlightSet::from([X, Y]);

        let group = registry.group(&X).unwrap().clone();
        let edit = apply_one(&group, &mut raster, &mut highlights);
        assert_eq!(edit.cleared, vec![(X, DESERT)]);
        assert_eq!(highlights, HighlightSet::from([Y]));
        assert_eq!(raster.pixels(), &[DESERT, Y, DESERT, Y, Y, DESERT]);
        assert_eq!(edit.before.colours, vec![X, X, X]);
    }

    #[test]
    fn test_apply_unresolved_group_is_noop() {
        let mut raster = two_colour_raster();
        let mut registry = ClassRegistry::new();
        registry.scan(&raster, &legend());
        let mut highlights = HighlightSet::new();
        let group = registry.group(&X).unwrap().clone();
        let edit = apply_one(&group, &mut raster, &mut highlights);
        assert!(edit.is_empty());
        assert_eq!(raster, two_colour_raster());
    }

    #[test]
    fn test_apply_selected() {
        let mut raster = two_colour_raster();
        let mut registry = ClassRegistry::new();
        registry.scan(&raster, &legend());
        let mut selection = SelectionSet::new();
        selection.set_order(registry.colours());
        let mut highlights = HighlightSet::new();

        selection.click(X, Modifiers::CTRL);
        selection.click(Y, Modifiers::CTRL);
        selection.commit(TUNDRA, &mut registry, &mut highlights);
        // reselect X only and apply just that
        selection.click(X, Modifiers::CTRL);
        let edit = apply_selected(&registry, &mut selection, &mut highlights, &mut raster);
        assert_eq!(edit.pixel_count(), 3);
        assert!(selection.is_empty());
        assert_eq!(highlights, HighlightSet::from([Y]));
        assert_eq!(raster.pixels()[0], TUNDRA);
        assert_eq!(raster.pixels()[1], Y);
    }

    #[test]
    fn test_apply_skips_repainted_pixels() {
        let mut raster = two_colour_raster();
        let mut registry = ClassRegistry::new();
        registry.scan(&raster, &legend());
        registry.set_output(&X, DESERT);
        let mut highlights = HighlightSet::from([X]);

        // pixel 2 was X at scan time, then painted over
        raster.set_colour_at(2, TUNDRA);
        let edit = apply_all_highlighted(&registry, &mut highlights, &mut raster);
        assert_eq!(edit.pixel_count(), 2);
        assert_eq!(raster.pixels(), &[DESERT, Y, TUNDRA, Y, Y, DESERT]);
        assert_eq!(edit.before.indices, vec![0, 5]);
    }

    #[test]
    fn test_apply_all_does_not_chain_outputs() {
        // TUNDRA is reclassified as DESERT while X becomes TUNDRA
        let mut raster = RasterBuffer::from_pixels(2, 1, vec![X, TUNDRA]).unwrap();
        let mut registry = ClassRegistry::new();
        registry.scan(&raster, &legend());
        registry.set_output(&X, TUNDRA);
        registry.set_output(&TUNDRA, DESERT);
        let mut highlights = HighlightSet::from([X, TUNDRA]);

        apply_all_highlighted(&registry, &mut highlights, &mut raster);
        assert_eq!(raster.pixels(), &[TUNDRA, DESERT]);
    }

    #[test]
    fn test_undo_of_apply_all_restores_state() {
        use crate::components::history::Command;

        let mut raster = two_colour_raster();
        let mut registry = ClassRegistry::new();
        registry.scan(&raster, &legend());
        registry.set_output(&X, DESERT);
        let mut highlights = HighlightSet::from([X]);
        let cmd = apply_all_highlighted(&registry, &mut highlights, &mut raster).into_command("Apply all");
        cmd.undo(&mut raster, &mut highlights);
        assert_eq!(raster, two_colour_raster());
        assert_eq!(highlights, HighlightSet::from([X]));
    }
}
