use std::collections::BTreeMap;

use crate::canvas::Raster;
use crate::components::colors::Colour;
use crate::components::legend::Legend;

/// Label shown for groups without a legend class.
pub const UNCLASSIFIED: &str = "Unclassified";

/// All pixels sharing one input colour, plus the class they resolve to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassGroup {
    pub input: Colour,
    /// `None` until a class has been chosen for an unknown colour.
    pub output: Option<Colour>,
    pub label: String,
    pub pixels: Vec<usize>,
}

impl ClassGroup {
    pub fn is_resolved(&self) -> bool {
        self.output.is_some()
    }

    /// Whether applying this group would change the raster.
    pub fn is_identity(&self) -> bool {
        self.output == Some(self.input)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub groups: usize,
    pub classifications_needed: usize,
}

impl ScanSummary {
    pub fn is_resolved(&self) -> bool {
        self.classifications_needed == 0
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Colour → group index for one raster.
///
/// Every `scan` rebuilds the groups from scratch; references obtained before
/// a scan must not be held across it.
#[derive(Clone, Debug, Default)]
pub struct ClassRegistry {
    groups: BTreeMap<Colour, ClassGroup>,
    classifications_needed: usize,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the colour partition of `raster` in one pass.
    ///
    /// Legend colours resolve to themselves; every other colour starts
    /// unresolved and counts once towards `classifications_needed`.
    pub fn scan<R: Raster + ?Sized>(&mut self, raster: &R, legend: &Legend) -> ScanSummary {
        self.groups.clear();
        self.classifications_needed = 0;

        for index in 0..raster.len() {
            let Some(colour) = raster.colour_at(index) else { break };
            let group = self.groups.entry(colour).or_insert_with(|| {
                match legend.get(&colour) {
                    Some(class) => ClassGroup {
                        input: colour,
                        output: Some(colour),
                        label: class.name.clone(),
                        pixels: Vec::new(),
                    },
                    None => ClassGroup {
                        input: colour,
                        output: None,
                        label: UNCLASSIFIED.to_string(),
                        pixels: Vec::new(),
                    },
                }
            });
            if group.pixels.is_empty() && group.output.is_none() {
                self.classifications_needed += 1;
            }
            group.pixels.push(index);
        }

        self.summary()
    }

    /// Re-derive each non-empty group's label from its current output.
    pub fn refresh_labels(&mut self, legend: &Legend) {
        for group in self.groups.values_mut() {
            if group.pixels.is_empty() {
                continue;
            }
            group.label = group
                .output
                .and_then(|out| legend.label_for(&out))
                .unwrap_or(UNCLASSIFIED)
                .to_string();
        }
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            groups: self.groups.len(),
            classifications_needed: self.classifications_needed,
        }
    }

    /// Unknown colours found by the last scan.
    pub fn classifications_needed(&self) -> usize {
        self.classifications_needed
    }

    pub fn group(&self, colour: &Colour) -> Option<&ClassGroup> {
        self.groups.get(colour)
    }

    pub fn group_mut(&mut self, colour: &Colour) -> Option<&mut ClassGroup> {
        self.groups.get_mut(colour)
    }

    /// Group owning the pixel at `index`, resolved through the raster's
    /// current colour. `None` for out-of-range indices and for colours the
    /// last scan never saw.
    pub fn group_at_pixel<R: Raster + ?Sized>(&self, raster: &R, index: usize) -> Option<&ClassGroup> {
        raster.colour_at(index).and_then(|c| self.groups.get(&c))
    }

    /// Point a group at a new class colour. Returns `false` for unknown groups.
    pub fn set_output(&mut self, input: &Colour, target: Colour) -> bool {
        match self.groups.get_mut(input) {
            Some(group) => {
                group.output = Some(target);
                true
            }
            None => false,
        }
    }

    /// Groups in colour order.
    pub fn groups(&self) -> impl Iterator<Item = &ClassGroup> {
        self.groups.values()
    }

    /// Input colours in colour order.
    pub fn colours(&self) -> impl Iterator<Item = Colour> + '_ {
        self.groups.keys().copied()
    }

    /// Groups still without an output class.
    pub fn unresolved(&self) -> impl Iterator<Item = &ClassGroup> {
        self.groups.values().filter(|g| !g.is_resolved())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.classifications_needed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RasterBuffer;
    use crate::components::legend::{ClassDefinition, ClassKind};

    const RED: Colour = Colour::new(255, 0, 0);
    const GREEN: Colour = Colour::new(0, 255, 0);
    const BLUE: Colour = Colour::new(0, 0, 255);
    const GREY: Colour = Colour::new(90, 90, 90);

    fn legend() -> Legend {
        Legend::from_classes([
            ClassDefinition::new(ClassKind::Landform, "Plains", GREEN),
            ClassDefinition::new(ClassKind::Landform, "Ocean", BLUE),
        ])
    }

    fn raster() -> RasterBuffer {
        RasterBuffer::from_pixels(
            3,
            3,
            vec![RED, RED, GREEN, GREY, GREEN, BLUE, RED, GREY, GREY],
        )
        .unwrap()
    }

    #[test]
    fn test_scan_groups_and_counts() {
        let mut reg = ClassRegistry::new();
        let summary = reg.scan(&raster(), &legend());
        assert_eq!(summary.groups, 4);
        assert_eq!(summary.classifications_needed, 2);
        assert!(!summary.is_resolved());

        let red = reg.group(&RED).unwrap();
        assert_eq!(red.pixels, vec![0, 1, 6]);
        assert_eq!(red.output, None);
        assert_eq!(red.label, UNCLASSIFIED);

        let green = reg.group(&GREEN).unwrap();
        assert_eq!(green.output, Some(GREEN));
        assert_eq!(green.label, "Plains");
        assert!(green.is_identity());
    }

    #[test]
    fn test_scan_partitions_every_pixel_once() {
        let r = raster();
        let mut reg = ClassRegistry::new();
        reg.scan(&r, &legend());
        let mut all: Vec<usize> = reg.groups().flat_map(|g| g.pixels.iter().copied()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..r.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let r = raster();
        let mut reg = ClassRegistry::new();
        let first = reg.scan(&r, &legend());
        let first_groups: Vec<ClassGroup> = reg.groups().cloned().collect();
        let second = reg.scan(&r, &legend());
        let second_groups: Vec<ClassGroup> = reg.groups().cloned().collect();
        assert_eq!(first, second);
        assert_eq!(first_groups, second_groups);
    }

    #[test]
    fn test_empty_legend_needs_everything() {
        let mut reg = ClassRegistry::new();
        let summary = reg.scan(&raster(), &Legend::new());
        assert_eq!(summary.classifications_needed, 4);
        assert_eq!(reg.unresolved().count(), 4);
    }

    #[test]
    fn test_refresh_labels_follows_output() {
        let mut reg = ClassRegistry::new();
        let legend = legend();
        reg.scan(&raster(), &legend);
        assert!(reg.set_output(&RED, BLUE));
        assert!(reg.set_output(&GREY, Colour::new(1, 2, 3)));
        assert!(!reg.set_output(&Colour::WHITE, BLUE));
        reg.refresh_labels(&legend);
        assert_eq!(reg.group(&RED).unwrap().label, "Ocean");
        assert_eq!(reg.group(&GREY).unwrap().label, UNCLASSIFIED);
    }

    #[test]
    fn test_group_at_pixel_tolerates_stale_clicks() {
        let mut r = raster();
        let mut reg = ClassRegistry::new();
        reg.scan(&r, &legend());
        assert_eq!(reg.group_at_pixel(&r, 5).map(|g| g.input), Some(BLUE));
        assert!(reg.group_at_pixel(&r, 99).is_none());
        r.set_colour_at(5, Colour::WHITE);
        assert!(reg.group_at_pixel(&r, 5).is_none());
    }
}
