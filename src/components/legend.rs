use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::components::colors::Colour;

/// Which generator stage a class belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    Climate,
    Landform,
}

impl ClassKind {
    pub fn name(&self) -> &'static str {
        match self {
            ClassKind::Climate => "climate",
            ClassKind::Landform => "landform",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "climate" => Some(ClassKind::Climate),
            "landform" | "land" => Some(ClassKind::Landform),
            _ => None,
        }
    }
}

/// A semantic class the generator understands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    pub kind: ClassKind,
    pub primary: Colour,
    /// Colours that mean the same class and are rewritten to `primary`
    /// before analysis.
    pub secondary: Vec<Colour>,
}

impl ClassDefinition {
    pub fn new(kind: ClassKind, name: impl Into<String>, primary: Colour) -> Self {
        Self {
            name: name.into(),
            kind,
            primary,
            secondary: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, colours: impl IntoIterator<Item = Colour>) -> Self {
        self.secondary.extend(colours);
        self
    }
}

// ============================================================================
// LEGEND — the allowed class set for one classification pass
// ============================================================================

/// Classes keyed by primary colour, with an index from alias colours back to
/// their primary.
///
/// A colour found here needs no manual classification.
#[derive(Clone, Debug, Default)]
pub struct Legend {
    classes: BTreeMap<Colour, ClassDefinition>,
    aliases: BTreeMap<Colour, Colour>,
}

impl Legend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_classes(classes: impl IntoIterator<Item = ClassDefinition>) -> Self {
        let mut legend = Self::new();
        for class in classes {
            legend.insert(class);
        }
        legend
    }

    /// Insert or replace the class registered under `class.primary`.
    ///
    /// An alias equal to some primary colour is ignored: primaries always win.
    pub fn insert(&mut self, class: ClassDefinition) {
        if let Some(old) = self.classes.remove(&class.primary) {
            for alias in &old.secondary {
                self.aliases.remove(alias);
            }
        }
        // a primary colour can no longer act as someone's alias
        self.aliases.remove(&class.primary);
        for alias in &class.secondary {
            if *alias != class.primary && !self.classes.contains_key(alias) {
                self.aliases.insert(*alias, class.primary);
            }
        }
        self.classes.insert(class.primary, class);
    }

    pub fn get(&self, colour: &Colour) -> Option<&ClassDefinition> {
        self.classes.get(colour)
    }

    pub fn contains(&self, colour: &Colour) -> bool {
        self.classes.contains_key(colour)
    }

    /// Primary colour for an alias, if `colour` is one.
    pub fn primary_for_alias(&self, colour: &Colour) -> Option<Colour> {
        self.aliases.get(colour).copied()
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&ClassDefinition> {
        let wanted = name.trim();
        self.classes
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(wanted))
    }

    /// Name of the class for `colour`, if it is a primary colour.
    pub fn label_for(&self, colour: &Colour) -> Option<&str> {
        self.classes.get(colour).map(|c| c.name.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    pub fn has_aliases(&self) -> bool {
        !self.aliases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Keep only classes of one kind.
    pub fn filtered(&self, kind: ClassKind) -> Legend {
        Legend::from_classes(self.classes.values().filter(|c| c.kind == kind).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(r: u8, g: u8, b: u8) -> Colour {
        Colour::new(r, g, b)
    }

    #[test]
    fn test_alias_lookup() {
        let legend = Legend::from_classes([
            ClassDefinition::new(ClassKind::Climate, "Hot desert", c(255, 0, 0))
                .with_secondary([c(250, 0, 0), c(245, 0, 0)]),
            ClassDefinition::new(ClassKind::Climate, "Tundra", c(0, 0, 255)),
        ]);
        assert_eq!(legend.primary_for_alias(&c(250, 0, 0)), Some(c(255, 0, 0)));
        assert_eq!(legend.primary_for_alias(&c(255, 0, 0)), None);
        assert!(legend.contains(&c(0, 0, 255)));
        assert!(!legend.contains(&c(250, 0, 0)));
        assert_eq!(legend.label_for(&c(255, 0, 0)), Some("Hot desert"));
        assert_eq!(legend.find_by_name("tundra").map(|d| d.primary), Some(c(0, 0, 255)));
    }

    #[test]
    fn test_primary_beats_alias() {
        let legend = Legend::from_classes([
            ClassDefinition::new(ClassKind::Landform, "Hills", c(1, 1, 1))
                .with_secondary([c(2, 2, 2)]),
            ClassDefinition::new(ClassKind::Landform, "Plains", c(2, 2, 2)),
        ]);
        assert_eq!(legend.primary_for_alias(&c(2, 2, 2)), None);
        assert_eq!(legend.len(), 2);
    }

    #[test]
    fn test_replace_drops_old_aliases() {
        let mut legend = Legend::new();
        legend.insert(
            ClassDefinition::new(ClassKind::Climate, "Old", c(9, 9, 9)).with_secondary([c(8, 8, 8)]),
        );
        legend.insert(ClassDefinition::new(ClassKind::Climate, "New", c(9, 9, 9)));
        assert_eq!(legend.primary_for_alias(&c(8, 8, 8)), None);
        assert_eq!(legend.label_for(&c(9, 9, 9)), Some("New"));
        assert!(!legend.has_aliases());
    }

    #[test]
    fn test_filtered_by_kind() {
        let legend = Legend::from_classes([
            ClassDefinition::new(ClassKind::Climate, "Steppe", c(1, 0, 0)),
            ClassDefinition::new(ClassKind::Landform, "Peaks", c(0, 1, 0)),
        ]);
        let land = legend.filtered(ClassKind::Landform);
        assert_eq!(land.len(), 1);
        assert!(land.contains(&c(0, 1, 0)));
    }
}
