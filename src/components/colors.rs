use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COLOUR — opaque RGB key used by rasters, legends and classification groups
// ============================================================================

/// A single map pixel value.
///
/// Ordering is lexicographic over `(r, g, b)`. Every sorted view of colours in
/// the crate (group iteration, shift-range selection, merge passes) relies on
/// this order, so it must stay derived from the field order below.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::new(0, 0, 0);
    pub const WHITE: Colour = Colour::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance in RGB space.
    pub fn distance(&self, other: &Colour) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Alpha is discarded; classification inputs are treated as opaque.
    pub fn from_rgba(px: &Rgba<u8>) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }

    /// `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Error returned when a colour string is not `#rrggbb` / `rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColourError(pub String);

impl fmt::Display for ParseColourError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid colour '{}', expected #rrggbb", self.0)
    }
}

impl std::error::Error for ParseColourError {}

impl FromStr for Colour {
    type Err = ParseColourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColourError(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColourError(s.to_string()))
        };
        Ok(Colour::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parse_and_format() {
        let c: Colour = "#1a2B3c".parse().unwrap();
        assert_eq!(c, Colour::new(0x1a, 0x2b, 0x3c));
        assert_eq!(c.to_hex(), "#1a2b3c");
        assert_eq!("ff0000".parse::<Colour>().unwrap(), Colour::new(255, 0, 0));
        assert!("#12345".parse::<Colour>().is_err());
        assert!("#gg0000".parse::<Colour>().is_err());
    }

    #[test]
    fn test_order_is_red_then_green_then_blue() {
        let mut v = vec![
            Colour::new(1, 0, 0),
            Colour::new(0, 5, 0),
            Colour::new(0, 0, 9),
            Colour::new(0, 5, 1),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                Colour::new(0, 0, 9),
                Colour::new(0, 5, 0),
                Colour::new(0, 5, 1),
                Colour::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn test_distance() {
        let a = Colour::new(0, 0, 0);
        let b = Colour::new(3, 4, 0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_rgba_drops_alpha() {
        let c = Colour::from_rgba(&Rgba([10, 20, 30, 0]));
        assert_eq!(c, Colour::new(10, 20, 30));
        assert_eq!(c.to_rgba(), Rgba([10, 20, 30, 255]));
    }
}
