// ============================================================================
// INPUT PREPROCESSING — alias folding and size checks before analysis
// ============================================================================

use rayon::prelude::*;
use std::fmt;

use crate::canvas::{Raster, RasterBuffer};
use crate::components::legend::Legend;

/// Rewrite every secondary (alias) colour to its class's primary colour.
/// Returns the number of pixels changed.
pub fn normalize_aliases(raster: &mut RasterBuffer, legend: &Legend) -> usize {
    if !legend.has_aliases() {
        return 0;
    }
    raster
        .pixels_mut()
        .par_iter_mut()
        .map(|px| match legend.primary_for_alias(px) {
            Some(primary) => {
                *px = primary;
                1
            }
            None => 0,
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    Empty,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::SizeMismatch { expected, actual } => write!(
                f,
                "input map is {}x{} but the generator expects {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            InputError::Empty => write!(f, "input map has no pixels"),
        }
    }
}

impl std::error::Error for InputError {}

/// Reject a raster whose dimensions differ from what the generator expects.
pub fn validate_dimensions<R: Raster + ?Sized>(
    raster: &R,
    expected_width: u32,
    expected_height: u32,
) -> Result<(), InputError> {
    if raster.is_empty() {
        return Err(InputError::Empty);
    }
    if raster.width() != expected_width || raster.height() != expected_height {
        return Err(InputError::SizeMismatch {
            expected: (expected_width, expected_height),
            actual: (raster.width(), raster.height()),
        });
    }
    Ok(())
}
