use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::canvas::RasterBuffer;
use crate::components::colors::Colour;

/// Summary of a [`merge_similar_colours`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub colours_before: usize,
    pub colours_after: usize,
    pub pixels_changed: usize,
}

/// Fold rare colours and their near neighbours together.
///
/// Anti-aliased or JPEG-damaged inputs produce thousands of colours that each
/// cover a handful of pixels. For every colour (ascending order) whose pixel
/// count is below `len / clamp(100 - severity, 1, 100)`, every other colour
/// still present within RGB distance `10 + severity` is repainted to it.
///
/// Higher severity merges more aggressively.
pub fn merge_similar_colours(raster: &mut RasterBuffer, severity: u32) -> MergeReport {
    let mut buckets = colour_buckets(raster);
    let colours_before = buckets.len();
    let total = raster.pixels().len();
    let divisor = 100u32.saturating_sub(severity).clamp(1, 100) as usize;
    let rare_below = total / divisor;
    let max_distance = 10.0 + severity as f64;

    let keys: Vec<Colour> = buckets.keys().copied().collect();
    let mut pixels_changed = 0;
    for &target in &keys {
        let target_len = match buckets.get(&target) {
            Some(px) if !px.is_empty() => px.len(),
            _ => continue,
        };
        if target_len >= rare_below {
            continue;
        }

        let mut absorbed = Vec::new();
        for &other in &keys {
            if other == target || target.distance(&other) >= max_distance {
                continue;
            }
            if let Some(px) = buckets.get_mut(&other)
                && !px.is_empty()
            {
                absorbed.append(px);
            }
        }
        if absorbed.is_empty() {
            continue;
        }

        let dst = raster.pixels_mut();
        for &idx in &absorbed {
            dst[idx] = target;
        }
        pixels_changed += absorbed.len();
        if let Some(px) = buckets.get_mut(&target) {
            px.extend(absorbed);
        }
    }

    MergeReport {
        colours_before,
        colours_after: buckets.values().filter(|px| !px.is_empty()).count(),
        pixels_changed,
    }
}

/// Pixel indices grouped by colour, built in parallel per row band.
fn colour_buckets(raster: &RasterBuffer) -> BTreeMap<Colour, Vec<usize>> {
    const BAND: usize = 64 * 1024;
    raster
        .pixels()
        .par_chunks(BAND)
        .enumerate()
        .map(|(band, chunk)| {
            let base = band * BAND;
            let mut local: BTreeMap<Colour, Vec<usize>> = BTreeMap::new();
            for (i, c) in chunk.iter().enumerate() {
                local.entry(*c).or_default().push(base + i);
            }
            local
        })
        .reduce(BTreeMap::new, |mut a, b| {
            for (colour, mut idx) in b {
                a.entry(colour).or_default().append(&mut idx);
            }
            a
        })
}

/// Distinct colour count, for reporting.
pub fn count_colours(raster: &RasterBuffer) -> usize {
    colour_buckets(raster).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Colour = Colour::new(100, 100, 100);
    const NEAR: Colour = Colour::new(103, 100, 100);
    const FAR: Colour = Colour::new(200, 0, 0);

    #[test]
    fn test_rare_colour_absorbs_neighbours() {
        // BASE: 1 px, NEAR: 2 px, FAR: 97 px; rare threshold at severity 0 is 100 / 100 = 1
        // so nothing is rare yet.
        let mut pixels = vec![FAR; 100];
        pixels[0] = BASE;
        pixels[1] = NEAR;
        pixels[2] = NEAR;
        let mut raster = RasterBuffer::from_pixels(10, 10, pixels.clone()).unwrap();
        let report = merge_similar_colours(&mut raster, 0);
        assert_eq!(report.pixels_changed, 0);
        assert_eq!(report.colours_after, 3);

        // severity 50: threshold 100 / 50 = 2, BASE (1 px) is rare and NEAR is within 60
        let mut raster = RasterBuffer::from_pixels(10, 10, pixels).unwrap();
        let report = merge_similar_colours(&mut raster, 50);
        assert_eq!(report.colours_before, 3);
        assert_eq!(report.colours_after, 2);
        assert_eq!(report.pixels_changed, 2);
        assert_eq!(&raster.pixels()[..3], &[BASE, BASE, BASE]);
        assert_eq!(raster.pixels()[3], FAR);
    }

    #[test]
    fn test_distant_colours_untouched() {
        let mut pixels = vec![FAR; 16];
        pixels[5] = BASE;
        let mut raster = RasterBuffer::from_pixels(4, 4, pixels.clone()).unwrap();
        let report = merge_similar_colours(&mut raster, 90);
        assert_eq!(report.pixels_changed, 0);
        assert_eq!(raster.pixels(), pixels.as_slice());
    }

    #[test]
    fn test_count_colours() {
        let raster = RasterBuffer::from_pixels(2, 2, vec![BASE, NEAR, FAR, BASE]).unwrap();
        assert_eq!(count_colours(&raster), 3);
    }
}
