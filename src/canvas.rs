// ============================================================================
// RASTER BUFFER — flat row-major grid of colours
// ============================================================================
//
// Origin is the TOP-LEFT pixel: `index = y * width + x`, y grows downward.
// This matches how the `image` crate decodes files, so no flip is applied on
// load or save. Callers that receive bottom-left coordinates (e.g. a renderer
// that uploads flipped textures) convert with `flip_y` before indexing.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::components::colors::Colour;

/// Minimal pixel access the classification and brush code needs.
///
/// Anything that can answer "what colour is at this flat index", "set the
/// colour at this flat index" and "how big are you" can be classified.
pub trait Raster {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn colour_at(&self, index: usize) -> Option<Colour>;
    /// Returns `false` (and writes nothing) when `index` is out of range.
    fn set_colour_at(&mut self, index: usize, colour: Colour) -> bool;

    fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Colour>,
}

impl RasterBuffer {
    pub fn new_filled(width: u32, height: u32, colour: Colour) -> Self {
        Self {
            width,
            height,
            pixels: vec![colour; width as usize * height as usize],
        }
    }

    /// Wrap an existing pixel vector. `None` if the length does not match.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Colour>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        let pixels = img.pixels().map(Colour::from_rgba).collect();
        Self {
            width: img.width(),
            height: img.height(),
            pixels,
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width, self.height);
        for (dst, src) in img.pixels_mut().zip(self.pixels.iter()) {
            *dst = src.to_rgba();
        }
        img
    }

    pub fn pixels(&self) -> &[Colour] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Colour] {
        &mut self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Colour> {
        self.index_of(x, y).map(|i| self.pixels[i])
    }

    pub fn put(&mut self, x: u32, y: u32, colour: Colour) -> bool {
        match self.index_of(x, y) {
            Some(i) => {
                self.pixels[i] = colour;
                true
            }
            None => false,
        }
    }

    /// Flat index for `(x, y)`, or `None` outside the raster.
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// `(x, y)` for a flat index, or `None` outside the raster.
    pub fn coords_of(&self, index: usize) -> Option<(u32, u32)> {
        if index >= self.pixels.len() || self.width == 0 {
            return None;
        }
        let w = self.width as usize;
        Some(((index % w) as u32, (index / w) as u32))
    }

    /// Convert a row number between top-left and bottom-left conventions.
    pub fn flip_y(&self, y: u32) -> u32 {
        self.height.saturating_sub(1).saturating_sub(y)
    }

    /// Mirror rows in place (top row becomes bottom row).
    pub fn flip_vertical(&mut self) {
        let w = self.width as usize;
        let h = self.height as usize;
        for y in 0..h / 2 {
            let (top, bottom) = self.pixels.split_at_mut((h - 1 - y) * w);
            top[y * w..(y + 1) * w].swap_with_slice(&mut bottom[..w]);
        }
    }

    pub fn same_dimensions(&self, other: &RasterBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl Raster for RasterBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn colour_at(&self, index: usize) -> Option<Colour> {
        self.pixels.get(index).copied()
    }

    #[inline]
    fn set_colour_at(&mut self, index: usize, colour: Colour) -> bool {
        match self.pixels.get_mut(index) {
            Some(px) => {
                *px = colour;
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.pixels.len()
    }
}
