use std::collections::VecDeque;

use crate::canvas::Raster;
use crate::components::colors::Colour;

// ============================================================================
// CLICK EVENTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InteractionKind {
    #[default]
    None,
    /// Primary button: paint / select.
    Click,
    /// Secondary button: erase / clear.
    SecondaryClick,
    Drag,
}

/// A pointer interaction already resolved to a flat raster index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickEvent {
    pub pixel: i64,
    pub kind: InteractionKind,
}

impl ClickEvent {
    /// Returned by [`ClickEventQueue::pop`] when nothing is pending.
    pub const NONE: ClickEvent = ClickEvent {
        pixel: -1,
        kind: InteractionKind::None,
    };

    pub fn new(pixel: i64, kind: InteractionKind) -> Self {
        Self { pixel, kind }
    }

    pub fn is_none(&self) -> bool {
        self.pixel < 0
    }
}

/// How the queue behaves when events arrive faster than they are consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Plain FIFO; every event is kept.
    #[default]
    Unbounded,
    /// At most one pending event; new events are rejected until it is popped.
    Coalesce,
}

impl QueuePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            QueuePolicy::Unbounded => "unbounded",
            QueuePolicy::Coalesce => "coalesce",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "unbounded" => Some(QueuePolicy::Unbounded),
            "coalesce" => Some(QueuePolicy::Coalesce),
            _ => None,
        }
    }
}

/// Events produced by the input layer, drained by the brush once per frame.
#[derive(Clone, Debug, Default)]
pub struct ClickEventQueue {
    events: VecDeque<ClickEvent>,
    policy: QueuePolicy,
}

impl ClickEventQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            events: VecDeque::new(),
            policy,
        }
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: QueuePolicy) {
        self.policy = policy;
        if policy == QueuePolicy::Coalesce {
            self.events.truncate(1);
        }
    }

    /// Returns `false` if the event was rejected by the coalescing policy.
    pub fn push(&mut self, event: ClickEvent) -> bool {
        if self.policy == QueuePolicy::Coalesce && !self.events.is_empty() {
            return false;
        }
        self.events.push_back(event);
        true
    }

    /// Oldest pending event, or [`ClickEvent::NONE`].
    pub fn pop(&mut self) -> ClickEvent {
        self.events.pop_front().unwrap_or(ClickEvent::NONE)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// ============================================================================
// BRUSH OFFSETS
// ============================================================================

/// Flat index deltas covering a disk of `radius` on a raster of `width`.
///
/// Only valid for the width it was built for; rebuild whenever the raster
/// width or the brush radius changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrushOffsets {
    width: u32,
    radius: u32,
    /// (dx, dy) pairs, row-major from the top of the disk.
    deltas: Vec<(i32, i32)>,
    flat: Vec<i64>,
}

impl BrushOffsets {
    /// All `(dx, dy)` with `dx² + dy² <= radius²`.
    ///
    /// Radius 0 yields the single zero offset, so a zero-size brush still
    /// touches the clicked pixel.
    pub fn compute(width: u32, radius: u32) -> Self {
        let r = radius as i64;
        let r_sq = r * r;
        let mut deltas = Vec::new();
        let mut flat = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r_sq {
                    deltas.push((dx as i32, dy as i32));
                    flat.push(dy * width as i64 + dx);
                }
            }
        }
        Self {
            width,
            radius,
            deltas,
            flat,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn flat(&self) -> &[i64] {
        &self.flat
    }

    pub fn deltas(&self) -> &[(i32, i32)] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Whether these offsets can be reused for `(width, radius)`.
    pub fn matches(&self, width: u32, radius: u32) -> bool {
        self.width == width && self.radius == radius
    }
}

// ============================================================================
// EXPANSION
// ============================================================================

/// How brush pixels near the left/right raster edge are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    /// Only the flat index range is checked. A disk crossing the left or
    /// right edge wraps into the neighbouring row.
    #[default]
    Linear,
    /// Offsets are clipped in 2D; nothing leaves the clicked pixel's columns.
    Clipped,
}

impl EdgePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            EdgePolicy::Linear => "linear",
            EdgePolicy::Clipped => "clipped",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "linear" => Some(EdgePolicy::Linear),
            "clipped" => Some(EdgePolicy::Clipped),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    pub radius: u32,
    /// Uniform strength applied to every affected pixel, 0.0–1.0.
    pub strength: f32,
    pub edge: EdgePolicy,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 1,
            strength: 1.0,
            edge: EdgePolicy::Linear,
        }
    }
}

/// Every in-range pixel under the brush centred on `event`.
///
/// Sentinel events expand to nothing. Candidates outside `0..raster_size`
/// are dropped, never wrapped around the whole buffer.
pub fn expand(
    event: ClickEvent,
    offsets: &BrushOffsets,
    raster_size: usize,
    strength: f32,
    edge: EdgePolicy,
) -> Vec<(ClickEvent, f32)> {
    if event.is_none() {
        return Vec::new();
    }
    let size = raster_size as i64;
    let width = offsets.width() as i64;

    let mut affected = Vec::with_capacity(offsets.len());
    for (&delta, &(dx, _)) in offsets.flat().iter().zip(offsets.deltas()) {
        let candidate = event.pixel + delta;
        if candidate < 0 || candidate >= size {
            continue;
        }
        if edge == EdgePolicy::Clipped && width > 0 {
            let x = event.pixel % width + dx as i64;
            if x < 0 || x >= width {
                continue;
            }
        }
        affected.push((ClickEvent::new(candidate, event.kind), strength));
    }
    affected
}

// ============================================================================
// PAINTING
// ============================================================================

/// Write `colour` into every affected pixel of a class raster.
/// Returns the indices that were written.
pub fn paint_class<R: Raster + ?Sized>(
    raster: &mut R,
    affected: &[(ClickEvent, f32)],
    colour: Colour,
) -> Vec<usize> {
    let mut touched = Vec::with_capacity(affected.len());
    for (ev, _) in affected {
        let idx = ev.pixel as usize;
        if raster.set_colour_at(idx, colour) {
            touched.push(idx);
        }
    }
    touched
}

/// Paint into a scalar data layer (temperature, humidity, …).
///
/// Primary clicks write `strength * multiplier`, secondary clicks write zero.
/// Pixels where `mask` is false (e.g. water on a land-only layer) are skipped.
/// Returns `true` if there was anything to process.
pub fn draw_into_layer<T>(
    affected: &[(ClickEvent, f32)],
    mask: &[bool],
    data: &mut [T],
    multiplier: f64,
) -> bool
where
    T: Copy + Default + FromStrength,
{
    if affected.is_empty() {
        return false;
    }
    for (ev, strength) in affected {
        let idx = ev.pixel as usize;
        if idx >= data.len() || !mask.get(idx).copied().unwrap_or(false) {
            continue;
        }
        match ev.kind {
            InteractionKind::Click => data[idx] = T::from_strength(*strength as f64 * multiplier),
            InteractionKind::SecondaryClick => data[idx] = T::default(),
            _ => {}
        }
    }
    true
}

/// Conversion used by [`draw_into_layer`] for the painted value.
pub trait FromStrength {
    fn from_strength(v: f64) -> Self;
}

impl FromStrength for f32 {
    fn from_strength(v: f64) -> Self {
        v as f32
    }
}

impl FromStrength for f64 {
    fn from_strength(v: f64) -> Self {
        v
    }
}

impl FromStrength for u8 {
    fn from_strength(v: f64) -> Self {
        v.round().clamp(0.0, 255.0) as u8
    }
}

impl FromStrength for i32 {
    fn from_strength(v: f64) -> Self {
        v.round() as i32
    }
}
