//! Detected regions in pixel coordinates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle in pixel coordinates.
///
/// Eye and smile rectangles are expressed relative to the top-left corner of
/// the face they were found in; face rectangles are relative to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Vertical center.
    #[inline]
    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.height as f64 / 2.0
    }

    /// Horizontal center.
    #[inline]
    pub fn center_x(&self) -> f64 {
        self.x as f64 + self.width as f64 / 2.0
    }

    /// Area in pixels.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip the rectangle to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the frame.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clipped = Rect {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Translate a rectangle expressed relative to `origin` into the
    /// coordinate space `origin` lives in.
    pub fn offset_by(&self, origin: &Rect) -> Rect {
        Rect {
            x: self.x + origin.x,
            y: self.y + origin.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Scale all coordinates by `factor`, rounding to the nearest pixel.
    pub fn scaled(&self, factor: f64) -> Rect {
        let s = |v: u32| (v as f64 * factor).round().max(0.0) as u32;
        Rect {
            x: s(self.x),
            y: s(self.y),
            width: s(self.width),
            height: s(self.height),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Which detector produced a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Face,
    Eye,
    Smile,
}

impl RegionKind {
    pub const ALL: &'static [RegionKind] = &[RegionKind::Face, RegionKind::Eye, RegionKind::Smile];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Face => "face",
            RegionKind::Eye => "eye",
            RegionKind::Smile => "smile",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rectangle tagged with the detector that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub rect: Rect,
    pub kind: RegionKind,
}

impl Region {
    pub fn new(rect: Rect, kind: RegionKind) -> Self {
        Self { rect, kind }
    }
}
