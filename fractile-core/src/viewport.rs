use crate::geom::{Point2, ScreenRect};
use serde::{Deserialize, Serialize};

/// Maps between domain coordinates and screen coordinates.
///
/// - `offset`: the domain-space point shown at the center of the screen
/// - `scale`: screen pixels per domain unit (must stay positive)
/// - `size`: screen dimensions in pixels
///
/// The drawable the image lands on is owned by the embedding application;
/// draw calls receive it separately.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset: Point2,
    pub scale: f64,
    pub size: (f64, f64),
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Point2::ZERO,
            scale: 1.0,
            size: (640.0, 640.0),
        }
    }
}

impl Viewport {
    pub fn new(offset: Point2, scale: f64, size: (f64, f64)) -> Self {
        debug_assert!(scale > 0.0, "viewport scale must be positive");
        Self {
            offset,
            scale,
            size,
        }
    }

    /// Convert a domain-space point to screen space.
    pub fn to_screen(&self, p: Point2) -> Point2 {
        Point2::new(
            (p.x - self.offset.x) * self.scale + self.size.0 / 2.0,
            (p.y - self.offset.y) * self.scale + self.size.1 / 2.0,
        )
    }

    /// Convert a screen-space point back to domain space.
    pub fn to_viewport(&self, p: Point2) -> Point2 {
        Point2::new(
            (p.x - self.size.0 / 2.0) / self.scale + self.offset.x,
            (p.y - self.size.1 / 2.0) / self.scale + self.offset.y,
        )
    }

    /// Clamp a screen-space rectangle to the visible `[0, size]` range.
    pub fn clip(&self, rect: ScreenRect) -> ScreenRect {
        ScreenRect {
            left: rect.left.max(0.0),
            top: rect.top.max(0.0),
            right: rect.right.min(self.size.0),
            bottom: rect.bottom.min(self.size.1),
        }
    }

    /// Screen-space center point.
    pub fn screen_center(&self) -> Point2 {
        Point2::new(self.size.0 / 2.0, self.size.1 / 2.0)
    }
}
