//! Geometry primitives
//!
//! Rectangles in widget (layout) coordinates, xdg resize edges and the
//! interactive resize computation used while the pointer drags a border.

use bitflags::bitflags;

/// An integer rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Check if the rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Check if a point is inside the rectangle
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x as f64
            && py >= self.y as f64
            && px < self.right() as f64
            && py < self.bottom() as f64
    }

    /// Return a copy translated by (dx, dy)
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Overlapping area, if any
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let rect = Rect::new(x, y, right - x, bottom - y);
        (!rect.is_empty()).then_some(rect)
    }
}

bitflags! {
    /// Window edges, bit-compatible with `xdg_toplevel.resize_edge`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Edges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

/// State captured when an interactive resize starts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResizeGrab {
    /// Pointer offset from the grabbed border
    pub grab_x: f64,
    pub grab_y: f64,
    /// Window geometry box in layout coordinates at grab time
    pub grab_box: Rect,
    /// Edges being dragged
    pub edges: Edges,
}

/// Compute the new window geometry box for a pointer position.
///
/// Returns `None` when both dimensions would end up below the client's
/// minimum size. When only one dimension is too small it is clamped to the
/// minimum; if the dragged edge is the left (or top) one, that edge is
/// pushed back so the opposite edge stays put.
pub fn compute_resize(pointer: (f64, f64), grab: &ResizeGrab, min_size: (i32, i32)) -> Option<Rect> {
    let border_x = (pointer.0 - grab.grab_x) as i32;
    let border_y = (pointer.1 - grab.grab_y) as i32;
    let edges = grab.edges;

    let mut left = grab.grab_box.x;
    let mut right = grab.grab_box.right();
    let mut top = grab.grab_box.y;
    let mut bottom = grab.grab_box.bottom();

    if edges.contains(Edges::TOP) {
        top = border_y;
        if top >= bottom {
            top = bottom - 1;
        }
    } else if edges.contains(Edges::BOTTOM) {
        bottom = border_y;
        if bottom <= top {
            bottom = top + 1;
        }
    }

    if edges.contains(Edges::LEFT) {
        left = border_x;
        if left >= right {
            left = right - 1;
        }
    } else if edges.contains(Edges::RIGHT) {
        right = border_x;
        if right <= left {
            right = left + 1;
        }
    }

    let (min_width, min_height) = min_size;
    let mut width = right - left;
    let mut height = bottom - top;

    if width < min_width && height < min_height {
        return None;
    }

    if width < min_width {
        if edges.contains(Edges::LEFT) {
            left -= min_width - width;
        }
        width = min_width;
    }

    if height < min_height {
        if edges.contains(Edges::TOP) {
            top -= min_height - height;
        }
        height = min_height;
    }

    Some(Rect::new(left, top, width, height))
}
