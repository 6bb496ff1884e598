//! wl_region support
//!
//! Regions are kept as the ordered list of add/subtract operations the
//! client sent; point queries replay them.

use crate::compositor::Rect;

/// One region request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionOp {
    Add(Rect),
    Subtract(Rect),
}

/// A region for defining input areas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    ops: Vec<RegionOp>,
}

impl Region {
    /// Create a new empty region
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Add a rectangle to the region
    pub fn add(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.ops.push(RegionOp::Add(Rect::new(x, y, width, height)));
    }

    /// Subtract a rectangle from the region
    pub fn subtract(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.ops
            .push(RegionOp::Subtract(Rect::new(x, y, width, height)));
    }

    /// Check if a point is inside the region
    pub fn contains(&self, px: i32, py: i32) -> bool {
        let (px, py) = (px as f64, py as f64);
        self.ops.iter().fold(false, |inside, op| match op {
            RegionOp::Add(rect) if rect.contains(px, py) => true,
            RegionOp::Subtract(rect) if rect.contains(px, py) => false,
            _ => inside,
        })
    }

    /// Bounding box of everything ever added
    pub fn extents(&self) -> Rect {
        self.ops.iter().fold(Rect::default(), |acc, op| match op {
            RegionOp::Add(rect) => acc.union(rect),
            RegionOp::Subtract(_) => acc,
        })
    }

    /// Check if the region is empty
    pub fn is_empty(&self) -> bool {
        self.extents().is_empty()
    }
}
