//! xdg_positioner placement
//!
//! Popups are placed relative to their parent's window geometry by
//! anchoring a rectangle, applying gravity and offset. Constraint
//! adjustment is not applied: the widget clips anything that falls outside.

use crate::compositor::Rect;

/// XDG positioner for popup placement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XdgPositioner {
    /// Size of the popup
    pub size: (i32, i32),
    /// Anchor rectangle in parent window geometry coordinates
    pub anchor_rect: Rect,
    /// Anchor edge
    pub anchor: Anchor,
    /// Gravity
    pub gravity: Gravity,
    /// Constraint adjustment bits, recorded but unused
    pub constraint_adjustment: u32,
    /// Offset from calculated position
    pub offset: (i32, i32),
    /// Reposition when the parent moves
    pub reactive: bool,
}

impl XdgPositioner {
    /// Create a new positioner
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the popup size
    pub fn set_size(&mut self, width: i32, height: i32) {
        self.size = (width, height);
    }

    /// Set the anchor rectangle
    pub fn set_anchor_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.anchor_rect = Rect::new(x, y, width, height);
    }

    /// Set the anchor edge
    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    /// Set the gravity
    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.gravity = gravity;
    }

    /// Set constraint adjustment
    pub fn set_constraint_adjustment(&mut self, adjustment: u32) {
        self.constraint_adjustment = adjustment;
    }

    /// Set offset
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    /// A positioner needs a non-empty size before it can place a popup
    pub fn is_complete(&self) -> bool {
        self.size.0 > 0 && self.size.1 > 0
    }

    /// Popup geometry relative to the parent's window geometry
    pub fn calculate_geometry(&self) -> Rect {
        let Rect {
            x: ax,
            y: ay,
            width: aw,
            height: ah,
        } = self.anchor_rect;

        let (anchor_x, anchor_y) = match self.anchor {
            Anchor::None => (ax + aw / 2, ay + ah / 2),
            Anchor::Top => (ax + aw / 2, ay),
            Anchor::Bottom => (ax + aw / 2, ay + ah),
            Anchor::Left => (ax, ay + ah / 2),
            Anchor::Right => (ax + aw, ay + ah / 2),
            Anchor::TopLeft => (ax, ay),
            Anchor::TopRight => (ax + aw, ay),
            Anchor::BottomLeft => (ax, ay + ah),
            Anchor::BottomRight => (ax + aw, ay + ah),
        };

        let (popup_w, popup_h) = self.size;
        let (x, y) = match self.gravity {
            Gravity::None => (anchor_x - popup_w / 2, anchor_y - popup_h / 2),
            Gravity::Top => (anchor_x - popup_w / 2, anchor_y - popup_h),
            Gravity::Bottom => (anchor_x - popup_w / 2, anchor_y),
            Gravity::Left => (anchor_x - popup_w, anchor_y - popup_h / 2),
            Gravity::Right => (anchor_x, anchor_y - popup_h / 2),
            Gravity::TopLeft => (anchor_x - popup_w, anchor_y - popup_h),
            Gravity::TopRight => (anchor_x, anchor_y - popup_h),
            Gravity::BottomLeft => (anchor_x - popup_w, anchor_y),
            Gravity::BottomRight => (anchor_x, anchor_y),
        };

        Rect::new(x + self.offset.0, y + self.offset.1, popup_w, popup_h)
    }
}

/// Anchor edge for popup positioning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Anchor {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

impl Anchor {
    /// Decode the `xdg_positioner.anchor` wire value
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Anchor::Top,
            2 => Anchor::Bottom,
            3 => Anchor::Left,
            4 => Anchor::Right,
            5 => Anchor::TopLeft,
            6 => Anchor::BottomLeft,
            7 => Anchor::TopRight,
            8 => Anchor::BottomRight,
            _ => Anchor::None,
        }
    }
}

/// Gravity for popup positioning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gravity {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

impl Gravity {
    /// Decode the `xdg_positioner.gravity` wire value
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Gravity::Top,
            2 => Gravity::Bottom,
            3 => Gravity::Left,
            4 => Gravity::Right,
            5 => Gravity::TopLeft,
            6 => Gravity::BottomLeft,
            7 => Gravity::TopRight,
            8 => Gravity::BottomRight,
            _ => Gravity::None,
        }
    }
}
