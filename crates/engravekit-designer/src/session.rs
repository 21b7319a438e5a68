//! Session-scoped state shared between the engine and its callers: the
//! clipboard, the 2D reference cursor, the externally reported machine head
//! position, grid and view settings, and the current zoom.
//!
//! This is plain data passed explicitly into the engine; nothing here is a
//! global.

use engravekit_core::Point;

use crate::model::Element;
use crate::snap::GridSettings;

/// Presentation toggles. Flipping these is never checkpointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    pub show_grid: bool,
    pub show_rapids: bool,
    pub show_disabled: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            show_grid: true,
            show_rapids: true,
            show_disabled: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionContext {
    /// Deep-cloned content of the last copy/cut; never aliases the tree.
    pub clipboard: Option<Element>,
    /// User-placed 2D reference cursor, the highest priority snap target.
    pub cursor: Option<Point>,
    /// Last reported machine head position.
    pub machine_position: Option<Point>,
    /// Whether the head marker is currently visible (a hidden head is not a
    /// snap target).
    pub machine_visible: bool,
    pub grid: GridSettings,
    pub view: ViewSettings,
    /// World units per screen pixel divisor; screen tolerances are divided
    /// by this to get world tolerances.
    pub zoom: f64,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            ..Self::default()
        }
    }

    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        self.cursor = cursor;
    }

    pub fn update_machine_position(&mut self, position: Point, visible: bool) {
        self.machine_position = Some(position);
        self.machine_visible = visible;
    }

    /// Zoom is clamped to stay usable as a divisor.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(1e-6, 1e6);
    }
}
