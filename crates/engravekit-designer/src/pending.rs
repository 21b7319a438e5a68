//! In-flight interactive gestures.
//!
//! A multi-step pointer operation (drag to move, drag to rotate or scale,
//! click-by-click polyline entry) lives in a [`PendingOperation`] owned by
//! the dispatcher. Intermediate pointer events mutate the working document
//! freely; exactly one checkpoint is taken on commit, and cancellation
//! rolls the document back to the pre-gesture snapshot.

use engravekit_core::Point;

use crate::model::ElementId;

/// The gesture currently accumulating pointer events.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation {
    /// Dragging the selection; `last` is the pointer position the selection
    /// currently reflects.
    Move { anchor: Point, last: Point },
    /// Rotating the selection about `origin`; `last_angle` is the applied
    /// rotation in degrees.
    Rotate {
        origin: Point,
        anchor: Point,
        last_angle: f64,
    },
    /// Scaling the selection about `origin`; `last_ratio` is the applied
    /// (x, y) ratio.
    Scale {
        origin: Point,
        anchor: Point,
        uniform: bool,
        last_ratio: (f64, f64),
    },
    /// Entering a polyline point by point into a freshly created path.
    DrawPath { element: ElementId },
}

/// Result of feeding an event to a pending gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// The gesture consumed the event and continues.
    InProgress,
    /// The gesture completed; exactly one checkpoint was taken.
    Committed,
    /// The gesture was abandoned; the document matches the pre-gesture
    /// state and no checkpoint was taken.
    Cancelled,
}
