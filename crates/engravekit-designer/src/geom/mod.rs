//! Derived-geometry algorithms: convex hull, polygon offsetting, pocketing,
//! flattening, point thinning and path joining. Pure functions over the
//! document model; they own no state.

mod flatten;
mod hull;
mod join;
mod offset;
mod pocket;
mod simplify;

pub use flatten::flatten_element;
pub use hull::convex_hull;
pub use join::{join_pair, join_set, to_mixed_segments};
pub use offset::{offset_contours, OffsetSide};
pub use pocket::pocket_rings;
pub use simplify::{simplify_by_angle, simplify_by_distance};
