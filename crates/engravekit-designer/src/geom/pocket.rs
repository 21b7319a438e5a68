//! Pocketing: repeated inward offsetting of a closed outline until the
//! inset region vanishes.

use cavalier_contours::polyline::PlineSource;

use engravekit_core::{DesignError, Point, Result};

use crate::model::{PathData, PocketData};

use super::offset::prepare_polygon;

/// Insets `outline` by `step` repeatedly, producing the nested ring set of
/// a pocket. `outline` is a sampled closed polygon.
pub fn pocket_rings(outline: &[Point], step: f64) -> Result<PocketData> {
    if step <= 1e-9 {
        return Err(DesignError::degenerate("pocket step must be positive"));
    }
    if outline.len() < 3 {
        return Err(DesignError::degenerate(
            "pocket outline needs at least 3 points",
        ));
    }

    let polygon = prepare_polygon(outline);
    let mut rings = Vec::new();
    let mut inset = step;
    loop {
        // Clockwise polygon: negative offset moves inward.
        let offsets = polygon.parallel_offset(-inset);
        if offsets.is_empty() {
            break;
        }
        for contour in offsets {
            let points: Vec<Point> = contour
                .vertex_data
                .iter()
                .map(|v| Point::new(v.x, v.y))
                .collect();
            if points.len() >= 3 {
                rings.push(PathData::closed_from_points(&points));
            }
        }
        inset += step;
    }

    if rings.is_empty() {
        return Err(DesignError::degenerate(format!(
            "pocket step {step} larger than the outline"
        )));
    }
    Ok(PocketData {
        outline: PathData::closed_from_points(outline),
        rings,
    })
}
