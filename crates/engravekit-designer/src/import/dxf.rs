//! DXF ingestion via the `dxf` entity library.
//!
//! LINE/LWPOLYLINE/POLYLINE/ARC/CIRCLE/SPLINE entities map onto
//! path/arc/spline elements; adjacent entities sharing an endpoint within
//! a small tolerance are auto-concatenated with the same rule as the Join
//! command. Unsupported entity types are skipped and counted, never fatal.

use std::f64::consts::TAU;
use std::path::Path as FsPath;

use dxf::entities::EntityType;
use tracing::{debug, warn};

use engravekit_core::{Point, Result};

use crate::geom::join_set;
use crate::model::{ArcData, Document, Element, ElementKind, PathData, SplineData};

/// Endpoint tolerance for auto-concatenating adjacent entities.
const JOIN_EPSILON: f64 = 0.01;

/// Imports a DXF file into `document`, appending one group per file.
/// Returns the number of skipped entities.
pub fn import_dxf(path: &FsPath, document: &mut Document) -> Result<usize> {
    let mut file = std::fs::File::open(path)?;
    let drawing = dxf::Drawing::load(&mut file).map_err(|err| match err {
        dxf::DxfError::IoError(io) => io.into(),
        other => engravekit_core::DesignError::Parse {
            line: 0,
            reason: other.to_string(),
        },
    })?;

    let mut elements = Vec::new();
    let mut skipped = 0usize;
    for entity in drawing.entities() {
        match convert(&entity.specific) {
            Some(element) => elements.push(element),
            None => {
                warn!("unsupported dxf entity, skipping");
                skipped += 1;
            }
        }
    }
    debug!(count = elements.len(), skipped, "dxf entities converted");

    // Exploded files ship one LINE per segment; stitch them back.
    let elements = join_set(elements, JOIN_EPSILON);

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dxf".to_string());
    let mut group = Element::group(name);
    *group.children_mut().expect("group") = elements;
    let root = document.root_id();
    document.insert_child(root, None, group)?;
    Ok(skipped)
}

fn convert(entity: &EntityType) -> Option<Element> {
    match entity {
        EntityType::Line(line) => {
            let points = [
                Point::new(line.p1.x, line.p1.y),
                Point::new(line.p2.x, line.p2.y),
            ];
            Some(Element::new(
                "Line",
                ElementKind::Path(PathData::from_points(&points)),
            ))
        }
        EntityType::Circle(circle) => Some(Element::new(
            "Circle",
            ElementKind::Arc(ArcData::circle(
                Point::new(circle.center.x, circle.center.y),
                circle.radius,
            )),
        )),
        EntityType::Arc(arc) => {
            // DXF arcs run counter-clockwise from start to end, in degrees.
            let start = arc.start_angle.to_radians();
            let end = arc.end_angle.to_radians();
            let mut sweep = end - start;
            while sweep <= 1e-9 {
                sweep += TAU;
            }
            Some(Element::new(
                "Arc",
                ElementKind::Arc(ArcData::new(
                    Point::new(arc.center.x, arc.center.y),
                    arc.radius,
                    start,
                    sweep,
                )),
            ))
        }
        EntityType::LwPolyline(polyline) => {
            if polyline.vertices.len() < 2 {
                return None;
            }
            let points: Vec<Point> = polyline
                .vertices
                .iter()
                .map(|v| Point::new(v.x, v.y))
                .collect();
            // Bit 0 marks a closed polyline.
            let closed = polyline.flags & 1 != 0;
            Some(polyline_element(points, closed))
        }
        EntityType::Polyline(polyline) => {
            let points: Vec<Point> = polyline
                .vertices()
                .map(|v| Point::new(v.location.x, v.location.y))
                .collect();
            if points.len() < 2 {
                return None;
            }
            let closed = polyline.flags & 1 != 0;
            Some(polyline_element(points, closed))
        }
        EntityType::Spline(spline) => {
            let controls: Vec<Point> = spline
                .control_points
                .iter()
                .map(|p| Point::new(p.x, p.y))
                .collect();
            match controls.len() {
                3 => Some(Element::new(
                    "Spline",
                    ElementKind::Spline(SplineData::quadratic(
                        controls[0],
                        controls[1],
                        controls[2],
                    )),
                )),
                4 => Some(Element::new(
                    "Spline",
                    ElementKind::Spline(SplineData::cubic(
                        controls[0],
                        controls[1],
                        controls[2],
                        controls[3],
                    )),
                )),
                _ => {
                    // Higher-order splines fall back to their fit points.
                    let fit: Vec<Point> = spline
                        .fit_points
                        .iter()
                        .map(|p| Point::new(p.x, p.y))
                        .collect();
                    if fit.len() >= 2 {
                        Some(Element::new(
                            "Spline",
                            ElementKind::Path(PathData::from_points(&fit)),
                        ))
                    } else {
                        None
                    }
                }
            }
        }
        _ => None,
    }
}

fn polyline_element(points: Vec<Point>, closed: bool) -> Element {
    let data = if closed {
        PathData::closed_from_points(&points)
    } else {
        PathData::from_points(&points)
    };
    Element::new("Polyline", ElementKind::Path(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf::entities::{Entity, Line};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn drawing_with_box() -> dxf::Drawing {
        let mut drawing = dxf::Drawing::new();
        let segments = [
            ((0.0, 0.0), (10.0, 0.0)),
            ((10.0, 0.0), (10.0, 10.0)),
            ((10.0, 10.0), (0.0, 0.0)),
        ];
        for ((x1, y1), (x2, y2)) in segments {
            let line = Line::new(
                dxf::Point::new(x1, y1, 0.0),
                dxf::Point::new(x2, y2, 0.0),
            );
            drawing.add_entity(Entity::new(EntityType::Line(line)));
        }
        drawing
    }

    #[test]
    fn exploded_lines_are_stitched_into_one_path() {
        let mut file = NamedTempFile::with_suffix(".dxf").unwrap();
        drawing_with_box().save(&mut file).unwrap();
        file.flush().unwrap();

        let mut document = Document::new();
        let skipped = import_dxf(file.path(), &mut document).unwrap();
        assert_eq!(skipped, 0);

        let group = &document.root.children().unwrap()[0];
        let children = group.children().unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].is_closed());
    }
}
