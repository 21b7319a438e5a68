//! Flattening: rewrite arcs and splines as polylines under a chord
//! tolerance, preserving the logical group structure.

use engravekit_core::Point;

use crate::model::{Element, ElementKind, PathData, PathPoint};

/// Produces an equivalent element containing only rapid+line segments.
///
/// Groups keep their structure (children flattened recursively); curve
/// kinds become `Path` elements subdivided under `tolerance`; paths and
/// drills pass through. The result carries fresh ids: flattening replaces
/// elements, it does not alias them.
pub fn flatten_element(element: &Element, tolerance: f64) -> Element {
    let mut out = match &element.kind {
        ElementKind::Group(children) => Element::new(
            element.name.clone(),
            ElementKind::Group(
                children
                    .iter()
                    .map(|c| flatten_element(c, tolerance))
                    .collect(),
            ),
        ),
        ElementKind::Path(path) => {
            Element::new(element.name.clone(), ElementKind::Path(path.clone()))
        }
        ElementKind::Drill(p) => Element::new(element.name.clone(), ElementKind::Drill(*p)),
        ElementKind::Arc(arc) => Element::new(
            element.name.clone(),
            ElementKind::Path(polyline(&arc.sample(tolerance))),
        ),
        ElementKind::Spline(spline) => Element::new(
            element.name.clone(),
            ElementKind::Path(polyline(&spline.sample(tolerance))),
        ),
        ElementKind::MixedPath(mixed) => Element::new(
            element.name.clone(),
            ElementKind::Path(polyline(&mixed.sample(tolerance))),
        ),
        ElementKind::TextOnPath(text) => Element::new(
            element.name.clone(),
            ElementKind::Group(
                text.glyphs
                    .iter()
                    .enumerate()
                    .map(|(i, g)| {
                        Element::new(
                            format!("{} glyph {}", element.name, i + 1),
                            ElementKind::Path(polyline(&g.sample(tolerance))),
                        )
                    })
                    .collect(),
            ),
        ),
        ElementKind::Pocket(pocket) => {
            let mut children = vec![Element::new(
                format!("{} outline", element.name),
                ElementKind::Path(pocket.outline.clone()),
            )];
            children.extend(pocket.rings.iter().enumerate().map(|(i, r)| {
                Element::new(
                    format!("{} ring {}", element.name, i + 1),
                    ElementKind::Path(r.clone()),
                )
            }));
            Element::new(element.name.clone(), ElementKind::Group(children))
        }
    };
    out.enabled = element.enabled;
    out.properties = element.properties;
    out
}

fn polyline(points: &[Point]) -> PathData {
    PathData {
        points: points
            .iter()
            .enumerate()
            .map(|(i, &p)| PathPoint {
                pos: p,
                rapid: i == 0,
            })
            .collect(),
    }
}
