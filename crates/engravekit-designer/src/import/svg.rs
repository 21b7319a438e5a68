//! SVG ingestion.
//!
//! Walks the document with a streaming XML reader: `svg`/`g` become nested
//! groups, basic shapes become paths/arcs, and `path` data is tokenized
//! per the SVG path grammar into mixed paths, one per subpath. `transform`
//! attributes are composed into an affine matrix and applied to the
//! produced subtree after construction.

use std::collections::HashMap;
use std::path::Path as FsPath;

use lyon_geom::{vector, Angle, ArcFlags, SvgArc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use svgtypes::{PathParser, PathSegment, PointsParser, TransformListParser, TransformListToken};
use tracing::warn;

use engravekit_core::{DesignError, Point, Result};

use crate::model::{
    ArcData, Document, Element, ElementKind, MixedPathData, MixedSegment, PathData,
};

use super::ImportReport;

/// Imports an SVG file into a fresh document.
pub fn import_svg(path: &FsPath) -> Result<ImportReport> {
    let text = std::fs::read_to_string(path)?;
    import_svg_str(&text)
}

pub fn import_svg_str(text: &str) -> Result<ImportReport> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut skipped = 0usize;
    // Bottom entry collects elements outside any <svg>/<g>.
    let mut stack: Vec<(Element, Option<String>)> = vec![(Element::group("svg"), None)];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "svg" | "g" => {
                        let attrs = attributes(&e);
                        let label = attrs.get("id").cloned().unwrap_or_else(|| name.clone());
                        let transform = attrs.get("transform").cloned();
                        stack.push((Element::group(label), transform));
                    }
                    _ => {
                        shape(&e, &mut stack, &mut skipped);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                shape(&e, &mut stack, &mut skipped);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if (name == "svg" || name == "g") && stack.len() > 1 {
                    let (mut group, transform) = stack.pop().expect("len checked");
                    if let Some(transform) = &transform {
                        apply_transform_attr(&mut group, transform, &mut skipped);
                    }
                    if !group.is_empty() {
                        push_into(&mut stack, group);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(DesignError::Parse {
                    line: reader.error_position() as usize,
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut document = Document::new();
    let root = document.root_id();
    let (bottom, _) = stack.swap_remove(0);
    if let ElementKind::Group(children) = bottom.kind {
        for child in children {
            document.insert_child(root, None, child)?;
        }
    }
    Ok(ImportReport { document, skipped })
}

fn push_into(stack: &mut [(Element, Option<String>)], element: Element) {
    let (top, _) = stack.last_mut().expect("stack is never empty");
    top.children_mut().expect("groups only on the stack").push(element);
}

fn shape(e: &BytesStart, stack: &mut [(Element, Option<String>)], skipped: &mut usize) {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let attrs = attributes(e);
    let produced: Vec<Element> = match name.as_str() {
        "rect" => rect(&attrs).into_iter().collect(),
        "circle" => circle(&attrs).into_iter().collect(),
        "ellipse" => ellipse(&attrs).into_iter().collect(),
        "polyline" => polyline(&attrs).into_iter().collect(),
        "path" => attrs
            .get("d")
            .map(|d| parse_path_data(d, skipped))
            .unwrap_or_default(),
        // Metadata and styling tags carry no geometry.
        "title" | "desc" | "defs" | "style" | "metadata" => return,
        _ => {
            warn!(tag = %name, "unsupported svg element");
            *skipped += 1;
            return;
        }
    };
    if produced.is_empty() {
        *skipped += 1;
        return;
    }
    let transform = attrs.get("transform");
    for mut element in produced {
        if let Some(transform) = transform {
            apply_transform_attr(&mut element, transform, skipped);
        }
        push_into(stack, element);
    }
}

fn attributes(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.as_ref()).to_string(),
                a.unescape_value()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            )
        })
        .collect()
}

fn number(attrs: &HashMap<String, String>, key: &str) -> f64 {
    attrs
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

fn rect(attrs: &HashMap<String, String>) -> Option<Element> {
    let (x, y) = (number(attrs, "x"), number(attrs, "y"));
    let (w, h) = (number(attrs, "width"), number(attrs, "height"));
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let corners = [
        Point::new(x, y),
        Point::new(x + w, y),
        Point::new(x + w, y + h),
        Point::new(x, y + h),
    ];
    Some(Element::new(
        "rect",
        ElementKind::Path(PathData::closed_from_points(&corners)),
    ))
}

fn circle(attrs: &HashMap<String, String>) -> Option<Element> {
    let center = Point::new(number(attrs, "cx"), number(attrs, "cy"));
    let r = number(attrs, "r");
    if r <= 0.0 {
        return None;
    }
    Some(Element::new(
        "circle",
        ElementKind::Arc(ArcData::circle(center, r)),
    ))
}

fn ellipse(attrs: &HashMap<String, String>) -> Option<Element> {
    let center = Point::new(number(attrs, "cx"), number(attrs, "cy"));
    let (rx, ry) = (number(attrs, "rx"), number(attrs, "ry"));
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    // Chord-sampled closed outline; ellipses have no exact arc form here.
    let steps = ((rx.max(ry) * std::f64::consts::TAU) / 0.5).ceil().max(16.0) as usize;
    let points: Vec<Point> = (0..steps)
        .map(|i| {
            let t = i as f64 / steps as f64 * std::f64::consts::TAU;
            Point::new(center.x + rx * t.cos(), center.y + ry * t.sin())
        })
        .collect();
    Some(Element::new(
        "ellipse",
        ElementKind::Path(PathData::closed_from_points(&points)),
    ))
}

fn polyline(attrs: &HashMap<String, String>) -> Option<Element> {
    let raw = attrs.get("points")?;
    let points: Vec<Point> = PointsParser::from(raw.as_str())
        .map(|(x, y)| Point::new(x, y))
        .collect();
    if points.len() < 2 {
        return None;
    }
    Some(Element::new(
        "polyline",
        ElementKind::Path(PathData::from_points(&points)),
    ))
}

/// Tokenizes a `d` string into mixed paths, one element per subpath.
fn parse_path_data(d: &str, skipped: &mut usize) -> Vec<Element> {
    let mut out = Vec::new();
    let mut current: Option<MixedPathData> = None;
    let mut cur = Point::new(0.0, 0.0);
    let mut subpath_start = cur;
    let mut last_cubic_ctrl: Option<Point> = None;
    let mut last_quad_ctrl: Option<Point> = None;

    let finalize = |current: &mut Option<MixedPathData>, out: &mut Vec<Element>| {
        if let Some(data) = current.take() {
            if !data.segments.is_empty() {
                out.push(Element::new("path", ElementKind::MixedPath(data)));
            }
        }
    };

    for segment in PathParser::from(d) {
        let segment = match segment {
            Ok(segment) => segment,
            Err(err) => {
                warn!(%err, "bad path data, keeping the segments so far");
                *skipped += 1;
                break;
            }
        };
        // Commands other than a leading M implicitly continue a subpath.
        if current.is_none() && !matches!(segment, PathSegment::MoveTo { .. }) {
            current = Some(MixedPathData::new(cur));
            subpath_start = cur;
        }
        match segment {
            PathSegment::MoveTo { abs, x, y } => {
                finalize(&mut current, &mut out);
                cur = resolve(abs, cur, x, y);
                subpath_start = cur;
                current = Some(MixedPathData::new(cur));
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            PathSegment::LineTo { abs, x, y } => {
                cur = resolve(abs, cur, x, y);
                push(&mut current, MixedSegment::Line { to: cur });
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                cur = if abs {
                    Point::new(x, cur.y)
                } else {
                    Point::new(cur.x + x, cur.y)
                };
                push(&mut current, MixedSegment::Line { to: cur });
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            PathSegment::VerticalLineTo { abs, y } => {
                cur = if abs {
                    Point::new(cur.x, y)
                } else {
                    Point::new(cur.x, cur.y + y)
                };
                push(&mut current, MixedSegment::Line { to: cur });
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let ctrl1 = resolve(abs, cur, x1, y1);
                let ctrl2 = resolve(abs, cur, x2, y2);
                cur = resolve(abs, cur, x, y);
                push(&mut current, MixedSegment::Cubic { ctrl1, ctrl2, to: cur });
                last_cubic_ctrl = Some(ctrl2);
                last_quad_ctrl = None;
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let ctrl1 = reflect(cur, last_cubic_ctrl);
                let ctrl2 = resolve(abs, cur, x2, y2);
                cur = resolve(abs, cur, x, y);
                push(&mut current, MixedSegment::Cubic { ctrl1, ctrl2, to: cur });
                last_cubic_ctrl = Some(ctrl2);
                last_quad_ctrl = None;
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let ctrl = resolve(abs, cur, x1, y1);
                cur = resolve(abs, cur, x, y);
                push(&mut current, MixedSegment::Quadratic { ctrl, to: cur });
                last_quad_ctrl = Some(ctrl);
                last_cubic_ctrl = None;
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let ctrl = reflect(cur, last_quad_ctrl);
                cur = resolve(abs, cur, x, y);
                push(&mut current, MixedSegment::Quadratic { ctrl, to: cur });
                last_quad_ctrl = Some(ctrl);
                last_cubic_ctrl = None;
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let to = resolve(abs, cur, x, y);
                if rx.abs() < 1e-9 || ry.abs() < 1e-9 {
                    push(&mut current, MixedSegment::Line { to });
                } else {
                    let arc = SvgArc {
                        from: lyon_geom::point(cur.x, cur.y),
                        to: lyon_geom::point(to.x, to.y),
                        radii: vector(rx.abs(), ry.abs()),
                        x_rotation: Angle::degrees(x_axis_rotation),
                        flags: ArcFlags { large_arc, sweep },
                    };
                    arc.for_each_cubic_bezier(&mut |c| {
                        push(
                            &mut current,
                            MixedSegment::Cubic {
                                ctrl1: Point::new(c.ctrl1.x, c.ctrl1.y),
                                ctrl2: Point::new(c.ctrl2.x, c.ctrl2.y),
                                to: Point::new(c.to.x, c.to.y),
                            },
                        );
                    });
                }
                cur = to;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            PathSegment::ClosePath { .. } => {
                if cur.distance_to(&subpath_start) > 1e-9 {
                    push(&mut current, MixedSegment::Line { to: subpath_start });
                }
                cur = subpath_start;
                finalize(&mut current, &mut out);
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
        }
    }
    finalize(&mut current, &mut out);
    out
}

fn push(current: &mut Option<MixedPathData>, segment: MixedSegment) {
    if let Some(data) = current {
        data.segments.push(segment);
    }
}

fn resolve(abs: bool, cur: Point, x: f64, y: f64) -> Point {
    if abs {
        Point::new(x, y)
    } else {
        Point::new(cur.x + x, cur.y + y)
    }
}

/// Smooth-command control point: the previous control reflected through
/// the current point, or the current point when there is none.
fn reflect(cur: Point, last_ctrl: Option<Point>) -> Point {
    match last_ctrl {
        Some(c) => Point::new(2.0 * cur.x - c.x, 2.0 * cur.y - c.y),
        None => cur,
    }
}

// Affine matrix in SVG order [a b c d e f]:
//   x' = a*x + c*y + e,  y' = b*x + d*y + f
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn compose(m: Matrix, n: Matrix) -> Matrix {
    [
        m[0] * n[0] + m[2] * n[1],
        m[1] * n[0] + m[3] * n[1],
        m[0] * n[2] + m[2] * n[3],
        m[1] * n[2] + m[3] * n[3],
        m[0] * n[4] + m[2] * n[5] + m[4],
        m[1] * n[4] + m[3] * n[5] + m[5],
    ]
}

fn apply_transform_attr(element: &mut Element, attr: &str, skipped: &mut usize) {
    let mut matrix = IDENTITY;
    for token in TransformListParser::from(attr) {
        let token = match token {
            Ok(token) => token,
            Err(err) => {
                warn!(%err, "bad transform list");
                *skipped += 1;
                return;
            }
        };
        let next = match token {
            TransformListToken::Matrix { a, b, c, d, e, f } => [a, b, c, d, e, f],
            TransformListToken::Translate { tx, ty } => [1.0, 0.0, 0.0, 1.0, tx, ty],
            TransformListToken::Scale { sx, sy } => [sx, 0.0, 0.0, sy, 0.0, 0.0],
            TransformListToken::Rotate { angle } => {
                let (s, c) = angle.to_radians().sin_cos();
                [c, s, -s, c, 0.0, 0.0]
            }
            TransformListToken::SkewX { angle } => {
                [1.0, 0.0, angle.to_radians().tan(), 1.0, 0.0, 0.0]
            }
            TransformListToken::SkewY { angle } => {
                [1.0, angle.to_radians().tan(), 0.0, 1.0, 0.0, 0.0]
            }
        };
        matrix = compose(matrix, next);
    }
    apply_matrix(element, matrix);
}

fn apply_matrix(element: &mut Element, m: Matrix) {
    if m == IDENTITY {
        return;
    }
    if m[1] == 0.0 && m[2] == 0.0 {
        // Pure scale plus translate maps through the element transforms,
        // which keep arcs exact.
        element.scale_about(Point::new(0.0, 0.0), m[0], m[3]);
        element.translate(m[4], m[5]);
        return;
    }
    if let Some(children) = element.children_mut() {
        for child in children {
            apply_matrix(child, m);
        }
        return;
    }
    // General affine: map every point handle.
    for index in 0..element.point_count() {
        if let Some(p) = element.point(index) {
            let q = Point::new(
                m[0] * p.x + m[2] * p.y + m[4],
                m[1] * p.x + m[3] * p.y + m[5],
            );
            element.set_point(index, q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_nest_and_shapes_map() {
        let svg = r#"<svg><g id="layer1">
            <rect x="0" y="0" width="10" height="5"/>
            <circle cx="20" cy="20" r="5"/>
        </g></svg>"#;
        let report = import_svg_str(svg).unwrap();
        assert_eq!(report.skipped, 0);
        let outer = &report.document.root.children().unwrap()[0];
        let layer = &outer.children().unwrap()[0];
        assert_eq!(layer.name, "layer1");
        let children = layer.children().unwrap();
        assert_eq!(children[0].kind_token(), "Path");
        assert!(children[0].is_closed());
        assert_eq!(children[1].kind_token(), "Arc");
    }

    #[test]
    fn path_subpaths_split_on_move() {
        let svg = r#"<svg><path d="M 0 0 L 10 0 L 10 10 M 20 20 L 30 20"/></svg>"#;
        let report = import_svg_str(svg).unwrap();
        let group = &report.document.root.children().unwrap()[0];
        let children = group.children().unwrap();
        assert_eq!(children.len(), 2);
        let ElementKind::MixedPath(first) = &children[0].kind else {
            panic!("expected mixed path");
        };
        assert_eq!(first.start, Point::new(0.0, 0.0));
        assert_eq!(first.segments.len(), 2);
    }

    #[test]
    fn relative_curves_and_close() {
        let svg = r#"<svg><path d="M 0 0 l 10 0 q 5 5 0 10 z"/></svg>"#;
        let report = import_svg_str(svg).unwrap();
        let group = &report.document.root.children().unwrap()[0];
        let ElementKind::MixedPath(mixed) = &group.children().unwrap()[0].kind else {
            panic!("expected mixed path");
        };
        assert!(mixed.is_closed());
        assert!(matches!(mixed.segments[1], MixedSegment::Quadratic { .. }));
    }

    #[test]
    fn translate_transform_moves_the_subtree() {
        let svg = r#"<svg><g transform="translate(5 7)">
            <polyline points="0,0 10,0"/>
        </g></svg>"#;
        let report = import_svg_str(svg).unwrap();
        let outer = &report.document.root.children().unwrap()[0];
        let group = &outer.children().unwrap()[0];
        let line = &group.children().unwrap()[0];
        assert_eq!(line.point(0), Some(Point::new(5.0, 7.0)));
        assert_eq!(line.point(1), Some(Point::new(15.0, 7.0)));
    }

    #[test]
    fn unsupported_elements_are_counted() {
        let svg = r#"<svg><text x="0" y="0">hi</text><polyline points="0,0 1,1"/></svg>"#;
        let report = import_svg_str(svg).unwrap();
        assert_eq!(report.skipped, 1);
        let group = &report.document.root.children().unwrap()[0];
        assert_eq!(group.children().unwrap().len(), 1);
    }
}
