//! The line-oriented project format.
//!
//! A project file is valid G-code with comment markers carrying the
//! structure the plain dialect cannot express: container boundaries,
//! element names and per-element engraving properties. Loading goes
//! through the G-code importer, so anything this module writes has to
//! survive the block heuristics there.
//!
//! Layout: an optional `;PROJECT` header line (root properties, project
//! name), an optional `;BACKGROUND` line, then one run of lines per
//! element in tree order.

use std::io::Write;
use std::path::Path as FsPath;

use tracing::info;

use engravekit_core::Result;

use crate::import::{import_gcode, ImportReport};
use crate::model::{
    ArcData, Document, Element, ElementKind, MixedSegment, PathData, SplineData,
};

/// Saves `document` and clears its dirty flag.
pub fn save(document: &mut Document, path: &FsPath) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_document(document, &mut file)?;
    file.flush()?;
    document.dirty = false;
    info!(path = %path.display(), "project saved");
    Ok(())
}

/// Loads a project file (or any plain G-code file).
pub fn load(path: &FsPath) -> Result<ImportReport> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    import_gcode(file)
}

/// Renders `document` to the project text without touching the dirty flag.
pub fn save_to_string(document: &Document) -> Result<String> {
    let mut buf = Vec::new();
    write_document(document, &mut buf)?;
    String::from_utf8(buf).map_err(|err| engravekit_core::DesignError::Parse {
        line: 0,
        reason: err.to_string(),
    })
}

fn write_document<W: Write>(document: &Document, out: &mut W) -> Result<()> {
    let p = &document.root.properties;
    writeln!(
        out,
        ";PROJECT feed={} power={} passes={} zstart={} zend={} depth={} allatonce={} name={}",
        p.feed_rate,
        p.power,
        p.passes,
        p.z_start,
        p.z_end,
        p.pass_depth,
        u8::from(p.all_at_once),
        document.name,
    )?;
    if let Some(bg) = &document.background {
        writeln!(
            out,
            ";BACKGROUND {} {} {} {} {}",
            bg.x, bg.y, bg.width, bg.height, bg.path
        )?;
    }
    if let Some(children) = document.root.children() {
        for child in children {
            write_element(child, out)?;
        }
    }
    Ok(())
}

fn write_element<W: Write>(element: &Element, out: &mut W) -> Result<()> {
    match &element.kind {
        ElementKind::Group(children) => {
            write_props(element, out)?;
            writeln!(out, "(Group: {})", element.name)?;
            for child in children {
                write_element(child, out)?;
            }
            writeln!(out, "(EndGroup)")?;
        }
        ElementKind::Path(path) => {
            if path.points.is_empty() {
                // Header and footer placeholders survive as bare markers;
                // any other empty path has nothing to say.
                if element.name.eq_ignore_ascii_case("header") {
                    writeln!(out, "(Header)")?;
                } else if element.name.eq_ignore_ascii_case("footer") {
                    writeln!(out, "(Footer)")?;
                }
                return Ok(());
            }
            write_preamble(element, out)?;
            write_path(path, out)?;
        }
        ElementKind::Arc(arc) => {
            write_preamble(element, out)?;
            let start = arc.start_point();
            writeln!(out, "G0 X{:.6} Y{:.6}", start.x, start.y)?;
            write_arc_move(arc, out)?;
        }
        ElementKind::Spline(spline) => {
            write_preamble(element, out)?;
            let start = spline.start_point();
            writeln!(out, "G0 X{:.6} Y{:.6}", start.x, start.y)?;
            write_spline_move(spline, out)?;
        }
        ElementKind::Drill(p) => {
            write_preamble(element, out)?;
            writeln!(out, "G0 X{:.6} Y{:.6}", p.x, p.y)?;
            writeln!(out, "M3 S255 M5")?;
        }
        ElementKind::MixedPath(mixed) => {
            write_props(element, out)?;
            writeln!(out, "(Mixed: {})", element.name)?;
            write_mixed_body(mixed, out)?;
            writeln!(out, "(EndMixed)")?;
        }
        ElementKind::Pocket(pocket) => {
            write_props(element, out)?;
            writeln!(out, "(Pocket: {})", element.name)?;
            write_path(&pocket.outline, out)?;
            for ring in &pocket.rings {
                write_path(ring, out)?;
            }
            writeln!(out, "(EndPocket)")?;
        }
        ElementKind::TextOnPath(text) => {
            write_props(element, out)?;
            writeln!(out, "(Text: {})", text.text)?;
            for (i, glyph) in text.glyphs.iter().enumerate() {
                writeln!(out, "(Mixed: glyph {})", i + 1)?;
                write_mixed_body(glyph, out)?;
                writeln!(out, "(EndMixed)")?;
            }
            if !text.guide.points.is_empty() {
                write_path(&text.guide, out)?;
            }
            writeln!(out, "(EndText)")?;
        }
    }
    Ok(())
}

/// Name and property markers for a leaf element.
fn write_preamble<W: Write>(element: &Element, out: &mut W) -> Result<()> {
    write_props(element, out)?;
    writeln!(out, "(Name: {})", element.name)?;
    Ok(())
}

/// `(Props: …)` with only the fields that override the parent.
fn write_props<W: Write>(element: &Element, out: &mut W) -> Result<()> {
    let p = &element.properties;
    if p.inherits_everything() && element.enabled {
        return Ok(());
    }
    let mut fields = Vec::new();
    if !p.feed_rate.is_nan() {
        fields.push(format!("feed={}", p.feed_rate));
    }
    if !p.power.is_nan() {
        fields.push(format!("power={}", p.power));
    }
    if p.passes >= 0 {
        fields.push(format!("passes={}", p.passes));
    }
    if !p.z_start.is_nan() {
        fields.push(format!("zstart={}", p.z_start));
    }
    if !p.z_end.is_nan() {
        fields.push(format!("zend={}", p.z_end));
    }
    if !p.pass_depth.is_nan() {
        fields.push(format!("depth={}", p.pass_depth));
    }
    if p.all_at_once {
        fields.push("allatonce=1".to_string());
    }
    if !element.enabled {
        fields.push("enabled=0".to_string());
    }
    writeln!(out, "(Props: {})", fields.join(" "))?;
    Ok(())
}

fn write_path<W: Write>(path: &PathData, out: &mut W) -> Result<()> {
    for (i, point) in path.points.iter().enumerate() {
        let word = if i == 0 || point.rapid { "G0" } else { "G1" };
        writeln!(out, "{word} X{:.6} Y{:.6}", point.pos.x, point.pos.y)?;
    }
    Ok(())
}

fn write_arc_move<W: Write>(arc: &ArcData, out: &mut W) -> Result<()> {
    let start = arc.start_point();
    let end = arc.end_point();
    let word = if arc.sweep < 0.0 { "G2" } else { "G3" };
    writeln!(
        out,
        "{word} X{:.6} Y{:.6} I{:.6} J{:.6}",
        end.x,
        end.y,
        arc.center.x - start.x,
        arc.center.y - start.y
    )?;
    Ok(())
}

fn write_spline_move<W: Write>(spline: &SplineData, out: &mut W) -> Result<()> {
    let start = spline.start_point();
    let end = spline.end_point();
    if spline.is_cubic() {
        let (c1, c2) = (spline.controls[1], spline.controls[2]);
        writeln!(
            out,
            "G5 I{:.6} J{:.6} P{:.6} Q{:.6} X{:.6} Y{:.6}",
            c1.x - start.x,
            c1.y - start.y,
            c2.x - end.x,
            c2.y - end.y,
            end.x,
            end.y
        )?;
    } else {
        let c = spline.controls[1];
        writeln!(
            out,
            "G5.1 I{:.6} J{:.6} X{:.6} Y{:.6}",
            c.x - start.x,
            c.y - start.y,
            end.x,
            end.y
        )?;
    }
    Ok(())
}

fn write_mixed_body<W: Write>(mixed: &crate::model::MixedPathData, out: &mut W) -> Result<()> {
    writeln!(out, "G0 X{:.6} Y{:.6}", mixed.start.x, mixed.start.y)?;
    let mut at = mixed.start;
    for segment in &mixed.segments {
        match segment {
            MixedSegment::Line { to } => {
                writeln!(out, "G1 X{:.6} Y{:.6}", to.x, to.y)?;
            }
            MixedSegment::Arc(arc) => {
                write_arc_move(arc, out)?;
            }
            MixedSegment::Quadratic { ctrl, to } => {
                writeln!(
                    out,
                    "G5.1 I{:.6} J{:.6} X{:.6} Y{:.6}",
                    ctrl.x - at.x,
                    ctrl.y - at.y,
                    to.x,
                    to.y
                )?;
            }
            MixedSegment::Cubic { ctrl1, ctrl2, to } => {
                writeln!(
                    out,
                    "G5 I{:.6} J{:.6} P{:.6} Q{:.6} X{:.6} Y{:.6}",
                    ctrl1.x - at.x,
                    ctrl1.y - at.y,
                    ctrl2.x - to.x,
                    ctrl2.y - to.y,
                    to.x,
                    to.y
                )?;
            }
        }
        at = segment.end_point();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_gcode_str;
    use crate::model::{MixedPathData, PathPoint, PocketData};
    use engravekit_core::Point;

    fn sample_document() -> Document {
        let mut doc = Document::new();
        doc.name = "Bracket".to_string();
        let root = doc.root_id();
        let group_id = doc.insert_child(root, None, Element::group("plate")).unwrap();
        doc.insert_child(
            group_id,
            None,
            Element::new(
                "outline",
                ElementKind::Path(PathData::closed_from_points(&[
                    Point::new(0.0, 0.0),
                    Point::new(20.0, 0.0),
                    Point::new(20.0, 10.0),
                    Point::new(0.0, 10.0),
                ])),
            ),
        )
        .unwrap();
        doc.insert_child(
            group_id,
            None,
            Element::new(
                "hole",
                ElementKind::Arc(ArcData::circle(Point::new(10.0, 5.0), 2.0)),
            ),
        )
        .unwrap();
        doc.insert_child(
            root,
            None,
            Element::new("tap", ElementKind::Drill(Point::new(5.0, 5.0))),
        )
        .unwrap();
        doc.insert_child(
            root,
            None,
            Element::new(
                "curve",
                ElementKind::Spline(SplineData::cubic(
                    Point::new(0.0, 20.0),
                    Point::new(5.0, 25.0),
                    Point::new(15.0, 25.0),
                    Point::new(20.0, 20.0),
                )),
            ),
        )
        .unwrap();
        doc
    }

    fn flat_kinds(doc: &Document) -> Vec<&'static str> {
        doc.iter().skip(1).map(|e| e.kind_token()).collect()
    }

    fn flat_points(doc: &Document) -> Vec<Point> {
        doc.iter().skip(1).flat_map(|e| e.points()).collect()
    }

    #[test]
    fn round_trip_preserves_types_and_coordinates() {
        let doc = sample_document();
        let text = save_to_string(&doc).unwrap();
        let report = import_gcode_str(&text).unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(flat_kinds(&report.document), flat_kinds(&doc));
        let a = flat_points(&doc);
        let b = flat_points(&report.document);
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(&b) {
            assert!(p.distance_to(q) < 1e-6, "{p:?} vs {q:?}");
        }
        assert_eq!(report.document.name, "Bracket");
    }

    #[test]
    fn element_names_and_properties_survive() {
        let mut doc = sample_document();
        let drill_id = doc
            .iter()
            .find(|e| e.kind_token() == "Drill")
            .map(|e| e.id())
            .unwrap();
        let drill = doc.find_mut(drill_id).unwrap();
        drill.properties.power = 128.0;
        drill.enabled = false;

        let text = save_to_string(&doc).unwrap();
        let report = import_gcode_str(&text).unwrap();
        let restored = report
            .document
            .iter()
            .find(|e| e.kind_token() == "Drill")
            .unwrap();
        assert_eq!(restored.name, "tap");
        assert_eq!(restored.properties.power, 128.0);
        assert!(!restored.enabled);
    }

    #[test]
    fn touching_paths_stay_separate() {
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.insert_child(
            root,
            None,
            Element::new(
                "a",
                ElementKind::Path(PathData::from_points(&[
                    Point::new(0.0, 0.0),
                    Point::new(10.0, 0.0),
                ])),
            ),
        )
        .unwrap();
        // Starts exactly where the previous one ends.
        doc.insert_child(
            root,
            None,
            Element::new(
                "b",
                ElementKind::Path(PathData::from_points(&[
                    Point::new(10.0, 0.0),
                    Point::new(10.0, 10.0),
                ])),
            ),
        )
        .unwrap();

        let text = save_to_string(&doc).unwrap();
        let report = import_gcode_str(&text).unwrap();
        assert_eq!(flat_kinds(&report.document), vec!["Path", "Path"]);
    }

    #[test]
    fn mixed_and_pocket_round_trip_as_single_elements() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let mixed = MixedPathData {
            start: Point::new(0.0, 0.0),
            segments: vec![
                MixedSegment::Line {
                    to: Point::new(10.0, 0.0),
                },
                MixedSegment::Arc(ArcData::new(
                    Point::new(10.0, 5.0),
                    5.0,
                    -std::f64::consts::FRAC_PI_2,
                    std::f64::consts::PI,
                )),
                MixedSegment::Quadratic {
                    ctrl: Point::new(5.0, 15.0),
                    to: Point::new(0.0, 10.0),
                },
            ],
        };
        doc.insert_child(
            root,
            None,
            Element::new("m", ElementKind::MixedPath(mixed.clone())),
        )
        .unwrap();
        let pocket = PocketData {
            outline: PathData::closed_from_points(&[
                Point::new(30.0, 0.0),
                Point::new(40.0, 0.0),
                Point::new(40.0, 10.0),
                Point::new(30.0, 10.0),
            ]),
            rings: vec![PathData::closed_from_points(&[
                Point::new(32.0, 2.0),
                Point::new(38.0, 2.0),
                Point::new(38.0, 8.0),
                Point::new(32.0, 8.0),
            ])],
        };
        doc.insert_child(
            root,
            None,
            Element::new("p", ElementKind::Pocket(pocket)),
        )
        .unwrap();

        let text = save_to_string(&doc).unwrap();
        let report = import_gcode_str(&text).unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(flat_kinds(&report.document), vec!["Mixed", "Pocket"]);
        let ElementKind::MixedPath(restored) =
            &report.document.root.children().unwrap()[0].kind
        else {
            panic!("expected mixed path");
        };
        assert_eq!(restored.segments.len(), mixed.segments.len());
        assert!(restored.start.distance_to(&mixed.start) < 1e-6);
    }

    #[test]
    fn header_line_and_background_survive() {
        let mut doc = sample_document();
        doc.root.properties.feed_rate = 900.0;
        doc.background = Some(crate::model::BackgroundParams {
            path: "bg.png".to_string(),
            x: 1.0,
            y: 2.0,
            width: 100.0,
            height: 50.0,
        });
        let text = save_to_string(&doc).unwrap();
        let report = import_gcode_str(&text).unwrap();
        assert_eq!(report.document.root.properties.feed_rate, 900.0);
        let bg = report.document.background.unwrap();
        assert_eq!(bg.path, "bg.png");
        assert_eq!(bg.width, 100.0);
    }

    #[test]
    fn save_clears_the_dirty_flag() {
        let mut doc = sample_document();
        doc.dirty = true;
        let file = tempfile::NamedTempFile::new().unwrap();
        save(&mut doc, file.path()).unwrap();
        assert!(!doc.dirty);

        let report = load(file.path()).unwrap();
        assert_eq!(flat_kinds(&report.document), flat_kinds(&doc));
    }

    // PathPoint is exercised through write_path's rapid flag.
    #[test]
    fn interior_rapid_points_write_as_rapids() {
        let path = PathData {
            points: vec![
                PathPoint::rapid(Point::new(0.0, 0.0)),
                PathPoint::feed(Point::new(5.0, 0.0)),
                PathPoint::rapid(Point::new(5.0, 0.0)),
                PathPoint::feed(Point::new(5.0, 5.0)),
            ],
        };
        let mut buf = Vec::new();
        write_path(&path, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let words: Vec<&str> = text.lines().map(|l| &l[..2]).collect();
        assert_eq!(words, vec!["G0", "G1", "G0", "G1"]);
    }
}
