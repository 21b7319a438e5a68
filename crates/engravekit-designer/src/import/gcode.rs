//! G-code / project text ingestion.
//!
//! The importer consumes a line stream and a single modal state (last seen
//! position and motion mode). Block boundaries are inferred, not explicit:
//! a rapid to a disconnected location closes the current path block and
//! opens a new one, a circular move or a spindle pulse closes the block
//! and produces a standalone arc or drill, and blocks that close with
//! fewer than two points are discarded. The very first zero-geometry block
//! of an otherwise empty document becomes the "Header" element at the
//! document root.
//!
//! Comment markers written by the project saver (`(Group: …)`,
//! `(EndGroup)`, `(Mixed: …)`, `(Pocket: …)`, `(Text: …)`) rebuild the
//! container structure; plain G-code from other tools imports as flat
//! blocks under the root.

use std::f64::consts::TAU;
use std::io::BufRead;

use tracing::warn;

use engravekit_core::{DesignError, Point, Result};

use crate::geom::to_mixed_segments;
use crate::model::{
    ArcData, BackgroundParams, Document, Element, ElementId, ElementKind, EngravingProperties,
    MixedPathData, PathData, PathPoint, PocketData, SplineData, TextOnPathData,
};

use super::ImportReport;

/// Imports a line stream into a fresh document.
pub fn import_gcode<R: BufRead>(reader: R) -> Result<ImportReport> {
    let mut importer = Importer::new();
    for line in reader.lines() {
        importer.line(&line?);
    }
    Ok(importer.finish())
}

/// Convenience wrapper over [`import_gcode`] for in-memory text.
pub fn import_gcode_str(text: &str) -> Result<ImportReport> {
    import_gcode(text.as_bytes())
}

/// Where finished elements currently land.
enum Container {
    /// A group already inserted in the document.
    Doc(ElementId),
    /// Elements collected for a mixed path, concatenated on close.
    Mixed { name: String, elements: Vec<Element> },
    /// Outline-then-rings collection for a pocket.
    Pocket { name: String, elements: Vec<Element> },
    /// Glyph outlines plus a trailing guide path.
    Text {
        content: String,
        elements: Vec<Element>,
    },
}

#[derive(Debug, Default)]
struct Words {
    g: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    i: Option<f64>,
    j: Option<f64>,
    p: Option<f64>,
    q: Option<f64>,
    r: Option<f64>,
    m3: bool,
    m5: bool,
}

struct Importer {
    doc: Document,
    containers: Vec<Container>,
    block: Vec<PathPoint>,
    pending_name: Option<String>,
    pending_props: Option<(EngravingProperties, bool)>,
    modal: Point,
    saw_geometry: bool,
    preamble: usize,
    header_done: bool,
    skipped: usize,
    line_no: usize,
}

impl Importer {
    fn new() -> Self {
        let doc = Document::new();
        let root = doc.root_id();
        Self {
            doc,
            containers: vec![Container::Doc(root)],
            block: Vec::new(),
            pending_name: None,
            pending_props: None,
            modal: Point::new(0.0, 0.0),
            saw_geometry: false,
            preamble: 0,
            header_done: false,
            skipped: 0,
            line_no: 0,
        }
    }

    fn line(&mut self, raw: &str) {
        self.line_no += 1;
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        if let Some(rest) = line.strip_prefix(";PROJECT") {
            self.project_header(rest);
            return;
        }
        if let Some(rest) = line.strip_prefix(";BACKGROUND") {
            self.background(rest);
            return;
        }
        if let Some(comment) = comment_text(line) {
            self.comment(comment.trim());
            return;
        }
        match parse_words(line, self.line_no) {
            Ok(words) => self.words(words),
            Err(err) => {
                warn!(line, %err, "skipping unparseable line");
                self.skipped += 1;
            }
        }
    }

    fn words(&mut self, words: Words) {
        let target = Point::new(
            words.x.unwrap_or(self.modal.x),
            words.y.unwrap_or(self.modal.y),
        );
        match words.g.map(|g| (g * 10.0).round() as i64) {
            Some(0) => {
                self.note_geometry();
                // A rapid to a disconnected location starts a new block.
                if let Some(last) = self.block.last() {
                    if last.pos.distance_to(&target) > 1e-9 {
                        self.close_block();
                    }
                }
                if self.block.is_empty() {
                    self.block.push(PathPoint::rapid(target));
                }
                self.modal = target;
            }
            Some(10) => {
                self.note_geometry();
                if self.block.is_empty() && self.modal.distance_to(&target) > 1e-9 {
                    // Implicit leading rapid from the modal position.
                    self.block.push(PathPoint::rapid(self.modal));
                }
                self.block.push(PathPoint::feed(target));
                self.modal = target;
            }
            Some(20) | Some(30) => {
                self.note_geometry();
                self.close_block();
                let clockwise = words.g == Some(2.0);
                match arc_from_words(self.modal, target, &words, clockwise) {
                    Ok(arc) => {
                        let element = Element::new("Arc", ElementKind::Arc(arc));
                        self.emit(element);
                    }
                    Err(err) => {
                        warn!(%err, "skipping degenerate arc");
                        self.skipped += 1;
                    }
                }
                self.modal = target;
            }
            Some(50) => {
                // Cubic spline: I/J offset the first control from the start,
                // P/Q offset the second control from the end.
                self.note_geometry();
                self.close_block();
                let start = self.modal;
                let ctrl1 = Point::new(
                    start.x + words.i.unwrap_or(0.0),
                    start.y + words.j.unwrap_or(0.0),
                );
                let ctrl2 = Point::new(
                    target.x + words.p.unwrap_or(0.0),
                    target.y + words.q.unwrap_or(0.0),
                );
                let element = Element::new(
                    "Spline",
                    ElementKind::Spline(SplineData::cubic(start, ctrl1, ctrl2, target)),
                );
                self.emit(element);
                self.modal = target;
            }
            Some(51) => {
                // Quadratic spline: I/J offset the control from the start.
                self.note_geometry();
                self.close_block();
                let start = self.modal;
                let ctrl = Point::new(
                    start.x + words.i.unwrap_or(0.0),
                    start.y + words.j.unwrap_or(0.0),
                );
                let element = Element::new(
                    "Spline",
                    ElementKind::Spline(SplineData::quadratic(start, ctrl, target)),
                );
                self.emit(element);
                self.modal = target;
            }
            _ => {
                if words.m3 && words.m5 {
                    // Spindle pulse with no movement: a drill at the modal
                    // position.
                    self.note_geometry();
                    self.close_block();
                    let element = Element::new("Drill", ElementKind::Drill(self.modal));
                    self.emit(element);
                } else if !self.saw_geometry {
                    self.preamble += 1;
                }
            }
        }
    }

    fn comment(&mut self, comment: &str) {
        if let Some(name) = comment.strip_prefix("Group:") {
            self.close_block();
            self.open_group(name.trim());
        } else if comment == "EndGroup" {
            self.close_block();
            self.close_container(|c| matches!(c, Container::Doc(_)));
        } else if let Some(name) = comment.strip_prefix("Mixed:") {
            self.close_block();
            self.containers.push(Container::Mixed {
                name: name.trim().to_string(),
                elements: Vec::new(),
            });
        } else if comment == "EndMixed" {
            self.close_block();
            self.close_container(|c| matches!(c, Container::Mixed { .. }));
        } else if let Some(name) = comment.strip_prefix("Pocket:") {
            self.close_block();
            self.containers.push(Container::Pocket {
                name: name.trim().to_string(),
                elements: Vec::new(),
            });
        } else if comment == "EndPocket" {
            self.close_block();
            self.close_container(|c| matches!(c, Container::Pocket { .. }));
        } else if let Some(content) = comment.strip_prefix("Text:") {
            self.close_block();
            self.containers.push(Container::Text {
                content: content.trim().to_string(),
                elements: Vec::new(),
            });
        } else if comment == "EndText" {
            self.close_block();
            self.close_container(|c| matches!(c, Container::Text { .. }));
        } else if let Some(name) = comment.strip_prefix("Name:") {
            // A name marker announces the next element, so it also ends
            // the block before it even when the two share an endpoint.
            self.close_block();
            self.pending_name = Some(name.trim().to_string());
        } else if let Some(props) = comment.strip_prefix("Props:") {
            self.pending_props = Some(parse_props(props));
        } else if comment == "Header" {
            self.close_block();
            self.header_done = true;
            let root = self.doc.root_id();
            let header = Element::new("Header", ElementKind::Path(PathData::from_points(&[])));
            let _ = self.doc.insert_child(root, Some(0), header);
        } else if comment == "Footer" {
            self.close_block();
            let root = self.doc.root_id();
            let footer = Element::new("Footer", ElementKind::Path(PathData::from_points(&[])));
            let _ = self.doc.insert_child(root, None, footer);
        } else if !self.saw_geometry {
            self.preamble += 1;
        }
    }

    fn project_header(&mut self, rest: &str) {
        let mut props = EngravingProperties::root_defaults();
        for field in rest.split_whitespace() {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            if key == "name" {
                // The name runs to the end of the line and may hold spaces.
                if let Some(pos) = rest.find("name=") {
                    self.doc.name = rest[pos + 5..].trim().to_string();
                }
                break;
            }
            apply_prop(&mut props, key, value);
        }
        self.doc.root.properties = props;
    }

    fn background(&mut self, rest: &str) {
        let fields: Vec<&str> = rest.trim().splitn(5, ' ').collect();
        if fields.len() == 5 {
            let nums: Vec<f64> = fields[..4]
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            if nums.len() == 4 {
                self.doc.background = Some(BackgroundParams {
                    path: fields[4].to_string(),
                    x: nums[0],
                    y: nums[1],
                    width: nums[2],
                    height: nums[3],
                });
                return;
            }
        }
        warn!(rest, "skipping malformed background line");
        self.skipped += 1;
    }

    fn open_group(&mut self, name: &str) {
        match self.containers.last() {
            Some(Container::Doc(parent)) => {
                let parent = *parent;
                let mut group = Element::group(name);
                if let Some((props, enabled)) = self.pending_props.take() {
                    group.properties = props;
                    group.enabled = enabled;
                }
                match self.doc.insert_child(parent, None, group) {
                    Ok(id) => self.containers.push(Container::Doc(id)),
                    Err(_) => self.skipped += 1,
                }
            }
            _ => {
                // Groups cannot nest inside mixed/pocket/text collections.
                self.skipped += 1;
            }
        }
    }

    /// Pops the top container if `matches` accepts it (the root stays).
    fn close_container(&mut self, matches: impl Fn(&Container) -> bool) {
        if self.containers.len() < 2 || !matches(self.containers.last().expect("non-empty")) {
            self.skipped += 1;
            return;
        }
        match self.containers.pop().expect("checked above") {
            Container::Doc(_) => {}
            Container::Mixed { name, elements } => {
                if let Some(element) = assemble_mixed(&name, &elements) {
                    self.emit(element);
                } else {
                    self.skipped += 1;
                }
            }
            Container::Pocket { name, elements } => {
                if let Some(element) = assemble_pocket(&name, elements) {
                    self.emit(element);
                } else {
                    self.skipped += 1;
                }
            }
            Container::Text { content, elements } => {
                if let Some(element) = assemble_text(&content, &elements) {
                    self.emit(element);
                } else {
                    self.skipped += 1;
                }
            }
        }
    }

    /// First geometry of the stream promotes a preceding zero-geometry
    /// block of an otherwise empty document to the "Header" element.
    fn note_geometry(&mut self) {
        if self.saw_geometry {
            return;
        }
        self.saw_geometry = true;
        let empty = self
            .doc
            .root
            .children()
            .map(|c| c.is_empty())
            .unwrap_or(true);
        if self.preamble > 0 && empty && !self.header_done {
            self.header_done = true;
            let root = self.doc.root_id();
            let header = Element::new("Header", ElementKind::Path(PathData::from_points(&[])));
            let _ = self.doc.insert_child(root, Some(0), header);
        }
    }

    /// Finishes the open block; blocks with fewer than two points are
    /// discarded.
    fn close_block(&mut self) {
        let points = std::mem::take(&mut self.block);
        if points.len() < 2 {
            return;
        }
        let element = Element::new("Path", ElementKind::Path(PathData { points }));
        self.emit(element);
    }

    fn emit(&mut self, mut element: Element) {
        if let Some(name) = self.pending_name.take() {
            element.name = name;
        }
        if let Some((props, enabled)) = self.pending_props.take() {
            element.properties = props;
            element.enabled = enabled;
        }
        match self.containers.last_mut().expect("root container") {
            Container::Doc(group) => {
                let group = *group;
                if self.doc.insert_child(group, None, element).is_err() {
                    self.skipped += 1;
                }
            }
            Container::Mixed { elements, .. }
            | Container::Pocket { elements, .. }
            | Container::Text { elements, .. } => elements.push(element),
        }
    }

    fn finish(mut self) -> ImportReport {
        self.close_block();
        // Unterminated containers are closed as if their end marker had
        // been present.
        while self.containers.len() > 1 {
            self.close_container(|_| true);
        }
        ImportReport {
            document: self.doc,
            skipped: self.skipped,
        }
    }
}

/// Folds an ordered run of continuous path/arc/spline elements into one
/// mixed path.
fn assemble_mixed(name: &str, elements: &[Element]) -> Option<Element> {
    let mut iter = elements.iter();
    let (start, mut segments) = to_mixed_segments(iter.next()?)?;
    for element in iter {
        let (_, continuation) = to_mixed_segments(element)?;
        segments.extend(continuation);
    }
    Some(Element::new(
        name,
        ElementKind::MixedPath(MixedPathData { start, segments }),
    ))
}

/// First closed path is the outline, the rest are the nested rings.
fn assemble_pocket(name: &str, elements: Vec<Element>) -> Option<Element> {
    let mut paths = elements.into_iter().filter_map(|e| match e.kind {
        ElementKind::Path(path) => Some(path),
        _ => None,
    });
    let outline = paths.next()?;
    let rings: Vec<PathData> = paths.collect();
    let mut element = Element::new(
        name,
        ElementKind::Pocket(PocketData { outline, rings }),
    );
    element.properties.all_at_once = true;
    Some(element)
}

/// Mixed children are the glyph outlines; the trailing path is the guide.
fn assemble_text(content: &str, elements: &[Element]) -> Option<Element> {
    let glyphs: Vec<MixedPathData> = elements
        .iter()
        .filter_map(|e| match &e.kind {
            ElementKind::MixedPath(mixed) => Some(mixed.clone()),
            _ => None,
        })
        .collect();
    let guide = elements
        .iter()
        .rev()
        .find_map(|e| match &e.kind {
            ElementKind::Path(path) => Some(path.clone()),
            _ => None,
        })
        .unwrap_or_else(|| PathData::from_points(&[]));
    Some(Element::new(
        content,
        ElementKind::TextOnPath(TextOnPathData {
            text: content.to_string(),
            glyphs,
            guide,
        }),
    ))
}

/// `(…)` and `;…` comments; returns the comment body.
fn comment_text(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('(') {
        return Some(rest.strip_suffix(')').unwrap_or(rest));
    }
    line.strip_prefix(';')
}

fn parse_words(line: &str, line_no: usize) -> Result<Words> {
    let mut words = Words::default();
    for token in line.split_whitespace() {
        let mut chars = token.chars();
        let letter = chars
            .next()
            .ok_or_else(|| DesignError::Parse {
                line: line_no,
                reason: "empty token".to_string(),
            })?
            .to_ascii_uppercase();
        let value: f64 = chars.as_str().parse().map_err(|_| DesignError::Parse {
            line: line_no,
            reason: format!("bad number in {token:?}"),
        })?;
        match letter {
            'G' => words.g = Some(value),
            'X' => words.x = Some(value),
            'Y' => words.y = Some(value),
            'I' => words.i = Some(value),
            'J' => words.j = Some(value),
            'P' => words.p = Some(value),
            'Q' => words.q = Some(value),
            'R' => words.r = Some(value),
            'M' => {
                let m = value.round() as i64;
                if m == 3 || m == 4 {
                    words.m3 = true;
                } else if m == 5 {
                    words.m5 = true;
                }
            }
            // Z/F/S/T words update state this model does not keep.
            'Z' | 'F' | 'S' | 'T' => {}
            _ => {
                return Err(DesignError::Parse {
                    line: line_no,
                    reason: format!("unknown word {token:?}"),
                })
            }
        }
    }
    Ok(words)
}

/// Builds an arc from the modal start point and a G2/G3 line, center-offset
/// (I/J) form preferred, radius (R) form as fallback.
fn arc_from_words(start: Point, end: Point, words: &Words, clockwise: bool) -> Result<ArcData> {
    let center = if words.i.is_some() || words.j.is_some() {
        Point::new(
            start.x + words.i.unwrap_or(0.0),
            start.y + words.j.unwrap_or(0.0),
        )
    } else if let Some(r) = words.r {
        center_from_radius(start, end, r, clockwise)?
    } else {
        return Err(DesignError::degenerate("arc without I/J or R"));
    };
    let radius = center.distance_to(&start);
    if radius < 1e-9 {
        return Err(DesignError::degenerate("zero-radius arc"));
    }
    let a0 = (start.y - center.y).atan2(start.x - center.x);
    let a1 = (end.y - center.y).atan2(end.x - center.x);
    let sweep = if clockwise {
        let mut s = a1 - a0;
        while s >= -1e-9 {
            s -= TAU;
        }
        s
    } else {
        let mut s = a1 - a0;
        while s <= 1e-9 {
            s += TAU;
        }
        s
    };
    Ok(ArcData::new(center, radius, a0, sweep))
}

fn center_from_radius(start: Point, end: Point, r: f64, clockwise: bool) -> Result<Point> {
    let chord = start.distance_to(&end);
    if chord < 1e-9 {
        return Err(DesignError::degenerate("radius-form full circle"));
    }
    let half = chord / 2.0;
    let r = r.abs();
    if r < half - 1e-9 {
        return Err(DesignError::degenerate("arc radius smaller than chord"));
    }
    let h = (r * r - half * half).max(0.0).sqrt();
    let mid = start.midpoint(&end);
    // Unit perpendicular to the chord; the minor-arc center sits on the
    // left for counter-clockwise travel.
    let (ux, uy) = ((end.x - start.x) / chord, (end.y - start.y) / chord);
    let (px, py) = if clockwise { (uy, -ux) } else { (-uy, ux) };
    Ok(Point::new(mid.x + px * h, mid.y + py * h))
}

/// `(Props: …)` comment body into properties plus the enabled flag.
fn parse_props(body: &str) -> (EngravingProperties, bool) {
    let mut props = EngravingProperties::default();
    let mut enabled = true;
    for field in body.split_whitespace() {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        if key == "enabled" {
            enabled = value != "0";
        } else {
            apply_prop(&mut props, key, value);
        }
    }
    (props, enabled)
}

fn apply_prop(props: &mut EngravingProperties, key: &str, value: &str) {
    let Ok(number) = value.parse::<f64>() else {
        return;
    };
    match key {
        "feed" => props.feed_rate = number,
        "power" => props.power = number,
        "passes" => props.passes = number as i32,
        "zstart" => props.z_start = number,
        "zend" => props.z_end = number,
        "depth" => props.pass_depth = number,
        "allatonce" => props.all_at_once = number != 0.0,
        _ => {}
    }
}
