//! Format ingestion: G-code text, SVG and DXF, all merging into the
//! document model.
//!
//! Importers recover from malformed input by skipping the offending line
//! or entity and counting it; they never abort a whole import over one bad
//! token.

pub mod dxf;
pub mod gcode;
pub mod svg;

pub use dxf::import_dxf;
pub use gcode::{import_gcode, import_gcode_str};
pub use svg::{import_svg, import_svg_str};

use crate::model::Document;

/// An imported document plus the number of lines/entities skipped while
/// recovering from parse errors.
#[derive(Debug)]
pub struct ImportReport {
    pub document: Document,
    pub skipped: usize,
}
