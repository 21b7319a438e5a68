//! # EngraveKit Designer
//!
//! The vector document editing engine: a hierarchical element tree with
//! inherited engraving properties, multi-format ingestion (G-code text, SVG,
//! DXF), a command dispatcher over the full set of structural and geometric
//! operations, snapshot undo/redo, interactive snapping and the derived
//! geometry library (hull, offset, pocketing, flattening, joining).
//!
//! ## Architecture
//!
//! ```text
//! Workbench (command dispatcher, single mutator entry point)
//!   ├── Document (root Group of the element tree)
//!   ├── EditController (Browsing / PointEditing focus)
//!   ├── History (checkpoint stack)
//!   ├── SessionContext (clipboard, cursor, machine position, grid, view)
//!   └── PendingOperation (in-flight interactive gesture)
//!
//! import (gcode / svg / dxf)  ──▶ Document
//! geom (hull, offset, pocket, flatten, simplify, join)  ◀── commands
//! project (line-oriented save, round-trips through the G-code importer)
//! ```
//!
//! The GUI, painting, serial machine protocol and font rendering are external
//! collaborators: they reach the engine only through [`Workbench::execute`],
//! the importer entry points, and the position/cursor setters on
//! [`SessionContext`].

pub mod edit;
pub mod geom;
pub mod history;
pub mod import;
pub mod model;
pub mod pending;
pub mod project;
pub mod session;
pub mod snap;
pub mod workbench;

pub use edit::{EditController, EditState};
pub use engravekit_core::{Bounds, DesignError, Point, Result};
pub use history::{Checkpoint, History};
pub use model::{
    ArcData, Document, Element, ElementId, ElementKind, EngravingProperties, MixedSegment,
    PathData, PathPoint, SplineData,
};
pub use pending::{GestureOutcome, PendingOperation};
pub use project::{load, save, save_to_string};
pub use session::SessionContext;
pub use snap::{GridSettings, SnapResolver};
pub use workbench::{Action, CommandPayload, Workbench};
