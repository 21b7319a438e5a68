//! The document model: element tree, engraving properties and the document
//! container with its tree queries.

mod document;
mod element;
mod properties;

pub use document::{BackgroundParams, DepthFirstIter, Document, ExcludeSet};
pub use element::{
    ArcData, Element, ElementId, ElementKind, MixedPathData, MixedSegment, PathData, PathPoint,
    PocketData, SplineData, TextOnPathData,
};
pub use properties::EngravingProperties;
