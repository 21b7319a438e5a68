//! Core types for EngraveKit.
//!
//! This crate holds the small, dependency-light foundation shared by the
//! editing engine: 2D geometry primitives with the distance/intersection
//! math the designer needs, and the error taxonomy used across import,
//! command execution and history management.

pub mod error;
pub mod geometry;

pub use error::{DesignError, Result};
pub use geometry::{Bounds, Point};
