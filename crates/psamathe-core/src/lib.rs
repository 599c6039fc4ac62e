//! # Psamathe Core
//!
//! Core types, errors, and events for the Psamathe sand table controller.
//! Provides the fundamental abstractions shared by the communication,
//! settings, and visualizer crates: table-space geometry, the validated
//! path store, job state, and the progress event stream.

pub mod error;
pub mod events;
pub mod geometry;
pub mod job;
pub mod path;

pub use error::{Error, LinkError, PathError, ProtocolError, Result};
pub use events::{EventDispatcher, JobEvent};
pub use geometry::{wrap_degrees, Point, PolarPoint, TableGeometry};
pub use job::{JobState, JobTotals};
pub use path::Path;
