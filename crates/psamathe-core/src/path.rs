//! Path store
//!
//! Holds the ordered sequence of target points for a job. Validated once
//! at load time against the table's physical bounds, read-only afterwards.
//! The point list itself comes from an external loader; the JSON helper
//! here is glue for headless use, not a path-authoring format.

use crate::error::PathError;
use crate::geometry::{Point, TableGeometry};
use std::path::Path as FsPath;

/// An immutable, validated sequence of target points
///
/// Insertion order defines visiting order. An empty path is valid and a
/// job started on it completes immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<Point>,
}

impl Path {
    /// Validate and load a point sequence
    ///
    /// Every point must have finite coordinates and lie inside the
    /// drawable annulus of the table.
    pub fn load(points: Vec<Point>, geometry: &TableGeometry) -> Result<Self, PathError> {
        for (index, p) in points.iter().enumerate() {
            if !p.is_finite() {
                return Err(PathError::InvalidPoint {
                    index,
                    x: p.x,
                    y: p.y,
                });
            }
            let radius_mm = p.radius();
            if !geometry.contains_radius(radius_mm) {
                return Err(PathError::OutsideWorkspace {
                    index,
                    radius_mm,
                    inner_mm: geometry.inner_radius_mm,
                    outer_mm: geometry.workspace_radius_mm,
                });
            }
        }
        Ok(Self { points })
    }

    /// Load a path from a JSON file of `[x, y]` pairs
    pub fn from_json_file(path: &FsPath, geometry: &TableGeometry) -> Result<Self, PathError> {
        let text = std::fs::read_to_string(path).map_err(|e| PathError::ParseError {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let pairs: Vec<[f64; 2]> =
            serde_json::from_str(&text).map_err(|e| PathError::ParseError {
                reason: format!("{}: {}", path.display(), e),
            })?;
        let points = pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect();
        Self::load(points, geometry)
    }

    /// Get the point at `index`
    pub fn get(&self, index: usize) -> Result<Point, PathError> {
        self.points
            .get(index)
            .copied()
            .ok_or(PathError::IndexOutOfRange {
                index,
                len: self.points.len(),
            })
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the path has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of segments (consecutive point pairs)
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// All points in visiting order
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Iterate over consecutive point pairs
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }
}
