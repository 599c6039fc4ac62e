//! Table-space geometry
//!
//! Coordinate types and the physical constants of the table mechanism.
//! The table is a polar machine: a rotating platter plus an in-out arm
//! carrying the magnet. Host-side coordinates are Cartesian millimetres
//! with the origin at the platter centre; conversion to motor space
//! happens in the command encoder.

use serde::{Deserialize, Serialize};

/// A point in table space, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-axis position in mm
    pub x: f64,
    /// Y-axis position in mm
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check that both coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Straight-line distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Radial distance from the table centre
    pub fn radius(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Convert to polar coordinates
    ///
    /// Angle is in degrees in (-180, 180], radius in millimetres.
    pub fn to_polar(&self) -> PolarPoint {
        PolarPoint {
            theta_deg: self.y.atan2(self.x).to_degrees(),
            r_mm: self.radius(),
        }
    }

    /// Linear interpolation toward another point
    ///
    /// `t` = 0 yields `self`, `t` = 1 yields `other`.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// A point in the table's motor-native polar coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint {
    /// Platter angle in degrees, (-180, 180]
    pub theta_deg: f64,
    /// Arm extension in millimetres
    pub r_mm: f64,
}

/// Wrap an angular delta into (-180, 180] degrees
///
/// The platter always takes the short way around.
pub fn wrap_degrees(delta: f64) -> f64 {
    let mut d = delta % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Physical constants of the table mechanism
///
/// Step ratios come from the motor/pulley geometry; the compensation
/// ratio counteracts the mechanical coupling between platter rotation
/// and arm extension (rotating the platter drags the arm with it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableGeometry {
    /// In-out motor steps per millimetre of arm travel
    pub inout_steps_per_mm: f64,
    /// Degrees of platter rotation per rotation motor step
    pub rotation_deg_per_step: f64,
    /// In-out steps to subtract per rotation step to cancel coupling
    pub compensation_ratio: f64,
    /// Outer boundary of the drawable area, in mm
    pub workspace_radius_mm: f64,
    /// Inner un-drawable circle radius, in mm
    pub inner_radius_mm: f64,
}

impl Default for TableGeometry {
    fn default() -> Self {
        Self {
            inout_steps_per_mm: 33.0,
            rotation_deg_per_step: 0.0675,
            compensation_ratio: 0.3167,
            workspace_radius_mm: 130.0,
            inner_radius_mm: 30.0,
        }
    }
}

impl TableGeometry {
    /// Check whether a radial distance is inside the drawable annulus
    pub fn contains_radius(&self, r_mm: f64) -> bool {
        r_mm >= self.inner_radius_mm && r_mm <= self.workspace_radius_mm
    }

    /// Derive the compensation ratio from a calibration run
    ///
    /// Command a pure rotation and measure how far the arm drifted
    /// (`drift_mm`) against a reference in-out move of `inout_mm`.
    /// Returns `None` when the in-out reference is zero.
    pub fn compensation_from_calibration(drift_mm: f64, inout_mm: f64) -> Option<f64> {
        if inout_mm == 0.0 {
            return None;
        }
        Some(0.5 * (drift_mm / inout_mm))
    }
}
