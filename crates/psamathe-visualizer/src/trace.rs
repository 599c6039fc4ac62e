//! Path trace
//!
//! Consumes the one-way progress event stream and keeps its own picture
//! of the job: the planned polyline, the chunk targets the device has
//! confirmed reaching, and the last-known position. The trace never
//! reads engine state; a renderer can fall arbitrarily far behind
//! without affecting the control loop.

use psamathe_core::{JobEvent, JobState, Point};
use std::fmt::Write;

/// Progressive record of a job as seen through its events
#[derive(Debug, Clone, Default)]
pub struct PathTrace {
    planned: Vec<Point>,
    traced: Vec<Point>,
    last_position: Option<Point>,
    state: Option<JobState>,
    fault: Option<String>,
}

impl PathTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trace seeded with the planned polyline
    pub fn with_plan(planned: Vec<Point>) -> Self {
        Self {
            planned,
            ..Self::default()
        }
    }

    /// Fold one job event into the trace
    pub fn apply(&mut self, event: &JobEvent) {
        match event {
            JobEvent::Progress { position, .. } => {
                self.traced.push(*position);
                self.last_position = Some(*position);
            }
            JobEvent::Completed { totals } => {
                tracing::debug!(commands = totals.commands_sent, "Trace complete");
                self.state = Some(JobState::Completed);
            }
            JobEvent::Fault { error, .. } => {
                self.fault = Some(error.to_string());
                self.state = Some(JobState::Faulted);
            }
            JobEvent::StateChanged(state) => {
                self.state = Some(*state);
            }
        }
    }

    /// Chunk targets confirmed so far, in visiting order
    pub fn traced(&self) -> &[Point] {
        &self.traced
    }

    /// Last position the device confirmed reaching
    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }

    /// Fault description, if the job halted
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Most recent state seen on the stream
    pub fn state(&self) -> Option<JobState> {
        self.state
    }

    /// Render the planned path and the trace as an SVG document
    ///
    /// The planned polyline is drawn dotted, the confirmed trace solid,
    /// and the last-known position as a dot, over the drawable annulus.
    pub fn to_svg(&self, workspace_radius_mm: f64, inner_radius_mm: f64) -> String {
        let half = workspace_radius_mm * 1.1;
        let mut svg = String::new();

        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{:.1} {:.1} {:.1} {:.1}">"#,
            -half,
            -half,
            half * 2.0,
            half * 2.0
        );
        let _ = writeln!(
            svg,
            r##"  <circle cx="0" cy="0" r="{workspace_radius_mm}" fill="none" stroke="#888" stroke-dasharray="4 2"/>"##
        );
        let _ = writeln!(
            svg,
            r##"  <circle cx="0" cy="0" r="{inner_radius_mm}" fill="none" stroke="#c66" stroke-dasharray="1 2"/>"##
        );

        if let Some(points) = polyline(&self.planned) {
            let _ = writeln!(
                svg,
                r##"  <polyline points="{points}" fill="none" stroke="#bbb" stroke-dasharray="2 3"/>"##
            );
        }
        if let Some(points) = polyline(&self.traced) {
            let _ = writeln!(
                svg,
                r##"  <polyline points="{points}" fill="none" stroke="#36c"/>"##
            );
        }
        if let Some(p) = self.last_position {
            // SVG y grows downward; table y grows upward.
            let _ = writeln!(
                svg,
                r##"  <circle cx="{:.2}" cy="{:.2}" r="2" fill="#2a2"/>"##,
                p.x, -p.y
            );
        }
        svg.push_str("</svg>\n");
        svg
    }
}

/// Render points as an SVG polyline attribute, y flipped
fn polyline(points: &[Point]) -> Option<String> {
    if points.len() < 2 {
        return None;
    }
    let mut out = String::with_capacity(points.len() * 14);
    for p in points {
        let _ = write!(out, "{:.2},{:.2} ", p.x, -p.y);
    }
    out.pop();
    Some(out)
}
