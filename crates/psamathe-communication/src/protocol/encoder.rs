//! Command encoder
//!
//! Decomposes one path segment into flow-controlled motion commands.
//! Long jumps are chunked so no single command exceeds the configured
//! travel distance, which bounds the device's worst-case execution time
//! per command and keeps acknowledgment latency predictable.
//!
//! The encoder is a pure function: identical inputs always yield
//! identical, identically-ordered commands. Retransmissions depend on
//! this.

use crate::protocol::frame::MotionCommand;
use psamathe_core::{wrap_degrees, Point, TableGeometry};

/// Encode the segment `from -> to` as a command per chunk
///
/// Chunk count is `ceil(length / max_step_mm)`; chunk targets advance by
/// `max_step_mm` along the segment, the final chunk covering the
/// remainder and landing exactly on `to`. A zero-length segment yields
/// no commands. Sequence numbers start at `first_seq` and increase by
/// one per chunk.
///
/// Step deltas are computed chunk-to-chunk in the table's polar space:
/// the platter takes the short way around, and the in-out axis gets the
/// coupling compensation subtracted.
pub fn encode_segment(
    from: Point,
    to: Point,
    first_seq: u32,
    max_step_mm: f64,
    geometry: &TableGeometry,
) -> Vec<MotionCommand> {
    debug_assert!(max_step_mm > 0.0, "max_step_mm must be positive");

    let length = from.distance_to(&to);
    if length == 0.0 {
        return Vec::new();
    }

    let chunks = (length / max_step_mm).ceil() as u32;
    let mut commands = Vec::with_capacity(chunks as usize);
    let mut previous = from.to_polar();

    for k in 1..=chunks {
        let travelled = (f64::from(k) * max_step_mm).min(length);
        let target = from.lerp(&to, travelled / length);
        let polar = target.to_polar();

        let delta_theta = wrap_degrees(polar.theta_deg - previous.theta_deg);
        let delta_r = polar.r_mm - previous.r_mm;

        let rotation_steps = (delta_theta / geometry.rotation_deg_per_step).round() as i32;
        let inout_raw = (delta_r * geometry.inout_steps_per_mm).round() as i32;
        let compensation =
            (geometry.compensation_ratio * f64::from(rotation_steps)).round() as i32;

        commands.push(MotionCommand {
            seq: first_seq + (k - 1),
            target,
            rotation_steps,
            inout_steps: inout_raw - compensation,
        });
        previous = polar;
    }

    commands
}

/// Number of commands a segment will produce
pub fn chunk_count(from: Point, to: Point, max_step_mm: f64) -> u32 {
    let length = from.distance_to(&to);
    if length == 0.0 {
        0
    } else {
        (length / max_step_mm).ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> TableGeometry {
        TableGeometry::default()
    }

    #[test]
    fn test_zero_length_segment_yields_nothing() {
        let p = Point::new(40.0, 0.0);
        assert!(encode_segment(p, p, 1, 4.0, &geo()).is_empty());
        assert_eq!(chunk_count(p, p, 4.0), 0);
    }

    #[test]
    fn test_chunk_targets_interpolated() {
        let commands =
            encode_segment(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 1, 4.0, &geo());
        assert_eq!(commands.len(), 3);

        let targets: Vec<_> = commands.iter().map(|c| c.target).collect();
        assert!((targets[0].x - 4.0).abs() < 1e-9);
        assert!((targets[1].x - 8.0).abs() < 1e-9);
        assert!((targets[2].x - 10.0).abs() < 1e-9);
        for t in &targets {
            assert!(t.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_sequence_numbers_consecutive() {
        let commands =
            encode_segment(Point::new(40.0, 0.0), Point::new(0.0, 40.0), 7, 4.0, &geo());
        for (i, c) in commands.iter().enumerate() {
            assert_eq!(c.seq, 7 + i as u32);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = encode_segment(Point::new(40.0, 3.0), Point::new(-55.0, 61.0), 5, 4.0, &geo());
        let b = encode_segment(Point::new(40.0, 3.0), Point::new(-55.0, 61.0), 5, 4.0, &geo());
        assert_eq!(a, b);
        assert_eq!(
            a.iter().map(|c| c.encode()).collect::<Vec<_>>(),
            b.iter().map(|c| c.encode()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_chunk_count_ceiling() {
        let from = Point::new(40.0, 0.0);
        assert_eq!(chunk_count(from, Point::new(48.0, 0.0), 4.0), 2);
        assert_eq!(chunk_count(from, Point::new(48.1, 0.0), 4.0), 3);
        assert_eq!(chunk_count(from, Point::new(41.0, 0.0), 4.0), 1);
    }

    #[test]
    fn test_pure_radial_move_has_no_rotation() {
        let commands =
            encode_segment(Point::new(40.0, 0.0), Point::new(60.0, 0.0), 1, 4.0, &geo());
        assert_eq!(commands.len(), 5);
        let total_inout: i32 = commands.iter().map(|c| c.inout_steps).sum();
        for c in &commands {
            assert_eq!(c.rotation_steps, 0);
        }
        // 20mm at 33 steps/mm, rounded per chunk
        assert!((total_inout - 660).abs() <= commands.len() as i32);
    }

    #[test]
    fn test_rotation_applies_compensation() {
        // Quarter turn at constant radius: in-out steps exist only to
        // cancel the coupling drag.
        let commands =
            encode_segment(Point::new(60.0, 0.0), Point::new(0.0, 60.0), 1, 4.0, &geo());
        let total_rot: i32 = commands.iter().map(|c| c.rotation_steps).sum();
        let total_inout: i32 = commands.iter().map(|c| c.inout_steps).sum();
        assert!(total_rot > 0);
        // Compensation pushes in-out negative while radius shrinks
        // toward the chord midpoints and returns, netting negative.
        assert!(total_inout < 0);
    }

    #[test]
    fn test_angle_wraps_short_way() {
        // Crossing the -180/180 seam must not produce a full-circle sweep.
        let commands = encode_segment(
            Point::new(-60.0, -1.0),
            Point::new(-60.0, 1.0),
            1,
            4.0,
            &geo(),
        );
        let total_rot: i32 = commands.iter().map(|c| c.rotation_steps).sum();
        // ~2 degrees of platter travel, not ~358.
        assert!(total_rot.abs() < (5.0 / geo().rotation_deg_per_step) as i32);
    }
}
