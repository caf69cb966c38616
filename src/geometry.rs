//! A small 2D geometry leaf, reused only by [`crate::stats::SStats`]'s
//! sufficient-statistics math. Out of core scope per spec §1 ("the small 2D/ND
//! geometry helpers... are a leaf utility reused by one metric inside the
//! core"); kept minimal rather than porting the original's n-dimensional
//! point/rect/segment library in full.

/// A 2-component vector, used for the `(s1, s2)` service/idle-time pairs
/// that [`crate::stats::SStats`] accumulates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }

    pub fn sub(&mut self, other: Vec2) {
        self.x -= other.x;
        self.y -= other.y;
    }

    pub fn mul_c(&mut self, c: f64) {
        self.x *= c;
        self.y *= c;
    }

    pub fn dist(&self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Intersection state of two line segments, mirroring `gem/util.go`'s
/// `IntersectLines` return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectState {
    /// Lines are parallel and do not overlap; point is unset.
    Parallel,
    /// Lines are parallel and overlapping; point is the overlap midpoint.
    ParallelOverlapping,
    /// The (infinite) lines intersect outside both segments.
    Outside,
    /// The segments intersect.
    Intersecting,
}

const LIMIT: f64 = 1e-5;
const INFINITY: f64 = 1e10;

/// Computes the intersection of two line segments (or two infinite lines),
/// per `gem/util.go`'s `IntersectLines`.
///
/// The original's in-segment distance check uses
/// `sqrt(dx^2 - dy^2)` instead of the Euclidean `sqrt(dx^2 + dy^2)` (see
/// spec §9's "Open Questions" - this is flagged there as a bug). This port
/// computes the correct Euclidean distance; the divergence is intentional
/// and documented, not a faithfulness gap.
pub fn intersect_lines(
    (x0, y0): (f64, f64),
    (x1, y1): (f64, f64),
    (x2, y2): (f64, f64),
    (x3, y3): (f64, f64),
) -> (Option<Vec2>, IntersectState) {
    let a0 = if (x0 - x1).abs() < LIMIT {
        INFINITY
    } else {
        (y0 - y1) / (x0 - x1)
    };
    let a1 = if (x2 - x3).abs() < LIMIT {
        INFINITY
    } else {
        (y2 - y3) / (x2 - x3)
    };
    let b0 = y0 - a0 * x0;
    let b1 = y2 - a1 * x2;

    if (a0 - a1).abs() < LIMIT {
        if (b0 - b1).abs() >= LIMIT {
            return (None, IntersectState::Parallel);
        }
        let (x, y);
        if (x0 - x1).abs() < LIMIT {
            if y0.min(y1) < y2.max(y3) || y0.max(y1) > y2.min(y3) {
                let two_middle =
                    y0 + y1 + y2 + y3 - y0.min(y1.min(y2.min(y3))) - y0.max(y1.max(y2.max(y3)));
                y = two_middle / 2.0;
                x = (y - b0) / a0;
            } else {
                return (None, IntersectState::Parallel);
            }
        } else if x0.min(x1) < x2.max(x3) || x0.max(x1) > x2.min(x3) {
            let two_middle =
                x0 + x1 + x2 + x3 - x0.min(x1.min(x2.min(x3))) - x0.max(x1.max(x2.max(x3)));
            x = two_middle / 2.0;
            y = a0 * x + b0;
        } else {
            return (None, IntersectState::Parallel);
        }
        return (
            Some(Vec2::new(x, y)),
            IntersectState::ParallelOverlapping,
        );
    }

    let (x, y) = if (a0 - INFINITY).abs() < LIMIT {
        let x = x0;
        (x, a1 * x + b1)
    } else if (a1 - INFINITY).abs() < LIMIT {
        let x = x2;
        (x, a0 * x + b0)
    } else {
        let x = -(b0 - b1) / (a0 - a1);
        (x, a0 * x + b0)
    };

    let dist_from_1 = segment_overshoot(x0, y0, x1, y1, x, y);
    let dist_from_2 = segment_overshoot(x2, y2, x3, y3, x, y);

    let state = if dist_from_1.abs() < LIMIT && dist_from_2.abs() < LIMIT {
        IntersectState::Intersecting
    } else {
        IntersectState::Outside
    };
    (Some(Vec2::new(x, y)), state)
}

/// How far `(x, y)` overshoots the segment `(x0,y0)-(x1,y1)` once projected
/// onto its line; zero when the point lies within the segment's span.
fn segment_overshoot(x0: f64, y0: f64, x1: f64, y1: f64, x: f64, y: f64) -> f64 {
    let euclid = |px: f64, py: f64| ((x - px).powi(2) + (y - py).powi(2)).sqrt();
    if (x0 - x1).abs() < LIMIT {
        let (lo, hi) = if y0 < y1 { (y0, y1) } else { (y1, y0) };
        if y < lo {
            euclid(x0, y0).min(euclid(x1, y1))
        } else if y > hi {
            euclid(x0, y0).min(euclid(x1, y1))
        } else {
            0.0
        }
    } else {
        let (lo, hi) = if x0 < x1 { (x0, x1) } else { (x1, x0) };
        if x < lo || x > hi {
            euclid(x0, y0).min(euclid(x1, y1))
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_diagonals_intersect_at_center() {
        let (p, s) = intersect_lines((0.0, 0.0), (100.0, 100.0), (0.0, 100.0), (100.0, 0.0));
        let p = p.unwrap();
        assert!((p.x - 50.0).abs() < 1e-6);
        assert!((p.y - 50.0).abs() < 1e-6);
        assert_eq!(s, IntersectState::Intersecting);
    }

    #[test]
    fn parallel_segments_report_parallel_family() {
        let (_, s) = intersect_lines((0.0, 0.0), (100.0, 100.0), (10.0, 10.0), (110.0, 110.0));
        assert!(matches!(
            s,
            IntersectState::Parallel | IntersectState::ParallelOverlapping
        ));
    }
}
