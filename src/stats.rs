//! Decayed sufficient statistics for per-stage service time, per spec §4.3.
//!
//! Mirrors `loopy/auxiliary.go`'s `SStats`: first moment `Xs`, second moment
//! `Xss`, and a count `N`, all decayed by `w = 2^(-alpha*dt)` before a new
//! sample is folded in.

use crate::geometry::Vec2;

#[derive(Debug, Clone, Copy, Default)]
pub struct SStats {
    pub xs: Vec2,
    pub xss: Vec2,
    pub n: f64,
}

impl SStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, other: &SStats) {
        self.xs.add(other.xs);
        self.xss.add(other.xss);
        self.n += other.n;
    }

    pub fn add_val(&mut self, xs: Vec2, xss: Vec2, n: f64) {
        self.xs.add(xs);
        self.xss.add(xss);
        self.n += n;
    }

    pub fn sub(&mut self, other: &SStats) {
        self.xs.sub(other.xs);
        self.xss.sub(other.xss);
        self.n -= other.n;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Decays all four running accumulators by `w = 2^(-alpha*dt)`. Called
    /// before folding in a new sample whenever the wall-clock gap since the
    /// last decay exceeds the configured decay interval.
    pub fn decay(&mut self, alpha: f64, dt: f64) {
        let w = 2f64.powf(-alpha * dt);
        self.xs.mul_c(w);
        self.xss.mul_c(w);
        self.n *= w;
    }

    /// Mean of `(s1, s2)`. Floors the denominator so an empty accumulator
    /// reads as zero instead of NaN.
    pub fn mean(&self) -> Vec2 {
        let n = self.n.max(1e-8);
        Vec2::new(self.xs.x / n, self.xs.y / n)
    }

    /// Mean and (biased) variance of `(s1, s2)`.
    pub fn mean_variance(&self) -> (Vec2, Vec2) {
        let n = self.n.max(1e-8);
        let mean = Vec2::new(self.xs.x / n, self.xs.y / n);
        let var = Vec2::new(
            (self.xss.x / n - mean.x.powi(2)).max(1e-8),
            (self.xss.y / n - mean.y.powi(2)).max(1e-8),
        );
        (mean, var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_single_sample() {
        let mut s = SStats::new();
        s.add_val(Vec2::new(10.0, 2.0), Vec2::new(100.0, 4.0), 1.0);
        let m = s.mean();
        assert!((m.x - 10.0).abs() < 1e-9);
        assert!((m.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn decay_shrinks_old_mass_before_new_sample() {
        let mut s = SStats::new();
        s.add_val(Vec2::new(10.0, 0.0), Vec2::new(100.0, 0.0), 1.0);
        s.decay(0.2, 5.0);
        // w = 2^(-1.0) = 0.5
        assert!((s.n - 0.5).abs() < 1e-9);
        assert!((s.xs.x - 5.0).abs() < 1e-9);
    }
}
