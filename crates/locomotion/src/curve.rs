//! # Baked Curves
//!
//! Piecewise-linear 1-D curves produced by the offline root-motion baker.
//!
//! Curves clamp outside their key range (the first/last value is held), and
//! can be integrated exactly, which the motion warper relies on to land
//! baked displacement on runtime anchors without numerical drift.

use serde::{Deserialize, Serialize};

/// A single curve key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear curve over time.
///
/// Keys are kept sorted by time. An empty curve evaluates to zero everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl From<Vec<Keyframe>> for Curve {
    fn from(keys: Vec<Keyframe>) -> Self {
        Self::new(keys)
    }
}

impl From<Curve> for Vec<Keyframe> {
    fn from(curve: Curve) -> Self {
        curve.keys
    }
}

impl Curve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Build a curve from `(time, value)` pairs.
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        Self::new(pairs.iter().map(|&(t, v)| Keyframe::new(t, v)).collect())
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![Keyframe::new(0.0, value)])
    }

    pub fn linear(t0: f32, v0: f32, t1: f32, v1: f32) -> Self {
        Self::from_pairs(&[(t0, v0), (t1, v1)])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn start_time(&self) -> f32 {
        self.keys.first().map_or(0.0, |k| k.time)
    }

    pub fn end_time(&self) -> f32 {
        self.keys.last().map_or(0.0, |k| k.time)
    }

    /// Sample the curve at `t`, holding the boundary values outside the key range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; guaranteed to exist and be > 0 here
        let upper = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        let alpha = (t - a.time) / span;
        a.value + (b.value - a.value) * alpha
    }

    /// Exact integral of the curve over `[a, b]`.
    ///
    /// Between consecutive breakpoints the curve is linear (or constant outside
    /// the key range), so the trapezoid rule on each piece is exact.
    pub fn integrate(&self, a: f32, b: f32) -> f32 {
        if self.keys.is_empty() || a == b {
            return 0.0;
        }
        if b < a {
            return -self.integrate(b, a);
        }

        let mut total = 0.0;
        let mut x0 = a;
        let mut f0 = self.evaluate(a);
        for key in self.keys.iter().filter(|k| k.time > a && k.time < b) {
            let f1 = self.evaluate(key.time);
            total += 0.5 * (f0 + f1) * (key.time - x0);
            x0 = key.time;
            f0 = f1;
        }
        let fb = self.evaluate(b);
        total += 0.5 * (f0 + fb) * (b - x0);
        total
    }

    /// Keys must be finite; used by config validation.
    pub fn is_finite(&self) -> bool {
        self.keys.iter().all(|k| k.time.is_finite() && k.value.is_finite())
    }
}
