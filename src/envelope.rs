// Envelopes - axis-aligned bounds shared by the shapefile codec and the pyramid engine

use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An envelope that contains nothing; expanding it by a point yields that point
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Grow to include a point. NaN ordinates are ignored.
    pub fn expand_to_include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn expand_to_include_envelope(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        self.expand_to_include(other.min_x, other.min_y);
        self.expand_to_include(other.max_x, other.max_y);
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        !(self.is_empty()
            || other.is_empty()
            || other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Bounds as `[min_x, min_y, max_x, max_y]`, or all zeros when empty
    pub fn to_array(&self) -> [f64; 4] {
        if self.is_empty() {
            return [0.0, 0.0, 0.0, 0.0];
        }
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::empty()
    }
}

/// An N-dimensional envelope. Axes 0 and 1 are the horizontal axes; any further
/// axes (elevation, time, ...) select slices of a pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralEnvelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl GeneralEnvelope {
    /// Build from lower and upper corners. Mismatched corner lengths are truncated
    /// to the shorter one.
    pub fn new(mut lower: Vec<f64>, mut upper: Vec<f64>) -> Self {
        let dimension = lower.len().min(upper.len());
        lower.truncate(dimension);
        upper.truncate(dimension);
        Self { lower, upper }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self, axis: usize) -> f64 {
        self.lower.get(axis).copied().unwrap_or(f64::NAN)
    }

    pub fn upper(&self, axis: usize) -> f64 {
        self.upper.get(axis).copied().unwrap_or(f64::NAN)
    }

    /// Extent along one axis; NaN for an axis the envelope does not have
    pub fn span(&self, axis: usize) -> f64 {
        self.upper(axis) - self.lower(axis)
    }

    /// The horizontal part of this envelope
    pub fn horizontal(&self) -> Envelope {
        Envelope::new(self.lower(0), self.lower(1), self.upper(0), self.upper(1))
    }

    /// Fraction of `other` covered by `self` along one axis. Degenerate (zero
    /// width) ranges count as fully covered when they fall inside the other range.
    pub fn axis_overlap_ratio(&self, other: &GeneralEnvelope, axis: usize) -> f64 {
        axis_overlap(
            self.lower(axis),
            self.upper(axis),
            other.lower(axis),
            other.upper(axis),
        )
    }
}

impl From<Envelope> for GeneralEnvelope {
    fn from(env: Envelope) -> Self {
        Self {
            lower: vec![env.min_x, env.min_y],
            upper: vec![env.max_x, env.max_y],
        }
    }
}

/// Portion of `[ref_lo, ref_hi]` covered by `[lo, hi]`, in `[0, 1]`
pub(crate) fn axis_overlap(lo: f64, hi: f64, ref_lo: f64, ref_hi: f64) -> f64 {
    if lo.is_nan() || hi.is_nan() || ref_lo.is_nan() || ref_hi.is_nan() {
        return 0.0;
    }
    let ref_span = ref_hi - ref_lo;
    if ref_span <= 0.0 {
        // degenerate reference: covered or not
        return if ref_lo >= lo && ref_lo <= hi { 1.0 } else { 0.0 };
    }
    let start = lo.max(ref_lo);
    let end = hi.min(ref_hi);
    if end < start {
        return 0.0;
    }
    if end == start && hi > lo {
        return 0.0;
    }
    if hi == lo {
        // a degenerate slice inside the reference range
        return 1.0;
    }
    (end - start) / ref_span
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_from_empty() {
        let mut env = Envelope::empty();
        assert!(env.is_empty());
        env.expand_to_include(1.0, 2.0);
        env.expand_to_include(-1.0, 5.0);
        assert_eq!(env, Envelope::new(-1.0, 2.0, 1.0, 5.0));
        assert_eq!(env.width(), 2.0);
        assert_eq!(env.height(), 3.0);
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut env = Envelope::empty();
        env.expand_to_include(3.0, 4.0);
        env.expand_to_include(f64::NAN, f64::NAN);
        assert_eq!(env.to_array(), [3.0, 4.0, 3.0, 4.0]);
    }

    #[test]
    fn test_contains_and_intersection() {
        let outer = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let inner = Envelope::new(2.0, 2.0, 4.0, 4.0);
        let apart = Envelope::new(20.0, 20.0, 30.0, 30.0);

        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert_eq!(outer.intersection(&inner), Some(inner));
        assert_eq!(outer.intersection(&apart), None);
        assert_eq!(Envelope::empty().to_array(), [0.0; 4]);
    }

    #[test]
    fn test_axis_overlap() {
        assert_eq!(axis_overlap(0.0, 5.0, 0.0, 10.0), 0.5);
        assert_eq!(axis_overlap(-5.0, 15.0, 0.0, 10.0), 1.0);
        assert_eq!(axis_overlap(20.0, 30.0, 0.0, 10.0), 0.0);
        // slice inside query range
        assert_eq!(axis_overlap(3.0, 3.0, 0.0, 10.0), 1.0);
        // query is itself a slice
        assert_eq!(axis_overlap(0.0, 10.0, 4.0, 4.0), 1.0);
        assert_eq!(axis_overlap(5.0, 5.0, 4.0, 4.0), 0.0);
    }

    #[test]
    fn test_general_envelope_axes() {
        let env = GeneralEnvelope::new(vec![0.0, 0.0, 100.0], vec![10.0, 20.0, 200.0]);
        assert_eq!(env.dimension(), 3);
        assert_eq!(env.span(2), 100.0);
        assert!(env.span(3).is_nan());
        assert_eq!(env.horizontal(), Envelope::new(0.0, 0.0, 10.0, 20.0));
    }
}
