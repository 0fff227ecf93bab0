// Decimation
// Point-density reduction applied while decoding, controlled by a per-axis resolution

use serde::{Deserialize, Serialize};

use super::coords::{CoordinateAccess, PlanarCoords};
use crate::envelope::Envelope;

/// Per-axis resolution tolerance in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decimation {
    pub res_x: f64,
    pub res_y: f64,
}

impl Decimation {
    pub fn new(res_x: f64, res_y: f64) -> Self {
        Self {
            res_x: res_x.abs(),
            res_y: res_y.abs(),
        }
    }

    /// Resolution of one screen pixel when `envelope` is drawn into a
    /// `width_px` x `height_px` viewport
    pub fn from_span(envelope: &Envelope, width_px: u32, height_px: u32) -> Self {
        Self::new(
            envelope.width() / width_px.max(1) as f64,
            envelope.height() / height_px.max(1) as f64,
        )
    }

    /// Squared tolerance used by the line filter
    pub fn tolerance_sq(&self) -> f64 {
        let tolerance = self.res_x.min(self.res_y);
        tolerance * tolerance
    }

    /// Indices kept by the single-pass perpendicular-distance filter.
    ///
    /// Walks the sequence with a running anchor. For each candidate, every point
    /// buffered since the anchor is tested against the line anchor->candidate;
    /// when one strays past the tolerance the previous candidate becomes the new
    /// anchor. The first and last points are always kept.
    pub fn line_indices<C: CoordinateAccess + ?Sized>(&self, coords: &C) -> Vec<usize> {
        let n = coords.size();
        if n <= 2 {
            return (0..n).collect();
        }
        let tolerance_sq = self.tolerance_sq();
        let mut kept = vec![0];
        let mut anchor = 0;

        for i in 2..n {
            let (x1, y1) = (coords.x(anchor), coords.y(anchor));
            let (x2, y2) = (coords.x(i), coords.y(i));
            for j in anchor + 1..i {
                let d = perpendicular_distance_sq(coords.x(j), coords.y(j), x1, y1, x2, y2);
                if d > tolerance_sq {
                    anchor = i - 1;
                    kept.push(anchor);
                    break;
                }
            }
        }
        if kept.last() != Some(&(n - 1)) {
            kept.push(n - 1);
        }
        kept
    }

    /// Indices kept by the minimum-distance point filter: a point survives when
    /// it is farther than `res_x` along X or `res_y` along Y from the last kept point
    pub fn point_indices<C: CoordinateAccess + ?Sized>(&self, coords: &C) -> Vec<usize> {
        let n = coords.size();
        if n == 0 {
            return Vec::new();
        }
        let mut kept = vec![0];
        let (mut lx, mut ly) = (coords.x(0), coords.y(0));
        for i in 1..n {
            let (x, y) = (coords.x(i), coords.y(i));
            if (x - lx).abs() > self.res_x || (y - ly).abs() > self.res_y {
                kept.push(i);
                lx = x;
                ly = y;
            }
        }
        kept
    }

    /// Decimate a line part in place
    pub fn decimate_line(&self, coords: &mut PlanarCoords) {
        let kept = self.line_indices(coords);
        if kept.len() < coords.size() {
            coords.retain_indices(&kept);
        }
    }

    /// Decimate a point set in place
    pub fn decimate_points(&self, coords: &mut PlanarCoords) {
        let kept = self.point_indices(coords);
        if kept.len() < coords.size() {
            coords.retain_indices(&kept);
        }
    }
}

/// Squared distance from `(px, py)` to the infinite line through the two
/// points; distance to the first point when they coincide
fn perpendicular_distance_sq(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        let ex = px - x1;
        let ey = py - y1;
        return ex * ex + ey * ey;
    }
    let cross = dx * (py - y1) - dy * (px - x1);
    cross * cross / len_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar(points: &[(f64, f64)]) -> PlanarCoords {
        let mut coords = PlanarCoords::new(points.len(), 2);
        for (i, &(x, y)) in points.iter().enumerate() {
            coords.set(i, 0, x);
            coords.set(i, 1, y);
        }
        coords
    }

    #[test]
    fn test_collinear_line_collapses() {
        let mut line = planar(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        Decimation::new(0.5, 0.5).decimate_line(&mut line);
        assert_eq!(line.size(), 2);
        assert_eq!((line.x(0), line.y(0)), (0.0, 0.0));
        assert_eq!((line.x(1), line.y(1)), (4.0, 0.0));
    }

    #[test]
    fn test_corner_is_kept() {
        let line = planar(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0)]);
        let kept = Decimation::new(0.1, 0.1).line_indices(&line);
        assert_eq!(kept, vec![0, 2, 4]);
    }

    #[test]
    fn test_small_wiggle_is_dropped() {
        let line = planar(&[(0.0, 0.0), (1.0, 0.01), (2.0, -0.01), (3.0, 0.0)]);
        let kept = Decimation::new(0.1, 0.5).line_indices(&line);
        assert_eq!(kept, vec![0, 3]);
    }

    #[test]
    fn test_decimation_is_bounded() {
        let points: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let t = i as f64 * 0.3;
                (t, (t * 1.7).sin() * 2.0)
            })
            .collect();
        let decimation = Decimation::new(0.2, 0.2);

        let mut once = planar(&points);
        decimation.decimate_line(&mut once);
        assert!(once.size() <= points.len());
        assert!(once.size() >= 2);
        assert_eq!((once.x(0), once.y(0)), points[0]);
        assert_eq!((once.x(once.size() - 1), once.y(once.size() - 1)), points[49]);

        let first_pass = once.size();
        let mut twice = planar(
            &(0..first_pass)
                .map(|i| (once.x(i), once.y(i)))
                .collect::<Vec<_>>(),
        );
        decimation.decimate_line(&mut twice);
        assert!(twice.size() <= first_pass);
        assert_eq!((twice.x(0), twice.y(0)), points[0]);
        assert_eq!((twice.x(twice.size() - 1), twice.y(twice.size() - 1)), points[49]);
    }

    #[test]
    fn test_point_filter_uses_either_axis() {
        let mut points = planar(&[(0.0, 0.0), (0.5, 0.5), (2.0, 0.1), (2.1, 3.0), (2.2, 3.1)]);
        Decimation::new(1.0, 1.0).decimate_points(&mut points);
        assert_eq!(points.size(), 3);
        assert_eq!(points.x(1), 2.0);
        assert_eq!(points.y(2), 3.0);
    }

    #[test]
    fn test_short_inputs() {
        let single = planar(&[(1.0, 1.0)]);
        let decimation = Decimation::new(10.0, 10.0);
        assert_eq!(decimation.line_indices(&single), vec![0]);
        assert_eq!(decimation.point_indices(&single), vec![0]);
        assert!(decimation.point_indices(&planar(&[])).is_empty());
    }

    #[test]
    fn test_from_span() {
        let envelope = Envelope::new(0.0, 0.0, 1000.0, 500.0);
        let decimation = Decimation::from_span(&envelope, 100, 100);
        assert_eq!(decimation.res_x, 10.0);
        assert_eq!(decimation.res_y, 5.0);
        assert_eq!(decimation.tolerance_sq(), 25.0);
    }
}
