// Coordinate buffers
// Flat f64 storage for decoded coordinates in two layouts that share one access trait

use crate::envelope::Envelope;

/// Logical access to a packed coordinate sequence.
/// Component 0 is X, 1 is Y and 2 (when present) is Z.
pub trait CoordinateAccess {
    /// Number of coordinates
    fn size(&self) -> usize;

    /// Components per coordinate (2 or 3)
    fn dimension(&self) -> usize;

    /// Ordinate `component` of coordinate `index`. NaN for a component the
    /// sequence does not carry.
    fn get(&self, index: usize, component: usize) -> f64;

    fn x(&self, index: usize) -> f64 {
        self.get(index, 0)
    }

    fn y(&self, index: usize) -> f64 {
        self.get(index, 1)
    }

    fn z(&self, index: usize) -> f64 {
        if self.dimension() > 2 {
            self.get(index, 2)
        } else {
            f64::NAN
        }
    }

    fn has_z(&self) -> bool {
        self.dimension() > 2
    }

    fn expand_envelope(&self, envelope: &mut Envelope) {
        for i in 0..self.size() {
            envelope.expand_to_include(self.x(i), self.y(i));
        }
    }

    fn envelope(&self) -> Envelope {
        let mut envelope = Envelope::empty();
        self.expand_envelope(&mut envelope);
        envelope
    }
}

/// Point-major layout: `[x0, y0, (z0), x1, y1, (z1), ...]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterleavedCoords {
    data: Vec<f64>,
    dimension: usize,
}

impl InterleavedCoords {
    pub fn new(dimension: usize) -> Self {
        Self {
            data: Vec::new(),
            dimension: dimension.clamp(2, 3),
        }
    }

    pub fn with_capacity(dimension: usize, points: usize) -> Self {
        let dimension = dimension.clamp(2, 3);
        Self {
            data: Vec::with_capacity(points * dimension),
            dimension,
        }
    }

    pub fn from_xy(points: &[(f64, f64)]) -> Self {
        let mut coords = Self::with_capacity(2, points.len());
        for &(x, y) in points {
            coords.push_xy(x, y);
        }
        coords
    }

    pub fn from_xyz(points: &[(f64, f64, f64)]) -> Self {
        let mut coords = Self::with_capacity(3, points.len());
        for &(x, y, z) in points {
            coords.push_xyz(x, y, z);
        }
        coords
    }

    pub fn push_xy(&mut self, x: f64, y: f64) {
        self.data.push(x);
        self.data.push(y);
        if self.dimension == 3 {
            self.data.push(f64::NAN);
        }
    }

    pub fn push_xyz(&mut self, x: f64, y: f64, z: f64) {
        self.data.push(x);
        self.data.push(y);
        if self.dimension == 3 {
            self.data.push(z);
        }
    }

    /// Append coordinate `index` of another sequence
    pub fn push_from<C: CoordinateAccess + ?Sized>(&mut self, other: &C, index: usize) {
        self.push_xyz(other.x(index), other.y(index), other.z(index));
    }

    pub fn set(&mut self, index: usize, component: usize, value: f64) {
        if component < self.dimension {
            self.data[index * self.dimension + component] = value;
        }
    }

    pub fn reverse(&mut self) {
        let dim = self.dimension;
        let n = self.size();
        for i in 0..n / 2 {
            let j = n - 1 - i;
            for c in 0..dim {
                self.data.swap(i * dim + c, j * dim + c);
            }
        }
    }

    pub fn reversed(&self) -> Self {
        let mut copy = self.clone();
        copy.reverse();
        copy
    }

    /// First and last coordinates share X and Y
    pub fn is_closed(&self) -> bool {
        let n = self.size();
        n > 0 && self.x(0) == self.x(n - 1) && self.y(0) == self.y(n - 1)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl CoordinateAccess for InterleavedCoords {
    fn size(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get(&self, index: usize, component: usize) -> f64 {
        if component >= self.dimension {
            return f64::NAN;
        }
        self.data[index * self.dimension + component]
    }
}

/// Component-major layout: `[x0..xN-1, y0..yN-1, (z0..zN-1)]`.
///
/// Each component occupies a block of `stride` slots. Decimation compacts the
/// blocks in place; slots above `size` hold stale values.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarCoords {
    data: Vec<f64>,
    stride: usize,
    size: usize,
    dimension: usize,
}

impl PlanarCoords {
    /// A buffer of `size` coordinates, all zero
    pub fn new(size: usize, dimension: usize) -> Self {
        let dimension = dimension.clamp(2, 3);
        Self {
            data: vec![0.0; size * dimension],
            stride: size,
            size,
            dimension,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn set(&mut self, index: usize, component: usize, value: f64) {
        if component < self.dimension && index < self.stride {
            self.data[component * self.stride + index] = value;
        }
    }

    /// Keep only the coordinates at `indices` (ascending), moving them to the
    /// front of each component block
    pub fn retain_indices(&mut self, indices: &[usize]) {
        for c in 0..self.dimension {
            let base = c * self.stride;
            for (dst, &src) in indices.iter().enumerate() {
                if src < self.size {
                    self.data[base + dst] = self.data[base + src];
                }
            }
        }
        self.size = indices.iter().filter(|&&i| i < self.size).count();
    }

    pub fn to_interleaved(&self) -> InterleavedCoords {
        let mut coords = InterleavedCoords::with_capacity(self.dimension, self.size);
        for i in 0..self.size {
            coords.push_from(self, i);
        }
        coords
    }
}

impl CoordinateAccess for PlanarCoords {
    fn size(&self) -> usize {
        self.size
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get(&self, index: usize, component: usize) -> f64 {
        if component >= self.dimension {
            return f64::NAN;
        }
        self.data[component * self.stride + index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (InterleavedCoords, PlanarCoords) {
        let points = [(0.0, 1.0, 2.0), (3.0, 4.0, 5.0), (6.0, 7.0, 8.0)];
        let interleaved = InterleavedCoords::from_xyz(&points);
        let mut planar = PlanarCoords::new(3, 3);
        for (i, &(x, y, z)) in points.iter().enumerate() {
            planar.set(i, 0, x);
            planar.set(i, 1, y);
            planar.set(i, 2, z);
        }
        (interleaved, planar)
    }

    #[test]
    fn test_layouts_agree() {
        let (interleaved, planar) = sample();
        assert_eq!(interleaved.as_slice(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(interleaved.size(), planar.size());
        for i in 0..3 {
            for c in 0..3 {
                assert_eq!(interleaved.get(i, c), planar.get(i, c));
            }
        }
        assert_eq!(interleaved.envelope(), planar.envelope());
        assert_eq!(planar.to_interleaved(), interleaved);
    }

    #[test]
    fn test_missing_z_is_nan() {
        let coords = InterleavedCoords::from_xy(&[(1.0, 2.0)]);
        assert!(!coords.has_z());
        assert!(coords.z(0).is_nan());
        assert!(coords.get(0, 2).is_nan());
    }

    #[test]
    fn test_retain_indices_compacts() {
        let (_, mut planar) = sample();
        planar.retain_indices(&[0, 2]);
        assert_eq!(planar.size(), 2);
        assert_eq!(planar.x(1), 6.0);
        assert_eq!(planar.y(1), 7.0);
        assert_eq!(planar.z(1), 8.0);
        assert_eq!(planar.stride(), 3);
    }

    #[test]
    fn test_reverse_and_closed() {
        let mut ring = InterleavedCoords::from_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert!(ring.is_closed());
        ring.reverse();
        assert_eq!(ring.x(1), 1.0);
        assert_eq!(ring.y(1), 1.0);
        assert!(ring.is_closed());
    }
}
