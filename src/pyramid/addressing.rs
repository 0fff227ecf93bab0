// Tile addressing
// Maps mosaic tile coordinates to world envelopes and affine transforms

use serde::{Deserialize, Serialize};

use super::model::{Mosaic, Pyramid};
use super::PyramidError;
use crate::envelope::{Envelope, GeneralEnvelope};

/// 2D affine transform:
/// `x' = a*x + b*y + c`, `y' = d*x + e*y + f`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform2D {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Scale then translate, no rotation
    pub fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self::new(sx, 0.0, tx, 0.0, sy, ty)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        let c = -(a * self.c + b * self.f);
        let f = -(d * self.c + e * self.f);
        Some(Self::new(a, b, c, d, e, f))
    }

    /// `self` applied after `first`
    pub fn then(&self, first: &AffineTransform2D) -> Self {
        Self::new(
            self.a * first.a + self.b * first.d,
            self.a * first.b + self.b * first.e,
            self.a * first.c + self.b * first.f + self.c,
            self.d * first.a + self.e * first.d,
            self.d * first.b + self.e * first.e,
            self.d * first.c + self.e * first.f + self.f,
        )
    }
}

impl Default for AffineTransform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Half-open block of tiles: `col_min..col_max` by `row_min..row_max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub col_min: u32,
    pub col_max: u32,
    pub row_min: u32,
    pub row_max: u32,
}

impl TileRange {
    pub fn cols(&self) -> u32 {
        self.col_max - self.col_min
    }

    pub fn rows(&self) -> u32 {
        self.row_max - self.row_min
    }

    pub fn len(&self) -> usize {
        self.cols() as usize * self.rows() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tiles in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let range = *self;
        (range.row_min..range.row_max)
            .flat_map(move |row| (range.col_min..range.col_max).map(move |col| (col, row)))
    }
}

impl Mosaic {
    fn origin(&self) -> (f64, f64) {
        (
            self.upper_left.first().copied().unwrap_or(0.0),
            self.upper_left.get(1).copied().unwrap_or(0.0),
        )
    }

    /// World width of one tile
    pub fn tile_span_x(&self) -> f64 {
        self.tile_width as f64 * self.scale
    }

    /// World height of one tile
    pub fn tile_span_y(&self) -> f64 {
        self.tile_height as f64 * self.scale
    }

    pub fn contains_tile(&self, col: u32, row: u32) -> bool {
        col < self.grid_width && row < self.grid_height
    }

    pub(crate) fn check_tile(&self, col: u32, row: u32) -> Result<(), PyramidError> {
        if self.contains_tile(col, row) {
            Ok(())
        } else {
            Err(PyramidError::TileOutOfRange { col, row })
        }
    }

    /// Row-major position of a tile in the grid
    pub fn tile_index(&self, col: u32, row: u32) -> Result<usize, PyramidError> {
        self.check_tile(col, row)?;
        Ok(row as usize * self.grid_width as usize + col as usize)
    }

    /// Horizontal extent of one tile
    pub fn tile_envelope_2d(&self, col: u32, row: u32) -> Result<Envelope, PyramidError> {
        self.check_tile(col, row)?;
        let (ulx, uly) = self.origin();
        let (sx, sy) = (self.tile_span_x(), self.tile_span_y());
        Ok(Envelope::new(
            ulx + col as f64 * sx,
            uly - (row as f64 + 1.0) * sy,
            ulx + (col as f64 + 1.0) * sx,
            uly - row as f64 * sy,
        ))
    }

    /// Full extent of one tile; extra axes are the mosaic's slice
    pub fn tile_envelope(&self, col: u32, row: u32) -> Result<GeneralEnvelope, PyramidError> {
        let horizontal = self.tile_envelope_2d(col, row)?;
        Ok(self.with_slice(horizontal))
    }

    pub fn envelope_2d(&self) -> Envelope {
        let (ulx, uly) = self.origin();
        Envelope::new(
            ulx,
            uly - self.grid_height as f64 * self.tile_span_y(),
            ulx + self.grid_width as f64 * self.tile_span_x(),
            uly,
        )
    }

    pub fn envelope(&self) -> GeneralEnvelope {
        self.with_slice(self.envelope_2d())
    }

    fn with_slice(&self, horizontal: Envelope) -> GeneralEnvelope {
        let mut lower = vec![horizontal.min_x, horizontal.min_y];
        let mut upper = vec![horizontal.max_x, horizontal.max_y];
        for &v in self.upper_left.iter().skip(2) {
            lower.push(v);
            upper.push(v);
        }
        GeneralEnvelope::new(lower, upper)
    }

    /// Pixel grid of the whole mosaic to world coordinates
    pub fn grid_to_crs(&self) -> AffineTransform2D {
        let (ulx, uly) = self.origin();
        AffineTransform2D::scale_translate(self.scale, -self.scale, ulx, uly)
    }

    /// Pixel grid of one tile to world coordinates
    pub fn tile_grid_to_crs(&self, col: u32, row: u32) -> Result<AffineTransform2D, PyramidError> {
        self.check_tile(col, row)?;
        let (ulx, uly) = self.origin();
        Ok(AffineTransform2D::scale_translate(
            self.scale,
            -self.scale,
            ulx + col as f64 * self.tile_span_x(),
            uly - row as f64 * self.tile_span_y(),
        ))
    }

    /// Tiles intersecting `envelope`, clipped to the grid
    pub fn tile_range(&self, envelope: &Envelope) -> Option<TileRange> {
        if envelope.is_empty() || self.scale <= 0.0 {
            return None;
        }
        let (ulx, uly) = self.origin();
        let (sx, sy) = (self.tile_span_x(), self.tile_span_y());
        let clamp = |v: f64, max: u32| -> u32 { v.max(0.0).min(max as f64) as u32 };

        let range = TileRange {
            col_min: clamp(((envelope.min_x - ulx) / sx).floor(), self.grid_width),
            col_max: clamp(((envelope.max_x - ulx) / sx).ceil(), self.grid_width),
            row_min: clamp(((uly - envelope.max_y) / sy).floor(), self.grid_height),
            row_max: clamp(((uly - envelope.min_y) / sy).ceil(), self.grid_height),
        };
        if range.col_min >= range.col_max || range.row_min >= range.row_max {
            None
        } else {
            Some(range)
        }
    }

    /// Tiles needed to cover `envelope` at this level, per axis and rounded.
    /// An axis without a finite span borrows the other axis' count.
    pub fn estimated_tiles(&self, envelope: &GeneralEnvelope) -> f64 {
        let mut nx = envelope.span(0) / self.tile_span_x();
        let mut ny = envelope.span(1) / self.tile_span_y();
        if !nx.is_finite() {
            nx = ny;
        }
        if !ny.is_finite() {
            ny = nx;
        }
        nx.round() * ny.round()
    }
}

/// True when `scale` is within `tolerance` (a fraction) of `wanted`, either side
pub fn scale_matches(scale: f64, wanted: f64, tolerance: f64) -> bool {
    (scale - wanted).abs() <= wanted.abs() * tolerance.abs()
}

/// Mosaics whose scale is within `tolerance` (a fraction) of `scale`
pub fn candidate_mosaics(pyramid: &Pyramid, scale: f64, tolerance: f64) -> Vec<&Mosaic> {
    pyramid
        .mosaics
        .iter()
        .filter(|m| scale_matches(m.scale, scale, tolerance))
        .collect()
}
