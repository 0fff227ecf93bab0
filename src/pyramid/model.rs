// Pyramid model
// Persisted descriptors for pyramids and their mosaics; plain values built from primitives

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One resolution level of a pyramid: a grid of equally sized tiles at a fixed scale.
/// Tile rows grow downwards from the upper-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mosaic {
    pub id: String,
    /// Owning pyramid
    pub pyramid_id: String,
    /// Upper-left corner; ordinates past the second select the slice (elevation, time, ...)
    #[serde(rename = "corner", default)]
    pub upper_left: Vec<f64>,
    pub grid_width: u32,
    pub grid_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// World units per pixel on both axes
    pub scale: f64,
}

impl Mosaic {
    pub fn new(
        pyramid_id: &str,
        upper_left: Vec<f64>,
        grid_size: (u32, u32),
        tile_size: (u32, u32),
        scale: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pyramid_id: pyramid_id.to_string(),
            upper_left,
            grid_width: grid_size.0,
            grid_height: grid_size.1,
            tile_width: tile_size.0,
            tile_height: tile_size.1,
            scale,
        }
    }

    pub fn dimension(&self) -> usize {
        self.upper_left.len()
    }

    pub fn num_tiles(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    /// Pixel width of the whole grid
    pub fn pixel_width(&self) -> u64 {
        self.grid_width as u64 * self.tile_width as u64
    }

    pub fn pixel_height(&self) -> u64 {
        self.grid_height as u64 * self.tile_height as u64
    }
}

fn default_bands() -> u8 {
    4
}

fn default_bits() -> u8 {
    8
}

/// Mosaics sharing one coordinate reference system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pyramid {
    pub id: String,
    /// CRS identifier understood by the CRS service
    pub crs: String,
    #[serde(default = "default_bands")]
    pub bands: u8,
    #[serde(default = "default_bits")]
    pub bits_per_sample: u8,
    #[serde(rename = "mosaic", default)]
    pub mosaics: Vec<Mosaic>,
}

impl Pyramid {
    pub fn new(crs: &str) -> Self {
        Self::with_id(&Uuid::new_v4().to_string(), crs)
    }

    pub fn with_id(id: &str, crs: &str) -> Self {
        Self {
            id: id.to_string(),
            crs: crs.to_string(),
            bands: default_bands(),
            bits_per_sample: default_bits(),
            mosaics: Vec::new(),
        }
    }

    /// Add a mosaic to this pyramid and return it. Mosaics are never removed.
    pub fn add_mosaic(
        &mut self,
        upper_left: Vec<f64>,
        grid_size: (u32, u32),
        tile_size: (u32, u32),
        scale: f64,
    ) -> &Mosaic {
        let mosaic = Mosaic::new(&self.id, upper_left, grid_size, tile_size, scale);
        self.mosaics.push(mosaic);
        &self.mosaics[self.mosaics.len() - 1]
    }

    pub fn mosaic(&self, id: &str) -> Option<&Mosaic> {
        self.mosaics.iter().find(|m| m.id == id)
    }

    /// Scales present in this pyramid, coarsest first
    pub fn scales(&self) -> Vec<f64> {
        let mut scales: Vec<f64> = self.mosaics.iter().map(|m| m.scale).collect();
        scales.sort_by(|a, b| b.total_cmp(a));
        scales.dedup();
        scales
    }
}

/// All pyramids of one coverage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "pyramids")]
pub struct PyramidSet {
    #[serde(rename = "pyramid", default)]
    pub pyramids: Vec<Pyramid>,
}

impl PyramidSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pyramid(&mut self, pyramid: Pyramid) {
        self.pyramids.push(pyramid);
    }

    pub fn pyramid(&self, id: &str) -> Option<&Pyramid> {
        self.pyramids.iter().find(|p| p.id == id)
    }

    pub fn pyramid_mut(&mut self, id: &str) -> Option<&mut Pyramid> {
        self.pyramids.iter_mut().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.pyramids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pyramids.len()
    }
}
