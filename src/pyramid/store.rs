// Tile storage
// Existence bitsets for sparse mosaics and the storage trait tile readers and
// writers share, with an in-process implementation

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::model::Mosaic;
use super::tile::{TileImage, TileKey, TileReference, TileState};
use super::PyramidError;

/// Which tiles of one mosaic have been written
#[derive(Debug)]
pub struct TileMask {
    width: u32,
    height: u32,
    bits: RwLock<Vec<u64>>,
}

impl TileMask {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize * height as usize).div_ceil(64);
        Self {
            width,
            height,
            bits: RwLock::new(vec![0; len]),
        }
    }

    pub fn for_mosaic(mosaic: &Mosaic) -> Self {
        Self::new(mosaic.grid_width, mosaic.grid_height)
    }

    fn bit(&self, col: u32, row: u32) -> Option<(usize, u64)> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let index = row as usize * self.width as usize + col as usize;
        Some((index / 64, 1u64 << (index % 64)))
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        match self.bit(col, row) {
            Some((word, mask)) => {
                let bits = self.bits.read().unwrap_or_else(PoisonError::into_inner);
                bits[word] & mask != 0
            }
            None => false,
        }
    }

    /// Record a tile as written; false if it lies outside the grid
    pub fn mark(&self, col: u32, row: u32) -> bool {
        match self.bit(col, row) {
            Some((word, mask)) => {
                let mut bits = self.bits.write().unwrap_or_else(PoisonError::into_inner);
                bits[word] |= mask;
                true
            }
            None => false,
        }
    }

    /// Number of written tiles
    pub fn count(&self) -> usize {
        let bits = self.bits.read().unwrap_or_else(PoisonError::into_inner);
        bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Per-mosaic masks, created on first use
#[derive(Debug, Default)]
pub(super) struct MaskTable {
    masks: RwLock<HashMap<String, Arc<TileMask>>>,
}

impl MaskTable {
    /// Mask for `mosaic`; a new mask is filled by `init` before anyone else sees it
    pub(super) fn mask<F>(&self, mosaic: &Mosaic, init: F) -> Result<Arc<TileMask>, PyramidError>
    where
        F: FnOnce(&TileMask) -> Result<(), PyramidError>,
    {
        {
            let masks = self.masks.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(mask) = masks.get(&mosaic.id) {
                return Ok(Arc::clone(mask));
            }
        }
        let mut masks = self.masks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(mask) = masks.get(&mosaic.id) {
            return Ok(Arc::clone(mask));
        }
        let mask = TileMask::for_mosaic(mosaic);
        init(&mask)?;
        let mask = Arc::new(mask);
        masks.insert(mosaic.id.clone(), Arc::clone(&mask));
        Ok(mask)
    }
}

/// Tile persistence. Implementations are shared between reader and writer threads.
pub trait TileStore: Send + Sync {
    /// Whether a tile was never written, written empty, or written with pixels
    fn tile_state(&self, mosaic: &Mosaic, col: u32, row: u32) -> Result<TileState, PyramidError>;

    /// Pixels of a present tile; `None` for missing and empty tiles
    fn tile(
        &self,
        mosaic: &Mosaic,
        col: u32,
        row: u32,
    ) -> Result<Option<TileReference>, PyramidError>;

    /// Store one tile; `None` records an empty tile. Replaces earlier content.
    fn write_tile(
        &self,
        mosaic: &Mosaic,
        col: u32,
        row: u32,
        image: Option<&TileImage>,
    ) -> Result<(), PyramidError>;

    /// Number of written tiles of a mosaic
    fn tile_count(&self, mosaic: &Mosaic) -> Result<usize, PyramidError>;
}

/// Tiles held in process memory
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<TileKey, Option<TileImage>>>,
    masks: MaskTable,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mask(&self, mosaic: &Mosaic) -> Result<Arc<TileMask>, PyramidError> {
        self.masks.mask(mosaic, |_| Ok(()))
    }
}

impl TileStore for MemoryTileStore {
    fn tile_state(&self, mosaic: &Mosaic, col: u32, row: u32) -> Result<TileState, PyramidError> {
        mosaic.check_tile(col, row)?;
        if !self.mask(mosaic)?.contains(col, row) {
            return Ok(TileState::Missing);
        }
        let tiles = self.tiles.read().unwrap_or_else(PoisonError::into_inner);
        Ok(match tiles.get(&TileKey::new(&mosaic.id, col, row)) {
            Some(Some(_)) => TileState::Present,
            Some(None) => TileState::Empty,
            None => TileState::Missing,
        })
    }

    fn tile(
        &self,
        mosaic: &Mosaic,
        col: u32,
        row: u32,
    ) -> Result<Option<TileReference>, PyramidError> {
        mosaic.check_tile(col, row)?;
        if !self.mask(mosaic)?.contains(col, row) {
            return Ok(None);
        }
        let tiles = self.tiles.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tiles
            .get(&TileKey::new(&mosaic.id, col, row))
            .and_then(|t| t.clone())
            .map(TileReference::Image))
    }

    fn write_tile(
        &self,
        mosaic: &Mosaic,
        col: u32,
        row: u32,
        image: Option<&TileImage>,
    ) -> Result<(), PyramidError> {
        mosaic.check_tile(col, row)?;
        let mask = self.mask(mosaic)?;
        {
            let mut tiles = self.tiles.write().unwrap_or_else(PoisonError::into_inner);
            tiles.insert(TileKey::new(&mosaic.id, col, row), image.cloned());
        }
        mask.mark(col, row);
        Ok(())
    }

    fn tile_count(&self, mosaic: &Mosaic) -> Result<usize, PyramidError> {
        Ok(self.mask(mosaic)?.count())
    }
}
