// Tiled image view
// Random-access view of one mosaic as a grid of tiles, with a bounded tile cache
// and region copies that stitch tiles together

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::model::{Mosaic, Pyramid};
use super::store::TileStore;
use super::tile::{PixelLayout, TileImage, TileState};
use super::workers::CancelFlag;
use super::PyramidError;

/// What `get_tile` returns for a tile that was never written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingTilePolicy {
    /// A tile filled with the nodata value
    Nodata,
    /// No tile
    Absent,
}

/// Tile view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Decoded tiles kept in memory
    pub cache_tiles: usize,
    pub missing_tiles: MissingTilePolicy,
    /// Sample value for pixels without data
    pub nodata: u8,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            cache_tiles: 64,
            missing_tiles: MissingTilePolicy::Nodata,
            nodata: 0,
        }
    }
}

/// Pixel rectangle in mosaic pixel coordinates (origin at the upper-left corner)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u64,
    pub y: u64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u64, y: u64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn right(&self) -> u64 {
        self.x + self.width as u64
    }

    fn bottom(&self) -> u64 {
        self.y + self.height as u64
    }
}

/// First tile with pixel data, scanning rows top to bottom, and its layout
pub fn probe_layout(
    store: &dyn TileStore,
    mosaic: &Mosaic,
) -> Result<(u32, u32, PixelLayout), PyramidError> {
    for row in 0..mosaic.grid_height {
        for col in 0..mosaic.grid_width {
            if let Some(tile) = store.tile(mosaic, col, row)? {
                let image = tile.load()?;
                let layout = PixelLayout::of_image(&image)?;
                log::debug!(
                    "Probed mosaic {} at tile ({}, {}): {:?}",
                    mosaic.id,
                    col,
                    row,
                    layout.color
                );
                return Ok((col, row, layout));
            }
        }
    }
    Err(PyramidError::EmptyMosaic(mosaic.id.clone()))
}

pub struct TiledImageView {
    store: Arc<dyn TileStore>,
    mosaic: Mosaic,
    bands: u8,
    config: ViewConfig,
    cache: Mutex<LruCache<(u32, u32), Arc<TileImage>>>,
}

impl TiledImageView {
    pub fn new(store: Arc<dyn TileStore>, mosaic: Mosaic, bands: u8, config: ViewConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_tiles.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            mosaic,
            bands,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// View of one mosaic of a pyramid, with the pyramid's declared band count
    pub fn for_pyramid(
        store: Arc<dyn TileStore>,
        pyramid: &Pyramid,
        mosaic_id: &str,
        config: ViewConfig,
    ) -> Result<Self, PyramidError> {
        let mosaic = pyramid
            .mosaic(mosaic_id)
            .ok_or_else(|| PyramidError::MosaicNotFound(mosaic_id.to_string()))?;
        Ok(Self::new(store, mosaic.clone(), pyramid.bands, config))
    }

    /// View whose band count is taken from the first stored tile
    pub fn probed(
        store: Arc<dyn TileStore>,
        mosaic: Mosaic,
        config: ViewConfig,
    ) -> Result<Self, PyramidError> {
        let (_, _, layout) = probe_layout(store.as_ref(), &mosaic)?;
        Ok(Self::new(store, mosaic, layout.bands, config))
    }

    pub fn mosaic(&self) -> &Mosaic {
        &self.mosaic
    }

    pub fn bands(&self) -> u8 {
        self.bands
    }

    pub fn num_x_tiles(&self) -> u32 {
        self.mosaic.grid_width
    }

    pub fn num_y_tiles(&self) -> u32 {
        self.mosaic.grid_height
    }

    pub fn tile_width(&self) -> u32 {
        self.mosaic.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.mosaic.tile_height
    }

    pub fn width(&self) -> u64 {
        self.mosaic.pixel_width()
    }

    pub fn height(&self) -> u64 {
        self.mosaic.pixel_height()
    }

    pub fn tile_state(&self, col: u32, row: u32) -> Result<TileState, PyramidError> {
        self.store.tile_state(&self.mosaic, col, row)
    }

    fn nodata_tile(&self) -> TileImage {
        TileImage::filled(
            self.mosaic.tile_width,
            self.mosaic.tile_height,
            self.bands,
            self.config.nodata,
        )
    }

    /// Pixels of one tile. Empty tiles come back filled with nodata; missing
    /// tiles follow the view's `MissingTilePolicy`.
    pub fn get_tile(&self, col: u32, row: u32) -> Result<Option<Arc<TileImage>>, PyramidError> {
        self.mosaic.check_tile(col, row)?;
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tile) = cache.get(&(col, row)) {
                return Ok(Some(Arc::clone(tile)));
            }
        }

        if let Some(reference) = self.store.tile(&self.mosaic, col, row)? {
            let image = reference.load()?;
            if image.bands() != self.bands
                || image.width() != self.mosaic.tile_width
                || image.height() != self.mosaic.tile_height
            {
                return Err(PyramidError::InvalidTile(format!(
                    "tile ({}, {}) is {}x{}x{}, mosaic expects {}x{}x{}",
                    col,
                    row,
                    image.width(),
                    image.height(),
                    image.bands(),
                    self.mosaic.tile_width,
                    self.mosaic.tile_height,
                    self.bands
                )));
            }
            let image = Arc::new(image);
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put((col, row), Arc::clone(&image));
            return Ok(Some(image));
        }

        match self.store.tile_state(&self.mosaic, col, row)? {
            TileState::Missing if self.config.missing_tiles == MissingTilePolicy::Absent => Ok(None),
            _ => Ok(Some(Arc::new(self.nodata_tile()))),
        }
    }

    /// Drop cached tiles, e.g. after the store was written to
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Pixels of `rect`. Areas outside the mosaic or without tiles hold nodata.
    pub fn copy_region(&self, rect: PixelRect) -> Result<TileImage, PyramidError> {
        self.copy_region_inner(rect, None)
    }

    /// `copy_region`, checking `cancel` before each tile
    pub fn copy_region_cancellable(
        &self,
        rect: PixelRect,
        cancel: &CancelFlag,
    ) -> Result<TileImage, PyramidError> {
        self.copy_region_inner(rect, Some(cancel))
    }

    fn copy_region_inner(
        &self,
        rect: PixelRect,
        cancel: Option<&CancelFlag>,
    ) -> Result<TileImage, PyramidError> {
        let mut out = TileImage::filled(rect.width, rect.height, self.bands, self.config.nodata);

        let right = rect.right().min(self.width());
        let bottom = rect.bottom().min(self.height());
        if rect.x >= right || rect.y >= bottom {
            return Ok(out);
        }

        let tw = self.mosaic.tile_width as u64;
        let th = self.mosaic.tile_height as u64;
        let (col_min, col_max) = ((rect.x / tw) as u32, ((right - 1) / tw) as u32);
        let (row_min, row_max) = ((rect.y / th) as u32, ((bottom - 1) / th) as u32);

        for row in row_min..=row_max {
            for col in col_min..=col_max {
                if cancel.map_or(false, |c| c.is_cancelled()) {
                    log::info!("Region copy from mosaic {} cancelled", self.mosaic.id);
                    return Err(PyramidError::Cancelled);
                }
                let tile = match self.get_tile(col, row)? {
                    Some(tile) => tile,
                    None => continue,
                };

                let (tile_x, tile_y) = (col as u64 * tw, row as u64 * th);
                let x0 = rect.x.max(tile_x);
                let y0 = rect.y.max(tile_y);
                let x1 = right.min(tile_x + tw);
                let y1 = bottom.min(tile_y + th);

                out.blit(
                    &tile,
                    (x0 - tile_x) as u32,
                    (y0 - tile_y) as u32,
                    (x1 - x0) as u32,
                    (y1 - y0) as u32,
                    (x0 - rect.x) as u32,
                    (y0 - rect.y) as u32,
                )?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::store::MemoryTileStore;

    /// 3x2 grid of 4x4 single-band tiles; tile (c, r) holds value 10*r + c + 1,
    /// except (2, 1) which is missing and (1, 1) which is empty
    fn fixture() -> (Arc<MemoryTileStore>, Mosaic) {
        let store = Arc::new(MemoryTileStore::new());
        let mosaic = Mosaic::new("p", vec![0.0, 8.0], (3, 2), (4, 4), 1.0);
        for row in 0..2 {
            for col in 0..3 {
                match (col, row) {
                    (2, 1) => {}
                    (1, 1) => store.write_tile(&mosaic, col, row, None).unwrap(),
                    _ => {
                        let value = (10 * row + col + 1) as u8;
                        let tile = TileImage::filled(4, 4, 1, value);
                        store.write_tile(&mosaic, col, row, Some(&tile)).unwrap();
                    }
                }
            }
        }
        (store, mosaic)
    }

    fn config(policy: MissingTilePolicy) -> ViewConfig {
        ViewConfig {
            cache_tiles: 2,
            missing_tiles: policy,
            nodata: 255,
        }
    }

    #[test]
    fn test_get_tile_states() {
        let (store, mosaic) = fixture();
        let view = TiledImageView::new(store, mosaic, 1, config(MissingTilePolicy::Absent));
        assert_eq!(view.get_tile(1, 0).unwrap().unwrap().data()[0], 2);
        assert_eq!(view.get_tile(1, 1).unwrap().unwrap().data()[0], 255);
        assert!(view.get_tile(2, 1).unwrap().is_none());
        assert!(matches!(
            view.get_tile(3, 0),
            Err(PyramidError::TileOutOfRange { .. })
        ));
        assert_eq!(view.tile_state(2, 1).unwrap(), TileState::Missing);
    }

    #[test]
    fn test_missing_tile_nodata() {
        let (store, mosaic) = fixture();
        let view = TiledImageView::new(store, mosaic, 1, config(MissingTilePolicy::Nodata));
        let tile = view.get_tile(2, 1).unwrap().unwrap();
        assert!(tile.data().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_copy_region_clips_partial_tiles() {
        let (store, mosaic) = fixture();
        let view = TiledImageView::new(store, mosaic, 1, config(MissingTilePolicy::Absent));

        // spans all six tiles and runs one pixel past the right edge
        let region = view.copy_region(PixelRect::new(3, 3, 10, 2)).unwrap();
        assert_eq!((region.width(), region.height()), (10, 2));
        let row0: Vec<u8> = (0..10).map(|x| region.pixel(x, 0).unwrap()[0]).collect();
        let row1: Vec<u8> = (0..10).map(|x| region.pixel(x, 1).unwrap()[0]).collect();
        assert_eq!(row0, vec![1, 2, 2, 2, 2, 3, 3, 3, 3, 255]);
        assert_eq!(row1, vec![11, 255, 255, 255, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_copy_region_outside() {
        let (store, mosaic) = fixture();
        let view = TiledImageView::new(store, mosaic, 1, config(MissingTilePolicy::Absent));
        let region = view.copy_region(PixelRect::new(100, 100, 2, 2)).unwrap();
        assert!(region.data().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_copy_region_cancelled() {
        let (store, mosaic) = fixture();
        let view = TiledImageView::new(store, mosaic, 1, ViewConfig::default());
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            view.copy_region_cancellable(PixelRect::new(0, 0, 12, 8), &cancel),
            Err(PyramidError::Cancelled)
        ));
    }

    #[test]
    fn test_probe_layout() {
        let store = MemoryTileStore::new();
        let mosaic = Mosaic::new("p", vec![0.0, 0.0], (2, 2), (2, 2), 1.0);
        assert!(matches!(
            probe_layout(&store, &mosaic),
            Err(PyramidError::EmptyMosaic(_))
        ));

        store.write_tile(&mosaic, 0, 0, None).unwrap();
        store
            .write_tile(&mosaic, 1, 1, Some(&TileImage::new(2, 2, 3)))
            .unwrap();
        let (col, row, layout) = probe_layout(&store, &mosaic).unwrap();
        assert_eq!((col, row), (1, 1));
        assert_eq!(layout.bands, 3);

        let view = TiledImageView::probed(Arc::new(store), mosaic, ViewConfig::default()).unwrap();
        assert_eq!(view.bands(), 3);
    }
}
