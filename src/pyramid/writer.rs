// Parallel mosaic writer
// Submits one write job per tile to a worker pool, polling for cancellation
// between tiles. A failed tile is logged and counted; its siblings keep going.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::model::Mosaic;
use super::store::TileStore;
use super::tile::TileImage;
use super::workers::{CancelFlag, Latch, WorkerPool};
use super::PyramidError;

/// Outcome of one batch of tile writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Tiles handed to the pool
    pub submitted: usize,
    /// Tiles whose write failed
    pub failed: usize,
    /// Tiles skipped because the batch was cancelled
    pub skipped: usize,
    pub cancelled: bool,
}

impl WriteSummary {
    pub fn written(&self) -> usize {
        self.submitted - self.failed - self.skipped
    }
}

pub struct MosaicWriter {
    store: Arc<dyn TileStore>,
    pool: Arc<WorkerPool>,
    cancel: CancelFlag,
}

impl MosaicWriter {
    pub fn new(store: Arc<dyn TileStore>, pool: Arc<WorkerPool>) -> Self {
        Self {
            store,
            pool,
            cancel: CancelFlag::new(),
        }
    }

    /// Flag that stops the current and later batches when set
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Write tiles by grid position; `None` stores an empty tile.
    /// Returns once every submitted tile has been written or skipped.
    pub fn write_tiles<I>(&self, mosaic: &Mosaic, tiles: I) -> WriteSummary
    where
        I: IntoIterator<Item = (u32, u32, Option<TileImage>)>,
    {
        let mosaic = Arc::new(mosaic.clone());
        let failed = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));
        let batch = Arc::new(Latch::default());
        let mut summary = WriteSummary::default();

        for (col, row, image) in tiles {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.submitted += 1;
            batch.add();

            let store = Arc::clone(&self.store);
            let mosaic = Arc::clone(&mosaic);
            let cancel = self.cancel.clone();
            let failed = Arc::clone(&failed);
            let skipped = Arc::clone(&skipped);
            let done = Arc::clone(&batch);
            self.pool.execute(move || {
                // tiles are written whole or not at all
                if cancel.is_cancelled() {
                    skipped.fetch_add(1, Ordering::SeqCst);
                } else if let Err(e) = store.write_tile(&mosaic, col, row, image.as_ref()) {
                    log::warn!(
                        "Failed to write tile ({}, {}) of mosaic {}: {}",
                        col,
                        row,
                        mosaic.id,
                        e
                    );
                    failed.fetch_add(1, Ordering::SeqCst);
                }
                done.done();
            });
        }

        batch.wait();
        summary.failed = failed.load(Ordering::SeqCst);
        summary.skipped = skipped.load(Ordering::SeqCst);
        summary.cancelled |= self.cancel.is_cancelled();
        if summary.cancelled {
            log::info!(
                "Tile batch for mosaic {} cancelled after {} of its tiles",
                mosaic.id,
                summary.written()
            );
        }
        log::debug!(
            "Tile batch for mosaic {}: {} submitted, {} failed",
            mosaic.id,
            summary.submitted,
            summary.failed
        );
        summary
    }

    /// Slice `image`, placed at mosaic pixel (`pixel_x`, `pixel_y`), into the
    /// tiles it touches. Parts of a tile outside the image are zero; a tile
    /// left entirely zero is stored as empty.
    pub fn write_image(
        &self,
        mosaic: &Mosaic,
        image: &TileImage,
        pixel_x: u64,
        pixel_y: u64,
    ) -> Result<WriteSummary, PyramidError> {
        let tw = mosaic.tile_width as u64;
        let th = mosaic.tile_height as u64;
        if tw == 0 || th == 0 {
            return Err(PyramidError::InvalidTile(format!(
                "mosaic {} has zero-sized tiles",
                mosaic.id
            )));
        }
        let right = (pixel_x + image.width() as u64).min(mosaic.pixel_width());
        let bottom = (pixel_y + image.height() as u64).min(mosaic.pixel_height());
        if pixel_x >= right || pixel_y >= bottom {
            return Ok(WriteSummary::default());
        }

        let cols = (pixel_x / tw) as u32..=((right - 1) / tw) as u32;
        let rows = (pixel_y / th) as u32..=((bottom - 1) / th) as u32;
        let bands = image.bands();
        let mut failed = 0usize;

        let tiles = rows
            .flat_map(move |row| cols.clone().map(move |col| (col, row)))
            .filter_map(|(col, row)| {
                let (tile_x, tile_y) = (col as u64 * tw, row as u64 * th);
                let x0 = pixel_x.max(tile_x);
                let y0 = pixel_y.max(tile_y);
                let x1 = right.min(tile_x + tw);
                let y1 = bottom.min(tile_y + th);

                let mut tile = TileImage::new(mosaic.tile_width, mosaic.tile_height, bands);
                match tile.blit(
                    image,
                    (x0 - pixel_x) as u32,
                    (y0 - pixel_y) as u32,
                    (x1 - x0) as u32,
                    (y1 - y0) as u32,
                    (x0 - tile_x) as u32,
                    (y0 - tile_y) as u32,
                ) {
                    Ok(_) => Some((col, row, (!tile.is_blank()).then_some(tile))),
                    Err(e) => {
                        log::warn!("Failed to slice tile ({}, {}): {}", col, row, e);
                        failed += 1;
                        None
                    }
                }
            });

        let mut summary = self.write_tiles(mosaic, tiles);
        summary.submitted += failed;
        summary.failed += failed;
        Ok(summary)
    }

    /// Wait for every job on the shared pool, including other writers' jobs
    pub fn flush(&self) {
        self.pool.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::store::MemoryTileStore;
    use crate::pyramid::tile::TileState;
    use crate::pyramid::workers::WorkerPoolConfig;

    fn pool() -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(&WorkerPoolConfig {
            workers: 4,
            queue_capacity: 4,
        }))
    }

    #[test]
    fn test_write_tiles() {
        let store = Arc::new(MemoryTileStore::new());
        let writer = MosaicWriter::new(store.clone(), pool());
        let mosaic = Mosaic::new("p", vec![0.0, 0.0], (8, 8), (2, 2), 1.0);

        let tiles = (0..8u32).flat_map(|row| {
            (0..8u32).map(move |col| (col, row, Some(TileImage::filled(2, 2, 1, 1))))
        });
        let summary = writer.write_tiles(&mosaic, tiles);
        assert_eq!(summary.submitted, 64);
        assert_eq!(summary.written(), 64);
        assert_eq!(store.tile_count(&mosaic).unwrap(), 64);
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let store = Arc::new(MemoryTileStore::new());
        let writer = MosaicWriter::new(store.clone(), pool());
        let mosaic = Mosaic::new("p", vec![0.0, 0.0], (2, 2), (2, 2), 1.0);

        let tiles = vec![(0, 0, None), (5, 5, None), (1, 1, None)];
        let summary = writer.write_tiles(&mosaic, tiles);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.written(), 2);
        assert_eq!(store.tile_state(&mosaic, 1, 1).unwrap(), TileState::Empty);
    }

    #[test]
    fn test_cancelled_batch() {
        let store = Arc::new(MemoryTileStore::new());
        let writer = MosaicWriter::new(store.clone(), pool());
        let mosaic = Mosaic::new("p", vec![0.0, 0.0], (4, 4), (2, 2), 1.0);
        writer.cancel_flag().cancel();

        let summary = writer.write_tiles(&mosaic, vec![(0, 0, None), (1, 0, None)]);
        assert!(summary.cancelled);
        assert_eq!(summary.submitted, 0);
        assert_eq!(store.tile_count(&mosaic).unwrap(), 0);
    }

    #[test]
    fn test_write_image_slices_tiles() {
        let store = Arc::new(MemoryTileStore::new());
        let writer = MosaicWriter::new(store.clone(), pool());
        let mosaic = Mosaic::new("p", vec![0.0, 0.0], (3, 3), (4, 4), 1.0);

        // 6x6 image at pixel (2, 2) touches tiles (0..=1, 0..=1)
        let mut image = TileImage::new(6, 6, 1);
        for y in 0..6 {
            for x in 0..6 {
                image.set_pixel(x, y, &[(1 + x + 10 * y) as u8]);
            }
        }
        let summary = writer.write_image(&mosaic, &image, 2, 2).unwrap();
        assert_eq!(summary.submitted, 4);
        assert_eq!(store.tile_count(&mosaic).unwrap(), 4);
        assert_eq!(store.tile_state(&mosaic, 2, 2).unwrap(), TileState::Missing);

        let tile = store.tile(&mosaic, 1, 1).unwrap().unwrap().load().unwrap();
        // image pixel (2, 2) lands at tile (1, 1) pixel (0, 0)
        assert_eq!(tile.pixel(0, 0), Some(&[23u8][..]));
        let corner = store.tile(&mosaic, 0, 0).unwrap().unwrap().load().unwrap();
        assert_eq!(corner.pixel(1, 1), Some(&[0u8][..]));
        assert_eq!(corner.pixel(2, 2), Some(&[1u8][..]));
    }

    #[test]
    fn test_blank_tiles_are_empty() {
        let store = Arc::new(MemoryTileStore::new());
        let writer = MosaicWriter::new(store.clone(), pool());
        let mosaic = Mosaic::new("p", vec![0.0, 0.0], (1, 1), (4, 4), 1.0);
        writer
            .write_image(&mosaic, &TileImage::new(4, 4, 3), 0, 0)
            .unwrap();
        writer.flush();
        assert_eq!(store.tile_state(&mosaic, 0, 0).unwrap(), TileState::Empty);
    }
}
