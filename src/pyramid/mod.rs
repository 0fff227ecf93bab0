// Tiled Raster Pyramids
// Pyramid and mosaic model, tile addressing, best-fit pyramid/mosaic resolution,
// tile storage, tiled image views and parallel tile writing

mod addressing;
mod crs;
mod mbtiles;
mod metadata;
mod model;
mod resolver;
mod store;
mod tile;
mod view;
mod workers;
mod writer;

pub use addressing::{candidate_mosaics, AffineTransform2D, TileRange};
pub use crs::{CrsDefinition, CrsRegistry, CrsService, MathTransform};
pub use mbtiles::MbTilesStore;
pub use metadata::{from_xml, to_xml, MetadataStore, XmlMetadataStore};
pub use model::{Mosaic, Pyramid, PyramidSet};
pub use resolver::{find_mosaic, find_pyramid, PyramidResolver};
pub use store::{MemoryTileStore, TileMask, TileStore};
pub use tile::{ColorKind, PixelLayout, TileImage, TileKey, TileReader, TileReference, TileState};
pub use view::{probe_layout, MissingTilePolicy, PixelRect, TiledImageView, ViewConfig};
pub use workers::{CancelFlag, WorkerPool, WorkerPoolConfig};
pub use writer::{MosaicWriter, WriteSummary};

use thiserror::Error;

/// Pyramid engine errors
#[derive(Error, Debug)]
pub enum PyramidError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Metadata XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("PNG error: {0}")]
    Png(String),

    #[error("No pyramid found: {0}")]
    PyramidNotFound(String),

    #[error("No mosaic found: {0}")]
    MosaicNotFound(String),

    #[error("Tile ({col}, {row}) is outside the mosaic grid")]
    TileOutOfRange { col: u32, row: u32 },

    #[error("Mosaic has no tiles: {0}")]
    EmptyMosaic(String),

    #[error("CRS error: {0}")]
    Crs(String),

    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    #[error("Operation cancelled")]
    Cancelled,
}
