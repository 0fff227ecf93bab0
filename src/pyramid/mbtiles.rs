// SQLite tile store
// MBTiles-style database holding PNG tiles of every mosaic plus the pyramid metadata

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use super::metadata::{from_xml, to_xml, MetadataStore};
use super::model::{Mosaic, PyramidSet};
use super::store::{MaskTable, TileMask, TileStore};
use super::tile::{TileImage, TileReader, TileReference, TileState};
use super::PyramidError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS metadata (name TEXT PRIMARY KEY, value TEXT);
    CREATE TABLE IF NOT EXISTS tiles (mosaic_id TEXT, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
    CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles (mosaic_id, tile_column, tile_row);
";

/// Metadata row holding the pyramid descriptors
const PYRAMIDS_KEY: &str = "pyramids";

type SharedConnection = Arc<Mutex<Connection>>;

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tiles stored as rows keyed by mosaic, column and row.
/// A zero-length blob records an empty tile.
pub struct MbTilesStore {
    conn: SharedConnection,
    masks: MaskTable,
}

impl MbTilesStore {
    /// Open or create a tile database
    pub fn create(path: &Path) -> Result<Self, PyramidError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PyramidError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PyramidError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            masks: MaskTable::default(),
        })
    }

    /// Existence mask of a mosaic, loaded from the tile table on first use
    fn mask(&self, mosaic: &Mosaic) -> Result<Arc<TileMask>, PyramidError> {
        self.masks.mask(mosaic, |mask| {
            let conn = lock(&self.conn);
            let mut stmt =
                conn.prepare("SELECT tile_column, tile_row FROM tiles WHERE mosaic_id = ?1")?;
            let rows = stmt.query_map(params![mosaic.id], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?))
            })?;
            let mut loaded = 0usize;
            for row in rows {
                let (col, row) = row?;
                if mask.mark(col, row) {
                    loaded += 1;
                }
            }
            log::debug!("Loaded {} stored tiles for mosaic {}", loaded, mosaic.id);
            Ok(())
        })
    }

    /// Store a metadata key/value pair
    pub fn set_metadata(&self, name: &str, value: &str) -> Result<(), PyramidError> {
        lock(&self.conn).execute(
            "INSERT OR REPLACE INTO metadata (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        Ok(())
    }

    pub fn metadata(&self, name: &str) -> Result<Option<String>, PyramidError> {
        Ok(lock(&self.conn)
            .query_row(
                "SELECT value FROM metadata WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }
}

fn stored_length(
    conn: &Connection,
    mosaic_id: &str,
    col: u32,
    row: u32,
) -> Result<Option<i64>, PyramidError> {
    Ok(conn
        .query_row(
            "SELECT length(tile_data) FROM tiles WHERE mosaic_id = ?1 AND tile_column = ?2 AND tile_row = ?3",
            params![mosaic_id, col, row],
            |r| r.get::<_, Option<i64>>(0),
        )
        .optional()?
        .map(|len| len.unwrap_or(0)))
}

impl TileStore for MbTilesStore {
    fn tile_state(&self, mosaic: &Mosaic, col: u32, row: u32) -> Result<TileState, PyramidError> {
        mosaic.check_tile(col, row)?;
        if !self.mask(mosaic)?.contains(col, row) {
            return Ok(TileState::Missing);
        }
        let conn = lock(&self.conn);
        Ok(match stored_length(&conn, &mosaic.id, col, row)? {
            Some(0) => TileState::Empty,
            Some(_) => TileState::Present,
            None => TileState::Missing,
        })
    }

    fn tile(
        &self,
        mosaic: &Mosaic,
        col: u32,
        row: u32,
    ) -> Result<Option<TileReference>, PyramidError> {
        if self.tile_state(mosaic, col, row)? != TileState::Present {
            return Ok(None);
        }
        let reader = MbTilesTileReader {
            conn: Arc::clone(&self.conn),
            mosaic_id: mosaic.id.clone(),
            grid_width: mosaic.grid_width,
        };
        Ok(Some(TileReference::Stored {
            reader: Arc::new(reader),
            index: mosaic.tile_index(col, row)?,
        }))
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
        let data = match image {
            Some(image) => image.encode_png()?,
            None => Vec::new(),
        };
        lock(&self.conn).execute(
            "INSERT OR REPLACE INTO tiles (mosaic_id, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
            params![mosaic.id, col, row, data],
        )?;
        mask.mark(col, row);
        Ok(())
    }

    fn tile_count(&self, mosaic: &Mosaic) -> Result<usize, PyramidError> {
        Ok(self.mask(mosaic)?.count())
    }
}

impl MetadataStore for MbTilesStore {
    fn save(&self, set: &PyramidSet) -> Result<(), PyramidError> {
        self.set_metadata(PYRAMIDS_KEY, &to_xml(set)?)
    }

    fn load(&self) -> Result<PyramidSet, PyramidError> {
        match self.metadata(PYRAMIDS_KEY)? {
            Some(xml) => from_xml(&xml),
            None => Ok(PyramidSet::new()),
        }
    }
}

/// Decodes a stored tile when its reference is loaded
struct MbTilesTileReader {
    conn: SharedConnection,
    mosaic_id: String,
    grid_width: u32,
}

impl TileReader for MbTilesTileReader {
    fn read(&self, index: usize) -> Result<TileImage, PyramidError> {
        let width = self.grid_width.max(1) as usize;
        let (col, row) = ((index % width) as u32, (index / width) as u32);
        let data: Option<Vec<u8>> = lock(&self.conn)
            .query_row(
                "SELECT tile_data FROM tiles WHERE mosaic_id = ?1 AND tile_column = ?2 AND tile_row = ?3",
                params![self.mosaic_id, col, row],
                |r| r.get(0),
            )
            .optional()?;
        match data {
            Some(bytes) if !bytes.is_empty() => TileImage::decode_png(&bytes),
            _ => Err(PyramidError::InvalidTile(format!(
                "tile ({}, {}) of mosaic {} has no pixel data",
                col, row, self.mosaic_id
            ))),
        }
    }
}
