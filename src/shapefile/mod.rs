// Shapefile Geometry Codec
// Reads and writes the .shp/.shx binary pair: mixed-endian header, length-prefixed
// records, one handler per shape family, optional decimation while decoding.

mod coords;
mod cursor;
mod decimate;
mod handler;
mod header;
mod index;
mod line;
mod multipoint;
mod point;
mod polygon;
mod reader;
mod record;
mod writer;

pub use coords::{CoordinateAccess, InterleavedCoords, PlanarCoords};
pub use cursor::{ByteCursor, Endian, RecordBuffer};
pub use decimate::Decimation;
pub use handler::ShapeHandler;
pub use header::{ShapefileHeader, FILE_CODE, HEADER_LENGTH, VERSION};
pub use index::{read_index, IndexRecord, INDEX_RECORD_LENGTH};
pub use polygon::{assign_holes_to_shells, is_ccw, point_in_ring};
pub use reader::{ReaderOptions, RecordIter, ShapeEntry, ShapefileReader};
pub use record::{PolygonShape, ShapeRecord};
pub use writer::ShapefileWriter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value written for "no data" M ordinates; readers treat anything below -1e38 as absent
pub const NO_DATA: f64 = -1e40;

/// Shapefile codec errors
#[derive(Error, Debug)]
pub enum ShapefileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Unsupported shape type: {0}")]
    UnsupportedShapeType(String),

    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("Record {record} wrote {written} bytes but declared {declared}")]
    RecordLengthMismatch {
        record: i32,
        declared: usize,
        written: usize,
    },
}

/// Shape type ids as defined by the shapefile format.
/// `id % 10` is the family, `id / 10` is 1 for Z variants and 2 for M variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    Null = 0,
    Point = 1,
    Arc = 3,
    Polygon = 5,
    MultiPoint = 8,
    PointZ = 11,
    ArcZ = 13,
    PolygonZ = 15,
    MultiPointZ = 18,
    PointM = 21,
    ArcM = 23,
    PolygonM = 25,
    MultiPointM = 28,
}

/// Geometry family shared by the 2D, Z and M variants of a shape type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeFamily {
    Null,
    Point,
    Line,
    Polygon,
    MultiPoint,
}

impl ShapeType {
    pub fn from_id(id: i32) -> Result<Self, ShapefileError> {
        match id {
            0 => Ok(Self::Null),
            1 => Ok(Self::Point),
            3 => Ok(Self::Arc),
            5 => Ok(Self::Polygon),
            8 => Ok(Self::MultiPoint),
            11 => Ok(Self::PointZ),
            13 => Ok(Self::ArcZ),
            15 => Ok(Self::PolygonZ),
            18 => Ok(Self::MultiPointZ),
            21 => Ok(Self::PointM),
            23 => Ok(Self::ArcM),
            25 => Ok(Self::PolygonM),
            28 => Ok(Self::MultiPointM),
            _ => Err(ShapefileError::UnsupportedShapeType(format!(
                "unknown shape type id {}",
                id
            ))),
        }
    }

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn family(self) -> ShapeFamily {
        match self.id() % 10 {
            1 => ShapeFamily::Point,
            3 => ShapeFamily::Line,
            5 => ShapeFamily::Polygon,
            8 => ShapeFamily::MultiPoint,
            _ => ShapeFamily::Null,
        }
    }

    pub fn is_null(self) -> bool {
        self == Self::Null
    }

    /// Z variants store a Z block (and an M block after it)
    pub fn has_z(self) -> bool {
        self.id() / 10 == 1
    }

    /// M variants store an M block but no Z
    pub fn has_m(self) -> bool {
        self.id() / 10 == 2
    }

    /// Whether records of this type end with an M block
    pub fn has_m_block(self) -> bool {
        self.has_z() || self.has_m()
    }

    /// Pick the shape type for a family and a coordinate dimension count
    /// (2 = XY, 3 = XYZ, 4 = measured)
    pub fn for_dimensions(family: ShapeFamily, dimensions: usize) -> Result<Self, ShapefileError> {
        let base = match family {
            ShapeFamily::Null => return Ok(Self::Null),
            ShapeFamily::Point => 1,
            ShapeFamily::Line => 3,
            ShapeFamily::Polygon => 5,
            ShapeFamily::MultiPoint => 8,
        };
        let variant = match dimensions {
            2 => 0,
            3 => 10,
            4 => 20,
            _ => {
                return Err(ShapefileError::UnsupportedShapeType(format!(
                    "too many dimensions for a shapefile: {}",
                    dimensions
                )))
            }
        };
        Self::from_id(base + variant)
    }
}

impl std::fmt::Display for ShapeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.id())
    }
}
