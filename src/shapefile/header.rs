// Shapefile header
// The 100-byte header shared by .shp and .shx; big-endian up to the file length,
// little-endian from the version onwards

use log::warn;
use serde::{Deserialize, Serialize};

use super::cursor::{ByteCursor, Endian, RecordBuffer};
use super::{ShapeType, ShapefileError};
use crate::envelope::Envelope;

pub const HEADER_LENGTH: usize = 100;
pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapefileHeader {
    pub file_code: i32,
    /// Total file length in bytes, header included
    pub file_length: usize,
    pub version: i32,
    pub shape_type: ShapeType,
    pub bbox: Envelope,
}

impl ShapefileHeader {
    pub fn new(shape_type: ShapeType, bbox: Envelope, file_length: usize) -> Self {
        Self {
            file_code: FILE_CODE,
            file_length,
            version: VERSION,
            shape_type,
            bbox,
        }
    }

    /// Parse a header. A wrong file code or version fails in strict mode and is
    /// logged otherwise.
    pub fn read(data: &[u8], strict: bool) -> Result<Self, ShapefileError> {
        if data.len() < HEADER_LENGTH {
            return Err(ShapefileError::HeaderMismatch(format!(
                "header needs {} bytes, found {}",
                HEADER_LENGTH,
                data.len()
            )));
        }
        let mut cursor = ByteCursor::new(&data[..HEADER_LENGTH]);

        let file_code = cursor.read_i32()?;
        if file_code != FILE_CODE {
            mismatch(strict, format!("file code {} (expected {})", file_code, FILE_CODE))?;
        }
        cursor.skip(20)?;
        let length_words = cursor.read_i32()?;

        cursor.set_endian(Endian::Little);
        let version = cursor.read_i32()?;
        if version != VERSION {
            mismatch(strict, format!("version {} (expected {})", version, VERSION))?;
        }
        let shape_type = ShapeType::from_id(cursor.read_i32()?)?;
        let min_x = cursor.read_f64()?;
        let min_y = cursor.read_f64()?;
        let max_x = cursor.read_f64()?;
        let max_y = cursor.read_f64()?;

        cursor.set_endian(Endian::Big);
        cursor.skip(32)?;

        Ok(Self {
            file_code,
            file_length: length_words.max(0) as usize * 2,
            version,
            shape_type,
            bbox: Envelope::new(min_x, min_y, max_x, max_y),
        })
    }

    pub fn write(&self, buffer: &mut RecordBuffer) {
        buffer.set_endian(Endian::Big);
        buffer.write_i32(self.file_code);
        buffer.write_zeros(20);
        buffer.write_i32((self.file_length / 2) as i32);

        buffer.set_endian(Endian::Little);
        buffer.write_i32(self.version);
        buffer.write_i32(self.shape_type.id());
        for v in self.bbox.to_array() {
            buffer.write_f64(v);
        }

        buffer.set_endian(Endian::Big);
        buffer.write_zeros(32);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = RecordBuffer::with_capacity(HEADER_LENGTH);
        self.write(&mut buffer);
        buffer.into_bytes()
    }
}

fn mismatch(strict: bool, message: String) -> Result<(), ShapefileError> {
    if strict {
        return Err(ShapefileError::HeaderMismatch(message));
    }
    warn!("Shapefile header mismatch, continuing: {}", message);
    Ok(())
}
