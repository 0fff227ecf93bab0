// Shapefile index (.shx)
// Header followed by one 8-byte big-endian (offset, length) entry per record, both in 16-bit words

use super::cursor::{ByteCursor, Endian, RecordBuffer};
use super::header::{ShapefileHeader, HEADER_LENGTH};
use super::ShapefileError;

pub const INDEX_RECORD_LENGTH: usize = 8;

/// Location of one record in the .shp file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Offset of the record header, in 16-bit words
    pub offset_words: i32,
    /// Content length (record header excluded), in 16-bit words
    pub length_words: i32,
}

impl IndexRecord {
    pub fn new(offset_words: i32, length_words: i32) -> Self {
        Self {
            offset_words,
            length_words,
        }
    }

    pub fn offset_bytes(&self) -> usize {
        self.offset_words.max(0) as usize * 2
    }

    pub fn length_bytes(&self) -> usize {
        self.length_words.max(0) as usize * 2
    }

    pub fn write(&self, buffer: &mut RecordBuffer) {
        buffer.set_endian(Endian::Big);
        buffer.write_i32(self.offset_words);
        buffer.write_i32(self.length_words);
    }
}

/// Parse a whole .shx file
pub fn read_index(data: &[u8], strict: bool) -> Result<(ShapefileHeader, Vec<IndexRecord>), ShapefileError> {
    let header = ShapefileHeader::read(data, strict)?;
    let body = &data[HEADER_LENGTH..];
    if body.len() % INDEX_RECORD_LENGTH != 0 {
        log::warn!(
            "Index has {} trailing bytes after its last entry",
            body.len() % INDEX_RECORD_LENGTH
        );
    }
    let count = body.len() / INDEX_RECORD_LENGTH;
    let mut cursor = ByteCursor::new(body);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let offset_words = cursor.read_i32()?;
        let length_words = cursor.read_i32()?;
        records.push(IndexRecord::new(offset_words, length_words));
    }
    Ok((header, records))
}
