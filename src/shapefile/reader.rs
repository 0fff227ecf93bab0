// Shapefile reader
// Opens a .shp (and its .shx when present) and decodes records one at a time

use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::cursor::ByteCursor;
use super::decimate::Decimation;
use super::handler::ShapeHandler;
use super::header::{ShapefileHeader, HEADER_LENGTH};
use super::index::{read_index, IndexRecord};
use super::record::ShapeRecord;
use super::ShapefileError;

const RECORD_HEADER_LENGTH: usize = 8;

/// Options for opening a shapefile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Fail on a wrong file code or version instead of logging it
    pub strict: bool,
    /// Keep Z ordinates of Z shape types
    pub read_3d: bool,
    /// Thin out points while decoding
    pub decimation: Option<Decimation>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            read_3d: true,
            decimation: None,
        }
    }
}

/// A decoded record and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeEntry {
    pub record_number: i32,
    /// Byte offset of the record header in the .shp file
    pub offset: usize,
    pub record: ShapeRecord,
}

pub struct ShapefileReader {
    data: Vec<u8>,
    header: ShapefileHeader,
    index: Option<Vec<IndexRecord>>,
    handler: ShapeHandler,
}

impl ShapefileReader {
    /// Open `path` and, if it exists, the sibling `.shx`
    pub fn open(path: &Path, options: ReaderOptions) -> Result<Self, ShapefileError> {
        let data = std::fs::read(path)?;
        let shx_path = path.with_extension("shx");
        let shx = if shx_path.exists() {
            Some(std::fs::read(&shx_path)?)
        } else {
            debug!("No index file at {:?}", shx_path);
            None
        };
        let reader = Self::from_bytes(data, shx, options)?;
        info!(
            "Opened shapefile {:?}: {}, {} bytes",
            path,
            reader.header.shape_type,
            reader.header.file_length
        );
        Ok(reader)
    }

    pub fn from_bytes(
        data: Vec<u8>,
        shx: Option<Vec<u8>>,
        options: ReaderOptions,
    ) -> Result<Self, ShapefileError> {
        let header = ShapefileHeader::read(&data, options.strict)?;
        if header.file_length != data.len() {
            warn!(
                "Shapefile header declares {} bytes but the file has {}",
                header.file_length,
                data.len()
            );
        }
        let index = match shx {
            Some(bytes) => Some(read_index(&bytes, options.strict)?.1),
            None => None,
        };
        let handler = ShapeHandler::new(header.shape_type)
            .with_read_3d(options.read_3d)
            .with_decimation(options.decimation);
        Ok(Self {
            data,
            header,
            index,
            handler,
        })
    }

    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    pub fn handler(&self) -> &ShapeHandler {
        &self.handler
    }

    /// Number of records according to the index, if one was loaded
    pub fn record_count(&self) -> Option<usize> {
        self.index.as_ref().map(|i| i.len())
    }

    /// Iterate over all records in file order. A record that fails to decode is
    /// reported and iteration moves on to the next one; a truncated file ends
    /// the iteration.
    pub fn records(&self) -> RecordIter<'_> {
        RecordIter {
            reader: self,
            offset: HEADER_LENGTH,
            done: false,
        }
    }

    /// Record `n` (0-based), located through the index
    pub fn record(&self, n: usize) -> Result<ShapeRecord, ShapefileError> {
        let index = self.index.as_ref().ok_or_else(|| {
            ShapefileError::CorruptRecord("random access needs the .shx index".to_string())
        })?;
        let entry = index.get(n).ok_or_else(|| {
            ShapefileError::CorruptRecord(format!("record {} beyond index of {}", n, index.len()))
        })?;
        let (record, _) = self.read_at(entry.offset_bytes())?;
        record
    }

    /// Decode the record whose header starts at `offset`. The outer error means
    /// the file is truncated; the inner result is the record itself. Also
    /// returns the offset of the next record.
    #[allow(clippy::type_complexity)]
    fn read_at(
        &self,
        offset: usize,
    ) -> Result<(Result<ShapeRecord, ShapefileError>, usize), ShapefileError> {
        let end = self.data.len();
        if offset + RECORD_HEADER_LENGTH > end {
            return Err(ShapefileError::CorruptRecord(format!(
                "record header at {} overruns file of {} bytes",
                offset, end
            )));
        }
        let mut cursor = ByteCursor::new(&self.data[offset..offset + RECORD_HEADER_LENGTH]);
        let _record_number = cursor.read_i32()?;
        let length_words = cursor.read_i32()?;
        if length_words < 0 {
            return Err(ShapefileError::CorruptRecord(format!(
                "negative record length at {}",
                offset
            )));
        }
        let start = offset + RECORD_HEADER_LENGTH;
        let content_end = start + length_words as usize * 2;
        if content_end > end {
            return Err(ShapefileError::CorruptRecord(format!(
                "record at {} needs {} bytes, file ends at {}",
                offset, content_end, end
            )));
        }
        let record = self.handler.decode_bytes(&self.data[start..content_end]);
        Ok((record, content_end))
    }
}

/// Iterator over the records of a shapefile
pub struct RecordIter<'a> {
    reader: &'a ShapefileReader,
    offset: usize,
    done: bool,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<ShapeEntry, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.reader.data.len() {
            return None;
        }
        let offset = self.offset;
        let record_number = match self.reader.data.get(offset..offset + 4) {
            Some(bytes) => ByteCursor::new(bytes).read_i32().unwrap_or(0),
            None => 0,
        };
        match self.reader.read_at(offset) {
            Ok((Ok(record), next)) => {
                self.offset = next;
                Some(Ok(ShapeEntry {
                    record_number,
                    offset,
                    record,
                }))
            }
            Ok((Err(e), next)) => {
                warn!("Skipping record {} at offset {}: {}", record_number, offset, e);
                self.offset = next;
                Some(Err(e))
            }
            Err(e) => {
                warn!("Shapefile truncated at offset {}: {}", offset, e);
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
