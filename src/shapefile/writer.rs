// Shapefile writer
// Writes the .shp records and the matching .shx index entries in step

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, info, warn};

use super::cursor::{Endian, RecordBuffer};
use super::handler::ShapeHandler;
use super::header::{ShapefileHeader, HEADER_LENGTH};
use super::index::{IndexRecord, INDEX_RECORD_LENGTH};
use super::record::ShapeRecord;
use super::{ShapeType, ShapefileError};
use crate::envelope::Envelope;

const RECORD_HEADER_LENGTH: usize = 8;
const INITIAL_BUFFER: usize = 16 * 1024;

pub struct ShapefileWriter<W: Write, I: Write> {
    shp: W,
    shx: I,
    handler: Option<ShapeHandler>,
    buffer: RecordBuffer,
    record_number: i32,
    /// Offset of the next record, in 16-bit words
    offset_words: i32,
    expected_count: usize,
}

impl ShapefileWriter<BufWriter<File>, BufWriter<File>> {
    /// Create `path` and its sibling `.shx`
    pub fn create(path: &Path) -> Result<Self, ShapefileError> {
        let shp = File::create(path)?;
        let shx = File::create(path.with_extension("shx"))?;
        info!("Writing shapefile {:?}", path);
        Ok(Self::new(BufWriter::new(shp), BufWriter::new(shx)))
    }
}

impl<W: Write, I: Write> ShapefileWriter<W, I> {
    pub fn new(shp: W, shx: I) -> Self {
        Self {
            shp,
            shx,
            handler: None,
            buffer: RecordBuffer::with_capacity(INITIAL_BUFFER),
            record_number: 1,
            offset_words: (HEADER_LENGTH / 2) as i32,
            expected_count: 0,
        }
    }

    /// Bytes the records take in the .shp file, record headers included
    pub fn records_length(shape_type: ShapeType, records: &[Option<ShapeRecord>]) -> usize {
        let handler = ShapeHandler::new(shape_type);
        records
            .iter()
            .map(|r| RECORD_HEADER_LENGTH + r.as_ref().map_or(4, |r| handler.encoded_length(r)))
            .sum()
    }

    /// Write both file headers. `records_length` is the byte length of all
    /// records including their 8-byte headers.
    pub fn write_headers(
        &mut self,
        bbox: Envelope,
        shape_type: ShapeType,
        count: usize,
        records_length: usize,
    ) -> Result<(), ShapefileError> {
        let shp_header = ShapefileHeader::new(shape_type, bbox, HEADER_LENGTH + records_length);
        let shx_header = ShapefileHeader::new(
            shape_type,
            bbox,
            HEADER_LENGTH + INDEX_RECORD_LENGTH * count,
        );

        self.buffer.clear();
        shp_header.write(&mut self.buffer);
        self.shp.write_all(self.buffer.as_bytes())?;

        self.buffer.clear();
        shx_header.write(&mut self.buffer);
        self.shx.write_all(self.buffer.as_bytes())?;

        self.handler = Some(ShapeHandler::new(shape_type));
        self.expected_count = count;
        debug!(
            "Shapefile headers: {} records, {} bytes, type {}",
            count, shp_header.file_length, shape_type
        );
        Ok(())
    }

    /// Write one record, or a null shape for `None`
    pub fn write_geometry(&mut self, record: Option<&ShapeRecord>) -> Result<(), ShapefileError> {
        let handler = self.handler.ok_or_else(|| {
            ShapefileError::HeaderMismatch("headers must be written before records".to_string())
        })?;
        let null = ShapeRecord::Null;
        let record = record.unwrap_or(&null);
        let length = handler.encoded_length(record);

        self.buffer.clear();
        if self.buffer.ensure_capacity(RECORD_HEADER_LENGTH + length) {
            debug!("Record buffer grown to {} bytes", self.buffer.capacity());
        }
        self.buffer.set_endian(Endian::Big);
        self.buffer.write_i32(self.record_number);
        self.buffer.write_i32((length / 2) as i32);
        handler.encode(&mut self.buffer, record)?;

        let written = self.buffer.len() - RECORD_HEADER_LENGTH;
        if written != length {
            return Err(ShapefileError::RecordLengthMismatch {
                record: self.record_number,
                declared: length,
                written,
            });
        }

        self.shp.write_all(self.buffer.as_bytes())?;

        self.buffer.clear();
        IndexRecord::new(self.offset_words, (length / 2) as i32).write(&mut self.buffer);
        self.shx.write_all(self.buffer.as_bytes())?;

        self.offset_words += ((RECORD_HEADER_LENGTH + length) / 2) as i32;
        self.record_number += 1;
        Ok(())
    }

    /// Write headers and every record of `records`
    pub fn write_all(
        &mut self,
        shape_type: ShapeType,
        records: &[Option<ShapeRecord>],
    ) -> Result<(), ShapefileError> {
        let mut bbox = Envelope::empty();
        for record in records.iter().flatten() {
            bbox.expand_to_include_envelope(&record.envelope());
        }
        let length = Self::records_length(shape_type, records);
        self.write_headers(bbox, shape_type, records.len(), length)?;
        for record in records {
            self.write_geometry(record.as_ref())?;
        }
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        (self.record_number - 1) as usize
    }

    /// Flush both files and hand back the underlying writers
    pub fn close(mut self) -> Result<(W, I), ShapefileError> {
        if self.records_written() != self.expected_count {
            warn!(
                "Shapefile header declared {} records but {} were written",
                self.expected_count,
                self.records_written()
            );
        }
        self.shp.flush()?;
        self.shx.flush()?;
        Ok((self.shp, self.shx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapefile::coords::InterleavedCoords;
    use crate::shapefile::index::read_index;

    #[test]
    fn test_write_points_in_memory() {
        let records = vec![
            Some(ShapeRecord::point(1.0, 2.0)),
            None,
            Some(ShapeRecord::point(3.0, 4.0)),
        ];
        let mut writer = ShapefileWriter::new(Vec::new(), Vec::new());
        writer.write_all(ShapeType::Point, &records).unwrap();
        assert_eq!(writer.records_written(), 3);
        let (shp, shx) = writer.close().unwrap();

        // 100 + (8 + 20) + (8 + 4) + (8 + 20)
        assert_eq!(shp.len(), 168);
        assert_eq!(shx.len(), 100 + 3 * 8);

        let header = ShapefileHeader::read(&shp, true).unwrap();
        assert_eq!(header.file_length, 168);
        assert_eq!(header.bbox, Envelope::new(1.0, 2.0, 3.0, 4.0));

        let (_, index) = read_index(&shx, true).unwrap();
        assert_eq!(index[0], IndexRecord::new(50, 10));
        assert_eq!(index[1], IndexRecord::new(64, 2));
        assert_eq!(index[2], IndexRecord::new(70, 10));

        // record headers are big-endian
        assert_eq!(&shp[100..104], &1i32.to_be_bytes());
        assert_eq!(&shp[104..108], &10i32.to_be_bytes());
        assert_eq!(&shp[128..132], &2i32.to_be_bytes());
        assert_eq!(&shp[136..140], &0i32.to_le_bytes());
    }

    #[test]
    fn test_records_before_headers_fail() {
        let mut writer = ShapefileWriter::new(Vec::new(), Vec::new());
        assert!(writer.write_geometry(Some(&ShapeRecord::point(0.0, 0.0))).is_err());
    }

    #[test]
    fn test_large_record_grows_buffer() {
        let coords: Vec<(f64, f64)> = (0..2000).map(|i| (i as f64, (i % 7) as f64)).collect();
        let records = vec![Some(ShapeRecord::Polyline(vec![InterleavedCoords::from_xy(&coords)]))];
        let mut writer = ShapefileWriter::new(Vec::new(), Vec::new());
        writer.write_all(ShapeType::Arc, &records).unwrap();
        assert!(writer.buffer.capacity() >= 8 + 48 + 16 * 2000);
        let (shp, _) = writer.close().unwrap();
        assert_eq!(shp.len(), 100 + 8 + 48 + 16 * 2000);
    }

    #[test]
    fn test_create_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.shp");
        let mut writer = ShapefileWriter::create(&path).unwrap();
        writer
            .write_all(ShapeType::Point, &[Some(ShapeRecord::point(5.0, 5.0))])
            .unwrap();
        writer.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
        assert_eq!(std::fs::metadata(dir.path().join("roads.shx")).unwrap().len(), 108);
    }
}
