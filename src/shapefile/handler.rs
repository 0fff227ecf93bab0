// Shape handler
// Dispatches record decoding, encoding and length computation by shape family

use super::coords::CoordinateAccess;
use super::cursor::{ByteCursor, Endian, RecordBuffer};
use super::decimate::Decimation;
use super::record::ShapeRecord;
use super::{line, multipoint, point, polygon};
use super::{ShapeFamily, ShapeType, ShapefileError};

/// Length of a null record: the shape type id alone
const NULL_LENGTH: usize = 4;

/// Codec for the records of one shape type.
///
/// Encoded lengths include the 4-byte shape type id and exclude the 8-byte
/// record header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeHandler {
    shape_type: ShapeType,
    read_3d: bool,
    decimation: Option<Decimation>,
}

impl ShapeHandler {
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            shape_type,
            read_3d: true,
            decimation: None,
        }
    }

    /// Handler whose type fits the record's family and dimension
    pub fn for_record(record: &ShapeRecord) -> Result<Self, ShapefileError> {
        let shape_type = ShapeType::for_dimensions(record.family(), record.dimension())?;
        Ok(Self::new(shape_type))
    }

    /// Whether Z ordinates are materialised when decoding Z variants
    pub fn with_read_3d(mut self, read_3d: bool) -> Self {
        self.read_3d = read_3d;
        self
    }

    pub fn with_decimation(mut self, decimation: Option<Decimation>) -> Self {
        self.decimation = decimation;
        self
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn read_3d(&self) -> bool {
        self.read_3d
    }

    pub fn decimation(&self) -> Option<&Decimation> {
        self.decimation.as_ref()
    }

    /// Decode one record payload. The cursor sits just past the shape type id,
    /// which the caller has read as `declared`.
    pub fn decode(
        &self,
        cursor: &mut ByteCursor,
        declared: ShapeType,
    ) -> Result<ShapeRecord, ShapefileError> {
        if declared.is_null() || self.shape_type.is_null() {
            return Ok(ShapeRecord::Null);
        }
        if declared.family() != self.shape_type.family() {
            return Err(ShapefileError::UnsupportedShapeType(format!(
                "{} record in a {} file",
                declared, self.shape_type
            )));
        }
        cursor.set_endian(Endian::Little);
        let decimation = self.decimation.as_ref();
        match declared.family() {
            ShapeFamily::Point => point::decode(cursor, declared, self.read_3d),
            ShapeFamily::MultiPoint => multipoint::decode(cursor, declared, self.read_3d, decimation),
            ShapeFamily::Line => line::decode(cursor, declared, self.read_3d, decimation),
            ShapeFamily::Polygon => polygon::decode(cursor, declared, self.read_3d, decimation),
            ShapeFamily::Null => Ok(ShapeRecord::Null),
        }
    }

    /// Bytes `encode` will write for this record
    pub fn encoded_length(&self, record: &ShapeRecord) -> usize {
        if self.shape_type.is_null() {
            return NULL_LENGTH;
        }
        match record {
            ShapeRecord::Null => NULL_LENGTH,
            ShapeRecord::Point(_) => point::encoded_length(self.shape_type),
            ShapeRecord::MultiPoint(coords) => multipoint::encoded_length(self.shape_type, coords.size()),
            ShapeRecord::Polyline(_) => line::encoded_length(self.shape_type, record),
            ShapeRecord::Polygon(_) => polygon::encoded_length(self.shape_type, record),
        }
    }

    /// Append the shape type id and payload to `buffer`
    pub fn encode(&self, buffer: &mut RecordBuffer, record: &ShapeRecord) -> Result<(), ShapefileError> {
        buffer.set_endian(Endian::Little);
        if self.shape_type.is_null() || record.is_null() {
            buffer.write_i32(ShapeType::Null.id());
            return Ok(());
        }
        if record.family() != self.shape_type.family() {
            return Err(ShapefileError::UnsupportedShapeType(format!(
                "cannot write a {:?} record as {}",
                record.family(),
                self.shape_type
            )));
        }

        buffer.write_i32(self.shape_type.id());
        match record {
            ShapeRecord::Point(coords) => point::encode(buffer, self.shape_type, coords)?,
            ShapeRecord::MultiPoint(coords) => multipoint::encode(buffer, self.shape_type, coords),
            ShapeRecord::Polyline(_) => line::encode(buffer, self.shape_type, record),
            ShapeRecord::Polygon(polygons) => polygon::encode(buffer, self.shape_type, polygons),
            ShapeRecord::Null => {}
        }
        Ok(())
    }

    /// Decode a record payload that starts with its shape type id
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<ShapeRecord, ShapefileError> {
        let mut cursor = ByteCursor::with_endian(bytes, Endian::Little);
        let declared = ShapeType::from_id(cursor.read_i32()?)?;
        self.decode(&mut cursor, declared)
    }

    pub fn encode_bytes(&self, record: &ShapeRecord) -> Result<Vec<u8>, ShapefileError> {
        let mut buffer = RecordBuffer::with_capacity(self.encoded_length(record));
        self.encode(&mut buffer, record)?;
        Ok(buffer.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapefile::coords::InterleavedCoords;
    use crate::shapefile::record::PolygonShape;

    fn shell(x0: f64, y0: f64, size: f64) -> InterleavedCoords {
        InterleavedCoords::from_xy(&[
            (x0, y0),
            (x0, y0 + size),
            (x0 + size, y0 + size),
            (x0 + size, y0),
            (x0, y0),
        ])
    }

    fn shell_z(x0: f64, y0: f64, size: f64, z: f64) -> InterleavedCoords {
        InterleavedCoords::from_xyz(&[
            (x0, y0, z),
            (x0, y0 + size, z + 1.0),
            (x0 + size, y0 + size, z + 2.0),
            (x0 + size, y0, z + 3.0),
            (x0, y0, z),
        ])
    }

    fn samples() -> Vec<(ShapeType, ShapeRecord)> {
        let line = ShapeRecord::Polyline(vec![
            InterleavedCoords::from_xy(&[(0.0, 0.0), (1.0, 2.0), (3.0, 1.0)]),
            InterleavedCoords::from_xy(&[(7.0, 7.0), (7.0, 7.0)]),
        ]);
        let line_z = ShapeRecord::Polyline(vec![InterleavedCoords::from_xyz(&[
            (0.0, 0.0, 5.0),
            (1.0, 2.0, 6.0),
        ])]);
        let polygon = ShapeRecord::Polygon(vec![PolygonShape::with_holes(
            shell(0.0, 0.0, 10.0),
            vec![shell(2.0, 2.0, 2.0).reversed()],
        )]);
        let polygon_z = ShapeRecord::Polygon(vec![PolygonShape::new(shell_z(0.0, 0.0, 4.0, 1.0))]);
        let multipoint = ShapeRecord::MultiPoint(InterleavedCoords::from_xy(&[(0.0, 0.0), (5.0, 5.0)]));
        let multipoint_z =
            ShapeRecord::MultiPoint(InterleavedCoords::from_xyz(&[(0.0, 0.0, 1.0), (5.0, 5.0, 2.0)]));

        vec![
            (ShapeType::Null, ShapeRecord::Null),
            (ShapeType::Point, ShapeRecord::point(1.5, -2.5)),
            (ShapeType::PointZ, ShapeRecord::point_z(1.5, -2.5, 30.0)),
            (ShapeType::PointM, ShapeRecord::point(1.5, -2.5)),
            (ShapeType::MultiPoint, multipoint.clone()),
            (ShapeType::MultiPointM, multipoint),
            (ShapeType::MultiPointZ, multipoint_z),
            (ShapeType::Arc, line.clone()),
            (ShapeType::ArcM, line),
            (ShapeType::ArcZ, line_z),
            (ShapeType::Polygon, polygon.clone()),
            (ShapeType::PolygonM, polygon),
            (ShapeType::PolygonZ, polygon_z),
        ]
    }

    #[test]
    fn test_round_trip_all_types() {
        for (shape_type, record) in samples() {
            let handler = ShapeHandler::new(shape_type);
            let bytes = handler.encode_bytes(&record).unwrap();
            let decoded = handler.decode_bytes(&bytes).unwrap();
            assert_eq!(decoded, record, "round trip for {}", shape_type);
        }
    }

    #[test]
    fn test_encoded_length_matches_output() {
        for (shape_type, record) in samples() {
            let handler = ShapeHandler::new(shape_type);
            let bytes = handler.encode_bytes(&record).unwrap();
            assert_eq!(handler.encoded_length(&record), bytes.len(), "length for {}", shape_type);
        }
        assert_eq!(ShapeHandler::new(ShapeType::Point).encoded_length(&ShapeRecord::point(0.0, 0.0)), 20);
        assert_eq!(ShapeHandler::new(ShapeType::PointM).encoded_length(&ShapeRecord::point(0.0, 0.0)), 28);
        assert_eq!(ShapeHandler::new(ShapeType::PointZ).encoded_length(&ShapeRecord::point(0.0, 0.0)), 36);
    }

    #[test]
    fn test_null_handler_ignores_payload() {
        let handler = ShapeHandler::new(ShapeType::Null);
        let bytes = ShapeHandler::new(ShapeType::Point)
            .encode_bytes(&ShapeRecord::point(1.0, 2.0))
            .unwrap();
        assert_eq!(handler.decode_bytes(&bytes).unwrap(), ShapeRecord::Null);
        assert_eq!(handler.encoded_length(&ShapeRecord::point(1.0, 2.0)), 4);
        assert_eq!(handler.encode_bytes(&ShapeRecord::Null).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_nan_z_written_as_zero() {
        let handler = ShapeHandler::new(ShapeType::PointZ);
        let bytes = handler.encode_bytes(&ShapeRecord::point(1.0, 2.0)).unwrap();
        let decoded = handler.decode_bytes(&bytes).unwrap();
        assert_eq!(decoded, ShapeRecord::point_z(1.0, 2.0, 0.0));
        // trailing M is the no-data marker
        assert_eq!(&bytes[28..36], &(-1e40f64).to_le_bytes());
    }

    #[test]
    fn test_read_3d_off_drops_z() {
        let handler = ShapeHandler::new(ShapeType::PointZ);
        let bytes = handler.encode_bytes(&ShapeRecord::point_z(1.0, 2.0, 3.0)).unwrap();
        let flat = handler.with_read_3d(false).decode_bytes(&bytes).unwrap();
        assert_eq!(flat, ShapeRecord::point(1.0, 2.0));
        assert!(flat.parts()[0].z(0).is_nan());
    }

    #[test]
    fn test_family_mismatch_is_unsupported() {
        let bytes = ShapeHandler::new(ShapeType::Point)
            .encode_bytes(&ShapeRecord::point(1.0, 2.0))
            .unwrap();
        let result = ShapeHandler::new(ShapeType::Polygon).decode_bytes(&bytes);
        assert!(matches!(result, Err(ShapefileError::UnsupportedShapeType(_))));

        let result = ShapeHandler::new(ShapeType::Arc).encode_bytes(&ShapeRecord::point(1.0, 2.0));
        assert!(matches!(result, Err(ShapefileError::UnsupportedShapeType(_))));
    }

    #[test]
    fn test_single_point_line_round_trip() {
        let handler = ShapeHandler::new(ShapeType::Arc);
        let record = ShapeRecord::Polyline(vec![InterleavedCoords::from_xy(&[(4.0, 4.0)])]);
        let decoded = handler.decode_bytes(&handler.encode_bytes(&record).unwrap()).unwrap();
        let expected = ShapeRecord::Polyline(vec![InterleavedCoords::from_xy(&[(4.0, 4.0), (4.0, 4.0)])]);
        assert_eq!(decoded, expected);
        let again = handler.decode_bytes(&handler.encode_bytes(&decoded).unwrap()).unwrap();
        assert_eq!(again, expected);
    }

    #[test]
    fn test_polygon_with_hole_decodes_once() {
        let handler = ShapeHandler::new(ShapeType::Polygon);
        let record = ShapeRecord::Polygon(vec![
            PolygonShape::new(shell(0.0, 0.0, 10.0)),
            PolygonShape::new(shell(2.0, 2.0, 2.0).reversed()),
        ]);
        // raw rings: CW outer, CCW inner
        let mut buffer = RecordBuffer::with_capacity(256);
        buffer.set_endian(Endian::Little);
        buffer.write_i32(ShapeType::Polygon.id());
        let outer = shell(0.0, 0.0, 10.0);
        let inner = shell(2.0, 2.0, 2.0).reversed();
        line::write_parts(&mut buffer, ShapeType::Polygon, &[&outer, &inner]);
        let decoded = handler.decode_bytes(buffer.as_bytes()).unwrap();
        match decoded {
            ShapeRecord::Polygon(polygons) => {
                assert_eq!(polygons.len(), 1);
                assert_eq!(polygons[0].holes.len(), 1);
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(handler.encoded_length(&record), 44 + 8 + 16 * 10);
    }

    #[test]
    fn test_unclosed_and_degenerate_rings() {
        let mut buffer = RecordBuffer::with_capacity(256);
        buffer.set_endian(Endian::Little);
        buffer.write_i32(ShapeType::Polygon.id());
        let open = InterleavedCoords::from_xy(&[(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0)]);
        let sliver = InterleavedCoords::from_xy(&[(9.0, 9.0), (9.0, 10.0)]);
        line::write_parts(&mut buffer, ShapeType::Polygon, &[&open, &sliver]);

        let decoded = ShapeHandler::new(ShapeType::Polygon)
            .decode_bytes(buffer.as_bytes())
            .unwrap();
        match decoded {
            ShapeRecord::Polygon(polygons) => {
                assert_eq!(polygons.len(), 1);
                assert_eq!(polygons[0].shell.size(), 5);
                assert!(polygons[0].shell.is_closed());
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_for_record_picks_dimension() {
        let handler = ShapeHandler::for_record(&ShapeRecord::point_z(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(handler.shape_type(), ShapeType::PointZ);
        let handler = ShapeHandler::for_record(&ShapeRecord::point(0.0, 0.0)).unwrap();
        assert_eq!(handler.shape_type(), ShapeType::Point);
    }

    #[test]
    fn test_decimated_polygon_keeps_small_rings() {
        let handler = ShapeHandler::new(ShapeType::Polygon)
            .with_decimation(Some(Decimation::new(100.0, 100.0)));
        let record = ShapeRecord::Polygon(vec![PolygonShape::new(shell(0.0, 0.0, 10.0))]);
        let decoded = handler
            .decode_bytes(&ShapeHandler::new(ShapeType::Polygon).encode_bytes(&record).unwrap())
            .unwrap();
        assert_eq!(decoded, record);
    }
}
