// Point records: X, Y, then Z and M for the Z variant or M alone for the M variant

use super::coords::{CoordinateAccess, InterleavedCoords};
use super::cursor::{ByteCursor, RecordBuffer};
use super::record::ShapeRecord;
use super::{ShapeType, ShapefileError, NO_DATA};

pub(super) fn encoded_length(shape_type: ShapeType) -> usize {
    if shape_type.has_z() {
        36
    } else if shape_type.has_m() {
        28
    } else {
        20
    }
}

pub(super) fn decode(
    cursor: &mut ByteCursor,
    declared: ShapeType,
    read_3d: bool,
) -> Result<ShapeRecord, ShapefileError> {
    let x = cursor.read_f64()?;
    let y = cursor.read_f64()?;

    if declared.has_z() {
        let z = cursor.read_f64()?;
        // M is optional on disk for PointZ
        if cursor.remaining() >= 8 {
            cursor.skip(8)?;
        }
        if read_3d {
            return Ok(ShapeRecord::point_z(x, y, z));
        }
    } else if declared.has_m() && cursor.remaining() >= 8 {
        cursor.skip(8)?;
    }
    Ok(ShapeRecord::point(x, y))
}

pub(super) fn encode(
    buffer: &mut RecordBuffer,
    shape_type: ShapeType,
    coords: &InterleavedCoords,
) -> Result<(), ShapefileError> {
    if coords.size() != 1 {
        return Err(ShapefileError::CorruptRecord(format!(
            "point record holds {} coordinates",
            coords.size()
        )));
    }
    buffer.write_f64(coords.x(0));
    buffer.write_f64(coords.y(0));
    if shape_type.has_z() {
        let z = coords.z(0);
        buffer.write_f64(if z.is_nan() { 0.0 } else { z });
    }
    if shape_type.has_m_block() {
        buffer.write_f64(NO_DATA);
    }
    Ok(())
}
