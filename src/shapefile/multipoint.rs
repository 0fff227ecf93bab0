// MultiPoint records: bbox, point count, XY pairs, then optional Z and M blocks

use super::coords::{CoordinateAccess, InterleavedCoords};
use super::cursor::{ByteCursor, RecordBuffer};
use super::decimate::Decimation;
use super::line::{require_xy, z_range, RawParts};
use super::record::ShapeRecord;
use super::{ShapeType, ShapefileError, NO_DATA};

pub(super) fn encoded_length(shape_type: ShapeType, num_points: usize) -> usize {
    let mut length = 40 + 16 * num_points;
    if shape_type.has_z() {
        length += 16 + 8 * num_points;
    }
    if shape_type.has_m_block() {
        length += 16 + 8 * num_points;
    }
    length
}

pub(super) fn decode(
    cursor: &mut ByteCursor,
    declared: ShapeType,
    read_3d: bool,
    decimation: Option<&Decimation>,
) -> Result<ShapeRecord, ShapefileError> {
    // bounding box is recomputed from the points
    cursor.skip(32)?;
    let count = cursor.read_i32()?;
    if count < 0 {
        return Err(ShapefileError::CorruptRecord(format!(
            "negative point count: {}",
            count
        )));
    }
    let n = count as usize;
    require_xy(cursor, n)?;
    let xy = cursor.read_f64_array(n * 2)?;
    let z = if declared.has_z() && read_3d {
        cursor.skip(16)?;
        Some(cursor.read_f64_array(n)?)
    } else {
        None
    };

    let raw = RawParts {
        offsets: vec![0],
        xy,
        z,
    };
    let coords = match decimation {
        Some(decimation) => {
            let mut planar = raw.planar(0..n);
            decimation.decimate_points(&mut planar);
            planar.to_interleaved()
        }
        None => raw.interleaved(0..n),
    };
    Ok(ShapeRecord::MultiPoint(coords))
}

pub(super) fn encode(buffer: &mut RecordBuffer, shape_type: ShapeType, coords: &InterleavedCoords) {
    for v in coords.envelope().to_array() {
        buffer.write_f64(v);
    }
    let n = coords.size();
    buffer.write_i32(n as i32);
    for i in 0..n {
        buffer.write_f64(coords.x(i));
        buffer.write_f64(coords.y(i));
    }
    if shape_type.has_z() {
        let (z_min, z_max) = z_range(&[coords]);
        buffer.write_f64(z_min);
        buffer.write_f64(z_max);
        for i in 0..n {
            let z = coords.z(i);
            buffer.write_f64(if z.is_nan() { 0.0 } else { z });
        }
    }
    if shape_type.has_m_block() {
        buffer.write_f64(NO_DATA);
        buffer.write_f64(NO_DATA);
        for _ in 0..n {
            buffer.write_f64(NO_DATA);
        }
    }
}
