// Arc records and the multi-part layout shared with polygons:
// bbox, part count, point count, part offsets, XY pairs, then optional Z and M blocks

use super::coords::{CoordinateAccess, InterleavedCoords, PlanarCoords};
use super::cursor::{ByteCursor, RecordBuffer};
use super::decimate::Decimation;
use super::record::ShapeRecord;
use super::{ShapeType, ShapefileError, NO_DATA};
use crate::envelope::Envelope;

/// Raw multi-part payload before it is split into parts
pub(super) struct RawParts {
    pub offsets: Vec<usize>,
    pub xy: Vec<f64>,
    pub z: Option<Vec<f64>>,
}

impl RawParts {
    pub fn num_points(&self) -> usize {
        self.xy.len() / 2
    }

    /// Point index range of each part
    pub fn ranges(&self) -> Vec<std::ops::Range<usize>> {
        let n = self.num_points();
        self.offsets
            .iter()
            .enumerate()
            .map(|(k, &start)| {
                let end = self.offsets.get(k + 1).copied().unwrap_or(n);
                start..end
            })
            .collect()
    }

    /// Copy one part into a point-major buffer
    pub fn interleaved(&self, range: std::ops::Range<usize>) -> InterleavedCoords {
        let dimension = if self.z.is_some() { 3 } else { 2 };
        let mut coords = InterleavedCoords::with_capacity(dimension, range.len());
        for i in range {
            let z = self.z.as_ref().map_or(f64::NAN, |z| z[i]);
            coords.push_xyz(self.xy[2 * i], self.xy[2 * i + 1], z);
        }
        coords
    }

    /// Copy one part into a component-major buffer for decimation
    pub fn planar(&self, range: std::ops::Range<usize>) -> PlanarCoords {
        let dimension = if self.z.is_some() { 3 } else { 2 };
        let mut coords = PlanarCoords::new(range.len(), dimension);
        for (k, i) in range.enumerate() {
            coords.set(k, 0, self.xy[2 * i]);
            coords.set(k, 1, self.xy[2 * i + 1]);
            if let Some(z) = &self.z {
                coords.set(k, 2, z[i]);
            }
        }
        coords
    }
}

fn read_count(cursor: &mut ByteCursor, what: &str) -> Result<usize, ShapefileError> {
    let value = cursor.read_i32()?;
    if value < 0 {
        return Err(ShapefileError::CorruptRecord(format!(
            "negative {}: {}",
            what, value
        )));
    }
    Ok(value as usize)
}

/// Fail unless the XY block of `num_points` points fits in the record
pub(super) fn require_xy(cursor: &ByteCursor, num_points: usize) -> Result<(), ShapefileError> {
    let byte_len = num_points.checked_mul(16).ok_or_else(|| {
        ShapefileError::CorruptRecord(format!("point count {} is too large", num_points))
    })?;
    cursor.require(byte_len)
}

/// Read the multi-part payload that follows the shape type id
pub(super) fn read_parts(
    cursor: &mut ByteCursor,
    declared: ShapeType,
    read_3d: bool,
) -> Result<RawParts, ShapefileError> {
    cursor.skip(32)?;
    let num_parts = read_count(cursor, "part count")?;
    let num_points = read_count(cursor, "point count")?;

    if num_parts == 0 && num_points > 0 {
        return Err(ShapefileError::CorruptRecord(format!(
            "{} points but no parts",
            num_points
        )));
    }
    cursor.require(num_parts.saturating_mul(4))?;
    let mut offsets = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        let offset = cursor.read_i32()?;
        if offset < 0 || offset as usize >= num_points {
            return Err(ShapefileError::CorruptRecord(format!(
                "part offset {} outside 0..{}",
                offset, num_points
            )));
        }
        if offsets.is_empty() && offset != 0 {
            return Err(ShapefileError::CorruptRecord(format!(
                "first part starts at {} instead of 0",
                offset
            )));
        }
        if let Some(&previous) = offsets.last() {
            if offset as usize <= previous {
                return Err(ShapefileError::CorruptRecord(format!(
                    "part offsets not increasing: {} after {}",
                    offset, previous
                )));
            }
        }
        offsets.push(offset as usize);
    }

    require_xy(cursor, num_points)?;
    let xy = cursor.read_f64_array(num_points * 2)?;

    let z = if declared.has_z() && read_3d {
        cursor.skip(16)?;
        Some(cursor.read_f64_array(num_points)?)
    } else {
        None
    };

    Ok(RawParts { offsets, xy, z })
}

/// Bytes needed for a multi-part record of this type
pub(super) fn parts_length(shape_type: ShapeType, num_parts: usize, num_points: usize) -> usize {
    let mut length = 44 + 4 * num_parts + 16 * num_points;
    if shape_type.has_z() {
        length += 16 + 8 * num_points;
    }
    if shape_type.has_m_block() {
        length += 16 + 8 * num_points;
    }
    length
}

/// Write the multi-part payload that follows the shape type id
pub(super) fn write_parts(buffer: &mut RecordBuffer, shape_type: ShapeType, parts: &[&InterleavedCoords]) {
    let mut envelope = Envelope::empty();
    for part in parts {
        part.expand_envelope(&mut envelope);
    }
    for v in envelope.to_array() {
        buffer.write_f64(v);
    }
    let num_points: usize = parts.iter().map(|p| p.size()).sum();
    buffer.write_i32(parts.len() as i32);
    buffer.write_i32(num_points as i32);

    let mut start = 0;
    for part in parts {
        buffer.write_i32(start as i32);
        start += part.size();
    }
    for part in parts {
        for i in 0..part.size() {
            buffer.write_f64(part.x(i));
            buffer.write_f64(part.y(i));
        }
    }

    if shape_type.has_z() {
        let (z_min, z_max) = z_range(parts);
        buffer.write_f64(z_min);
        buffer.write_f64(z_max);
        for part in parts {
            for i in 0..part.size() {
                let z = part.z(i);
                buffer.write_f64(if z.is_nan() { 0.0 } else { z });
            }
        }
    }
    if shape_type.has_m_block() {
        buffer.write_f64(NO_DATA);
        buffer.write_f64(NO_DATA);
        for _ in 0..num_points {
            buffer.write_f64(NO_DATA);
        }
    }
}

/// Range of the non-NaN Z values, `(0.0, 0.0)` when there are none
pub(super) fn z_range(parts: &[&InterleavedCoords]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for part in parts {
        for i in 0..part.size() {
            let z = part.z(i);
            if !z.is_nan() {
                min = min.min(z);
                max = max.max(z);
            }
        }
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

pub(super) fn decode(
    cursor: &mut ByteCursor,
    declared: ShapeType,
    read_3d: bool,
    decimation: Option<&Decimation>,
) -> Result<ShapeRecord, ShapefileError> {
    let raw = read_parts(cursor, declared, read_3d)?;
    let mut parts = Vec::with_capacity(raw.offsets.len());

    for range in raw.ranges() {
        let mut coords = match decimation {
            Some(decimation) => {
                let mut planar = raw.planar(range);
                decimation.decimate_line(&mut planar);
                planar.to_interleaved()
            }
            None => raw.interleaved(range),
        };
        // lone points become a zero-length segment
        if coords.size() == 1 {
            let copy = coords.clone();
            coords.push_from(&copy, 0);
        }
        parts.push(coords);
    }
    Ok(ShapeRecord::Polyline(parts))
}

pub(super) fn encoded_length(shape_type: ShapeType, record: &ShapeRecord) -> usize {
    parts_length(shape_type, record.num_parts(), record.num_points())
}

pub(super) fn encode(buffer: &mut RecordBuffer, shape_type: ShapeType, record: &ShapeRecord) {
    write_parts(buffer, shape_type, &record.parts());
}
