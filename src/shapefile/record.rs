// Shape records
// Decoded geometry for one shapefile record

use serde_json::json;

use super::coords::{CoordinateAccess, InterleavedCoords};
use super::ShapeFamily;
use crate::envelope::Envelope;

/// One polygon: a clockwise shell and its counter-clockwise holes
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    pub shell: InterleavedCoords,
    pub holes: Vec<InterleavedCoords>,
}

impl PolygonShape {
    pub fn new(shell: InterleavedCoords) -> Self {
        Self {
            shell,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(shell: InterleavedCoords, holes: Vec<InterleavedCoords>) -> Self {
        Self { shell, holes }
    }

    /// Shell followed by holes
    pub fn rings(&self) -> impl Iterator<Item = &InterleavedCoords> {
        std::iter::once(&self.shell).chain(self.holes.iter())
    }
}

/// A decoded shapefile record. The dimension (2D or 2D+Z) is carried by the
/// coordinate buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRecord {
    Null,
    /// A single coordinate
    Point(InterleavedCoords),
    MultiPoint(InterleavedCoords),
    /// One coordinate sequence per part
    Polyline(Vec<InterleavedCoords>),
    Polygon(Vec<PolygonShape>),
}

impl ShapeRecord {
    pub fn point(x: f64, y: f64) -> Self {
        ShapeRecord::Point(InterleavedCoords::from_xy(&[(x, y)]))
    }

    pub fn point_z(x: f64, y: f64, z: f64) -> Self {
        ShapeRecord::Point(InterleavedCoords::from_xyz(&[(x, y, z)]))
    }

    pub fn family(&self) -> ShapeFamily {
        match self {
            ShapeRecord::Null => ShapeFamily::Null,
            ShapeRecord::Point(_) => ShapeFamily::Point,
            ShapeRecord::MultiPoint(_) => ShapeFamily::MultiPoint,
            ShapeRecord::Polyline(_) => ShapeFamily::Line,
            ShapeRecord::Polygon(_) => ShapeFamily::Polygon,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ShapeRecord::Null)
    }

    /// 3 when any coordinate buffer carries Z, otherwise 2
    pub fn dimension(&self) -> usize {
        if self.parts().iter().any(|p| p.has_z()) {
            3
        } else {
            2
        }
    }

    /// Every coordinate sequence in file order: polygon shells are followed by
    /// their holes
    pub fn parts(&self) -> Vec<&InterleavedCoords> {
        match self {
            ShapeRecord::Null => Vec::new(),
            ShapeRecord::Point(c) | ShapeRecord::MultiPoint(c) => vec![c],
            ShapeRecord::Polyline(parts) => parts.iter().collect(),
            ShapeRecord::Polygon(polygons) => polygons.iter().flat_map(|p| p.rings()).collect(),
        }
    }

    pub fn num_parts(&self) -> usize {
        self.parts().len()
    }

    pub fn num_points(&self) -> usize {
        self.parts().iter().map(|p| p.size()).sum()
    }

    /// Start offset of each part in the record's shared point array
    pub fn part_offsets(&self) -> Vec<i32> {
        let mut offsets = Vec::new();
        let mut start = 0i32;
        for part in self.parts() {
            offsets.push(start);
            start += part.size() as i32;
        }
        offsets
    }

    pub fn envelope(&self) -> Envelope {
        let mut envelope = Envelope::empty();
        for part in self.parts() {
            part.expand_envelope(&mut envelope);
        }
        envelope
    }

    /// Z range over all non-NaN Z values, `(0.0, 0.0)` when there are none
    pub fn z_range(&self) -> (f64, f64) {
        super::line::z_range(&self.parts())
    }

    /// GeoJSON geometry object, or `null` for a null record
    pub fn to_geojson(&self) -> serde_json::Value {
        match self {
            ShapeRecord::Null => json!(null),
            ShapeRecord::Point(c) => {
                if c.size() == 0 {
                    json!(null)
                } else {
                    json!({ "type": "Point", "coordinates": position(c, 0) })
                }
            }
            ShapeRecord::MultiPoint(c) => {
                json!({ "type": "MultiPoint", "coordinates": positions(c) })
            }
            ShapeRecord::Polyline(parts) => {
                if parts.len() == 1 {
                    json!({ "type": "LineString", "coordinates": positions(&parts[0]) })
                } else {
                    let lines: Vec<_> = parts.iter().map(positions).collect();
                    json!({ "type": "MultiLineString", "coordinates": lines })
                }
            }
            ShapeRecord::Polygon(polygons) => {
                let rings = |p: &PolygonShape| -> Vec<Vec<serde_json::Value>> {
                    p.rings().map(positions).collect()
                };
                if polygons.len() == 1 {
                    json!({ "type": "Polygon", "coordinates": rings(&polygons[0]) })
                } else {
                    let all: Vec<_> = polygons.iter().map(rings).collect();
                    json!({ "type": "MultiPolygon", "coordinates": all })
                }
            }
        }
    }
}

// Z is only emitted when it is a real value
fn position(coords: &InterleavedCoords, i: usize) -> serde_json::Value {
    let z = coords.z(i);
    if z.is_nan() {
        json!([coords.x(i), coords.y(i)])
    } else {
        json!([coords.x(i), coords.y(i), z])
    }
}

fn positions(coords: &InterleavedCoords) -> Vec<serde_json::Value> {
    (0..coords.size()).map(|i| position(coords, i)).collect()
}
