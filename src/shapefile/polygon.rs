// Polygon records
// Same layout as arcs; rings are classified by winding and assembled into polygons

use log::debug;

use super::coords::{CoordinateAccess, InterleavedCoords};
use super::cursor::{ByteCursor, RecordBuffer};
use super::decimate::Decimation;
use super::line::{parts_length, read_parts, write_parts};
use super::record::{PolygonShape, ShapeRecord};
use super::{ShapeType, ShapefileError};

/// Twice the signed shoelace area; positive for counter-clockwise rings
fn signed_area2<C: CoordinateAccess + ?Sized>(ring: &C) -> f64 {
    let n = ring.size();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += ring.x(i) * ring.y(j) - ring.x(j) * ring.y(i);
    }
    sum
}

/// Counter-clockwise rings are holes; clockwise rings are shells
pub fn is_ccw<C: CoordinateAccess + ?Sized>(ring: &C) -> bool {
    signed_area2(ring) > 0.0
}

/// Crossing-number test. Points exactly on a vertex count as inside.
pub fn point_in_ring<C: CoordinateAccess + ?Sized>(x: f64, y: f64, ring: &C) -> bool {
    let n = ring.size();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (xi, yi) = (ring.x(i), ring.y(i));
        if xi == x && yi == y {
            return true;
        }
        let (xj, yj) = (ring.x(j), ring.y(j));
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn has_vertex<C: CoordinateAccess + ?Sized>(ring: &C, x: f64, y: f64) -> bool {
    (0..ring.size()).any(|i| ring.x(i) == x && ring.y(i) == y)
}

/// Group holes under the shells that contain them.
///
/// With exactly one shell every hole belongs to it. A lone hole with no shell
/// is reversed into a shell. Otherwise each hole goes to the smallest shell
/// whose envelope contains it and whose ring contains its first point; a hole
/// that fits no shell is reversed and becomes a shell of its own.
pub fn assign_holes_to_shells(
    shells: Vec<InterleavedCoords>,
    holes: Vec<InterleavedCoords>,
) -> Vec<PolygonShape> {
    if shells.len() == 1 {
        let mut shells = shells;
        let shell = shells.remove(0);
        return vec![PolygonShape::with_holes(shell, holes)];
    }
    if shells.is_empty() && holes.len() == 1 {
        let mut holes = holes;
        let mut shell = holes.remove(0);
        shell.reverse();
        return vec![PolygonShape::new(shell)];
    }

    let mut polygons: Vec<PolygonShape> = shells.into_iter().map(PolygonShape::new).collect();
    let mut envelopes: Vec<_> = polygons.iter().map(|p| p.shell.envelope()).collect();

    for hole in holes {
        let hole_env = hole.envelope();
        let mut best: Option<usize> = None;
        if hole.size() > 0 {
            let (hx, hy) = (hole.x(0), hole.y(0));
            for (k, polygon) in polygons.iter().enumerate() {
                let shell_env = &envelopes[k];
                if !shell_env.contains(&hole_env) {
                    continue;
                }
                if !(point_in_ring(hx, hy, &polygon.shell) || has_vertex(&polygon.shell, hx, hy)) {
                    continue;
                }
                let smaller = match best {
                    Some(b) => shell_env.area() < envelopes[b].area(),
                    None => true,
                };
                if smaller {
                    best = Some(k);
                }
            }
        }

        match best {
            Some(k) => polygons[k].holes.push(hole),
            None => {
                debug!("Hole with no enclosing shell promoted to shell");
                let shell = hole.reversed();
                envelopes.push(shell.envelope());
                polygons.push(PolygonShape::new(shell));
            }
        }
    }
    polygons
}

pub(super) fn decode(
    cursor: &mut ByteCursor,
    declared: ShapeType,
    read_3d: bool,
    decimation: Option<&Decimation>,
) -> Result<ShapeRecord, ShapefileError> {
    let raw = read_parts(cursor, declared, read_3d)?;
    let mut shells = Vec::new();
    let mut holes = Vec::new();

    // read_parts rejects empty rings
    for range in raw.ranges() {
        let mut ring = match decimation {
            Some(decimation) => {
                let mut planar = raw.planar(range.clone());
                decimation.decimate_line(&mut planar);
                let ring = close_ring(planar.to_interleaved());
                if ring.size() < 4 {
                    // too few points left to form a ring
                    raw.interleaved(range)
                } else {
                    ring
                }
            }
            None => raw.interleaved(range),
        };
        ring = close_ring(ring);
        if ring.size() <= 3 {
            continue;
        }
        if is_ccw(&ring) {
            holes.push(ring);
        } else {
            shells.push(ring);
        }
    }

    Ok(ShapeRecord::Polygon(assign_holes_to_shells(shells, holes)))
}

fn close_ring(mut ring: InterleavedCoords) -> InterleavedCoords {
    if ring.size() > 0 && !ring.is_closed() {
        let first = ring.clone();
        ring.push_from(&first, 0);
    }
    ring
}

pub(super) fn encoded_length(shape_type: ShapeType, record: &ShapeRecord) -> usize {
    parts_length(shape_type, record.num_parts(), record.num_points())
}

/// Write rings shell-first, shells clockwise and holes counter-clockwise
pub(super) fn encode(buffer: &mut RecordBuffer, shape_type: ShapeType, polygons: &[PolygonShape]) {
    let mut rings = Vec::new();
    for polygon in polygons {
        rings.push(oriented(&polygon.shell, false));
        for hole in &polygon.holes {
            rings.push(oriented(hole, true));
        }
    }
    let refs: Vec<&InterleavedCoords> = rings.iter().collect();
    write_parts(buffer, shape_type, &refs);
}

fn oriented(ring: &InterleavedCoords, ccw: bool) -> InterleavedCoords {
    if ring.size() >= 3 && is_ccw(ring) != ccw {
        ring.reversed()
    } else {
        ring.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // clockwise in a y-up frame
    fn shell(x0: f64, y0: f64, size: f64) -> InterleavedCoords {
        InterleavedCoords::from_xy(&[
            (x0, y0),
            (x0, y0 + size),
            (x0 + size, y0 + size),
            (x0 + size, y0),
            (x0, y0),
        ])
    }

    fn hole(x0: f64, y0: f64, size: f64) -> InterleavedCoords {
        shell(x0, y0, size).reversed()
    }

    #[test]
    fn test_winding() {
        assert!(!is_ccw(&shell(0.0, 0.0, 10.0)));
        assert!(is_ccw(&hole(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_point_in_ring() {
        let ring = shell(0.0, 0.0, 10.0);
        assert!(point_in_ring(5.0, 5.0, &ring));
        assert!(!point_in_ring(15.0, 5.0, &ring));
        assert!(point_in_ring(10.0, 10.0, &ring));
    }

    #[test]
    fn test_hole_goes_under_shell() {
        let polygons = assign_holes_to_shells(vec![shell(0.0, 0.0, 10.0)], vec![hole(2.0, 2.0, 2.0)]);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].holes.len(), 1);
    }

    #[test]
    fn test_lone_hole_becomes_shell() {
        let polygons = assign_holes_to_shells(Vec::new(), vec![hole(0.0, 0.0, 4.0)]);
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].holes.is_empty());
        assert!(!is_ccw(&polygons[0].shell));
    }

    #[test]
    fn test_hole_picks_smallest_shell() {
        let polygons = assign_holes_to_shells(
            vec![shell(0.0, 0.0, 100.0), shell(10.0, 10.0, 20.0), shell(200.0, 0.0, 5.0)],
            vec![hole(12.0, 12.0, 2.0), hole(50.0, 50.0, 5.0)],
        );
        assert_eq!(polygons.len(), 3);
        assert_eq!(polygons[0].holes.len(), 1);
        assert_eq!(polygons[0].holes[0].x(0), 50.0);
        assert_eq!(polygons[1].holes.len(), 1);
        assert_eq!(polygons[1].holes[0].x(0), 12.0);
        assert!(polygons[2].holes.is_empty());
    }

    #[test]
    fn test_ring_with_no_points_is_corrupt() {
        use crate::shapefile::cursor::Endian;

        let square = shell(0.0, 0.0, 10.0);
        let mut buffer = RecordBuffer::with_capacity(256);
        buffer.set_endian(Endian::Little);
        buffer.write_zeros(32);
        buffer.write_i32(2);
        buffer.write_i32(square.size() as i32);
        // second ring starts where the first does
        buffer.write_i32(0);
        buffer.write_i32(0);
        for i in 0..square.size() {
            buffer.write_f64(square.x(i));
            buffer.write_f64(square.y(i));
        }
        let bytes = buffer.into_bytes();
        let mut cursor = ByteCursor::with_endian(&bytes, Endian::Little);
        assert!(matches!(
            decode(&mut cursor, ShapeType::Polygon, true, None),
            Err(ShapefileError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_orphan_hole_is_promoted() {
        let polygons = assign_holes_to_shells(
            vec![shell(0.0, 0.0, 10.0), shell(20.0, 0.0, 10.0)],
            vec![hole(100.0, 100.0, 4.0), hole(101.0, 101.0, 1.0)],
        );
        // first orphan becomes a shell, the second nests inside it
        assert_eq!(polygons.len(), 3);
        assert!(!is_ccw(&polygons[2].shell));
        assert_eq!(polygons[2].holes.len(), 1);
    }
}
