// Pyramid resolver
// Picks the pyramid that best covers a target CRS, then the mosaic level that
// best fits a requested resolution within a tile budget

use log::{debug, warn};

use super::addressing::scale_matches;
use super::crs::CrsService;
use super::model::{Mosaic, Pyramid, PyramidSet};
use super::PyramidError;
use crate::envelope::{axis_overlap, Envelope, GeneralEnvelope};

/// Overlap ratios closer than this are ties
const RATIO_EPSILON: f64 = 1e-12;

/// Summed per-axis coverage of `reference` by `envelope` over the horizontal axes
fn horizontal_overlap(envelope: &Envelope, reference: &Envelope) -> f64 {
    axis_overlap(envelope.min_x, envelope.max_x, reference.min_x, reference.max_x)
        + axis_overlap(envelope.min_y, envelope.max_y, reference.min_y, reference.max_y)
}

/// Pyramid whose validity area best covers the validity area of `target_crs`.
///
/// Pyramids without a validity area are candidates everywhere. Ties go to a
/// pyramid whose CRS equals the target, then to the lowest pyramid id. An empty
/// set yields `None`; if no pyramid qualifies the lowest-id pyramid is returned.
pub fn find_pyramid<'a>(
    set: &'a PyramidSet,
    target_crs: &str,
    crs: &dyn CrsService,
) -> Option<&'a Pyramid> {
    let mut ordered: Vec<&Pyramid> = set.pyramids.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    let first = *ordered.first()?;

    let target_domain = crs.domain_of_validity(target_crs);
    let target_geographic = crs.geographic_crs(target_crs).ok();

    let mut best_ratio = 0.0;
    let mut ranked: Vec<&Pyramid> = Vec::new();
    let mut universal: Vec<&Pyramid> = Vec::new();

    for pyramid in ordered {
        let domain = match crs.domain_of_validity(&pyramid.crs) {
            Some(domain) => domain,
            None => {
                universal.push(pyramid);
                continue;
            }
        };
        let (target_domain, target_geographic) = match (&target_domain, &target_geographic) {
            (Some(d), Some(g)) => (d, g),
            _ => {
                // nothing to measure against
                universal.push(pyramid);
                continue;
            }
        };
        let projected = crs
            .geographic_crs(&pyramid.crs)
            .and_then(|source| crs.transform_envelope(&domain, &source, target_geographic));
        let projected = match projected {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Skipping pyramid {}: {}", pyramid.id, e);
                continue;
            }
        };

        let ratio = horizontal_overlap(&projected, target_domain);
        debug!("Pyramid {} covers target domain at ratio {:.6}", pyramid.id, ratio);
        if ratio <= 0.0 {
            continue;
        }
        if ratio > best_ratio + RATIO_EPSILON {
            best_ratio = ratio;
            ranked.clear();
            ranked.push(pyramid);
        } else if (ratio - best_ratio).abs() <= RATIO_EPSILON {
            ranked.push(pyramid);
        }
    }

    let mut candidates = ranked;
    candidates.extend(universal);
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    for &pyramid in &candidates {
        let identity = crs
            .find_math_transform(&pyramid.crs, target_crs)
            .map(|t| t.is_identity())
            .unwrap_or(false);
        if identity || crs.equals_ignore_metadata(&pyramid.crs, target_crs) {
            debug!("Pyramid {} matches target CRS {}", pyramid.id, target_crs);
            return Some(pyramid);
        }
    }
    Some(candidates.first().copied().unwrap_or(first))
}

/// Coverage of the query's extra axes (past the horizontal two) by a mosaic's slice.
/// An extra axis the mosaic does not define counts as covered.
fn slice_overlap(mosaic: &Mosaic, envelope: &GeneralEnvelope) -> f64 {
    (2..envelope.dimension())
        .map(|axis| match mosaic.upper_left.get(axis) {
            Some(&v) => axis_overlap(v, v, envelope.lower(axis), envelope.upper(axis)),
            None => 1.0,
        })
        .sum()
}

/// Mosaic of `pyramid` to read `envelope` at `resolution` (world units per pixel).
///
/// For envelopes with more than two axes only the mosaics whose slice best
/// matches the extra axes are considered. The levels are walked from coarsest
/// to finest; the walk stops at the first level whose scale is within
/// `tolerance` (a fraction) of `resolution` on either side, or steps back one
/// level when a level needs more than `max_tiles` tiles (0 disables the
/// budget). Without a stop the finest level is returned.
pub fn find_mosaic<'a>(
    pyramid: &'a Pyramid,
    resolution: f64,
    tolerance: f64,
    envelope: &GeneralEnvelope,
    max_tiles: usize,
) -> Option<&'a Mosaic> {
    let mut candidates: Vec<&Mosaic> = pyramid.mosaics.iter().collect();

    if envelope.dimension() > 2 {
        let mut best_ratio = 0.0;
        let mut matching = Vec::new();
        for mosaic in candidates {
            let ratio = slice_overlap(mosaic, envelope);
            if ratio <= 0.0 {
                continue;
            }
            if ratio > best_ratio + RATIO_EPSILON {
                best_ratio = ratio;
                matching.clear();
                matching.push(mosaic);
            } else if (ratio - best_ratio).abs() <= RATIO_EPSILON {
                matching.push(mosaic);
            }
        }
        candidates = matching;
    }

    if candidates.len() <= 1 {
        return candidates.first().copied();
    }

    candidates.sort_by(|a, b| b.scale.total_cmp(&a.scale).then_with(|| a.id.cmp(&b.id)));

    let mut previous: Option<&Mosaic> = None;
    for &mosaic in &candidates {
        if max_tiles > 0 {
            let tiles = mosaic.estimated_tiles(envelope);
            if tiles > max_tiles as f64 {
                debug!(
                    "Mosaic at scale {} needs {} tiles, over budget {}",
                    mosaic.scale, tiles, max_tiles
                );
                return Some(previous.unwrap_or(mosaic));
            }
        }
        if scale_matches(mosaic.scale, resolution, tolerance) {
            return Some(mosaic);
        }
        previous = Some(mosaic);
    }
    candidates.last().copied()
}

/// Pyramid and mosaic selection with fixed tolerance and tile budget
pub struct PyramidResolver<'a> {
    crs: &'a dyn CrsService,
    /// Fraction of the requested resolution a mosaic scale may differ by
    pub tolerance: f64,
    /// Most tiles one read may touch; 0 for no limit
    pub max_tiles: usize,
}

impl<'a> PyramidResolver<'a> {
    pub fn new(crs: &'a dyn CrsService) -> Self {
        Self {
            crs,
            tolerance: 0.1,
            max_tiles: 0,
        }
    }

    pub fn with_budget(mut self, tolerance: f64, max_tiles: usize) -> Self {
        self.tolerance = tolerance;
        self.max_tiles = max_tiles;
        self
    }

    /// Best pyramid and mosaic for a read of `envelope` in `target_crs`
    pub fn resolve<'s>(
        &self,
        set: &'s PyramidSet,
        target_crs: &str,
        resolution: f64,
        envelope: &GeneralEnvelope,
    ) -> Result<(&'s Pyramid, &'s Mosaic), PyramidError> {
        let pyramid = find_pyramid(set, target_crs, self.crs).ok_or_else(|| {
            PyramidError::PyramidNotFound(format!("no pyramid for CRS {}", target_crs))
        })?;
        let mosaic = find_mosaic(pyramid, resolution, self.tolerance, envelope, self.max_tiles)
            .ok_or_else(|| {
                PyramidError::MosaicNotFound(format!(
                    "no mosaic in pyramid {} for resolution {}",
                    pyramid.id, resolution
                ))
            })?;
        debug!(
            "Resolved pyramid {} mosaic {} (scale {})",
            pyramid.id, mosaic.id, mosaic.scale
        );
        Ok((pyramid, mosaic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::addressing::AffineTransform2D;
    use crate::pyramid::crs::CrsRegistry;

    fn scaled_pyramid(scales: &[f64]) -> Pyramid {
        let mut pyramid = Pyramid::with_id("p", "EPSG:4326");
        for &scale in scales {
            let tiles = (1024.0 / (256.0 * scale)).ceil().max(1.0) as u32;
            pyramid.add_mosaic(vec![0.0, 1024.0], (tiles, tiles), (256, 256), scale);
        }
        pyramid
    }

    fn query() -> GeneralEnvelope {
        GeneralEnvelope::new(vec![0.0, 0.0], vec![1024.0, 1024.0])
    }

    #[test]
    fn test_find_mosaic_by_resolution() {
        let pyramid = scaled_pyramid(&[1.0, 2.0, 4.0, 8.0]);
        let m = find_mosaic(&pyramid, 1.05, 0.1, &query(), 0).unwrap();
        assert_eq!(m.scale, 1.0);
        let m = find_mosaic(&pyramid, 4.2, 0.1, &query(), 0).unwrap();
        assert_eq!(m.scale, 4.0);
        // no level within tolerance falls through to the finest
        let m = find_mosaic(&pyramid, 100.0, 0.1, &query(), 0).unwrap();
        assert_eq!(m.scale, 1.0);
        let m = find_mosaic(&pyramid, 2.5, 0.1, &query(), 0).unwrap();
        assert_eq!(m.scale, 1.0);
        // finer than every level requested
        let m = find_mosaic(&pyramid, 0.1, 0.1, &query(), 0).unwrap();
        assert_eq!(m.scale, 1.0);
    }

    #[test]
    fn test_find_mosaic_tile_budget() {
        let pyramid = scaled_pyramid(&[1.0, 2.0, 4.0, 8.0]);
        // scale 1 needs 16 tiles, scale 2 needs 4
        let m = find_mosaic(&pyramid, 1.0, 0.1, &query(), 4).unwrap();
        assert_eq!(m.scale, 2.0);
        let m = find_mosaic(&pyramid, 1.0, 0.1, &query(), 16).unwrap();
        assert_eq!(m.scale, 1.0);
        // the budget still stops a walk that finds no match
        let m = find_mosaic(&pyramid, 100.0, 0.1, &query(), 4).unwrap();
        assert_eq!(m.scale, 2.0);
        // a budget even the coarsest level exceeds returns the coarsest
        let big = GeneralEnvelope::new(vec![0.0, 0.0], vec![1e6, 1e6]);
        let m = find_mosaic(&pyramid, 1.0, 0.1, &big, 1).unwrap();
        assert_eq!(m.scale, 8.0);
    }

    #[test]
    fn test_single_mosaic_short_circuits() {
        let pyramid = scaled_pyramid(&[4.0]);
        let m = find_mosaic(&pyramid, 0.001, 0.0, &query(), 1).unwrap();
        assert_eq!(m.scale, 4.0);
        assert!(find_mosaic(&Pyramid::with_id("e", "EPSG:4326"), 1.0, 0.1, &query(), 0).is_none());
    }

    #[test]
    fn test_find_mosaic_by_slice() {
        let mut pyramid = Pyramid::with_id("p", "EPSG:4326");
        for (scale, elevation) in [(1.0, 0.0), (2.0, 0.0), (1.0, 500.0), (2.0, 500.0)] {
            pyramid.add_mosaic(vec![0.0, 1024.0, elevation], (4, 4), (256, 256), scale);
        }
        let query = GeneralEnvelope::new(vec![0.0, 0.0, 400.0], vec![1024.0, 1024.0, 600.0]);
        let m = find_mosaic(&pyramid, 1.0, 0.1, &query, 0).unwrap();
        assert_eq!(m.scale, 1.0);
        assert_eq!(m.upper_left[2], 500.0);

        let nowhere = GeneralEnvelope::new(vec![0.0, 0.0, 900.0], vec![1024.0, 1024.0, 1000.0]);
        assert!(find_mosaic(&pyramid, 1.0, 0.1, &nowhere, 0).is_none());
    }

    fn registry() -> CrsRegistry {
        let mut registry = CrsRegistry::new();
        registry.define_geographic("EPSG:4326", Some(Envelope::new(-180.0, -90.0, 180.0, 90.0)));
        registry.define(
            "NZ:local",
            "EPSG:4326",
            AffineTransform2D::scale_translate(0.001, 0.001, 165.0, -48.0),
            Some(Envelope::new(165.0, -48.0, 180.0, -33.0)),
        );
        registry.define(
            "WORLD:merc",
            "EPSG:4326",
            AffineTransform2D::scale_translate(1e-5, 1e-5, 0.0, 0.0),
            Some(Envelope::new(-180.0, -85.0, 180.0, 85.0)),
        );
        registry
    }

    #[test]
    fn test_find_pyramid_by_overlap() {
        let registry = registry();
        let mut set = PyramidSet::new();
        set.add_pyramid(Pyramid::with_id("a-nz", "NZ:local"));
        set.add_pyramid(Pyramid::with_id("b-world", "WORLD:merc"));

        let found = find_pyramid(&set, "EPSG:4326", &registry).unwrap();
        assert_eq!(found.id, "b-world");

        let found = find_pyramid(&set, "NZ:local", &registry).unwrap();
        assert_eq!(found.id, "a-nz");
    }

    #[test]
    fn test_find_pyramid_prefers_same_crs() {
        let mut registry = registry();
        registry.define(
            "WORLD:half",
            "EPSG:4326",
            AffineTransform2D::scale_translate(0.5, 0.5, 0.0, 0.0),
            Some(Envelope::new(-180.0, -90.0, 180.0, 90.0)),
        );
        let mut set = PyramidSet::new();
        set.add_pyramid(Pyramid::with_id("a", "WORLD:half"));
        set.add_pyramid(Pyramid::with_id("b", "EPSG:4326"));
        // equal coverage; "a" sorts first but only "b" is the target CRS
        let found = find_pyramid(&set, "EPSG:4326", &registry).unwrap();
        assert_eq!(found.id, "b");
    }

    #[test]
    fn test_find_pyramid_fallbacks() {
        let registry = registry();
        assert!(find_pyramid(&PyramidSet::new(), "EPSG:4326", &registry).is_none());

        let mut set = PyramidSet::new();
        set.add_pyramid(Pyramid::with_id("z", "UNKNOWN:1"));
        set.add_pyramid(Pyramid::with_id("y", "UNKNOWN:2"));
        // no domain for either: both are universal, lowest id wins
        let found = find_pyramid(&set, "EPSG:4326", &registry).unwrap();
        assert_eq!(found.id, "y");
    }

    #[test]
    fn test_resolver_errors() {
        let registry = registry();
        let resolver = PyramidResolver::new(&registry).with_budget(0.1, 0);
        let empty = PyramidSet::new();
        assert!(matches!(
            resolver.resolve(&empty, "EPSG:4326", 1.0, &query()),
            Err(PyramidError::PyramidNotFound(_))
        ));

        let mut set = PyramidSet::new();
        set.add_pyramid(Pyramid::with_id("p", "EPSG:4326"));
        assert!(matches!(
            resolver.resolve(&set, "EPSG:4326", 1.0, &query()),
            Err(PyramidError::MosaicNotFound(_))
        ));

        set.pyramids[0].add_mosaic(vec![0.0, 1024.0], (4, 4), (256, 256), 1.0);
        let (pyramid, mosaic) = resolver.resolve(&set, "EPSG:4326", 1.0, &query()).unwrap();
        assert_eq!(pyramid.id, "p");
        assert_eq!(mosaic.scale, 1.0);
    }
}
