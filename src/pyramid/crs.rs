// Coordinate reference systems
// The CRS operations the resolver needs, and a table-driven registry of affine CRS relations

use std::collections::HashMap;
use std::fmt::Debug;

use super::addressing::AffineTransform2D;
use super::PyramidError;
use crate::envelope::Envelope;

/// A coordinate operation between two CRSs
pub trait MathTransform: Debug + Send + Sync {
    fn transform_point(&self, x: f64, y: f64) -> (f64, f64);

    fn is_identity(&self) -> bool;

    /// Bounding box of the transformed envelope corners
    fn transform_envelope(&self, envelope: &Envelope) -> Envelope {
        let mut out = Envelope::empty();
        if envelope.is_empty() {
            return out;
        }
        for (x, y) in [
            (envelope.min_x, envelope.min_y),
            (envelope.min_x, envelope.max_y),
            (envelope.max_x, envelope.min_y),
            (envelope.max_x, envelope.max_y),
        ] {
            let (tx, ty) = self.transform_point(x, y);
            out.expand_to_include(tx, ty);
        }
        out
    }
}

impl MathTransform for AffineTransform2D {
    fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        self.apply(x, y)
    }

    fn is_identity(&self) -> bool {
        AffineTransform2D::is_identity(self)
    }
}

/// CRS lookups and transforms consumed by the pyramid resolver
pub trait CrsService: Send + Sync {
    /// Area where the CRS is valid, expressed in its geographic CRS
    fn domain_of_validity(&self, crs: &str) -> Option<Envelope>;

    /// The geographic CRS a CRS is based on
    fn geographic_crs(&self, crs: &str) -> Result<String, PyramidError>;

    fn find_math_transform(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Box<dyn MathTransform>, PyramidError>;

    fn transform_envelope(
        &self,
        envelope: &Envelope,
        source: &str,
        target: &str,
    ) -> Result<Envelope, PyramidError> {
        Ok(self.find_math_transform(source, target)?.transform_envelope(envelope))
    }

    /// Same CRS once names and other metadata are ignored
    fn equals_ignore_metadata(&self, a: &str, b: &str) -> bool;
}

/// One registered CRS
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    /// Geographic CRS this one is derived from; itself for a geographic CRS
    pub base: String,
    /// Maps coordinates of this CRS to the base CRS
    pub to_base: AffineTransform2D,
    /// Validity area in base coordinates
    pub domain: Option<Envelope>,
}

/// CRS table where every projected CRS relates to its geographic base by an
/// affine transform
#[derive(Debug, Clone, Default)]
pub struct CrsRegistry {
    definitions: HashMap<String, CrsDefinition>,
    aliases: HashMap<String, String>,
}

impl CrsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geographic CRS
    pub fn define_geographic(&mut self, code: &str, domain: Option<Envelope>) {
        self.definitions.insert(
            code.to_string(),
            CrsDefinition {
                base: code.to_string(),
                to_base: AffineTransform2D::identity(),
                domain,
            },
        );
    }

    /// Register a CRS derived from `base`
    pub fn define(
        &mut self,
        code: &str,
        base: &str,
        to_base: AffineTransform2D,
        domain: Option<Envelope>,
    ) {
        self.definitions.insert(
            code.to_string(),
            CrsDefinition {
                base: base.to_string(),
                to_base,
                domain,
            },
        );
    }

    /// Another name for a registered CRS
    pub fn alias(&mut self, alias: &str, code: &str) {
        self.aliases.insert(alias.to_string(), code.to_string());
    }

    fn canonical<'a>(&'a self, code: &'a str) -> &'a str {
        self.aliases.get(code).map(|s| s.as_str()).unwrap_or(code)
    }

    pub fn definition(&self, code: &str) -> Result<&CrsDefinition, PyramidError> {
        self.definitions
            .get(self.canonical(code))
            .ok_or_else(|| PyramidError::Crs(format!("unknown CRS {}", code)))
    }
}

impl CrsService for CrsRegistry {
    fn domain_of_validity(&self, crs: &str) -> Option<Envelope> {
        self.definition(crs).ok().and_then(|d| d.domain)
    }

    fn geographic_crs(&self, crs: &str) -> Result<String, PyramidError> {
        Ok(self.definition(crs)?.base.clone())
    }

    fn find_math_transform(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Box<dyn MathTransform>, PyramidError> {
        let src = self.definition(source)?;
        let dst = self.definition(target)?;
        if src.base != dst.base {
            return Err(PyramidError::Crs(format!(
                "no operation from {} ({}) to {} ({})",
                source, src.base, target, dst.base
            )));
        }
        let from_base = dst.to_base.inverse().ok_or_else(|| {
            PyramidError::Crs(format!("{} has a singular transform", target))
        })?;
        Ok(Box::new(from_base.then(&src.to_base)))
    }

    fn equals_ignore_metadata(&self, a: &str, b: &str) -> bool {
        if self.canonical(a) == self.canonical(b) {
            return true;
        }
        match (self.definition(a), self.definition(b)) {
            (Ok(da), Ok(db)) => da.base == db.base && da.to_base == db.to_base,
            _ => false,
        }
    }
}
