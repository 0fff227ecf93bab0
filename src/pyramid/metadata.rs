// Pyramid metadata persistence
// Saves and loads pyramid and mosaic descriptors as XML

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::model::PyramidSet;
use super::PyramidError;

/// Durable storage for pyramid descriptors
pub trait MetadataStore: Send + Sync {
    fn save(&self, set: &PyramidSet) -> Result<(), PyramidError>;

    /// Stored descriptors; an empty set when nothing was saved yet
    fn load(&self) -> Result<PyramidSet, PyramidError>;
}

pub fn to_xml(set: &PyramidSet) -> Result<String, PyramidError> {
    Ok(quick_xml::se::to_string(set)?)
}

pub fn from_xml(xml: &str) -> Result<PyramidSet, PyramidError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// Descriptors kept in a standalone XML file
#[derive(Debug, Clone)]
pub struct XmlMetadataStore {
    path: PathBuf,
}

impl XmlMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataStore for XmlMetadataStore {
    fn save(&self, set: &PyramidSet) -> Result<(), PyramidError> {
        let xml = to_xml(set)?;
        // write beside the target, then swap in
        let tmp = self.path.with_extension("xml.tmp");
        fs::write(&tmp, xml)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved {} pyramids to {:?}", set.len(), self.path);
        Ok(())
    }

    fn load(&self) -> Result<PyramidSet, PyramidError> {
        match fs::read_to_string(&self.path) {
            Ok(xml) => from_xml(&xml),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PyramidSet::new()),
            Err(e) => Err(e.into()),
        }
    }
}
