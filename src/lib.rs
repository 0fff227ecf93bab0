// shptiles - Shapefile geometry codec and tiled raster pyramids
// Binary .shp/.shx reading and writing, and multi-resolution tile mosaics with
// best-fit pyramid and mosaic selection

pub mod envelope;
pub mod pyramid;
pub mod shapefile;

pub use envelope::{Envelope, GeneralEnvelope};
