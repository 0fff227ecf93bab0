// Tile pixels
// In-memory tile images, PNG encoding, lazy tile references and the pixel layout
// derived from a pyramid's stored sample description

use std::io::Cursor;
use std::sync::Arc;

use super::PyramidError;

/// Storage state of one tile slot. Missing and empty are both normal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Never written
    Missing,
    /// Written with no content
    Empty,
    /// Written with pixel data
    Present,
}

/// Address of one tile in a store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub mosaic_id: String,
    pub col: u32,
    pub row: u32,
}

impl TileKey {
    pub fn new(mosaic_id: &str, col: u32, row: u32) -> Self {
        Self {
            mosaic_id: mosaic_id.to_string(),
            col,
            row,
        }
    }
}

/// 8-bit interleaved pixels, `bands` samples per pixel, rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    width: u32,
    height: u32,
    bands: u8,
    data: Vec<u8>,
}

impl TileImage {
    pub fn new(width: u32, height: u32, bands: u8) -> Self {
        Self::filled(width, height, bands, 0)
    }

    /// Image with every sample set to `value`
    pub fn filled(width: u32, height: u32, bands: u8, value: u8) -> Self {
        let len = width as usize * height as usize * bands as usize;
        Self {
            width,
            height,
            bands,
            data: vec![value; len],
        }
    }

    pub fn from_raw(width: u32, height: u32, bands: u8, data: Vec<u8>) -> Result<Self, PyramidError> {
        let expected = width as usize * height as usize * bands as usize;
        if bands == 0 || data.len() != expected {
            return Err(PyramidError::InvalidTile(format!(
                "{}x{}x{} image needs {} bytes, got {}",
                width,
                height,
                bands,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bands,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> u8 {
        self.bands
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.bands as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = self.offset(x, y);
        Some(&self.data[start..start + self.bands as usize])
    }

    /// Write one pixel; out-of-bounds writes and short samples are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, samples: &[u8]) {
        if x >= self.width || y >= self.height || samples.len() < self.bands as usize {
            return;
        }
        let start = self.offset(x, y);
        let bands = self.bands as usize;
        self.data[start..start + bands].copy_from_slice(&samples[..bands]);
    }

    /// Copy a `width` x `height` block from `src` at (`src_x`, `src_y`) to
    /// (`dst_x`, `dst_y`). The block is clipped against both images; the
    /// number of pixels copied is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn blit(
        &mut self,
        src: &TileImage,
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        dst_x: u32,
        dst_y: u32,
    ) -> Result<u64, PyramidError> {
        if src.bands != self.bands {
            return Err(PyramidError::InvalidTile(format!(
                "cannot copy {} band pixels into a {} band image",
                src.bands, self.bands
            )));
        }
        let w = width
            .min(src.width.saturating_sub(src_x))
            .min(self.width.saturating_sub(dst_x));
        let h = height
            .min(src.height.saturating_sub(src_y))
            .min(self.height.saturating_sub(dst_y));
        if w == 0 || h == 0 {
            return Ok(0);
        }

        let row_bytes = w as usize * self.bands as usize;
        for row in 0..h {
            let from = src.offset(src_x, src_y + row);
            let to = self.offset(dst_x, dst_y + row);
            self.data[to..to + row_bytes].copy_from_slice(&src.data[from..from + row_bytes]);
        }
        Ok(w as u64 * h as u64)
    }

    /// Sub-image of the given size at (`x`, `y`); pixels outside this image are zero
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> TileImage {
        let mut out = TileImage::new(width, height, self.bands);
        // bands always match
        let _ = out.blit(self, x, y, width, height, 0, 0);
        out
    }

    /// All samples zero
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, PyramidError> {
        let color = match self.bands {
            1 => png::ColorType::Grayscale,
            2 => png::ColorType::GrayscaleAlpha,
            3 => png::ColorType::Rgb,
            4 => png::ColorType::Rgba,
            n => {
                return Err(PyramidError::Png(format!("cannot encode {} bands as PNG", n)));
            }
        };

        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Fast);

            let mut writer = encoder
                .write_header()
                .map_err(|e| PyramidError::Png(e.to_string()))?;
            writer
                .write_image_data(&self.data)
                .map_err(|e| PyramidError::Png(e.to_string()))?;
        }
        Ok(png_data)
    }

    /// Decode a PNG into 8-bit samples. Palette and low bit depths are expanded,
    /// 16-bit samples are stripped to 8.
    pub fn decode_png(bytes: &[u8]) -> Result<Self, PyramidError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| PyramidError::Png(e.to_string()))?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| PyramidError::Png(e.to_string()))?;
        if info.bit_depth != png::BitDepth::Eight {
            return Err(PyramidError::Png(format!(
                "unsupported bit depth {:?}",
                info.bit_depth
            )));
        }
        let bands = info.color_type.samples() as u8;
        buf.truncate(info.buffer_size());
        TileImage::from_raw(info.width, info.height, bands, buf)
    }
}

/// Source of stored tile pixels addressed by an opaque index
pub trait TileReader: Send + Sync {
    fn read(&self, index: usize) -> Result<TileImage, PyramidError>;
}

/// One tile's pixels: already decoded, or a reader plus the index to fetch
pub enum TileReference {
    Image(TileImage),
    Stored {
        reader: Arc<dyn TileReader>,
        index: usize,
    },
}

impl TileReference {
    /// Materialise the pixels, consuming the reference
    pub fn load(self) -> Result<TileImage, PyramidError> {
        match self {
            TileReference::Image(image) => Ok(image),
            TileReference::Stored { reader, index } => reader.read(index),
        }
    }
}

impl std::fmt::Debug for TileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileReference::Image(image) => f
                .debug_tuple("Image")
                .field(&(image.width(), image.height(), image.bands()))
                .finish(),
            TileReference::Stored { index, .. } => {
                f.debug_struct("Stored").field("index", index).finish()
            }
        }
    }
}

/// Colour interpretation of the bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKind {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

/// Pixel layout derived from a pyramid's stored band count and sample depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub bands: u8,
    pub bits_per_sample: u8,
    pub color: ColorKind,
    pub bytes_per_pixel: usize,
}

impl PixelLayout {
    pub fn derive(bands: u8, bits_per_sample: u8) -> Result<Self, PyramidError> {
        let color = match bands {
            1 => ColorKind::Gray,
            2 => ColorKind::GrayAlpha,
            3 => ColorKind::Rgb,
            4 => ColorKind::Rgba,
            n => return Err(PyramidError::InvalidTile(format!("unsupported band count {}", n))),
        };
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(PyramidError::InvalidTile(format!(
                "unsupported sample depth {}",
                bits_per_sample
            )));
        }
        Ok(Self {
            bands,
            bits_per_sample,
            color,
            bytes_per_pixel: bands as usize * bits_per_sample as usize / 8,
        })
    }

    /// Layout of a decoded tile
    pub fn of_image(image: &TileImage) -> Result<Self, PyramidError> {
        Self::derive(image.bands(), 8)
    }
}
