//! Core types for PDF rendering

use std::fmt;
use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::EngineError;

/// Page dimensions in PDF points at scale 1.0
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Document metadata reported once a load completes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Size of page 1, the reference for fit-to-width scaling
    pub first_page: PageSize,
}

/// Rendered page pixels.
///
/// RGB, 3 bytes per pixel, rows packed without padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Raster {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(EngineError::Pdf(format!(
                "raster buffer holds {} bytes, {width}x{height} RGB needs {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform-colour raster, handy for placeholders and tests
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, EngineError> {
        let image = image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| EngineError::Encode("raster does not match its dimensions".into()))?;

        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }

    /// PNG wrapped in a `data:` URI, embeddable directly as an image source
    pub fn to_data_uri(&self) -> Result<String, EngineError> {
        let png = self.encode_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}
