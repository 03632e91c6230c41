//! Upload decoding and output encoding.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageEncoder, RgbImage};
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Encoded format for annotated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg {
        quality: u8,
    },
}

impl OutputFormat {
    /// Pick a format from an output path extension; PNG unless it says JPEG.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => OutputFormat::Jpeg { quality: 90 },
            _ => OutputFormat::Png,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// Decode uploaded bytes. The format is sniffed from the content, not the
/// filename.
pub fn decode_image(bytes: &[u8]) -> MediaResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(MediaError::Decode("empty upload".to_string()));
    }
    let img = image::load_from_memory(bytes)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(MediaError::Decode("image has no pixels".to_string()));
    }
    Ok(img)
}

/// Encode an RGB image.
pub fn encode_image(img: &RgbImage, format: OutputFormat) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    let (w, h) = img.dimensions();
    let result = match format {
        OutputFormat::Png => PngEncoder::new(&mut buf).write_image(img.as_raw(), w, h, ColorType::Rgb8),
        OutputFormat::Jpeg { quality } => {
            JpegEncoder::new_with_quality(&mut buf, quality).write_image(img.as_raw(), w, h, ColorType::Rgb8)
        }
    };
    result.map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buf)
}
