//! Image upload: the file the user picked, held in memory.
//!
//! The format is sniffed from the bytes so the multipart part carries the
//! right MIME type and obvious non-images are rejected before any request.

use crate::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    mime_type: &'static str,
    bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self::from_bytes(file_name, bytes)
    }

    /// Wrap in-memory image bytes.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(Error::InvalidImage(format!("{} is empty", file_name)));
        }
        let format = image::guess_format(&bytes)
            .map_err(|e| Error::InvalidImage(format!("{}: {}", file_name, e)))?;
        let mime_type = format.to_mime_type();
        log::info!(
            "[UPLOAD] {}: {:?}, {} bytes",
            file_name,
            format,
            bytes.len()
        );
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Tiny in-memory PNG for the unit tests.
#[cfg(test)]
pub(crate) fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 191, 165]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode sample png");
    png
}
