//! QR code rendering for attendance tokens.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::{Result, SeamsError};

/// Render `text` as a PNG QR code and return it as a `data:` URL that a
/// browser can drop straight into an `<img src>`.
pub fn render_png_data_url(text: &str) -> Result<String> {
    let png = render_png(text)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

/// Render `text` as PNG bytes.
pub fn render_png(text: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M)
        .map_err(|e| SeamsError::QrRenderError(e.to_string()))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| SeamsError::QrRenderError(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_png_has_png_signature() {
        let png = render_png("hello").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_data_url_prefix() {
        let url = render_png_data_url("seams").unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }
}
