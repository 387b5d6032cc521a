//! QR code rendering for the pairing endpoint.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{GrayImage, Luma};
use qrcode::{Color, QrCode};
use whatsbox_core::AppError;

const MODULE_PX: u32 = 8;
const QUIET_ZONE_MODULES: u32 = 4;

/// Render a pairing code string as a base64-encoded PNG.
pub fn render_png_base64(code: &str) -> Result<String, AppError> {
    let qr = QrCode::new(code.as_bytes())
        .map_err(|err| AppError::internal(format!("QR encoding failed: {err}")))?;

    let modules = qr.width() as u32;
    let colors = qr.to_colors();
    let total = (modules + 2 * QUIET_ZONE_MODULES) * MODULE_PX;

    let mut img = GrayImage::from_pixel(total, total, Luma([255u8]));
    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = (index as u32 % modules + QUIET_ZONE_MODULES) * MODULE_PX;
        let my = (index as u32 / modules + QUIET_ZONE_MODULES) * MODULE_PX;
        for dy in 0..MODULE_PX {
            for dx in 0..MODULE_PX {
                img.put_pixel(mx + dx, my + dy, Luma([0u8]));
            }
        }
    }

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|err| AppError::internal(format!("QR PNG encoding failed: {err}")))?;

    Ok(BASE64.encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_png() {
        let encoded = render_png_base64("2@ABCDEF123456,deviceref,keyhash").unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        // PNG signature
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn different_codes_render_differently() {
        let a = render_png_base64("code-a").unwrap();
        let b = render_png_base64("code-b").unwrap();
        assert_ne!(a, b);
    }
}
