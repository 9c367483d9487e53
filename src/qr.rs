//! Scannable QR images for session check-in links.

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;

pub const PNG_MIME: &str = "image/png";

/// Smallest edge of the rendered image in pixels, quiet zone included.
const MIN_EDGE_PX: u32 = 240;

/// Renders `payload` as a black-on-white PNG.
pub fn render_png(payload: &str) -> anyhow::Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| anyhow!("failed to encode QR payload: {e:?}"))?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_EDGE_PX, MIN_EDGE_PX)
        .build();
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to write QR PNG")?;
    Ok(bytes)
}

pub fn to_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_qr(png: &[u8]) -> String {
        let luma = image::load_from_memory_with_format(png, ImageFormat::Png)
            .expect("decode png")
            .to_luma8();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            luma.width() as usize,
            luma.height() as usize,
            |x, y| luma.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one QR code");
        let (_, content) = grids[0].decode().expect("decode qr");
        content
    }

    #[test]
    fn png_scans_back_to_the_checkin_url() {
        let url = "http://your-attendance-server.com/checkin?session=AB12CD34";
        let png = render_png(url).expect("render");
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        assert_eq!(decode_qr(&png), url);

        let img = image::load_from_memory(&png).expect("decode png");
        assert!(img.width() >= MIN_EDGE_PX && img.height() >= MIN_EDGE_PX);
    }

    #[test]
    fn base64_keeps_the_png_signature() {
        assert!(to_base64(b"\x89PNG\r\n\x1a\n").starts_with("iVBORw0KGgo"));
    }
}
