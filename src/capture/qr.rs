//! QR decoding over raw pixel buffers, plus rendering of the backend's
//! QR payload for terminal display.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, GrayImage};

/// Luma threshold separating dark QR modules from light background.
const LIGHT_THRESHOLD: u8 = 128;

/// Decode the first QR grid found in a grayscale frame.
pub fn decode_frame(frame: &GrayImage) -> Option<String> {
    let (width, height) = frame.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            frame.get_pixel(x as u32, y as u32)[0]
        });

    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
}

/// Decode the backend's `data:image/<fmt>;base64,` QR payload into an image.
pub fn decode_data_uri(payload: &str) -> Result<DynamicImage> {
    let encoded = payload
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, data)| data)
        .ok_or_else(|| anyhow!("QR payload is not a base64 data URI"))?;

    let bytes = BASE64
        .decode(encoded.trim())
        .context("QR payload is not valid base64")?;

    image::load_from_memory(&bytes).context("QR payload image did not decode")
}

/// Render an image as unicode half-block rows, light pixels drawn bright so
/// the code stays scannable off a dark terminal. Wide images are
/// nearest-neighbor downscaled to keep QR module edges crisp.
pub fn render_unicode(image: &DynamicImage, max_width: u32) -> Vec<String> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    let gray = if width > max_width {
        let scale = max_width as f32 / width as f32;
        let target_height = ((height as f32 * scale).round() as u32).max(1);
        image::imageops::resize(
            &gray,
            max_width,
            target_height,
            image::imageops::FilterType::Nearest,
        )
    } else {
        gray
    };

    let (width, height) = gray.dimensions();
    let light = |x: u32, y: u32| gray.get_pixel(x, y)[0] >= LIGHT_THRESHOLD;

    let mut rows = Vec::with_capacity(height.div_ceil(2) as usize);
    for y in (0..height).step_by(2) {
        let mut line = String::with_capacity(width as usize);
        for x in 0..width {
            let top = light(x, y);
            let bottom = if y + 1 < height { light(x, y + 1) } else { false };
            line.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        rows.push(line);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gray(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)]))
    }

    // --- render_unicode ---

    #[test]
    fn test_render_unicode_half_blocks() {
        // Column 0: light over dark; column 1: dark over light.
        let img = gray(2, 2, |x, y| if (x + y) % 2 == 0 { 255 } else { 0 });
        let rows = render_unicode(&DynamicImage::ImageLuma8(img), 80);
        assert_eq!(rows, vec!["▀▄".to_string()]);
    }

    #[test]
    fn test_render_unicode_odd_height_pads_bottom_dark() {
        let img = gray(1, 3, |_, _| 255);
        let rows = render_unicode(&DynamicImage::ImageLuma8(img), 80);
        assert_eq!(rows, vec!["█".to_string(), "▀".to_string()]);
    }

    #[test]
    fn test_render_unicode_downscales_wide_images() {
        let img = gray(200, 200, |_, _| 255);
        let rows = render_unicode(&DynamicImage::ImageLuma8(img), 50);
        assert!(rows.iter().all(|r| r.chars().count() <= 50));
    }

    // --- decode_data_uri ---

    #[test]
    fn test_decode_data_uri_roundtrip() {
        let img = gray(4, 4, |_, _| 0);
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let uri = format!("data:image/png;base64,{}", BASE64.encode(&png));

        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!(decoded.to_luma8().dimensions(), (4, 4));
    }

    #[test]
    fn test_decode_data_uri_rejects_plain_text() {
        assert!(decode_data_uri("tok-abc").is_err());
    }

    #[test]
    fn test_decode_data_uri_rejects_bad_base64() {
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
    }

    // --- decode_frame ---

    #[test]
    fn test_decode_frame_on_blank_image_finds_nothing() {
        let img = gray(64, 64, |_, _| 255);
        assert_eq!(decode_frame(&img), None);
    }

    #[test]
    fn test_decode_frame_reads_generated_code() {
        let frame = crate::capture::testing::qr_frame(
            r#"{"type":"attendance","sessionToken":"tok-abc"}"#,
        );
        assert_eq!(
            decode_frame(&frame).as_deref(),
            Some(r#"{"type":"attendance","sessionToken":"tok-abc"}"#)
        );
    }
}
