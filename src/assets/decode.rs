use std::path::Path;

use anyhow::Context;
use image::{RgbaImage, imageops::FilterType};

use crate::foundation::{
    core::Canvas,
    error::{TickerError, TickerResult},
};

/// Decodes any format the `image` crate understands into straight-alpha RGBA8.
pub fn decode_image(bytes: &[u8]) -> TickerResult<RgbaImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(dyn_img.to_rgba8())
}

pub fn read_image(path: &Path) -> TickerResult<RgbaImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image(&bytes)
        .map_err(|e| TickerError::asset(format!("decode '{}': {e}", path.display())))
}

/// Resizes to exactly `canvas`, leaving already-matching images untouched.
pub fn fit_to_canvas(img: RgbaImage, canvas: Canvas) -> RgbaImage {
    if img.dimensions() == (canvas.width, canvas.height) {
        return img;
    }
    image::imageops::resize(&img, canvas.width, canvas.height, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_image_png_dimensions_and_pixels() {
        let img = image::RgbaImage::from_raw(1, 1, vec![100u8, 50u8, 200u8, 128u8]).unwrap();

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&buf).unwrap();
        assert_eq!(decoded.dimensions(), (1, 1));
        assert_eq!(decoded.as_raw().as_slice(), &[100u8, 50u8, 200u8, 128u8]);
    }

    #[test]
    fn decode_image_rejects_garbage() {
        assert!(decode_image(b"not an image").is_err());
    }

    #[test]
    fn fit_to_canvas_resizes_only_when_needed() {
        let canvas = Canvas {
            width: 8,
            height: 4,
        };
        let same = RgbaImage::from_pixel(8, 4, image::Rgba([9, 9, 9, 255]));
        assert_eq!(fit_to_canvas(same.clone(), canvas), same);

        let big = RgbaImage::from_pixel(32, 32, image::Rgba([9, 9, 9, 255]));
        assert_eq!(fit_to_canvas(big, canvas).dimensions(), (8, 4));
    }
}
