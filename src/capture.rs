use image::RgbaImage;

use crate::{
    assets::decode::decode_image,
    foundation::{
        core::CropRegion,
        error::{TickerError, TickerResult},
    },
    remote::RemoteBrowser,
};

/// Encoded screenshot of the active view, not yet decoded.
#[derive(Clone, Debug)]
pub struct RawCapture {
    png: Vec<u8>,
    region: CropRegion,
}

impl RawCapture {
    pub fn new(png: Vec<u8>, region: CropRegion) -> Self {
        Self { png, region }
    }

    /// Decodes the screenshot and crops it to the chart region. Needs no
    /// access to the browser, so it runs after the pool lock is released.
    pub fn into_snapshot(self) -> TickerResult<RgbaImage> {
        let page = decode_image(&self.png).map_err(|e| {
            TickerError::capture(format!("screenshot is not a decodable image: {e}"))
        })?;
        crop_to_region(&page, self.region)
    }
}

/// Screenshots the active view. Must be called with the session pool lock held.
pub fn capture_screenshot(
    browser: &mut dyn RemoteBrowser,
    region: CropRegion,
) -> TickerResult<RawCapture> {
    Ok(RawCapture::new(browser.screenshot()?, region))
}

/// Crops `page` to `region`, clamped to the page bounds.
pub fn crop_to_region(page: &RgbaImage, region: CropRegion) -> TickerResult<RgbaImage> {
    let (pw, ph) = page.dimensions();
    if region.left >= pw || region.top >= ph {
        return Err(TickerError::capture(format!(
            "crop origin ({}, {}) lies outside the {pw}x{ph} screenshot",
            region.left, region.top
        )));
    }
    let w = region.width().min(pw - region.left);
    let h = region.height().min(ph - region.top);
    if w < region.width() || h < region.height() {
        tracing::warn!(
            page_w = pw,
            page_h = ph,
            "screenshot smaller than crop region; snapshot is clamped"
        );
    }
    Ok(image::imageops::crop_imm(page, region.left, region.top, w, h).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeBrowser;

    fn page(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| image::Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn crop_takes_the_configured_box() {
        let region = CropRegion::new(10, 20, 40, 60).unwrap();
        let out = crop_to_region(&page(100, 100), region).unwrap();
        assert_eq!(out.dimensions(), (30, 40));
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 0, 255]);
        assert_eq!(out.get_pixel(29, 39).0, [39, 59, 0, 255]);
    }

    #[test]
    fn crop_clamps_to_page_and_rejects_outside_origin() {
        let region = CropRegion::new(50, 50, 200, 200).unwrap();
        let out = crop_to_region(&page(100, 80), region).unwrap();
        assert_eq!(out.dimensions(), (50, 30));

        let region = CropRegion::new(120, 0, 200, 10).unwrap();
        assert!(crop_to_region(&page(100, 80), region).is_err());
    }

    #[test]
    fn capture_reads_one_screenshot() {
        let mut browser = FakeBrowser::new(&page(64, 64)).unwrap();
        let observer = browser.clone();
        let region = CropRegion::new(4, 4, 20, 12).unwrap();
        let snap = capture_screenshot(&mut browser, region)
            .unwrap()
            .into_snapshot()
            .unwrap();
        assert_eq!(snap.dimensions(), (16, 8));
        assert_eq!(observer.counters().screenshots, 1);
    }

    #[test]
    fn capture_defers_decoding_until_snapshot_is_requested() {
        let mut browser = FakeBrowser::new(&page(8, 8)).unwrap();
        browser.set_screenshot_bytes(b"not a png".to_vec());
        let region = CropRegion::new(0, 0, 4, 4).unwrap();
        let raw = capture_screenshot(&mut browser, region).unwrap();
        let err = raw.into_snapshot().unwrap_err();
        assert!(err.to_string().contains("capture error"));
    }
}
