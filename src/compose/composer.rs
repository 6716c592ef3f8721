use image::{RgbaImage, imageops::FilterType};
use rayon::prelude::*;

use crate::{
    assets::BaseFrames,
    compose::{
        caption::Captions,
        composite::{paste_with_alpha_mask, set_alpha},
    },
    config::{OverlaySettings, Settings},
    encode_gif::{GifConfig, encode_looping_gif},
    foundation::{
        core::{Trend, ViewWindow},
        error::{TickerError, TickerResult},
    },
};

/// Builds the animated artifact from a snapshot and a trend.
#[derive(Clone, Debug)]
pub struct FrameComposer {
    base: BaseFrames,
    captions: Captions,
    overlay: OverlaySettings,
    gif: GifConfig,
}

impl FrameComposer {
    pub fn new(
        base: BaseFrames,
        captions: Captions,
        overlay: OverlaySettings,
        gif: GifConfig,
    ) -> TickerResult<Self> {
        gif.validate()?;
        Ok(Self {
            base,
            captions,
            overlay,
            gif,
        })
    }

    pub fn from_settings(
        base: BaseFrames,
        font: &fontdue::Font,
        settings: &Settings,
    ) -> TickerResult<Self> {
        let captions = Captions::render(font, settings)?;
        Self::new(
            base,
            captions,
            settings.overlay,
            GifConfig::from_settings(&settings.animation),
        )
    }

    pub fn frame_count(&self) -> usize {
        self.base.frame_count()
    }

    /// Scales the snapshot to the overlay height and applies the overlay alpha.
    pub fn prepare_overlay(&self, snapshot: &RgbaImage) -> TickerResult<RgbaImage> {
        let (sw, sh) = snapshot.dimensions();
        if sw == 0 || sh == 0 {
            return Err(TickerError::composition("snapshot is empty"));
        }
        let height = ((self.base.canvas.height as f32 * self.overlay.height_ratio) as u32).max(1);
        // Truncates, like the height.
        let width = (u64::from(sw) * u64::from(height) / u64::from(sh)).max(1) as u32;
        let mut scaled = image::imageops::resize(snapshot, width, height, FilterType::CatmullRom);
        set_alpha(&mut scaled, self.overlay.alpha);
        Ok(scaled)
    }

    /// Top-left corner of the overlay: centered horizontally, flush with the top.
    pub fn overlay_origin(&self, overlay: &RgbaImage) -> (i64, i64) {
        let w = i64::from(self.base.canvas.width);
        (w / 2 - i64::from(overlay.width()) / 2, 0)
    }

    /// Composes every output frame: the decorated lead-in followed by the
    /// untouched lead-out.
    pub fn compose_frames(&self, trend: Trend, snapshot: &RgbaImage) -> TickerResult<Vec<RgbaImage>> {
        let overlay = self.prepare_overlay(snapshot)?;
        let (ox, oy) = self.overlay_origin(&overlay);
        let caption = self.captions.for_trend(trend);

        let mut frames: Vec<RgbaImage> = self
            .base
            .lead_in
            .par_iter()
            .map(|base| {
                let mut frame = base.clone();
                if trend == Trend::Down {
                    image::imageops::flip_horizontal_in_place(&mut frame);
                }
                paste_with_alpha_mask(&mut frame, &overlay, ox, oy);
                caption.draw(&mut frame);
                frame
            })
            .collect();
        frames.extend(self.base.lead_out.iter().cloned());
        Ok(frames)
    }

    #[tracing::instrument(skip_all, fields(window = %window, trend = %trend))]
    pub fn compose(
        &self,
        window: ViewWindow,
        trend: Trend,
        snapshot: &RgbaImage,
    ) -> TickerResult<Vec<u8>> {
        let frames = self.compose_frames(trend, snapshot)?;
        let bytes = encode_looping_gif(&frames, &self.gif)?;
        tracing::info!(frames = frames.len(), bytes = bytes.len(), "composed artifact");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgba};

    use super::*;
    use crate::{
        compose::caption::{CaptionStamp, CaptionStyle},
        foundation::core::Canvas,
    };

    const CANVAS: Canvas = Canvas {
        width: 40,
        height: 20,
    };

    /// A lead-in frame whose left half differs from its right half, so
    /// mirroring is observable.
    fn lead_in_frame(i: u8) -> RgbaImage {
        RgbaImage::from_fn(CANVAS.width, CANVAS.height, |x, _| {
            if x < CANVAS.width / 4 {
                Rgba([200, i * 10, 0, 255])
            } else {
                Rgba([0, i * 10, 200, 255])
            }
        })
    }

    fn captions() -> Captions {
        let style = CaptionStyle {
            fill: [255, 255, 255],
            stroke: [44, 44, 44],
            stroke_width: 1,
            bottom_margin: 1,
        };
        let up = GrayImage::from_pixel(6, 3, Luma([255]));
        let down = GrayImage::from_pixel(4, 3, Luma([255]));
        Captions {
            up: CaptionStamp::from_coverage(&up, CANVAS, style),
            down: CaptionStamp::from_coverage(&down, CANVAS, style),
        }
    }

    fn composer(lead_in: Vec<RgbaImage>, lead_out: Vec<RgbaImage>, captions: Captions) -> FrameComposer {
        let base = BaseFrames::new(CANVAS, lead_in, lead_out).unwrap();
        FrameComposer::new(
            base,
            captions,
            OverlaySettings {
                height_ratio: 0.5,
                alpha: 255,
            },
            GifConfig {
                frame_delay_ms: 42,
                speed: 10,
                background: [0, 0, 0],
            },
        )
        .unwrap()
    }

    fn snapshot() -> RgbaImage {
        RgbaImage::from_pixel(8, 4, Rgba([0, 255, 0, 255]))
    }

    #[test]
    fn frame_count_is_lead_in_plus_lead_out_for_both_trends() {
        let lead_in: Vec<_> = (0..3).map(lead_in_frame).collect();
        let lead_out = vec![RgbaImage::new(40, 20); 2];
        let c = composer(lead_in, lead_out, captions());
        assert_eq!(c.compose_frames(Trend::Up, &snapshot()).unwrap().len(), 5);
        assert_eq!(c.compose_frames(Trend::Down, &snapshot()).unwrap().len(), 5);
        assert_eq!(c.frame_count(), 5);
    }

    #[test]
    fn overlay_is_scaled_and_centered_at_the_top() {
        let c = composer(vec![lead_in_frame(0)], vec![], captions());
        let overlay = c.prepare_overlay(&snapshot()).unwrap();
        assert_eq!(overlay.dimensions(), (20, 10));
        assert_eq!(c.overlay_origin(&overlay), (10, 0));

        let frames = c.compose_frames(Trend::Up, &snapshot()).unwrap();
        assert_eq!(frames[0].get_pixel(10, 0).0, [0, 255, 0, 255]);
        assert_eq!(frames[0].get_pixel(29, 9).0, [0, 255, 0, 255]);
        assert_eq!(frames[0].get_pixel(9, 0).0, [200, 0, 0, 255]);
        assert_eq!(frames[0].get_pixel(30, 0).0, [0, 0, 200, 255]);
    }

    #[test]
    fn overlay_width_truncates_for_the_default_crop() {
        let canvas = Canvas {
            width: 480,
            height: 240,
        };
        let base = BaseFrames::new(canvas, vec![RgbaImage::new(480, 240)], vec![]).unwrap();
        let c = FrameComposer::new(
            base,
            captions(),
            OverlaySettings {
                height_ratio: 0.9,
                alpha: 150,
            },
            GifConfig {
                frame_delay_ms: 42,
                speed: 10,
                background: [0, 0, 0],
            },
        )
        .unwrap();
        // 700 * 216 / 440 = 343.6
        let overlay = c.prepare_overlay(&RgbaImage::new(700, 440)).unwrap();
        assert_eq!(overlay.dimensions(), (343, 216));
    }

    #[test]
    fn overlay_alpha_blends_with_the_base() {
        let mut c = composer(vec![RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]))], vec![], captions());
        c.overlay.alpha = 128;
        let frames = c.compose_frames(Trend::Up, &snapshot()).unwrap();
        assert_eq!(frames[0].get_pixel(20, 2).0, [0, 128, 0, 255]);
    }

    #[test]
    fn down_mirrors_only_the_base() {
        let lead_in: Vec<_> = (0..2).map(lead_in_frame).collect();
        let mirrored: Vec<_> = lead_in
            .iter()
            .map(image::imageops::flip_horizontal)
            .collect();
        let lead_out = vec![RgbaImage::from_pixel(40, 20, Rgba([9, 9, 9, 255]))];

        // Same caption for both trends so only the base can differ.
        let mut same = captions();
        same.down = same.up.clone();

        let down = composer(lead_in, lead_out.clone(), same.clone())
            .compose_frames(Trend::Down, &snapshot())
            .unwrap();
        let up_on_mirrored = composer(mirrored, lead_out.clone(), same)
            .compose_frames(Trend::Up, &snapshot())
            .unwrap();
        assert_eq!(down, up_on_mirrored);
        assert_eq!(down.last().unwrap(), &lead_out[0]);
    }

    #[test]
    fn caption_follows_trend() {
        let base = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        let c = composer(vec![base], vec![], captions());
        let up = c.compose_frames(Trend::Up, &snapshot()).unwrap();
        let down = c.compose_frames(Trend::Down, &snapshot()).unwrap();
        // Up caption is 6 wide centered on x=20 (17..23); down is 4 wide (18..22).
        assert_eq!(up[0].get_pixel(17, 17).0, [255, 255, 255, 255]);
        assert_eq!(down[0].get_pixel(17, 17).0, [44, 44, 44, 255]);
    }

    #[test]
    fn compose_is_deterministic() {
        let lead_in: Vec<_> = (0..4).map(lead_in_frame).collect();
        let c = composer(lead_in, vec![RgbaImage::new(40, 20)], captions());
        let a = c.compose(ViewWindow::OneYear, Trend::Down, &snapshot()).unwrap();
        let b = c.compose(ViewWindow::OneYear, Trend::Down, &snapshot()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(b"GIF89a"));
    }
}
