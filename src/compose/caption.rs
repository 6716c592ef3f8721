//! Caption rasterization.
//!
//! Text, font and frame size never change between frames, so each caption is
//! rasterized once into a [`CaptionStamp`] holding its coverage masks and
//! frame position, and stamped onto every frame as is.

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::{
    compose::composite::paint,
    config::Settings,
    foundation::{
        core::{Canvas, Trend},
        error::{TickerError, TickerResult},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptionStyle {
    pub fill: [u8; 3],
    pub stroke: [u8; 3],
    pub stroke_width: u32,
    /// Pixels between the text box bottom and the frame bottom.
    pub bottom_margin: u32,
}

impl CaptionStyle {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            fill: s.caption.fill,
            stroke: s.caption.stroke,
            stroke_width: s.caption.stroke_width,
            bottom_margin: s.output.height / s.caption.bottom_margin_divisor,
        }
    }
}

/// A pre-positioned caption ready to be drawn onto frames.
#[derive(Clone, Debug)]
pub struct CaptionStamp {
    /// Top-left of the masks in frame coordinates (includes stroke padding).
    origin: (i64, i64),
    fill_mask: GrayImage,
    stroke_mask: GrayImage,
    style: CaptionStyle,
}

impl CaptionStamp {
    /// Positions a text coverage mask centered horizontally near the frame bottom.
    pub fn from_coverage(coverage: &GrayImage, frame: Canvas, style: CaptionStyle) -> Self {
        let (tw, th) = (i64::from(coverage.width()), i64::from(coverage.height()));
        let text_x = i64::from(frame.width) / 2 - tw / 2;
        let text_y = i64::from(frame.height) - th - i64::from(style.bottom_margin);

        let pad = style.stroke_width;
        let mut fill_mask = GrayImage::new(coverage.width() + 2 * pad, coverage.height() + 2 * pad);
        image::imageops::replace(&mut fill_mask, coverage, i64::from(pad), i64::from(pad));
        let stroke_mask = dilate(&fill_mask, pad);

        Self {
            origin: (text_x - i64::from(pad), text_y - i64::from(pad)),
            fill_mask,
            stroke_mask,
            style,
        }
    }

    /// Top-left corner of the unpadded text box, in frame coordinates.
    pub fn text_origin(&self) -> (i64, i64) {
        let pad = i64::from(self.style.stroke_width);
        (self.origin.0 + pad, self.origin.1 + pad)
    }

    pub fn draw(&self, frame: &mut RgbaImage) {
        let (fw, fh) = (i64::from(frame.width()), i64::from(frame.height()));
        for (mx, my, stroke) in self.stroke_mask.enumerate_pixels() {
            let fx = self.origin.0 + i64::from(mx);
            let fy = self.origin.1 + i64::from(my);
            if fx < 0 || fy < 0 || fx >= fw || fy >= fh {
                continue;
            }
            let fill = self.fill_mask.get_pixel(mx, my).0[0];
            let px = frame.get_pixel_mut(fx as u32, fy as u32);
            let stroked = paint(px.0, self.style.stroke, stroke.0[0]);
            *px = Rgba(paint(stroked, self.style.fill, fill));
        }
    }
}

/// Grows coverage by `radius` pixels in every direction (max filter).
fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let (w, h) = mask.dimensions();
    let r = radius as i64;
    GrayImage::from_fn(w, h, |x, y| {
        let mut best = 0u8;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r + r {
                    continue;
                }
                let (sx, sy) = (x as i64 + dx, y as i64 + dy);
                if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                    continue;
                }
                best = best.max(mask.get_pixel(sx as u32, sy as u32).0[0]);
            }
        }
        Luma([best])
    })
}

/// Rasterizes a single line of text. The box spans the pen advance
/// horizontally and ascent to descent vertically.
pub fn rasterize_text(font: &fontdue::Font, text: &str, px: f32) -> TickerResult<GrayImage> {
    let line = font
        .horizontal_line_metrics(px)
        .ok_or_else(|| TickerError::composition("font has no horizontal line metrics"))?;
    let baseline = line.ascent.ceil() as i64;
    let height = (line.ascent - line.descent).ceil().max(1.0) as u32;

    let glyphs: Vec<(i64, fontdue::Metrics, Vec<u8>)> = {
        let mut pen = 0.0f32;
        text.chars()
            .map(|c| {
                let (metrics, bitmap) = font.rasterize(c, px);
                let x = pen.round() as i64;
                pen += metrics.advance_width;
                (x, metrics, bitmap)
            })
            .collect()
    };
    let width = glyphs
        .iter()
        .map(|(x, m, _)| (x + m.advance_width.ceil() as i64).max(x + i64::from(m.xmin) + m.width as i64))
        .max()
        .unwrap_or(0)
        .max(1) as u32;

    let mut out = GrayImage::new(width, height);
    for (x, m, bitmap) in &glyphs {
        let left = x + i64::from(m.xmin);
        let top = baseline - (m.height as i64 + i64::from(m.ymin));
        for gy in 0..m.height {
            for gx in 0..m.width {
                let (ox, oy) = (left + gx as i64, top + gy as i64);
                if ox < 0 || oy < 0 || ox >= i64::from(width) || oy >= i64::from(height) {
                    continue;
                }
                let cov = bitmap[gy * m.width + gx];
                let dst = out.get_pixel_mut(ox as u32, oy as u32);
                dst.0[0] = dst.0[0].max(cov);
            }
        }
    }
    Ok(out)
}

/// The up and down caption stamps.
#[derive(Clone, Debug)]
pub struct Captions {
    pub up: CaptionStamp,
    pub down: CaptionStamp,
}

impl Captions {
    pub fn render(font: &fontdue::Font, settings: &Settings) -> TickerResult<Self> {
        let px = settings.caption_font_px();
        let style = CaptionStyle::from_settings(settings);
        let up = rasterize_text(font, &settings.caption.up_text, px)?;
        let down = rasterize_text(font, &settings.caption.down_text, px)?;
        Ok(Self {
            up: CaptionStamp::from_coverage(&up, settings.output, style),
            down: CaptionStamp::from_coverage(&down, settings.output, style),
        })
    }

    pub fn for_trend(&self, trend: Trend) -> &CaptionStamp {
        match trend {
            Trend::Up => &self.up,
            Trend::Down => &self.down,
        }
    }
}
