pub mod decode;
pub mod media;

use std::{path::Path, sync::Arc};

use anyhow::Context as _;
use image::RgbaImage;

use crate::{
    config::Settings,
    foundation::{
        core::Canvas,
        error::{TickerError, TickerResult},
    },
};

/// The two pre-rendered animations, decoded once and shared read-only.
#[derive(Clone, Debug)]
pub struct BaseFrames {
    pub canvas: Canvas,
    /// Authored for the up case; mirrored for down.
    pub lead_in: Arc<Vec<RgbaImage>>,
    pub lead_out: Arc<Vec<RgbaImage>>,
}

impl BaseFrames {
    pub fn new(
        canvas: Canvas,
        lead_in: Vec<RgbaImage>,
        lead_out: Vec<RgbaImage>,
    ) -> TickerResult<Self> {
        if lead_in.is_empty() && lead_out.is_empty() {
            return Err(TickerError::asset("both frame sequences are empty"));
        }
        let expected = (canvas.width, canvas.height);
        if let Some(bad) = lead_in
            .iter()
            .chain(lead_out.iter())
            .find(|f| f.dimensions() != expected)
        {
            return Err(TickerError::asset(format!(
                "frame is {}x{}, expected {}x{}",
                bad.width(),
                bad.height(),
                canvas.width,
                canvas.height
            )));
        }
        Ok(Self {
            canvas,
            lead_in: Arc::new(lead_in),
            lead_out: Arc::new(lead_out),
        })
    }

    pub fn load(settings: &Settings) -> TickerResult<Self> {
        let lead_in = media::load_frame_sequence(&settings.assets.lead_in, settings.output)?;
        let lead_out = media::load_frame_sequence(&settings.assets.lead_out, settings.output)?;
        Self::new(settings.output, lead_in, lead_out)
    }

    pub fn frame_count(&self) -> usize {
        self.lead_in.len() + self.lead_out.len()
    }
}

pub fn load_font(path: &Path) -> TickerResult<fontdue::Font> {
    let bytes = std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
    fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|e| TickerError::asset(format!("parse font '{}': {e}", path.display())))
}
