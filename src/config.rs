use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use chrono::TimeDelta;

use crate::{
    foundation::core::{Canvas, CropRegion, ViewWindow},
    foundation::error::{TickerError, TickerResult},
    remote::{Locator, webdriver::WebDriverSettings},
};

pub const DEFAULT_QUOTE_URL: &str = "https://www.google.com/finance/quote/HSI:INDEXHANGSENG";

/// Runtime settings. Every field has a default, so a settings file only
/// needs to name what it changes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: String,
    pub quote_url: String,
    pub default_window: ViewWindow,
    /// Keep one tab per window open instead of navigating a single tab.
    pub multi_session: bool,
    /// Minimum age in seconds before an artifact may be regenerated.
    pub regen_interval_secs: u64,
    /// Age in seconds after which a tab is reloaded before capture.
    pub refresh_interval_secs: u64,
    /// Age in seconds after which an artifact is regenerated regardless of trading hours.
    pub forced_refresh_secs: u64,
    pub trading_hours: TradingHoursSettings,
    /// Pause between opening tabs at startup.
    pub tab_open_delay_ms: u64,
    /// Generate every window's artifact before accepting requests.
    pub warm_on_startup: bool,
    pub output: Canvas,
    pub crop: CropRegion,
    /// Snapshot pixel sampled when the page text cannot be read.
    pub sample_pixel: [u32; 2],
    pub locators: LocatorSettings,
    pub overlay: OverlaySettings,
    pub caption: CaptionSettings,
    pub animation: AnimationSettings,
    pub assets: AssetSettings,
    pub webdriver: WebDriverSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TradingHoursSettings {
    pub open_hour: u32,
    /// Exclusive.
    pub close_hour: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    pub previous_close: Locator,
    pub current_value: Locator,
    pub change: Locator,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Snapshot height as a fraction of the output height.
    pub height_ratio: f32,
    pub alpha: u8,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    pub up_text: String,
    pub down_text: String,
    /// Font size as a fraction of the output height.
    pub size_ratio: f32,
    pub fill: [u8; 3],
    pub stroke: [u8; 3],
    pub stroke_width: u32,
    /// Gap under the caption as a divisor of the output height.
    pub bottom_margin_divisor: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    pub frame_delay_ms: u32,
    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub quantize_speed: i32,
    pub background: [u8; 3],
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    pub lead_in: FrameSourceSettings,
    pub lead_out: FrameSourceSettings,
    pub font: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameSourceSettings {
    /// Video file or directory of frame images.
    pub path: PathBuf,
    #[serde(default)]
    pub skip_frames: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:80".to_string(),
            quote_url: DEFAULT_QUOTE_URL.to_string(),
            default_window: ViewWindow::OneYear,
            multi_session: true,
            regen_interval_secs: 300,
            refresh_interval_secs: 7200,
            forced_refresh_secs: 24 * 60 * 60,
            trading_hours: TradingHoursSettings::default(),
            tab_open_delay_ms: 1000,
            warm_on_startup: true,
            output: Canvas {
                width: 424,
                height: 240,
            },
            crop: CropRegion {
                left: 160,
                top: 200,
                right: 860,
                bottom: 640,
            },
            sample_pixel: [165, 70],
            locators: LocatorSettings::default(),
            overlay: OverlaySettings::default(),
            caption: CaptionSettings::default(),
            animation: AnimationSettings::default(),
            assets: AssetSettings::default(),
            webdriver: WebDriverSettings::default(),
        }
    }
}

impl Default for TradingHoursSettings {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 16,
        }
    }
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            previous_close: Locator::xpath(
                "/html/body/c-wiz[2]/div/div[4]/div/main/div[2]/div[2]/div/div[1]/div[2]/div",
            ),
            current_value: Locator::xpath(
                "/html/body/c-wiz[2]/div/div[4]/div/main/div[2]/div[1]/div[1]/c-wiz/div/div[1]/div/div[1]/div/div[1]/div/span/div/div",
            ),
            change: Locator::xpath(
                "/html/body/c-wiz[2]/div/div[4]/div/main/div[2]/div[1]/div[1]/c-wiz/div/div[1]/div/div[1]/div/div[2]/div/span[2]",
            ),
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            height_ratio: 0.9,
            alpha: 150,
        }
    }
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            up_text: "恆指唔係越高越巴閉".to_string(),
            down_text: "恒指又跌啦".to_string(),
            size_ratio: 0.075,
            fill: [255, 255, 255],
            stroke: [44, 44, 44],
            stroke_width: 1,
            bottom_margin_divisor: 60,
        }
    }
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            frame_delay_ms: 42,
            quantize_speed: 10,
            background: [0, 0, 0],
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            lead_in: FrameSourceSettings {
                path: PathBuf::from("assets/hsi-before-base.webm"),
                skip_frames: 0,
            },
            lead_out: FrameSourceSettings {
                path: PathBuf::from("assets/hsi-original.webm"),
                skip_frames: 72,
            },
            font: PathBuf::from("assets/AdobeFanHeitiStd-Bold.otf"),
        }
    }
}

impl Settings {
    /// Reads a JSON settings file; missing fields keep their defaults.
    pub fn load(path: &Path) -> TickerResult<Self> {
        let f = File::open(path).with_context(|| format!("open settings '{}'", path.display()))?;
        let settings: Settings = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse settings '{}'", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> TickerResult<()> {
        if self.output.width == 0 || self.output.height == 0 {
            return Err(TickerError::validation(
                "output width/height must be non-zero",
            ));
        }
        CropRegion::new(
            self.crop.left,
            self.crop.top,
            self.crop.right,
            self.crop.bottom,
        )?;
        if self.regen_interval_secs == 0 || self.refresh_interval_secs == 0 {
            return Err(TickerError::validation(
                "regeneration and refresh intervals must be non-zero",
            ));
        }
        for (name, secs) in [
            ("regen_interval_secs", self.regen_interval_secs),
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("forced_refresh_secs", self.forced_refresh_secs),
        ] {
            if secs_delta(secs).is_none() {
                return Err(TickerError::validation(format!(
                    "{name} is out of range: {secs}"
                )));
            }
        }
        if self.forced_refresh_secs < self.regen_interval_secs {
            return Err(TickerError::validation(
                "forced refresh must not be shorter than the regeneration interval",
            ));
        }
        let th = self.trading_hours;
        if th.open_hour >= th.close_hour || th.close_hour > 24 {
            return Err(TickerError::validation(
                "trading hours must satisfy open_hour < close_hour <= 24",
            ));
        }
        if !(self.overlay.height_ratio > 0.0 && self.overlay.height_ratio <= 1.0) {
            return Err(TickerError::validation(
                "overlay height_ratio must be in (0, 1]",
            ));
        }
        if !(self.caption.size_ratio > 0.0 && self.caption.size_ratio < 1.0) {
            return Err(TickerError::validation(
                "caption size_ratio must be in (0, 1)",
            ));
        }
        if self.caption.bottom_margin_divisor == 0 {
            return Err(TickerError::validation(
                "caption bottom_margin_divisor must be non-zero",
            ));
        }
        if !(1..=30).contains(&self.animation.quantize_speed) {
            return Err(TickerError::validation(
                "animation quantize_speed must be within 1..=30",
            ));
        }
        if self.animation.frame_delay_ms == 0 {
            return Err(TickerError::validation("frame_delay_ms must be non-zero"));
        }
        Ok(())
    }

    pub fn caption_font_px(&self) -> f32 {
        (self.output.height as f32 * self.caption.size_ratio).floor()
    }
}

/// Seconds as a [`TimeDelta`], or `None` when chrono cannot represent them.
pub(crate) fn secs_delta(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}
