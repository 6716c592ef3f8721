use std::{fmt, str::FromStr};

use crate::foundation::error::{TickerError, TickerResult};

/// Chart time-range selecting which quote-page view is snapshotted.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ViewWindow {
    #[serde(rename = "MAX")]
    Max,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "YTD")]
    YearToDate,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "5D")]
    FiveDays,
    #[serde(rename = "1D")]
    OneDay,
}

impl ViewWindow {
    pub const ALL: [ViewWindow; 8] = [
        ViewWindow::Max,
        ViewWindow::FiveYears,
        ViewWindow::OneYear,
        ViewWindow::YearToDate,
        ViewWindow::SixMonths,
        ViewWindow::OneMonth,
        ViewWindow::FiveDays,
        ViewWindow::OneDay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewWindow::Max => "MAX",
            ViewWindow::FiveYears => "5Y",
            ViewWindow::OneYear => "1Y",
            ViewWindow::YearToDate => "YTD",
            ViewWindow::SixMonths => "6M",
            ViewWindow::OneMonth => "1M",
            ViewWindow::FiveDays => "5D",
            ViewWindow::OneDay => "1D",
        }
    }

    /// Position in [`ViewWindow::ALL`]; used to index per-window tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The shortest window; its page shows previous close instead of a change figure.
    pub fn is_intraday(self) -> bool {
        self == ViewWindow::OneDay
    }

    /// Maps a raw selector onto a window. Missing or unknown selectors yield `default`.
    pub fn resolve(selector: Option<&str>, default: ViewWindow) -> ViewWindow {
        selector
            .and_then(|s| s.parse::<ViewWindow>().ok())
            .unwrap_or(default)
    }

    pub fn quote_url(self, base: &str) -> String {
        format!("{base}?window={}", self.as_str())
    }
}

impl FromStr for ViewWindow {
    type Err = TickerError;

    fn from_str(s: &str) -> TickerResult<Self> {
        ViewWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| TickerError::validation(format!("unknown view window '{s}'")))
    }
}

impl fmt::Display for ViewWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trend {
    Up,
    Down,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Up => "up",
            Trend::Down => "down",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Pixel box inside a full-page screenshot; `right`/`bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRegion {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> TickerResult<Self> {
        if right <= left || bottom <= top {
            return Err(TickerError::validation(
                "crop region must have right > left and bottom > top",
            ));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn width(self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}
