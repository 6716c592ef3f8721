//! Up/down classification of the index movement.
//!
//! The page text is the primary signal. When an element is missing, or an
//! intraday quote is not a number, the classifier falls back to the page's
//! own color coding by sampling one pixel of the snapshot.

use image::RgbaImage;

use crate::{
    config::{LocatorSettings, Settings},
    foundation::{
        core::{Trend, ViewWindow},
        error::TickerResult,
    },
    remote::{Locator, Lookup, TextSource},
};

#[derive(Clone, Debug)]
pub struct TrendClassifier {
    locators: LocatorSettings,
    sample_at: (u32, u32),
}

impl TrendClassifier {
    pub fn new(locators: LocatorSettings, sample_at: (u32, u32)) -> Self {
        Self { locators, sample_at }
    }

    pub fn from_settings(s: &Settings) -> Self {
        Self::new(s.locators.clone(), (s.sample_pixel[0], s.sample_pixel[1]))
    }

    /// Classifies the view that produced `snapshot`. Only remote failures are
    /// returned as errors; everything else ends in the pixel fallback.
    pub fn classify(
        &self,
        window: ViewWindow,
        snapshot: &RgbaImage,
        text: &mut dyn TextSource,
    ) -> TickerResult<Trend> {
        let signal = self.read_text_signal(window, text)?;
        Ok(self.resolve(signal, snapshot))
    }

    /// Reads the page text only. `None` means the text gave no answer and the
    /// snapshot pixel decides.
    pub fn read_text_signal(
        &self,
        window: ViewWindow,
        text: &mut dyn TextSource,
    ) -> TickerResult<Option<Trend>> {
        if window.is_intraday() {
            let Some(previous) = read_number(text, &self.locators.previous_close)? else {
                return Ok(None);
            };
            let Some(current) = read_number(text, &self.locators.current_value)? else {
                return Ok(None);
            };
            tracing::debug!(previous, current, "intraday quote");
            return Ok(Some(if current > previous {
                Trend::Up
            } else {
                Trend::Down
            }));
        }

        let Some(change) = read_found(text, &self.locators.change)? else {
            return Ok(None);
        };
        Ok(Some(parse_change_sign(&change)))
    }

    /// Settles a text signal, falling back to the snapshot pixel.
    pub fn resolve(&self, signal: Option<Trend>, snapshot: &RgbaImage) -> Trend {
        signal.unwrap_or_else(|| self.classify_from_pixel(snapshot))
    }

    /// Green-dominant sample pixel means up. A sample point outside the snapshot reads as down.
    pub fn classify_from_pixel(&self, snapshot: &RgbaImage) -> Trend {
        let (x, y) = self.sample_at;
        let Some(px) = snapshot.get_pixel_checked(x, y) else {
            tracing::warn!(x, y, "sample pixel outside snapshot");
            return Trend::Down;
        };
        let [r, g, _, _] = px.0;
        if g > r { Trend::Up } else { Trend::Down }
    }
}

fn read_found(text: &mut dyn TextSource, locator: &Locator) -> TickerResult<Option<String>> {
    match text.read_text(locator)? {
        Lookup::Found(s) => Ok(Some(s)),
        Lookup::NotFound => {
            tracing::warn!(locator = %locator, "element not found; using pixel fallback");
            Ok(None)
        }
    }
}

fn read_number(text: &mut dyn TextSource, locator: &Locator) -> TickerResult<Option<f64>> {
    let Some(raw) = read_found(text, locator)? else {
        return Ok(None);
    };
    let parsed = parse_quote_number(&raw);
    if parsed.is_none() {
        tracing::warn!(text = %raw, "quote text is not a number; using pixel fallback");
    }
    Ok(parsed)
}

/// Parses `"25,478.31"`-style quotes.
pub fn parse_quote_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Reads the sign of a change figure such as `"+1.23%"` or `"-0.4%"`.
/// Only a leading `+` is up; anything else, unsigned text included, is down.
pub fn parse_change_sign(raw: &str) -> Trend {
    if raw.trim_start().starts_with('+') {
        Trend::Up
    } else {
        Trend::Down
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::foundation::error::TickerError;

    #[derive(Default)]
    struct Page {
        texts: HashMap<Locator, String>,
        crashed: bool,
        reads: usize,
    }

    impl TextSource for Page {
        fn read_text(&mut self, locator: &Locator) -> TickerResult<Lookup> {
            self.reads += 1;
            if self.crashed {
                return Err(TickerError::remote("gone"));
            }
            Ok(match self.texts.get(locator) {
                Some(t) => Lookup::Found(t.clone()),
                None => Lookup::NotFound,
            })
        }
    }

    fn classifier() -> TrendClassifier {
        TrendClassifier::new(LocatorSettings::default(), (5, 3))
    }

    fn snapshot(rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(10, 10, image::Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn change_sign_decides_for_non_intraday_windows() {
        let c = classifier();
        let mut page = Page::default();
        page.texts
            .insert(LocatorSettings::default().change, "+1.25%".to_string());
        let red = snapshot([200, 10, 10]);
        assert_eq!(
            c.classify(ViewWindow::OneYear, &red, &mut page).unwrap(),
            Trend::Up
        );

        page.texts
            .insert(LocatorSettings::default().change, "−3.10%".to_string());
        let green = snapshot([10, 200, 10]);
        assert_eq!(
            c.classify(ViewWindow::FiveYears, &green, &mut page).unwrap(),
            Trend::Down
        );
    }

    #[test]
    fn intraday_compares_current_with_previous_close() {
        let c = classifier();
        let loc = LocatorSettings::default();
        let mut page = Page::default();
        page.texts
            .insert(loc.previous_close.clone(), "25,100.50".to_string());
        page.texts
            .insert(loc.current_value.clone(), "25,210.00".to_string());
        let red = snapshot([200, 10, 10]);
        assert_eq!(
            c.classify(ViewWindow::OneDay, &red, &mut page).unwrap(),
            Trend::Up
        );

        page.texts
            .insert(loc.current_value.clone(), "25,100.50".to_string());
        let green = snapshot([10, 200, 10]);
        assert_eq!(
            c.classify(ViewWindow::OneDay, &green, &mut page).unwrap(),
            Trend::Down
        );
    }

    #[test]
    fn missing_element_falls_back_to_the_sample_pixel() {
        let c = classifier();
        let mut page = Page::default();
        let mut img = snapshot([200, 10, 10]);
        img.put_pixel(5, 3, image::Rgba([10, 180, 10, 255]));
        assert_eq!(
            c.classify(ViewWindow::OneYear, &img, &mut page).unwrap(),
            Trend::Up
        );
        assert_eq!(
            c.classify(ViewWindow::OneDay, &snapshot([200, 10, 10]), &mut page)
                .unwrap(),
            Trend::Down
        );
    }

    #[test]
    fn unsigned_change_text_reads_as_down_without_pixel_fallback() {
        let c = classifier();
        let loc = LocatorSettings::default();
        let mut page = Page::default();
        let green = snapshot([0, 200, 0]);
        for text in ["0.00%", "n/a", ""] {
            page.texts.insert(loc.change.clone(), text.to_string());
            assert_eq!(
                c.classify(ViewWindow::SixMonths, &green, &mut page).unwrap(),
                Trend::Down,
                "{text:?}"
            );
            assert_eq!(
                c.read_text_signal(ViewWindow::SixMonths, &mut page).unwrap(),
                Some(Trend::Down)
            );
        }
    }

    #[test]
    fn unparsable_intraday_quote_falls_back_to_the_sample_pixel() {
        let c = classifier();
        let loc = LocatorSettings::default();
        let mut page = Page::default();
        page.texts
            .insert(loc.previous_close.clone(), "--".to_string());
        page.texts
            .insert(loc.current_value.clone(), "25,000".to_string());
        assert_eq!(
            c.read_text_signal(ViewWindow::OneDay, &mut page).unwrap(),
            None
        );
        assert_eq!(
            c.classify(ViewWindow::OneDay, &snapshot([0, 90, 0]), &mut page)
                .unwrap(),
            Trend::Up
        );
    }

    #[test]
    fn resolve_prefers_the_text_signal() {
        let c = classifier();
        let green = snapshot([0, 200, 0]);
        assert_eq!(c.resolve(Some(Trend::Down), &green), Trend::Down);
        assert_eq!(c.resolve(None, &green), Trend::Up);
        assert_eq!(c.resolve(None, &snapshot([200, 0, 0])), Trend::Down);
    }

    #[test]
    fn pixel_fallback_only_looks_at_the_sample_point() {
        let c = classifier();
        let mut img = snapshot([0, 255, 0]);
        img.put_pixel(5, 3, image::Rgba([120, 120, 0, 255]));
        assert_eq!(c.classify_from_pixel(&img), Trend::Down);
        img.put_pixel(5, 3, image::Rgba([120, 121, 0, 255]));
        assert_eq!(c.classify_from_pixel(&img), Trend::Up);

        let tiny = RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]));
        assert_eq!(c.classify_from_pixel(&tiny), Trend::Down);
    }

    #[test]
    fn remote_failure_is_not_swallowed() {
        let c = classifier();
        let mut page = Page {
            crashed: true,
            ..Page::default()
        };
        let err = c
            .classify(ViewWindow::OneYear, &snapshot([0, 255, 0]), &mut page)
            .unwrap_err();
        assert!(err.is_remote());
        assert_eq!(page.reads, 1);
    }

    #[test]
    fn number_and_sign_parsers() {
        assert_eq!(parse_quote_number(" 1,234,567.5 "), Some(1_234_567.5));
        assert_eq!(parse_quote_number("abc"), None);
        assert_eq!(parse_quote_number("NaN"), None);
        assert_eq!(parse_change_sign(" +0.00%"), Trend::Up);
        assert_eq!(parse_change_sign("-0.01%"), Trend::Down);
        assert_eq!(parse_change_sign("0.00%"), Trend::Down);
        assert_eq!(parse_change_sign(""), Trend::Down);
    }
}
