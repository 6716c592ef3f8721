use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    capture::{RawCapture, capture_screenshot},
    config::{Settings, secs_delta},
    foundation::{
        clock::Clock,
        core::{CropRegion, ViewWindow},
        error::TickerResult,
    },
    remote::{Locator, Lookup, RemoteBrowser, SessionHandle, TextSource},
};

#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub quote_url: String,
    pub multi_session: bool,
    pub refresh_interval: TimeDelta,
    pub crop: CropRegion,
    pub tab_open_delay: Duration,
}

impl PoolSettings {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            quote_url: s.quote_url.clone(),
            multi_session: s.multi_session,
            refresh_interval: secs_delta(s.refresh_interval_secs).unwrap_or(TimeDelta::MAX),
            crop: s.crop,
            tab_open_delay: Duration::from_millis(s.tab_open_delay_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub handle: Option<SessionHandle>,
    pub last_opened_at: DateTime<Local>,
}

struct PoolState {
    browser: Box<dyn RemoteBrowser>,
    records: [SessionRecord; ViewWindow::ALL.len()],
}

impl PoolState {
    /// Points a view at `window`'s quote page and stamps its record.
    fn open_view(
        &mut self,
        window: ViewWindow,
        quote_url: &str,
        new_tab: bool,
        now: DateTime<Local>,
    ) -> TickerResult<()> {
        tracing::info!(window = %window, new_tab, "opening view");
        if new_tab {
            self.browser.new_session()?;
        }
        let url = window.quote_url(quote_url);
        if self.browser.current_url()? != url {
            self.browser.navigate(&url)?;
        }
        let handle = self.browser.current_session()?;
        let record = &mut self.records[window.index()];
        record.handle = Some(handle);
        record.last_opened_at = now;
        Ok(())
    }
}

/// Owner of the single remote browser and the per-window view records.
///
/// Every operation that touches the browser runs under one mutex; the lock
/// is released as soon as the caller drops (or unwraps) the [`ActiveView`].
pub struct RemoteSessionPool {
    state: Mutex<PoolState>,
    settings: PoolSettings,
    clock: Arc<dyn Clock>,
}

impl RemoteSessionPool {
    /// Builds the pool. In multi-session mode one tab per window is opened
    /// up front; otherwise views are opened on demand in the current tab.
    pub fn open(
        browser: Box<dyn RemoteBrowser>,
        settings: PoolSettings,
        clock: Arc<dyn Clock>,
    ) -> TickerResult<Self> {
        let now = clock.now();
        let mut state = PoolState {
            browser,
            records: ViewWindow::ALL.map(|_| SessionRecord {
                handle: None,
                last_opened_at: now,
            }),
        };

        if settings.multi_session {
            for window in ViewWindow::ALL {
                state.open_view(window, &settings.quote_url, true, clock.now())?;
                if !settings.tab_open_delay.is_zero() {
                    std::thread::sleep(settings.tab_open_delay);
                }
            }
        }

        Ok(Self {
            state: Mutex::new(state),
            settings,
            clock,
        })
    }

    /// Brings `window`'s view to the front, reloading it first when it is
    /// older than the refresh interval, and screenshots it.
    ///
    /// The returned view keeps the pool locked so that text reads observe the
    /// same page the screenshot came from. Decoding waits until the lock is
    /// released, see [`ActiveView::into_capture`].
    #[tracing::instrument(skip_all, fields(window = %window))]
    pub fn acquire(&self, window: ViewWindow) -> TickerResult<ActiveView<'_>> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let last_opened_at = state.records[window.index()].last_opened_at;
        let stale = now.signed_duration_since(last_opened_at) > self.settings.refresh_interval;

        if self.settings.multi_session {
            match state.records[window.index()].handle.clone() {
                Some(handle) => state.browser.switch_session(&handle)?,
                None => state.open_view(window, &self.settings.quote_url, true, now)?,
            }
        } else {
            state.open_view(window, &self.settings.quote_url, false, now)?;
        }

        if stale {
            tracing::info!("reloading stale view");
            state.browser.refresh()?;
            state.records[window.index()].last_opened_at = now;
        }

        let capture = capture_screenshot(state.browser.as_mut(), self.settings.crop)?;
        Ok(ActiveView {
            state,
            window,
            capture,
            refreshed: stale,
        })
    }

    pub fn record(&self, window: ViewWindow) -> SessionRecord {
        self.state.lock().records[window.index()].clone()
    }

    pub fn shutdown(&self) -> TickerResult<()> {
        self.state.lock().browser.quit()
    }
}

/// A captured view with the pool lock still held.
pub struct ActiveView<'a> {
    state: MutexGuard<'a, PoolState>,
    window: ViewWindow,
    capture: RawCapture,
    refreshed: bool,
}

impl ActiveView<'_> {
    pub fn window(&self) -> ViewWindow {
        self.window
    }

    /// Whether the view was reloaded before this capture.
    pub fn refreshed(&self) -> bool {
        self.refreshed
    }

    /// Releases the pool lock and keeps only the screenshot.
    pub fn into_capture(self) -> RawCapture {
        self.capture
    }
}

impl TextSource for ActiveView<'_> {
    fn read_text(&mut self, locator: &Locator) -> TickerResult<Lookup> {
        self.state.browser.find_text(locator)
    }
}
