//! In-process stand-in for the remote browser.
//!
//! Clones share state, so a test can hand one clone to the session pool and
//! keep another to script page content and read call counters.

use std::{collections::HashMap, io::Cursor, sync::Arc};

use anyhow::Context as _;
use parking_lot::Mutex;

use crate::{
    foundation::error::{TickerError, TickerResult},
    remote::{Locator, Lookup, RemoteBrowser, SessionHandle},
};

/// Number of calls made against a [`FakeBrowser`], per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FakeCounters {
    pub navigations: usize,
    pub refreshes: usize,
    pub screenshots: usize,
    pub text_reads: usize,
    pub switches: usize,
    pub new_sessions: usize,
}

impl FakeCounters {
    /// Calls that touched the remote view at all.
    pub fn total(&self) -> usize {
        self.navigations
            + self.refreshes
            + self.screenshots
            + self.text_reads
            + self.switches
            + self.new_sessions
    }
}

#[derive(Debug)]
struct Tab {
    handle: SessionHandle,
    url: String,
}

#[derive(Debug)]
struct FakeState {
    screenshot_png: Vec<u8>,
    texts: HashMap<Locator, String>,
    tabs: Vec<Tab>,
    active: usize,
    next_tab: u64,
    crashed: bool,
    quit: bool,
    counters: FakeCounters,
}

#[derive(Clone, Debug)]
pub struct FakeBrowser {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    /// A browser with one blank tab whose screenshots return `page`.
    pub fn new(page: &image::RgbaImage) -> TickerResult<Self> {
        let browser = Self {
            state: Arc::new(Mutex::new(FakeState {
                screenshot_png: Vec::new(),
                texts: HashMap::new(),
                tabs: vec![Tab {
                    handle: SessionHandle("tab-0".to_string()),
                    url: "about:blank".to_string(),
                }],
                active: 0,
                next_tab: 1,
                crashed: false,
                quit: false,
                counters: FakeCounters::default(),
            })),
        };
        browser.set_page(page)?;
        Ok(browser)
    }

    pub fn set_page(&self, page: &image::RgbaImage) -> TickerResult<()> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(page.clone())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode fake page screenshot")?;
        self.state.lock().screenshot_png = buf;
        Ok(())
    }

    /// Serves `bytes` verbatim as the next screenshots, even if they are not an image.
    pub fn set_screenshot_bytes(&self, bytes: Vec<u8>) {
        self.state.lock().screenshot_png = bytes;
    }

    pub fn set_text(&self, locator: Locator, text: impl Into<String>) {
        self.state.lock().texts.insert(locator, text.into());
    }

    pub fn clear_texts(&self) {
        self.state.lock().texts.clear();
    }

    /// Makes every subsequent call fail as if the browser process died.
    pub fn crash(&self) {
        self.state.lock().crashed = true;
    }

    pub fn recover(&self) {
        self.state.lock().crashed = false;
    }

    pub fn counters(&self) -> FakeCounters {
        self.state.lock().counters
    }

    pub fn tab_count(&self) -> usize {
        self.state.lock().tabs.len()
    }

    pub fn active_url(&self) -> String {
        let st = self.state.lock();
        st.tabs[st.active].url.clone()
    }

    pub fn is_quit(&self) -> bool {
        self.state.lock().quit
    }

    fn with_state<T>(&mut self, f: impl FnOnce(&mut FakeState) -> TickerResult<T>) -> TickerResult<T> {
        let mut st = self.state.lock();
        if st.crashed || st.quit {
            return Err(TickerError::remote("fake browser is not running"));
        }
        f(&mut st)
    }
}

impl RemoteBrowser for FakeBrowser {
    fn navigate(&mut self, url: &str) -> TickerResult<()> {
        self.with_state(|st| {
            st.counters.navigations += 1;
            let active = st.active;
            st.tabs[active].url = url.to_string();
            Ok(())
        })
    }

    fn screenshot(&mut self) -> TickerResult<Vec<u8>> {
        self.with_state(|st| {
            st.counters.screenshots += 1;
            Ok(st.screenshot_png.clone())
        })
    }

    fn find_text(&mut self, locator: &Locator) -> TickerResult<Lookup> {
        self.with_state(|st| {
            st.counters.text_reads += 1;
            Ok(match st.texts.get(locator) {
                Some(text) => Lookup::Found(text.clone()),
                None => Lookup::NotFound,
            })
        })
    }

    fn refresh(&mut self) -> TickerResult<()> {
        self.with_state(|st| {
            st.counters.refreshes += 1;
            Ok(())
        })
    }

    fn switch_session(&mut self, handle: &SessionHandle) -> TickerResult<()> {
        self.with_state(|st| {
            st.counters.switches += 1;
            let idx = st
                .tabs
                .iter()
                .position(|t| &t.handle == handle)
                .ok_or_else(|| TickerError::remote(format!("no such window '{handle}'")))?;
            st.active = idx;
            Ok(())
        })
    }

    fn new_session(&mut self) -> TickerResult<SessionHandle> {
        self.with_state(|st| {
            st.counters.new_sessions += 1;
            let handle = SessionHandle(format!("tab-{}", st.next_tab));
            st.next_tab += 1;
            st.tabs.push(Tab {
                handle: handle.clone(),
                url: "about:blank".to_string(),
            });
            st.active = st.tabs.len() - 1;
            Ok(handle)
        })
    }

    fn current_session(&mut self) -> TickerResult<SessionHandle> {
        self.with_state(|st| Ok(st.tabs[st.active].handle.clone()))
    }

    fn current_url(&mut self) -> TickerResult<String> {
        self.with_state(|st| Ok(st.tabs[st.active].url.clone()))
    }

    fn quit(&mut self) -> TickerResult<()> {
        self.with_state(|st| {
            st.quit = true;
            Ok(())
        })
    }
}
