//! Capability surface of the shared remote browser.
//!
//! The pipeline never talks to a concrete automation technology. Everything
//! goes through [`RemoteBrowser`], which is implemented by the WebDriver client
//! in [`webdriver`] and by the in-process `FakeBrowser` (feature `test-support`).

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod webdriver;

use std::fmt;

use crate::foundation::error::TickerResult;

/// Opaque reference to one live page view (a browser tab).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural element locator on the remote page.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    XPath(String),
    Css(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    pub(crate) fn strategy(&self) -> &'static str {
        match self {
            Locator::XPath(_) => "xpath",
            Locator::Css(_) => "css selector",
        }
    }

    pub(crate) fn value(&self) -> &str {
        match self {
            Locator::XPath(v) | Locator::Css(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Outcome of a structural text read. A missing element is an expected
/// outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    NotFound,
}

pub trait RemoteBrowser: Send {
    fn navigate(&mut self, url: &str) -> TickerResult<()>;
    /// PNG-encoded capture of the active view.
    fn screenshot(&mut self) -> TickerResult<Vec<u8>>;
    fn find_text(&mut self, locator: &Locator) -> TickerResult<Lookup>;
    fn refresh(&mut self) -> TickerResult<()>;
    fn switch_session(&mut self, handle: &SessionHandle) -> TickerResult<()>;
    /// Opens a new view and makes it the active one.
    fn new_session(&mut self) -> TickerResult<SessionHandle>;
    fn current_session(&mut self) -> TickerResult<SessionHandle>;
    fn current_url(&mut self) -> TickerResult<String>;
    fn quit(&mut self) -> TickerResult<()>;
}

/// Anything a structural text read can be served from. The session pool's
/// active view implements this so reads happen under the pool lock.
pub trait TextSource {
    fn read_text(&mut self, locator: &Locator) -> TickerResult<Lookup>;
}
