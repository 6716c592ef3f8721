//! W3C WebDriver client (geckodriver / Firefox) implementing [`RemoteBrowser`].
//!
//! The client is blocking. Every call happens under the session
//! pool lock on a blocking worker thread.

use std::time::Duration;

use base64::Engine as _;
use reqwest::{Method, blocking::Client};
use serde_json::{Value, json};

use crate::{
    foundation::error::{TickerError, TickerResult},
    remote::{Locator, Lookup, RemoteBrowser, SessionHandle},
};

/// Key under which W3C WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    /// Base URL of the WebDriver server, e.g. `http://127.0.0.1:4444`.
    pub endpoint: String,
    pub browser_name: String,
    pub headless: bool,
    pub browser_args: Vec<String>,
    /// Value for the `intl.accept_languages` preference.
    pub accept_language: String,
    pub request_timeout_secs: u64,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4444".to_string(),
            browser_name: "firefox".to_string(),
            headless: true,
            browser_args: vec![
                "--disable-extensions".to_string(),
                "--no-sandbox".to_string(),
                "--disable-application-cache".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            accept_language: "zh-HK".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl WebDriverSettings {
    pub(crate) fn capabilities(&self) -> Value {
        let mut args = Vec::with_capacity(self.browser_args.len() + 1);
        if self.headless {
            args.push("-headless".to_string());
        }
        args.extend(self.browser_args.iter().cloned());

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": self.browser_name,
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": { "intl.accept_languages": self.accept_language },
                    },
                },
            },
        })
    }
}

/// Error object from a failed WebDriver command.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub(crate) struct WireError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl WireError {
    fn is_no_such_element(&self) -> bool {
        self.error == "no such element"
    }
}

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    value: Value,
}

pub struct WebDriverBrowser {
    client: Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverBrowser {
    /// Starts a new browser session on the WebDriver server.
    pub fn connect(settings: &WebDriverSettings) -> TickerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| TickerError::remote(format!("failed to build webdriver client: {e}")))?;
        let endpoint = settings.endpoint.trim_end_matches('/').to_string();

        tracing::info!(endpoint = %endpoint, browser = %settings.browser_name, "launching remote browser");
        let reply = send(
            &client,
            Method::POST,
            &format!("{endpoint}/session"),
            Some(settings.capabilities()),
        )?
        .map_err(|e| TickerError::remote(format!("new session refused: {}: {}", e.error, e.message)))?;
        let session_id = session_id_from(&reply)?;
        tracing::info!(session = %session_id, "remote browser launched");

        Ok(Self {
            client,
            endpoint,
            session_id,
        })
    }

    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> TickerResult<Result<Value, WireError>> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        send(&self.client, method, &url, body)
    }

    fn exec(&self, method: Method, path: &str, body: Option<Value>) -> TickerResult<Value> {
        self.call(method, path, body)?.map_err(|e| {
            TickerError::remote(format!("webdriver {path} failed: {}: {}", e.error, e.message))
        })
    }
}

fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> TickerResult<Result<Value, WireError>> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req
        .send()
        .map_err(|e| TickerError::remote(format!("webdriver request to {url} failed: {e}")))?;
    let status = resp.status();
    let envelope: Envelope = resp
        .json()
        .map_err(|e| TickerError::remote(format!("webdriver reply from {url} is not json: {e}")))?;

    if status.is_success() {
        Ok(Ok(envelope.value))
    } else {
        Ok(Err(wire_error_from(envelope.value)))
    }
}

fn wire_error_from(value: Value) -> WireError {
    serde_json::from_value(value.clone()).unwrap_or(WireError {
        error: "unknown error".to_string(),
        message: value.to_string(),
    })
}

fn session_id_from(value: &Value) -> TickerResult<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TickerError::remote("new session reply is missing sessionId"))
}

fn element_id_from(value: &Value) -> TickerResult<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TickerError::remote("find element reply is missing an element reference"))
}

fn string_from(value: Value, what: &str) -> TickerResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(TickerError::remote(format!(
            "expected string for {what}, got {other}"
        ))),
    }
}

impl RemoteBrowser for WebDriverBrowser {
    fn navigate(&mut self, url: &str) -> TickerResult<()> {
        self.exec(Method::POST, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn screenshot(&mut self) -> TickerResult<Vec<u8>> {
        let encoded = string_from(self.exec(Method::GET, "/screenshot", None)?, "screenshot")?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| TickerError::remote(format!("screenshot is not valid base64: {e}")))
    }

    fn find_text(&mut self, locator: &Locator) -> TickerResult<Lookup> {
        let body = json!({ "using": locator.strategy(), "value": locator.value() });
        let element = match self.call(Method::POST, "/element", Some(body))? {
            Ok(v) => element_id_from(&v)?,
            Err(e) if e.is_no_such_element() => return Ok(Lookup::NotFound),
            Err(e) => {
                return Err(TickerError::remote(format!(
                    "find element {locator} failed: {}: {}",
                    e.error, e.message
                )));
            }
        };
        let text = self.exec(Method::GET, &format!("/element/{element}/text"), None)?;
        Ok(Lookup::Found(string_from(text, "element text")?))
    }

    fn refresh(&mut self) -> TickerResult<()> {
        self.exec(Method::POST, "/refresh", Some(json!({})))?;
        Ok(())
    }

    fn switch_session(&mut self, handle: &SessionHandle) -> TickerResult<()> {
        self.exec(Method::POST, "/window", Some(json!({ "handle": handle.0 })))?;
        Ok(())
    }

    fn new_session(&mut self) -> TickerResult<SessionHandle> {
        let reply = self.exec(Method::POST, "/window/new", Some(json!({ "type": "tab" })))?;
        let handle = reply
            .get("handle")
            .and_then(Value::as_str)
            .map(|h| SessionHandle(h.to_string()))
            .ok_or_else(|| TickerError::remote("new window reply is missing handle"))?;
        self.switch_session(&handle)?;
        Ok(handle)
    }

    fn current_session(&mut self) -> TickerResult<SessionHandle> {
        let handle = string_from(self.exec(Method::GET, "/window", None)?, "window handle")?;
        Ok(SessionHandle(handle))
    }

    fn current_url(&mut self) -> TickerResult<String> {
        string_from(self.exec(Method::GET, "/url", None)?, "current url")
    }

    fn quit(&mut self) -> TickerResult<()> {
        tracing::info!(session = %self.session_id, "quitting remote browser");
        self.exec(Method::DELETE, "", None)?;
        Ok(())
    }
}
