//! Browser session for live fills.
//!
//! [`LaunchConfig`] is always available so callers can describe a session;
//! the CDP-backed [`ChromiumDriver`] needs the `browser` feature.
//!
//! Elements are addressed through a page-side registry: every element a
//! lookup returns is stored under a short handle, and later calls resolve
//! the handle again. A handle whose node has left the document reports
//! [`crate::DriverError::StaleElement`], the same way a re-rendered widget
//! does on a real page.

use std::path::PathBuf;

/// Environment variable naming the browser executable
pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";

/// Well-known browser locations tried after auto-detection
pub const FALLBACK_EXECUTABLES: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/snap/bin/chromium",
];

/// How to start the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Run without a window
    pub headless: bool,
    /// Explicit executable, tried first
    pub executable: Option<PathBuf>,
    /// Window size
    pub viewport: (u32, u32),
    /// Disable the sandbox (containers)
    pub sandbox: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            viewport: (1366, 900),
            sandbox: true,
        }
    }
}

impl LaunchConfig {
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Executables to try in order; `None` means auto-detection.
    ///
    /// `env_path` is the value of [`CHROMIUM_PATH_ENV`], if set.
    #[must_use]
    pub fn candidates(&self, env_path: Option<&str>) -> Vec<Option<PathBuf>> {
        let mut out: Vec<Option<PathBuf>> = Vec::new();
        let mut push = |candidate: Option<PathBuf>| {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        };
        if let Some(path) = &self.executable {
            push(Some(path.clone()));
        }
        if let Some(path) = env_path.filter(|p| !p.trim().is_empty()) {
            push(Some(PathBuf::from(path.trim())));
        }
        push(None);
        for path in FALLBACK_EXECUTABLES {
            push(Some(PathBuf::from(path)));
        }
        out
    }
}

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::significant_drop_tightening)]
mod cdp {
    use super::{LaunchConfig, CHROMIUM_PATH_ENV};
    use crate::driver::{DomEvent, ElementRef, Key, PageDriver, SelectOption};
    use crate::locator::{Locator, LocatorStrategy};
    use crate::preview::{PreviewDeck, ReviewPanel};
    use crate::result::{DriverError, DriverResult, FillError, FillResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, MouseButton,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tokio::sync::Mutex;

    /// Registry helpers available to every element script
    const PRELUDE: &str = r"
const R = window[REG] || (window[REG] = { seq: 0, byHandle: new Map(), byNode: new WeakMap() });
const reg = (el) => {
  if (!el) return null;
  let h = R.byNode.get(el);
  if (!h) { h = 'e' + (++R.seq); R.byNode.set(el, h); R.byHandle.set(h, el); }
  return h;
};
const get = (h) => {
  const el = R.byHandle.get(h);
  if (!el || !el.isConnected) throw new Error('stale:' + h);
  return el;
};
const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length)
  && getComputedStyle(el).visibility !== 'hidden';
const fire = (el, evs) => {
  for (const e of evs) {
    const ev = e.key !== undefined
      ? new KeyboardEvent(e.type, { key: e.key, bubbles: true })
      : new Event(e.type, { bubbles: true });
    el.dispatchEvent(ev);
  }
};
";

    /// `PageDriver` over one Chromium tab
    pub struct ChromiumDriver {
        browser: Mutex<CdpBrowser>,
        page: Mutex<CdpPage>,
        registry: String,
        handler: tokio::task::JoinHandle<()>,
    }

    impl std::fmt::Debug for ChromiumDriver {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ChromiumDriver")
                .field("registry", &self.registry)
                .finish_non_exhaustive()
        }
    }

    impl ChromiumDriver {
        /// Start a browser, trying each candidate executable in turn
        pub async fn launch(config: &LaunchConfig) -> FillResult<Self> {
            let env_path = std::env::var(CHROMIUM_PATH_ENV).ok();
            let mut last_error = String::from("no candidate executable");
            for candidate in config.candidates(env_path.as_deref()) {
                match Self::launch_with(config, candidate.as_ref()).await {
                    Ok(driver) => return Ok(driver),
                    Err(err) => {
                        tracing::debug!(executable = ?candidate, error = %err, "browser launch failed");
                        last_error = err;
                    }
                }
            }
            Err(FillError::BrowserNotFound {
                message: last_error,
            })
        }

        async fn launch_with(
            config: &LaunchConfig,
            executable: Option<&PathBuf>,
        ) -> Result<Self, String> {
            let (width, height) = config.viewport;
            let mut builder = CdpConfig::builder().window_size(width, height);
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(path) = executable {
                builder = builder.chrome_executable(path);
            }
            let cdp_config = builder.build()?;
            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| e.to_string())?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| e.to_string())?;
            tracing::info!(executable = ?executable, headless = config.headless, "browser started");
            Ok(Self {
                browser: Mutex::new(browser),
                page: Mutex::new(page),
                registry: format!("__formwright_{}", uuid::Uuid::new_v4().simple()),
                handler,
            })
        }

        /// Close the browser
        pub async fn close(self) -> FillResult<()> {
            let mut browser = self.browser.lock().await;
            browser.close().await.map_err(|e| FillError::BrowserLaunch {
                message: e.to_string(),
            })?;
            self.handler.abort();
            Ok(())
        }

        /// Run `body` (a function body using the registry helpers) and
        /// return its JSON result
        async fn call(&self, body: &str) -> DriverResult<Value> {
            let script = format!(
                "(() => {{ const REG = {reg:?};{PRELUDE}\ntry {{ const ok = (() => {{ {body} }})(); \
                 return JSON.stringify({{ ok: ok === undefined ? null : ok }}); }} \
                 catch (e) {{ return JSON.stringify({{ err: String((e && e.message) || e) }}); }} }})()",
                reg = self.registry,
            );
            let raw: String = {
                let page = self.page.lock().await;
                page.evaluate(script)
                    .await
                    .map_err(|e| DriverError::transient(e.to_string()))?
                    .into_value()
                    .map_err(|e| DriverError::script(e.to_string()))?
            };
            let mut reply: Value =
                serde_json::from_str(&raw).map_err(|e| DriverError::script(e.to_string()))?;
            if let Some(err) = reply.get("err").and_then(Value::as_str) {
                return Err(page_error(err));
            }
            Ok(reply.get_mut("ok").map(Value::take).unwrap_or(Value::Null))
        }

        async fn call_unit(&self, body: &str) -> DriverResult<()> {
            self.call(body).await.map(|_| ())
        }

        async fn call_bool(&self, body: &str) -> DriverResult<bool> {
            Ok(self.call(body).await?.as_bool().unwrap_or(false))
        }

        async fn call_string(&self, body: &str) -> DriverResult<String> {
            Ok(match self.call(body).await? {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            })
        }

        async fn call_handle(&self, body: &str) -> DriverResult<Option<ElementRef>> {
            Ok(self
                .call(body)
                .await?
                .as_str()
                .map(ElementRef::new))
        }

        async fn key_event(
            &self,
            kind: DispatchKeyEventType,
            key: &str,
            code: &str,
            vk: i64,
            text: Option<&str>,
        ) -> DriverResult<()> {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key)
                .code(code)
                .windows_virtual_key_code(vk);
            if let Some(text) = text {
                builder = builder.text(text);
            }
            let params = builder.build().map_err(DriverError::script)?;
            let page = self.page.lock().await;
            page.execute(params)
                .await
                .map_err(|e| DriverError::transient(e.to_string()))?;
            Ok(())
        }

        async fn mouse_event(
            &self,
            kind: DispatchMouseEventType,
            x: f64,
            y: f64,
        ) -> DriverResult<()> {
            let params = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(x)
                .y(y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(DriverError::script)?;
            let page = self.page.lock().await;
            page.execute(params)
                .await
                .map_err(|e| DriverError::transient(e.to_string()))?;
            Ok(())
        }
    }

    fn page_error(message: &str) -> DriverError {
        if let Some(handle) = message.strip_prefix("stale:") {
            DriverError::StaleElement {
                handle: handle.to_string(),
            }
        } else if let Some(rest) = message.strip_prefix("not interactable:") {
            DriverError::not_interactable(rest.trim())
        } else {
            DriverError::script(message)
        }
    }

    fn lit(s: &str) -> String {
        Value::from(s).to_string()
    }

    fn events_literal(events: &[DomEvent]) -> String {
        Value::Array(
            events
                .iter()
                .map(|e| match e {
                    DomEvent::KeyUp(c) => json!({ "type": e.name(), "key": c.to_string() }),
                    _ => json!({ "type": e.name() }),
                })
                .collect(),
        )
        .to_string()
    }

    /// Expression resolving `locator` under the element bound to `root`
    fn scoped_query(locator: &Locator) -> String {
        match (locator.strategy, locator.to_css()) {
            (LocatorStrategy::XPath, _) | (_, None) => format!(
                "document.evaluate({}, root, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                lit(&locator.value)
            ),
            (_, Some(css)) => format!("root.querySelector({})", lit(&css)),
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumDriver {
        async fn find(&self, locator: &Locator) -> DriverResult<Option<ElementRef>> {
            self.call_handle(&format!("return reg({});", locator.to_query()))
                .await
        }

        async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>> {
            let value = self
                .call(&format!("return {}.map(reg);", locator.to_query_all()))
                .await?;
            Ok(value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ElementRef::new)
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn find_within(
            &self,
            root: &ElementRef,
            locator: &Locator,
        ) -> DriverResult<Option<ElementRef>> {
            self.call_handle(&format!(
                "const root = get({}); return reg({});",
                lit(root.handle()),
                scoped_query(locator)
            ))
            .await
        }

        async fn adjacent(
            &self,
            element: &ElementRef,
            class_fragment: &str,
        ) -> DriverResult<Option<ElementRef>> {
            self.call_handle(&format!(
                "let n = get({}).nextElementSibling; \
                 while (n) {{ if (String(n.className).includes({})) return reg(n); n = n.nextElementSibling; }} \
                 return null;",
                lit(element.handle()),
                lit(class_fragment)
            ))
            .await
        }

        async fn text(&self, element: &ElementRef) -> DriverResult<String> {
            self.call_string(&format!(
                "const el = get({}); return (el.innerText || el.textContent || '').trim();",
                lit(element.handle())
            ))
            .await
        }

        async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
            let value = self
                .call(&format!(
                    "return get({}).getAttribute({});",
                    lit(element.handle()),
                    lit(name)
                ))
                .await?;
            Ok(value.as_str().map(str::to_string))
        }

        async fn value(&self, element: &ElementRef) -> DriverResult<String> {
            self.call_string(&format!(
                "const v = get({}).value; return v == null ? '' : String(v);",
                lit(element.handle())
            ))
            .await
        }

        async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool> {
            self.call_bool(&format!("return visible(get({}));", lit(element.handle())))
                .await
        }

        async fn is_enabled(&self, element: &ElementRef) -> DriverResult<bool> {
            self.call_bool(&format!("return !get({}).disabled;", lit(element.handle())))
                .await
        }

        async fn is_focused(&self, element: &ElementRef) -> DriverResult<bool> {
            self.call_bool(&format!(
                "return document.activeElement === get({});",
                lit(element.handle())
            ))
            .await
        }

        async fn scroll_into_view(&self, element: &ElementRef) -> DriverResult<()> {
            self.call_unit(&format!(
                "get({}).scrollIntoView({{ block: 'center' }});",
                lit(element.handle())
            ))
            .await
        }

        async fn focus(&self, element: &ElementRef) -> DriverResult<()> {
            self.call_unit(&format!("get({}).focus();", lit(element.handle())))
                .await
        }

        async fn click(&self, element: &ElementRef) -> DriverResult<()> {
            self.call_unit(&format!(
                "const el = get({}); \
                 if (!visible(el)) throw new Error('not interactable: element is hidden'); \
                 if (el.disabled) throw new Error('not interactable: element is disabled'); \
                 el.click();",
                lit(element.handle())
            ))
            .await
        }

        async fn pointer_click(&self, element: &ElementRef) -> DriverResult<()> {
            let point = self
                .call(&format!(
                    "const el = get({}); el.scrollIntoView({{ block: 'center' }}); \
                     const r = el.getBoundingClientRect(); \
                     if (!r.width || !r.height) throw new Error('not interactable: element has no size'); \
                     return [r.left + r.width / 2, r.top + r.height / 2];",
                    lit(element.handle())
                ))
                .await?;
            let coord = |i: usize| point.get(i).and_then(Value::as_f64).unwrap_or_default();
            let (x, y) = (coord(0), coord(1));
            self.mouse_event(DispatchMouseEventType::MouseMoved, x, y).await?;
            self.mouse_event(DispatchMouseEventType::MousePressed, x, y).await?;
            self.mouse_event(DispatchMouseEventType::MouseReleased, x, y).await
        }

        async fn clear(&self, element: &ElementRef) -> DriverResult<()> {
            self.call_unit(&format!(
                "const el = get({}); el.value = ''; fire(el, [{{ type: 'input' }}]);",
                lit(element.handle())
            ))
            .await
        }

        async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()> {
            self.focus(element).await?;
            let mut buf = [0_u8; 4];
            for c in text.chars() {
                let key = &*c.encode_utf8(&mut buf);
                self.key_event(DispatchKeyEventType::KeyDown, key, "", 0, Some(key))
                    .await?;
                self.key_event(DispatchKeyEventType::KeyUp, key, "", 0, None)
                    .await?;
            }
            Ok(())
        }

        async fn press_key(&self, element: &ElementRef, key: Key) -> DriverResult<()> {
            self.focus(element).await?;
            let name = key.dom_key();
            let text = matches!(key, Key::Enter).then_some("\r");
            self.key_event(DispatchKeyEventType::KeyDown, name, name, key.key_code(), text)
                .await?;
            self.key_event(DispatchKeyEventType::KeyUp, name, name, key.key_code(), None)
                .await
        }

        async fn set_value(
            &self,
            element: &ElementRef,
            value: &str,
            events: &[DomEvent],
        ) -> DriverResult<()> {
            self.call_unit(&format!(
                "const el = get({}); el.value = {}; fire(el, {});",
                lit(element.handle()),
                lit(value),
                events_literal(events)
            ))
            .await
        }

        async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> DriverResult<()> {
            self.call_unit(&format!(
                "fire(get({}), {});",
                lit(element.handle()),
                events_literal(&[event])
            ))
            .await
        }

        async fn options(&self, element: &ElementRef) -> DriverResult<Vec<SelectOption>> {
            let value = self
                .call(&format!(
                    "return Array.from(get({}).options || []).map(o => ({{ text: (o.text || '').trim(), value: o.value }}));",
                    lit(element.handle())
                ))
                .await?;
            serde_json::from_value(value).map_err(|e| DriverError::script(e.to_string()))
        }

        async fn select_index(&self, element: &ElementRef, index: usize) -> DriverResult<()> {
            self.call_unit(&format!(
                "const el = get({}); const i = {index}; \
                 if (!el.options || i >= el.options.length) throw new Error('not interactable: no option ' + i); \
                 el.selectedIndex = i; fire(el, [{{ type: 'input' }}, {{ type: 'change' }}]);",
                lit(element.handle())
            ))
            .await
        }

        async fn force_selection(
            &self,
            holder: &ElementRef,
            value: &str,
            text: &str,
        ) -> DriverResult<bool> {
            self.call_bool(&format!(
                "const el = get({h}); const $ = window.jQuery; \
                 if (!$ || !$.fn || !$.fn.select2) return false; \
                 const $el = $(el); \
                 $el.empty().append(new Option({t}, {v}, true, true)); \
                 $el.trigger({{ type: 'select2:select', params: {{ data: {{ id: {v}, text: {t} }} }} }}); \
                 $el.trigger('change'); \
                 return true;",
                h = lit(holder.handle()),
                v = lit(value),
                t = lit(text)
            ))
            .await
        }

        async fn blur_active(&self) -> DriverResult<()> {
            self.call_unit(
                "const a = document.activeElement; if (a && a !== document.body && a.blur) a.blur();",
            )
            .await
        }

        async fn current_url(&self) -> DriverResult<String> {
            self.call_string("return location.href;").await
        }

        async fn navigate(&self, url: &str) -> DriverResult<()> {
            let page = self.page.lock().await;
            page.goto(url)
                .await
                .map_err(|e| DriverError::SessionLost {
                    message: format!("navigation to {url} failed: {e}"),
                })?;
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> DriverResult<Value> {
            let page = self.page.lock().await;
            let result = page
                .evaluate(script)
                .await
                .map_err(|e| DriverError::script(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }
    }

    #[async_trait]
    impl ReviewPanel for ChromiumDriver {
        async fn render(&self, deck: &PreviewDeck) -> DriverResult<()> {
            self.evaluate(&deck.render_script()).await.map(|_| ())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
