use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{BrowserSession, FrameRef, ReadyState, RenderingContext, SessionError, SessionResult};
use crate::config::BrowserSettings;

/// A single Chrome tab driven over CDP.
///
/// Nested contexts are not a protocol-level target switch: every DOM read or
/// click is wrapped in a script whose `doc` is either `document` or the
/// `contentDocument` of the active frame. Frames whose document cannot be
/// reached from the top-level page (cross-origin, detached) report
/// `FrameUnavailable` / `NotAttached`, which the resolver answers with its
/// direct-navigation path.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    context: RenderingContext,
}

impl ChromeSession {
    #[instrument(skip(settings), fields(headless = settings.headless))]
    pub async fn launch(settings: &BrowserSettings) -> SessionResult<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!(
                "--window-size={},{}",
                settings.window_width, settings.window_height
            ))
            .args(settings.extra_args.clone());
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(SessionError::Closed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Closed(format!("failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Closed(format!("failed to open page: {}", e)))?;

        info!("Browser session started");
        Ok(Self {
            browser,
            page,
            handler,
            context: RenderingContext::TopLevel,
        })
    }

    /// JS expression yielding the active context's document (or null).
    fn scope_expr(&self) -> String {
        match &self.context {
            RenderingContext::TopLevel => "document".to_string(),
            RenderingContext::Nested(frame) => format!("({}.doc || null)", frame_state_js(frame)),
        }
    }

    async fn eval_value(&self, script: String) -> SessionResult<Value> {
        let result = self.page.evaluate(script).await.map_err(map_cdp)?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    /// Run `body` (a function body over `doc`) in the active context.
    async fn run_scoped(&self, body: &str) -> SessionResult<Value> {
        let script = format!(
            r#"(() => {{
                const doc = {scope};
                if (!doc || !doc.documentElement) return {{ detached: true }};
                try {{
                    return {{ value: ((doc) => {{ {body} }})(doc) }};
                }} catch (e) {{
                    return {{ error: String(e) }};
                }}
            }})()"#,
            scope = self.scope_expr(),
            body = body
        );

        let mut result = self.eval_value(script).await?;
        if result.get("detached").and_then(Value::as_bool).unwrap_or(false) {
            return Err(SessionError::NotAttached(format!(
                "document for {:?} is not attached",
                self.context
            )));
        }
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            return Err(SessionError::Script(error.to_string()));
        }
        Ok(result.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> SessionResult<()> {
        self.context = RenderingContext::TopLevel;
        self.page.goto(url).await.map_err(map_navigation)?;
        self.page.wait_for_navigation().await.map_err(map_navigation)?;
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<Option<String>> {
        self.page.url().await.map_err(map_cdp)
    }

    async fn ready_state(&self) -> SessionResult<ReadyState> {
        let value = self.run_scoped("return doc.readyState;").await?;
        let state = value.as_str().unwrap_or_default();
        ReadyState::parse(state)
            .ok_or_else(|| SessionError::Script(format!("unknown readyState '{}'", state)))
    }

    async fn count(&self, selector: &str) -> SessionResult<usize> {
        let body = format!("return doc.querySelectorAll({}).length;", js_str(selector));
        let value = self.run_scoped(&body).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn attributes(&self, selector: &str, name: &str) -> SessionResult<Vec<Option<String>>> {
        let body = format!(
            "return Array.from(doc.querySelectorAll({})).map(e => e.getAttribute({}));",
            js_str(selector),
            js_str(name)
        );
        let value = self.run_scoped(&body).await?;
        serde_json::from_value(value).map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn html(&self) -> SessionResult<String> {
        let value = self.run_scoped("return doc.documentElement.outerHTML;").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&mut self, selector: &str, index: usize) -> SessionResult<()> {
        let body = format!(
            "const el = doc.querySelectorAll({sel})[{idx}]; \
             if (!el) return false; \
             el.scrollIntoView({{ block: 'center' }}); \
             el.click(); \
             return true;",
            sel = js_str(selector),
            idx = index
        );
        match self.run_scoped(&body).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(SessionError::NoSuchElement(format!("{}[{}]", selector, index))),
        }
    }

    async fn evaluate(&mut self, script: &str) -> SessionResult<Value> {
        self.eval_value(script.to_string()).await
    }

    async fn frame_attached(&self, frame: &FrameRef) -> SessionResult<bool> {
        let script = format!("{}.state", frame_state_js(frame));
        match self.eval_value(script).await?.as_str() {
            Some("attached") => Ok(true),
            Some("missing") => Err(SessionError::FrameUnavailable(format!("{} is stale", frame))),
            _ => Ok(false),
        }
    }

    async fn switch_to_frame(&mut self, frame: &FrameRef) -> SessionResult<()> {
        if !self.frame_attached(frame).await? {
            return Err(SessionError::FrameUnavailable(format!(
                "{} has no reachable document",
                frame
            )));
        }
        self.context = RenderingContext::Nested(frame.clone());
        Ok(())
    }

    fn exit_to_top(&mut self) {
        self.context = RenderingContext::TopLevel;
    }

    fn context(&self) -> &RenderingContext {
        &self.context
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        self.handler.abort();
    }
}

/// JS expression evaluating to `{ state, doc }` for `frame`.
///
/// `state` is `missing`, `blocked` (cross-origin), `empty` or `attached`; `doc`
/// is only set when attached. A frame whose `src` has not loaded yet still
/// exposes its initial `about:blank` document, which counts as `empty`.
fn frame_state_js(frame: &FrameRef) -> String {
    format!(
        r#"(() => {{
            const f = document.querySelectorAll({sel})[{idx}];
            if (!f) return {{ state: "missing" }};
            let d = null;
            try {{ d = f.contentDocument; }} catch (_) {{ d = null; }}
            if (!d) return {{ state: "blocked" }};
            const src = (f.getAttribute("src") || "").trim();
            const pending = src !== "" && src !== "about:blank" && d.location.href === "about:blank";
            if (pending || !d.documentElement) return {{ state: "empty" }};
            return {{ state: "attached", doc: d }};
        }})()"#,
        sel = js_str(&frame.selector),
        idx = frame.index
    )
}

fn js_str(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Lost protocol connections are fatal; everything else is a script-level failure.
fn map_cdp(err: CdpError) -> SessionError {
    let message = err.to_string();
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            SessionError::Closed(message)
        }
        _ => SessionError::Script(message),
    }
}

fn map_navigation(err: CdpError) -> SessionError {
    match map_cdp(err) {
        SessionError::Script(message) => SessionError::Navigation(message),
        other => other,
    }
}
