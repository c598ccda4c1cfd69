//! Scripted in-memory browser session for driving the seat engine in tests.
//!
//! Documents are plain HTML strings evaluated with the `scraper` crate.
//! Clicks and scripts trigger configured effects (a popup appearing, an area
//! selection re-rendering the seat map, the browser crashing).
#![allow(dead_code)]

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use seat_scraper::browser::{
    BrowserSession, FrameRef, ReadyState, RenderingContext, SessionError, SessionResult,
};
use seat_scraper::config::Config;
use seat_scraper::seats::Poller;

#[derive(Debug, Clone)]
pub struct FakeDocument {
    pub html: String,
    pub ready: ReadyState,
}

impl FakeDocument {
    pub fn complete(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ready: ReadyState::Complete,
        }
    }

    pub fn loading(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ready: ReadyState::Loading,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Effect {
    /// Insert markup before `</body>` of the top-level document (once).
    AppendTop(String),
    /// Replace the document loaded by frames with this `src`.
    SetFrame { src: String, html: String },
    /// Load a new top-level address.
    Navigate(String),
    /// The browser process dies.
    Crash,
}

#[derive(Default)]
pub struct FakeSession {
    pub url: Option<String>,
    pub top: Option<FakeDocument>,
    /// Documents reachable by navigation, keyed by address.
    pub pages: HashMap<String, FakeDocument>,
    /// Documents loaded inside frames, keyed by `src`.
    pub frames: HashMap<String, FakeDocument>,
    pub on_click: Vec<(String, Effect)>,
    pub on_script: Vec<(String, Value, Option<Effect>)>,
    pub context: RenderingContext,
    pub clicks: Vec<(String, usize)>,
    pub navigations: Vec<String>,
    pub frame_entries: usize,
    pub closed: bool,
    pub close_calls: usize,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, doc: FakeDocument) -> Self {
        self.pages.insert(url.to_string(), doc);
        self
    }

    pub fn with_frame(mut self, src: &str, doc: FakeDocument) -> Self {
        self.frames.insert(src.to_string(), doc);
        self
    }

    pub fn on_click(mut self, selector: &str, effect: Effect) -> Self {
        self.on_click.push((selector.to_string(), effect));
        self
    }

    pub fn on_script(mut self, needle: &str, result: Value, effect: Option<Effect>) -> Self {
        self.on_script.push((needle.to_string(), result, effect));
        self
    }

    /// Navigate synchronously, for test setup.
    pub fn opened_at(mut self, url: &str) -> Self {
        self.load(url).expect("page registered");
        self.navigations.clear();
        self
    }

    pub fn clicks_on(&self, selector: &str) -> usize {
        self.clicks.iter().filter(|(s, _)| s == selector).count()
    }

    fn check_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed("browser process exited".into()))
        } else {
            Ok(())
        }
    }

    fn load(&mut self, url: &str) -> SessionResult<()> {
        self.context = RenderingContext::TopLevel;
        self.navigations.push(url.to_string());
        match self.pages.get(url) {
            Some(doc) => {
                self.top = Some(doc.clone());
                self.url = Some(url.to_string());
                Ok(())
            }
            None => Err(SessionError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED {}", url))),
        }
    }

    fn frame_src(&self, frame: &FrameRef) -> SessionResult<Option<String>> {
        let top = self
            .top
            .as_ref()
            .ok_or_else(|| SessionError::NotAttached("no top-level document".into()))?;
        let document = Html::parse_document(&top.html);
        let selector = parse_selector(&frame.selector)?;
        let element = document
            .select(&selector)
            .nth(frame.index)
            .ok_or_else(|| SessionError::FrameUnavailable(format!("{} is stale", frame)))?;
        Ok(element.value().attr("src").map(str::to_string))
    }

    fn active(&self) -> SessionResult<&FakeDocument> {
        match &self.context {
            RenderingContext::TopLevel => self
                .top
                .as_ref()
                .ok_or_else(|| SessionError::NotAttached("no top-level document".into())),
            RenderingContext::Nested(frame) => {
                let src = self
                    .frame_src(frame)
                    .map_err(|_| SessionError::NotAttached(format!("{} detached", frame)))?
                    .unwrap_or_default();
                self.frames
                    .get(&src)
                    .ok_or_else(|| SessionError::NotAttached(format!("{} has no document", frame)))
            }
        }
    }

    fn apply(&mut self, effect: Effect) -> SessionResult<()> {
        match effect {
            Effect::AppendTop(markup) => {
                if let Some(top) = self.top.as_mut() {
                    if !top.html.contains(&markup) {
                        top.html = match top.html.rfind("</body>") {
                            Some(pos) => format!("{}{}{}", &top.html[..pos], markup, &top.html[pos..]),
                            None => format!("{}{}", top.html, markup),
                        };
                    }
                }
                Ok(())
            }
            Effect::SetFrame { src, html } => {
                self.frames.insert(src, FakeDocument::complete(html));
                Ok(())
            }
            Effect::Navigate(url) => self.load(&url),
            Effect::Crash => {
                self.closed = true;
                Err(SessionError::Closed("browser process exited".into()))
            }
        }
    }
}

fn parse_selector(css: &str) -> SessionResult<Selector> {
    Selector::parse(css).map_err(|e| SessionError::Script(format!("SyntaxError: {:?}", e)))
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> SessionResult<()> {
        self.check_open()?;
        self.load(url)
    }

    async fn current_url(&self) -> SessionResult<Option<String>> {
        self.check_open()?;
        Ok(self.url.clone())
    }

    async fn ready_state(&self) -> SessionResult<ReadyState> {
        self.check_open()?;
        Ok(self.active()?.ready)
    }

    async fn count(&self, selector: &str) -> SessionResult<usize> {
        self.check_open()?;
        let document = Html::parse_document(&self.active()?.html);
        Ok(document.select(&parse_selector(selector)?).count())
    }

    async fn attributes(&self, selector: &str, name: &str) -> SessionResult<Vec<Option<String>>> {
        self.check_open()?;
        let document = Html::parse_document(&self.active()?.html);
        Ok(document
            .select(&parse_selector(selector)?)
            .map(|el| el.value().attr(name).map(str::to_string))
            .collect())
    }

    async fn html(&self) -> SessionResult<String> {
        self.check_open()?;
        Ok(self.active()?.html.clone())
    }

    async fn click(&mut self, selector: &str, index: usize) -> SessionResult<()> {
        self.check_open()?;
        if self.count(selector).await? <= index {
            return Err(SessionError::NoSuchElement(format!("{}[{}]", selector, index)));
        }
        self.clicks.push((selector.to_string(), index));
        let effects: Vec<Effect> = self
            .on_click
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, effect)| effect.clone())
            .collect();
        for effect in effects {
            self.apply(effect)?;
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> SessionResult<Value> {
        self.check_open()?;
        let matched = self
            .on_script
            .iter()
            .find(|(needle, _, _)| script.contains(needle.as_str()))
            .map(|(_, result, effect)| (result.clone(), effect.clone()));
        match matched {
            Some((result, effect)) => {
                if let Some(effect) = effect {
                    self.apply(effect)?;
                }
                Ok(result)
            }
            None => Ok(Value::Null),
        }
    }

    async fn frame_attached(&self, frame: &FrameRef) -> SessionResult<bool> {
        self.check_open()?;
        let src = self.frame_src(frame)?.unwrap_or_default();
        Ok(self.frames.contains_key(&src))
    }

    async fn switch_to_frame(&mut self, frame: &FrameRef) -> SessionResult<()> {
        if !self.frame_attached(frame).await? {
            return Err(SessionError::FrameUnavailable(format!("{} not attached", frame)));
        }
        self.frame_entries += 1;
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
        self.close_calls += 1;
        self.closed = true;
    }
}

/// Defaults with timeouts short enough for tests.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    let t = &mut config.timeouts;
    t.page_ready = 200;
    t.trigger = 100;
    t.popup = 100;
    t.frame = 100;
    t.frame_ready = 100;
    t.area = 40;
    t.area_settle = 5;
    t.seats = 150;
    t.search_results = 100;
    t.poll_initial = 2;
    t.poll_max = 10;
    config
}

pub fn poller() -> Poller {
    Poller::new(
        Duration::from_millis(2),
        Duration::from_millis(10),
        CancellationToken::new(),
    )
}

pub const SHOW_URL: &str = "https://tickets.example/show/hamlet/";

pub fn event_frame_src(event_id: &str) -> String {
    format!("https://tickets.example/iframe/seatmap?event_id={}", event_id)
}

/// Show page with one row (and trigger link) per event id.
pub fn show_html(title: &str, event_ids: &[&str]) -> String {
    let rows: String = event_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            format!(
                r#"<div class="event_row">
                     <div class="date_time_address">
                       <div class="time_wrap"><span>Haifa</span></div>
                       <div class="address_wrap desktop_only"><span>Hall {i}</span></div>
                     </div>
                     <div class="date-time-sec">
                       <div class="date_wrap"><span>{day}/10/2026</span></div>
                       <div class="time_wrap"><span>20:30</span></div>
                     </div>
                     <a class="load_event_iframe" data-event_id="{id}">Buy</a>
                   </div>"#,
                i = i,
                day = 10 + i,
                id = id
            )
        })
        .collect();
    format!(
        r#"<html><head></head><body><h1>{}</h1><div class="events_list">{}</div></body></html>"#,
        title, rows
    )
}

/// Popup container for `event_id` embedding frames with the given sources.
pub fn popup_markup(event_id: &str, frame_srcs: &[&str]) -> String {
    let frames: String = frame_srcs
        .iter()
        .map(|src| format!(r#"<iframe src="{}"></iframe>"#, src))
        .collect();
    format!(r#"<div id="event_popup_{}" class="popup">{}</div>"#, event_id, frames)
}

pub fn trigger_selector(event_id: &str) -> String {
    format!(r#"a.load_event_iframe[data-event_id="{}"]"#, event_id)
}

/// Seat map with `strict` fully-marked empty seats, `loose` seats carrying
/// only the class marker and `taken` occupied seats.
pub fn seat_map_html(strict: usize, loose: usize, taken: usize) -> String {
    let mut seats = String::new();
    for _ in 0..strict {
        seats.push_str(r#"<a class="seat empty" data-status="empty"></a>"#);
    }
    for _ in 0..loose {
        seats.push_str(r#"<a class="seat empty"></a>"#);
    }
    for _ in 0..taken {
        seats.push_str(r#"<a class="seat taken" data-status="taken"></a>"#);
    }
    format!(
        r#"<html><body><div id="seatmap">{}</div></body></html>"#,
        seats
    )
}

/// Area picker shown before the seat map renders.
pub fn area_picker_html(areas: &[&str]) -> String {
    let links: String = areas
        .iter()
        .map(|name| format!(r##"<a class="area" href="#">{}</a>"##, name))
        .collect();
    format!(
        r#"<html><body><div class="areas_list">{}</div></body></html>"#,
        links
    )
}

/// Session sitting on a show page where clicking each event's trigger opens
/// its popup with a single frame pointing at `event_frame_src(id)`.
pub fn show_session(event_ids: &[&str]) -> FakeSession {
    let mut session = FakeSession::new().with_page(SHOW_URL, FakeDocument::complete(show_html("Hamlet", event_ids)));
    for id in event_ids {
        let src = event_frame_src(id);
        session = session.on_click(&trigger_selector(id), Effect::AppendTop(popup_markup(id, &[src.as_str()])));
    }
    session.opened_at(SHOW_URL)
}
