use reqwest::Url;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::browser::{BrowserSession, SessionError};
use crate::common::error::{Result, ScraperError};
use crate::config::{Config, SiteConfig, TimeoutConfig};
use crate::seats::Poller;

/// Drives the site's search box and collects show-detail links.
pub struct ShowSearch<'c> {
    config: &'c Config,
    poller: &'c Poller,
}

impl<'c> ShowSearch<'c> {
    pub fn new(config: &'c Config, poller: &'c Poller) -> Self {
        Self { config, poller }
    }

    #[instrument(skip(self, session))]
    pub async fn search<S>(&self, session: &mut S, show_name: &str) -> Result<Vec<String>>
    where
        S: BrowserSession + ?Sized,
    {
        let site = &self.config.site;
        let timeouts = &self.config.timeouts;
        let page_ready = TimeoutConfig::ms(timeouts.page_ready);

        session.navigate(&site.base_url).await?;
        self.poller.wait_for_ready(&*session, "home page ready", page_ready).await?;
        self.poller
            .wait_for_selector(&*session, &site.search_input, "search box", page_ready)
            .await?;

        let before = session.current_url().await?;
        let submitted = session
            .evaluate(&submit_search_script(&site.search_input, show_name))
            .await?;
        if submitted != Value::Bool(true) {
            return Err(ScraperError::StructureMismatch(format!(
                "search box {} could not be submitted",
                site.search_input
            )));
        }

        // Form searches navigate to a results URL; in-page searches do not.
        let results_timeout = TimeoutConfig::ms(timeouts.search_results);
        let navigated = {
            let probe_session: &S = session;
            let before = before.as_deref();
            self.poller
                .wait_until("search navigation", results_timeout, || async move {
                    let now = probe_session.current_url().await?;
                    Ok::<bool, SessionError>(now.as_deref() != before)
                })
                .await
        };
        match navigated {
            Ok(()) => {
                self.poller
                    .wait_for_ready(&*session, "search results ready", page_ready)
                    .await?
            }
            Err(ScraperError::Timeout { .. }) => debug!("search stayed on the same address"),
            Err(e) => return Err(e),
        }

        match self
            .poller
            .wait_for_selector(&*session, &site.result_tile, "search results", results_timeout)
            .await
        {
            Ok(()) => {}
            Err(ScraperError::Timeout { .. }) => {
                warn!("No search results for '{}'", show_name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        let html = session.html().await?;
        let page_url = session.current_url().await?;
        let links = parse_result_links(&html, site, page_url.as_deref())?;
        info!("Found {} show links", links.len());
        Ok(links)
    }
}

fn submit_search_script(input_selector: &str, query: &str) -> String {
    format!(
        r#"(() => {{
            const input = document.querySelector({sel});
            if (!input) return false;
            input.focus();
            input.value = {query};
            input.dispatchEvent(new Event('input', {{ bubbles: true }}));
            const form = input.form;
            if (form) {{
                if (form.requestSubmit) form.requestSubmit(); else form.submit();
                return true;
            }}
            for (const type of ['keydown', 'keypress', 'keyup']) {{
                input.dispatchEvent(new KeyboardEvent(type, {{ key: 'Enter', keyCode: 13, bubbles: true }}));
            }}
            return true;
        }})()"#,
        sel = Value::String(input_selector.to_string()),
        query = Value::String(query.to_string())
    )
}

/// Links of every result tile, resolved against the page address.
/// Tiles without a link are skipped; duplicates keep their first position.
pub fn parse_result_links(html: &str, site: &SiteConfig, page_url: Option<&str>) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let tile_selector = Selector::parse(&site.result_tile)
        .map_err(|e| ScraperError::Config(format!("Invalid site.result_tile: {:?}", e)))?;
    let link_selector = Selector::parse(&site.result_link)
        .map_err(|e| ScraperError::Config(format!("Invalid site.result_link: {:?}", e)))?;
    let base = page_url.and_then(|u| Url::parse(u).ok());

    let mut links: Vec<String> = Vec::new();
    for tile in document.select(&tile_selector) {
        let Some(href) = tile
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
        else {
            continue;
        };

        let absolute = match (&base, Url::parse(href)) {
            (_, Ok(url)) => url.to_string(),
            (Some(base), Err(_)) => match base.join(href) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            },
            (None, Err(_)) => href.to_string(),
        };
        if !links.contains(&absolute) {
            debug!("Found link: {}", absolute);
            links.push(absolute);
        }
    }
    Ok(links)
}
