use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

use crate::browser::BrowserSession;
use crate::common::error::{FailureKind, Result, ScraperError};
use crate::common::types::{EventIdentifier, EventRecord, SeatAvailability, UnresolvedReason};
use crate::config::{Config, SelectorConfig, TimeoutConfig};
use crate::metrics::ShowMetrics;
use crate::seats::SeatResolver;

/// Literal fields of one event row, before its seats are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRow {
    pub index: usize,
    pub city: String,
    pub hall: String,
    pub date: String,
    pub time: String,
    /// `None` when the row's event link carries no id.
    pub event_id: Option<EventIdentifier>,
}

impl ShowRow {
    fn into_record(self, title: &str, seats: SeatAvailability) -> EventRecord {
        EventRecord {
            title: title.to_string(),
            city: self.city,
            hall: self.hall,
            date: self.date,
            time: self.time,
            event_id: self.event_id.unwrap_or_else(|| EventIdentifier::new("")),
            seats,
        }
    }
}

/// A show-detail page snapshot: title plus one entry per event row.
#[derive(Debug)]
pub struct ShowPage {
    pub title: String,
    pub rows: Vec<ShowRow>,
}

/// Everything scraped from one show-detail page. There is one record per row.
#[derive(Debug)]
pub struct ShowScrape {
    pub url: String,
    pub title: String,
    pub records: Vec<EventRecord>,
    /// Rows recorded as unresolved because their event id could not be read.
    pub rows_without_id: usize,
}

impl ShowScrape {
    pub fn resolved(&self) -> usize {
        self.records.iter().filter(|r| r.seats.is_resolved()).count()
    }
}

struct RowSelectors {
    row: Selector,
    city: Selector,
    hall: Selector,
    date: Selector,
    time: Selector,
    event_link: Selector,
}

fn selector(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::Config(format!("Invalid selector {} = '{}': {:?}", name, css, e)))
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Parse the title and event rows out of a show-detail page.
///
/// Every row is returned. A missing event id is `None`; any other missing
/// field becomes an empty string.
pub fn parse_show_page(html: &str, config: &SelectorConfig) -> Result<ShowPage> {
    let document = Html::parse_document(html);
    let title_selector = selector("show_title", &config.show_title)?;
    let selectors = RowSelectors {
        row: selector("event_row", &config.event_row)?,
        city: selector("city", &config.city)?,
        hall: selector("hall", &config.hall)?,
        date: selector("date", &config.date)?,
        time: selector("time", &config.time)?,
        event_link: selector("event_link", &config.event_link)?,
    };

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();
    if title.is_empty() {
        warn!("Show page has no title");
    }

    let rows = document
        .select(&selectors.row)
        .enumerate()
        .map(|(index, row)| parse_row(index, row, &selectors, &config.event_id_attribute))
        .collect();

    Ok(ShowPage { title, rows })
}

fn parse_row(index: usize, row: ElementRef<'_>, selectors: &RowSelectors, id_attribute: &str) -> ShowRow {
    let event_id = row
        .select(&selectors.event_link)
        .next()
        .and_then(|link| link.value().attr(id_attribute))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(EventIdentifier::new);

    let field = |name: &str, selector: &Selector| {
        first_text(row, selector).unwrap_or_else(|| {
            warn!(row = index, field = name, "event row is missing a field");
            String::new()
        })
    };

    ShowRow {
        index,
        city: field("city", &selectors.city),
        hall: field("hall", &selectors.hall),
        date: field("date", &selectors.date),
        time: field("time", &selectors.time),
        event_id,
    }
}

/// Per show-detail page: enumerate event rows in order and resolve each one.
pub struct ShowScraper<'c> {
    config: &'c Config,
    resolver: &'c SeatResolver<'c>,
}

impl<'c> ShowScraper<'c> {
    pub fn new(config: &'c Config, resolver: &'c SeatResolver<'c>) -> Self {
        Self { config, resolver }
    }

    /// Navigate to the show page and wait until it is usable.
    async fn load<S>(&self, session: &mut S, show_url: &str) -> Result<()>
    where
        S: BrowserSession + ?Sized,
    {
        let timeout = TimeoutConfig::ms(self.config.timeouts.page_ready);
        let poller = self.resolver.poller();
        session.navigate(show_url).await?;
        poller.wait_for_ready(&*session, "show page ready", timeout).await?;
        match poller
            .wait_for_selector(&*session, &self.config.selectors.event_row, "event rows", timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(ScraperError::Timeout { .. }) => {
                debug!("No event rows appeared on show page");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Scrape every event row of `show_url`.
    ///
    /// Rows are processed strictly in page order and each one yields a record.
    /// Row-level failures end up as `Unresolved` seats; only fatal errors, or a
    /// show page that cannot be loaded at all, are returned as `Err`.
    #[instrument(skip(self, session))]
    pub async fn scrape<S>(&self, session: &mut S, show_url: &str) -> Result<ShowScrape>
    where
        S: BrowserSession + ?Sized,
    {
        self.load(session, show_url).await?;
        let html = session.html().await?;
        let page = parse_show_page(&html, &self.config.selectors)?;
        info!(title = %page.title, rows = page.rows.len(), "Found event rows");

        let mut records = Vec::with_capacity(page.rows.len());
        let mut rows_without_id = 0;
        let mut on_show_page = true;

        for row in page.rows {
            let Some(event_id) = row.event_id.clone() else {
                warn!(row = row.index, "Event row has no event id");
                ShowMetrics::record_row_without_id();
                rows_without_id += 1;
                let reason = UnresolvedReason::new(
                    FailureKind::StructureMismatch,
                    format!("row {} has no {}", row.index, self.config.selectors.event_id_attribute),
                );
                records.push(row.into_record(&page.title, SeatAvailability::Unresolved(reason)));
                continue;
            };

            if !on_show_page {
                ShowMetrics::record_renavigation();
                match self.load(session, show_url).await {
                    Ok(()) => on_show_page = true,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(event_id = %event_id, error = %e, "Could not return to show page");
                        let seats = SeatAvailability::Unresolved(UnresolvedReason::from(&e));
                        records.push(row.into_record(&page.title, seats));
                        continue;
                    }
                }
            }

            let resolution = self.resolver.resolve(session, &event_id).await?;
            if resolution.left_page {
                on_show_page = false;
            }
            debug!(event_id = %event_id, seats = %resolution.availability, "Event resolved");
            records.push(row.into_record(&page.title, resolution.availability));
        }

        Ok(ShowScrape {
            url: show_url.to_string(),
            title: page.title,
            records,
            rows_without_id,
        })
    }
}
