use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::browser::{BrowserSession, ChromeSession};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{EventIdentifier, EventRecord, Resolution};
use crate::config::{BrowserSettings, Config, TimeoutConfig};
use crate::scrapers::{ShowScrape, ShowScraper, ShowSearch};
use crate::seats::{Poller, SeatResolver};

/// Opens browser sessions; the pipeline asks for a fresh one after a session fault.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession;

    async fn open(&self) -> Result<Self::Session>;
}

pub struct ChromeSessionFactory {
    settings: BrowserSettings,
}

impl ChromeSessionFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn open(&self) -> Result<ChromeSession> {
        Ok(ChromeSession::launch(&self.settings).await?)
    }
}

/// Counters for one full run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub shows_requested: usize,
    pub links_visited: usize,
    pub records: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub rows_without_id: usize,
    pub failed_pages: usize,
    pub session_restarts: u32,
}

impl RunSummary {
    fn absorb(&mut self, scrape: &ShowScrape) {
        let resolved = scrape.resolved();
        self.links_visited += 1;
        self.records += scrape.records.len();
        self.resolved += resolved;
        self.unresolved += scrape.records.len() - resolved;
        self.rows_without_id += scrape.rows_without_id;
    }

    /// Share of records without a seat count. Zero when nothing was scraped.
    pub fn unresolved_rate(&self) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            self.unresolved as f64 / self.records as f64
        }
    }

    pub fn exceeds(&self, threshold: f64) -> bool {
        self.unresolved_rate() > threshold
    }
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub records: Vec<EventRecord>,
    pub summary: RunSummary,
}

pub struct Pipeline<'c, F: SessionFactory> {
    config: &'c Config,
    factory: F,
    poller: Poller,
}

impl<'c, F: SessionFactory> Pipeline<'c, F> {
    pub fn new(config: &'c Config, factory: F, poller: Poller) -> Self {
        Self {
            config,
            factory,
            poller,
        }
    }

    /// Replace a faulted session, or give up when the restart budget is spent.
    async fn restart(&self, session: &mut F::Session, restarts: &mut u32, cause: ScraperError) -> Result<()> {
        if matches!(cause, ScraperError::Cancelled(_)) || *restarts >= self.config.run.max_session_restarts {
            error!("Aborting run: {}", cause);
            return Err(cause);
        }
        warn!(
            restart = *restarts + 1,
            "Browser session faulted ({}), opening a new one", cause
        );
        session.close().await;
        *session = self.factory.open().await?;
        *restarts += 1;
        Ok(())
    }

    /// Search every show name and scrape every show link, in order.
    #[instrument(skip(self, show_names), fields(shows = show_names.len()))]
    pub async fn run(&self, show_names: &[String]) -> Result<PipelineResult> {
        let resolver = SeatResolver::new(self.config, self.poller.clone());
        let search = ShowSearch::new(self.config, &self.poller);
        let scraper = ShowScraper::new(self.config, &resolver);

        let mut summary = RunSummary {
            shows_requested: show_names.len(),
            ..RunSummary::default()
        };
        let mut records = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut session = self.factory.open().await?;

        for name in show_names {
            println!("🔎 Searching for: {}", name);
            let links = loop {
                match search.search(&mut session, name).await {
                    Ok(links) => break links,
                    Err(e) if e.is_fatal() => {
                        if let Err(e) = self.restart(&mut session, &mut summary.session_restarts, e).await {
                            session.close().await;
                            return Err(e);
                        }
                    }
                    Err(e) => {
                        warn!("Search for '{}' failed: {}", name, e);
                        summary.failed_pages += 1;
                        break Vec::new();
                    }
                }
            };
            println!("📄 Found {} show links for '{}'", links.len(), name);

            for link in links {
                if !visited.insert(link.clone()) {
                    info!("Skipping already visited link {}", link);
                    continue;
                }
                let scrape = loop {
                    match scraper.scrape(&mut session, &link).await {
                        Ok(scrape) => break Some(scrape),
                        Err(e) if e.is_fatal() => {
                            if let Err(e) = self.restart(&mut session, &mut summary.session_restarts, e).await {
                                session.close().await;
                                return Err(e);
                            }
                        }
                        Err(e) => {
                            warn!("Could not scrape show page {}: {}", link, e);
                            summary.failed_pages += 1;
                            break None;
                        }
                    }
                };
                if let Some(scrape) = scrape {
                    println!(
                        "   Scraped {} events ({} with seat counts) from {}",
                        scrape.records.len(),
                        scrape.resolved(),
                        link
                    );
                    summary.absorb(&scrape);
                    records.extend(scrape.records);
                }
            }
        }

        session.close().await;
        info!(
            records = summary.records,
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            "Pipeline finished"
        );
        Ok(PipelineResult { records, summary })
    }

    /// Scrape a single show-detail page.
    pub async fn run_show(&self, show_url: &str) -> Result<ShowScrape> {
        let resolver = SeatResolver::new(self.config, self.poller.clone());
        let scraper = ShowScraper::new(self.config, &resolver);
        let mut session = self.factory.open().await?;
        let result = scraper.scrape(&mut session, show_url).await;
        session.close().await;
        result
    }

    /// Resolve one event on a show-detail page.
    pub async fn resolve_event(&self, show_url: &str, event_id: &EventIdentifier) -> Result<Resolution> {
        let resolver = SeatResolver::new(self.config, self.poller.clone());
        let mut session = self.factory.open().await?;
        let result = async {
            session.navigate(show_url).await?;
            self.poller
                .wait_for_ready(
                    &session,
                    "show page ready",
                    TimeoutConfig::ms(self.config.timeouts.page_ready),
                )
                .await?;
            resolver.resolve(&mut session, event_id).await
        }
        .await;
        session.close().await;
        result
    }

    /// Show-detail links for one show name.
    pub async fn search(&self, show_name: &str) -> Result<Vec<String>> {
        let search = ShowSearch::new(self.config, &self.poller);
        let mut session = self.factory.open().await?;
        let result = search.search(&mut session, show_name).await;
        session.close().await;
        result
    }
}

/// Write records as JSON Lines into `output_dir`, one file per run.
pub fn write_records(records: &[EventRecord], output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let file_name = format!("events_{}.jsonl", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let path = output_dir.join(file_name);

    let mut writer = BufWriter::new(fs::File::create(&path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}
