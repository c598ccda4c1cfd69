use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::common::constants::*;
use crate::common::error::{Result, ScraperError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
    pub timeouts: TimeoutConfig,
    pub browser: BrowserSettings,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub search_input: String,
    pub result_tile: String,
    pub result_link: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: SITE_BASE_URL.to_string(),
            search_input: SEARCH_INPUT_SELECTOR.to_string(),
            result_tile: RESULT_TILE_SELECTOR.to_string(),
            result_link: RESULT_LINK_SELECTOR.to_string(),
        }
    }
}

/// Selectors for the show page, the per-event popup and the seat map.
/// `trigger`, `popup` and `frame_src_pattern` are templates over `{event_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub show_title: String,
    pub event_row: String,
    pub city: String,
    pub hall: String,
    pub date: String,
    pub time: String,
    pub event_link: String,
    pub event_id_attribute: String,
    pub trigger: String,
    pub popup: String,
    pub frame: String,
    pub frame_src_pattern: String,
    pub area_control: String,
    pub seat_ready: String,
    pub seat_strict: String,
    pub seat_loose: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            show_title: SHOW_TITLE_SELECTOR.to_string(),
            event_row: EVENT_ROW_SELECTOR.to_string(),
            city: CITY_SELECTOR.to_string(),
            hall: HALL_SELECTOR.to_string(),
            date: DATE_SELECTOR.to_string(),
            time: TIME_SELECTOR.to_string(),
            event_link: EVENT_LINK_SELECTOR.to_string(),
            event_id_attribute: EVENT_ID_ATTRIBUTE.to_string(),
            trigger: TRIGGER_SELECTOR.to_string(),
            popup: POPUP_SELECTOR.to_string(),
            frame: FRAME_SELECTOR.to_string(),
            frame_src_pattern: FRAME_SRC_PATTERN.to_string(),
            area_control: AREA_CONTROL_SELECTOR.to_string(),
            seat_ready: SEAT_READY_SELECTOR.to_string(),
            seat_strict: SEAT_STRICT_SELECTOR.to_string(),
            seat_loose: SEAT_LOOSE_SELECTOR.to_string(),
        }
    }
}

/// All waits are bounded. Values are milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub page_ready: u64,
    pub trigger: u64,
    pub popup: u64,
    pub frame: u64,
    pub frame_ready: u64,
    pub area: u64,
    pub area_settle: u64,
    pub seats: u64,
    pub search_results: u64,
    pub poll_initial: u64,
    pub poll_max: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_ready: PAGE_READY_TIMEOUT_MS,
            trigger: TRIGGER_TIMEOUT_MS,
            popup: POPUP_TIMEOUT_MS,
            frame: FRAME_TIMEOUT_MS,
            frame_ready: FRAME_READY_TIMEOUT_MS,
            area: AREA_TIMEOUT_MS,
            area_settle: AREA_SETTLE_MS,
            seats: SEATS_TIMEOUT_MS,
            search_results: SEARCH_RESULTS_TIMEOUT_MS,
            poll_initial: POLL_INITIAL_MS,
            poll_max: POLL_MAX_MS,
        }
    }
}

impl TimeoutConfig {
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Worst-case time one resolve call may spend waiting across both paths.
    pub fn resolve_budget(&self) -> Duration {
        let popup = self.trigger
            + self.popup
            + self.frame
            + self.frame_ready
            + self.area
            + self.area_settle
            + self.seats;
        let direct = self.page_ready + self.area + self.area_settle + self.seats;
        Duration::from_millis(popup + direct)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_executable: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            window_width: 1920,
            window_height: 1080,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_dir: String,
    pub max_session_restarts: u32,
    pub column: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            max_session_restarts: 2,
            column: SHOW_NAME_COLUMN.to_string(),
        }
    }
}

impl Config {
    /// Load from `SEAT_SCRAPER_CONFIG` or `config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                ScraperError::Config(format!("Failed to read config file '{}': {}", config_path, e))
            })?;
            info!("Loaded configuration from {}", config_path);
            Self::from_toml(&config_content)?
        } else {
            debug!("No config file at {}, using defaults", config_path);
            Config::default()
        };

        if let Ok(executable) = std::env::var(CHROME_EXECUTABLE_ENV) {
            if !executable.trim().is_empty() {
                config.browser.chrome_executable = Some(executable);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject selectors and patterns that cannot work for any event id.
    pub fn validate(&self) -> Result<()> {
        let s = &self.selectors;
        let templates = [
            ("selectors.show_title", &s.show_title),
            ("selectors.event_row", &s.event_row),
            ("selectors.city", &s.city),
            ("selectors.hall", &s.hall),
            ("selectors.date", &s.date),
            ("selectors.time", &s.time),
            ("selectors.event_link", &s.event_link),
            ("selectors.trigger", &s.trigger),
            ("selectors.popup", &s.popup),
            ("selectors.frame", &s.frame),
            ("selectors.area_control", &s.area_control),
            ("selectors.seat_ready", &s.seat_ready),
            ("selectors.seat_strict", &s.seat_strict),
            ("selectors.seat_loose", &s.seat_loose),
            ("site.search_input", &self.site.search_input),
            ("site.result_tile", &self.site.result_tile),
            ("site.result_link", &self.site.result_link),
        ];
        for (name, template) in templates {
            let probe = with_event_id(template, "0");
            scraper::Selector::parse(&probe).map_err(|e| {
                ScraperError::Config(format!("Invalid selector {} = '{}': {:?}", name, template, e))
            })?;
        }

        let pattern = with_event_id(&s.frame_src_pattern, "0");
        regex::Regex::new(&pattern).map_err(|e| {
            ScraperError::Config(format!(
                "Invalid selectors.frame_src_pattern '{}': {}",
                s.frame_src_pattern, e
            ))
        })?;

        if self.timeouts.poll_initial == 0 {
            return Err(ScraperError::Config(
                "timeouts.poll_initial must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeouts.area, AREA_TIMEOUT_MS);
        assert!(config.timeouts.area < config.timeouts.seats);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [timeouts]
            seats = 5000

            [run]
            max_session_restarts = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.timeouts.seats, 5000);
        assert_eq!(config.timeouts.popup, POPUP_TIMEOUT_MS);
        assert_eq!(config.run.max_session_restarts, 0);
        assert_eq!(config.run.column, SHOW_NAME_COLUMN);
        assert_eq!(config.selectors.trigger, TRIGGER_SELECTOR);
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let mut config = Config::default();
        config.selectors.frame_src_pattern = "(unclosed".to_string();
        match config.validate() {
            Err(ScraperError::Config(msg)) => assert!(msg.contains("frame_src_pattern")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn bad_selector_is_rejected() {
        let mut config = Config::default();
        config.selectors.seat_strict = "a.seat[[".to_string();
        assert!(matches!(config.validate(), Err(ScraperError::Config(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from("/nonexistent/seat_scraper.toml").unwrap();
        assert_eq!(config.site.base_url, SITE_BASE_URL);
    }
}
