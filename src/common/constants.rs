/// Defaults for the ticketing site and its markup. Every value here can be
/// overridden from `config.toml`; selectors containing `{event_id}` are templates.

// Site entry point and search page
pub const SITE_BASE_URL: &str = "https://friends-hist.co.il/";
pub const SEARCH_INPUT_SELECTOR: &str = "input.wcjapsSearchKeyword";
pub const RESULT_TILE_SELECTOR: &str = "div.wrap_shows";
pub const RESULT_LINK_SELECTOR: &str = "a.btn_info";

// Show-detail page
pub const SHOW_TITLE_SELECTOR: &str = "h1";
pub const EVENT_ROW_SELECTOR: &str = "div.events_list > div.event_row";
pub const CITY_SELECTOR: &str = ".date_time_address .time_wrap span";
pub const HALL_SELECTOR: &str = ".date_time_address .address_wrap.desktop_only span";
pub const DATE_SELECTOR: &str = ".date-time-sec .date_wrap span";
pub const TIME_SELECTOR: &str = ".date-time-sec .time_wrap span";
pub const EVENT_LINK_SELECTOR: &str = "a.load_event_iframe";
pub const EVENT_ID_ATTRIBUTE: &str = "data-event_id";

// Per-event popup and embedded seat map
pub const EVENT_ID_PLACEHOLDER: &str = "{event_id}";
pub const TRIGGER_SELECTOR: &str = "a.load_event_iframe[data-event_id=\"{event_id}\"]";
pub const POPUP_SELECTOR: &str = "#event_popup_{event_id}";
pub const FRAME_SELECTOR: &str = "iframe";
pub const FRAME_SRC_PATTERN: &str = r"(?i)(?:event_?id=|/events?/){event_id}\b";
pub const AREA_CONTROL_SELECTOR: &str = ".areas_list a.area, a[data-area_id]";
pub const SEAT_READY_SELECTOR: &str = "a.seat, #seatmap, .seatmap_container";
pub const SEAT_STRICT_SELECTOR: &str = "a.seat.empty[data-status=\"empty\"]";
pub const SEAT_LOOSE_SELECTOR: &str = "a.seat.empty, a.seat[data-status=\"empty\"]";

// Timeouts (milliseconds)
pub const PAGE_READY_TIMEOUT_MS: u64 = 15_000;
pub const TRIGGER_TIMEOUT_MS: u64 = 10_000;
pub const POPUP_TIMEOUT_MS: u64 = 10_000;
pub const FRAME_TIMEOUT_MS: u64 = 10_000;
pub const FRAME_READY_TIMEOUT_MS: u64 = 15_000;
pub const AREA_TIMEOUT_MS: u64 = 3_000;
pub const AREA_SETTLE_MS: u64 = 1_500;
pub const SEATS_TIMEOUT_MS: u64 = 20_000;
pub const SEARCH_RESULTS_TIMEOUT_MS: u64 = 10_000;
pub const POLL_INITIAL_MS: u64 = 100;
pub const POLL_MAX_MS: u64 = 1_000;

// Show-name source
pub const SHOW_NAME_COLUMN: &str = "שם מקוצר";

// Runtime files and environment
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const CONFIG_PATH_ENV: &str = "SEAT_SCRAPER_CONFIG";
pub const CHROME_EXECUTABLE_ENV: &str = "CHROME_EXECUTABLE";
pub const METRICS_ADDR_ENV: &str = "SEAT_SCRAPER_METRICS_ADDR";

/// Substitute the event id into a selector or pattern template.
pub fn with_event_id(template: &str, event_id: &str) -> String {
    template.replace(EVENT_ID_PLACEHOLDER, event_id)
}
