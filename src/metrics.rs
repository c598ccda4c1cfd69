use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use crate::common::constants::METRICS_ADDR_ENV;
use crate::common::types::{Resolution, SeatAvailability};

/// Install the Prometheus exporter when `SEAT_SCRAPER_METRICS_ADDR` is set.
/// Without a recorder the metric macros below are no-ops.
pub fn init_metrics() {
    let Ok(addr_str) = std::env::var(METRICS_ADDR_ENV) else {
        return;
    };
    let addr: SocketAddr = match addr_str.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid {} '{}': {}", METRICS_ADDR_ENV, addr_str, e);
            return;
        }
    };

    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
    }
}

pub struct ResolverMetrics;

impl ResolverMetrics {
    pub fn record_resolution(resolution: &Resolution, duration: Duration) {
        ::metrics::counter!(
            "seat_scraper_resolutions_total",
            "path" => resolution.path.as_str()
        )
        .increment(1);
        if let SeatAvailability::Unresolved(reason) = &resolution.availability {
            ::metrics::counter!(
                "seat_scraper_unresolved_total",
                "kind" => reason.kind.as_str()
            )
            .increment(1);
        }
        ::metrics::histogram!("seat_scraper_resolve_duration_seconds").record(duration.as_secs_f64());
    }

    pub fn record_fallback() {
        ::metrics::counter!("seat_scraper_fallbacks_total").increment(1);
    }
}

pub struct ShowMetrics;

impl ShowMetrics {
    pub fn record_row_without_id() {
        ::metrics::counter!("seat_scraper_rows_without_id_total").increment(1);
    }

    pub fn record_renavigation() {
        ::metrics::counter!("seat_scraper_renavigations_total").increment(1);
    }
}
