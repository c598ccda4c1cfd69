mod support;

use seat_scraper::scrapers::ShowScraper;
use seat_scraper::seats::SeatResolver;
use seat_scraper::{FailureKind, ScraperError, SeatAvailability};
use support::*;

#[tokio::test]
async fn scrapes_rows_in_page_order() {
    let config = fast_config();
    let resolver = SeatResolver::new(&config, poller());
    let scraper = ShowScraper::new(&config, &resolver);
    let mut session = show_session(&["1", "2"])
        .with_frame(&event_frame_src("1"), FakeDocument::complete(seat_map_html(3, 0, 1)))
        .with_frame(&event_frame_src("2"), FakeDocument::complete(seat_map_html(8, 0, 0)));

    let scrape = scraper.scrape(&mut session, SHOW_URL).await.unwrap();

    assert_eq!(scrape.title, "Hamlet");
    let ids: Vec<&str> = scrape.records.iter().map(|r| r.event_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(scrape.records[0].seats, SeatAvailability::Count(3));
    assert_eq!(scrape.records[1].seats, SeatAvailability::Count(8));
    assert_eq!(scrape.records[0].city, "Haifa");
    assert_eq!(scrape.records[1].date, "11/10/2026");
    assert_eq!(scrape.rows_without_id, 0);
    // Popup path only: the show page is loaded once.
    assert_eq!(session.navigations, vec![SHOW_URL.to_string()]);
}

#[tokio::test]
async fn unresolved_event_does_not_stop_the_page() {
    let config = fast_config();
    let resolver = SeatResolver::new(&config, poller());
    let scraper = ShowScraper::new(&config, &resolver);
    // Event 2 has no seat-map document at all.
    let mut session = show_session(&["1", "2", "3"])
        .with_frame(&event_frame_src("1"), FakeDocument::complete(seat_map_html(1, 0, 0)))
        .with_frame(&event_frame_src("3"), FakeDocument::complete(seat_map_html(4, 0, 0)));

    let scrape = scraper.scrape(&mut session, SHOW_URL).await.unwrap();

    assert_eq!(scrape.records.len(), 3);
    assert_eq!(scrape.records[0].seats.count(), Some(1));
    assert!(!scrape.records[1].seats.is_resolved());
    assert_eq!(scrape.records[2].seats.count(), Some(4));
    assert_eq!(scrape.resolved(), 2);
}

#[tokio::test]
async fn row_without_event_id_still_yields_a_record() {
    let config = fast_config();
    let resolver = SeatResolver::new(&config, poller());
    let scraper = ShowScraper::new(&config, &resolver);
    let html = show_html("Hamlet", &["1", "2"]).replace(
        r#"<div class="events_list">"#,
        r#"<div class="events_list"><div class="event_row"><a class="load_event_iframe">Buy</a></div>"#,
    );
    let mut session = FakeSession::new().with_page(SHOW_URL, FakeDocument::complete(html));
    for id in ["1", "2"] {
        let src = event_frame_src(id);
        session = session
            .on_click(&trigger_selector(id), Effect::AppendTop(popup_markup(id, &[src.as_str()])))
            .with_frame(&src, FakeDocument::complete(seat_map_html(2, 0, 0)));
    }

    let scrape = scraper.scrape(&mut session, SHOW_URL).await.unwrap();

    // One record per discovered row, in page order.
    assert_eq!(scrape.records.len(), 3);
    assert_eq!(scrape.rows_without_id, 1);
    assert_eq!(scrape.resolved(), 2);

    let orphan = &scrape.records[0];
    assert_eq!(orphan.event_id.as_str(), "");
    assert_eq!(orphan.title, "Hamlet");
    match &orphan.seats {
        SeatAvailability::Unresolved(reason) => assert_eq!(reason.kind, FailureKind::StructureMismatch),
        other => panic!("expected unresolved, got {:?}", other),
    }
    let ids: Vec<&str> = scrape.records.iter().map(|r| r.event_id.as_str()).collect();
    assert_eq!(ids, vec!["", "1", "2"]);
}

#[tokio::test]
async fn returns_to_show_page_after_direct_navigation() {
    let config = fast_config();
    let resolver = SeatResolver::new(&config, poller());
    let scraper = ShowScraper::new(&config, &resolver);
    let slow = event_frame_src("2");
    let mut session = show_session(&["1", "2", "3"])
        .with_frame(&event_frame_src("1"), FakeDocument::complete(seat_map_html(1, 0, 0)))
        .with_frame(&slow, FakeDocument::loading("<html><body></body></html>"))
        .with_page(&slow, FakeDocument::complete(seat_map_html(6, 0, 0)))
        .with_frame(&event_frame_src("3"), FakeDocument::complete(seat_map_html(9, 0, 0)));

    let scrape = scraper.scrape(&mut session, SHOW_URL).await.unwrap();

    let counts: Vec<Option<u32>> = scrape.records.iter().map(|r| r.seats.count()).collect();
    assert_eq!(counts, vec![Some(1), Some(6), Some(9)]);
    assert_eq!(
        session.navigations,
        vec![SHOW_URL.to_string(), slow, SHOW_URL.to_string()]
    );
}

#[tokio::test]
async fn page_that_cannot_load_is_an_error() {
    let config = fast_config();
    let resolver = SeatResolver::new(&config, poller());
    let scraper = ShowScraper::new(&config, &resolver);
    let mut session = FakeSession::new();

    let result = scraper.scrape(&mut session, "https://tickets.example/missing/").await;

    assert!(matches!(result, Err(ScraperError::PageLoad(_))), "got {:?}", result);
}

#[tokio::test]
async fn crash_mid_page_propagates() {
    let config = fast_config();
    let resolver = SeatResolver::new(&config, poller());
    let scraper = ShowScraper::new(&config, &resolver);
    let mut session = show_session(&["1"])
        .with_frame(&event_frame_src("1"), FakeDocument::complete(seat_map_html(1, 0, 0)))
        .on_click(&trigger_selector("1"), Effect::Crash);

    let result = scraper.scrape(&mut session, SHOW_URL).await;

    assert!(matches!(result, Err(ScraperError::SessionFault(_))), "got {:?}", result);
}
