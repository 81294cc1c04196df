//! Category crawl behavior against scripted sources
use std::sync::Arc;
use std::time::Duration;

use material_scraper::FetchError;
use material_scraper::crawling::{
    CategoryCrawler, Clock, CrawlLimits, CrawlPhase, HeaderRotation, RequestPacer, SourceContext,
};
use material_scraper::test_utils::{
    ManualClock, ScriptedPage, ScriptedSource, listings, source_context, transient,
};

const BASE: &str = "https://www.castorama.fr/p";

fn crawler(source: Arc<ScriptedSource>, clock: Arc<ManualClock>, tweak: impl FnOnce(&mut SourceContext)) -> CategoryCrawler {
    let mut context = source_context(source, clock);
    tweak(&mut context);
    CategoryCrawler::new(Arc::new(context))
}

#[tokio::test]
async fn crawl_stops_after_last_page_in_cursor_order() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Peinture",
        vec![
            ScriptedPage::with_records(listings("a", BASE, 3)),
            ScriptedPage::with_records(listings("b", BASE, 3)),
            ScriptedPage::with_records(listings("c", BASE, 2)).last(),
        ],
    ));

    let outcome = crawler(source.clone(), clock, |_| {}).crawl("Peinture").await;

    assert_eq!(outcome.phase(), CrawlPhase::Done);
    assert_eq!(outcome.state.pages_fetched, 3);
    assert_eq!(outcome.state.fetch_attempts, 3);
    assert_eq!(outcome.records.len(), 8);
    assert!(outcome.state.lost_pages.is_empty());
    let pages: Vec<u32> = source.fetches_for("Peinture").iter().map(|f| f.page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
}

#[tokio::test]
async fn transient_failures_are_retried_exactly_max_retries_times() {
    let clock = Arc::new(ManualClock::new());
    let failures = (0..10).map(|_| transient("scripted://castorama/Lavabos/1")).collect();
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Lavabos",
        vec![ScriptedPage::with_records(listings("a", BASE, 2)).failing(failures)],
    ));

    let outcome = crawler(source.clone(), clock.clone(), |_| {}).crawl("Lavabos").await;

    // max_retries = 3 in the test context
    assert_eq!(outcome.phase(), CrawlPhase::Failed);
    assert_eq!(outcome.state.fetch_attempts, 4);
    assert_eq!(source.fetches_for("Lavabos").len(), 4);
    assert_eq!(outcome.state.lost_pages, vec![1]);
    assert!(outcome.records.is_empty());

    let backoffs = clock.sleeps();
    assert_eq!(backoffs.len(), 3);
    assert!(backoffs.iter().all(|d| *d >= Duration::from_millis(10) && *d <= Duration::from_millis(100)));
}

#[tokio::test]
async fn transient_failure_recovers_within_budget() {
    let clock = Arc::new(ManualClock::new());
    let failures = vec![transient("p1"), FetchError::Timeout { url: "p1".into() }];
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Douches",
        vec![
            ScriptedPage::with_records(listings("a", BASE, 2)).failing(failures),
            ScriptedPage::with_records(listings("b", BASE, 2)).last(),
        ],
    ));

    let outcome = crawler(source, clock, |_| {}).crawl("Douches").await;

    assert_eq!(outcome.phase(), CrawlPhase::Done);
    assert_eq!(outcome.state.fetch_attempts, 4);
    assert_eq!(outcome.state.pages_fetched, 2);
    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.state.consecutive_failures, 0);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let clock = Arc::new(ManualClock::new());
    let not_found = FetchError::HttpStatus { url: "p1".into(), status: 404 };
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Toilettes",
        vec![ScriptedPage::with_records(listings("a", BASE, 2)).failing(vec![not_found])],
    ));

    let outcome = crawler(source, clock.clone(), |_| {}).crawl("Toilettes").await;

    assert_eq!(outcome.phase(), CrawlPhase::Failed);
    assert_eq!(outcome.state.fetch_attempts, 1);
    assert!(clock.sleeps().is_empty());
    assert!(outcome.state.last_error.unwrap().contains("404"));
}

#[tokio::test]
async fn failed_page_keeps_records_already_collected() {
    let clock = Arc::new(ManualClock::new());
    let mut broken = ScriptedPage::with_records(listings("b", BASE, 2));
    broken.parse_error = Some(FetchError::Parse { url: "p2".into(), message: "truncated".into() });
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Carrelage",
        vec![
            ScriptedPage::with_records(listings("a", BASE, 3)),
            broken,
            ScriptedPage::with_records(listings("c", BASE, 3)).last(),
        ],
    ));

    let outcome = crawler(source.clone(), clock, |_| {}).crawl("Carrelage").await;

    assert_eq!(outcome.phase(), CrawlPhase::Failed);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.state.lost_pages, vec![2]);
    assert_eq!(source.fetches_for("Carrelage").len(), 2);
}

#[tokio::test]
async fn product_cap_truncates_and_stops() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Peinture",
        vec![
            ScriptedPage::with_records(listings("a", BASE, 4)),
            ScriptedPage::with_records(listings("b", BASE, 4)),
            ScriptedPage::with_records(listings("c", BASE, 4)).last(),
        ],
    ));

    let outcome = crawler(source, clock, |ctx| {
        ctx.limits = CrawlLimits { max_products: 5, ..ctx.limits };
    })
    .crawl("Peinture")
    .await;

    assert_eq!(outcome.phase(), CrawlPhase::Done);
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.state.pages_fetched, 2);
    assert_eq!(outcome.records[4].native_id.as_deref(), Some("b0"));
}

#[tokio::test]
async fn page_cap_stops_pagination() {
    let clock = Arc::new(ManualClock::new());
    let pages = (0..10)
        .map(|i| ScriptedPage::with_records(listings(&format!("p{i}-"), BASE, 1)))
        .collect();
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category("Éviers", pages));

    let outcome = crawler(source, clock, |ctx| {
        ctx.limits = CrawlLimits { max_pages: 3, ..ctx.limits };
    })
    .crawl("Éviers")
    .await;

    assert_eq!(outcome.phase(), CrawlPhase::Done);
    assert_eq!(outcome.state.pages_fetched, 3);
}

#[tokio::test]
async fn empty_page_ends_category() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Vanités",
        vec![
            ScriptedPage::with_records(listings("a", BASE, 2)),
            ScriptedPage::with_records(Vec::new()),
            ScriptedPage::with_records(listings("c", BASE, 2)).last(),
        ],
    ));

    let outcome = crawler(source, clock, |_| {}).crawl("Vanités").await;

    assert_eq!(outcome.phase(), CrawlPhase::Done);
    assert_eq!(outcome.state.pages_fetched, 2);
    assert_eq!(outcome.records.len(), 2);
}

#[tokio::test]
async fn slow_response_times_out_as_transient() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(
        ScriptedSource::new("castorama", clock.clone())
            .with_category("Peinture", vec![ScriptedPage::with_records(listings("a", BASE, 1)).last()])
            .with_fetch_delay(Duration::from_millis(500)),
    );

    let outcome = crawler(source, clock, |ctx| {
        ctx.limits = CrawlLimits { request_timeout: Duration::from_millis(20), ..ctx.limits };
        ctx.retry.max_retries = 1;
    })
    .crawl("Peinture")
    .await;

    assert_eq!(outcome.phase(), CrawlPhase::Failed);
    assert_eq!(outcome.state.fetch_attempts, 2);
    assert!(outcome.state.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn unknown_category_fails_without_retry() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()));

    let outcome = crawler(source, clock, |_| {}).crawl("Inconnue").await;

    assert_eq!(outcome.phase(), CrawlPhase::Failed);
    assert_eq!(outcome.state.fetch_attempts, 1);
}

#[tokio::test]
async fn pacing_delay_is_shared_across_categories_of_a_source() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(
        ScriptedSource::new("castorama", clock.clone())
            .with_category(
                "Peinture",
                vec![
                    ScriptedPage::with_records(listings("a", BASE, 1)),
                    ScriptedPage::with_records(listings("b", BASE, 1)).last(),
                ],
            )
            .with_category(
                "Lavabos",
                vec![
                    ScriptedPage::with_records(listings("c", BASE, 1)),
                    ScriptedPage::with_records(listings("d", BASE, 1)).last(),
                ],
            ),
    );
    let interval = Duration::from_millis(500);
    let pacer_clock: Arc<dyn Clock> = clock.clone();
    let crawler = crawler(source.clone(), clock, |ctx| {
        ctx.pacer = Arc::new(RequestPacer::new(interval, pacer_clock));
    });

    let (a, b) = futures::join!(crawler.crawl("Peinture"), crawler.crawl("Lavabos"));
    assert_eq!(a.phase(), CrawlPhase::Done);
    assert_eq!(b.phase(), CrawlPhase::Done);

    let mut times: Vec<Duration> = source.fetch_log().iter().map(|f| f.at).collect();
    assert_eq!(times.len(), 4);
    times.sort();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= interval, "requests too close: {pair:?}");
    }
}

#[tokio::test]
async fn request_profiles_rotate_round_robin() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(ScriptedSource::new("castorama", clock.clone()).with_category(
        "Peinture",
        vec![
            ScriptedPage::with_records(listings("a", BASE, 1)),
            ScriptedPage::with_records(listings("b", BASE, 1)),
            ScriptedPage::with_records(listings("c", BASE, 1)).last(),
        ],
    ));
    let agents = vec!["agent-1".to_string(), "agent-2".to_string()];
    let crawler = crawler(source.clone(), clock, |ctx| {
        ctx.headers = Arc::new(HeaderRotation::new(&agents, &[]));
    });

    crawler.crawl("Peinture").await;

    let used: Vec<String> = source.fetch_log().into_iter().map(|f| f.profile.user_agent).collect();
    assert_eq!(used, vec!["agent-1", "agent-2", "agent-1"]);
}
