mod common;
use common::day;

use std::sync::Arc;

use market_data_ingestor::providers::polygon_rest::PolygonProvider;
use mockito::Matcher;
use secrecy::SecretString;
use signal_engine::calendar::{CalendarError, EarningsCalendar};

fn calendar(url: String) -> EarningsCalendar {
    let provider = PolygonProvider::with_base_url(SecretString::from("test-key"), url).unwrap();
    EarningsCalendar::new(Arc::new(provider))
}

fn for_date(date: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("date".into(), date.into()),
        Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
    ])
}

#[tokio::test]
async fn range_skips_failed_days_and_drops_duplicates() {
    let mut server = mockito::Server::new_async().await;
    let monday = server
        .mock("GET", "/benzinga/v1/earnings")
        .match_query(for_date("2025-01-27"))
        .with_status(200)
        .with_body(
            r#"{"status":"OK","results":[
                {"ticker":"AAPL","date":"2025-01-27","importance":5},
                {"ticker":"SOFI","date":"2025-01-27","importance":3}
            ]}"#,
        )
        .create_async()
        .await;
    let tuesday = server
        .mock("GET", "/benzinga/v1/earnings")
        .match_query(for_date("2025-01-28"))
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;
    let wednesday = server
        .mock("GET", "/benzinga/v1/earnings")
        .match_query(for_date("2025-01-29"))
        .with_status(200)
        .with_body(
            r#"{"status":"OK","results":[
                {"ticker":"AAPL","date":"2025-01-27","importance":5},
                {"ticker":"MSFT","date":"2025-01-29","importance":5}
            ]}"#,
        )
        .create_async()
        .await;

    let range = calendar(server.url())
        .fetch_range(day(2025, 1, 27), day(2025, 1, 29), None, None, 100)
        .await
        .unwrap();

    monday.assert_async().await;
    tuesday.assert_async().await;
    wednesday.assert_async().await;

    assert_eq!(range.range_days, 3);
    assert_eq!(range.start, day(2025, 1, 27));
    assert_eq!(range.end, day(2025, 1, 29));
    assert_eq!(
        range.events.iter().map(|e| e.ticker.as_str()).collect::<Vec<_>>(),
        vec!["AAPL", "SOFI", "MSFT"]
    );
}

#[tokio::test]
async fn filters_are_forwarded_per_day() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/benzinga/v1/earnings")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("date".into(), "2025-01-30".into()),
            Matcher::UrlEncoded("ticker".into(), "AAPL".into()),
            Matcher::UrlEncoded("importance".into(), "5".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"status":"OK","results":[{"ticker":"AAPL","date":"2025-01-30","importance":5}]}"#)
        .expect(1)
        .create_async()
        .await;

    let range = calendar(server.url())
        .fetch_range(day(2025, 1, 30), day(2025, 1, 30), Some("AAPL"), Some(5), 10)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(range.range_days, 1);
    assert_eq!(range.events.len(), 1);
}

#[tokio::test]
async fn invalid_ranges_are_rejected_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let never = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let cal = calendar(server.url());

    let err = cal
        .fetch_range(day(2025, 2, 1), day(2025, 1, 1), None, None, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, CalendarError::InvalidRange { .. }));

    let err = cal
        .fetch_range(day(2025, 1, 1), day(2025, 4, 2), None, None, 100)
        .await
        .unwrap_err();
    assert_eq!(err, CalendarError::RangeTooLong { days: 91 });
    assert_eq!(err.to_string(), "date range cannot exceed 90 days, got 91");

    let err = cal
        .fetch_range(day(2025, 1, 1), day(2025, 1, 2), None, Some(6), 100)
        .await
        .unwrap_err();
    assert_eq!(err, CalendarError::InvalidImportance(6));

    never.assert_async().await;
}
