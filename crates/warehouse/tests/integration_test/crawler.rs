use std::time::Duration;

use tokio::time::Instant;

use cheapo_warehouse::capability::{CrawlerState, DeleteBehavior, ProviderErrorKind, UpdateBehavior};
use cheapo_warehouse::{CrawlOutcome, CrawlerOptions, Provisioned, WarehouseError};

use crate::fake::{crawler_status, open_lake, open_lake_with, FakeCloud, ROLE_ARN};

#[tokio::test]
async fn test_create_crawler_is_idempotent() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;

    let first = wh.create_crawler("raw", CrawlerOptions::default()).await.unwrap();
    let second = wh
        .create_crawler(
            "raw",
            CrawlerOptions {
                schedule: Some("cron(0 12 * * ? *)".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(first, Provisioned::Created("raw".to_string()));
    assert_eq!(second, Provisioned::AlreadyExists("raw".to_string()));
    assert_eq!(first.get(), second.get());

    fake.with(|s| {
        assert_eq!(s.crawler_creates, 1);
        // Settings from the second call are not applied.
        assert_eq!(s.crawlers["raw"].schedule, None);
    });
}

#[tokio::test]
async fn test_crawler_definition() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;

    let options = CrawlerOptions {
        schedule: Some("cron(15 12 * * ? *)".into()),
        table_prefix: Some("raw_".into()),
        update_behavior: UpdateBehavior::Log,
        delete_behavior: DeleteBehavior::DeprecateInDatabase,
    };
    wh.create_crawler("raw", options).await.unwrap();

    fake.with(|s| {
        let def = &s.crawlers["raw"];
        assert_eq!(def.role, ROLE_ARN);
        assert_eq!(def.database, "lake");
        assert_eq!(def.s3_target_path, "lake/raw/");
        assert_eq!(def.table_prefix.as_deref(), Some("raw_"));
        assert_eq!(def.update_behavior.as_str(), "LOG");
        assert_eq!(def.delete_behavior.as_str(), "DEPRECATE_IN_DATABASE");
        assert!(def.description.starts_with("Crawler created by CheapoDB on "));
    });
}

#[tokio::test]
async fn test_update_tables_without_wait_returns_started() {
    let fake = FakeCloud::new();
    let wh = open_lake(&fake).await;

    let outcome = wh.update_tables("raw", None).await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Started);

    let outcome = wh.update_tables("raw", Some(Duration::ZERO)).await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Started);

    fake.with(|s| {
        assert_eq!(s.crawler_starts, 2);
        assert_eq!(s.crawler_gets, 0);
    });
}

#[tokio::test(start_paused = true)]
async fn test_update_tables_polls_until_ready() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.crawler_script.extend([
            Ok(crawler_status("raw", CrawlerState::Running, None)),
            Ok(crawler_status("raw", CrawlerState::Stopping, None)),
            Ok(crawler_status("raw", CrawlerState::Ready, Some(("SUCCEEDED", None)))),
        ])
    });
    let wh = open_lake(&fake).await;

    let started = Instant::now();
    let outcome = wh.update_tables("raw", Some(Duration::from_secs(60))).await.unwrap();

    assert_eq!(outcome, CrawlOutcome::Succeeded);
    assert_eq!(started.elapsed(), Duration::from_secs(120));
    fake.with(|s| assert_eq!(s.crawler_gets, 3));
}

#[tokio::test(start_paused = true)]
async fn test_failed_crawl_is_returned_not_raised() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.crawler_script.extend([
            Ok(crawler_status("raw", CrawlerState::Running, None)),
            Ok(crawler_status(
                "raw",
                CrawlerState::Ready,
                Some(("FAILED", Some("Insufficient Lake Formation permission"))),
            )),
        ])
    });
    let wh = open_lake(&fake).await;

    let outcome = wh.update_tables("raw", Some(Duration::from_secs(5))).await.unwrap();
    assert_eq!(
        outcome,
        CrawlOutcome::Failed {
            reason: "Insufficient Lake Formation permission".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_crawl() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.crawler_script.push_back(Ok(crawler_status(
            "raw",
            CrawlerState::Ready,
            Some(("CANCELLED", None)),
        )))
    });
    let wh = open_lake(&fake).await;

    let outcome = wh.update_tables("raw", Some(Duration::from_secs(5))).await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_describe_failure_while_polling_propagates() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        s.crawler_script.extend([
            Ok(crawler_status("raw", CrawlerState::Running, None)),
            Err(ProviderErrorKind::Transient),
            Ok(crawler_status("raw", CrawlerState::Ready, Some(("SUCCEEDED", None)))),
        ])
    });
    let wh = open_lake(&fake).await;

    let err = wh
        .update_tables("raw", Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::Provider(ref e) if e.is_transient()));
    fake.with(|s| assert_eq!(s.crawler_gets, 2, "no retry after a describe failure"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_bounds_the_wait() {
    let fake = FakeCloud::new();
    fake.with(|s| {
        for _ in 0..10 {
            s.crawler_script
                .push_back(Ok(crawler_status("raw", CrawlerState::Running, None)));
        }
    });
    let wh = open_lake_with(&fake, Some(Duration::from_secs(90))).await;

    let started = Instant::now();
    let err = wh
        .update_tables("raw", Some(Duration::from_secs(60)))
        .await
        .unwrap_err();

    assert!(matches!(err, WarehouseError::Timeout { seconds: 90, .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}
