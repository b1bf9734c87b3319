//! End-to-end group updates against the in-memory object store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use object_store::path::Path;
use object_store::PutPayload;

use prost::Message;
use tally_cli::updater::{read_config, update_all, update_group, UpdaterOpts};
use tally_core::state::TestResult;
use tally_core::{unmarshal_grid, Configuration, TestGroup, OVERALL};
use tally_store::{GcsPath, StorageClient};

async fn seed(client: &StorageClient, bucket: &str, name: &str, body: String) {
    client
        .bucket(bucket)
        .unwrap()
        .put(&Path::from(name), PutPayload::from_bytes(Bytes::from(body)))
        .await
        .unwrap();
}

/// Seed one finished build with a single-suite JUnit artifact.
async fn seed_build(client: &StorageClient, prefix: &str, started: i64, cases: &[(&str, bool)]) {
    seed(
        client,
        "bucket",
        &format!("{prefix}started.json"),
        format!(r#"{{"timestamp": {started}}}"#),
    )
    .await;
    seed(
        client,
        "bucket",
        &format!("{prefix}finished.json"),
        format!(r#"{{"timestamp": {}, "passed": true}}"#, started + 60),
    )
    .await;

    let mut xml = String::from("<testsuite>");
    for (name, passed) in cases {
        if *passed {
            xml.push_str(&format!(r#"<testcase name="{name}"/>"#));
        } else {
            xml.push_str(&format!(
                r#"<testcase name="{name}"><failure>broken</failure></testcase>"#
            ));
        }
    }
    xml.push_str("</testsuite>");
    seed(client, "bucket", &format!("{prefix}artifacts/junit.xml"), xml).await;
}

fn group(name: &str) -> TestGroup {
    TestGroup {
        name: name.to_string(),
        gcs_prefix: format!("bucket/logs/{name}"),
        column_header: vec![],
        test_name_config: None,
    }
}

fn results_of<'g>(grid: &'g tally_core::Grid, name: &str) -> &'g [i32] {
    &grid
        .rows
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no row {name}"))
        .results
}

#[tokio::test]
async fn update_all_builds_and_uploads_the_grid() {
    let client = Arc::new(StorageClient::memory());
    let now = Utc::now().timestamp();

    // Newest build first in the grid: 200 has a+b, 100 has a+c.
    seed_build(&client, "logs/g1/100/", now - 600, &[("a", true), ("c", true)]).await;
    seed_build(&client, "logs/g1/200/", now - 300, &[("a", true), ("b", false)]).await;

    let cfg = Configuration {
        test_groups: vec![group("g1")],
    };
    let config_path = GcsPath::parse("gs://meta/dashboards/config").unwrap();
    let opts = UpdaterOpts {
        confirm: true,
        ..UpdaterOpts::default()
    };
    update_all(Arc::clone(&client), &cfg, &config_path, None, 2, &opts)
        .await
        .unwrap();

    let stored = client.get("meta", "dashboards/g1").await.unwrap();
    let grid = unmarshal_grid(&stored).unwrap();

    let builds: Vec<&str> = grid.columns.iter().map(|c| c.build.as_str()).collect();
    assert_eq!(builds, vec!["200", "100"]);
    assert_eq!(grid.columns[0].started, ((now - 300) * 1000) as f64);

    let names: Vec<&str> = grid.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![OVERALL, "a", "b", "c"]);

    assert_eq!(results_of(&grid, OVERALL), &[TestResult::Pass as i32, 2]);
    assert_eq!(results_of(&grid, "a"), &[TestResult::Pass as i32, 2]);
    assert_eq!(
        results_of(&grid, "b"),
        &[TestResult::Fail as i32, 1, TestResult::NoResult as i32, 1]
    );
    assert_eq!(
        results_of(&grid, "c"),
        &[TestResult::NoResult as i32, 1, TestResult::Pass as i32, 1]
    );
}

#[tokio::test]
async fn without_confirm_nothing_is_uploaded() {
    let client = Arc::new(StorageClient::memory());
    let now = Utc::now().timestamp();
    seed_build(&client, "logs/g1/1/", now - 60, &[("t", true)]).await;

    let out = GcsPath::parse("gs://meta/dashboards/g1").unwrap();
    update_group(&client, &group("g1"), &out, &UpdaterOpts::default())
        .await
        .unwrap();

    assert!(client.get_opt("meta", "dashboards/g1").await.unwrap().is_none());
}

#[tokio::test]
async fn freshness_window_includes_the_crossing_build_only() {
    let client = Arc::new(StorageClient::memory());
    let now = Utc::now().timestamp();
    let day = 24 * 3600;

    seed_build(&client, "logs/g1/3/", now - 3600, &[("t", true)]).await;
    // Crosses the 7-day window: consumed, then consumption stops.
    seed_build(&client, "logs/g1/2/", now - 8 * day, &[("t", true)]).await;
    // Never reached.
    seed_build(&client, "logs/g1/1/", now - 9 * day, &[("t", true)]).await;

    let out = GcsPath::parse("gs://meta/dashboards/g1").unwrap();
    let opts = UpdaterOpts {
        confirm: true,
        ..UpdaterOpts::default()
    };
    update_group(&client, &group("g1"), &out, &opts).await.unwrap();

    let grid = unmarshal_grid(&client.get("meta", "dashboards/g1").await.unwrap()).unwrap();
    let builds: Vec<&str> = grid.columns.iter().map(|c| c.build.as_str()).collect();
    assert_eq!(builds, vec!["3", "2"]);
}

#[tokio::test]
async fn results_ceiling_bounds_consumed_builds() {
    let client = Arc::new(StorageClient::memory());
    let now = Utc::now().timestamp();
    for build in 1..=5 {
        seed_build(
            &client,
            &format!("logs/g1/{build}/"),
            now - 60 * build,
            &[("t", true)],
        )
        .await;
    }

    let out = GcsPath::parse("gs://meta/dashboards/g1").unwrap();
    let opts = UpdaterOpts {
        confirm: true,
        max_results: 2,
        ..UpdaterOpts::default()
    };
    update_group(&client, &group("g1"), &out, &opts).await.unwrap();

    let grid = unmarshal_grid(&client.get("meta", "dashboards/g1").await.unwrap()).unwrap();
    let builds: Vec<&str> = grid.columns.iter().map(|c| c.build.as_str()).collect();
    assert_eq!(builds, vec!["5", "4"]);
}

#[tokio::test]
async fn broken_builds_are_skipped() {
    let client = Arc::new(StorageClient::memory());
    let now = Utc::now().timestamp();

    seed_build(&client, "logs/g1/3/", now - 100, &[("t", true)]).await;
    // Unparseable started marker: the build is skipped, not fatal.
    seed(
        &client,
        "bucket",
        "logs/g1/2/started.json",
        "not json at all".to_string(),
    )
    .await;
    seed_build(&client, "logs/g1/1/", now - 300, &[("t", true)]).await;

    let out = GcsPath::parse("gs://meta/dashboards/g1").unwrap();
    let opts = UpdaterOpts {
        confirm: true,
        ..UpdaterOpts::default()
    };
    update_group(&client, &group("g1"), &out, &opts).await.unwrap();

    let grid = unmarshal_grid(&client.get("meta", "dashboards/g1").await.unwrap()).unwrap();
    let builds: Vec<&str> = grid.columns.iter().map(|c| c.build.as_str()).collect();
    assert_eq!(builds, vec!["3", "1"]);
}

#[tokio::test]
async fn unknown_test_group_filter_is_an_error() {
    let client = Arc::new(StorageClient::memory());
    let cfg = Configuration {
        test_groups: vec![group("g1")],
    };
    let config_path = GcsPath::parse("gs://meta/dashboards/config").unwrap();

    let err = update_all(
        client,
        &cfg,
        &config_path,
        Some("no-such-group"),
        1,
        &UpdaterOpts::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("no-such-group"));
}

#[tokio::test]
async fn config_round_trips_through_the_store() {
    let client = StorageClient::memory();
    let cfg = Configuration {
        test_groups: vec![group("g1"), group("g2")],
    };
    let path = GcsPath::parse("gs://meta/dashboards/config").unwrap();
    client
        .bucket("meta")
        .unwrap()
        .put(
            &Path::from("dashboards/config"),
            PutPayload::from_bytes(Bytes::from(cfg.encode_to_vec())),
        )
        .await
        .unwrap();

    let back = read_config(&client, &path).await.unwrap();
    assert_eq!(back, cfg);

    // Garbage is a parse error, not a panic.
    seed(&client, "meta", "dashboards/broken", "\u{1}\u{2}garbage".to_string()).await;
    let broken = GcsPath::parse("gs://meta/dashboards/broken").unwrap();
    assert!(read_config(&client, &broken).await.is_err());
}

#[tokio::test]
async fn group_filter_updates_only_that_group() {
    let client = Arc::new(StorageClient::memory());
    let now = Utc::now().timestamp();
    seed_build(&client, "logs/g1/1/", now - 60, &[("t", true)]).await;
    seed_build(&client, "logs/g2/1/", now - 60, &[("t", true)]).await;

    let cfg = Configuration {
        test_groups: vec![group("g1"), group("g2")],
    };
    let config_path = GcsPath::parse("gs://meta/dashboards/config").unwrap();
    let opts = UpdaterOpts {
        confirm: true,
        ..UpdaterOpts::default()
    };
    update_all(Arc::clone(&client), &cfg, &config_path, Some("g2"), 4, &opts)
        .await
        .unwrap();

    assert!(client.get_opt("meta", "dashboards/g1").await.unwrap().is_none());
    assert!(client.get_opt("meta", "dashboards/g2").await.unwrap().is_some());
}
