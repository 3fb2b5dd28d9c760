mod common;

use common::{CHECKPOINT_KEY, Harness, day, days};
use serde_json::json;
use thermo_remote::backend::MockSession;
use thermo_storage::backend::MockStore;

fn populated(site: &str, dates: &[String]) -> MockSession {
    dates.iter().fold(MockSession::default(), |session, date| {
        session
            .with_file(&format!("{site}/{date}/thermal/img.png"), format!("png {date}"))
            .with_file(&format!("{site}/{date}/reading.csv"), format!("csv {date}"))
    })
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let dates = days("2024-01-01", 2);
    let harness = Harness::new(populated("north", &dates), MockStore::default());

    let first = harness.run(&["north"], "2024-01-05").await.unwrap();
    assert_eq!(first.transferred, 4);
    let keys = harness.file_keys().await;
    let mut contents = Vec::new();
    for key in &keys {
        contents.push(harness.store.get(key).await.unwrap());
    }

    let second = harness.run(&["north"], "2024-01-05").await.unwrap();
    assert_eq!((second.transferred, second.already_present, second.failed), (0, 0, 0));
    assert_eq!(harness.file_keys().await, keys);
    for (key, data) in keys.iter().zip(contents) {
        assert_eq!(harness.store.get(key).await.unwrap(), data);
    }
}

#[tokio::test]
async fn test_rerun_over_leftover_source_files() {
    // A previous run uploaded the file but died before deleting the source.
    let session = MockSession::default().with_file("north/2024-01-01/reading.csv", b"source copy");
    let store = MockStore::with_objects([("north/2024-01-01/reading.csv", b"stored copy")]);
    let harness = Harness::new(session, store);

    let report = harness.run(&["north"], "2024-01-05").await.unwrap();
    assert_eq!((report.transferred, report.already_present), (0, 1));
    assert_eq!(harness.store.get("north/2024-01-01/reading.csv").await.unwrap(), b"stored copy");
    assert!(harness.session().files().is_empty());
}

#[tokio::test]
async fn test_checkpoint_is_monotonic() {
    let dates = days("2024-01-01", 5);
    let harness = Harness::new(populated("north", &dates), MockStore::default());

    let mut previous = None;
    for expected in ["2024-01-02", "2024-01-04", "2024-01-05", "2024-01-05"] {
        let report = harness.run(&["north"], "2024-02-01").await.unwrap();
        let current = report.checkpoint.get("north");
        assert_eq!(current, Some(day(expected)));
        assert!(current >= previous);
        assert_eq!(harness.saved_checkpoint().await.unwrap(), json!({ "north": expected }));
        previous = current;
    }
}

#[tokio::test]
async fn test_checkpoint_never_regresses_on_older_folders() {
    // An older folder reappears (late upload from a device) behind the checkpoint.
    let session = populated("north", &days("2024-01-01", 1));
    let store = MockStore::with_objects([(CHECKPOINT_KEY, br#"{ "north": "2024-01-10" }"#)]);
    let harness = Harness::new(session, store);

    let report = harness.run(&["north"], "2024-02-01").await.unwrap();
    assert_eq!(report.checkpoint.get("north"), Some(day("2024-01-10")));
    assert_eq!(report.transferred, 0);
    assert_eq!(harness.session().files().len(), 2);
}

#[tokio::test]
async fn test_active_day_exception() {
    let dates = days("2024-01-01", 3);
    let harness = Harness::new(populated("north", &dates), MockStore::default());

    let report = harness.run(&["north"], "2024-01-03").await.unwrap();
    let site = report.site("north").unwrap();
    let plan = site.plan.as_ref().unwrap();
    assert_eq!(plan.past, vec![day("2024-01-01"), day("2024-01-02")]);
    assert_eq!(plan.today, Some(day("2024-01-03")));
    let processed: Vec<_> = site.folders.iter().map(|folder| (folder.date, folder.is_today)).collect();
    assert_eq!(processed, vec![(day("2024-01-01"), false), (day("2024-01-02"), false), (day("2024-01-03"), true)]);

    // Today's files are transferred too, but the checkpoint stops before today.
    assert_eq!(harness.file_keys().await.len(), 6);
    assert_eq!(harness.saved_checkpoint().await.unwrap(), json!({ "north": "2024-01-02" }));
}

#[tokio::test]
async fn test_bounded_batch() {
    let mut dates = days("2024-01-01", 10);
    dates.push("2024-01-11".to_string());
    let harness = Harness::new(populated("north", &dates), MockStore::default());

    let report = harness.run(&["north"], "2024-01-11").await.unwrap();
    assert_eq!(report.transferred, 6);
    let mut transferred_dates: Vec<_> =
        harness.file_keys().await.iter().map(|key| key.split('/').nth(1).unwrap().to_string()).collect();
    transferred_dates.dedup();
    assert_eq!(transferred_dates, vec!["2024-01-01", "2024-01-02", "2024-01-11"]);
    assert_eq!(report.checkpoint.get("north"), Some(day("2024-01-02")));
    // Eight untouched folders, two files each.
    assert_eq!(harness.session().files().len(), 16);
}

#[tokio::test]
async fn test_failed_upload_keeps_source() {
    let harness = Harness::new(
        populated("north", &days("2024-01-01", 1)),
        MockStore::default().failing_on("north/2024-01-01/thermal/img.png"),
    );

    let report = harness.run(&["north"], "2024-01-05").await.unwrap();
    assert_eq!((report.transferred, report.failed), (1, 1));
    assert_eq!(harness.session().files(), vec!["north/2024-01-01/thermal/img.png"]);
    assert!(harness.store.get("north/2024-01-01/thermal/img.png").await.is_none());
    // The folder still advances the checkpoint; the file is retried because it
    // is still on the source, not because of the checkpoint.
    assert_eq!(report.checkpoint.get("north"), Some(day("2024-01-01")));
    // Its folders are kept since they are not empty.
    assert!(harness.session().dirs().contains(&"north/2024-01-01/thermal".to_string()));
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_today_is_never_reclaimed() {
    let session = MockSession::default()
        .with_dir("north/2024-01-02/thermal")
        .with_dir("north/2024-01-03/thermal")
        .with_file("north/2024-01-03/reading.csv", b"t,v");
    let harness = Harness::new(session, MockStore::default());

    harness.run(&["north"], "2024-01-03").await.unwrap();
    let attempts = harness.session().removal_attempts();
    assert_eq!(attempts, vec!["north/2024-01-02/thermal", "north/2024-01-02"]);
    assert!(attempts.iter().all(|path| !path.starts_with("north/2024-01-03")));
    assert!(harness.session().dirs().contains(&"north/2024-01-03/thermal".to_string()));
}

#[tokio::test]
async fn test_drained_past_folder_is_reclaimed() {
    let harness = Harness::new(populated("north", &days("2024-01-01", 1)), MockStore::default());

    let report = harness.run(&["north"], "2024-01-05").await.unwrap();
    let folder = &report.site("north").unwrap().folders[0];
    assert_eq!(folder.reclaimed, vec!["north/2024-01-01/thermal", "north/2024-01-01"]);
    assert_eq!(harness.session().dirs(), vec!["north"]);
}

#[tokio::test]
async fn test_malformed_folder_names_are_ignored() {
    let session = populated("north", &days("2024-01-01", 1))
        .with_file("north/notes.txt", b"hello")
        .with_file("north/2024-13-40/reading.csv", b"t,v");
    let harness = Harness::new(session, MockStore::default());

    let report = harness.run(&["north"], "2024-01-05").await.unwrap();
    assert_eq!(report.site("north").unwrap().plan.as_ref().unwrap().past, vec![day("2024-01-01")]);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.session().files(), vec!["north/2024-13-40/reading.csv", "north/notes.txt"]);
    assert!(harness.session().removal_attempts().iter().all(|path| !path.contains("2024-13-40")));
}

#[tokio::test]
async fn test_sites_are_independent() {
    let session = populated("north", &days("2024-01-01", 3)).with_dir("south/2024-01-02");
    let store = MockStore::with_objects([(CHECKPOINT_KEY, br#"{ "south": "2024-01-01", "west": "2023-12-31" }"#)]);
    let harness = Harness::new(session, store);

    let report = harness.run(&["north", "south"], "2024-01-05").await.unwrap();
    assert_eq!(report.site("north").unwrap().previous_checkpoint, None);
    assert_eq!(report.site("south").unwrap().previous_checkpoint, Some(day("2024-01-01")));
    // Entries for sites not part of this run are kept as they were.
    assert_eq!(
        harness.saved_checkpoint().await.unwrap(),
        json!({ "north": "2024-01-02", "south": "2024-01-02", "west": "2023-12-31" })
    );
}
