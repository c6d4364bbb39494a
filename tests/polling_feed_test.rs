#[macro_use]
mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{GatedStore, USER, memory_store, program_request};
use studydash::models::StudyProgramPatch;
use studydash::realtime::{ChangeEvent, ChangeFeed, ChangeKind, PollingChangeFeed};
use studydash::store::{Collection, repository};

fn recorder() -> (Arc<Mutex<Vec<ChangeEvent>>>, studydash::realtime::ChangeHandler) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (
        events,
        Arc::new(move |event: ChangeEvent| sink.lock().unwrap().push(event)),
    )
}

#[tokio::test]
async fn test_polling_reports_insert_update_delete() {
    let store = memory_store().await;
    let feed = PollingChangeFeed::with_interval(store.clone(), Duration::from_millis(20));
    let (events, handler) = recorder();

    feed.subscribe(Collection::StudyPrograms, USER, handler).await.unwrap();
    // Unchanged polls report nothing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.lock().unwrap().is_empty());

    let program = repository::insert_study_program(&*store, USER, &program_request("CS", 180.0))
        .await
        .unwrap();
    assert!(eventually!(events.lock().unwrap().iter().any(|e| e.kind == ChangeKind::Insert)));

    let patch = StudyProgramPatch {
        current_semester: Some(2),
        ..Default::default()
    };
    repository::update_study_program(&*store, USER, &program.id, &patch)
        .await
        .unwrap();
    assert!(eventually!(events.lock().unwrap().iter().any(|e| e.kind == ChangeKind::Update)));

    repository::delete_study_program(&*store, USER, &program.id).await.unwrap();
    assert!(eventually!(events.lock().unwrap().iter().any(|e| e.kind == ChangeKind::Delete)));

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.owner == USER && e.collection == Collection::StudyPrograms));
    assert!(events.iter().all(|e| e.record_id.as_deref() == Some(program.id.as_str())));
}

#[tokio::test]
async fn test_polling_ignores_other_owners() {
    let store = memory_store().await;
    let feed = PollingChangeFeed::with_interval(store.clone(), Duration::from_millis(20));
    let (events, handler) = recorder();

    feed.subscribe(Collection::StudyPrograms, USER, handler).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    repository::insert_study_program(&*store, "user-2", &program_request("Law", 240.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_polling_survives_failed_polls() {
    let store = memory_store().await;
    let gated = Arc::new(GatedStore::new(store.clone()));
    let feed = PollingChangeFeed::with_interval(gated.clone(), Duration::from_millis(20));
    let (events, handler) = recorder();

    feed.subscribe(Collection::StudyPrograms, USER, handler).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    gated.set_failing(true);
    repository::insert_study_program(&*store, USER, &program_request("CS", 180.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(events.lock().unwrap().is_empty());

    gated.set_failing(false);
    assert!(eventually!(!events.lock().unwrap().is_empty()));
}

#[tokio::test]
async fn test_unsubscribe_stops_polling() {
    let store = memory_store().await;
    let feed = PollingChangeFeed::with_interval(store.clone(), Duration::from_millis(20));
    let (events, handler) = recorder();

    let handle = feed.subscribe(Collection::StudyPrograms, USER, handler).await.unwrap();
    assert_eq!(feed.active_subscriptions(), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    feed.unsubscribe(handle);
    assert_eq!(feed.active_subscriptions(), 0);

    repository::insert_study_program(&*store, USER, &program_request("CS", 180.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_baseline_is_taken_before_subscribe_returns() {
    let store = memory_store().await;
    let feed = PollingChangeFeed::with_interval(store.clone(), Duration::from_millis(20));
    let (events, handler) = recorder();

    feed.subscribe(Collection::StudyPrograms, USER, handler).await.unwrap();
    // No pause: the write lands before the first interval has elapsed.
    let program = repository::insert_study_program(&*store, USER, &program_request("CS", 180.0))
        .await
        .unwrap();

    assert!(eventually!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.kind == ChangeKind::Insert && e.record_id.as_deref() == Some(program.id.as_str()))));
}

#[tokio::test]
async fn test_failed_baseline_reports_one_catch_up_event() {
    let store = memory_store().await;
    let gated = Arc::new(GatedStore::new(store.clone()));
    let feed = PollingChangeFeed::with_interval(gated.clone(), Duration::from_millis(20));
    let (events, handler) = recorder();

    gated.set_failing(true);
    feed.subscribe(Collection::StudyPrograms, USER, handler).await.unwrap();
    gated.set_failing(false);

    assert!(eventually!(!events.lock().unwrap().is_empty()));
    tokio::time::sleep(Duration::from_millis(80)).await;
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record_id, None);
}
