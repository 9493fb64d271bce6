//! End-to-end behaviour of the auto-save engine against the in-memory store.
//!
//! Time is paused, so sleeps advance the clock instantly once every task is idle.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use daily_work::{
    AutoSaveConfig, AutoSaveEngine, DateSwitch, Edit, EngineEvent, EngineHandle, LinkKey,
    SaveError, SaveStatus,
};
use report_client::{FailureMode, InMemoryReportStore};
use shared::{DailyReport, EmployeeProfile, WorkItem};
use tokio::task::JoinHandle;

const EMPLOYEE: i64 = 7;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn plan(slot: usize, text: &str) -> Edit {
    Edit::Plan {
        slot,
        text: text.into(),
    }
}

fn stored(id: i64, items: Vec<WorkItem>) -> DailyReport {
    DailyReport {
        id,
        employee_id: EMPLOYEE,
        report_date: date(),
        items,
        department_id: Some(4),
        department_code: Some("OPS".into()),
        group_code: None,
        created_at: None,
        updated_at: None,
    }
}

/// Spawn an engine and wait for its first load
async fn start(store: &Arc<InMemoryReportStore>) -> (EngineHandle, JoinHandle<()>) {
    let employee = EmployeeProfile::new(EMPLOYEE).with_department(Some(4), Some("OPS".into()));
    let (handle, worker) =
        AutoSaveEngine::spawn(store.clone(), employee, date(), AutoSaveConfig::default());
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.loaded);
    (handle, worker)
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(10)).await;
}

#[tokio::test(start_paused = true)]
async fn edit_creates_report_after_quiet_period() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(2, "Prepare the weekly review")).await.unwrap();

    // Still inside the typing window: nothing written yet
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(store.calls().await.writes(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let calls = store.calls().await;
    assert_eq!(calls.create, 1);
    assert_eq!(calls.update, 0);

    let reports = store.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].report_date, date());
    assert_eq!(reports[0].department_code.as_deref(), Some("OPS"));
    assert_eq!(reports[0].items.len(), 1);
    assert_eq!(reports[0].items[0].id, 3);
    assert_eq!(reports[0].items[0].plan, "Prepare the weekly review");

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.record_id, Some(reports[0].id));
    assert!(!snapshot.dirty);
}

#[tokio::test(start_paused = true)]
async fn identical_payload_is_not_saved_twice() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(2, "Same text")).await.unwrap();
    settle().await;
    let before = store.calls().await;
    assert_eq!(before.writes(), 1);

    // Re-typing the same content and blurring changes nothing on the server
    handle.edit(plan(2, "Same text")).await.unwrap();
    handle.blur().await.unwrap();
    settle().await;
    assert_eq!(store.calls().await, before);
}

#[tokio::test(start_paused = true)]
async fn empty_items_are_never_saved() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(0, "   ")).await.unwrap();
    handle.edit(Edit::AddLink { slot: 1 }).await.unwrap();
    settle().await;
    handle.blur().await.unwrap();
    handle.navigate_away().await.unwrap();
    assert_eq!(handle.save_now().await.unwrap(), None);
    settle().await;

    assert_eq!(store.calls().await.writes(), 0);
    assert!(store.reports().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn blur_saves_once_without_waiting_for_debounce() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(0, "Call the supplier")).await.unwrap();
    handle.blur().await.unwrap();

    // Well before the quiet period would end
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.calls().await.create, 1);

    settle().await;
    assert_eq!(store.calls().await.writes(), 1);
    assert!(!handle.snapshot().await.unwrap().dirty);
}

#[tokio::test(start_paused = true)]
async fn auto_save_stops_after_consecutive_failures() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    store.fail_next(3, FailureMode::Unavailable).await;

    handle.edit(plan(0, "Unsaved work")).await.unwrap();
    settle().await;

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.dirty);
    assert_eq!(snapshot.consecutive_errors, 3);
    assert_eq!(snapshot.metrics.failed, 3);
    assert_eq!(snapshot.metrics.retries, 2);
    assert!(store.reports().await.is_empty());

    // Further edits no longer trigger automatic attempts
    let calls = store.calls().await;
    handle.edit(plan(0, "Unsaved work, more")).await.unwrap();
    settle().await;
    assert_eq!(store.calls().await, calls);
    assert!(handle.snapshot().await.unwrap().dirty);

    // An explicit blur is the user stepping in; it tries again and succeeds
    handle.blur().await.unwrap();
    settle().await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.dirty);
    assert_eq!(snapshot.consecutive_errors, 0);
    assert_eq!(store.reports().await[0].items[0].plan, "Unsaved work, more");
}

#[tokio::test(start_paused = true)]
async fn discarding_date_switch_drops_unsaved_edits() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(0, "Draft for today")).await.unwrap();
    let next = handle.next_day(DateSwitch::Discard).await.unwrap();
    assert_eq!(next, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.date, next);
    assert!(snapshot.items.iter().all(WorkItem::is_empty));
    assert!(!snapshot.dirty);

    settle().await;
    assert_eq!(store.calls().await.writes(), 0);

    handle.previous_day(DateSwitch::Discard).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.items.iter().all(WorkItem::is_empty));
}

#[tokio::test(start_paused = true)]
async fn saving_date_switch_persists_before_leaving() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(4, "Finish the audit")).await.unwrap();
    let target = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
    handle.select_date(target, DateSwitch::SaveFirst).await.unwrap();

    let reports = store.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].report_date, date());
    assert_eq!(reports[0].items[0].id, 5);
    assert_eq!(handle.snapshot().await.unwrap().date, target);
}

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_the_current_date() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    store.fail_next(1, FailureMode::Forbidden).await;

    handle.edit(plan(0, "Blocked by policy")).await.unwrap();
    let result = handle.next_day(DateSwitch::SaveFirst).await;
    assert!(matches!(result, Err(SaveError::Store(_))));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.date, date());
    assert_eq!(snapshot.items[0].plan, "Blocked by policy");
    assert!(snapshot.dirty);
}

#[tokio::test(start_paused = true)]
async fn saved_items_round_trip_through_reload() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, worker) = start(&store).await;

    handle.edit(plan(2, "Ship release")).await.unwrap();
    handle
        .edit(Edit::Result {
            slot: 2,
            text: "Shipped 1.4".into(),
        })
        .await
        .unwrap();
    handle
        .edit(Edit::Link {
            slot: 2,
            link: 0,
            url: "https://example.com/release".into(),
        })
        .await
        .unwrap();
    let saved = handle.save_now().await.unwrap().unwrap();
    handle.shutdown().await.unwrap();
    worker.await.unwrap();

    let (reopened, _worker) = start(&store).await;
    let snapshot = reopened.snapshot().await.unwrap();
    assert_eq!(snapshot.record_id, Some(saved.id));
    assert_eq!(snapshot.items.len(), 10);
    assert_eq!(snapshot.items[2].plan, "Ship release");
    assert_eq!(snapshot.items[2].result, "Shipped 1.4");
    assert_eq!(snapshot.items[2].links, vec!["https://example.com/release"]);
    assert!(snapshot.items[0].is_empty());
    assert!(!snapshot.dirty);
}

#[tokio::test(start_paused = true)]
async fn deleted_record_is_recreated_on_save() {
    let store = Arc::new(InMemoryReportStore::with_reports(vec![stored(
        5,
        vec![WorkItem {
            id: 1,
            plan: "Existing".into(),
            ..Default::default()
        }],
    )]));
    let (handle, _worker) = start(&store).await;
    assert_eq!(handle.snapshot().await.unwrap().record_id, Some(5));

    assert!(store.remove(5).await);
    handle.edit(plan(0, "Existing, edited")).await.unwrap();
    let record = handle.save_now().await.unwrap().unwrap();

    assert_ne!(record.id, 5);
    let reports = store.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].items[0].plan, "Existing, edited");
    assert_eq!(handle.snapshot().await.unwrap().record_id, Some(record.id));
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_edits() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, worker) = start(&store).await;

    handle.edit(plan(1, "Typed just before closing")).await.unwrap();
    handle.shutdown().await.unwrap();
    worker.await.unwrap();

    let reports = store.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].items[0].plan, "Typed just before closing");
    assert!(matches!(handle.snapshot().await, Err(SaveError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn invalid_links_block_saving_and_request_focus() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    let mut events = handle.subscribe();

    handle.edit(plan(1, "Document the API")).await.unwrap();
    handle
        .edit(Edit::Link {
            slot: 1,
            link: 0,
            url: "not a url".into(),
        })
        .await
        .unwrap();

    let result = handle.save_now().await;
    assert_eq!(result, Err(SaveError::InvalidLinks(vec![LinkKey::new(1, 0)])));
    settle().await;
    assert_eq!(store.calls().await.writes(), 0);

    let mut focused = None;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::FocusLink { key } = event {
            focused = Some(key);
        }
    }
    assert_eq!(focused, Some(LinkKey::new(1, 0)));

    // Fixing the link lets the next save through
    handle
        .edit(Edit::Link {
            slot: 1,
            link: 0,
            url: "https://example.com/api".into(),
        })
        .await
        .unwrap();
    assert!(handle.save_now().await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn refresh_does_not_clobber_unsaved_edits() {
    let store = Arc::new(InMemoryReportStore::with_reports(vec![stored(
        1,
        vec![WorkItem {
            id: 1,
            plan: "Server".into(),
            ..Default::default()
        }],
    )]));
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(0, "Local")).await.unwrap();
    handle.refresh().await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.items[0].plan, "Local");
    assert!(snapshot.dirty);
}

#[tokio::test(start_paused = true)]
async fn navigation_save_supersedes_slow_save() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    store.set_latency(Duration::from_secs(2)).await;

    handle.edit(plan(0, "First draft")).await.unwrap();
    handle.blur().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        handle.snapshot().await.unwrap().saving,
        Some(daily_work::SaveOrigin::Blur)
    );

    handle.edit(plan(0, "Final text")).await.unwrap();
    handle.navigate_away().await.unwrap();
    settle().await;

    let reports = store.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].items[0].plan, "Final text");
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.dirty);
    assert_eq!(snapshot.saving, None);
}

#[tokio::test(start_paused = true)]
async fn status_returns_to_idle_after_save() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    let mut events = handle.subscribe();

    handle.edit(plan(0, "Status check")).await.unwrap();
    handle.blur().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.snapshot().await.unwrap().status, SaveStatus::Saved);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(handle.snapshot().await.unwrap().status, SaveStatus::Idle);

    let statuses: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            EngineEvent::Status { status } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![SaveStatus::Saving, SaveStatus::Saved, SaveStatus::Idle]
    );
}

#[tokio::test(start_paused = true)]
async fn hidden_editor_writes_in_background() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;

    handle.edit(plan(0, "Switching tabs")).await.unwrap();
    handle.hidden().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.reports().await.len(), 1);

    settle().await;
    assert_eq!(store.reports().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_failure_for_previous_date_leaves_new_date_clean() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    store.set_latency(Duration::from_secs(2)).await;

    handle.edit(plan(0, "Written on the old date")).await.unwrap();
    handle.blur().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // The new date loads quickly; the old save is still waiting on the store
    store.set_latency(Duration::ZERO).await;
    let next = handle.next_day(DateSwitch::Discard).await.unwrap();
    store.fail_next(1, FailureMode::Forbidden).await;
    settle().await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.date, next);
    assert!(snapshot.items.iter().all(WorkItem::is_empty));
    assert!(!snapshot.dirty);
    assert_eq!(snapshot.consecutive_errors, 0);
    assert_eq!(snapshot.status, SaveStatus::Idle);
    assert_eq!(snapshot.saving, None);
    assert_eq!(store.calls().await.writes(), 0);

    // Refreshes of the new date are not blocked by a stale dirty flag
    let calls = store.calls().await;
    handle.refresh().await.unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(store.calls().await.find, calls.find + 1);
}

#[tokio::test(start_paused = true)]
async fn failed_auto_save_stays_silent_until_giving_up() {
    let store = Arc::new(InMemoryReportStore::new());
    let (handle, _worker) = start(&store).await;
    let mut events = handle.subscribe();
    store.fail_next(1, FailureMode::Forbidden).await;

    handle.edit(plan(0, "Quiet failure")).await.unwrap();
    settle().await;

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.dirty);
    assert_eq!(snapshot.consecutive_errors, 1);
    assert_eq!(snapshot.status, SaveStatus::Idle);

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::Status {
                status: SaveStatus::Error,
            } => saw_error = true,
            EngineEvent::Notice(_) => saw_error = true,
            _ => {}
        }
    }
    assert!(!saw_error);

    // An explicit save reports the same failure
    store.fail_next(1, FailureMode::Forbidden).await;
    assert!(matches!(handle.save_now().await, Err(SaveError::Store(_))));
    assert_eq!(handle.snapshot().await.unwrap().status, SaveStatus::Error);
}
