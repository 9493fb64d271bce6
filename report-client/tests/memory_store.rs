// report-client/tests/memory_store.rs

use std::time::Duration;

use chrono::NaiveDate;
use report_client::{
    ClientError, DailyReportPatch, EmployeeProfile, FailureMode, InMemoryReportStore,
    NewDailyReport, ReportStore, WorkItem,
};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn input(employee_id: i64) -> NewDailyReport {
    NewDailyReport::for_employee(
        &EmployeeProfile::new(employee_id).with_group(Some("N2".into())),
        date(),
        vec![WorkItem {
            id: 1,
            plan: "Call supplier".into(),
            ..Default::default()
        }],
    )
}

#[tokio::test]
async fn test_assigns_ids_and_enforces_natural_key() {
    let store = InMemoryReportStore::new();
    let first = store.create(&input(5)).await.unwrap();
    let second = store.create(&input(6)).await.unwrap();
    assert_eq!((first.id, second.id), (1, 2));
    assert_eq!(first.group_code.as_deref(), Some("N2"));
    assert!(first.created_at.is_some());

    let err = store.create(&input(5)).await.unwrap_err();
    assert!(err.is_conflict());

    let calls = store.calls().await;
    assert_eq!(calls.create, 3);
    assert_eq!(calls.writes(), 3);
}

#[tokio::test]
async fn test_update_after_removal_is_not_found() {
    let store = InMemoryReportStore::new();
    let report = store.create(&input(5)).await.unwrap();
    assert!(store.remove(report.id).await);

    let err = store
        .update(report.id, &DailyReportPatch::items(vec![]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.find_by_employee_and_date(5, date()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_injected_failures_are_consumed_in_order() {
    let store = InMemoryReportStore::new();
    store.fail_next(1, FailureMode::Unavailable).await;
    store.fail_next(1, FailureMode::Forbidden).await;

    let first = store.find_by_employee_and_date(1, date()).await.unwrap_err();
    assert!(matches!(first, ClientError::Unavailable(_)));
    let second = store.create(&input(1)).await.unwrap_err();
    assert!(matches!(second, ClientError::Forbidden(_)));
    assert!(store.create(&input(1)).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_latency_delays_calls() {
    let store = InMemoryReportStore::new();
    store.set_latency(Duration::from_millis(250)).await;

    let started = tokio::time::Instant::now();
    store.find_by_employee_and_date(1, date()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(250));
}
