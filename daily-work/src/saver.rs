//! One persisted write of the filtered items
//!
//! A `SaveJob` decides insert versus update, retries transient failures
//! with a fixed delay, and stops early when cancelled.

use std::time::Duration;

use chrono::NaiveDate;
use report_client::{ClientResult, ReportStore};
use shared::{DailyReport, DailyReportPatch, EmployeeProfile, NewDailyReport, WorkItem};
use tokio_util::sync::CancellationToken;

use crate::config::AutoSaveConfig;

/// Retry budget for a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_consecutive_errors: u32,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn once() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::ZERO,
            max_consecutive_errors: u32::MAX,
        }
    }
}

impl From<&AutoSaveConfig> for RetryPolicy {
    fn from(config: &AutoSaveConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// Persisted; `None` when there was nothing to create
    Saved(Option<DailyReport>),
    /// Cancelled before completion
    Aborted,
    /// `gave_up` is set once failures reached the consecutive limit
    Failed { message: String, gave_up: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub result: JobResult,
    /// Failed attempts, including the last one
    pub failures: u32,
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct SaveJob {
    pub employee: EmployeeProfile,
    pub date: NaiveDate,
    /// Known record for `date`; re-queried when absent
    pub record_id: Option<i64>,
    /// Filtered items, written as-is
    pub items: Vec<WorkItem>,
    /// Consecutive failures before this job started
    pub errors_before: u32,
    pub policy: RetryPolicy,
}

impl SaveJob {
    pub async fn run(mut self, store: &dyn ReportStore, cancel: &CancellationToken) -> JobReport {
        let mut failures = 0;
        let mut retries = 0;

        loop {
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return JobReport { result: JobResult::Aborted, failures, retries };
                }
                result = self.persist_once(store) => result,
            };

            let error = match attempt {
                Ok(record) => {
                    return JobReport {
                        result: JobResult::Saved(record),
                        failures,
                        retries,
                    };
                }
                Err(e) => e,
            };

            failures += 1;
            let gave_up = self.errors_before + failures >= self.policy.max_consecutive_errors;
            if gave_up || retries >= self.policy.max_retries || !error.is_retryable() {
                tracing::warn!(
                    employee_id = self.employee.employee_id,
                    date = %self.date,
                    failures,
                    "Save failed: {error}"
                );
                return JobReport {
                    result: JobResult::Failed {
                        message: error.to_string(),
                        gave_up,
                    },
                    failures,
                    retries,
                };
            }

            retries += 1;
            tracing::warn!(
                attempt = retries,
                max_retries = self.policy.max_retries,
                delay_ms = self.policy.retry_delay.as_millis() as u64,
                "Save attempt failed, retrying: {error}"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return JobReport { result: JobResult::Aborted, failures, retries };
                }
                _ = tokio::time::sleep(self.policy.retry_delay) => {}
            }
        }
    }

    async fn persist_once(&mut self, store: &dyn ReportStore) -> ClientResult<Option<DailyReport>> {
        let existing = match self.record_id {
            Some(id) => Some(id),
            None => store
                .find_by_employee_and_date(self.employee.employee_id, self.date)
                .await?
                .map(|r| r.id),
        };

        let Some(id) = existing else {
            return self.create(store).await;
        };

        match store.update(id, &DailyReportPatch::items(self.items.clone())).await {
            Ok(record) => {
                self.record_id = Some(record.id);
                Ok(Some(record))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(record_id = id, "Report vanished before update, creating it again");
                self.record_id = None;
                self.create(store).await
            }
            Err(e) => Err(e),
        }
    }

    async fn create(&mut self, store: &dyn ReportStore) -> ClientResult<Option<DailyReport>> {
        if self.items.is_empty() {
            return Ok(None);
        }

        let report = NewDailyReport::for_employee(&self.employee, self.date, self.items.clone());
        match store.create(&report).await {
            Ok(record) => {
                self.record_id = Some(record.id);
                Ok(Some(record))
            }
            Err(e) if e.is_conflict() => {
                // Another writer created it first; update theirs
                let Some(existing) = store
                    .find_by_employee_and_date(self.employee.employee_id, self.date)
                    .await?
                else {
                    return Err(e);
                };
                let record = store
                    .update(existing.id, &DailyReportPatch::items(self.items.clone()))
                    .await?;
                self.record_id = Some(record.id);
                Ok(Some(record))
            }
            Err(e) => Err(e),
        }
    }
}

/// Best-effort single write that re-derives insert versus update from the store
pub async fn flush_once(
    store: &dyn ReportStore,
    employee: EmployeeProfile,
    date: NaiveDate,
    items: Vec<WorkItem>,
) -> Result<Option<DailyReport>, String> {
    let job = SaveJob {
        employee,
        date,
        record_id: None,
        items,
        errors_before: 0,
        policy: RetryPolicy::once(),
    };
    match job.run(store, &CancellationToken::new()).await.result {
        JobResult::Saved(record) => Ok(record),
        JobResult::Failed { message, .. } => Err(message),
        JobResult::Aborted => Err("flush cancelled".to_string()),
    }
}
