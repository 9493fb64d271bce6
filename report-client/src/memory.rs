//! In-memory report store
//!
//! Same contract as the REST store (server-assigned ids, natural-key duplicate
//! check, timestamps), plus hooks for exercising failure paths.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::util::format_date;
use shared::{DailyReport, DailyReportPatch, NewDailyReport};
use tokio::sync::Mutex;

use crate::{ClientError, ClientResult, ReportStore};

/// Kind of failure injected into the next store call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Transport-level failure (retryable)
    Unavailable,
    /// Permission failure (not retryable)
    Forbidden,
}

impl FailureMode {
    fn to_error(self) -> ClientError {
        match self {
            Self::Unavailable => ClientError::Unavailable("simulated network failure".into()),
            Self::Forbidden => ClientError::Forbidden("simulated permission failure".into()),
        }
    }
}

/// Number of calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub find: u32,
    pub create: u32,
    pub update: u32,
}

impl StoreCalls {
    /// Create and update calls together
    pub fn writes(&self) -> u32 {
        self.create + self.update
    }
}

#[derive(Debug, Default)]
struct Inner {
    reports: Vec<DailyReport>,
    next_id: i64,
    failures: VecDeque<FailureMode>,
    latency: Duration,
    calls: StoreCalls,
}

/// Process-local `ReportStore`
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    inner: Mutex<Inner>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing reports
    pub fn with_reports(reports: Vec<DailyReport>) -> Self {
        let next_id = reports.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            inner: Mutex::new(Inner {
                reports,
                next_id,
                ..Default::default()
            }),
        }
    }

    /// Fail the next `count` calls (of any operation) with `mode`
    pub async fn fail_next(&self, count: usize, mode: FailureMode) {
        let mut inner = self.inner.lock().await;
        inner.failures.extend(std::iter::repeat_n(mode, count));
    }

    /// Delay every call by `latency`
    pub async fn set_latency(&self, latency: Duration) {
        self.inner.lock().await.latency = latency;
    }

    /// Calls received so far
    pub async fn calls(&self) -> StoreCalls {
        self.inner.lock().await.calls
    }

    /// Snapshot of every stored report
    pub async fn reports(&self) -> Vec<DailyReport> {
        self.inner.lock().await.reports.clone()
    }

    /// Delete a report without the client knowing
    pub async fn remove(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().await;
        let before = inner.reports.len();
        inner.reports.retain(|r| r.id != id);
        inner.reports.len() != before
    }

    /// Apply latency and pop an injected failure, if any
    async fn enter(&self, record: impl FnOnce(&mut StoreCalls)) -> ClientResult<()> {
        let latency = {
            let mut inner = self.inner.lock().await;
            record(&mut inner.calls);
            inner.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self.inner.lock().await.failures.pop_front() {
            Some(mode) => Err(mode.to_error()),
            None => Ok(()),
        }
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn find_by_employee_and_date(
        &self,
        employee_id: i64,
        date: NaiveDate,
    ) -> ClientResult<Option<DailyReport>> {
        self.enter(|calls| calls.find += 1).await?;
        let inner = self.inner.lock().await;
        Ok(inner
            .reports
            .iter()
            .find(|r| r.employee_id == employee_id && r.report_date == date)
            .cloned())
    }

    async fn create(&self, input: &NewDailyReport) -> ClientResult<DailyReport> {
        self.enter(|calls| calls.create += 1).await?;
        let mut inner = self.inner.lock().await;
        if inner
            .reports
            .iter()
            .any(|r| r.employee_id == input.employee_id && r.report_date == input.report_date)
        {
            return Err(ClientError::Conflict(format!(
                "employee {} already has a report for {}",
                input.employee_id,
                format_date(input.report_date)
            )));
        }

        inner.next_id += 1;
        let now = timestamp();
        let report = DailyReport {
            id: inner.next_id,
            employee_id: input.employee_id,
            report_date: input.report_date,
            items: input.items.clone(),
            department_id: input.department_id,
            department_code: input.department_code.clone(),
            group_code: input.group_code.clone(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        inner.reports.push(report.clone());
        Ok(report)
    }

    async fn update(&self, id: i64, patch: &DailyReportPatch) -> ClientResult<DailyReport> {
        self.enter(|calls| calls.update += 1).await?;
        let mut inner = self.inner.lock().await;

        if let (Some(employee_id), Some(date)) = (patch.employee_id, patch.report_date)
            && inner
                .reports
                .iter()
                .any(|r| r.id != id && r.employee_id == employee_id && r.report_date == date)
        {
            return Err(ClientError::Conflict(format!(
                "employee {employee_id} already has a report for {}",
                format_date(date)
            )));
        }

        let report = inner
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("daily report {id} (0 rows)")))?;

        if let Some(employee_id) = patch.employee_id {
            report.employee_id = employee_id;
        }
        if let Some(date) = patch.report_date {
            report.report_date = date;
        }
        if let Some(items) = &patch.items {
            report.items = items.clone();
        }
        if patch.department_id.is_some() {
            report.department_id = patch.department_id;
        }
        if patch.department_code.is_some() {
            report.department_code = patch.department_code.clone();
        }
        if patch.group_code.is_some() {
            report.group_code = patch.group_code.clone();
        }
        report.updated_at = Some(timestamp());
        Ok(report.clone())
    }
}
