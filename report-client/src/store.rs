//! Remote store abstraction consumed by the auto-save engine

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{DailyReport, DailyReportPatch, NewDailyReport};

use crate::ClientResult;

/// Daily report persistence
///
/// Implementations must reject `create` with a conflict error when a report
/// already exists for `(employee_id, report_date)`, and fail `update` with a
/// not-found error when `id` matches no row.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn find_by_employee_and_date(
        &self,
        employee_id: i64,
        date: NaiveDate,
    ) -> ClientResult<Option<DailyReport>>;

    async fn create(&self, input: &NewDailyReport) -> ClientResult<DailyReport>;

    async fn update(&self, id: i64, patch: &DailyReportPatch) -> ClientResult<DailyReport>;
}
