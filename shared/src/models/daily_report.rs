//! Daily Report Model (one record per employee and date)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lenient;
use super::{EmployeeProfile, WorkItem};

/// Daily Report - the per-(employee, date) work plan/result record
///
/// At most one report exists per `(employee_id, report_date)`; the natural key
/// is enforced by a duplicate check before insert, not by the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    #[serde(deserialize_with = "lenient::int_or_string")]
    pub id: i64,
    #[serde(rename = "ma_nhan_vien", deserialize_with = "lenient::int_or_string")]
    pub employee_id: i64,
    /// Business date (YYYY-MM-DD format)
    #[serde(rename = "ngay_bao_cao")]
    pub report_date: NaiveDate,
    /// Non-empty work items, stored as one JSON column
    #[serde(rename = "chi_tiet_cong_viec", default, deserialize_with = "lenient::work_items")]
    pub items: Vec<WorkItem>,
    #[serde(
        rename = "phong_ban_id",
        default,
        deserialize_with = "lenient::opt_int_or_string"
    )]
    pub department_id: Option<i64>,
    #[serde(rename = "ma_phong", default)]
    pub department_code: Option<String>,
    #[serde(rename = "ma_nhom", default)]
    pub group_code: Option<String>,
    #[serde(rename = "tg_tao", default)]
    pub created_at: Option<String>,
    #[serde(rename = "tg_cap_nhat", default)]
    pub updated_at: Option<String>,
}

/// Create daily report payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDailyReport {
    #[serde(rename = "ma_nhan_vien")]
    pub employee_id: i64,
    #[serde(rename = "ngay_bao_cao")]
    pub report_date: NaiveDate,
    #[serde(rename = "chi_tiet_cong_viec")]
    pub items: Vec<WorkItem>,
    #[serde(rename = "phong_ban_id", skip_serializing_if = "Option::is_none", default)]
    pub department_id: Option<i64>,
    #[serde(rename = "ma_phong", skip_serializing_if = "Option::is_none", default)]
    pub department_code: Option<String>,
    #[serde(rename = "ma_nhom", skip_serializing_if = "Option::is_none", default)]
    pub group_code: Option<String>,
}

impl NewDailyReport {
    /// Insert payload carrying the employee's current organisational placement
    pub fn for_employee(profile: &EmployeeProfile, report_date: NaiveDate, items: Vec<WorkItem>) -> Self {
        Self {
            employee_id: profile.employee_id,
            report_date,
            items,
            department_id: profile.department_id,
            department_code: profile.department_code.clone(),
            group_code: profile.group_code.clone(),
        }
    }
}

/// Update daily report payload (unset fields are left untouched)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyReportPatch {
    #[serde(rename = "ma_nhan_vien", skip_serializing_if = "Option::is_none", default)]
    pub employee_id: Option<i64>,
    #[serde(rename = "ngay_bao_cao", skip_serializing_if = "Option::is_none", default)]
    pub report_date: Option<NaiveDate>,
    #[serde(rename = "chi_tiet_cong_viec", skip_serializing_if = "Option::is_none", default)]
    pub items: Option<Vec<WorkItem>>,
    #[serde(rename = "phong_ban_id", skip_serializing_if = "Option::is_none", default)]
    pub department_id: Option<i64>,
    #[serde(rename = "ma_phong", skip_serializing_if = "Option::is_none", default)]
    pub department_code: Option<String>,
    #[serde(rename = "ma_nhom", skip_serializing_if = "Option::is_none", default)]
    pub group_code: Option<String>,
}

impl DailyReportPatch {
    /// Patch that replaces only the work items
    pub fn items(items: Vec<WorkItem>) -> Self {
        Self {
            items: Some(items),
            ..Default::default()
        }
    }
}
