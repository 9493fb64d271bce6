//! Employee Model

use serde::{Deserialize, Serialize};

/// The editing employee and their organisational placement.
///
/// The placement is copied onto a report when it is first created, so the
/// record keeps the department/group the employee belonged to at that time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee_id: i64,
    pub department_id: Option<i64>,
    pub department_code: Option<String>,
    pub group_code: Option<String>,
}

impl EmployeeProfile {
    pub fn new(employee_id: i64) -> Self {
        Self {
            employee_id,
            department_id: None,
            department_code: None,
            group_code: None,
        }
    }

    pub fn with_department(mut self, id: Option<i64>, code: Option<String>) -> Self {
        self.department_id = id;
        self.department_code = code;
        self
    }

    pub fn with_group(mut self, code: Option<String>) -> Self {
        self.group_code = code;
        self
    }
}
