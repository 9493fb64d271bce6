//! REST store over the hosted query API

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::util::format_date;
use shared::{DailyReport, DailyReportPatch, NewDailyReport};

use crate::error::{NO_ROWS_CODE, UNIQUE_VIOLATION_CODE};
use crate::{ClientConfig, ClientError, ClientResult, ReportStore};

/// Ask the API for a single JSON object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
/// Upper bound on rows fetched by `list`
const LIST_RANGE: &str = "0-99999";

/// Error body returned by the hosted API
#[derive(serde::Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Report store backed by the hosted REST API
#[derive(Debug, Clone)]
pub struct RestReportStore {
    client: Client,
    endpoint: String,
    api_key: String,
    token: Option<String>,
}

impl RestReportStore {
    /// Create a new store from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.clone(),
            token: config.token.clone(),
        })
    }

    /// Set the session token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token.as_deref().unwrap_or(&self.api_key))
    }

    fn request(&self, method: Method, single: bool) -> RequestBuilder {
        let req = self
            .client
            .request(method, &self.endpoint)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, self.auth_header());
        if single {
            req.header(ACCEPT, SINGLE_OBJECT)
        } else {
            req
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ClientResult<T> {
        let response = req.send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Map non-success responses to typed errors
    async fn check_status(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await?;
        tracing::debug!(status = %status, body = %text, "Report API request failed");

        // Coded error bodies carry a message; the status decides the error kind
        let parsed = serde_json::from_str::<ApiErrorBody>(&text).ok();
        let (code, message, details) = match parsed {
            Some(body) => (
                body.code,
                body.message.unwrap_or_else(|| text.clone()),
                body.details,
            ),
            None => (None, text, None),
        };

        match code.as_deref() {
            Some(NO_ROWS_CODE) => return Err(ClientError::NotFound(message)),
            Some(UNIQUE_VIOLATION_CODE) => return Err(ClientError::Conflict(message)),
            _ => {}
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized(message)),
            StatusCode::FORBIDDEN => Err(ClientError::Forbidden(message)),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(message)),
            StatusCode::NOT_ACCEPTABLE => Err(ClientError::NotAcceptable(message)),
            StatusCode::CONFLICT => Err(ClientError::Conflict(message)),
            StatusCode::BAD_REQUEST => Err(ClientError::Validation(message)),
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Err(ClientError::Unavailable(message)),
            _ => Err(ClientError::Api {
                code: code.unwrap_or_else(|| status.as_u16().to_string()),
                message,
                details,
            }),
        }
    }

    // ========== Listing API ==========

    /// All reports, newest business date first, then newest created first
    pub async fn list(&self) -> ClientResult<Vec<DailyReport>> {
        let req = self
            .request(Method::GET, false)
            .header("Range-Unit", "items")
            .header("Range", LIST_RANGE)
            .query(&[("select", "*"), ("order", "ngay_bao_cao.desc,tg_tao.desc")]);
        self.send(req).await
    }

    /// Report by id, `None` when it does not exist
    pub async fn get_by_id(&self, id: i64) -> ClientResult<Option<DailyReport>> {
        let req = self
            .request(Method::GET, true)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        match self.send(req).await {
            Ok(report) => Ok(Some(report)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Existing report for the natural key, optionally ignoring one record
    pub async fn check_duplicate(
        &self,
        employee_id: i64,
        date: NaiveDate,
        exclude_id: Option<i64>,
    ) -> ClientResult<Option<DailyReport>> {
        let mut query = vec![
            ("select", "id,ma_nhan_vien,ngay_bao_cao".to_string()),
            ("ma_nhan_vien", format!("eq.{employee_id}")),
            ("ngay_bao_cao", format!("eq.{}", format_date(date))),
        ];
        if let Some(id) = exclude_id {
            query.push(("id", format!("neq.{id}")));
        }
        let rows: Vec<DailyReport> = self.send(self.request(Method::GET, false).query(&query)).await?;
        Ok(rows.into_iter().next())
    }

    /// Delete one report
    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        let req = self
            .request(Method::DELETE, false)
            .query(&[("id", format!("eq.{id}"))]);
        Self::check_status(req.send().await?).await?;
        Ok(())
    }

    /// Delete several reports in one request
    pub async fn batch_delete(&self, ids: &[i64]) -> ClientResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        let req = self
            .request(Method::DELETE, false)
            .query(&[("id", format!("in.({list})"))]);
        Self::check_status(req.send().await?).await?;
        Ok(())
    }
}

fn duplicate_message(employee_id: i64, date: NaiveDate) -> String {
    format!(
        "employee {employee_id} already has a report for {}; only one report per employee per day is allowed",
        format_date(date)
    )
}

#[async_trait]
impl ReportStore for RestReportStore {
    async fn find_by_employee_and_date(
        &self,
        employee_id: i64,
        date: NaiveDate,
    ) -> ClientResult<Option<DailyReport>> {
        let req = self.request(Method::GET, false).query(&[
            ("select", "*".to_string()),
            ("ma_nhan_vien", format!("eq.{employee_id}")),
            ("ngay_bao_cao", format!("eq.{}", format_date(date))),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<DailyReport> = self.send(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn create(&self, input: &NewDailyReport) -> ClientResult<DailyReport> {
        if self
            .check_duplicate(input.employee_id, input.report_date, None)
            .await?
            .is_some()
        {
            return Err(ClientError::Conflict(duplicate_message(
                input.employee_id,
                input.report_date,
            )));
        }

        let req = self
            .request(Method::POST, true)
            .header("Prefer", "return=representation")
            .json(input);
        let report: DailyReport = self.send(req).await?;
        tracing::debug!(id = report.id, employee_id = report.employee_id, "Created daily report");
        Ok(report)
    }

    async fn update(&self, id: i64, patch: &DailyReportPatch) -> ClientResult<DailyReport> {
        if let (Some(employee_id), Some(date)) = (patch.employee_id, patch.report_date)
            && self.check_duplicate(employee_id, date, Some(id)).await?.is_some()
        {
            return Err(ClientError::Conflict(duplicate_message(employee_id, date)));
        }

        let req = self
            .request(Method::PATCH, true)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id}"))])
            .json(patch);
        self.send(req).await
    }
}
