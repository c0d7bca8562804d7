// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use jobtrack_app::{
    ApiError, ApplicationId, ColorOverrides, DEFAULT_STATUS_NAME, JobApplication,
    NewApplication, StatusHistoryEntry, StatusHistoryId, format_iso_date, parse_iso_date,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, warn};

/// Blocking client for the job tracker REST API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    token: Option<String>,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = url::Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token: token.filter(|token| !token.trim().is_empty()),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Applications owned by the signed-in user. Rows without a usable date
    /// are skipped.
    pub fn list_applications(&self) -> Result<Vec<JobApplication>, ApiError> {
        let response = self.send(self.http.get(self.url("/jobs")))?;
        let rows: Vec<WireApplication> = decode(response, "application list")?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                match row.into_application() {
                    Some(record) => Some(record),
                    None => {
                        warn!(id, "skipping application with unreadable date");
                        None
                    }
                }
            })
            .collect())
    }

    pub fn create_application(&self, input: &NewApplication) -> Result<JobApplication, ApiError> {
        let payload = WirePayload::from_new(input);
        let response = self.send(self.http.post(self.url("/jobs")).json(&payload))?;
        let row: WireApplication = decode(response, "created application")?;
        let id = row.id;
        row.into_application().ok_or_else(|| {
            ApiError::Unknown(format!("server returned application {id} without a valid date"))
        })
    }

    /// PUT the full record. The response body is not required; the server
    /// may answer with only a message when nothing changed.
    pub fn update_application(&self, record: &JobApplication) -> Result<(), ApiError> {
        let payload = WirePayload::from_record(record);
        let path = format!("/jobs/{}", record.id);
        self.send(self.http.put(self.url(&path)).json(&payload))?;
        Ok(())
    }

    pub fn delete_application(&self, id: ApplicationId) -> Result<(), ApiError> {
        let path = format!("/jobs/{id}");
        self.send(self.http.delete(self.url(&path)))?;
        Ok(())
    }

    pub fn fetch_status_history(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<StatusHistoryEntry>, ApiError> {
        let path = format!("/status-history/{id}");
        let response = self.send(self.http.get(self.url(&path)))?;
        let rows: Vec<WireHistoryEntry> = decode(response, "status history")?;
        rows.into_iter()
            .map(WireHistoryEntry::into_entry)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ApiError::Unknown("status history contained an unreadable timestamp".to_owned())
            })
    }

    /// Server-side status colors. Entries with a missing or non-hex color are
    /// dropped.
    pub fn list_status_colors(&self) -> Result<ColorOverrides, ApiError> {
        let response = self.send(self.http.get(self.url("/job-statuses")))?;
        let rows: Vec<WireStatusColor> = decode(response, "status colors")?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.color_code.map(|color| (row.status_name, color)))
            .collect())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let Some(token) = &self.token else {
            return Err(ApiError::missing_token());
        };
        let request = request
            .bearer_auth(token)
            .build()
            .map_err(|error| connection_error(&self.base_url, &error))?;
        debug!(method = %request.method(), url = %request.url(), "api request");

        let response = self
            .http
            .execute(request)
            .map_err(|error| connection_error(&self.base_url, &error))?;
        let status = response.status();
        debug!(status = status.as_u16(), "api response");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
    response
        .json()
        .map_err(|error| ApiError::Unknown(format!("decode {what}: {error}")))
}

fn connection_error(base_url: &str, error: &reqwest::Error) -> ApiError {
    ApiError::Network {
        url: base_url.to_owned(),
        detail: error.to_string(),
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let code = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed
            .error
            .or(parsed.message)
            .filter(|message| !message.is_empty())
    {
        return ApiError::from_status(code, message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return ApiError::from_status(code, trimmed);
    }

    ApiError::from_status(code, format!("server returned {code}"))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireApplication {
    id: i64,
    company_name: Option<String>,
    job_title: Option<String>,
    status: Option<String>,
    application_date: Option<String>,
    created_at: Option<String>,
    location: Option<String>,
    job_url: Option<String>,
    notes: Option<String>,
}

impl WireApplication {
    fn into_application(self) -> Option<JobApplication> {
        let application_date = self
            .application_date
            .as_deref()
            .and_then(parse_wire_date)
            .or_else(|| self.created_at.as_deref().and_then(parse_wire_date))?;
        Some(JobApplication {
            id: ApplicationId::new(self.id),
            company_name: self.company_name.unwrap_or_default(),
            job_title: self.job_title.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            application_date,
            location: self.location.filter(|value| !value.is_empty()),
            job_url: self.job_url.filter(|value| !value.is_empty()),
            notes: self.notes.filter(|value| !value.is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
struct WirePayload<'a> {
    company_name: &'a str,
    job_title: &'a str,
    status: &'a str,
    application_date: String,
    location: Option<&'a str>,
    job_url: Option<&'a str>,
    notes: Option<&'a str>,
}

impl<'a> WirePayload<'a> {
    fn from_new(input: &'a NewApplication) -> Self {
        let status = if input.status.is_empty() {
            DEFAULT_STATUS_NAME
        } else {
            input.status.as_str()
        };
        Self {
            company_name: &input.company_name,
            job_title: &input.job_title,
            status,
            application_date: format_iso_date(input.application_date),
            location: input.location.as_deref(),
            job_url: input.job_url.as_deref(),
            notes: input.notes.as_deref(),
        }
    }

    fn from_record(record: &'a JobApplication) -> Self {
        Self {
            company_name: &record.company_name,
            job_title: &record.job_title,
            status: &record.status,
            application_date: format_iso_date(record.application_date),
            location: record.location.as_deref(),
            job_url: record.job_url.as_deref(),
            notes: record.notes.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireHistoryEntry {
    id: i64,
    from_status: Option<String>,
    to_status: String,
    changed_at: String,
    changed_by: Option<serde_json::Value>,
    notes: Option<String>,
}

impl WireHistoryEntry {
    fn into_entry(self) -> Option<StatusHistoryEntry> {
        let changed_by = match self.changed_by {
            Some(serde_json::Value::String(name)) if !name.is_empty() => Some(name),
            Some(serde_json::Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        Some(StatusHistoryEntry {
            id: StatusHistoryId::new(self.id),
            from_status: self.from_status.filter(|value| !value.is_empty()),
            to_status: self.to_status,
            changed_at: parse_wire_timestamp(&self.changed_at)?,
            changed_by,
            notes: self.notes.filter(|value| !value.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireStatusColor {
    status_name: String,
    color_code: Option<String>,
}

/// Timestamps arrive as RFC 3339, RFC 2822 (`Fri, 05 Jan 2024 10:00:00 GMT`),
/// or naive ISO, which is read as UTC.
pub fn parse_wire_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc2822) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ),
    ) {
        return Some(value.assume_utc());
    }

    let naive = raw.split_once('.').map_or(raw, |(head, _)| head);
    for format in [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ] {
        if let Ok(value) = PrimitiveDateTime::parse(naive, format) {
            return Some(value.assume_utc());
        }
    }
    parse_iso_date(raw).map(|date| date.midnight().assume_utc())
}

pub fn parse_wire_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if let Some(date) = raw.get(..10).and_then(parse_iso_date) {
        return Some(date);
    }
    parse_wire_timestamp(raw).map(OffsetDateTime::date)
}

#[cfg(test)]
mod tests {
    use super::{clean_error_response, parse_wire_date, parse_wire_timestamp};
    use jobtrack_app::{ApiError, ApiErrorKind};
    use reqwest::StatusCode;
    use time::macros::{date, datetime};

    #[test]
    fn error_envelope_message_is_surfaced() {
        let error = clean_error_response(StatusCode::BAD_REQUEST, r#"{"error":"title required"}"#);
        assert_eq!(error, ApiError::Validation("title required".to_owned()));

        let error = clean_error_response(StatusCode::UNAUTHORIZED, r#"{"message":"Token is invalid!"}"#);
        assert_eq!(error.kind(), ApiErrorKind::Auth);
        assert!(error.to_string().contains("Token is invalid!"));
    }

    #[test]
    fn html_bodies_are_not_echoed() {
        let error = clean_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html><body>{ stack trace }</body></html>",
        );
        assert_eq!(error, ApiError::Unknown("server returned 500".to_owned()));
        let error = clean_error_response(StatusCode::NOT_FOUND, "no such job");
        assert_eq!(error, ApiError::NotFound("no such job".to_owned()));
    }

    #[test]
    fn timestamps_accept_server_formats() {
        let expected = datetime!(2024-01-05 10:30:00 UTC);
        assert_eq!(parse_wire_timestamp("2024-01-05T10:30:00Z"), Some(expected));
        assert_eq!(
            parse_wire_timestamp("Fri, 05 Jan 2024 10:30:00 GMT"),
            Some(expected)
        );
        assert_eq!(parse_wire_timestamp("2024-01-05T10:30:00.123456"), Some(expected));
        assert_eq!(parse_wire_timestamp("2024-01-05 10:30:00"), Some(expected));
        assert_eq!(parse_wire_timestamp("yesterday"), None);
    }

    #[test]
    fn dates_accept_plain_and_timestamp_forms() {
        assert_eq!(parse_wire_date("2024-01-05"), Some(date!(2024-01-05)));
        assert_eq!(parse_wire_date("2024-01-05T00:00:00"), Some(date!(2024-01-05)));
        assert_eq!(
            parse_wire_date("Fri, 05 Jan 2024 00:00:00 GMT"),
            Some(date!(2024-01-05))
        );
        assert_eq!(parse_wire_date(""), None);
    }
}
