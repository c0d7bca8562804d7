// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{format_display_date, format_iso_date, parse_iso_date};
use crate::status::status_by_name;
use crate::{JobApplication, SortField};

/// How a column is edited and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Date,
    Url,
    Status,
    LongText,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{0} is required -- enter a value and retry")]
    Required(&'static str),
    #[error("invalid date {0:?}; use YYYY-MM-DD (for example 2026-03-14)")]
    InvalidDate(String),
    #[error("invalid url {0:?}; use a full http:// or https:// address")]
    InvalidUrl(String),
    #[error("unknown status {0:?}; pick one from the list")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicationField {
    Company,
    JobTitle,
    Status,
    AppliedDate,
    Location,
    JobUrl,
    Notes,
}

impl ApplicationField {
    /// Column order in the table and field order in the form.
    pub const ALL: [Self; 7] = [
        Self::Company,
        Self::JobTitle,
        Self::Status,
        Self::AppliedDate,
        Self::Location,
        Self::JobUrl,
        Self::Notes,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::JobTitle => "position",
            Self::Status => "status",
            Self::AppliedDate => "applied",
            Self::Location => "location",
            Self::JobUrl => "url",
            Self::Notes => "notes",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Company | Self::JobTitle | Self::Location => FieldKind::Text,
            Self::Status => FieldKind::Status,
            Self::AppliedDate => FieldKind::Date,
            Self::JobUrl => FieldKind::Url,
            Self::Notes => FieldKind::LongText,
        }
    }

    pub const fn is_required(self) -> bool {
        matches!(self, Self::Company | Self::JobTitle)
    }

    pub const fn sort_field(self) -> Option<SortField> {
        match self {
            Self::Company => Some(SortField::Company),
            Self::JobTitle => Some(SortField::Title),
            Self::Status => Some(SortField::Status),
            Self::AppliedDate => Some(SortField::Date),
            Self::Location | Self::JobUrl | Self::Notes => None,
        }
    }

    /// Raw text shown in the cell editor.
    pub fn edit_value(self, record: &JobApplication) -> String {
        match self {
            Self::Company => record.company_name.clone(),
            Self::JobTitle => record.job_title.clone(),
            Self::Status => record.status.clone(),
            Self::AppliedDate => format_iso_date(record.application_date),
            Self::Location => record.location.clone().unwrap_or_default(),
            Self::JobUrl => record.job_url.clone().unwrap_or_default(),
            Self::Notes => record.notes.clone().unwrap_or_default(),
        }
    }

    pub fn display_value(self, record: &JobApplication) -> String {
        match self {
            Self::Company => record.company_name.clone(),
            Self::JobTitle => record.job_title.clone(),
            Self::Status if record.status.is_empty() => "none".to_owned(),
            Self::Status => record.status.clone(),
            Self::AppliedDate => format_display_date(record.application_date),
            Self::Location => record
                .location
                .clone()
                .unwrap_or_else(|| "Not specified".to_owned()),
            Self::JobUrl => record.job_url.clone().unwrap_or_default(),
            Self::Notes => record
                .notes
                .as_deref()
                .map(|notes| notes.lines().next().unwrap_or_default().to_owned())
                .unwrap_or_else(|| "No notes".to_owned()),
        }
    }

    /// Copy just this field from `source` into `target`.
    pub fn copy_value(self, source: &JobApplication, target: &mut JobApplication) {
        match self {
            Self::Company => target.company_name = source.company_name.clone(),
            Self::JobTitle => target.job_title = source.job_title.clone(),
            Self::Status => target.status = source.status.clone(),
            Self::AppliedDate => target.application_date = source.application_date,
            Self::Location => target.location = source.location.clone(),
            Self::JobUrl => target.job_url = source.job_url.clone(),
            Self::Notes => target.notes = source.notes.clone(),
        }
    }

    /// Copy of `record` with this field set from editor text.
    pub fn apply(self, record: &JobApplication, raw: &str) -> Result<JobApplication, FieldError> {
        let mut updated = record.clone();
        match self.kind() {
            FieldKind::Text => {
                let value = raw.trim();
                if value.is_empty() && self.is_required() {
                    return Err(FieldError::Required(self.label()));
                }
                match self {
                    Self::Company => updated.company_name = value.to_owned(),
                    Self::JobTitle => updated.job_title = value.to_owned(),
                    _ => updated.location = non_empty(value),
                }
            }
            FieldKind::Date => {
                updated.application_date =
                    parse_iso_date(raw).ok_or_else(|| FieldError::InvalidDate(raw.to_owned()))?;
            }
            FieldKind::Url => updated.job_url = parse_job_url(raw)?,
            FieldKind::Status => updated.status = canonical_status(raw)?,
            FieldKind::LongText => {
                updated.notes = if raw.trim().is_empty() {
                    None
                } else {
                    Some(raw.trim_end().to_owned())
                };
            }
        }
        Ok(updated)
    }
}

/// Registry spelling of `raw`; blank clears the status.
pub fn canonical_status(raw: &str) -> Result<String, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(String::new());
    }
    status_by_name(value)
        .map(|status| status.name.to_owned())
        .ok_or_else(|| FieldError::UnknownStatus(value.to_owned()))
}

pub fn parse_job_url(raw: &str) -> Result<Option<String>, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(Some(value.to_owned())),
        _ => Err(FieldError::InvalidUrl(value.to_owned())),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
