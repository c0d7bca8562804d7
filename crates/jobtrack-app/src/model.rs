// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::ids::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: ApplicationId,
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub application_date: Date,
    pub location: Option<String>,
    pub job_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub application_date: Date,
    pub location: Option<String>,
    pub job_url: Option<String>,
    pub notes: Option<String>,
}

impl NewApplication {
    pub fn into_application(self, id: ApplicationId) -> JobApplication {
        JobApplication {
            id,
            company_name: self.company_name,
            job_title: self.job_title,
            status: self.status,
            application_date: self.application_date,
            location: self.location,
            job_url: self.job_url,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: StatusHistoryId,
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_at: OffsetDateTime,
    pub changed_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    Date,
    Company,
    Title,
    Status,
}

impl SortField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Company => "company",
            Self::Title => "title",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub const DEFAULT: Self = Self {
        field: SortField::Date,
        direction: SortDirection::Desc,
    };

    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[default]
    All,
    Week,
    Month,
    ThreeMonths,
}

impl DateRange {
    pub const ALL: [Self; 4] = [Self::All, Self::Week, Self::Month, Self::ThreeMonths];

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all time",
            Self::Week => "past week",
            Self::Month => "past month",
            Self::ThreeMonths => "past 3 months",
        }
    }

    pub const fn days(self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::ThreeMonths => Some(90),
        }
    }

    pub fn contains(self, date: Date, today: Date) -> bool {
        let Some(days) = self.days() else {
            return true;
        };
        match today.checked_sub(Duration::days(days)) {
            Some(cutoff) => date >= cutoff,
            None => true,
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|range| *range == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

pub fn format_display_date(date: Date) -> String {
    date.format(format_description!(
        "[month repr:short] [day padding:none], [year]"
    ))
    .unwrap_or_else(|_| date.to_string())
}

pub fn format_iso_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

pub fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(format_description!(
            "[month repr:short] [day padding:none], [year] [hour]:[minute]"
        ))
        .unwrap_or_else(|_| value.to_string())
}
