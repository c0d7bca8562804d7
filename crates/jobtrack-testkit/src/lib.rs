// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use jobtrack_app::{
    ApplicationId, JOB_STATUSES, JobApplication, StatusHistoryEntry, StatusHistoryId,
};
use std::path::PathBuf;
use time::{Date, Duration, OffsetDateTime, Time};

const COMPANIES: [&str; 16] = [
    "Acme", "Globex", "Initech", "Umbrella", "Hooli", "Stark Industries", "Wayne Enterprises",
    "Soylent", "Vandelay", "Pied Piper", "Cyberdyne", "Tyrell", "Wonka", "Gringotts", "Aperture",
    "Massive Dynamic",
];

const TITLES: [&str; 12] = [
    "Software Engineer",
    "Senior Software Engineer",
    "Staff Engineer",
    "Backend Engineer",
    "Platform Engineer",
    "Site Reliability Engineer",
    "Data Engineer",
    "Frontend Engineer",
    "Engineering Manager",
    "Product Engineer",
    "Security Engineer",
    "Developer Advocate",
];

const LOCATIONS: [&str; 8] = [
    "Remote",
    "Austin, TX",
    "Seattle, WA",
    "New York, NY",
    "Denver, CO",
    "Berlin",
    "Toronto",
    "London",
];

const NOTES: [&str; 6] = [
    "Referral from a former teammate",
    "Recruiter reached out on LinkedIn",
    "Take-home assignment due Friday\nAsk about on-call rotation",
    "Follow up next week",
    "Salary band posted in listing",
    "Met the hiring manager at a meetup",
];

// Legacy values the server still returns for older rows.
const LEGACY_STATUSES: [&str; 3] = ["OA", "Pending", "interview"];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn one_in(&mut self, n: usize) -> bool {
        self.int_n(n) == 0
    }
}

/// Seeded generator for plausible job applications and their status history.
#[derive(Debug, Clone)]
pub struct JobFaker {
    rng: DeterministicRng,
}

impl JobFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn application(&mut self, id: i64, today: Date) -> JobApplication {
        let company = self.pick(&COMPANIES);
        let days_ago = self.rng.int_n(120) as i64;
        let application_date = today.checked_sub(Duration::days(days_ago)).unwrap_or(today);
        let status = if self.rng.one_in(8) {
            self.pick(&LEGACY_STATUSES).to_owned()
        } else {
            JOB_STATUSES[self.rng.int_n(JOB_STATUSES.len())].name.to_owned()
        };

        JobApplication {
            id: ApplicationId::new(id),
            company_name: company.to_owned(),
            job_title: self.pick(&TITLES).to_owned(),
            status,
            application_date,
            location: (!self.rng.one_in(4)).then(|| self.pick(&LOCATIONS).to_owned()),
            job_url: (!self.rng.one_in(3)).then(|| {
                format!(
                    "https://jobs.{}.example/{}",
                    slug(company),
                    1000 + self.rng.int_n(9000)
                )
            }),
            notes: self.rng.one_in(2).then(|| self.pick(&NOTES).to_owned()),
        }
    }

    pub fn applications(&mut self, count: usize, today: Date) -> Vec<JobApplication> {
        (1..=count as i64)
            .map(|id| self.application(id, today))
            .collect()
    }

    /// Transitions from "Applied" up to the record's current status, oldest
    /// first, all on or after the application date.
    pub fn history_for(&mut self, record: &JobApplication) -> Vec<StatusHistoryEntry> {
        let start = record.application_date.with_time(Time::MIDNIGHT).assume_utc()
            + Duration::hours(9);
        let mut steps = vec!["Applied".to_owned()];
        let extra = self.rng.int_n(3);
        for _ in 0..extra {
            let next = JOB_STATUSES[1 + self.rng.int_n(JOB_STATUSES.len() - 1)].name;
            steps.push(next.to_owned());
        }
        if steps.last() != Some(&record.status) && !record.status.is_empty() {
            steps.push(record.status.clone());
        }

        let mut changed_at = start;
        let mut previous: Option<String> = None;
        let base_id = record.id.get() * 100;
        steps
            .into_iter()
            .enumerate()
            .map(|(index, to_status)| {
                if index > 0 {
                    changed_at += Duration::days(1 + self.rng.int_n(6) as i64);
                }
                StatusHistoryEntry {
                    id: StatusHistoryId::new(base_id + index as i64),
                    from_status: previous.replace(to_status.clone()),
                    to_status,
                    changed_at,
                    changed_by: Some("demo".to_owned()),
                    notes: None,
                }
            })
            .collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

fn slug(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn temp_cache_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("cache.db");
    Ok((dir, path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn fixture_now() -> OffsetDateTime {
    time::macros::datetime!(2026-02-19 12:34:56 UTC)
}

/// Small hand-written collection for tests that need exact values.
pub fn sample_applications() -> Vec<JobApplication> {
    use time::macros::date;
    vec![
        JobApplication {
            id: ApplicationId::new(1),
            company_name: "Acme".to_owned(),
            job_title: "Backend Engineer".to_owned(),
            status: "Applied".to_owned(),
            application_date: date!(2026-02-16),
            location: Some("Remote".to_owned()),
            job_url: Some("https://jobs.acme.example/101".to_owned()),
            notes: None,
        },
        JobApplication {
            id: ApplicationId::new(2),
            company_name: "Globex".to_owned(),
            job_title: "Platform Engineer".to_owned(),
            status: "Interview".to_owned(),
            application_date: date!(2026-02-02),
            location: Some("Austin, TX".to_owned()),
            job_url: None,
            notes: Some("Recruiter reached out on LinkedIn".to_owned()),
        },
        JobApplication {
            id: ApplicationId::new(3),
            company_name: "Initech".to_owned(),
            job_title: "Data Engineer".to_owned(),
            status: "OA".to_owned(),
            application_date: date!(2025-12-01),
            location: None,
            job_url: None,
            notes: None,
        },
    ]
}
