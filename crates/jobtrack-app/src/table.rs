// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Editable application table: filtering, tri-state sorting, and the
//! single-cell edit/commit state machine.
//!
//! Every edit transition goes through [`TableEngine::set_edit`], so at most
//! one [`EditCellKey`] is open at a time. Commits are split in two halves:
//! [`TableEngine::begin_commit`] hands back the request to persist, and
//! [`TableEngine::finish_commit`] applies whatever the backend answered.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::Date;
use tracing::{debug, warn};

use crate::status::{status_by_name, status_names, status_rank};
use crate::{
    ApiError, ApplicationField, ApplicationId, DateRange, FieldError, FieldKind, JobApplication,
    SortDirection, SortField, SortKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditCellKey {
    pub id: ApplicationId,
    pub field: ApplicationField,
}

impl EditCellKey {
    pub const fn new(id: ApplicationId, field: ApplicationField) -> Self {
        Self { id, field }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEdit {
    pub key: EditCellKey,
    pub original: String,
    pub buffer: String,
    pub error: Option<String>,
}

/// Header-click sort state. `None` means the default key is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    explicit: Option<SortKey>,
}

impl SortState {
    pub fn active(&self) -> SortKey {
        self.explicit.unwrap_or(SortKey::DEFAULT)
    }

    pub fn is_default(&self) -> bool {
        self.explicit.is_none()
    }

    /// asc -> desc -> default -> asc for the clicked field.
    pub fn toggle(&mut self, field: SortField) -> SortKey {
        self.explicit = match self.explicit {
            Some(key) if key.field == field && key.direction == SortDirection::Asc => {
                Some(SortKey::new(field, SortDirection::Desc))
            }
            Some(key) if key.field == field => None,
            _ => Some(SortKey::new(field, SortDirection::Asc)),
        };
        self.active()
    }

    pub fn reset(&mut self) {
        self.explicit = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filters {
    pub search: String,
    pub status: Option<String>,
    pub company: Option<String>,
    pub date_range: DateRange,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.status.is_none()
            && self.company.is_none()
            && self.date_range == DateRange::All
    }

    /// Count of non-search criteria, shown next to the filter marker.
    pub fn active_count(&self) -> usize {
        usize::from(self.status.is_some())
            + usize::from(self.company.is_some())
            + usize::from(self.date_range != DateRange::All)
    }

    pub fn matches(&self, record: &JobApplication, today: Date) -> bool {
        let search = self.search.trim().to_lowercase();
        if !search.is_empty() {
            let hit = [
                Some(record.company_name.as_str()),
                Some(record.job_title.as_str()),
                record.location.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&search));
            if !hit {
                return false;
            }
        }

        if let Some(status) = &self.status
            && record.status.to_lowercase() != *status
        {
            return false;
        }

        if let Some(company) = &self.company
            && !record
                .company_name
                .to_lowercase()
                .contains(&company.to_lowercase())
        {
            return false;
        }

        self.date_range.contains(record.application_date, today)
    }
}

/// Criterion applied by clicking a cell outside edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    Status(String),
    Company(String),
    RecentDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTransition {
    Opened {
        key: EditCellKey,
        discarded: Option<EditCellKey>,
    },
    AlreadyOpen(EditCellKey),
    UnknownRecord(ApplicationId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub key: EditCellKey,
    pub record: JobApplication,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStart {
    NoActiveEdit,
    /// Another commit is in flight; this attempt was dropped.
    Busy,
    Unchanged(EditCellKey),
    Rejected {
        key: EditCellKey,
        error: FieldError,
    },
    Started(CommitRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub key: EditCellKey,
    pub error: ApiError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(EditCellKey),
    Failed(CommitFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    /// Registry spelling, or the raw value for unknown statuses. Empty for
    /// rows without a status.
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOption {
    pub value: String,
    pub label: String,
}

pub fn status_options() -> Vec<StatusOption> {
    let mut options = vec![StatusOption {
        value: String::new(),
        label: "(clear)".to_owned(),
    }];
    options.extend(status_names().into_iter().map(|name| StatusOption {
        value: name.to_owned(),
        label: name.to_owned(),
    }));
    options
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableEngine {
    records: Vec<JobApplication>,
    filters: Filters,
    sort: SortState,
    editing: Option<ActiveEdit>,
    saving: bool,
}

impl TableEngine {
    pub fn new(records: Vec<JobApplication>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn records(&self) -> &[JobApplication] {
        &self.records
    }

    pub fn record(&self, id: ApplicationId) -> Option<&JobApplication> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn position_of(&self, id: ApplicationId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    /// Swap in a freshly loaded collection. An open edit survives only if its
    /// record is still present.
    pub fn replace_records(&mut self, records: Vec<JobApplication>) {
        self.records = records;
        let orphaned = self
            .edit_key()
            .is_some_and(|key| self.position_of(key.id).is_none());
        if orphaned {
            self.set_edit(None);
        }
    }

    /// Insert or replace by id, as after a form submit.
    pub fn upsert(&mut self, record: JobApplication) -> usize {
        match self.position_of(record.id) {
            Some(index) => {
                self.records[index] = record;
                index
            }
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        }
    }

    pub fn remove(&mut self, id: ApplicationId) -> Option<JobApplication> {
        let index = self.position_of(id)?;
        if self.edit_key().is_some_and(|key| key.id == id) {
            self.set_edit(None);
        }
        Some(self.records.remove(index))
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn sort(&self) -> SortKey {
        self.sort.active()
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn toggle_sort(&mut self, field: SortField) -> SortKey {
        self.sort.toggle(field)
    }

    pub fn reset_sort(&mut self) {
        self.sort.reset();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filters.search = search.into();
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.filters.date_range = range;
    }

    pub fn clear_filters(&mut self) {
        self.filters = Filters::default();
    }

    /// Replace every criterion with the single one implied by `target`.
    pub fn apply_filter(&mut self, target: FilterTarget) {
        let mut filters = Filters::default();
        match target {
            FilterTarget::Status(status) => filters.status = Some(status.to_lowercase()),
            FilterTarget::Company(company) => filters.company = Some(company),
            FilterTarget::RecentDate => filters.date_range = DateRange::Week,
        }
        self.filters = filters;
    }

    /// Click on a cell in display mode. Returns the filter applied, if the
    /// column is filterable and the cell is not being edited.
    pub fn click_cell(&mut self, key: EditCellKey) -> Option<FilterTarget> {
        if self.is_editing(key) {
            return None;
        }
        let record = self.record(key.id)?;
        let target = match key.field {
            ApplicationField::Status => FilterTarget::Status(record.status.clone()),
            ApplicationField::Company => FilterTarget::Company(record.company_name.clone()),
            ApplicationField::AppliedDate => FilterTarget::RecentDate,
            _ => return None,
        };
        self.apply_filter(target.clone());
        Some(target)
    }

    /// Indices into [`Self::records`] after filtering and sorting.
    pub fn visible_rows(&self, today: Date) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| self.filters.matches(record, today))
            .map(|(index, _)| index)
            .collect();
        let key = self.sort.active();
        rows.sort_by(|left, right| compare_records(&self.records[*left], &self.records[*right], key));
        rows
    }

    pub fn editing(&self) -> Option<&ActiveEdit> {
        self.editing.as_ref()
    }

    pub fn edit_key(&self) -> Option<EditCellKey> {
        self.editing.as_ref().map(|edit| edit.key)
    }

    pub fn is_editing(&self, key: EditCellKey) -> bool {
        self.edit_key() == Some(key)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Claim the single in-flight write for a save that does not come from
    /// the cell editor, such as a form submit or delete. Returns false when
    /// another write is still pending.
    pub fn try_begin_save(&mut self) -> bool {
        if self.saving {
            debug!("external save refused while another is in flight");
            return false;
        }
        self.saving = true;
        true
    }

    pub fn end_save(&mut self) {
        self.saving = false;
    }

    /// Applications per status across the whole collection, ignoring
    /// filters. Registry statuses come first in menu order, then unknown
    /// statuses by name, then rows with no status.
    pub fn status_counts(&self) -> Vec<StatusCount> {
        let mut counts: BTreeMap<(usize, String), StatusCount> = BTreeMap::new();
        for record in &self.records {
            let raw = record.status.trim();
            let (rank, status) = match status_by_name(raw) {
                Some(definition) => (
                    status_rank(definition.name).unwrap_or(0),
                    definition.name.to_owned(),
                ),
                None if raw.is_empty() => (usize::MAX, String::new()),
                None => (usize::MAX - 1, raw.to_owned()),
            };
            counts
                .entry((rank, status.to_lowercase()))
                .or_insert_with(|| StatusCount { status, count: 0 })
                .count += 1;
        }
        counts.into_values().collect()
    }

    pub fn activate(&mut self, key: EditCellKey) -> EditTransition {
        if self.is_editing(key) {
            return EditTransition::AlreadyOpen(key);
        }
        let Some(record) = self.record(key.id) else {
            return EditTransition::UnknownRecord(key.id);
        };
        let original = key.field.edit_value(record);
        let discarded = self.set_edit(Some(ActiveEdit {
            key,
            buffer: original.clone(),
            original,
            error: None,
        }));
        if let Some(previous) = discarded {
            debug!(?previous, ?key, "discarded uncommitted edit");
        }
        EditTransition::Opened { key, discarded }
    }

    pub fn set_buffer(&mut self, value: impl Into<String>) {
        if let Some(edit) = &mut self.editing {
            edit.buffer = value.into();
            edit.error = None;
        }
    }

    pub fn push_char(&mut self, value: char) {
        if let Some(edit) = &mut self.editing
            && edit.key.field.kind() != FieldKind::Status
        {
            edit.buffer.push(value);
            edit.error = None;
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(edit) = &mut self.editing
            && edit.key.field.kind() != FieldKind::Status
        {
            edit.buffer.pop();
            edit.error = None;
        }
    }

    pub fn cancel(&mut self) -> Option<EditCellKey> {
        self.set_edit(None)
    }

    /// Focus left the cell; the uncommitted value is dropped.
    pub fn blur(&mut self) -> Option<EditCellKey> {
        self.set_edit(None)
    }

    /// Pick a value in the status selector and commit it right away.
    pub fn select_status(&mut self, value: &str) -> CommitStart {
        match &self.editing {
            Some(edit) if edit.key.field.kind() == FieldKind::Status => {}
            Some(_) | None => return CommitStart::NoActiveEdit,
        }
        self.set_buffer(value);
        self.begin_commit()
    }

    pub fn begin_commit(&mut self) -> CommitStart {
        let Some(edit) = self.editing.clone() else {
            return CommitStart::NoActiveEdit;
        };
        if self.saving {
            debug!(key = ?edit.key, "commit dropped while another is in flight");
            return CommitStart::Busy;
        }
        if edit.buffer == edit.original {
            self.set_edit(None);
            return CommitStart::Unchanged(edit.key);
        }

        let Some(index) = self.position_of(edit.key.id) else {
            self.set_edit(None);
            return CommitStart::NoActiveEdit;
        };
        let current = &self.records[index];
        let record = match edit.key.field.apply(current, &edit.buffer) {
            Ok(record) => record,
            Err(error) => {
                if let Some(open) = &mut self.editing {
                    open.error = Some(error.to_string());
                }
                return CommitStart::Rejected {
                    key: edit.key,
                    error,
                };
            }
        };
        if record == *current {
            self.set_edit(None);
            return CommitStart::Unchanged(edit.key);
        }

        self.saving = true;
        CommitStart::Started(CommitRequest {
            key: edit.key,
            record,
            index,
        })
    }

    /// Settle a commit started by [`Self::begin_commit`]. Failures keep the
    /// cell open for a retry and are handed to `on_error`.
    pub fn finish_commit<F>(
        &mut self,
        request: CommitRequest,
        result: Result<(), ApiError>,
        mut on_error: F,
    ) -> CommitOutcome
    where
        F: FnMut(&CommitFailure),
    {
        self.saving = false;
        match result {
            Ok(()) => {
                let index = match self.records.get(request.index) {
                    Some(record) if record.id == request.record.id => Some(request.index),
                    _ => self.position_of(request.record.id),
                };
                // Only the committed field: other columns may have moved on
                // since the request was built.
                if let Some(index) = index {
                    request
                        .key
                        .field
                        .copy_value(&request.record, &mut self.records[index]);
                }
                if self.is_editing(request.key) {
                    self.set_edit(None);
                }
                CommitOutcome::Committed(request.key)
            }
            Err(error) => {
                warn!(key = ?request.key, %error, "update failed; cell left open for retry");
                if let Some(edit) = &mut self.editing
                    && edit.key == request.key
                {
                    edit.error = Some(error.to_string());
                }
                let failure = CommitFailure {
                    key: request.key,
                    error,
                };
                on_error(&failure);
                CommitOutcome::Failed(failure)
            }
        }
    }

    fn set_edit(&mut self, next: Option<ActiveEdit>) -> Option<EditCellKey> {
        let previous = self.edit_key();
        self.editing = next;
        previous
    }
}

fn compare_records(left: &JobApplication, right: &JobApplication, key: SortKey) -> Ordering {
    let ordering = match key.field {
        SortField::Date => left.application_date.cmp(&right.application_date),
        SortField::Company => left
            .company_name
            .to_lowercase()
            .cmp(&right.company_name.to_lowercase()),
        SortField::Title => left
            .job_title
            .to_lowercase()
            .cmp(&right.job_title.to_lowercase()),
        SortField::Status => {
            let rank = |record: &JobApplication| status_rank(&record.status).unwrap_or(usize::MAX);
            rank(left)
                .cmp(&rank(right))
                .then_with(|| left.status.to_lowercase().cmp(&right.status.to_lowercase()))
        }
    };
    match key.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}
