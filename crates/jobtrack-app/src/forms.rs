// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use time::Date;

use crate::fields::{canonical_status, parse_job_url};
use crate::model::{format_iso_date, parse_iso_date};
use crate::status::{DEFAULT_STATUS_NAME, status_names};
use crate::{ApplicationField, ApplicationId, JobApplication, NewApplication};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: ApplicationId, index: usize },
}

/// Unvalidated text for every field; inputs write straight into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub application_date: String,
    pub location: String,
    pub job_url: String,
    pub notes: String,
}

impl ApplicationDraft {
    pub fn blank(today: Date) -> Self {
        Self {
            company_name: String::new(),
            job_title: String::new(),
            status: DEFAULT_STATUS_NAME.to_owned(),
            application_date: format_iso_date(today),
            location: String::new(),
            job_url: String::new(),
            notes: String::new(),
        }
    }

    pub fn from_record(record: &JobApplication) -> Self {
        Self {
            company_name: ApplicationField::Company.edit_value(record),
            job_title: ApplicationField::JobTitle.edit_value(record),
            status: ApplicationField::Status.edit_value(record),
            application_date: ApplicationField::AppliedDate.edit_value(record),
            location: ApplicationField::Location.edit_value(record),
            job_url: ApplicationField::JobUrl.edit_value(record),
            notes: ApplicationField::Notes.edit_value(record),
        }
    }

    pub fn field(&self, field: ApplicationField) -> &str {
        match field {
            ApplicationField::Company => &self.company_name,
            ApplicationField::JobTitle => &self.job_title,
            ApplicationField::Status => &self.status,
            ApplicationField::AppliedDate => &self.application_date,
            ApplicationField::Location => &self.location,
            ApplicationField::JobUrl => &self.job_url,
            ApplicationField::Notes => &self.notes,
        }
    }

    pub fn field_mut(&mut self, field: ApplicationField) -> &mut String {
        match field {
            ApplicationField::Company => &mut self.company_name,
            ApplicationField::JobTitle => &mut self.job_title,
            ApplicationField::Status => &mut self.status,
            ApplicationField::AppliedDate => &mut self.application_date,
            ApplicationField::Location => &mut self.location,
            ApplicationField::JobUrl => &mut self.job_url,
            ApplicationField::Notes => &mut self.notes,
        }
    }

    /// Submit stays disabled until both required fields have text.
    pub fn can_submit(&self) -> bool {
        !self.company_name.trim().is_empty() && !self.job_title.trim().is_empty()
    }

    pub fn validate(&self) -> Result<NewApplication> {
        if self.company_name.trim().is_empty() {
            bail!("company name is required -- enter a company and retry");
        }
        if self.job_title.trim().is_empty() {
            bail!("job title is required -- enter a position and retry");
        }
        let application_date = parse_iso_date(&self.application_date).ok_or_else(|| {
            anyhow!(
                "applied date {:?} is invalid -- use YYYY-MM-DD and retry",
                self.application_date
            )
        })?;
        let status = canonical_status(&self.status)?;
        let job_url = parse_job_url(&self.job_url)?;

        Ok(NewApplication {
            company_name: self.company_name.trim().to_owned(),
            job_title: self.job_title.trim().to_owned(),
            status,
            application_date,
            location: optional(&self.location),
            job_url,
            notes: optional(&self.notes),
        })
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSubmission {
    Create(NewApplication),
    Update { record: JobApplication, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    Submit(FormSubmission),
    Delete { id: ApplicationId, index: usize },
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub mode: FormMode,
    pub draft: ApplicationDraft,
    pub focus: ApplicationField,
    delete_armed: bool,
}

impl EditForm {
    pub fn create(today: Date) -> Self {
        Self {
            mode: FormMode::Create,
            draft: ApplicationDraft::blank(today),
            focus: ApplicationField::Company,
            delete_armed: false,
        }
    }

    pub fn edit(record: &JobApplication, index: usize) -> Self {
        Self {
            mode: FormMode::Edit {
                id: record.id,
                index,
            },
            draft: ApplicationDraft::from_record(record),
            focus: ApplicationField::Company,
            delete_armed: false,
        }
    }

    pub fn title(&self) -> String {
        match self.mode {
            FormMode::Create => "new application".to_owned(),
            FormMode::Edit { id, .. } => format!("edit application #{id}"),
        }
    }

    pub fn is_delete_armed(&self) -> bool {
        self.delete_armed
    }

    pub fn focus_next(&mut self) {
        self.move_focus(1);
    }

    pub fn focus_prev(&mut self) {
        self.move_focus(-1);
    }

    fn move_focus(&mut self, delta: isize) {
        let fields = ApplicationField::ALL;
        let current = fields
            .iter()
            .position(|field| *field == self.focus)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(fields.len() as isize) as usize;
        self.focus = fields[next];
        self.delete_armed = false;
    }

    pub fn push_char(&mut self, value: char) {
        if self.focus == ApplicationField::Status {
            return;
        }
        if value == '\n' && self.focus != ApplicationField::Notes {
            return;
        }
        self.draft.field_mut(self.focus).push(value);
        self.delete_armed = false;
    }

    pub fn pop_char(&mut self) {
        if self.focus != ApplicationField::Status {
            self.draft.field_mut(self.focus).pop();
        }
    }

    /// Step the status selector through "" and the registry names.
    pub fn cycle_status(&mut self, delta: isize) {
        let mut options = vec![""];
        options.extend(status_names());
        let current = options
            .iter()
            .position(|name| name.eq_ignore_ascii_case(self.draft.status.trim()))
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(options.len() as isize) as usize;
        self.draft.status = options[next].to_owned();
    }

    pub fn submit(&self) -> Result<FormAction> {
        let input = self.draft.validate()?;
        let submission = match self.mode {
            FormMode::Create => FormSubmission::Create(input),
            FormMode::Edit { id, index } => FormSubmission::Update {
                record: input.into_application(id),
                index,
            },
        };
        Ok(FormAction::Submit(submission))
    }

    /// First press arms the confirmation; the second returns the delete action.
    pub fn request_delete(&mut self) -> Result<Option<FormAction>> {
        let FormMode::Edit { id, index } = self.mode else {
            bail!("nothing to delete -- the application has not been saved yet");
        };
        if self.delete_armed {
            self.delete_armed = false;
            return Ok(Some(FormAction::Delete { id, index }));
        }
        self.delete_armed = true;
        Ok(None)
    }

    pub fn cancel_delete(&mut self) -> bool {
        std::mem::replace(&mut self.delete_armed, false)
    }

    pub fn close(&self) -> FormAction {
        FormAction::Close
    }
}
