// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Status-history viewer for a single application.

use tracing::debug;

use crate::{ApiError, ApplicationId, StatusHistoryEntry};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryState {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<StatusHistoryEntry>),
    Error(String),
}

/// A fetch the caller must run; hand the result back with the same
/// `request_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryFetch {
    pub request_id: u64,
    pub application_id: ApplicationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryViewer {
    state: HistoryState,
    target: Option<ApplicationId>,
    pending: Option<u64>,
    next_request: u64,
}

impl HistoryViewer {
    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn target(&self) -> Option<ApplicationId> {
        self.target
    }

    pub fn is_open(&self) -> bool {
        self.state != HistoryState::Idle
    }

    pub fn open(&mut self, id: Option<ApplicationId>) -> Option<HistoryFetch> {
        self.target = id;
        match id {
            Some(id) => Some(self.issue(id)),
            None => {
                self.pending = None;
                self.state =
                    HistoryState::Error("no application selected -- pick a row and retry".to_owned());
                None
            }
        }
    }

    /// Re-issue the last fetch. Only valid from the error state.
    pub fn retry(&mut self) -> Option<HistoryFetch> {
        if !matches!(self.state, HistoryState::Error(_)) {
            return None;
        }
        let id = self.target?;
        Some(self.issue(id))
    }

    /// Apply a fetch result. Returns false when the response is stale.
    pub fn finish(
        &mut self,
        request_id: u64,
        result: Result<Vec<StatusHistoryEntry>, ApiError>,
    ) -> bool {
        if self.pending != Some(request_id) {
            debug!(request_id, "ignoring stale history response");
            return false;
        }
        self.pending = None;
        self.state = match result {
            Ok(mut entries) => {
                entries.sort_by(|left, right| right.changed_at.cmp(&left.changed_at));
                HistoryState::Loaded(entries)
            }
            Err(error) => HistoryState::Error(error_message(&error)),
        };
        true
    }

    pub fn close(&mut self) {
        *self = Self {
            next_request: self.next_request,
            ..Self::default()
        };
    }

    fn issue(&mut self, application_id: ApplicationId) -> HistoryFetch {
        self.next_request += 1;
        self.pending = Some(self.next_request);
        self.state = HistoryState::Loading;
        HistoryFetch {
            request_id: self.next_request,
            application_id,
        }
    }
}

fn error_message(error: &ApiError) -> String {
    match error {
        ApiError::Auth(_) => "session expired -- sign in again and retry".to_owned(),
        ApiError::NotFound(_) => {
            "history not found or access denied for this application".to_owned()
        }
        ApiError::Network { .. } => {
            "cannot reach the server -- check your connection and retry".to_owned()
        }
        ApiError::Validation(detail) | ApiError::Unknown(detail) => {
            format!("failed to load history: {detail}")
        }
    }
}
