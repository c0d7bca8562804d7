// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Search,
    EditCell,
    Form,
    History,
}

impl AppMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nav => "NAV",
            Self::Search => "SEARCH",
            Self::EditCell => "EDIT",
            Self::Form => "FORM",
            Self::History => "HISTORY",
        }
    }
}

/// Where the rows currently on screen came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Live,
    Cached { fetched_at: OffsetDateTime },
    Demo,
}

impl DataSource {
    pub fn label(self, now: OffsetDateTime) -> String {
        match self {
            Self::Live => "live".to_owned(),
            Self::Demo => "demo data".to_owned(),
            Self::Cached { fetched_at } => {
                format!("cached {} ago", format_age(now - fetched_at))
            }
        }
    }
}

fn format_age(age: time::Duration) -> String {
    let minutes = age.whole_minutes().max(0);
    match minutes {
        0 => "<1m".to_owned(),
        1..=59 => format!("{minutes}m"),
        60..=1439 => format!("{}h", minutes / 60),
        _ => format!("{}d", minutes / 1440),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub source: DataSource,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            source: DataSource::Live,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    StartSearch,
    BeginCellEdit,
    OpenForm,
    OpenHistory,
    ExitToNav,
    SetSource(DataSource),
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    SourceChanged(DataSource),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::StartSearch => self.enter(AppMode::Search),
            AppCommand::BeginCellEdit => self.enter(AppMode::EditCell),
            AppCommand::OpenForm => self.enter(AppMode::Form),
            AppCommand::OpenHistory => self.enter(AppMode::History),
            AppCommand::ExitToNav => {
                if self.mode == AppMode::Nav {
                    return Vec::new();
                }
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetSource(source) => {
                self.source = source;
                let label = match source {
                    DataSource::Live => "loaded from server",
                    DataSource::Cached { .. } => "server unreachable; showing cached data",
                    DataSource::Demo => "demo data loaded",
                };
                vec![AppEvent::SourceChanged(source), self.set_status(label)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn enter(&mut self, mode: AppMode) -> Vec<AppEvent> {
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppMode, AppState, DataSource};
    use time::Duration;
    use time::macros::datetime;

    #[test]
    fn mode_transitions() {
        let mut state = AppState::default();

        state.dispatch(AppCommand::BeginCellEdit);
        assert_eq!(state.mode, AppMode::EditCell);

        state.dispatch(AppCommand::OpenHistory);
        assert_eq!(state.mode, AppMode::History);

        let events = state.dispatch(AppCommand::ExitToNav);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(events, vec![AppEvent::ModeChanged(AppMode::Nav)]);
        assert!(state.dispatch(AppCommand::ExitToNav).is_empty());
    }

    #[test]
    fn cached_source_updates_status() {
        let mut state = AppState::default();
        let fetched_at = datetime!(2026-05-01 12:00 UTC);

        let events = state.dispatch(AppCommand::SetSource(DataSource::Cached { fetched_at }));
        assert_eq!(
            events,
            vec![
                AppEvent::SourceChanged(DataSource::Cached { fetched_at }),
                AppEvent::StatusUpdated("server unreachable; showing cached data".to_owned()),
            ],
        );

        state.dispatch(AppCommand::SetStatus("saved".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("saved"));

        let cleared = state.dispatch(AppCommand::ClearStatus);
        assert_eq!(cleared, vec![AppEvent::StatusCleared]);
        assert!(state.status_line.is_none());
    }

    #[test]
    fn source_labels_show_cache_age() {
        let fetched_at = datetime!(2026-05-01 12:00 UTC);
        let cached = DataSource::Cached { fetched_at };
        assert_eq!(cached.label(fetched_at + Duration::seconds(20)), "cached <1m ago");
        assert_eq!(cached.label(fetched_at + Duration::minutes(5)), "cached 5m ago");
        assert_eq!(cached.label(fetched_at + Duration::hours(3)), "cached 3h ago");
        assert_eq!(cached.label(fetched_at + Duration::days(2)), "cached 2d ago");
        assert_eq!(DataSource::Live.label(fetched_at), "live");
    }
}
