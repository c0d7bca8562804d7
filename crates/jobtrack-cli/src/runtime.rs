// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use jobtrack_api::Client;
use jobtrack_app::{
    ApiError, ApiErrorKind, ApplicationId, ColorOverrides, CommitRequest, DataSource,
    FormSubmission, HistoryFetch, JobApplication, NewApplication, StatusHistoryEntry,
    StatusHistoryId,
};
use jobtrack_cache::{Cache, account_key};
use jobtrack_testkit::JobFaker;
use jobtrack_tui::{AppRuntime, InternalEvent, LoadedApplications};
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const DEMO_SEED: u64 = 2026;
const DEMO_ROWS: usize = 24;

/// Talks to the REST API and falls back to the local snapshot when the
/// server cannot be reached. Every network call from the event loop goes
/// through a worker thread.
pub struct ApiRuntime {
    backend: ApiBackend,
}

/// The state a worker thread needs. Cloning shares the cache and the
/// fetched server colors.
#[derive(Clone)]
struct ApiBackend {
    client: Client,
    cache: Option<Arc<Mutex<Cache>>>,
    account: String,
    max_age: Duration,
    config_colors: ColorOverrides,
    server_colors: Arc<Mutex<Option<ColorOverrides>>>,
}

impl ApiRuntime {
    pub fn new(
        client: Client,
        cache: Option<Cache>,
        max_age: Duration,
        config_colors: ColorOverrides,
    ) -> Self {
        let account = account_key(client.base_url(), client.token());
        Self {
            backend: ApiBackend {
                client,
                cache: cache.map(|cache| Arc::new(Mutex::new(cache))),
                account,
                max_age,
                config_colors,
                server_colors: Arc::new(Mutex::new(None)),
            },
        }
    }
}

impl ApiBackend {
    fn load(&self) -> Result<LoadedApplications> {
        match self.client.list_applications() {
            Ok(applications) => {
                self.store_snapshot(&applications);
                Ok(LoadedApplications {
                    applications,
                    source: DataSource::Live,
                })
            }
            Err(error) if error.kind() == ApiErrorKind::Network => {
                warn!(%error, "server unreachable; trying cached snapshot");
                self.cached_applications().ok_or_else(|| {
                    anyhow!("{error}; no recent cached data -- start the server and press r to retry")
                })
            }
            Err(error) => Err(anyhow!(error)),
        }
    }

    /// Server colors are fetched once, and only while the server answers.
    fn colors(&self, server_reachable: bool) -> ColorOverrides {
        let mut fetched = match self.server_colors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if fetched.is_none() && server_reachable {
            match self.client.list_status_colors() {
                Ok(colors) => *fetched = Some(colors),
                Err(error) => debug!(%error, "status colors unavailable; using built-in palette"),
            }
        }
        let mut colors = fetched.clone().unwrap_or_default();
        colors.merge(&self.config_colors);
        colors
    }

    fn store_snapshot(&self, applications: &[JobApplication]) {
        let Some(cache) = &self.cache else {
            return;
        };
        let Ok(mut cache) = cache.lock() else {
            warn!("snapshot cache lock poisoned; skipping write");
            return;
        };
        if let Err(error) =
            cache.store_snapshot(&self.account, applications, OffsetDateTime::now_utc())
        {
            warn!(error = %format!("{error:#}"), "could not write application snapshot");
        }
    }

    fn cached_applications(&self) -> Option<LoadedApplications> {
        let cache = self.cache.as_ref()?.lock().ok()?;
        let snapshot = match cache.load_snapshot(&self.account) {
            Ok(snapshot) => snapshot?,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "could not read application snapshot");
                return None;
            }
        };
        let now = OffsetDateTime::now_utc();
        if !snapshot.is_fresh(self.max_age, now) {
            info!(age = %snapshot.age(now), "cached snapshot too old to show");
            return None;
        }
        Some(LoadedApplications {
            applications: snapshot.applications,
            source: DataSource::Cached {
                fetched_at: snapshot.fetched_at,
            },
        })
    }

    fn save_form(&self, submission: &FormSubmission) -> Result<JobApplication, ApiError> {
        match submission {
            FormSubmission::Create(input) => self.client.create_application(input),
            FormSubmission::Update { record, .. } => self
                .client
                .update_application(record)
                .map(|()| record.clone()),
        }
    }
}

fn spawn_worker<F>(name: &str, job: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("jobtrack-{name}"))
        .spawn(job)
        .map_err(|error| anyhow!("spawn {name} worker: {error}"))?;
    Ok(())
}

impl AppRuntime for ApiRuntime {
    fn load_applications(&mut self) -> Result<LoadedApplications> {
        self.backend.load()
    }

    fn status_colors(&mut self) -> ColorOverrides {
        self.backend.colors(true)
    }

    /// The server addresses rows by id; the row position is only logged.
    fn update_application(
        &mut self,
        record: &JobApplication,
        index: usize,
    ) -> Result<(), ApiError> {
        debug!(id = %record.id, index, "updating application");
        self.backend.client.update_application(record)
    }

    fn create_application(&mut self, input: &NewApplication) -> Result<JobApplication, ApiError> {
        self.backend.client.create_application(input)
    }

    fn delete_application(&mut self, id: ApplicationId) -> Result<(), ApiError> {
        self.backend.client.delete_application(id)
    }

    fn fetch_status_history(
        &mut self,
        id: ApplicationId,
    ) -> Result<Vec<StatusHistoryEntry>, ApiError> {
        self.backend.client.fetch_status_history(id)
    }

    fn clear_cache(&mut self) -> Result<usize> {
        let Some(cache) = &self.backend.cache else {
            return Ok(0);
        };
        let cache = cache
            .lock()
            .map_err(|_| anyhow!("snapshot cache lock poisoned -- restart jobtrack"))?;
        cache.clear()
    }

    fn spawn_load(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        let backend = self.backend.clone();
        spawn_worker("load", move || {
            let loaded = backend.load();
            // One unreachable server should cost one timeout, not two.
            let live = matches!(
                &loaded,
                Ok(LoadedApplications {
                    source: DataSource::Live,
                    ..
                })
            );
            let colors = backend.colors(live);
            let result = loaded.map_err(|error| format!("{error:#}"));
            let _ = tx.send(InternalEvent::ApplicationsLoaded { result, colors });
        })
    }

    fn spawn_update(&mut self, request: CommitRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.backend.client.clone();
        spawn_worker("update", move || {
            debug!(id = %request.record.id, index = request.index, "updating application");
            let result = client.update_application(&request.record);
            let _ = tx.send(InternalEvent::CommitFinished { request, result });
        })
    }

    fn spawn_form_save(
        &mut self,
        submission: FormSubmission,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let backend = self.backend.clone();
        spawn_worker("form", move || {
            let result = backend.save_form(&submission);
            let _ = tx.send(InternalEvent::FormSaved { submission, result });
        })
    }

    fn spawn_delete(&mut self, id: ApplicationId, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.backend.client.clone();
        spawn_worker("delete", move || {
            let result = client.delete_application(id);
            let _ = tx.send(InternalEvent::DeleteFinished { id, result });
        })
    }

    fn spawn_history_fetch(&mut self, fetch: HistoryFetch, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.backend.client.clone();
        spawn_worker("history", move || {
            let result = client.fetch_status_history(fetch.application_id);
            let _ = tx.send(InternalEvent::HistoryLoaded {
                request_id: fetch.request_id,
                result,
            });
        })
    }
}

/// In-memory stand-in for the server, seeded with generated applications.
pub struct DemoRuntime {
    rows: Vec<JobApplication>,
    history: BTreeMap<ApplicationId, Vec<StatusHistoryEntry>>,
    colors: ColorOverrides,
    next_id: i64,
    next_history_id: i64,
}

impl DemoRuntime {
    pub fn new(now: OffsetDateTime, colors: ColorOverrides) -> Self {
        let mut faker = JobFaker::new(DEMO_SEED);
        let rows = faker.applications(DEMO_ROWS, now.date());
        let history = rows
            .iter()
            .map(|record| (record.id, faker.history_for(record)))
            .collect::<BTreeMap<_, _>>();
        let next_history_id = history
            .values()
            .flatten()
            .map(|entry| entry.id.get())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            next_id: DEMO_ROWS as i64 + 1,
            rows,
            history,
            colors,
            next_history_id,
        }
    }

    fn record_transition(&mut self, id: ApplicationId, from: Option<String>, to: &str) {
        let entry = StatusHistoryEntry {
            id: StatusHistoryId::new(self.next_history_id),
            from_status: from,
            to_status: to.to_owned(),
            changed_at: OffsetDateTime::now_utc(),
            changed_by: Some("demo".to_owned()),
            notes: None,
        };
        self.next_history_id += 1;
        self.history.entry(id).or_default().push(entry);
    }

    fn not_found(id: ApplicationId) -> ApiError {
        ApiError::NotFound(format!("application {id} not found or access denied"))
    }
}

impl AppRuntime for DemoRuntime {
    fn load_applications(&mut self) -> Result<LoadedApplications> {
        Ok(LoadedApplications {
            applications: self.rows.clone(),
            source: DataSource::Demo,
        })
    }

    fn status_colors(&mut self) -> ColorOverrides {
        self.colors.clone()
    }

    fn update_application(
        &mut self,
        record: &JobApplication,
        index: usize,
    ) -> Result<(), ApiError> {
        // The table's index matches our order until rows are added or removed.
        let index = match self.rows.get(index) {
            Some(row) if row.id == record.id => index,
            _ => self
                .rows
                .iter()
                .position(|row| row.id == record.id)
                .ok_or_else(|| Self::not_found(record.id))?,
        };
        let previous = std::mem::replace(&mut self.rows[index], record.clone());
        if previous.status != record.status {
            let from = Some(previous.status).filter(|status| !status.is_empty());
            self.record_transition(record.id, from, &record.status);
        }
        Ok(())
    }

    fn create_application(&mut self, input: &NewApplication) -> Result<JobApplication, ApiError> {
        let id = ApplicationId::new(self.next_id);
        self.next_id += 1;
        let created = input.clone().into_application(id);
        self.record_transition(id, None, &created.status);
        self.rows.push(created.clone());
        Ok(created)
    }

    fn delete_application(&mut self, id: ApplicationId) -> Result<(), ApiError> {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        if self.rows.len() == before {
            return Err(Self::not_found(id));
        }
        self.history.remove(&id);
        Ok(())
    }

    fn fetch_status_history(
        &mut self,
        id: ApplicationId,
    ) -> Result<Vec<StatusHistoryEntry>, ApiError> {
        if !self.rows.iter().any(|row| row.id == id) {
            return Err(Self::not_found(id));
        }
        Ok(self.history.get(&id).cloned().unwrap_or_default())
    }

    fn clear_cache(&mut self) -> Result<usize> {
        Ok(0)
    }
}
