use std::time::Duration;

use schema::{CaseId, CaseRecord, LinkStatus};
use tokio::sync::watch;

use crate::{cache::LocalCache, client::CaseApiClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// What the case list view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardState {
    pub loading: bool,
    pub cases: Vec<CaseRecord>,
    pub query: String,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            loading: true,
            cases: Vec::new(),
            query: String::new(),
        }
    }
}

impl DashboardState {
    /// Show cached records right away; an empty cache keeps the loading state.
    pub fn apply_cached(&mut self, cached: Vec<CaseRecord>) -> bool {
        if cached.is_empty() {
            return false;
        }
        self.cases = cached;
        self.loading = false;
        true
    }

    /// Replace the list with a server response. An empty response never
    /// clears what is already shown.
    pub fn apply_fetched(&mut self, fetched: Vec<CaseRecord>) -> bool {
        if fetched.is_empty() {
            return false;
        }
        self.cases = fetched;
        true
    }

    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Identifiers of records still waiting for a confirmation link.
    pub fn pending_link_ids(&self) -> Vec<CaseId> {
        self.cases
            .iter()
            .filter(|record| !record.has_confirm_url())
            .map(|record| record.id)
            .collect()
    }

    /// Apply newly discovered links in one batch. Returns how many records changed.
    pub fn apply_link_updates(&mut self, updates: &[LinkStatus]) -> usize {
        let mut changed = 0;
        for update in updates {
            let Some(url) = update.confirm_url.as_deref().filter(|url| !url.is_empty()) else {
                continue;
            };
            if let Some(record) = self.cases.iter_mut().find(|record| record.id == update.id)
                && record.confirm_url() != Some(url)
            {
                record.confirm_url = Some(url.to_string());
                changed += 1;
            }
        }
        changed
    }

    pub fn filtered(&self) -> Vec<&CaseRecord> {
        self.cases
            .iter()
            .filter(|record| matches_query(record, &self.query))
            .collect()
    }

    pub fn find(&self, id: CaseId) -> Option<&CaseRecord> {
        self.cases.iter().find(|record| record.id == id)
    }
}

/// Substring match on title, applicant name, postal code and identifier.
/// Title and applicant name compare case-insensitively.
pub fn matches_query(record: &CaseRecord, query: &str) -> bool {
    let query = query.to_lowercase();
    record.title.to_lowercase().contains(&query)
        || record.applicant_name.to_lowercase().contains(&query)
        || record.postal_code.contains(&query)
        || record.id.to_string().contains(&query)
}

/// Case list controller: owns the view state and keeps it in sync with the
/// API and the local cache.
#[derive(Debug)]
pub struct Dashboard {
    client: CaseApiClient,
    cache: LocalCache,
    state: DashboardState,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Dashboard {
    pub fn new(client: CaseApiClient, cache: LocalCache) -> Self {
        Self {
            client,
            cache,
            state: DashboardState::default(),
            shutdown: None,
        }
    }

    /// Results of requests that finish after `shutdown` flips to `true` are dropped.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DashboardState {
        &mut self.state
    }

    pub fn client(&self) -> &CaseApiClient {
        &self.client
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|shutdown| *shutdown.borrow())
    }

    /// Show the cached list, then fetch the authoritative one.
    pub async fn mount(&mut self) {
        let cached = self.cache.load();
        if self.state.apply_cached(cached) {
            tracing::debug!(count = self.state.cases.len(), "showing cached cases");
        }
        self.refresh().await;
    }

    /// Fetch the full list. Returns whether the shown list was replaced.
    pub async fn refresh(&mut self) -> bool {
        let fetched = self.client.list_cases().await;
        if self.shutdown_requested() {
            return false;
        }
        let replaced = match fetched {
            Ok(cases) => {
                let replaced = self.state.apply_fetched(cases);
                if replaced {
                    self.persist();
                }
                replaced
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch cases");
                false
            }
        };
        self.state.finish_loading();
        replaced
    }

    /// One link polling cycle: ask for every record without a confirmation
    /// link, one request at a time, then apply all findings at once.
    pub async fn poll_links(&mut self) -> usize {
        let pending = self.state.pending_link_ids();
        if pending.is_empty() {
            return 0;
        }
        let mut found = Vec::new();
        for id in pending {
            let status = self.client.link_status(id).await;
            if self.shutdown_requested() {
                tracing::debug!(case_id = id, "polling cancelled");
                return 0;
            }
            match status {
                Ok(status) if status.confirm_url.as_deref().is_some_and(|url| !url.is_empty()) => {
                    found.push(status)
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(case_id = id, error = %err, "link status poll failed"),
            }
        }
        let changed = self.state.apply_link_updates(&found);
        if changed > 0 {
            tracing::info!(changed, "confirmation links discovered");
            self.persist();
        }
        changed
    }

    /// Poll every `interval` until shutdown, calling `on_change` whenever a
    /// cycle changed the state. The first cycle runs one interval after the call.
    pub async fn watch<F>(&mut self, interval: Duration, mut on_change: F)
    where
        F: FnMut(&DashboardState),
    {
        let Some(mut shutdown) = self.shutdown.clone() else {
            tracing::warn!("watch started without a shutdown signal");
            return;
        };
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    if self.poll_links().await > 0 {
                        on_change(&self.state);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("link polling stopped");
    }

    fn persist(&self) {
        if let Err(err) = self.cache.store(&self.state.cases) {
            tracing::warn!(path = %self.cache.path().display(), error = %err, "failed to write case cache");
        }
    }
}
