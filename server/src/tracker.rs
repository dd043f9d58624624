use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::{Region, TrackedSubject};
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::{guarded_tick, Clock};
use crate::error::TransportError;
use crate::storage::SubjectStore;
use crate::supervisor::RecordingSupervisor;
use crate::transport::SpectatorTransport;

#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    pub tick_interval: Duration,
    pub subjects_per_tick: usize,
    pub check_interval: chrono::Duration,
    pub found_cooldown: chrono::Duration,
    pub region_outage: chrono::Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            subjects_per_tick: 10,
            check_interval: chrono::Duration::seconds(300),
            found_cooldown: chrono::Duration::seconds(1800),
            region_outage: chrono::Duration::seconds(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Found,
    NotInMatch,
    RateLimited,
    RegionUnavailable,
    Failed,
}

/// Tally of one discovery tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub found: usize,
    pub not_in_match: usize,
    pub rate_limited: usize,
    pub unavailable: usize,
    pub failed: usize,
}

impl TickReport {
    fn add(&mut self, outcome: CheckOutcome) {
        self.checked += 1;
        match outcome {
            CheckOutcome::Found => self.found += 1,
            CheckOutcome::NotInMatch => self.not_in_match += 1,
            CheckOutcome::RateLimited => self.rate_limited += 1,
            CheckOutcome::RegionUnavailable => self.unavailable += 1,
            CheckOutcome::Failed => self.failed += 1,
        }
    }
}

/// Discovery loop that hands matches of tracked subjects to the supervisor
pub struct SubjectTracker {
    store: Arc<dyn SubjectStore>,
    transport: Arc<dyn SpectatorTransport>,
    supervisor: Arc<RecordingSupervisor>,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
    /// Region -> instant it becomes checkable again
    unavailable: Mutex<HashMap<Region, DateTime<Utc>>>,
}

impl SubjectTracker {
    pub fn new(
        store: Arc<dyn SubjectStore>,
        transport: Arc<dyn SpectatorTransport>,
        supervisor: Arc<RecordingSupervisor>,
        clock: Arc<dyn Clock>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store,
            transport,
            supervisor,
            clock,
            settings,
            unavailable: Mutex::new(HashMap::new()),
        }
    }

    /// Regions not inside an outage window at `now`. Expired windows are dropped.
    pub async fn regions_available(&self, now: DateTime<Utc>) -> Vec<Region> {
        let mut unavailable = self.unavailable.lock().await;
        unavailable.retain(|region, until| {
            let expired = now >= *until;
            if expired {
                info!(region = %region, "Region outage window over");
            }
            !expired
        });

        Region::all()
            .iter()
            .copied()
            .filter(|r| !unavailable.contains_key(r))
            .collect()
    }

    async fn mark_unavailable(&self, region: Region, now: DateTime<Utc>) {
        let until = now + self.settings.region_outage;
        let mut unavailable = self.unavailable.lock().await;
        if unavailable.insert(region, until).is_none() {
            warn!(region = %region, until = %until, "Region unavailable, pausing checks");
        }
    }

    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!("Starting subject tracker");

        let mut interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!("Subject tracker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Some(report) = guarded_tick("Subject tracker", self.tick()).await {
                        if report.checked > 0 {
                            debug!(?report, "Subject tracker tick complete");
                        }
                    }
                }
            }
        }
    }

    /// Checks every due subject concurrently and returns once all checks are done
    pub async fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let regions = self.regions_available(now).await;
        if regions.is_empty() {
            debug!("No region available for subject checks");
            return Ok(TickReport::default());
        }

        let subjects = self
            .store
            .checkable_subjects(&regions, self.settings.subjects_per_tick, now)
            .await?;

        let outcomes = join_all(subjects.into_iter().map(|s| self.check_subject(s, now))).await;

        let mut report = TickReport::default();
        for outcome in outcomes {
            report.add(outcome);
        }
        Ok(report)
    }

    async fn check_subject(&self, mut subject: TrackedSubject, now: DateTime<Utc>) -> CheckOutcome {
        let region = subject.region;

        let outcome = match self.transport.current_match(region, subject.subject_id).await {
            Ok(Some(descriptor)) => {
                info!(
                    region = %region,
                    subject = %subject.display_name,
                    match_id = descriptor.match_id,
                    "Subject is in a match"
                );
                self.supervisor.record(descriptor).await;
                subject.next_eligible_check_time = now + self.settings.found_cooldown;
                CheckOutcome::Found
            }
            Ok(None) => {
                subject.next_eligible_check_time = now + self.settings.check_interval;
                CheckOutcome::NotInMatch
            }
            Err(TransportError::RateLimited) => {
                warn!(region = %region, subject_id = subject.subject_id, "Rate limited while checking subject");
                return CheckOutcome::RateLimited;
            }
            Err(TransportError::Unavailable) => {
                self.mark_unavailable(region, now).await;
                return CheckOutcome::RegionUnavailable;
            }
            Err(e) => {
                warn!(region = %region, subject_id = subject.subject_id, error = %e, "Subject check failed");
                return CheckOutcome::Failed;
            }
        };

        if let Err(e) = self.store.save(&subject).await {
            error!(region = %region, subject_id = subject.subject_id, error = %e, "Failed to save subject schedule");
        }
        outcome
    }
}
