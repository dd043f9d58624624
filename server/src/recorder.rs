use std::sync::Arc;

use common::MatchDescriptor;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureSession, Completion};
use crate::clock::guarded_tick;
use crate::storage::RecordingStore;
use crate::transport::{IdentityDirectory, SpectatorTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Polling and downloading
    Active,
    /// Capture complete, only the save is retried
    Finalizing,
    Persisted,
    Discarded,
}

impl RecorderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecorderState::Persisted | RecorderState::Discarded)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecorderSettings {
    pub poll_interval: Duration,
    pub max_persist_attempts: u32,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_persist_attempts: 3,
        }
    }
}

/// Collaborators shared by every recorder
#[derive(Clone)]
pub struct RecorderDeps {
    pub transport: Arc<dyn SpectatorTransport>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub store: Arc<dyn RecordingStore>,
}

/// Downloads one match until it is complete, then persists or discards it
pub struct MatchRecorder {
    session: CaptureSession,
    state: RecorderState,
    persist_attempts: u32,
    deps: RecorderDeps,
    settings: RecorderSettings,
}

impl MatchRecorder {
    pub fn new(descriptor: MatchDescriptor, deps: RecorderDeps, settings: RecorderSettings) -> Self {
        Self {
            session: CaptureSession::new(descriptor),
            state: RecorderState::Active,
            persist_attempts: 0,
            deps,
            settings,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Polls on the configured interval until a terminal state or cancellation.
    /// A tick in progress always completes before cancellation is observed.
    pub async fn run(mut self, cancellation_token: CancellationToken) -> RecorderState {
        let key = self.session.key();
        info!(match_key = %key, "Starting recorder");

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!(match_key = %key, state = ?self.state, "Recorder cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let state = guarded_tick("Recorder", async { Ok::<_, anyhow::Error>(self.tick().await) }).await;
                    if state.is_some_and(|s| s.is_terminal()) {
                        break;
                    }
                }
            }
        }

        info!(match_key = %key, state = ?self.state, "Recorder finished");
        self.state
    }

    pub async fn tick(&mut self) -> RecorderState {
        match self.state {
            RecorderState::Active => self.poll().await,
            RecorderState::Finalizing => self.persist().await,
            RecorderState::Persisted | RecorderState::Discarded => {}
        }
        self.state
    }

    async fn poll(&mut self) {
        let region = self.session.descriptor.region;
        let match_id = self.session.descriptor.match_id;
        let key = self.session.key();

        self.fetch_versions().await;

        let status = match self.deps.transport.match_status(region, match_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(match_key = %key, error = %e, "Match status unavailable, discarding capture");
                self.state = RecorderState::Discarded;
                return;
            }
        };
        self.session.status = status;

        for chunk_id in self.session.missing_chunk_ids() {
            match self.deps.transport.chunk(region, match_id, chunk_id).await {
                Ok(chunk) => {
                    debug!(match_key = %key, chunk_id, "Stored chunk");
                    self.session.push_chunk(chunk);
                }
                Err(e) => {
                    warn!(match_key = %key, chunk_id, error = %e, "Chunk download failed, retrying next poll");
                    break;
                }
            }
        }

        for key_frame_id in self.session.missing_key_frame_ids() {
            match self.deps.transport.key_frame(region, match_id, key_frame_id).await {
                Ok(key_frame) => {
                    debug!(match_key = %key, key_frame_id, "Stored keyframe");
                    self.session.push_key_frame(key_frame);
                }
                Err(e) => {
                    warn!(match_key = %key, key_frame_id, error = %e, "Keyframe download failed, retrying next poll");
                    break;
                }
            }
        }

        if status.has_ended() && self.session.summary.is_none() {
            match self.deps.transport.match_summary(region, match_id).await {
                Ok(summary) => self.session.summary = Some(summary),
                Err(e) => debug!(match_key = %key, error = %e, "Summary not available yet"),
            }
        }

        match self.session.assess() {
            Completion::Pending => {}
            Completion::Complete => {
                self.state = RecorderState::Finalizing;
                self.persist().await;
            }
            Completion::Incomplete {
                stored_chunks,
                expected_chunks,
                stored_key_frames,
                expected_key_frames,
            } => {
                warn!(
                    match_key = %key,
                    stored_chunks,
                    expected_chunks,
                    stored_key_frames,
                    expected_key_frames,
                    "Capture has gaps, discarding"
                );
                self.state = RecorderState::Discarded;
            }
        }
    }

    async fn fetch_versions(&mut self) {
        let region = self.session.descriptor.region;

        if self.session.platform_version.is_none() {
            match self.deps.directory.platform_version(region).await {
                Ok(version) => self.session.platform_version = Some(version),
                Err(e) => debug!(region = %region, error = %e, "Platform version lookup failed"),
            }
        }
        if self.session.stream_version.is_none() {
            match self.deps.transport.stream_version(region).await {
                Ok(version) => self.session.stream_version = Some(version),
                Err(e) => debug!(region = %region, error = %e, "Stream version lookup failed"),
            }
        }
    }

    async fn persist(&mut self) {
        let key = self.session.key();
        self.persist_attempts += 1;

        match self.deps.store.save(&self.session).await {
            Ok(_) => {
                info!(
                    match_key = %key,
                    chunks = self.session.chunks().len(),
                    key_frames = self.session.key_frames().len(),
                    "Recording persisted"
                );
                self.state = RecorderState::Persisted;
            }
            Err(e) if self.persist_attempts >= self.settings.max_persist_attempts => {
                error!(match_key = %key, attempts = self.persist_attempts, error = %e, "Giving up on saving recording");
                self.state = RecorderState::Discarded;
            }
            Err(e) => {
                error!(match_key = %key, attempts = self.persist_attempts, error = %e, "Failed to save recording");
            }
        }
    }
}
