use std::collections::HashMap;
use std::sync::Arc;

use common::{MatchDescriptor, MatchKey};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::recorder::{MatchRecorder, RecorderDeps, RecorderSettings};

struct ActiveRecording {
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Registry of in-progress captures; at most one recorder per match
pub struct RecordingSupervisor {
    recordings: RwLock<HashMap<MatchKey, ActiveRecording>>,
    deps: RecorderDeps,
    settings: RecorderSettings,
}

impl RecordingSupervisor {
    pub fn new(deps: RecorderDeps, settings: RecorderSettings) -> Arc<Self> {
        Arc::new(Self {
            recordings: RwLock::new(HashMap::new()),
            deps,
            settings,
        })
    }

    /// Starts a recorder for the match unless one is already running.
    /// Returns whether a new recorder was admitted.
    pub async fn record(self: &Arc<Self>, descriptor: MatchDescriptor) -> bool {
        let key = descriptor.key();
        let mut recordings = self.recordings.write().await;
        if recordings.contains_key(&key) {
            debug!(match_key = %key, "Match already being recorded");
            return false;
        }

        let cancellation_token = CancellationToken::new();
        let recorder = MatchRecorder::new(descriptor, self.deps.clone(), self.settings);
        let supervisor = Arc::clone(self);
        let token = cancellation_token.clone();

        // The task cannot observe the registry before this write lock is released
        let handle = tokio::spawn(async move {
            recorder.run(token).await;
            supervisor.remove_recording(&key).await;
        });

        recordings.insert(key, ActiveRecording {
            cancellation_token,
            handle: Some(handle),
        });
        info!(match_key = %key, active = recordings.len(), "Admitted match for recording");
        true
    }

    /// Drops the match from the registry and stops its recorder. No-op when absent.
    pub async fn remove_recording(&self, key: &MatchKey) -> bool {
        match self.recordings.write().await.remove(key) {
            Some(recording) => {
                recording.cancellation_token.cancel();
                debug!(match_key = %key, "Removed recording");
                true
            }
            None => false,
        }
    }

    pub async fn is_recording(&self, key: &MatchKey) -> bool {
        self.recordings.read().await.contains_key(key)
    }

    pub async fn active_count(&self) -> usize {
        self.recordings.read().await.len()
    }

    /// Cancels every recorder and waits for in-flight ticks to finish
    pub async fn shutdown(&self, timeout: Duration) {
        let handles: Vec<(MatchKey, JoinHandle<()>)> = {
            let mut recordings = self.recordings.write().await;
            recordings
                .iter_mut()
                .filter_map(|(key, recording)| {
                    recording.cancellation_token.cancel();
                    recording.handle.take().map(|h| (*key, h))
                })
                .collect()
        };

        info!("Stopping {} recorders", handles.len());
        for (key, handle) in handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(match_key = %key, error = %e, "Recorder task failed"),
                Err(_) => warn!(match_key = %key, "Recorder did not stop within {:?}", timeout),
            }
        }
    }
}
