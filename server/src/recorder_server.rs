use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{build_router, run_api_server, ApiState};
use crate::clock::Clock;
use crate::config::RecorderConfig;
use crate::recorder::RecorderDeps;
use crate::replay::{ReplayService, STARTUP_SESSION_IDLE};
use crate::storage::{RecordingStore, SubjectStore};
use crate::supervisor::RecordingSupervisor;
use crate::tracker::SubjectTracker;
use crate::transport::{IdentityDirectory, SpectatorTransport};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Collaborators the server is wired with
pub struct RecorderServerDeps {
    pub transport: Arc<dyn SpectatorTransport>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub recordings: Arc<dyn RecordingStore>,
    pub subjects: Arc<dyn SubjectStore>,
    pub clock: Arc<dyn Clock>,
}

/// Discovery loop, recorders and replay API of one process
pub struct RecorderServer {
    api_addr: String,
    supervisor: Arc<RecordingSupervisor>,
    replay: ReplayService,
    /// Cancellation token for graceful shutdown
    cancellation_token: CancellationToken,
    /// Handles for all spawned tasks
    handles: Vec<JoinHandle<()>>,
}

impl RecorderServer {
    pub async fn start(config: RecorderConfig, deps: RecorderServerDeps) -> Result<Self> {
        let RecorderServerDeps {
            transport,
            directory,
            recordings,
            subjects,
            clock,
        } = deps;

        let cancellation_token = CancellationToken::new();
        let mut handles = Vec::new();

        let supervisor = RecordingSupervisor::new(
            RecorderDeps {
                transport: transport.clone(),
                directory: directory.clone(),
                store: recordings.clone(),
            },
            config.recorder,
        );

        if config.record_matches {
            info!("Starting subject tracker");
            let tracker = SubjectTracker::new(
                subjects.clone(),
                transport,
                supervisor.clone(),
                clock.clone(),
                config.tracker,
            );
            let tracker_token = cancellation_token.clone();
            handles.push(tokio::spawn(async move {
                tracker.run(tracker_token).await;
            }));
        } else {
            info!("Match recording disabled, serving replays only");
        }

        let replay = ReplayService::new(recordings, config.protocol_version.clone());

        let sweeper = replay.sessions().clone();
        let sweeper_token = cancellation_token.clone();
        handles.push(tokio::spawn(async move {
            sweeper
                .run_sweeper(SESSION_SWEEP_INTERVAL, STARTUP_SESSION_IDLE, sweeper_token)
                .await;
        }));

        let app = build_router(
            ApiState {
                replay: replay.clone(),
                subjects,
                directory,
                clock,
            },
            config.compress_responses,
            cancellation_token.clone(),
        );
        let api_addr = config.api_addr.clone();
        let api_token = cancellation_token.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_api_server(&api_addr, app, api_token).await {
                error!("API server failed: {}", e);
            }
        }));

        Ok(Self {
            api_addr: config.api_addr,
            supervisor,
            replay,
            cancellation_token,
            handles,
        })
    }

    pub fn api_addr(&self) -> &str {
        &self.api_addr
    }

    pub fn supervisor(&self) -> &Arc<RecordingSupervisor> {
        &self.supervisor
    }

    pub fn replay(&self) -> &ReplayService {
        &self.replay
    }

    pub async fn shutdown(mut self) -> Result<()> {
        info!("Stopping all services");
        self.cancellation_token.cancel();

        while let Some(handle) = self.handles.pop() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Service panicked during shutdown: {:?}", e),
                Err(_) => error!("Service shutdown timed out"),
            }
        }

        // After the tracker, so no match is admitted once recorders are told to stop
        self.supervisor.shutdown(SHUTDOWN_TIMEOUT).await;

        info!("Recorder server shut down");
        Ok(())
    }
}
