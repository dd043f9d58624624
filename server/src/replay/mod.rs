//! Re-serves persisted captures through the live spectating protocol.

use std::sync::Arc;

use common::{MatchKey, PersistedRecording, Region};

use crate::error::ReplayError;
use crate::protocol::{GameMetaData, LastChunkInfo};
use crate::storage::{BlobReader, RecordingStore};

pub mod sessions;

pub use sessions::{loading_screen_ticks, StartupSessions, STARTUP_SESSION_IDLE};

pub const DEFAULT_PROTOCOL_VERSION: &str = "1.82.80";

#[derive(Clone)]
pub struct ReplayService {
    store: Arc<dyn RecordingStore>,
    sessions: StartupSessions,
    protocol_version: String,
}

impl ReplayService {
    pub fn new(store: Arc<dyn RecordingStore>, protocol_version: impl Into<String>) -> Self {
        Self {
            store,
            sessions: StartupSessions::new(),
            protocol_version: protocol_version.into(),
        }
    }

    pub fn sessions(&self) -> &StartupSessions {
        &self.sessions
    }

    pub fn version(&self) -> &str {
        &self.protocol_version
    }

    fn match_key(platform_id: &str, match_id: u64) -> Result<MatchKey, ReplayError> {
        let region = Region::lookup(platform_id).ok_or_else(|| ReplayError::UnknownRegion(platform_id.to_string()))?;
        Ok(MatchKey { region, match_id })
    }

    async fn recording(&self, key: &MatchKey) -> Result<PersistedRecording, ReplayError> {
        self.store.get(key).await?.ok_or(ReplayError::RecordingNotFound)
    }

    /// Metadata of the finished match. Starts the client's loading screen on first request.
    pub async fn metadata(&self, platform_id: &str, match_id: u64, client: &str) -> Result<GameMetaData, ReplayError> {
        let key = Self::match_key(platform_id, match_id)?;
        let recording = self.recording(&key).await?;

        self.sessions
            .register(key, client, loading_screen_ticks(&recording.summary))
            .await;

        Ok(GameMetaData::from_recording(&recording))
    }

    pub async fn last_chunk_info(
        &self,
        platform_id: &str,
        match_id: u64,
        client: &str,
    ) -> Result<LastChunkInfo, ReplayError> {
        let key = Self::match_key(platform_id, match_id)?;
        let recording = self.recording(&key).await?;

        if self.sessions.advance(key, client).await {
            Ok(LastChunkInfo::startup(&recording.summary))
        } else {
            Ok(LastChunkInfo::end_of_game(&recording.summary))
        }
    }

    pub async fn chunk(&self, platform_id: &str, match_id: u64, chunk_id: u32) -> Result<BlobReader, ReplayError> {
        let key = Self::match_key(platform_id, match_id)?;
        let recording = self.recording(&key).await?;
        if !recording.contains_chunk(chunk_id) {
            return Err(ReplayError::ChunkNotFound(chunk_id));
        }
        self.store
            .get_chunk(&key, chunk_id)
            .await?
            .ok_or(ReplayError::ChunkNotFound(chunk_id))
    }

    pub async fn key_frame(&self, platform_id: &str, match_id: u64, key_frame_id: u32) -> Result<BlobReader, ReplayError> {
        let key = Self::match_key(platform_id, match_id)?;
        let recording = self.recording(&key).await?;
        if !recording.contains_key_frame(key_frame_id) {
            return Err(ReplayError::KeyFrameNotFound(key_frame_id));
        }
        self.store
            .get_key_frame(&key, key_frame_id)
            .await?
            .ok_or(ReplayError::KeyFrameNotFound(key_frame_id))
    }
}
