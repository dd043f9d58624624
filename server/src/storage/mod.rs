pub mod directory;
pub mod filesystem;
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MatchKey, PersistedRecording, Region, TrackedSubject};
use tokio::io::AsyncRead;

use crate::capture::CaptureSession;

pub use filesystem::FileRecordingStore;
pub use memory::{MemoryRecordingStore, MemorySubjectStore};
pub use postgres::PgSubjectStore;

/// Byte stream over one stored chunk or keyframe
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Persists a finished capture. Blobs go first so a visible recording is always complete.
    /// A match that is already persisted is left untouched and its stored recording returned.
    async fn save(&self, session: &CaptureSession) -> Result<PersistedRecording>;

    async fn get(&self, key: &MatchKey) -> Result<Option<PersistedRecording>>;

    async fn get_chunk(&self, key: &MatchKey, chunk_id: u32) -> Result<Option<BlobReader>>;

    async fn get_key_frame(&self, key: &MatchKey, key_frame_id: u32) -> Result<Option<BlobReader>>;
}

#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Subjects due at `now` in the given regions, least recently checked first
    async fn checkable_subjects(
        &self,
        regions: &[Region],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackedSubject>>;

    /// Inserts or replaces the subject identified by (region, subject id)
    async fn save(&self, subject: &TrackedSubject) -> Result<()>;

    /// Inserts the subject unless it is already tracked. Returns whether it was inserted.
    async fn insert_if_absent(&self, subject: &TrackedSubject) -> Result<bool>;
}

/// Projection written by every store on a successful save
pub(crate) fn persisted_projection(session: &CaptureSession, recorded_at: DateTime<Utc>) -> Result<PersistedRecording> {
    let summary = session
        .summary
        .clone()
        .ok_or_else(|| anyhow::anyhow!("capture {} has no summary", session.key()))?;

    Ok(PersistedRecording {
        region: session.descriptor.region,
        match_id: session.descriptor.match_id,
        platform_version: session.platform_version.clone(),
        stream_version: session.stream_version.clone(),
        stream_encryption_key: session.descriptor.stream_encryption_key.clone(),
        summary,
        recorded_at,
    })
}
