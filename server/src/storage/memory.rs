use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BlobKeys, MatchKey, PersistedRecording, Region, TrackedSubject};
use tokio::sync::RwLock;

use super::{persisted_projection, BlobReader, RecordingStore, SubjectStore};
use crate::capture::CaptureSession;

#[derive(Default)]
struct Recordings {
    recordings: HashMap<MatchKey, PersistedRecording>,
    blobs: HashMap<String, Arc<Vec<u8>>>,
}

/// Recording store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryRecordingStore {
    inner: Arc<RwLock<Recordings>>,
}

impl MemoryRecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.recordings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn blob(&self, blob_key: String) -> Option<BlobReader> {
        let inner = self.inner.read().await;
        inner
            .blobs
            .get(&blob_key)
            .map(|data| Box::new(Cursor::new(data.as_ref().clone())) as BlobReader)
    }
}

#[async_trait]
impl RecordingStore for MemoryRecordingStore {
    async fn save(&self, session: &CaptureSession) -> Result<PersistedRecording> {
        let key = session.key();
        let recording = persisted_projection(session, Utc::now())?;

        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.recordings.get(&key) {
            return Ok(existing.clone());
        }
        for chunk in session.chunks() {
            inner.blobs.insert(BlobKeys::chunk(&key, chunk.id), Arc::new(chunk.data.clone()));
        }
        for key_frame in session.key_frames() {
            inner
                .blobs
                .insert(BlobKeys::key_frame(&key, key_frame.id), Arc::new(key_frame.data.clone()));
        }
        inner.recordings.insert(key, recording.clone());
        Ok(recording)
    }

    async fn get(&self, key: &MatchKey) -> Result<Option<PersistedRecording>> {
        Ok(self.inner.read().await.recordings.get(key).cloned())
    }

    async fn get_chunk(&self, key: &MatchKey, chunk_id: u32) -> Result<Option<BlobReader>> {
        Ok(self.blob(BlobKeys::chunk(key, chunk_id)).await)
    }

    async fn get_key_frame(&self, key: &MatchKey, key_frame_id: u32) -> Result<Option<BlobReader>> {
        Ok(self.blob(BlobKeys::key_frame(key, key_frame_id)).await)
    }
}

/// Subject store kept in process memory
#[derive(Clone, Default)]
pub struct MemorySubjectStore {
    subjects: Arc<RwLock<HashMap<(Region, u64), TrackedSubject>>>,
}

impl MemorySubjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, region: Region, subject_id: u64) -> Option<TrackedSubject> {
        self.subjects.read().await.get(&(region, subject_id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.subjects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SubjectStore for MemorySubjectStore {
    async fn checkable_subjects(
        &self,
        regions: &[Region],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackedSubject>> {
        let subjects = self.subjects.read().await;
        let mut due: Vec<TrackedSubject> = subjects
            .values()
            .filter(|s| s.next_eligible_check_time <= now && regions.contains(&s.region))
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            a.next_eligible_check_time
                .cmp(&b.next_eligible_check_time)
                .then(a.subject_id.cmp(&b.subject_id))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn save(&self, subject: &TrackedSubject) -> Result<()> {
        self.subjects
            .write()
            .await
            .insert((subject.region, subject.subject_id), subject.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, subject: &TrackedSubject) -> Result<bool> {
        let mut subjects = self.subjects.write().await;
        let key = (subject.region, subject.subject_id);
        if subjects.contains_key(&key) {
            return Ok(false);
        }
        subjects.insert(key, subject.clone());
        Ok(true)
    }
}
