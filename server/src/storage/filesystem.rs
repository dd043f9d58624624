use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use common::{BlobKeys, MatchKey, PersistedRecording};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::fs;
use tracing::{debug, info, warn};

use super::directory::{self, PARTIAL_SUFFIX, RECORDING_FILE};
use super::{persisted_projection, BlobReader, RecordingStore};
use crate::capture::CaptureSession;

/// Recording store on the local filesystem.
///
/// Blobs are written raw under `{root}/{region}/{match_id}/chunks/{id}` and
/// `.../keyframes/{id}`. The gzip JSON recording is renamed into place last.
#[derive(Debug, Clone)]
pub struct FileRecordingStore {
    root: PathBuf,
}

impl FileRecordingStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = directory::ensure_data_directory(root.as_ref())?;
        let removed = directory::cleanup_partial_recordings(&root)?;
        if removed > 0 {
            warn!("Removed {} half-written recordings under {:?}", removed, root);
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn recording_path(&self, key: &MatchKey) -> PathBuf {
        self.root.join(BlobKeys::recording(key)).join(RECORDING_FILE)
    }

    async fn write_blob(&self, blob_key: &str, data: &[u8]) -> Result<()> {
        let path = self.root.join(blob_key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write blob {:?}", path))
    }

    async fn open_blob(&self, blob_key: &str) -> Result<Option<BlobReader>> {
        let path = self.root.join(blob_key);
        match fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to open blob {:?}", path)),
        }
    }
}

fn encode_recording(recording: &PersistedRecording) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, recording)?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

fn decode_recording(bytes: &[u8]) -> Result<PersistedRecording> {
    let mut json = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut json)
        .context("Failed to decompress recording")?;
    serde_json::from_str(&json).context("Failed to parse recording")
}

#[async_trait]
impl RecordingStore for FileRecordingStore {
    async fn save(&self, session: &CaptureSession) -> Result<PersistedRecording> {
        let key = session.key();
        let recording = persisted_projection(session, Utc::now())?;

        // A persisted capture is immutable
        if let Some(existing) = self.get(&key).await? {
            info!(match_key = %key, "Recording already persisted, keeping the stored capture");
            return Ok(existing);
        }

        for chunk in session.chunks() {
            self.write_blob(&BlobKeys::chunk(&key, chunk.id), &chunk.data).await?;
        }
        for key_frame in session.key_frames() {
            self.write_blob(&BlobKeys::key_frame(&key, key_frame.id), &key_frame.data).await?;
        }
        debug!(match_key = %key, "Wrote {} chunks and {} keyframes", session.chunks().len(), session.key_frames().len());

        let path = self.recording_path(&key);
        let partial = path.with_file_name(format!("{}{}", RECORDING_FILE, PARTIAL_SUFFIX));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&partial, encode_recording(&recording)?)
            .await
            .with_context(|| format!("Failed to write {:?}", partial))?;
        fs::rename(&partial, &path)
            .await
            .with_context(|| format!("Failed to move recording into place at {:?}", path))?;

        info!(match_key = %key, "Saved recording to {:?}", path);
        Ok(recording)
    }

    async fn get(&self, key: &MatchKey) -> Result<Option<PersistedRecording>> {
        let path = self.recording_path(key);
        match fs::read(&path).await {
            Ok(bytes) => decode_recording(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read recording {:?}", path)),
        }
    }

    async fn get_chunk(&self, key: &MatchKey, chunk_id: u32) -> Result<Option<BlobReader>> {
        self.open_blob(&BlobKeys::chunk(key, chunk_id)).await
    }

    async fn get_key_frame(&self, key: &MatchKey, key_frame_id: u32) -> Result<Option<BlobReader>> {
        self.open_blob(&BlobKeys::key_frame(key, key_frame_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{Chunk, KeyFrame, MatchDescriptor, MatchSummary, Region};
    use tokio::io::AsyncReadExt;

    fn finished_session() -> CaptureSession {
        let mut session = CaptureSession::new(MatchDescriptor {
            region: Region::lookup("KR").unwrap(),
            match_id: 77,
            match_length_at_discovery_secs: 60,
            stream_encryption_key: "key".into(),
        });
        let time = Utc.with_ymd_and_hms(2015, 3, 5, 21, 0, 0).unwrap();
        session.summary = Some(MatchSummary {
            end_chunk_id: 2,
            end_key_frame_id: 1,
            start_chunk_id: 2,
            end_startup_chunk_id: 1,
            chunk_interval_ms: 30000,
            key_frame_interval_ms: 60000,
            client_lag_ms: 30000,
            delay_ms: 180000,
            match_length_ms: 60000,
            create_time: time,
            start_time: time,
            end_time: time,
            interest_score: 5,
        });
        session.push_chunk(Chunk { id: 1, data: vec![1, 2, 3] });
        session.push_chunk(Chunk { id: 2, data: vec![4] });
        session.push_key_frame(KeyFrame { id: 1, data: vec![9; 16] });
        session
    }

    #[tokio::test]
    async fn test_save_then_read_back() {
        let root = directory::test_data_directory("fs_store");
        let store = FileRecordingStore::open(&root).unwrap();
        let session = finished_session();

        let saved = store.save(&session).await.unwrap();
        let loaded = store.get(&session.key()).await.unwrap().unwrap();
        assert_eq!(saved, loaded);
        assert_eq!(loaded.stream_encryption_key, "key");

        let mut chunk = Vec::new();
        store.get_chunk(&session.key(), 1).await.unwrap().unwrap().read_to_end(&mut chunk).await.unwrap();
        assert_eq!(chunk, vec![1, 2, 3]);
        assert!(store.get_chunk(&session.key(), 3).await.unwrap().is_none());
        assert!(root.join("KR/77/keyframes/1").exists());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_unknown_recording() {
        let root = directory::test_data_directory("fs_store_empty");
        let store = FileRecordingStore::open(&root).unwrap();
        let key = MatchKey { region: Region::lookup("NA").unwrap(), match_id: 1 };

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.get_key_frame(&key, 1).await.unwrap().is_none());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_save_without_summary_fails() {
        let root = directory::test_data_directory("fs_store_nosummary");
        let store = FileRecordingStore::open(&root).unwrap();
        let mut session = finished_session();
        session.summary = None;

        assert!(store.save(&session).await.is_err());
        assert!(store.get(&session.key()).await.unwrap().is_none());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_persisted_recording_is_never_overwritten() {
        let root = directory::test_data_directory("fs_store_immutable");
        let store = FileRecordingStore::open(&root).unwrap();
        let first = store.save(&finished_session()).await.unwrap();

        let mut again = CaptureSession::new(finished_session().descriptor);
        again.push_chunk(Chunk { id: 1, data: vec![2; 4] });
        again.push_chunk(Chunk { id: 2, data: vec![2; 4] });
        again.push_key_frame(KeyFrame { id: 1, data: vec![2; 4] });
        again.summary = finished_session().summary;

        let second = store.save(&again).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(store.get(&again.key()).await.unwrap().unwrap().recorded_at, first.recorded_at);

        let mut chunk = Vec::new();
        store.get_chunk(&again.key(), 1).await.unwrap().unwrap().read_to_end(&mut chunk).await.unwrap();
        assert_eq!(chunk, vec![1, 2, 3]);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
