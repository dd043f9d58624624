use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Region;

/// Identity of a match across the whole system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub region: Region,
    pub match_id: u64,
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.region, self.match_id)
    }
}

/// A match a tracked subject was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDescriptor {
    pub region: Region,
    pub match_id: u64,
    pub match_length_at_discovery_secs: u64,
    pub stream_encryption_key: String,
}

impl MatchDescriptor {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            region: self.region,
            match_id: self.match_id,
        }
    }
}

/// Live stream position, re-fetched on every recorder poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatus {
    pub current_chunk_id: u32,
    pub current_key_frame_id: u32,
    /// 0 while the match is still running
    pub match_ended_chunk_id: u32,
}

impl MatchStatus {
    pub fn has_ended(&self) -> bool {
        self.match_ended_chunk_id > 0
    }
}

/// Final match metadata. Only available once the match has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub end_chunk_id: u32,
    pub end_key_frame_id: u32,
    pub start_chunk_id: u32,
    pub end_startup_chunk_id: u32,
    pub chunk_interval_ms: u64,
    pub key_frame_interval_ms: u64,
    pub client_lag_ms: u64,
    pub delay_ms: u64,
    pub match_length_ms: u64,
    pub create_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub interest_score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    pub id: u32,
    pub data: Vec<u8>,
}

/// A player the discovery loop keeps checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSubject {
    pub region: Region,
    pub subject_id: u64,
    pub display_name: String,
    pub next_eligible_check_time: DateTime<Utc>,
}

/// A player as reported by the identity directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectIdentity {
    pub region: Region,
    pub subject_id: u64,
    pub display_name: String,
}

/// Durable projection of a finished capture. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecording {
    pub region: Region,
    pub match_id: u64,
    pub platform_version: Option<String>,
    pub stream_version: Option<String>,
    pub stream_encryption_key: String,
    pub summary: MatchSummary,
    pub recorded_at: DateTime<Utc>,
}

impl PersistedRecording {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            region: self.region,
            match_id: self.match_id,
        }
    }

    pub fn contains_chunk(&self, id: u32) -> bool {
        (1..=self.summary.end_chunk_id).contains(&id)
    }

    pub fn contains_key_frame(&self, id: u32) -> bool {
        (1..=self.summary.end_key_frame_id).contains(&id)
    }
}

/// Blob store key layout shared by every recording store
pub struct BlobKeys;

impl BlobKeys {
    pub fn recording(key: &MatchKey) -> String {
        format!("{}/{}", key.region.code, key.match_id)
    }

    pub fn chunk(key: &MatchKey, chunk_id: u32) -> String {
        format!("{}/chunks/{}", Self::recording(key), chunk_id)
    }

    pub fn key_frame(key: &MatchKey, key_frame_id: u32) -> String {
        format!("{}/keyframes/{}", Self::recording(key), key_frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_key_layout() {
        let key = MatchKey {
            region: Region::lookup("EUW1").unwrap(),
            match_id: 2042,
        };
        assert_eq!(BlobKeys::recording(&key), "EUW/2042");
        assert_eq!(BlobKeys::chunk(&key, 7), "EUW/2042/chunks/7");
        assert_eq!(BlobKeys::key_frame(&key, 3), "EUW/2042/keyframes/3");
    }

    #[test]
    fn test_descriptor_identity_ignores_payload() {
        let region = Region::lookup("na").unwrap();
        let a = MatchDescriptor {
            region,
            match_id: 1,
            match_length_at_discovery_secs: 10,
            stream_encryption_key: "a".into(),
        };
        let b = MatchDescriptor {
            match_length_at_discovery_secs: 500,
            stream_encryption_key: "b".into(),
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
    }
}
