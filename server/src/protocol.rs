//! Wire shapes of the live spectating protocol.
//!
//! The same structs are read from the upstream service while recording and
//! written back to spectator clients while replaying, so field names here are
//! part of the client compatibility surface.

use chrono::{DateTime, NaiveDateTime, Utc};
use common::{MatchDescriptor, MatchStatus, MatchSummary, PersistedRecording, Region};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub const OBSERVER_PATH: &str = "/observer-mode/rest/consumer";

const TIME_FORMAT_OUT: &str = "%b %-d, %Y %-I:%M:%S %p";
const TIME_FORMAT_IN: &str = "%b %d, %Y %I:%M:%S %p";

/// Client poll delay advertised while a replay pretends to be loading
pub const STARTUP_POLL_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameKey {
    pub game_id: u64,
    pub platform_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameMetaData {
    pub game_key: GameKey,
    pub game_server_address: String,
    pub port: u16,
    pub encryption_key: String,
    pub chunk_time_interval: u64,
    pub start_time: String,
    pub end_time: String,
    pub game_ended: bool,
    pub last_chunk_id: u32,
    pub last_key_frame_id: u32,
    pub end_startup_chunk_id: u32,
    pub delay_time: u64,
    pub pending_available_chunk_info: Vec<serde_json::Value>,
    pub pending_available_key_frame_info: Vec<serde_json::Value>,
    pub key_frame_time_interval: u64,
    pub decoded_encryption_key: String,
    pub start_game_chunk_id: u32,
    pub game_length: u64,
    pub client_added_lag: u64,
    pub client_back_fetching_enabled: bool,
    pub client_back_fetching_freq: u64,
    pub interest_score: i64,
    pub featured_game: bool,
    pub create_time: String,
    pub end_game_chunk_id: i64,
    pub end_game_key_frame_id: i64,
}

impl GameMetaData {
    pub fn to_summary(&self) -> Result<MatchSummary, TransportError> {
        let end_chunk_id = positive(self.end_game_chunk_id)
            .ok_or_else(|| TransportError::Decode("metadata has no end chunk".into()))?;
        let end_key_frame_id = positive(self.end_game_key_frame_id)
            .ok_or_else(|| TransportError::Decode("metadata has no end keyframe".into()))?;

        Ok(MatchSummary {
            end_chunk_id,
            end_key_frame_id,
            start_chunk_id: self.start_game_chunk_id,
            end_startup_chunk_id: self.end_startup_chunk_id,
            chunk_interval_ms: self.chunk_time_interval,
            key_frame_interval_ms: self.key_frame_time_interval,
            client_lag_ms: self.client_added_lag,
            delay_ms: self.delay_time,
            match_length_ms: self.game_length,
            create_time: required_time("createTime", &self.create_time)?,
            start_time: required_time("startTime", &self.start_time)?,
            end_time: required_time("endTime", &self.end_time)?,
            interest_score: self.interest_score,
        })
    }

    /// Metadata of a finished match as the live service reports it after the end
    pub fn from_recording(recording: &PersistedRecording) -> Self {
        let summary = &recording.summary;
        Self {
            game_key: GameKey {
                game_id: recording.match_id,
                platform_id: recording.region.spectator_platform_id.to_string(),
            },
            game_server_address: String::new(),
            port: 0,
            encryption_key: recording.stream_encryption_key.clone(),
            chunk_time_interval: summary.chunk_interval_ms,
            start_time: format_time(&summary.start_time),
            end_time: format_time(&summary.end_time),
            game_ended: true,
            last_chunk_id: summary.end_chunk_id,
            last_key_frame_id: summary.end_key_frame_id,
            end_startup_chunk_id: summary.end_startup_chunk_id,
            delay_time: summary.delay_ms,
            pending_available_chunk_info: Vec::new(),
            pending_available_key_frame_info: Vec::new(),
            key_frame_time_interval: summary.key_frame_interval_ms,
            decoded_encryption_key: String::new(),
            start_game_chunk_id: summary.start_chunk_id,
            game_length: summary.match_length_ms,
            client_added_lag: summary.client_lag_ms,
            client_back_fetching_enabled: false,
            client_back_fetching_freq: 1000,
            interest_score: summary.interest_score,
            featured_game: false,
            create_time: format_time(&summary.create_time),
            end_game_chunk_id: i64::from(summary.end_chunk_id),
            end_game_key_frame_id: i64::from(summary.end_key_frame_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LastChunkInfo {
    pub chunk_id: u32,
    pub available_since: u64,
    pub next_available_chunk: u64,
    pub key_frame_id: u32,
    pub next_chunk_id: u32,
    pub end_startup_chunk_id: u32,
    pub start_game_chunk_id: u32,
    pub end_game_chunk_id: i64,
    pub duration: u64,
}

impl LastChunkInfo {
    pub fn to_status(&self) -> MatchStatus {
        MatchStatus {
            current_chunk_id: self.chunk_id,
            current_key_frame_id: self.key_frame_id,
            match_ended_chunk_id: positive(self.end_game_chunk_id).unwrap_or(0),
        }
    }

    /// Snapshot shown while the client is still on its loading screen
    pub fn startup(summary: &MatchSummary) -> Self {
        Self {
            chunk_id: summary.start_chunk_id,
            available_since: 0,
            next_available_chunk: STARTUP_POLL_DELAY_MS,
            key_frame_id: 1,
            next_chunk_id: summary.start_chunk_id,
            end_startup_chunk_id: summary.end_startup_chunk_id,
            start_game_chunk_id: summary.start_chunk_id,
            end_game_chunk_id: 0,
            duration: summary.chunk_interval_ms,
        }
    }

    /// Snapshot of the match after its last chunk
    pub fn end_of_game(summary: &MatchSummary) -> Self {
        Self {
            chunk_id: summary.end_chunk_id,
            available_since: 0,
            next_available_chunk: 0,
            key_frame_id: summary.end_key_frame_id,
            next_chunk_id: summary.end_chunk_id,
            end_startup_chunk_id: summary.end_startup_chunk_id,
            start_game_chunk_id: summary.start_chunk_id,
            end_game_chunk_id: i64::from(summary.end_chunk_id),
            duration: summary.chunk_interval_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Observers {
    pub encryption_key: String,
}

/// Answer of the current-game lookup for one subject
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpectatorGameInfo {
    pub game_id: u64,
    /// Seconds, negative while the match is still in champion select
    pub game_length: i64,
    pub observers: Observers,
}

impl SpectatorGameInfo {
    pub fn into_descriptor(self, region: Region) -> Result<MatchDescriptor, TransportError> {
        if self.game_id == 0 {
            return Err(TransportError::Decode("current game has no game id".into()));
        }
        Ok(MatchDescriptor {
            region,
            match_id: self.game_id,
            match_length_at_discovery_secs: self.game_length.max(0) as u64,
            stream_encryption_key: self.observers.encryption_key,
        })
    }
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT_OUT).to_string()
}

/// Accepts both the protocol's `Mar 5, 2015 9:42:24 PM` spelling and RFC 3339
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT_IN)
        .ok()
        .map(|naive| naive.and_utc())
}

fn required_time(field: &str, raw: &str) -> Result<DateTime<Utc>, TransportError> {
    parse_time(raw).ok_or_else(|| TransportError::Decode(format!("invalid {}: `{}`", field, raw)))
}

fn positive(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const METADATA: &str = r#"{
        "gameKey": {"gameId": 1904271264, "platformId": "EUW1"},
        "gameServerAddress": "",
        "port": 0,
        "encryptionKey": "",
        "chunkTimeInterval": 30000,
        "startTime": "Mar 5, 2015 9:42:24 PM",
        "endTime": "Mar 5, 2015 10:18:02 PM",
        "gameEnded": true,
        "lastChunkId": 74,
        "lastKeyFrameId": 36,
        "endStartupChunkId": 2,
        "delayTime": 150000,
        "pendingAvailableChunkInfo": [],
        "pendingAvailableKeyFrameInfo": [],
        "keyFrameTimeInterval": 60000,
        "decodedEncryptionKey": "",
        "startGameChunkId": 4,
        "gameLength": 2137000,
        "clientAddedLag": 30000,
        "clientBackFetchingEnabled": false,
        "clientBackFetchingFreq": 1000,
        "interestScore": 1790,
        "featuredGame": false,
        "createTime": "Mar 5, 2015 9:40:08 PM",
        "endGameChunkId": 74,
        "endGameKeyFrameId": 36
    }"#;

    #[test]
    fn test_metadata_to_summary() {
        let metadata: GameMetaData = serde_json::from_str(METADATA).unwrap();
        let summary = metadata.to_summary().unwrap();

        assert_eq!(summary.end_chunk_id, 74);
        assert_eq!(summary.end_key_frame_id, 36);
        assert_eq!(summary.start_chunk_id, 4);
        assert_eq!(summary.end_startup_chunk_id, 2);
        assert_eq!(summary.chunk_interval_ms, 30000);
        assert_eq!(summary.match_length_ms, 2137000);
        assert_eq!(summary.interest_score, 1790);
        assert_eq!(summary.start_time, Utc.with_ymd_and_hms(2015, 3, 5, 21, 42, 24).unwrap());
    }

    #[test]
    fn test_running_match_has_no_summary() {
        let metadata = GameMetaData {
            end_game_chunk_id: -1,
            ..serde_json::from_str(METADATA).unwrap()
        };
        assert!(matches!(metadata.to_summary(), Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_last_chunk_info_to_status() {
        let running: LastChunkInfo = serde_json::from_str(
            r#"{"chunkId":12,"availableSince":4000,"nextAvailableChunk":26000,"keyFrameId":5,"nextChunkId":11,"endStartupChunkId":2,"startGameChunkId":4,"endGameChunkId":0,"duration":30000}"#,
        ).unwrap();
        assert_eq!(running.to_status(), MatchStatus {
            current_chunk_id: 12,
            current_key_frame_id: 5,
            match_ended_chunk_id: 0,
        });
        assert!(!running.to_status().has_ended());

        let ended: LastChunkInfo = serde_json::from_str(r#"{"chunkId":74,"keyFrameId":36,"endGameChunkId":74}"#).unwrap();
        assert!(ended.to_status().has_ended());
    }

    #[test]
    fn test_time_round_trip() {
        let time = Utc.with_ymd_and_hms(2015, 3, 5, 9, 2, 4).unwrap();
        let formatted = format_time(&time);
        assert_eq!(formatted, "Mar 5, 2015 9:02:04 AM");
        assert_eq!(parse_time(&formatted), Some(time));
        assert_eq!(parse_time("2015-03-05T09:02:04Z"), Some(time));
        assert_eq!(parse_time("yesterday"), None);
    }

    #[test]
    fn test_current_game_descriptor() {
        let info: SpectatorGameInfo = serde_json::from_str(
            r#"{"gameId": 99, "gameLength": -20, "observers": {"encryptionKey": "s3cr3t"}}"#,
        ).unwrap();
        let region = Region::lookup("EUW").unwrap();
        let descriptor = info.into_descriptor(region).unwrap();

        assert_eq!(descriptor.match_id, 99);
        assert_eq!(descriptor.match_length_at_discovery_secs, 0);
        assert_eq!(descriptor.stream_encryption_key, "s3cr3t");
    }
}
