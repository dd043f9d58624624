use chrono::{TimeZone, Utc};
use common::{Chunk, KeyFrame, MatchDescriptor, MatchSummary, Region};
use recorder::capture::CaptureSession;

pub fn region(code: &str) -> Region {
    Region::lookup(code).unwrap()
}

pub fn descriptor(code: &str, match_id: u64) -> MatchDescriptor {
    MatchDescriptor {
        region: region(code),
        match_id,
        match_length_at_discovery_secs: 120,
        stream_encryption_key: format!("key-{}", match_id),
    }
}

pub fn summary(end_chunk_id: u32, end_key_frame_id: u32) -> MatchSummary {
    MatchSummary {
        end_chunk_id,
        end_key_frame_id,
        start_chunk_id: 3,
        end_startup_chunk_id: 1,
        chunk_interval_ms: 30000,
        key_frame_interval_ms: 60000,
        client_lag_ms: 30000,
        delay_ms: 180000,
        match_length_ms: u64::from(end_chunk_id) * 30000,
        create_time: Utc.with_ymd_and_hms(2015, 3, 5, 21, 40, 8).unwrap(),
        start_time: Utc.with_ymd_and_hms(2015, 3, 5, 21, 42, 24).unwrap(),
        end_time: Utc.with_ymd_and_hms(2015, 3, 5, 22, 18, 2).unwrap(),
        interest_score: 1790,
    }
}

/// Deterministic payload distinguishable per id and kind
pub fn chunk_payload(id: u32) -> Vec<u8> {
    let mut data = b"chunk".to_vec();
    data.extend_from_slice(&id.to_be_bytes());
    data
}

pub fn key_frame_payload(id: u32) -> Vec<u8> {
    let mut data = b"keyframe".to_vec();
    data.extend_from_slice(&id.to_be_bytes());
    data
}

/// A finished capture holding every chunk and keyframe of `summary`
pub fn complete_session(descriptor: MatchDescriptor, summary: MatchSummary) -> CaptureSession {
    let mut session = CaptureSession::new(descriptor);
    for id in 1..=summary.end_chunk_id {
        session.push_chunk(Chunk { id, data: chunk_payload(id) });
    }
    for id in 1..=summary.end_key_frame_id {
        session.push_key_frame(KeyFrame { id, data: key_frame_payload(id) });
    }
    session.platform_version = Some("5.2.1".to_string());
    session.stream_version = Some("1.82.80".to_string());
    session.summary = Some(summary);
    session
}
