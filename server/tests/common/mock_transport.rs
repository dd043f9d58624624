use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use common::{Chunk, KeyFrame, MatchDescriptor, MatchStatus, MatchSummary, Region};
use recorder::error::TransportError;
use recorder::transport::{SpectatorTransport, TransportResult};

use super::fixtures::{chunk_payload, key_frame_payload};

/// Scripted answer of the current-match lookup
#[derive(Debug, Clone)]
pub enum MatchReply {
    InMatch(MatchDescriptor),
    NotInMatch,
    RateLimited,
    Unavailable,
    ServerError,
}

#[derive(Default)]
struct State {
    replies: HashMap<u64, MatchReply>,
    current_match_calls: HashMap<u64, usize>,
    status: MatchStatus,
    status_fails: bool,
    summary: Option<MatchSummary>,
    failing_chunks: HashSet<u32>,
    failing_key_frames: HashSet<u32>,
    chunk_requests: Vec<u32>,
    key_frame_requests: Vec<u32>,
    status_requests: usize,
}

/// In-process spectating service serving one live match
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<State>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, subject_id: u64, reply: MatchReply) {
        self.state.lock().unwrap().replies.insert(subject_id, reply);
    }

    pub fn current_match_calls(&self, subject_id: u64) -> usize {
        self.state
            .lock()
            .unwrap()
            .current_match_calls
            .get(&subject_id)
            .copied()
            .unwrap_or(0)
    }

    /// Live position of the match; `ended` reports the current chunk as the last one
    pub fn set_status(&self, current_chunk_id: u32, current_key_frame_id: u32, ended: bool) {
        self.state.lock().unwrap().status = MatchStatus {
            current_chunk_id,
            current_key_frame_id,
            match_ended_chunk_id: if ended { current_chunk_id } else { 0 },
        };
    }

    pub fn fail_status(&self) {
        self.state.lock().unwrap().status_fails = true;
    }

    pub fn set_summary(&self, summary: MatchSummary) {
        self.state.lock().unwrap().summary = Some(summary);
    }

    pub fn fail_chunk(&self, id: u32) {
        self.state.lock().unwrap().failing_chunks.insert(id);
    }

    pub fn heal_chunk(&self, id: u32) {
        self.state.lock().unwrap().failing_chunks.remove(&id);
    }

    pub fn fail_key_frame(&self, id: u32) {
        self.state.lock().unwrap().failing_key_frames.insert(id);
    }

    pub fn chunk_requests(&self) -> Vec<u32> {
        self.state.lock().unwrap().chunk_requests.clone()
    }

    pub fn key_frame_requests(&self) -> Vec<u32> {
        self.state.lock().unwrap().key_frame_requests.clone()
    }

    pub fn status_requests(&self) -> usize {
        self.state.lock().unwrap().status_requests
    }
}

#[async_trait]
impl SpectatorTransport for MockTransport {
    async fn current_match(&self, _region: Region, subject_id: u64) -> TransportResult<Option<MatchDescriptor>> {
        let mut state = self.state.lock().unwrap();
        *state.current_match_calls.entry(subject_id).or_insert(0) += 1;

        match state.replies.get(&subject_id).cloned().unwrap_or(MatchReply::NotInMatch) {
            MatchReply::InMatch(descriptor) => Ok(Some(descriptor)),
            MatchReply::NotInMatch => Ok(None),
            MatchReply::RateLimited => Err(TransportError::RateLimited),
            MatchReply::Unavailable => Err(TransportError::Unavailable),
            MatchReply::ServerError => Err(TransportError::Status(500)),
        }
    }

    async fn stream_version(&self, _region: Region) -> TransportResult<String> {
        Ok("1.82.80".to_string())
    }

    async fn match_status(&self, _region: Region, _match_id: u64) -> TransportResult<MatchStatus> {
        let mut state = self.state.lock().unwrap();
        state.status_requests += 1;
        if state.status_fails {
            return Err(TransportError::NotFound);
        }
        Ok(state.status)
    }

    async fn match_summary(&self, _region: Region, _match_id: u64) -> TransportResult<MatchSummary> {
        self.state.lock().unwrap().summary.clone().ok_or(TransportError::NotFound)
    }

    async fn chunk(&self, _region: Region, _match_id: u64, chunk_id: u32) -> TransportResult<Chunk> {
        let mut state = self.state.lock().unwrap();
        state.chunk_requests.push(chunk_id);
        if state.failing_chunks.contains(&chunk_id) {
            return Err(TransportError::Status(500));
        }
        Ok(Chunk { id: chunk_id, data: chunk_payload(chunk_id) })
    }

    async fn key_frame(&self, _region: Region, _match_id: u64, key_frame_id: u32) -> TransportResult<KeyFrame> {
        let mut state = self.state.lock().unwrap();
        state.key_frame_requests.push(key_frame_id);
        if state.failing_key_frames.contains(&key_frame_id) {
            return Err(TransportError::Request("connection reset".to_string()));
        }
        Ok(KeyFrame { id: key_frame_id, data: key_frame_payload(key_frame_id) })
    }
}
