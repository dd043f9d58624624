use common::{Chunk, KeyFrame, MatchDescriptor, MatchKey, MatchStatus, MatchSummary};

/// In-memory state of one match being recorded. Owned by exactly one recorder.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub descriptor: MatchDescriptor,
    pub platform_version: Option<String>,
    pub stream_version: Option<String>,
    pub status: MatchStatus,
    pub summary: Option<MatchSummary>,
    chunks: Vec<Chunk>,
    key_frames: Vec<KeyFrame>,
}

/// Outcome of checking a capture against its summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Summary or one of the final ids not stored yet
    Pending,
    Complete,
    /// Final ids are stored but the ranges have holes
    Incomplete {
        stored_chunks: usize,
        expected_chunks: u32,
        stored_key_frames: usize,
        expected_key_frames: u32,
    },
}

impl CaptureSession {
    pub fn new(descriptor: MatchDescriptor) -> Self {
        Self {
            descriptor,
            platform_version: None,
            stream_version: None,
            status: MatchStatus::default(),
            summary: None,
            chunks: Vec::new(),
            key_frames: Vec::new(),
        }
    }

    pub fn key(&self) -> MatchKey {
        self.descriptor.key()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn key_frames(&self) -> &[KeyFrame] {
        &self.key_frames
    }

    pub fn max_chunk_id(&self) -> u32 {
        self.chunks.last().map(|c| c.id).unwrap_or(0)
    }

    pub fn max_key_frame_id(&self) -> u32 {
        self.key_frames.last().map(|k| k.id).unwrap_or(0)
    }

    /// Ids still to download, in the order they must be fetched
    pub fn missing_chunk_ids(&self) -> std::ops::RangeInclusive<u32> {
        self.max_chunk_id().saturating_add(1)..=self.status.current_chunk_id
    }

    pub fn missing_key_frame_ids(&self) -> std::ops::RangeInclusive<u32> {
        self.max_key_frame_id().saturating_add(1)..=self.status.current_key_frame_id
    }

    /// Appends a chunk. Ids must arrive in strictly ascending order.
    pub fn push_chunk(&mut self, chunk: Chunk) -> bool {
        if chunk.id <= self.max_chunk_id() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    pub fn push_key_frame(&mut self, key_frame: KeyFrame) -> bool {
        if key_frame.id <= self.max_key_frame_id() {
            return false;
        }
        self.key_frames.push(key_frame);
        true
    }

    pub fn assess(&self) -> Completion {
        let Some(summary) = &self.summary else {
            return Completion::Pending;
        };

        let has_last_chunk = self.chunks.iter().any(|c| c.id == summary.end_chunk_id);
        let has_last_key_frame = self.key_frames.iter().any(|k| k.id == summary.end_key_frame_id);
        if !has_last_chunk || !has_last_key_frame {
            return Completion::Pending;
        }

        if is_contiguous(self.chunks.iter().map(|c| c.id), summary.end_chunk_id)
            && is_contiguous(self.key_frames.iter().map(|k| k.id), summary.end_key_frame_id)
        {
            Completion::Complete
        } else {
            Completion::Incomplete {
                stored_chunks: self.chunks.len(),
                expected_chunks: summary.end_chunk_id,
                stored_key_frames: self.key_frames.len(),
                expected_key_frames: summary.end_key_frame_id,
            }
        }
    }
}

// Exactly 1..=end, in order
fn is_contiguous(ids: impl ExactSizeIterator<Item = u32>, end: u32) -> bool {
    ids.len() == end as usize && ids.zip(1..=end).all(|(id, expected)| id == expected)
}
