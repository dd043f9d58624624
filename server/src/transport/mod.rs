pub mod http;

use async_trait::async_trait;
use common::{Chunk, KeyFrame, MatchDescriptor, MatchStatus, MatchSummary, Region, SubjectIdentity};

use crate::error::TransportError;

pub use http::{HttpIdentityDirectory, HttpSpectatorTransport};

pub type TransportResult<T> = Result<T, TransportError>;

/// Typed access to the live spectating REST endpoints
#[async_trait]
pub trait SpectatorTransport: Send + Sync {
    /// `Ok(None)` when the subject is not currently in a match
    async fn current_match(&self, region: Region, subject_id: u64) -> TransportResult<Option<MatchDescriptor>>;

    async fn stream_version(&self, region: Region) -> TransportResult<String>;

    async fn match_status(&self, region: Region, match_id: u64) -> TransportResult<MatchStatus>;

    async fn match_summary(&self, region: Region, match_id: u64) -> TransportResult<MatchSummary>;

    async fn chunk(&self, region: Region, match_id: u64, chunk_id: u32) -> TransportResult<Chunk>;

    async fn key_frame(&self, region: Region, match_id: u64, key_frame_id: u32) -> TransportResult<KeyFrame>;
}

/// Lookup of player identities and platform metadata
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// `Ok(None)` when no player with that name exists in the region
    async fn subject_by_name(&self, region: Region, name: &str) -> TransportResult<Option<SubjectIdentity>>;

    async fn challengers(&self, region: Region) -> TransportResult<Vec<SubjectIdentity>>;

    async fn platform_version(&self, region: Region) -> TransportResult<String>;
}
