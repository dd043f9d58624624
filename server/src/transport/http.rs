use std::time::Duration;

use async_trait::async_trait;
use common::{Chunk, KeyFrame, MatchDescriptor, MatchStatus, MatchSummary, Region, SubjectIdentity};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{IdentityDirectory, SpectatorTransport, TransportResult};
use crate::error::TransportError;
use crate::protocol::{GameMetaData, LastChunkInfo, SpectatorGameInfo, OBSERVER_PATH};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Base URL template and key of the platform REST API
#[derive(Debug, Clone)]
pub struct PlatformEndpoint {
    /// `{region}` is replaced by the region's transport platform id
    base_template: String,
    api_key: Option<String>,
}

impl PlatformEndpoint {
    pub fn new(base_template: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_template: base_template.into(),
            api_key,
        }
    }

    fn url(&self, region: Region, path: &str) -> TransportResult<Url> {
        let mut base = self.base_template.replace("{region}", region.transport_platform_id);
        if !base.ends_with('/') {
            base.push('/');
        }

        let mut url = Url::parse(&base)
            .and_then(|b| b.join(path.trim_start_matches('/')))
            .map_err(|e| TransportError::Request(format!("invalid platform url: {}", e)))?;

        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("api_key", key);
        }
        Ok(url)
    }
}

fn build_client() -> TransportResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

async fn get_response(client: &reqwest::Client, url: &str) -> TransportResult<reqwest::Response> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        debug!(%status, "GET {} failed", strip_query(url));
        return Err(TransportError::from_status(status.as_u16()));
    }
    Ok(response)
}

async fn get_text(client: &reqwest::Client, url: &str) -> TransportResult<String> {
    Ok(get_response(client, url).await?.text().await?)
}

async fn get_bytes(client: &reqwest::Client, url: &str) -> TransportResult<Vec<u8>> {
    Ok(get_response(client, url).await?.bytes().await?.to_vec())
}

// Keeps the api key out of the logs
fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// reqwest-backed client for the live spectating endpoints
#[derive(Clone)]
pub struct HttpSpectatorTransport {
    client: reqwest::Client,
    platform: PlatformEndpoint,
}

impl HttpSpectatorTransport {
    pub fn new(platform: PlatformEndpoint) -> TransportResult<Self> {
        Ok(Self {
            client: build_client()?,
            platform,
        })
    }

    fn spectator_url(region: Region, endpoint: &str, match_id: u64, id: u32) -> String {
        format!(
            "{}{}/{}/{}/{}/{}/token",
            region.spectator_base_url(),
            OBSERVER_PATH,
            endpoint,
            region.spectator_platform_id,
            match_id,
            id
        )
    }
}

#[async_trait]
impl SpectatorTransport for HttpSpectatorTransport {
    async fn current_match(&self, region: Region, subject_id: u64) -> TransportResult<Option<MatchDescriptor>> {
        let path = format!(
            "observer-mode/rest/consumer/getSpectatorGameInfo/{}/{}",
            region.spectator_platform_id, subject_id
        );
        let url = self.platform.url(region, &path)?;

        match get_text(&self.client, url.as_str()).await {
            Ok(body) => parse_current_game(&body, region).map(Some),
            Err(TransportError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn stream_version(&self, region: Region) -> TransportResult<String> {
        let url = format!("{}{}/version", region.spectator_base_url(), OBSERVER_PATH);
        let body = get_text(&self.client, &url).await?;
        let version = body.trim();
        if version.is_empty() {
            return Err(TransportError::Decode("empty version".into()));
        }
        Ok(version.to_string())
    }

    async fn match_status(&self, region: Region, match_id: u64) -> TransportResult<MatchStatus> {
        let url = Self::spectator_url(region, "getLastChunkInfo", match_id, 1);
        let body = get_text(&self.client, &url).await?;
        let info: LastChunkInfo = serde_json::from_str(&body)?;
        Ok(info.to_status())
    }

    async fn match_summary(&self, region: Region, match_id: u64) -> TransportResult<MatchSummary> {
        let url = Self::spectator_url(region, "getGameMetaData", match_id, 1);
        let body = get_text(&self.client, &url).await?;
        let metadata: GameMetaData = serde_json::from_str(&body)?;
        metadata.to_summary()
    }

    async fn chunk(&self, region: Region, match_id: u64, chunk_id: u32) -> TransportResult<Chunk> {
        let url = Self::spectator_url(region, "getGameDataChunk", match_id, chunk_id);
        let data = get_bytes(&self.client, &url).await?;
        Ok(Chunk { id: chunk_id, data })
    }

    async fn key_frame(&self, region: Region, match_id: u64, key_frame_id: u32) -> TransportResult<KeyFrame> {
        let url = Self::spectator_url(region, "getKeyFrame", match_id, key_frame_id);
        let data = get_bytes(&self.client, &url).await?;
        Ok(KeyFrame { id: key_frame_id, data })
    }
}

/// reqwest-backed client for the platform API's player and version lookups
#[derive(Clone)]
pub struct HttpIdentityDirectory {
    client: reqwest::Client,
    platform: PlatformEndpoint,
}

impl HttpIdentityDirectory {
    pub fn new(platform: PlatformEndpoint) -> TransportResult<Self> {
        Ok(Self {
            client: build_client()?,
            platform,
        })
    }
}

#[async_trait]
impl IdentityDirectory for HttpIdentityDirectory {
    async fn subject_by_name(&self, region: Region, name: &str) -> TransportResult<Option<SubjectIdentity>> {
        let mut url = self.platform.url(
            region,
            &format!("api/lol/{}/v1.4/summoner/by-name/", region.transport_platform_id),
        )?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Request("platform url cannot be a base".into()))?
            .pop_if_empty()
            .push(name);

        match get_text(&self.client, url.as_str()).await {
            Ok(body) => parse_subject(&body, region),
            Err(TransportError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn challengers(&self, region: Region) -> TransportResult<Vec<SubjectIdentity>> {
        let url = self.platform.url(
            region,
            &format!("api/lol/{}/v2.5/league/challenger?type=RANKED_SOLO_5x5", region.transport_platform_id),
        )?;
        let body = get_text(&self.client, url.as_str()).await?;
        parse_challengers(&body, region)
    }

    async fn platform_version(&self, region: Region) -> TransportResult<String> {
        let url = self.platform.url(
            region,
            &format!("api/lol/static-data/{}/v1.2/versions", region.transport_platform_id),
        )?;
        let body = get_text(&self.client, url.as_str()).await?;
        parse_versions(&body)
    }
}

#[derive(Deserialize)]
struct SummonerDto {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeagueEntryDto {
    player_or_team_id: NumberOrText,
    player_or_team_name: String,
}

#[derive(Deserialize)]
struct LeagueDto {
    #[serde(default)]
    entries: Vec<LeagueEntryDto>,
}

pub(crate) fn parse_current_game(body: &str, region: Region) -> TransportResult<MatchDescriptor> {
    let info: SpectatorGameInfo = serde_json::from_str(body)?;
    info.into_descriptor(region)
}

/// The by-name lookup answers `{ "<normalized name>": { "id": .., "name": .. } }`
pub(crate) fn parse_subject(body: &str, region: Region) -> TransportResult<Option<SubjectIdentity>> {
    let by_name: std::collections::HashMap<String, SummonerDto> = serde_json::from_str(body)?;
    Ok(by_name.into_values().next().map(|dto| SubjectIdentity {
        region,
        subject_id: dto.id,
        display_name: dto.name,
    }))
}

pub(crate) fn parse_challengers(body: &str, region: Region) -> TransportResult<Vec<SubjectIdentity>> {
    let league: LeagueDto = serde_json::from_str(body)?;
    let mut subjects = Vec::with_capacity(league.entries.len());

    for entry in league.entries {
        let subject_id = match entry.player_or_team_id {
            NumberOrText::Number(id) => id,
            NumberOrText::Text(raw) => match raw.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping challenger entry with id `{}`", raw);
                    continue;
                }
            },
        };
        subjects.push(SubjectIdentity {
            region,
            subject_id,
            display_name: entry.player_or_team_name,
        });
    }
    Ok(subjects)
}

/// Picks the highest dotted numeric version, ignoring entries that are not versions
pub(crate) fn parse_versions(body: &str) -> TransportResult<String> {
    let versions: Vec<String> = serde_json::from_str(body)?;
    versions
        .into_iter()
        .filter_map(|v| {
            let parts = v
                .split('.')
                .map(|p| p.parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            Some((parts, v))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, v)| v)
        .ok_or_else(|| TransportError::Decode("no version in list".into()))
}
