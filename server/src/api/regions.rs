use axum::Json;
use common::Region;
use serde::Serialize;

/// Region metadata returned by /api/regions endpoint
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegionMetadata {
    pub code: &'static str,
    pub spectator_host: &'static str,
    pub spectator_port: u16,
    pub spectator_platform_id: &'static str,
    pub transport_platform_id: &'static str,
}

impl From<Region> for RegionMetadata {
    fn from(region: Region) -> Self {
        Self {
            code: region.code,
            spectator_host: region.spectator_host,
            spectator_port: region.spectator_port,
            spectator_platform_id: region.spectator_platform_id,
            transport_platform_id: region.transport_platform_id,
        }
    }
}

/// List all regions of the region directory
pub async fn list_regions() -> Json<Vec<RegionMetadata>> {
    Json(Region::all().iter().copied().map(RegionMetadata::from).collect())
}
