use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{Region, SubjectIdentity, TrackedSubject};
use serde::Serialize;
use tracing::{error, info};

use super::server::ApiState;
use crate::error::TransportError;

#[derive(Debug)]
pub enum SubjectApiError {
    UnknownRegion(String),
    BlankName,
    SubjectNotFound(String),
    Directory(TransportError),
    Storage(anyhow::Error),
}

impl IntoResponse for SubjectApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SubjectApiError::UnknownRegion(region) => (StatusCode::BAD_REQUEST, format!("Unknown region: {}", region)),
            SubjectApiError::BlankName => (StatusCode::BAD_REQUEST, "Name must not be empty".to_string()),
            SubjectApiError::SubjectNotFound(name) => (StatusCode::NOT_FOUND, format!("No player named {}", name)),
            SubjectApiError::Directory(e) => {
                error!("Identity lookup failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Identity lookup failed".to_string())
            }
            SubjectApiError::Storage(e) => {
                error!("Failed to store subject: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ChallengersAdded {
    pub region: Region,
    pub added: usize,
}

fn parse_region(raw: &str) -> Result<Region, SubjectApiError> {
    Region::lookup(raw).ok_or_else(|| SubjectApiError::UnknownRegion(raw.to_string()))
}

/// Starts tracking the identity. An already tracked subject keeps its schedule.
async fn track(state: &ApiState, identity: &SubjectIdentity) -> Result<bool, SubjectApiError> {
    let subject = TrackedSubject {
        region: identity.region,
        subject_id: identity.subject_id,
        display_name: identity.display_name.clone(),
        next_eligible_check_time: state.clock.now(),
    };
    state
        .subjects
        .insert_if_absent(&subject)
        .await
        .map_err(SubjectApiError::Storage)
}

/// Resolves a player by name and starts tracking them
pub async fn add_subject(
    State(state): State<ApiState>,
    Path((region, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<SubjectIdentity>), SubjectApiError> {
    let region = parse_region(&region)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(SubjectApiError::BlankName);
    }

    let identity = state
        .directory
        .subject_by_name(region, name)
        .await
        .map_err(SubjectApiError::Directory)?
        .ok_or_else(|| SubjectApiError::SubjectNotFound(name.to_string()))?;

    if !track(&state, &identity).await? {
        info!(region = %region, subject_id = identity.subject_id, "{} is already tracked", identity.display_name);
        return Ok((StatusCode::OK, Json(identity)));
    }
    info!(region = %region, subject_id = identity.subject_id, "Tracking {}", identity.display_name);

    Ok((StatusCode::CREATED, Json(identity)))
}

/// Tracks every player of the region's challenger league
pub async fn add_challengers(
    State(state): State<ApiState>,
    Path(region): Path<String>,
) -> Result<(StatusCode, Json<ChallengersAdded>), SubjectApiError> {
    let region = parse_region(&region)?;
    let challengers = state
        .directory
        .challengers(region)
        .await
        .map_err(SubjectApiError::Directory)?;

    let mut added = 0;
    for identity in &challengers {
        if track(&state, identity).await? {
            added += 1;
        }
    }
    info!(region = %region, "Tracking {} new of {} challengers", added, challengers.len());

    Ok((StatusCode::CREATED, Json(ChallengersAdded { region, added })))
}
