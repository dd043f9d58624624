use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::rate_limit::client_address;
use super::server::ApiState;
use crate::error::ReplayError;
use crate::protocol::{GameMetaData, LastChunkInfo, OBSERVER_PATH};
use crate::storage::BlobReader;

/// Live spectating protocol endpoints served from persisted recordings
pub fn routes() -> Router<ApiState> {
    let observer = Router::new()
        .route("/version", get(version))
        .route("/getGameMetaData/:platform_id/:game_id/:token/token", get(game_metadata))
        .route("/getLastChunkInfo/:platform_id/:game_id/:token/token", get(last_chunk_info))
        .route("/getGameDataChunk/:platform_id/:game_id/:chunk_id/token", get(game_data_chunk))
        .route("/getKeyFrame/:platform_id/:game_id/:key_frame_id/token", get(key_frame));

    Router::new().nest(OBSERVER_PATH, observer)
}

fn caller(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    client_address(headers, connect_info.map(|ConnectInfo(addr)| addr))
}

fn blob_response(reader: BlobReader) -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

async fn version(State(state): State<ApiState>) -> String {
    debug!("Version");
    state.replay.version().to_string()
}

async fn game_metadata(
    State(state): State<ApiState>,
    Path((platform_id, game_id, _token)): Path<(String, u64, String)>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<GameMetaData>, ReplayError> {
    let client = caller(&headers, connect_info);
    debug!(platform_id = %platform_id, game_id, client = %client, "GameMetaData");
    state.replay.metadata(&platform_id, game_id, &client).await.map(Json)
}

async fn last_chunk_info(
    State(state): State<ApiState>,
    Path((platform_id, game_id, _token)): Path<(String, u64, String)>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<LastChunkInfo>, ReplayError> {
    let client = caller(&headers, connect_info);
    debug!(platform_id = %platform_id, game_id, client = %client, "LastChunkInfo");
    state.replay.last_chunk_info(&platform_id, game_id, &client).await.map(Json)
}

async fn game_data_chunk(
    State(state): State<ApiState>,
    Path((platform_id, game_id, chunk_id)): Path<(String, u64, u32)>,
) -> Result<Response, ReplayError> {
    debug!(platform_id = %platform_id, game_id, chunk_id, "Chunk");
    let reader = state.replay.chunk(&platform_id, game_id, chunk_id).await?;
    Ok(blob_response(reader))
}

async fn key_frame(
    State(state): State<ApiState>,
    Path((platform_id, game_id, key_frame_id)): Path<(String, u64, u32)>,
) -> Result<Response, ReplayError> {
    debug!(platform_id = %platform_id, game_id, key_frame_id, "Keyframe");
    let reader = state.replay.key_frame(&platform_id, game_id, key_frame_id).await?;
    Ok(blob_response(reader))
}
