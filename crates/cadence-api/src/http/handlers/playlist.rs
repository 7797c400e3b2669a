//! Playlist CRUD HTTP handlers, scoped to the authenticated user.
//!
//! Endpoints:
//! - GET    /playlists       - List playlists, ordered by name
//! - POST   /playlists       - Create, or overwrite the description of an existing name
//! - PUT    /playlists/{id}  - Update the description
//! - DELETE /playlists/{id}  - Delete

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{Value, json};

use cadence_core::repository::playlist::PlaylistRepository;
use cadence_types::playlist::{CreatePlaylistRequest, Playlist, UpdatePlaylistRequest};

use crate::http::auth::AuthUser;
use crate::http::error::AppError;
use crate::state::AppState;

const MAX_NAME_CHARS: usize = 128;
const MAX_DESCRIPTION_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
pub struct PlaylistView {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl From<Playlist> for PlaylistView {
    fn from(p: Playlist) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
        }
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(())
}

fn not_found() -> AppError {
    AppError::NotFound("Playlist not found".to_string())
}

pub async fn list_playlists(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PlaylistView>>, AppError> {
    let playlists = state.storage.playlists.list(user.id).await?;
    Ok(Json(playlists.into_iter().map(PlaylistView::from).collect()))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> Result<Json<PlaylistView>, AppError> {
    let Json(request) = payload?;
    check_length("name", &request.name, MAX_NAME_CHARS)?;
    check_length("description", &request.description, MAX_DESCRIPTION_CHARS)?;

    let playlist = state
        .storage
        .playlists
        .upsert(user.id, &request.name, &request.description)
        .await?;
    tracing::info!(user_id = %user.id, playlist = %playlist.name, "Playlist saved");
    Ok(Json(playlist.into()))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePlaylistRequest>, JsonRejection>,
) -> Result<Json<PlaylistView>, AppError> {
    let Json(request) = payload?;
    check_length("description", &request.description, MAX_DESCRIPTION_CHARS)?;

    state
        .storage
        .playlists
        .update_description(user.id, id, &request.description)
        .await?
        .map(|p| Json(p.into()))
        .ok_or_else(not_found)
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !state.storage.playlists.delete(user.id, id).await? {
        return Err(not_found());
    }
    Ok(Json(json!({ "deleted": true })))
}
