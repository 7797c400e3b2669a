//! Playlist domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// A named playlist owned by a single user. `(user_id, name)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Starter playlists created for every new user.
pub const DEFAULT_PLAYLISTS: &[(&str, &str)] = &[
    (
        "Focus Flow",
        "Música instrumental y lo-fi para concentración, estudio y trabajo profundo.",
    ),
    (
        "Gym Boost",
        "Beats energéticos para entrenar: motivación, cardio y fuerza.",
    ),
    (
        "Chill Night",
        "Sonidos relajados para cerrar el día: chill, downtempo y vibes suaves.",
    ),
    (
        "Road Trip",
        "Temas para manejar y viajar: pop/indie y clásicos que levantan el ánimo.",
    ),
    (
        "Rainy Mood",
        "Playlist introspectiva para días de lluvia: acústico, ambient y soft indie.",
    ),
];

/// Body of `POST /playlists`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: String,
}

/// Body of `PUT /playlists/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePlaylistRequest {
    pub description: String,
}
