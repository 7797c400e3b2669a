//! Playlist management tools, scoped to the user in the request context.

use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use cadence_types::llm::ToolSpec;
use cadence_types::playlist::Playlist;
use cadence_types::user::UserId;

use crate::context;
use crate::repository::playlist::PlaylistRepository;
use crate::tools::{Tool, no_parameters, parse_args, spec};

pub const NO_USER_MESSAGE: &str = "No hay un usuario autenticado para gestionar playlists";

pub fn render_playlists(playlists: &[Playlist]) -> String {
    let mut out = "Playlists disponibles:\n".to_string();
    for p in playlists {
        let _ = writeln!(out, "- {}: {}", p.name, p.description);
    }
    out
}

/// The `list_playlists` answer for `user`, shared with the chat shortcut.
pub async fn describe_playlists<P: PlaylistRepository>(repo: &P, user: Option<UserId>) -> String {
    let Some(user) = user else {
        return NO_USER_MESSAGE.to_string();
    };
    match repo.list(user).await {
        Ok(playlists) => render_playlists(&playlists),
        Err(e) => format!("Error cargando playlists: {e}"),
    }
}

pub struct ListPlaylistsTool<P> {
    repo: Arc<P>,
}

impl<P: PlaylistRepository + 'static> Tool for ListPlaylistsTool<P> {
    fn spec(&self) -> ToolSpec {
        spec(
            "list_playlists",
            "Devuelve la lista de playlists disponibles junto con sus descripciones. \
             Es la fuente base para la selección final de música.",
            no_parameters(),
        )
    }

    fn call(&self, _args: Value) -> BoxFuture<'_, String> {
        let user = context::current_user_id();
        Box::pin(async move { describe_playlists(self.repo.as_ref(), user).await })
    }
}

#[derive(Debug, Deserialize)]
struct AddArgs {
    name: String,
    description: String,
}

pub struct AddPlaylistTool<P> {
    repo: Arc<P>,
}

impl<P: PlaylistRepository + 'static> Tool for AddPlaylistTool<P> {
    fn spec(&self) -> ToolSpec {
        spec(
            "add_playlist",
            "Agrega una playlist al catálogo del usuario. Si ya existe una con ese nombre, \
             reemplaza su descripción.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Nombre de la playlist"},
                    "description": {"type": "string", "description": "Descripción o características"}
                },
                "required": ["name", "description"]
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        let user = context::current_user_id();
        Box::pin(async move {
            let Some(user) = user else {
                return NO_USER_MESSAGE.to_string();
            };
            let args: AddArgs = match parse_args("add_playlist", args) {
                Ok(args) => args,
                Err(msg) => return msg,
            };
            match self.repo.upsert(user, &args.name, &args.description).await {
                Ok(p) => format!("Playlist '{}' agregada exitosamente: {}", p.name, p.description),
                Err(e) => format!("Error agregando playlist: {e}"),
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct EditArgs {
    name: String,
    #[serde(alias = "new_description")]
    description: String,
}

pub struct EditPlaylistTool<P> {
    repo: Arc<P>,
}

impl<P: PlaylistRepository + 'static> Tool for EditPlaylistTool<P> {
    fn spec(&self) -> ToolSpec {
        spec(
            "edit_playlist",
            "Modifica la descripción o características de una playlist existente.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Nombre exacto de la playlist"},
                    "description": {"type": "string", "description": "Nueva descripción"}
                },
                "required": ["name", "description"]
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        let user = context::current_user_id();
        Box::pin(async move {
            let Some(user) = user else {
                return NO_USER_MESSAGE.to_string();
            };
            let args: EditArgs = match parse_args("edit_playlist", args) {
                Ok(args) => args,
                Err(msg) => return msg,
            };
            let not_found = format!("Playlist '{}' no encontrada", args.name);
            let found = match self.repo.find_by_name(user, &args.name).await {
                Ok(Some(found)) => found,
                Ok(None) => return not_found,
                Err(e) => return format!("Error editando playlist: {e}"),
            };
            match self
                .repo
                .update_description(user, found.id, &args.description)
                .await
            {
                Ok(Some(updated)) => format!(
                    "Playlist '{}' actualizada: {} -> {}",
                    args.name, found.description, updated.description
                ),
                Ok(None) => not_found,
                Err(e) => format!("Error editando playlist: {e}"),
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    name: String,
}

pub struct DeletePlaylistTool<P> {
    repo: Arc<P>,
}

impl<P: PlaylistRepository + 'static> Tool for DeletePlaylistTool<P> {
    fn spec(&self) -> ToolSpec {
        spec(
            "delete_playlist",
            "Elimina una playlist del catálogo del usuario.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Nombre exacto de la playlist"}
                },
                "required": ["name"]
            }),
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'_, String> {
        let user = context::current_user_id();
        Box::pin(async move {
            let Some(user) = user else {
                return NO_USER_MESSAGE.to_string();
            };
            let args: DeleteArgs = match parse_args("delete_playlist", args) {
                Ok(args) => args,
                Err(msg) => return msg,
            };
            let not_found = format!("Playlist '{}' no encontrada", args.name);
            let found = match self.repo.find_by_name(user, &args.name).await {
                Ok(Some(found)) => found,
                Ok(None) => return not_found,
                Err(e) => return format!("Error eliminando playlist: {e}"),
            };
            match self.repo.delete(user, found.id).await {
                Ok(true) => format!("Playlist '{}' eliminada exitosamente", args.name),
                Ok(false) => not_found,
                Err(e) => format!("Error eliminando playlist: {e}"),
            }
        })
    }
}

pub fn playlist_tools<P: PlaylistRepository + 'static>(repo: Arc<P>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListPlaylistsTool {
            repo: Arc::clone(&repo),
        }),
        Arc::new(AddPlaylistTool {
            repo: Arc::clone(&repo),
        }),
        Arc::new(EditPlaylistTool {
            repo: Arc::clone(&repo),
        }),
        Arc::new(DeletePlaylistTool { repo }),
    ]
}
