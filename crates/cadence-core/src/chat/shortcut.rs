//! Commands answered without calling the model.

pub const HELP_TEXT: &str = "Comandos disponibles:\n\
- help: muestra esta ayuda\n\
- playlists: lista tus playlists\n\
- memory: muestra memoria/contextos previos (solo para el modelo)\n\
\n\
También podés pedir recomendaciones y gestionar playlists por chat, por ejemplo:\n\
- 'Recomendame música para estudiar con lluvia'\n\
- 'Agregá una playlist llamada Focus Pro con descripción lo-fi para estudiar'\n\
- 'Editá la playlist Focus Flow y poné: lo-fi + ambient para concentración'\n\
- 'Borrá la playlist Rainy Mood'\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Help,
    Playlists,
    Memory,
}

impl Shortcut {
    /// Match the whole message, trimmed and case-insensitive.
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim().to_lowercase().as_str() {
            "help" => Some(Shortcut::Help),
            "playlists" => Some(Shortcut::Playlists),
            "memory" | "memoria" => Some(Shortcut::Memory),
            _ => None,
        }
    }
}
