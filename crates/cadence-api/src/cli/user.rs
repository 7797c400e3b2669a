//! `cadence user create` - register a user and print the access token once.

use cadence_core::repository::playlist::seed_default_playlists;
use cadence_core::repository::user::UserRepository;
use cadence_infra::token::{generate_token, hash_token};
use cadence_types::user::User;

use crate::state::Storage;

/// Create `username` with a fresh token and the starter playlists.
///
/// Returns the user and the plaintext token; only its hash is stored.
pub async fn register(storage: &Storage, username: &str) -> anyhow::Result<(User, String)> {
    let username = username.trim();
    anyhow::ensure!(!username.is_empty(), "username must not be empty");

    let token = generate_token();
    let user = storage.users.create(username, &hash_token(&token)).await?;
    let seeded = seed_default_playlists(storage.playlists.as_ref(), user.id).await?;
    tracing::info!(user_id = %user.id, username, seeded, "User created");
    Ok((user, token))
}

pub async fn create_user(storage: &Storage, username: &str, json: bool) -> anyhow::Result<()> {
    let (user, token) = register(storage, username).await?;

    if json {
        let out = serde_json::json!({
            "id": user.id,
            "username": user.username,
            "token": token,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Created user '{}' (id {})",
        console::style("✓").green().bold(),
        console::style(&user.username).cyan(),
        user.id
    );
    println!();
    println!(
        "  {} Access token (save this -- it won't be shown again):",
        console::style("🔑").bold()
    );
    println!();
    println!("  {}", console::style(&token).yellow().bold());
    println!();
    Ok(())
}
