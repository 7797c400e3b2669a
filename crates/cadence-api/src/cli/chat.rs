//! `cadence chat` - one turn from the terminal.

use anyhow::Context;

use cadence_core::repository::user::UserRepository;

use crate::cli::bench::expense_table;
use crate::state::AppState;

pub async fn chat_once(
    state: &AppState,
    message: &str,
    username: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let user = match username {
        Some(name) => Some(
            state
                .storage
                .users
                .find_by_username(name)
                .await?
                .with_context(|| format!("unknown user '{name}' (create it with `cadence user create`)"))?,
        ),
        None => None,
    };

    let reply = state
        .chat_service
        .respond(user.as_ref().map(|u| u.id), message)
        .await?;

    if json {
        let out = serde_json::json!({ "reply": reply.reply, "expense": reply.expense });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", reply.reply);
    println!();
    if !reply.expense.breakdown.is_empty() {
        println!("{}", expense_table(&reply.expense));
    }
    Ok(())
}
