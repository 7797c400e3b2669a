//! `cadence bench` - run scripted chat cases deterministically.
//!
//! Each case runs as a `bench_<user_id>` user with its environment mocks in
//! the request context, so the location/weather and time tools never reach
//! the network. Memory lives under `<memory-root>/case_<case_id>` (wiped
//! before the case) or, with `persistent_memory`, under
//! `<memory-root>/persist_<user_id>` (kept across cases and runs).

use std::path::{Path, PathBuf};

use anyhow::Context;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use serde::{Deserialize, Serialize};

use cadence_core::context::RequestScope;
use cadence_core::repository::user::UserRepository;
use cadence_types::environment::EnvMocks;
use cadence_types::usage::Expense;
use cadence_types::user::UserId;

use crate::cli::user::register;
use crate::state::{AppState, Storage};

#[derive(Debug, Clone, Deserialize)]
pub struct BenchCase {
    pub case_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Continue the user's regular conversation thread instead of a fresh one.
    #[serde(default)]
    pub session_memory: bool,
    #[serde(default)]
    pub persistent_memory: bool,
    #[serde(default)]
    pub api_mocks: EnvMocks,
    #[serde(default)]
    pub input_message: String,
}

fn default_user() -> String {
    "u".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub case_id: String,
    pub description: String,
    pub user_id: String,
    pub session_memory: bool,
    pub persistent_memory: bool,
    pub api_mocks: EnvMocks,
    pub input_message: String,
    pub output_message: String,
    pub expense: Expense,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drop whole-line `//` comments.
pub fn strip_comments(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_cases(raw: &str) -> anyhow::Result<Vec<BenchCase>> {
    serde_json::from_str(&strip_comments(raw)).context("cases file must contain a JSON array of cases")
}

pub fn memory_dir(root: &Path, case: &BenchCase) -> PathBuf {
    if case.persistent_memory {
        root.join(format!("persist_{}", case.user_id))
    } else {
        root.join(format!("case_{}", case.case_id))
    }
}

pub fn thread_for(case: &BenchCase, user: UserId) -> String {
    if case.session_memory {
        format!("user:{user}")
    } else {
        format!("user:{user}:case:{}", case.case_id)
    }
}

async fn prepare_memory_dir(root: &Path, case: &BenchCase) -> std::io::Result<PathBuf> {
    let dir = memory_dir(root, case);
    if !case.persistent_memory && tokio::fs::try_exists(&dir).await? {
        tokio::fs::remove_dir_all(&dir).await?;
    }
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Bench users are namespaced so they never collide with real accounts.
async fn bench_user(storage: &Storage, name: &str) -> anyhow::Result<UserId> {
    let username = format!("bench_{name}");
    if let Some(user) = storage.users.find_by_username(&username).await? {
        return Ok(user.id);
    }
    let (user, _token) = register(storage, &username).await?;
    Ok(user.id)
}

/// Run `cases` in order. A failing case is reported in its result and does
/// not stop the run. The memory index points back at its original directory
/// afterwards, also when setting up a case fails.
pub async fn run_cases(
    state: &AppState,
    cases: &[BenchCase],
    memory_root: &Path,
) -> anyhow::Result<Vec<BenchResult>> {
    let original_dir = state.memory_index.dir().await;
    let mut results = Vec::with_capacity(cases.len());
    let mut outcome = Ok(());
    for case in cases {
        match run_case(state, case, memory_root).await {
            Ok(result) => results.push(result),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }
    state.memory_index.reset(Some(original_dir)).await;
    outcome.map(|()| results)
}

/// A case without session memory runs on a thread that is empty before the
/// case and cleared after it.
async fn run_case(
    state: &AppState,
    case: &BenchCase,
    memory_root: &Path,
) -> anyhow::Result<BenchResult> {
    let user = bench_user(&state.storage, &case.user_id).await?;
    let dir = prepare_memory_dir(memory_root, case)
        .await
        .with_context(|| format!("preparing memory directory for case {}", case.case_id))?;
    state.memory_index.reset(Some(dir)).await;

    let thread = thread_for(case, user);
    let threads = state.chat_service.threads();
    if !case.session_memory {
        threads.clear(&thread);
    }
    let outcome = RequestScope::new()
        .with_env_mocks(Some(case.api_mocks.clone()))
        .run(
            state
                .chat_service
                .respond_in_thread(Some(user), &case.input_message, &thread),
        )
        .await;
    if !case.session_memory {
        threads.clear(&thread);
    }

    let (output_message, expense, error) = match outcome {
        Ok(reply) => (reply.reply, reply.expense, None),
        Err(e) => {
            tracing::warn!(case = %case.case_id, error = %e, "Bench case failed");
            (String::new(), Expense::default(), Some(e.to_string()))
        }
    };
    tracing::info!(case = %case.case_id, ok = error.is_none(), "Bench case finished");

    Ok(BenchResult {
        case_id: case.case_id.clone(),
        description: case.description.clone(),
        user_id: case.user_id.clone(),
        session_memory: case.session_memory,
        persistent_memory: case.persistent_memory,
        api_mocks: case.api_mocks.clone(),
        input_message: case.input_message.clone(),
        output_message,
        expense,
        error,
    })
}

pub async fn run(
    state: &AppState,
    cases_path: &Path,
    out: Option<&Path>,
    only: Option<&str>,
    memory_root: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(cases_path)
        .await
        .with_context(|| format!("reading {}", cases_path.display()))?;
    let mut cases = parse_cases(&raw)?;
    if let Some(only) = only {
        let wanted: Vec<&str> = only.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        cases.retain(|c| wanted.contains(&c.case_id.as_str()));
    }

    let results = run_cases(state, &cases, memory_root).await?;

    if let Some(out) = out {
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(out, serde_json::to_string_pretty(&results)?).await?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", results_table(&results));
    }
    Ok(())
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn results_table(results: &[BenchResult]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Case").fg(Color::White),
        Cell::new("Input").fg(Color::White),
        Cell::new("Output").fg(Color::White),
        Cell::new("In").fg(Color::White),
        Cell::new("Out").fg(Color::White),
        Cell::new("Total").fg(Color::White),
    ]);

    for r in results {
        let output = match &r.error {
            Some(e) => Cell::new(e).fg(Color::Red),
            None => Cell::new(&r.output_message),
        };
        let total = &r.expense.total;
        table.add_row(vec![
            Cell::new(&r.case_id).fg(Color::Cyan),
            Cell::new(&r.input_message),
            output,
            Cell::new(count(total.input_tokens)),
            Cell::new(count(total.output_tokens)),
            Cell::new(count(total.total_tokens)),
        ]);
    }
    table
}

/// Per-agent usage of one turn.
pub fn expense_table(expense: &Expense) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["Agent", "Model", "Input", "Output", "Total"]);
    for agent in &expense.breakdown {
        table.add_row(vec![
            Cell::new(&agent.agent).fg(Color::Cyan),
            Cell::new(agent.model.as_deref().unwrap_or("-")),
            Cell::new(agent.input_tokens),
            Cell::new(agent.output_tokens),
            Cell::new(agent.total_tokens),
        ]);
    }
    table
}
