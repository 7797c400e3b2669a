//! POST /chat - one conversational turn for the authenticated user.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use tracing::field::Empty;

use cadence_observe::genai_attrs::{
    GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS, GEN_AI_USAGE_TOTAL_TOKENS, OP_CHAT,
    PROVIDER_GEMINI,
};
use cadence_types::usage::{Expense, TokenUsage};

use crate::http::auth::AuthUser;
use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub expense: Expense,
}

pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;

    let span = tracing::info_span!(
        "chat",
        gen_ai.operation.name = OP_CHAT,
        gen_ai.provider.name = PROVIDER_GEMINI,
        gen_ai.request.model = %state.config.model.name,
        gen_ai.usage.input_tokens = Empty,
        gen_ai.usage.output_tokens = Empty,
        gen_ai.usage.total_tokens = Empty,
        user_id = %user.id,
    );
    let reply = state
        .chat_service
        .respond(Some(user.id), &request.message)
        .instrument(span.clone())
        .await?;
    record_usage(&span, &reply.expense.total);

    Ok(Json(ChatResponse {
        reply: reply.reply,
        expense: reply.expense,
    }))
}

fn record_usage(span: &tracing::Span, total: &TokenUsage) {
    for (field, value) in [
        (GEN_AI_USAGE_INPUT_TOKENS, total.input_tokens),
        (GEN_AI_USAGE_OUTPUT_TOKENS, total.output_tokens),
        (GEN_AI_USAGE_TOTAL_TOKENS, total.total_tokens),
    ] {
        if let Some(value) = value {
            span.record(field, value);
        }
    }
}
