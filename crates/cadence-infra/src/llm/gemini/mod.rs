//! Google Gemini chat model implementation.
//!
//! Provides [`GeminiChatModel`], which implements the
//! [`ChatModel`](cadence_core::llm::model::ChatModel) trait for the Gemini
//! `generateContent` API with function calling.

pub mod client;
pub mod types;

pub use client::GeminiChatModel;
