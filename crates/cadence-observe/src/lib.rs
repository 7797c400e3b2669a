//! Observability for Cadence: subscriber setup and the GenAI span
//! attribute names shared by the agent and HTTP layers.

pub mod genai_attrs;
pub mod tracing_setup;
