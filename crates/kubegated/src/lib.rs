//! kubegate daemon library - exposes modules for testing.

pub mod cli;
pub mod config;
pub mod context;
pub mod executor;
pub mod gate;
pub mod llm;
pub mod pipeline;
pub mod reasoning;
pub mod routes;
pub mod server;
