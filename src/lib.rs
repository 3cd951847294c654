//! Scholar: a research assistant over four retrieval backends.
//!
//! A question is routed to a subset of backends, answered concurrently,
//! and fused into one ranked context:
//! Query → Router → {Vector, Keyword, Graph, Relational} → Fusion → Context
//!
//! # Architecture
//!
//! - **Retrieval**: the [`scholar_retrieval`] crate (router, backends,
//!   fusion, formatter, orchestrator)
//! - **Config**: defaults, TOML file and environment overrides
//! - **Server**: `axum` HTTP front end
//! - **REPL**: line-oriented command-line front end
//! - **Generation**: optional answer synthesis through an
//!   OpenAI-compatible chat API

pub mod config;
pub mod error;
pub mod generation;
pub mod repl;
pub mod server;

pub use config::AppConfig;
pub use error::{Result, ScholarError};
pub use generation::AnswerGenerator;
pub use server::ScholarServer;
