//! # clood
//!
//! A CLI and library for dispatching prompts across a fleet of self-hosted
//! Ollama-compatible inference hosts.
//!
//! ## Overview
//!
//! clood speaks the Ollama HTTP generation protocol ([`client`]) to any
//! number of hosts declared in configuration ([`config`]), probes them for
//! liveness and model inventory ([`host`]), indexes which host serves which
//! model ([`capability`]), classifies a prompt into a quality/speed tier
//! ([`classifier`]), and routes it to a concrete (model, host) pair
//! ([`router`]). From there a request can fan out to every capable host at
//! once ([`tournament`]), interleave a primary model's stream with
//! synchronous calls to expert models ([`inception`]), persist a running
//! conversation per project ([`saga`]), or drive an iterative tool-calling
//! loop ([`agent`]) backed by a restricted tool registry ([`tools`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use clood::GenerationClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GenerationClient::new("http://localhost:11434")?;
//! let answer = client.generate("llama3", "What is the capital of France?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **client**: speaks the Ollama wire protocol to a single host (generate, chat, pull, benchmark).
//! - **host**: probes a fleet of hosts for liveness and model inventory.
//! - **capability**: indexes online hosts by the models they serve.
//! - **classifier**: scores a prompt into a [`types::Tier`].
//! - **router**: resolves tier → model → host into one routing decision.
//! - **tournament**: fans a prompt out across hosts in parallel, crowns a champion.
//! - **inception**: streams a primary model while dispatching embedded sub-queries to experts.
//! - **saga**: a per-project persistent chat transcript with context-budget accounting.
//! - **tools** / **agent**: a restricted tool registry and the tool-calling loop built on it.
//! - **config**: YAML configuration for hosts, tiers, inception, saga, and agent limits.
//! - **error**: the crate's flat `Error` enum and `Result` alias.
//! - **context**: token estimation and history truncation shared by saga and inception.
//! - **retry**: exponential backoff with jitter for transient host failures.

mod agent;
mod capability;
mod classifier;
mod client;
mod config;
mod context;
mod error;
mod host;
mod inception;
mod router;
mod saga;
mod tools;
mod tournament;
mod types;
mod utils;

pub mod retry;

pub mod cli;

// --- Generation client (C1) ---

pub use client::GenerationClient;

// --- Host registry & probing (C2) ---

pub use host::{HostRegistry, IndexedStatus};

// --- Capability index (C3) ---

pub use capability::CapabilityIndex;

// --- Query classifier (C4) ---

pub use classifier::{Classification, Classifier};

// --- Router (C5) ---

pub use router::Router;

// --- Tournament executor (C6) ---

pub use tournament::TournamentExecutor;

// --- Inception pipeline (C7) ---

pub use inception::{build_continuation_message, run as run_inception, SubQueryTokenizer, TokenEvent};

// --- Saga session store (C8) ---

pub use saga::{Saga, SagaStats, SlashOutcome};

// --- Agent loop (C9) ---

pub use agent::{Agent, AgentResult, Turn, ToolCallRecord};

// --- Tool system ---

pub use tools::{read_file_tool, shell_execute_tool, tool, Tool, ToolBuilder, ToolHandler, ToolRegistry};

// --- Configuration ---

pub use config::{AgentConfig, Config, InceptionConfig, SagaConfig};

// --- Error handling ---

pub use error::{Error, Result};

// --- Context management ---

pub use context::{estimate_tokens, estimate_tokens_str, is_approaching_limit, truncate_messages};

// --- Core types ---

pub use types::{
    BaseUrl, BenchmarkResult, ContentBlock, GenerateOutcome, GenerationOptions, Host, HostStatus,
    InceptionEvent, Message, MessageRole, ModelEntry, ModelName, RouteResult, SubQuery,
    Temperature, TextBlock, Tier, TierProfile, ToolResultBlock, ToolUseBlock, Tournament,
    TournamentResult,
};

/// Convenience re-exports for typical usage: `use clood::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Agent, CapabilityIndex, Classifier, Config, Error, GenerationClient, Host, HostRegistry,
        HostStatus, Message, Result, Router, Saga, Tier, Tool, TournamentExecutor,
    };
}
