//! Core data types for the inference dispatch core.
//!
//! This module is organized into a few families:
//!
//! - **Newtype wrappers** ([`ModelName`], [`BaseUrl`], [`Temperature`]) that validate
//!   at construction time instead of at the call site.
//! - **Host/capability model** ([`Host`], [`HostStatus`], [`ModelEntry`]): what the
//!   registry discovers about the fleet.
//! - **Routing model** ([`Tier`], [`GenerationOptions`], [`RouteResult`]): what the
//!   classifier and router produce.
//! - **Fan-out results** ([`TournamentResult`], [`Tournament`], [`SubQuery`]): the
//!   shapes produced by the tournament executor and the inception pipeline.
//! - **Conversation model** ([`Message`], [`MessageRole`], [`ContentBlock`], ...): the
//!   in-memory chat turns shared by the Saga store and the agent loop.
//! - **Wire format** (`Ollama*`): serde types mirroring the generation HTTP protocol.
//!
//! Internal SDK types are kept distinct from wire types so the on-disk/network
//! representation can evolve independently of how the rest of the crate models
//! a conversation.

use crate::Error;
use serde::{Deserialize, Serialize};

// ============================================================================
// NEWTYPE WRAPPERS FOR COMPILE-TIME TYPE SAFETY
// ============================================================================

/// Validated model name with compile-time type safety.
///
/// # Validation Rules
///
/// - Must not be empty or whitespace-only.
///
/// # Example
///
/// ```
/// use clood::ModelName;
///
/// let model = ModelName::new("qwen2.5:7b").unwrap();
/// assert_eq!(model.as_str(), "qwen2.5:7b");
/// assert!(ModelName::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelName(String);

impl ModelName {
    /// Creates a new `ModelName` after validation.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::bad_input("model name cannot be empty or whitespace"));
        }
        Ok(ModelName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// The family prefix (substring before `:`), used for grouping display
    /// only — never as an identity key.
    pub fn family(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated base URL with compile-time type safety.
///
/// # Validation Rules
///
/// - Must not be empty.
/// - Must start with `http://` or `https://`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn new(url: impl Into<String>) -> crate::Result<Self> {
        let url = url.into();
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(Error::bad_input("base_url cannot be empty"));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(Error::bad_input("base_url must start with http:// or https://"));
        }

        Ok(BaseUrl(trimmed.trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated sampling temperature (0.0 to 2.0 inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f32);

impl Temperature {
    pub fn new(temp: f32) -> crate::Result<Self> {
        if !(0.0..=2.0).contains(&temp) {
            return Err(Error::bad_input("temperature must be between 0.0 and 2.0"));
        }
        Ok(Temperature(temp))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Temperature(0.7)
    }
}

// ============================================================================
// HOST / CAPABILITY MODEL (C2, C3)
// ============================================================================

/// A declared inference host: a name and a base URL, nothing more.
///
/// `Host` is the registry's declared identity. Runtime state (online/offline,
/// inventory, latency) lives separately in [`HostStatus`] so a stale probe
/// never corrupts the declaration it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub base_url: String,
    /// Optional free-form tag (e.g. "gpu", "cpu-only") used only for display.
    #[serde(default)]
    pub tag: Option<String>,
}

impl Host {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            tag: None,
        }
    }
}

/// A single model entry in a host's inventory, as advertised by `/api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

/// The result of probing one host: online/offline, latency, version,
/// and inventory. Produced fresh by every probe; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostStatus {
    pub host: Host,
    pub online: bool,
    pub latency: std::time::Duration,
    pub version: String,
    pub models: Vec<ModelEntry>,
    pub error: Option<String>,
    pub probed_at: std::time::SystemTime,
}

impl HostStatus {
    pub fn offline(host: Host, error: impl Into<String>) -> Self {
        Self {
            host,
            online: false,
            latency: std::time::Duration::ZERO,
            version: String::new(),
            models: Vec::new(),
            error: Some(error.into()),
            probed_at: std::time::SystemTime::now(),
        }
    }

    pub fn online(host: Host, latency: std::time::Duration, version: String, models: Vec<ModelEntry>) -> Self {
        Self {
            host,
            online: true,
            latency,
            version,
            models,
            error: None,
            probed_at: std::time::SystemTime::now(),
        }
    }

    /// True if this host's inventory lists `model` by exact name.
    pub fn serves(&self, model: &str) -> bool {
        self.online && self.models.iter().any(|m| m.name == model)
    }
}

// ============================================================================
// TIER / ROUTING MODEL (C4, C5)
// ============================================================================

/// A capability class. This is a closed enumeration by design (see
/// `DESIGN.md`): the router's totality depends on there being no "unknown
/// tier" case to fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Unspecified; only valid as a forcing input, never as a classifier output.
    Unspecified,
    /// Tier 1: fast, cheap, low-latency answers.
    Fast,
    /// Tier 2: deep reasoning, the default when classification is inconclusive.
    Deep,
    /// Tier 3: structured analysis.
    Analysis,
    /// Tier 4: long-form writing.
    Writing,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Unspecified => "unspecified",
            Tier::Fast => "fast",
            Tier::Deep => "deep",
            Tier::Analysis => "analysis",
            Tier::Writing => "writing",
        }
    }

    /// Fixed tiebreak order used by the classifier: 1, 2, 3, 4.
    pub fn ordinal(&self) -> u8 {
        match self {
            Tier::Unspecified => 0,
            Tier::Fast => 1,
            Tier::Deep => 2,
            Tier::Analysis => 3,
            Tier::Writing => 4,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generation options threaded through to `/api/generate` and `/api/chat`.
/// Mirrors the server's `options` object; fields are `None` when the server
/// default should apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Not sent over the wire; consumed by the client to bound the call.
    #[serde(skip)]
    pub timeout: Option<std::time::Duration>,
}

/// Per-tier policy: which model to prefer and what options to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierProfile {
    pub preferred_model: String,
    #[serde(default)]
    pub options: GenerationOptions,
}

/// The outcome of routing one request: tier, confidence, and the concrete
/// (model, host) pair chosen to serve it. Ephemeral — never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub tier: Tier,
    pub confidence: f32,
    pub model: String,
    pub host: Host,
}

// ============================================================================
// TOURNAMENT (C6)
// ============================================================================

/// The outcome of one (host, model) generation in a tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentResult {
    pub host: String,
    pub model: String,
    pub response: String,
    pub duration: std::time::Duration,
    pub eval_count: u32,
    pub error: Option<String>,
}

impl TournamentResult {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 || self.error.is_some() {
            0.0
        } else {
            self.eval_count as f64 / secs
        }
    }
}

/// Full record of a blocking generation call: text plus the evaluation
/// tallies the server reports on its `done:true` frame (§4.1). Distinct
/// from the plain-`String` `generate()` convenience, which callers that
/// only want the text (the router, the saga REPL) use instead.
#[derive(Debug, Clone, Default)]
pub struct GenerateOutcome {
    pub text: String,
    pub eval_count: u32,
    pub eval_duration: std::time::Duration,
}

/// Aggregate of a tournament run: every (host, model) result plus the
/// crowned champion (first error-free entry once sorted by duration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub prompt: String,
    pub results: Vec<TournamentResult>,
    pub champion_index: Option<usize>,
    pub wall_clock: std::time::Duration,
}

impl Tournament {
    pub fn champion(&self) -> Option<&TournamentResult> {
        self.champion_index.and_then(|i| self.results.get(i))
    }

    /// Sum of successful per-task durations divided by wall-clock duration.
    pub fn parallel_speedup(&self) -> f64 {
        let sum: f64 = self
            .results
            .iter()
            .filter(|r| r.error.is_none())
            .map(|r| r.duration.as_secs_f64())
            .sum();
        let wall = self.wall_clock.as_secs_f64();
        if wall <= 0.0 { 0.0 } else { sum / wall }
    }
}

// ============================================================================
// INCEPTION (C7)
// ============================================================================

/// A sub-query parsed out of a primary model's stream:
/// `<sub-query model="ALIAS">PROMPT</sub-query>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQuery {
    pub alias: String,
    pub prompt: String,
}

/// One segment of an inception run, as emitted downstream to the UI.
#[derive(Debug, Clone)]
pub enum InceptionEvent {
    /// Passthrough text from the primary stream.
    Text(String),
    /// A sub-query has begun; the expert alias and resolved model are known.
    SubQueryStart { alias: String, model: String, prompt: String },
    /// One chunk of the expert model's streamed answer.
    SubQueryChunk(String),
    /// The sub-query has concluded.
    SubQueryEnd,
}

// ============================================================================
// CONVERSATION MODEL (shared by Saga and the Agent Loop)
// ============================================================================

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A single piece of message content. Kept as an enum (rather than a plain
/// string) so tool calls and their results travel alongside text without a
/// separate side-channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock::new(s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolUseBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: serde_json::Value,
}

impl ToolResultBlock {
    pub fn new(tool_use_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content,
        }
    }
}

/// One turn in a conversation, as stored by the Saga and passed to the agent
/// loop. `timestamp` and `token_estimate` are computed once at append time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    #[serde(with = "crate::types::unix_time")]
    pub timestamp: std::time::SystemTime,
    pub token_estimate: usize,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        let token_estimate = content
            .iter()
            .map(|b| match b {
                ContentBlock::Text(t) => crate::context::estimate_tokens_str(&t.text),
                ContentBlock::ToolUse(t) => crate::context::estimate_tokens_str(&t.input.to_string()),
                ContentBlock::ToolResult(t) => crate::context::estimate_tokens_str(&t.content.to_string()),
            })
            .sum();

        Self {
            role,
            content,
            timestamp: std::time::SystemTime::now(),
            token_estimate,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self::new(
            MessageRole::Tool,
            vec![ContentBlock::ToolResult(ToolResultBlock::new(tool_use_id, content))],
        )
    }

    /// Flattened text content, ignoring tool blocks. Used when assembling a
    /// plain-text prompt for a model that has no structured tool-call support.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

mod unix_time {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let secs = t
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        secs.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_secs_f64(secs.max(0.0)))
    }
}

// ============================================================================
// WIRE FORMAT: generation HTTP protocol (JSON-lines streaming, Ollama-style)
// ============================================================================

/// `GET /api/version` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaVersionResponse {
    pub version: String,
}

/// `GET /api/tags` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub details: OllamaModelDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaModelDetails {
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

impl From<OllamaModelInfo> for ModelEntry {
    fn from(m: OllamaModelInfo) -> Self {
        ModelEntry {
            name: m.name,
            size: m.size,
            parameter_size: m.details.parameter_size,
            quantization_level: m.details.quantization_level,
        }
    }
}

/// `POST /api/generate` request body.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaGenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
}

/// One line of a streamed `/api/generate` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaGenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub prompt_eval_duration: u64,
    /// Nanoseconds spent loading the model before generation began, reported
    /// on the final `done:true` frame only.
    #[serde(default)]
    pub load_duration: u64,
}

/// A message as sent to/received from `/api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// `POST /api/chat` request body.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
}

/// `POST /api/chat` response (non-streaming; one frame when `stream: false`).
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaChatResponse {
    pub message: OllamaChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
}

/// `POST /api/pull` request body.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaPullRequest {
    pub model: String,
}

/// One line of a streamed `/api/pull` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaPullStatus {
    pub status: String,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Result of [`crate::client::Client::benchmark`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub prompt_tokens: u32,
    pub generated_tokens: u32,
    pub total_duration: std::time::Duration,
    pub load_duration: std::time::Duration,
    pub prompt_eval_tokens_per_second: f64,
    pub generation_tokens_per_second: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_validation() {
        assert!(ModelName::new("qwen2.5:7b").is_ok());
        assert!(ModelName::new("").is_err());
        assert!(ModelName::new("   ").is_err());
    }

    #[test]
    fn test_model_name_family() {
        let m = ModelName::new("llama3:8b-instruct").unwrap();
        assert_eq!(m.family(), "llama3");
    }

    #[test]
    fn test_base_url_validation() {
        assert!(BaseUrl::new("http://localhost:11434").is_ok());
        assert!(BaseUrl::new("localhost:11434").is_err());
        assert!(BaseUrl::new("").is_err());
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let url = BaseUrl::new("http://localhost:11434/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434");
    }

    #[test]
    fn test_temperature_validation() {
        assert!(Temperature::new(0.0).is_ok());
        assert!(Temperature::new(2.0).is_ok());
        assert!(Temperature::new(-0.1).is_err());
        assert!(Temperature::new(2.1).is_err());
    }

    #[test]
    fn test_tier_ordinal_and_tiebreak() {
        assert!(Tier::Fast.ordinal() < Tier::Deep.ordinal());
        assert!(Tier::Deep.ordinal() < Tier::Analysis.ordinal());
        assert!(Tier::Analysis.ordinal() < Tier::Writing.ordinal());
    }

    #[test]
    fn test_host_status_serves() {
        let host = Host::new("a", "http://localhost:11434");
        let status = HostStatus::online(
            host,
            std::time::Duration::from_millis(5),
            "0.1.0".into(),
            vec![ModelEntry {
                name: "llama3:8b".into(),
                size: 0,
                parameter_size: String::new(),
                quantization_level: String::new(),
            }],
        );
        assert!(status.serves("llama3:8b"));
        assert!(!status.serves("llama3:70b"));
    }

    #[test]
    fn test_host_status_offline_never_serves() {
        let host = Host::new("b", "http://localhost:11435");
        let status = HostStatus::offline(host, "connection refused");
        assert!(!status.serves("anything"));
    }

    #[test]
    fn test_tournament_result_tokens_per_second() {
        let r = TournamentResult {
            host: "a".into(),
            model: "m".into(),
            response: "hi".into(),
            duration: std::time::Duration::from_secs(2),
            eval_count: 20,
            error: None,
        };
        assert_eq!(r.tokens_per_second(), 10.0);
    }

    #[test]
    fn test_tournament_result_errored_has_zero_throughput() {
        let r = TournamentResult {
            host: "a".into(),
            model: "m".into(),
            response: String::new(),
            duration: std::time::Duration::from_secs(2),
            eval_count: 20,
            error: Some("timeout".into()),
        };
        assert_eq!(r.tokens_per_second(), 0.0);
    }

    #[test]
    fn test_tournament_parallel_speedup() {
        let t = Tournament {
            prompt: "hi".into(),
            results: vec![
                TournamentResult {
                    host: "a".into(),
                    model: "m1".into(),
                    response: "x".into(),
                    duration: std::time::Duration::from_secs(4),
                    eval_count: 1,
                    error: None,
                },
                TournamentResult {
                    host: "b".into(),
                    model: "m2".into(),
                    response: "y".into(),
                    duration: std::time::Duration::from_secs(2),
                    eval_count: 1,
                    error: None,
                },
            ],
            champion_index: Some(1),
            wall_clock: std::time::Duration::from_secs(4),
        };
        assert_eq!(t.parallel_speedup(), 1.5);
        assert_eq!(t.champion().unwrap().host, "b");
    }

    #[test]
    fn test_message_token_estimate_nonzero_for_text() {
        let msg = Message::user("hello world this is a test message");
        assert!(msg.token_estimate > 0);
    }

    #[test]
    fn test_message_text_content_ignores_tool_blocks() {
        let msg = Message::assistant(vec![
            ContentBlock::text("hello"),
            ContentBlock::ToolUse(ToolUseBlock::new("1", "search", serde_json::json!({}))),
        ]);
        assert_eq!(msg.text_content(), "hello");
    }

    #[test]
    fn test_ollama_model_info_to_model_entry() {
        let info = OllamaModelInfo {
            name: "llama3:8b".into(),
            size: 4_000_000_000,
            details: OllamaModelDetails {
                parameter_size: "8B".into(),
                quantization_level: "Q4_0".into(),
            },
        };
        let entry: ModelEntry = info.into();
        assert_eq!(entry.name, "llama3:8b");
        assert_eq!(entry.parameter_size, "8B");
    }

    #[test]
    fn test_generation_chunk_defaults_when_fields_absent() {
        let chunk: OllamaGenerateChunk = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert_eq!(chunk.response, "hi");
        assert!(!chunk.done);
        assert_eq!(chunk.eval_count, 0);
    }

    #[test]
    fn test_message_round_trips_through_json() {
        let msg = Message::user("ping");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, MessageRole::User);
        assert_eq!(back.text_content(), "ping");
    }
}
