//! Generation Client (C1): one HTTP connection to one inference host.
//!
//! `GenerationClient` speaks the host's JSON-lines wire protocol (§6) and
//! nothing else — it has no notion of hosts plural, tiers, or routing. It
//! never retries on its own (see [`crate::retry`] for opt-in retry) and never
//! caches; every call is a fresh request.
//!
//! Two timeouts apply depending on the call: a short probe deadline for
//! `version`/`list_models` (the registry's heartbeat, §4.2) and a longer call
//! deadline for generation proper, overridable per call via
//! [`crate::types::GenerationOptions::timeout`].

use crate::tools::Tool;
use crate::types::{
    BaseUrl, BenchmarkResult, ContentBlock, GenerationOptions, Message, MessageRole, ModelEntry,
    OllamaChatMessage, OllamaChatRequest, OllamaChatResponse, OllamaFunctionCall, OllamaGenerateChunk,
    OllamaGenerateRequest, OllamaPullRequest, OllamaPullStatus, OllamaTagsResponse, OllamaToolCall,
    OllamaVersionResponse, TextBlock, ToolUseBlock,
};
use crate::utils::parse_json_lines;
use crate::{Error, Result};
use futures::StreamExt;
use std::time::{Duration, Instant};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// A connection to one inference host.
///
/// Construct one per [`crate::types::Host`]; cheap to clone (the inner
/// `reqwest::Client` is itself a handle around a connection pool).
#[derive(Clone)]
pub struct GenerationClient {
    base_url: BaseUrl,
    http: reqwest::Client,
    probe_timeout: Duration,
    call_timeout: Duration,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: BaseUrl::new(base_url)?,
            http: reqwest::Client::new(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str(), path)
    }

    /// `GET /api/version`. Bounded by the probe deadline — a host that
    /// doesn't answer quickly is unreachable for routing purposes.
    pub async fn version(&self) -> Result<String> {
        let resp = self
            .http
            .get(self.url("/api/version"))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let body: OllamaVersionResponse = resp
            .error_for_status()
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?
            .json()
            .await
            .map_err(|e| Error::protocol(format!("malformed version response: {e}")))?;

        Ok(body.version)
    }

    /// `GET /api/tags`. Bounded by the probe deadline.
    pub async fn list_models(&self) -> Result<Vec<ModelEntry>> {
        let resp = self
            .http
            .get(self.url("/api/tags"))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let body: OllamaTagsResponse = resp
            .error_for_status()
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?
            .json()
            .await
            .map_err(|e| Error::protocol(format!("malformed tags response: {e}")))?;

        Ok(body.models.into_iter().map(ModelEntry::from).collect())
    }

    /// Single-turn generation with no system prompt, default options,
    /// collecting the full response before returning.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        self.generate_with_options(model, prompt, None, None).await
    }

    pub async fn generate_with_system(&self, model: &str, prompt: &str, system: &str) -> Result<String> {
        self.generate_with_options(model, prompt, Some(system), None).await
    }

    pub async fn generate_with_options(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        options: Option<GenerationOptions>,
    ) -> Result<String> {
        let mut text = String::new();
        self.generate_stream(model, prompt, system, options, |chunk| {
            text.push_str(chunk);
        })
        .await?;
        Ok(text)
    }

    /// Like [`Self::generate`] but keeps the `eval_count`/`eval_duration`
    /// tallies from the `done:true` frame instead of discarding them — used
    /// by the tournament executor, which reports tokens/second per result
    /// (§4.6).
    pub async fn generate_with_stats(&self, model: &str, prompt: &str) -> Result<crate::types::GenerateOutcome> {
        let mut stream = self.open_generate_stream(model, prompt, None, None).await?;
        let mut text = String::new();
        let mut eval_count = 0u32;
        let mut eval_duration = Duration::ZERO;
        let mut saw_done = false;

        while let Some(frame) = stream.next().await {
            let chunk = frame?;
            if !chunk.response.is_empty() {
                text.push_str(&chunk.response);
            }
            if chunk.done {
                eval_count = chunk.eval_count;
                eval_duration = Duration::from_nanos(chunk.eval_duration);
                saw_done = true;
                break;
            }
        }

        if !saw_done {
            return Err(Error::truncated(format!(
                "{} closed the stream before done:true",
                self.base_url
            )));
        }

        Ok(crate::types::GenerateOutcome { text, eval_count, eval_duration })
    }

    /// Opens a `/api/generate` stream and returns the raw frame stream
    /// without draining it — used by callers (the inception pipeline) that
    /// need to interleave frame arrival with other async work instead of a
    /// synchronous per-chunk callback.
    pub(crate) async fn open_generate_stream(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        options: Option<GenerationOptions>,
    ) -> Result<std::pin::Pin<Box<dyn futures::Stream<Item = Result<OllamaGenerateChunk>> + Send>>> {
        let timeout = options
            .as_ref()
            .and_then(|o| o.timeout)
            .unwrap_or(self.call_timeout);

        let body = OllamaGenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
            stream: true,
            options,
        };

        let resp = self
            .http
            .post(self.url("/api/generate"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let resp = resp
            .error_for_status()
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        Ok(parse_json_lines::<OllamaGenerateChunk>(resp))
    }

    /// Streams a `/api/generate` call, invoking `on_chunk` once per streamed
    /// text fragment in arrival order — no hidden buffering or concurrency.
    /// Returns the concatenated text once a `done:true` frame is observed; a
    /// stream that closes beforehand is [`Error::Truncated`].
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        options: Option<GenerationOptions>,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<String> {
        let mut stream = self.open_generate_stream(model, prompt, system, options).await?;
        let mut full = String::new();
        let mut saw_done = false;

        while let Some(frame) = stream.next().await {
            let chunk = frame?;
            if !chunk.response.is_empty() {
                on_chunk(&chunk.response);
                full.push_str(&chunk.response);
            }
            if chunk.done {
                saw_done = true;
                break;
            }
        }

        if !saw_done {
            return Err(Error::truncated(format!(
                "{} closed the stream before done:true",
                self.base_url
            )));
        }

        Ok(full)
    }

    /// Non-streaming `/api/chat` call. Returns the assistant's reply as a
    /// [`Message`], possibly carrying one or more tool-use blocks when `tools`
    /// is supplied and the model decides to call one.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[Tool]>,
        options: Option<GenerationOptions>,
    ) -> Result<Message> {
        let timeout = options
            .as_ref()
            .and_then(|o| o.timeout)
            .unwrap_or(self.call_timeout);

        let body = OllamaChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(to_wire_message).collect(),
            stream: false,
            tools: tools.map(|ts| ts.iter().map(Tool::to_openai_format).collect()),
            options,
        };

        let resp = self
            .http
            .post(self.url("/api/chat"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let resp = resp
            .error_for_status()
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let body: OllamaChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::protocol(format!("malformed chat response: {e}")))?;

        if !body.done {
            return Err(Error::truncated(format!(
                "{} returned a non-streaming chat response without done:true",
                self.base_url
            )));
        }

        Ok(from_wire_message(body.message))
    }

    /// Streams a `/api/pull` call, invoking `on_status` once per progress
    /// frame. Returns once the final `status: "success"` frame arrives.
    pub async fn pull(&self, model: &str, mut on_status: impl FnMut(&OllamaPullStatus)) -> Result<()> {
        let body = OllamaPullRequest { model: model.to_string() };

        let resp = self
            .http
            .post(self.url("/api/pull"))
            .timeout(self.call_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let resp = resp
            .error_for_status()
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let mut stream = parse_json_lines::<OllamaPullStatus>(resp);
        let mut succeeded = false;

        while let Some(frame) = stream.next().await {
            let status = frame?;
            succeeded = status.status == "success";
            on_status(&status);
        }

        if !succeeded {
            return Err(Error::truncated(format!(
                "{} closed the pull stream without reporting success",
                self.base_url
            )));
        }

        Ok(())
    }

    /// Runs one generation and reports throughput, for the
    /// `clood preflight`/tournament diagnostics path.
    pub async fn benchmark(&self, model: &str, prompt: &str) -> Result<BenchmarkResult> {
        let start = Instant::now();

        let body = OllamaGenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            system: None,
            stream: true,
            options: None,
        };

        let resp = self
            .http
            .post(self.url("/api/generate"))
            .timeout(self.call_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let resp = resp
            .error_for_status()
            .map_err(|e| Error::unreachable(format!("{}: {e}", self.base_url)))?;

        let mut stream = parse_json_lines::<OllamaGenerateChunk>(resp);
        let mut eval_count = 0u32;
        let mut prompt_eval_count = 0u32;
        let mut eval_duration = Duration::ZERO;
        let mut prompt_eval_duration = Duration::ZERO;
        let mut load_duration = Duration::ZERO;
        let mut saw_done = false;

        while let Some(frame) = stream.next().await {
            let chunk = frame?;
            if chunk.done {
                eval_count = chunk.eval_count;
                prompt_eval_count = chunk.prompt_eval_count;
                eval_duration = Duration::from_nanos(chunk.eval_duration);
                prompt_eval_duration = Duration::from_nanos(chunk.prompt_eval_duration);
                load_duration = Duration::from_nanos(chunk.load_duration);
                saw_done = true;
                break;
            }
        }

        if !saw_done {
            return Err(Error::truncated(format!(
                "{} closed the stream before done:true",
                self.base_url
            )));
        }

        let total_duration = start.elapsed();
        let eval_secs = eval_duration.as_secs_f64();
        let prompt_eval_secs = prompt_eval_duration.as_secs_f64();
        Ok(BenchmarkResult {
            prompt_tokens: prompt_eval_count,
            generated_tokens: eval_count,
            total_duration,
            load_duration,
            prompt_eval_tokens_per_second: if prompt_eval_secs > 0.0 {
                prompt_eval_count as f64 / prompt_eval_secs
            } else {
                0.0
            },
            generation_tokens_per_second: if eval_secs > 0.0 {
                eval_count as f64 / eval_secs
            } else {
                0.0
            },
        })
    }
}

fn to_wire_message(m: &Message) -> OllamaChatMessage {
    let role = match m.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };

    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in &m.content {
        match block {
            ContentBlock::Text(t) => content.push_str(&t.text),
            ContentBlock::ToolUse(t) => tool_calls.push(OllamaToolCall {
                function: OllamaFunctionCall {
                    name: t.name.clone(),
                    arguments: t.input.clone(),
                },
            }),
            ContentBlock::ToolResult(r) => {
                if let Some(s) = r.content.as_str() {
                    content.push_str(s);
                } else {
                    content.push_str(&r.content.to_string());
                }
            }
        }
    }

    OllamaChatMessage {
        role: role.to_string(),
        content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
    }
}

fn from_wire_message(m: OllamaChatMessage) -> Message {
    let role = match m.role.as_str() {
        "system" => MessageRole::System,
        "assistant" => MessageRole::Assistant,
        "tool" => MessageRole::Tool,
        _ => MessageRole::User,
    };

    let mut blocks = Vec::new();
    if !m.content.is_empty() {
        blocks.push(ContentBlock::Text(TextBlock::new(m.content)));
    }
    for (i, call) in m.tool_calls.into_iter().flatten().enumerate() {
        blocks.push(ContentBlock::ToolUse(ToolUseBlock::new(
            format!("call_{i}"),
            call.function.name,
            call.function.arguments,
        )));
    }

    Message::new(role, blocks)
}
