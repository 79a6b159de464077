//! Saga Session Store (C8): a per-project persistent chat transcript with
//! context-budget accounting and slash commands.
//!
//! Persistence is a single JSON document per project, written atomically
//! (temp file + rename, §4.8) so a crash mid-write can never leave a
//! partially-valid file on disk. A `.cloodignore` sentinel in the project
//! root disables saga creation for that directory entirely.

use crate::context::estimate_tokens;
use crate::types::{ContentBlock, Message, MessageRole};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SAGA_DIR: &str = ".clood";
const SAGA_FILE: &str = "saga.json";
const IGNORE_FILE: &str = ".cloodignore";

/// A project's persisted chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saga {
    pub name: String,
    pub project_path: PathBuf,
    pub created_at: std::time::SystemTime,
    pub updated_at: std::time::SystemTime,
    pub messages: Vec<Message>,
    pub project_context: Option<String>,
}

/// Usage statistics reported by `/stats` and `/context`.
#[derive(Debug, Clone, Serialize)]
pub struct SagaStats {
    pub history_tokens: usize,
    pub context_tokens: usize,
    pub total_tokens: usize,
    pub max_tokens: usize,
    pub usage_percent: f32,
    pub message_count: usize,
}

/// The outcome of handling a slash command.
#[derive(Debug, Clone)]
pub enum SlashOutcome {
    Saved(PathBuf),
    Cleared,
    Stats(SagaStats),
    ContextShown(Option<String>),
    Help(&'static str),
    Quit,
}

const HELP_TEXT: &str =
    "Commands: /save <path>, /clear, /stats, /context, /help, /quit";

impl Saga {
    /// Loads the saga for `project_path`, creating a fresh one if none
    /// exists. Returns `Ok(None)` if `.cloodignore` is present (saga
    /// creation is disabled for this project).
    pub fn load_or_create(project_path: impl AsRef<Path>) -> Result<Option<Self>> {
        let project_path = project_path.as_ref();

        if project_path.join(IGNORE_FILE).exists() {
            return Ok(None);
        }

        let saga_path = project_path.join(SAGA_DIR).join(SAGA_FILE);

        if saga_path.exists() {
            return Self::load(&saga_path).map(Some);
        }

        let now = std::time::SystemTime::now();
        let name = project_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "saga".to_string());

        Ok(Some(Self {
            name,
            project_path: project_path.to_path_buf(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            project_context: None,
        }))
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::corrupt_saga(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| Error::corrupt_saga(e.to_string()))
    }

    /// Atomically persists the saga to `<project_path>/.clood/saga.json`
    /// via write-temp-then-rename.
    pub fn save(&self) -> Result<()> {
        let dir = self.project_path.join(SAGA_DIR);
        std::fs::create_dir_all(&dir)?;

        let final_path = dir.join(SAGA_FILE);
        let tmp_path = dir.join(format!("{SAGA_FILE}.tmp"));

        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &final_path)?;

        Ok(())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.append(Message::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.append(Message::assistant(vec![ContentBlock::text(text)]));
    }

    fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = std::time::SystemTime::now();
    }

    /// The prompt history sent to the model: project context (if any)
    /// prepended, then the last `window` messages in chronological order.
    /// Never reorders messages.
    pub fn assemble_prompt(&self, window: usize) -> Vec<Message> {
        let mut out = Vec::new();

        if let Some(ctx) = &self.project_context {
            out.push(Message::system(ctx.clone()));
        }

        let start = self.messages.len().saturating_sub(window);
        out.extend_from_slice(&self.messages[start..]);
        out
    }

    pub fn stats(&self, ceiling: usize) -> SagaStats {
        let history_tokens = estimate_tokens(&self.messages);
        let context_tokens = self
            .project_context
            .as_ref()
            .map(|c| (c.len() + 3) / 4)
            .unwrap_or(0);
        let total_tokens = history_tokens + context_tokens;
        let usage_percent = if ceiling > 0 {
            (total_tokens as f32 / ceiling as f32) * 100.0
        } else {
            0.0
        };

        SagaStats {
            history_tokens,
            context_tokens,
            total_tokens,
            max_tokens: ceiling,
            usage_percent,
            message_count: self.messages.len(),
        }
    }

    /// True once usage crosses `threshold` (e.g. 0.8 for 80%); the caller
    /// surfaces this as a warning but the store never truncates on its own.
    pub fn is_approaching_limit(&self, ceiling: usize, threshold: f32) -> bool {
        let stats = self.stats(ceiling);
        stats.usage_percent / 100.0 > threshold
    }

    /// Handles one of the fixed slash commands. Returns `Ok(None)` if
    /// `input` isn't a recognized slash command at all.
    pub fn handle_slash(&mut self, input: &str, ceiling: usize) -> Result<Option<SlashOutcome>> {
        let input = input.trim();
        if !input.starts_with('/') {
            return Ok(None);
        }

        let mut parts = input.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        match command {
            "/save" => {
                if arg.is_empty() {
                    return Err(Error::bad_input("/save requires a path argument"));
                }
                let path = PathBuf::from(arg);
                self.save_to(&path)?;
                Ok(Some(SlashOutcome::Saved(path)))
            }
            "/clear" => {
                self.messages.clear();
                self.updated_at = std::time::SystemTime::now();
                Ok(Some(SlashOutcome::Cleared))
            }
            "/stats" => Ok(Some(SlashOutcome::Stats(self.stats(ceiling)))),
            "/context" => Ok(Some(SlashOutcome::ContextShown(self.project_context.clone()))),
            "/help" => Ok(Some(SlashOutcome::Help(HELP_TEXT))),
            "/quit" => Ok(Some(SlashOutcome::Quit)),
            other => Err(Error::bad_input(format!("unknown command: {other}"))),
        }
    }
}

/// Renders messages with plain role prefixes for a non-chat-API transport
/// (unused by the router path, but handy for debugging/`--json` dumps).
pub fn render_plain(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        out.push_str(m.role.as_str());
        out.push_str(": ");
        out.push_str(&m.text_content());
        out.push('\n');
    }
    out
}
