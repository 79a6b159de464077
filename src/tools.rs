//! Tool system for the agent loop (C9).
//!
//! Unlike a general function-calling SDK, this registry accepts a
//! deliberately restricted subset of JSON Schema: top-level properties of
//! type `string`, `number`, or `boolean` only, no nesting. A schema that
//! tries to describe an object or array property is rejected at
//! registration, before it ever reaches a model (§4.9). This keeps every
//! tool call's arguments trivially validatable and keeps the wire format
//! compatible with `/api/chat`'s `tools` field, which mirrors OpenAI's
//! function-calling shape.

use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A tool handler: takes the call's JSON arguments, returns a JSON result.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

const ALLOWED_TYPES: [&str; 3] = ["string", "number", "boolean"];

/// A tool's callable definition: name, description, flat parameter schema,
/// and handler. Cloning is cheap (the handler is an `Arc`).
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
}

impl Tool {
    /// Builds a tool from a raw JSON Schema object. `schema` must be either
    /// a flat map of `name -> "string"|"number"|"boolean"`, or a full
    /// `{"type":"object","properties":{...}}` document whose properties are
    /// each one of those three primitive types. Anything else (nested
    /// objects, arrays, unknown types) is rejected here rather than at
    /// call time.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let input_schema = normalize_schema(&schema)?;
        Ok(Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        })
    }

    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub async fn invoke(&self, args: Value) -> Result<Value> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Validates and normalizes a schema into `{"type":"object","properties":{...},"required":[...]}`.
fn normalize_schema(schema: &Value) -> Result<Value> {
    let properties = if let Some(obj) = schema.as_object() {
        if obj.get("type").and_then(Value::as_str) == Some("object") {
            obj.get("properties")
                .and_then(Value::as_object)
                .ok_or_else(|| Error::bad_input("schema with type=object must carry a properties map"))?
                .clone()
        } else {
            obj.clone()
        }
    } else {
        return Err(Error::bad_input("tool schema must be a JSON object"));
    };

    let mut normalized = serde_json::Map::new();
    let mut required = Vec::new();

    for (key, value) in &properties {
        let (type_name, description, optional) = match value {
            Value::String(s) => (s.clone(), None, false),
            Value::Object(prop) => {
                let type_name = prop
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::bad_input(format!("parameter {key} missing a type")))?
                    .to_string();
                let description = prop.get("description").and_then(Value::as_str).map(str::to_string);
                let optional = prop.get("optional").and_then(Value::as_bool).unwrap_or(false);
                (type_name, description, optional)
            }
            _ => return Err(Error::bad_input(format!("parameter {key} has an unsupported schema shape"))),
        };

        if !ALLOWED_TYPES.contains(&type_name.as_str()) {
            return Err(Error::bad_input(format!(
                "parameter {key} has type {type_name}, only string/number/boolean are allowed"
            )));
        }

        let mut entry = serde_json::json!({ "type": type_name });
        if let Some(d) = description {
            entry["description"] = Value::String(d);
        }
        normalized.insert(key.clone(), entry);

        if !optional {
            required.push(Value::String(key.clone()));
        }
    }

    Ok(serde_json::json!({
        "type": "object",
        "properties": Value::Object(normalized),
        "required": required,
    }))
}

/// Builder for the common case of a handful of flat parameters.
pub struct ToolBuilder {
    name: String,
    description: String,
    params: serde_json::Map<String, Value>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Adds a required flat parameter. `type_str` must be one of
    /// `"string"`, `"number"`, `"boolean"`.
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        self.params.insert(name.to_string(), Value::String(type_str.to_string()));
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Result<Tool>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, Value::Object(self.params), handler)
    }
}

pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

/// Commands whose execution is refused outright regardless of arguments.
/// Matched as a substring after trimming/lowercasing, which is deliberately
/// coarse: the goal is to block the obviously catastrophic, not to sandbox
/// arbitrary shell input.
const SHELL_DENYLIST: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "rm -rf *",
    "mkfs",
    ":(){ :|:& };:",
    "dd if=/dev/zero",
    "dd of=/dev/sda",
    "> /dev/sda",
    "chmod -r 000 /",
];

fn denylisted(command: &str) -> Option<&'static str> {
    let normalized = command.to_lowercase();
    SHELL_DENYLIST.iter().find(|pattern| normalized.contains(&pattern.to_lowercase())).copied()
}

fn truncate_with_marker(mut s: String, cap: usize) -> String {
    if s.len() <= cap {
        return s;
    }
    let mut boundary = cap.min(s.len());
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    s.truncate(boundary);
    s.push_str("\n(truncated)");
    s
}

/// The built-in shell-execute tool: runs a command via `/bin/sh -c`, subject
/// to the denylist, with its combined output capped at `output_cap` bytes.
pub fn shell_execute_tool(output_cap: usize) -> Result<Tool> {
    Tool::new(
        "shell_execute",
        "Run a shell command and return its combined stdout/stderr.",
        serde_json::json!({ "command": "string" }),
        move |args: Value| {
            let cap = output_cap;
            async move {
                let command = args
                    .get("command")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::bad_input("shell_execute requires a command argument"))?;

                if let Some(pattern) = denylisted(command) {
                    return Err(Error::tool_blocked(format!(
                        "command matched denylisted pattern: {pattern}"
                    )));
                }

                let output = tokio::process::Command::new("/bin/sh")
                    .arg("-c")
                    .arg(command)
                    .output()
                    .await
                    .map_err(|e| Error::tool_failed(e.to_string()))?;

                let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));

                if !output.status.success() {
                    return Err(Error::tool_failed(format!(
                        "command exited with {}: {}",
                        output.status,
                        truncate_with_marker(combined, cap)
                    )));
                }

                Ok(Value::String(truncate_with_marker(combined, cap)))
            }
        },
    )
}

/// The built-in file-read tool, capped at `read_cap` bytes.
pub fn read_file_tool(read_cap: usize) -> Result<Tool> {
    Tool::new(
        "read_file",
        "Read a text file from disk and return its contents.",
        serde_json::json!({ "path": "string" }),
        move |args: Value| {
            let cap = read_cap;
            async move {
                let path = args
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::bad_input("read_file requires a path argument"))?;

                let contents = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::tool_failed(e.to_string()))?;

                Ok(Value::String(truncate_with_marker(contents, cap)))
            }
        },
    )
}

/// A fixed registry of tools keyed by name, handed to the agent loop.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn schemas(&self) -> Vec<Tool> {
        self.tools.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatches a call by name, mapping an unknown tool name to
    /// *ToolFailed* rather than panicking (the model hallucinated a tool).
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => Err(Error::tool_failed(format!("no such tool: {name}"))),
        }
    }
}
