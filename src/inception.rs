//! Inception Pipeline (C7): lets a primary model's stream embed synchronous
//! calls to expert models via `<sub-query model="ALIAS">PROMPT</sub-query>`
//! markers (§4.7). This is the hardest subcomponent in the core; the
//! tokenizer is kept as a pure, synchronous state machine ([`SubQueryTokenizer`])
//! so its ordering/atomicity invariants can be unit-tested without a mock
//! server, and the async plumbing around it stays thin.

use crate::client::GenerationClient;
use crate::types::{InceptionEvent, SubQuery};
use crate::{Error, Result};
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const OPEN_MARKER: &str = "<sub-query";
const CLOSE_MARKER: &str = "</sub-query>";
/// Bound on the primary-stream channel; backpressures the producer task
/// when the processor falls behind (e.g. while awaiting an expert call).
const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Passthrough,
    OpeningTag,
    InSubQuery { alias: String },
}

/// One event produced by [`SubQueryTokenizer::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Text(String),
    SubQuery(SubQuery),
}

/// Incrementally splits a raw character stream into passthrough text and
/// parsed sub-queries. See §4.7 for the algorithm this implements.
#[derive(Debug, Default)]
pub struct SubQueryTokenizer {
    buffer: String,
    state: State,
}

impl Default for State {
    fn default() -> Self {
        State::Passthrough
    }
}

impl SubQueryTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk, returning every event it completed. Call
    /// [`Self::finish`] once the primary stream ends to flush any dangling
    /// partial sub-query as literal text.
    pub fn feed(&mut self, chunk: &str) -> Vec<TokenEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        loop {
            match &self.state {
                State::Passthrough => {
                    if let Some(pos) = self.buffer.find(OPEN_MARKER) {
                        if pos > 0 {
                            events.push(TokenEvent::Text(self.buffer[..pos].to_string()));
                        }
                        self.buffer.drain(..pos);
                        self.state = State::OpeningTag;
                    } else {
                        let withhold = partial_suffix_len(&self.buffer, OPEN_MARKER);
                        let emit_upto = self.buffer.len() - withhold;
                        if emit_upto > 0 {
                            events.push(TokenEvent::Text(self.buffer[..emit_upto].to_string()));
                            self.buffer.drain(..emit_upto);
                        }
                        break;
                    }
                }
                State::OpeningTag => {
                    if let Some(close_pos) = self.buffer.find('>') {
                        let tag = self.buffer[..=close_pos].to_string();
                        let alias = parse_alias(&tag).unwrap_or_default();
                        self.buffer.drain(..=close_pos);
                        self.state = State::InSubQuery { alias };
                    } else {
                        break;
                    }
                }
                State::InSubQuery { alias } => {
                    if let Some(close_pos) = self.buffer.find(CLOSE_MARKER) {
                        let inner = self.buffer[..close_pos].to_string();
                        let alias = alias.clone();
                        self.buffer.drain(..close_pos + CLOSE_MARKER.len());
                        self.state = State::Passthrough;
                        events.push(TokenEvent::SubQuery(SubQuery { alias, prompt: inner }));
                    } else {
                        break;
                    }
                }
            }
        }

        events
    }

    /// Flushes any bytes still buffered (an unterminated tag or sub-query)
    /// as literal passthrough text (§4.7 step 6).
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() { None } else { Some(self.buffer) }
    }
}

/// Longest suffix of `buffer` that matches a proper prefix of `marker`,
/// i.e. the bytes that must be withheld because they could still grow into
/// a full match on the next chunk.
fn partial_suffix_len(buffer: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(buffer.len());
    for len in (1..=max).rev() {
        if buffer.ends_with(&marker[..len]) {
            return len;
        }
    }
    0
}

fn parse_alias(tag: &str) -> Option<String> {
    let needle = "model=\"";
    let start = tag.find(needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Runs the full pipeline: streams `model` on `primary` with `prompt`,
/// intercepting sub-queries and dispatching each to `expert` resolved
/// through `aliases`. Emits [`InceptionEvent`]s to `on_event` in order.
/// Returns the concatenated passthrough text and the `(alias, answer)` pair
/// for every sub-query that ran, in order — an empty list means no
/// sub-query fired. The caller uses the list to build the one permitted
/// auto-continuation round via [`build_continuation_message`] (§4.7, §9).
pub async fn run(
    primary: &GenerationClient,
    primary_model: &str,
    prompt: &str,
    expert: &GenerationClient,
    aliases: &HashMap<String, String>,
    cancel: CancellationToken,
    mut on_event: impl FnMut(InceptionEvent),
) -> Result<(String, Vec<(String, String)>)> {
    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let mut primary_stream = primary.open_generate_stream(primary_model, prompt, None, None).await?;

    let producer_cancel = cancel.clone();
    let producer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = producer_cancel.cancelled() => break,
                frame = primary_stream.next() => {
                    match frame {
                        Some(Ok(chunk)) => {
                            if !chunk.response.is_empty() && tx.send(chunk.response).await.is_err() {
                                break;
                            }
                            if chunk.done {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
            }
        }
    });

    let mut tokenizer = SubQueryTokenizer::new();
    let mut passthrough = String::new();
    let mut expert_answers = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                producer.abort();
                return Err(Error::Cancelled);
            }
            chunk = rx.recv() => {
                let Some(chunk) = chunk else { break };
                for event in tokenizer.feed(&chunk) {
                    match event {
                        TokenEvent::Text(text) => {
                            passthrough.push_str(&text);
                            on_event(InceptionEvent::Text(text));
                        }
                        TokenEvent::SubQuery(sub) => {
                            let alias = sub.alias.clone();
                            let answer = run_subquery(expert, aliases, sub, cancel.clone(), &mut on_event).await?;
                            expert_answers.push((alias, answer));
                        }
                    }
                }
            }
        }
    }

    if let Some(leftover) = tokenizer.finish() {
        passthrough.push_str(&leftover);
        on_event(InceptionEvent::Text(leftover));
    }

    let _ = producer.await;

    Ok((passthrough, expert_answers))
}

/// Dispatches one sub-query to the expert client, forwarding its streamed
/// chunks as [`InceptionEvent`]s, and returns the expert's full answer text
/// so the caller can bundle it into a continuation message.
async fn run_subquery(
    expert: &GenerationClient,
    aliases: &HashMap<String, String>,
    sub: SubQuery,
    cancel: CancellationToken,
    on_event: &mut impl FnMut(InceptionEvent),
) -> Result<String> {
    let model = aliases.get(&sub.alias).cloned().unwrap_or_else(|| sub.alias.clone());

    on_event(InceptionEvent::SubQueryStart {
        alias: sub.alias.clone(),
        model: model.clone(),
        prompt: sub.prompt.clone(),
    });

    let mut expert_stream = expert.open_generate_stream(&model, &sub.prompt, None, None).await?;
    let mut answer = String::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            frame = expert_stream.next() => {
                match frame {
                    Some(Ok(chunk)) => {
                        if !chunk.response.is_empty() {
                            answer.push_str(&chunk.response);
                            on_event(InceptionEvent::SubQueryChunk(chunk.response));
                        }
                        if chunk.done {
                            break;
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }
        }
    }

    on_event(InceptionEvent::SubQueryEnd);
    Ok(answer)
}

/// Builds the synthetic continuation message bundling expert responses,
/// per §4.7's auto-continuation (bounded to one round, §9 open question).
pub fn build_continuation_message(expert_answers: &[(String, String)]) -> String {
    let mut msg = String::from("Here are the expert answers you requested:\n\n");
    for (alias, answer) in expert_answers {
        msg.push_str(&format!("[{alias}]: {answer}\n"));
    }
    msg.push_str("\nPlease continue your answer using this information.");
    msg
}
