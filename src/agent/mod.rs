// Answer generation
// A retrieval agent conditions the model on indexed chunks; a conversational agent
// answers from chat memory alone when the index is empty or unavailable


use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, ChatModel};
use crate::vector_store::{QueryMatch, VectorIndex, search};
use crate::{RagError, Result};

/// Returned in place of an answer when generation fails
pub const APOLOGY: &str = "I'm sorry, something went wrong. Please try again later.";

const RETRIEVAL_SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the \
question at the end. If you don't know the answer, say that you don't know; do not make up \
an answer.";

const CONVERSATION_SYSTEM_PROMPT: &str = "The following is a friendly conversation between a \
human and an AI. The AI is talkative and provides lots of specific details from its context. \
If the AI does not know the answer to a question, it truthfully says it does not know.";

const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Replay the most recent turns verbatim
    #[default]
    Buffer,
    /// Keep a running summary maintained by the model
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub return_sources: bool,
    /// Retrieved text past this many characters is left out of the prompt
    pub max_context_chars: usize,
    pub memory: MemoryKind,
    /// Turns replayed by buffer memory
    pub memory_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            return_sources: false,
            max_context_chars: 12_000,
            memory: MemoryKind::Buffer,
            memory_window: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Chunk texts the answer was conditioned on; empty unless sources were requested
    pub sources: Vec<String>,
}

impl Answer {
    #[inline]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// An answering strategy chosen once, when the agent is built
pub enum Agent {
    Retrieval(RetrievalAgent),
    Conversational(ConversationalAgent),
}

impl Agent {
    #[inline]
    pub fn answer(&mut self, query: &str) -> Result<Answer> {
        match self {
            Self::Retrieval(agent) => agent.answer(query),
            Self::Conversational(agent) => agent.answer(query),
        }
    }

    #[inline]
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Retrieval(_))
    }
}

pub struct RetrievalAgent {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
    return_sources: bool,
    max_context_chars: usize,
}

impl RetrievalAgent {
    #[inline]
    pub fn answer(&self, query: &str) -> Result<Answer> {
        let matches = search(self.index.as_ref(), self.embedder.as_ref(), query, self.top_k)?;
        let used = fit_context(matches, self.max_context_chars);

        let context = used
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let messages = [
            ChatMessage::system(format!("{}\n\n{}", RETRIEVAL_SYSTEM_PROMPT, context)),
            ChatMessage::user(query),
        ];
        let text = self.model.complete(&messages)?;

        let sources = if self.return_sources {
            used.into_iter().map(|m| m.text).collect()
        } else {
            Vec::new()
        };

        Ok(Answer { text, sources })
    }
}

/// Keep whole matches, best first, while their combined text fits in `budget` characters
fn fit_context(matches: Vec<QueryMatch>, budget: usize) -> Vec<QueryMatch> {
    let total = matches.len();
    let mut used_chars = 0;
    let mut kept = Vec::with_capacity(total);

    for m in matches {
        let separator = if kept.is_empty() {
            0
        } else {
            CONTEXT_SEPARATOR.len()
        };
        let len = m.text.chars().count() + separator;
        if used_chars + len > budget {
            break;
        }
        used_chars += len;
        kept.push(m);
    }

    if kept.len() < total {
        info!(
            "Context limited to {} of {} retrieved chunks ({} characters)",
            kept.len(),
            total,
            used_chars
        );
    }
    kept
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    query: String,
    reply: String,
}

/// Rolling memory of prior turns for the conversational agent
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    kind: MemoryKind,
    window: usize,
    turns: VecDeque<Exchange>,
    summary: String,
}

impl ConversationMemory {
    #[inline]
    pub fn new(kind: MemoryKind, window: usize) -> Self {
        Self {
            kind,
            window,
            turns: VecDeque::new(),
            summary: String::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    #[inline]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Messages that replay this memory ahead of a new query
    #[inline]
    pub fn messages(&self) -> Vec<ChatMessage> {
        match self.kind {
            MemoryKind::Buffer => self
                .turns
                .iter()
                .flat_map(|turn| {
                    [
                        ChatMessage::user(turn.query.as_str()),
                        ChatMessage::assistant(turn.reply.as_str()),
                    ]
                })
                .collect(),
            MemoryKind::Summary if self.summary.is_empty() => Vec::new(),
            MemoryKind::Summary => vec![ChatMessage::system(format!(
                "Summary of the conversation so far:\n{}",
                self.summary
            ))],
        }
    }

    /// Remember a completed turn
    ///
    /// Summary memory asks `model` for a new summary; if that fails the previous
    /// summary is kept.
    #[inline]
    pub fn record(&mut self, model: &dyn ChatModel, query: &str, reply: &str) {
        match self.kind {
            MemoryKind::Buffer => {
                if self.window == 0 {
                    return;
                }
                self.turns.push_back(Exchange {
                    query: query.to_string(),
                    reply: reply.to_string(),
                });
                while self.turns.len() > self.window {
                    self.turns.pop_front();
                }
            }
            MemoryKind::Summary => {
                let prompt = format!(
                    "Progressively summarize the lines of conversation provided, adding onto \
                     the previous summary and returning a new summary.\n\n\
                     Current summary:\n{}\n\n\
                     New lines of conversation:\nHuman: {}\nAI: {}\n\n\
                     New summary:",
                    self.summary, query, reply
                );
                match model.complete(&[ChatMessage::user(prompt)]) {
                    Ok(summary) => {
                        debug!("Conversation summary updated");
                        self.summary = summary.trim().to_string();
                    }
                    Err(e) => warn!("Failed to update conversation summary: {}", e),
                }
            }
        }
    }
}

pub struct ConversationalAgent {
    model: Arc<dyn ChatModel>,
    memory: ConversationMemory,
}

impl ConversationalAgent {
    #[inline]
    pub fn answer(&mut self, query: &str) -> Result<Answer> {
        let mut messages = vec![ChatMessage::system(CONVERSATION_SYSTEM_PROMPT)];
        messages.extend(self.memory.messages());
        messages.push(ChatMessage::user(query));

        let text = self.model.complete(&messages)?;
        self.memory.record(self.model.as_ref(), query, &text);

        Ok(Answer::text_only(text))
    }

    #[inline]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }
}

/// Build a retrieval agent when an index is given, otherwise a conversational one
#[inline]
pub fn create_agent(
    index: Option<Arc<dyn VectorIndex>>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    options: &RetrievalConfig,
) -> Result<Agent> {
    if options.top_k == 0 {
        return Err(RagError::Validation(
            "top_k must be greater than zero".to_string(),
        ));
    }

    let agent = match index {
        Some(index) => {
            info!("Creating retrieval agent over index '{}'", index.name());
            Agent::Retrieval(RetrievalAgent {
                index,
                embedder,
                model,
                top_k: options.top_k,
                return_sources: options.return_sources,
                max_context_chars: options.max_context_chars,
            })
        }
        None => {
            info!(
                "Creating conversational agent with {:?} memory",
                options.memory
            );
            Agent::Conversational(ConversationalAgent {
                model,
                memory: ConversationMemory::new(options.memory, options.memory_window),
            })
        }
    };

    Ok(agent)
}

/// Answer `query`, or the apology if anything past input validation fails
///
/// A blank query is a validation error and no remote call is made.
#[inline]
pub fn respond(agent: &mut Agent, query: &str) -> Result<Answer> {
    if query.trim().is_empty() {
        return Err(RagError::Validation("Query must not be empty".to_string()));
    }

    match agent.answer(query) {
        Ok(answer) => Ok(answer),
        Err(e) => {
            error!("Error generating response: {}", e);
            Ok(Answer::text_only(APOLOGY))
        }
    }
}

#[inline]
pub fn generate_response(agent: &mut Agent, query: &str) -> Result<String> {
    respond(agent, query).map(|answer| answer.text)
}
