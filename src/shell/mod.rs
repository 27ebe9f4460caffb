// Interactive shell
// Drives INIT -> optional ingestion -> agent construction -> query loop over any
// line-oriented input and output


use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use itertools::Itertools;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::Result;
use crate::agent::{Agent, RetrievalConfig, create_agent, respond};
use crate::chunking::ChunkingConfig;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::ingest::process_files;
use crate::llm::ChatModel;
use crate::vector_store::{VectorIndex, add_chunks, upsert_progress_bar};

pub const WELCOME: &str = "Welcome to the RAG Application!";
pub const ADD_DOCUMENTS_PROMPT: &str = "Do you want to add documents to the vector database? (yes/no): ";
pub const YES_NO_REMINDER: &str = "Please enter 'yes' or 'no'.";
pub const DIRECTORY_PROMPT: &str = "Enter the directory path containing your documents: ";
pub const INVALID_DIRECTORY: &str = "Invalid directory path.";
pub const QUERY_PROMPT: &str = "\nEnter your query (or type 'exit' to quit): ";
pub const GOODBYE: &str = "Goodbye!";

/// Connected remote services the shell works against
pub struct Services {
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn ChatModel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub upsert_batch_size: usize,
    pub show_progress: bool,
}

impl ShellSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            retrieval: config.retrieval.clone(),
            upsert_batch_size: config.pinecone.upsert_batch_size as usize,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The user asked to leave
    Success,
    /// Startup or agent construction failed
    Failure,
}

impl ShellExit {
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

pub enum ShellState {
    OptionalIngest(Services),
    /// Services plus the number of records upserted during this session
    AgentReady(Services, usize),
    QueryLoop(Agent),
    Exit(ShellExit),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
    pub at: DateTime<Utc>,
}

enum YesNo {
    Yes,
    No,
    Exit,
}

pub struct Shell<R, W> {
    input: R,
    output: W,
    settings: ShellSettings,
    history: Vec<ConversationTurn>,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    #[inline]
    pub fn new(input: R, output: W, settings: ShellSettings) -> Self {
        Self {
            input,
            output,
            settings,
            history: Vec::new(),
        }
    }

    /// Run the shell to completion; `init` connects the remote services
    #[inline]
    pub fn run<F>(&mut self, init: F) -> ShellExit
    where
        F: FnOnce() -> Result<Services>,
    {
        let mut state = match self.start(init) {
            Ok(state) => state,
            Err(e) => return io_failure(&e),
        };

        loop {
            let step = match state {
                ShellState::OptionalIngest(services) => self.optional_ingest(services),
                ShellState::AgentReady(services, upserted) => {
                    self.agent_ready(services, upserted)
                }
                ShellState::QueryLoop(agent) => self.query_loop(agent),
                ShellState::Exit(exit) => return exit,
            };
            state = match step {
                Ok(next) => next,
                Err(e) => return io_failure(&e),
            };
        }
    }

    #[inline]
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    #[inline]
    pub fn into_output(self) -> W {
        self.output
    }

    fn start<F>(&mut self, init: F) -> io::Result<ShellState>
    where
        F: FnOnce() -> Result<Services>,
    {
        self.say(WELCOME)?;

        match init() {
            Ok(services) => {
                info!("Initialized vector store and embeddings successfully.");
                Ok(ShellState::OptionalIngest(services))
            }
            Err(e) => {
                error!("Error initializing services: {}", e);
                self.say(&format!("Error initializing services: {}", e))?;
                Ok(ShellState::Exit(ShellExit::Failure))
            }
        }
    }

    fn optional_ingest(&mut self, services: Services) -> io::Result<ShellState> {
        match self.ask_yes_no()? {
            YesNo::Exit => return self.goodbye(),
            YesNo::No => return Ok(ShellState::AgentReady(services, 0)),
            YesNo::Yes => {}
        }

        let Some(directory) = self.prompt(DIRECTORY_PROMPT)? else {
            return self.goodbye();
        };
        if is_exit_command(&directory) {
            return self.goodbye();
        }

        let directory = Path::new(&directory);
        if !directory.is_dir() {
            error!("Invalid directory path provided by user: {}", directory.display());
            self.say(INVALID_DIRECTORY)?;
            return Ok(ShellState::AgentReady(services, 0));
        }

        let upserted = match self.ingest(&services, directory) {
            Ok(count) => {
                info!("Added {} chunks to the vector database successfully.", count);
                self.say("All documents have been added to the vector database.")?;
                count
            }
            Err(e) => {
                error!("Error processing files: {}", e);
                self.say(&format!("Error processing files: {}", e))?;
                0
            }
        };

        Ok(ShellState::AgentReady(services, upserted))
    }

    fn ingest(&mut self, services: &Services, directory: &Path) -> Result<usize> {
        let chunks = process_files(directory, &self.settings.chunking)?;
        self.say(&format!("Processing {} chunks...", chunks.len()))?;

        let progress = if self.settings.show_progress {
            upsert_progress_bar(chunks.len())
        } else {
            ProgressBar::hidden()
        };

        add_chunks(
            services.index.as_ref(),
            services.embedder.as_ref(),
            &chunks,
            self.settings.upsert_batch_size,
            &progress,
        )
    }

    fn agent_ready(&mut self, services: Services, upserted: usize) -> io::Result<ShellState> {
        // Index stats lag behind upserts, so records written this session count too
        let index = match services.index.stats() {
            Ok(stats) if stats.total_vector_count > 0 || upserted > 0 => {
                info!(
                    "Index '{}' holds {} vectors ({} upserted this session), using retrieval",
                    services.index.name(),
                    stats.total_vector_count,
                    upserted
                );
                Some(services.index)
            }
            Ok(_) => {
                info!(
                    "Index '{}' is empty, using conversational fallback",
                    services.index.name()
                );
                None
            }
            Err(e) if upserted > 0 => {
                warn!(
                    "Could not read stats for index '{}', using retrieval over {} upserted records: {}",
                    services.index.name(),
                    upserted,
                    e
                );
                Some(services.index)
            }
            Err(e) => {
                warn!(
                    "Could not read stats for index '{}', using conversational fallback: {}",
                    services.index.name(),
                    e
                );
                None
            }
        };
        let fallback = index.is_none();

        match create_agent(
            index,
            services.embedder,
            services.model,
            &self.settings.retrieval,
        ) {
            Ok(agent) => {
                info!("RAG agent created successfully.");
                self.say("RAG agent is ready for use!")?;
                if fallback {
                    self.say("The vector database is empty; answers will not use your documents.")?;
                }
                Ok(ShellState::QueryLoop(agent))
            }
            Err(e) => {
                error!("Error creating RAG agent: {}", e);
                self.say(&format!("Error creating RAG agent: {}", e))?;
                Ok(ShellState::Exit(ShellExit::Failure))
            }
        }
    }

    fn query_loop(&mut self, mut agent: Agent) -> io::Result<ShellState> {
        loop {
            let Some(query) = self.prompt(QUERY_PROMPT)? else {
                return self.goodbye();
            };
            if is_exit_command(&query) {
                return self.goodbye();
            }
            if query.is_empty() {
                continue;
            }

            match respond(&mut agent, &query) {
                Ok(answer) => {
                    self.say(&format!("Agent: {}", answer.text))?;
                    if !answer.sources.is_empty() {
                        self.say("Sources:")?;
                        for source in &answer.sources {
                            self.say(&format!("- {}", source))?;
                        }
                    }

                    log_conversation(&query, &answer.text, &self.history);
                    self.history.push(ConversationTurn {
                        query,
                        response: answer.text,
                        at: Utc::now(),
                    });
                }
                Err(e) => {
                    error!("Error generating response: {}", e);
                    self.say(&format!("Error generating response: {}", e))?;
                }
            }
        }
    }

    fn ask_yes_no(&mut self) -> io::Result<YesNo> {
        loop {
            let Some(choice) = self.prompt(ADD_DOCUMENTS_PROMPT)? else {
                return Ok(YesNo::Exit);
            };
            match choice.to_lowercase().as_str() {
                "yes" | "y" => return Ok(YesNo::Yes),
                "no" | "n" => return Ok(YesNo::No),
                "exit" | "quit" => return Ok(YesNo::Exit),
                _ => self.say(YES_NO_REMINDER)?,
            }
        }
    }

    fn goodbye(&mut self) -> io::Result<ShellState> {
        self.say(GOODBYE)?;
        info!("User exited the application.");
        Ok(ShellState::Exit(ShellExit::Success))
    }

    /// Print `message` and read one trimmed line; `None` at end of input
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{}", message)
    }
}

fn io_failure(e: &io::Error) -> ShellExit {
    error!("Terminal I/O failed: {}", e);
    ShellExit::Failure
}

#[inline]
fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Render a query, its response and the turns before it for the log
#[inline]
pub fn format_conversation(query: &str, response: &str, history: &[ConversationTurn]) -> String {
    let history = if history.is_empty() {
        "No prior context".to_string()
    } else {
        history
            .iter()
            .map(|turn| format!("User: {} | Agent: {}", turn.query, turn.response))
            .join("\n")
    };

    format!(
        "User query: {}\nAgent response: {}\nConversation history:\n{}",
        query, response, history
    )
}

#[inline]
pub fn log_conversation(query: &str, response: &str, history: &[ConversationTurn]) {
    info!("{}", format_conversation(query, response, history));
}
