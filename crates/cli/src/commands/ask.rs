//! Ask command handler.
//!
//! Runs one question through the same pipeline the HTTP service uses and
//! writes the answer to stdout.

use clap::Args;
use futures::StreamExt;
use rmp_core::{config::AppConfig, AppError, AppResult};
use rmp_knowledge::RagOrchestrator;
use rmp_llm::ChatMessage;
use std::io::Write;
use std::path::PathBuf;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// JSON file with earlier turns (`[{"role": "user", "content": "..."}]`)
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Collect the whole answer before printing
    #[arg(long)]
    pub no_stream: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let conversation = self.conversation()?;
        tracing::debug!("Conversation has {} message(s)", conversation.len());

        let rag = RagOrchestrator::from_config(config).await?;
        let mut stream = rag.handle(conversation).await?;

        let mut stdout = std::io::stdout().lock();

        if self.no_stream {
            let mut answer = Vec::new();
            while let Some(chunk) = stream.next().await {
                answer.extend_from_slice(&chunk?);
            }
            stdout.write_all(&answer)?;
            writeln!(stdout)?;
            return Ok(());
        }

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
                Err(e) => {
                    writeln!(stdout)?;
                    return Err(e);
                }
            }
        }
        writeln!(stdout)?;

        Ok(())
    }

    /// Earlier turns from `--history` followed by the question.
    fn conversation(&self) -> AppResult<Vec<ChatMessage>> {
        let mut messages = match &self.history {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
                })?;
                serde_json::from_str::<Vec<ChatMessage>>(&raw).map_err(|e| {
                    AppError::InvalidRequest(format!("Malformed history file {:?}: {}", path, e))
                })?
            }
            None => Vec::new(),
        };

        messages.push(ChatMessage::user(self.question.clone()));
        Ok(messages)
    }
}
