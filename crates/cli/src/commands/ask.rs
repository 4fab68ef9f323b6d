//! Ask command handler.
//!
//! Answers a question over the configured search index, optionally
//! continuing a conversation read from a JSON history file.

use chatread_core::{config::AppConfig, AppError, AppResult};
use chatread_knowledge::{ChatPipeline, HistoryMessage, HttpSearchIndex, PipelineContext};
use chatread_llm::{create_client, TiktokenMeter};
use chatread_prompt::PromptLibrary;
use clap::Args;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Ask a question grounded in the search index
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask; appended to the history as the final turn
    pub question: Option<String>,

    /// JSON file with prior turns: [{"user": "...", "bot": "..."}, ...]
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Enable streaming (default: true)
    #[arg(long, default_value = "true")]
    pub stream: bool,

    /// Disable streaming
    #[arg(long, conflicts_with = "stream")]
    pub no_stream: bool,

    /// Output as JSON (one object per chunk when streaming)
    #[arg(long)]
    pub json: bool,

    /// Ask the model to suggest follow-up questions
    #[arg(long)]
    pub follow_ups: bool,

    /// Replacement answer instructions; prefix with ">>>" to append instead
    #[arg(long)]
    pub prompt_override: Option<String>,

    /// Temperature for answer generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Number of documents to retrieve
    #[arg(long)]
    pub top: Option<usize>,

    /// Exclude documents of this category
    #[arg(long)]
    pub exclude_category: Option<String>,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        config.validate()?;

        let history = self.load_history()?;
        let context = self.pipeline_context();
        let pipeline = build_pipeline(config)?;

        if self.is_streaming() {
            self.handle_streaming(&pipeline, &history, &context).await
        } else {
            self.handle_non_streaming(&pipeline, &history, &context).await
        }
    }

    /// Handle non-streaming response.
    async fn handle_non_streaming(
        &self,
        pipeline: &ChatPipeline,
        history: &[HistoryMessage],
        context: &PipelineContext,
    ) -> AppResult<()> {
        let answer = pipeline.run(history, context).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            println!("{}", answer.answer);

            for doc in &answer.data_points {
                tracing::debug!(identifier = %doc.identifier, score = doc.score, "Evidence used");
            }
            tracing::debug!("Thoughts:\n{}", answer.thoughts);
        }

        Ok(())
    }

    /// Handle streaming response.
    async fn handle_streaming(
        &self,
        pipeline: &ChatPipeline,
        history: &[HistoryMessage],
        context: &PipelineContext,
    ) -> AppResult<()> {
        let mut stream = pipeline.run_stream(history, context).await?;
        let mut stdout = std::io::stdout();

        while let Some(result) = stream.next().await {
            let chunk = result?;

            if self.json {
                writeln!(stdout, "{}", serde_json::to_string(&chunk)?)?;
            } else {
                if let Some(ref data_points) = chunk.data_points {
                    tracing::debug!(data_points = data_points.len(), "Evidence received");
                }
                write!(stdout, "{}", chunk.answer)?;
            }
            stdout.flush()?;
        }

        if !self.json {
            writeln!(stdout)?;
        }

        Ok(())
    }

    /// Prior turns from `--history` with the question appended.
    fn load_history(&self) -> AppResult<Vec<HistoryMessage>> {
        let mut history: Vec<HistoryMessage> = match self.history {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    AppError::InvalidRequest(format!(
                        "Failed to read history file {:?}: {}",
                        path, e
                    ))
                })?;
                serde_json::from_str(&contents).map_err(|e| {
                    AppError::InvalidRequest(format!(
                        "Failed to parse history file {:?}: {}",
                        path, e
                    ))
                })?
            }
            None => Vec::new(),
        };

        if let Some(ref question) = self.question {
            history.push(HistoryMessage::user(question.clone()));
        }

        if history.is_empty() {
            return Err(AppError::InvalidRequest(
                "No question provided (pass QUESTION or --history)".to_string(),
            ));
        }

        Ok(history)
    }

    fn pipeline_context(&self) -> PipelineContext {
        PipelineContext {
            suggest_followup_questions: self.follow_ups,
            prompt_override: self.prompt_override.clone(),
            temperature: self.temperature,
            top: self.top,
            exclude_category: self.exclude_category.clone(),
        }
    }

    /// Check if streaming is enabled.
    pub fn is_streaming(&self) -> bool {
        !self.no_stream && self.stream
    }
}

/// Wire the pipeline's collaborators from configuration.
fn build_pipeline(config: &AppConfig) -> AppResult<ChatPipeline> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.and_then(|pc| pc.endpoint());
    let timeout = provider_config
        .and_then(|pc| pc.timeout())
        .map(Duration::from_secs);
    let api_key = config.resolve_api_key(&config.provider);

    let llm = create_client(&config.provider, endpoint, api_key.as_deref(), timeout)
        .map_err(AppError::Config)?;

    let meter = TiktokenMeter::new()?.with_limits(config.context_limits());
    let search = HttpSearchIndex::from_config(&config.search)?;
    let prompts = PromptLibrary::load(&config.prompts_dir())?;

    tracing::debug!(
        provider = llm.provider_name(),
        model = %config.model,
        search_url = search.url(),
        "Pipeline ready"
    );

    Ok(
        ChatPipeline::new(llm, Arc::new(search), Arc::new(meter), config.model.clone())
            .with_prompts(prompts),
    )
}
