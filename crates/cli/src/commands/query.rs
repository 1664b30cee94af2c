//! Query command handler.
//!
//! Retrieves the closest chunks for a question and, unless told otherwise,
//! asks the generation model to answer from them. Without `--question` it
//! reads questions from stdin until EOF or `exit`.

use crate::commands::{install_engine, print_json};
use clap::Args;
use futures::StreamExt;
use ragbasics_core::{config::AppConfig, AppError, AppResult};
use ragbasics_knowledge::rag::{answer, ask::build_request};
use ragbasics_knowledge::sources::{source_for_position, SourceLog};
use ragbasics_knowledge::{
    EmbeddingEngine, KnowledgeSource, RetrievalEngine, RetrievalResult,
};
use ragbasics_llm::{create_client, LlmClient};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Ask questions against the knowledge base
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Question to ask; omit to read questions interactively
    #[arg(short, long)]
    pub question: Option<String>,

    /// Number of chunks to retrieve (default: the base's top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Only show retrieved chunks, do not call the generation model
    #[arg(long)]
    pub no_answer: bool,

    /// Print the answer as it is generated
    #[arg(long, conflicts_with_all = ["json", "no_answer"])]
    pub stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig, base_name: &str) -> AppResult<()> {
        tracing::info!("Executing query command for base '{}'", base_name);

        let kb_config = install_engine(&config.workspace, base_name)?;
        let embedder = EmbeddingEngine::global()?;
        let top_k = self.top_k.unwrap_or(kb_config.top_k);

        let engine =
            RetrievalEngine::open(&config.workspace, base_name, embedder).map_err(|e| match e {
                AppError::IndexUnavailable(msg) => AppError::IndexUnavailable(format!(
                    "{}. Run 'ragbasics vectorize' to build the knowledge base first",
                    msg
                )),
                other => other,
            })?;

        let sources = SourceLog::new(&config.workspace, base_name).list()?;

        let llm = if self.no_answer {
            None
        } else {
            config.validate()?;
            Some(create_client(&config.provider, config.endpoint.as_deref())?)
        };

        let session = Session {
            engine,
            sources,
            llm,
            model: config.model.clone(),
            top_k,
            json: self.json,
            stream: self.stream,
        };

        match &self.question {
            Some(question) => session.ask(question).await,
            None => session.interactive().await,
        }
    }
}

struct Session {
    engine: RetrievalEngine,
    sources: Vec<KnowledgeSource>,
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
    top_k: usize,
    json: bool,
    stream: bool,
}

impl Session {
    async fn interactive(&self) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("question> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if question == "exit" || question == "quit" {
                break;
            }

            // One bad question should not end the session.
            if let Err(e) = self.ask(question).await {
                if !matches!(e, AppError::Llm(_) | AppError::Embedding(_)) {
                    return Err(e);
                }
                eprintln!("Error: {}", e);
            }
        }

        Ok(())
    }

    async fn ask(&self, question: &str) -> AppResult<()> {
        let results = self.engine.retrieve(question, self.top_k).await?;

        match &self.llm {
            None => self.print_results(question, &results),
            Some(llm) if self.stream && !results.is_empty() => {
                self.stream_answer(question, &results, llm.as_ref()).await
            }
            Some(llm) => {
                let response = answer(question, &results, llm.as_ref(), &self.model).await?;
                if self.json {
                    print_json(&response)
                } else {
                    println!("{}", response.answer);
                    println!();
                    println!("Sources:");
                    for source in &response.sources {
                        println!(
                            "- #{} {} (distance {:.4})",
                            source.position,
                            self.source_label(source.position),
                            source.distance
                        );
                    }
                    Ok(())
                }
            }
        }
    }

    async fn stream_answer(
        &self,
        question: &str,
        results: &RetrievalResult,
        llm: &dyn LlmClient,
    ) -> AppResult<()> {
        let request = build_request(question, results, &self.model).with_streaming();
        let mut stream = llm.stream(&request).await?;
        let mut stdout = std::io::stdout();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            write!(stdout, "{}", chunk.content)?;
            stdout.flush()?;
            if chunk.done {
                if let Some(usage) = chunk.usage {
                    tracing::debug!("Generation used {} tokens", usage.total_tokens);
                }
                break;
            }
        }
        println!();
        println!();

        println!("Sources:");
        for result in results {
            println!(
                "- #{} {} (distance {:.4})",
                result.chunk.position,
                self.source_label(result.chunk.position),
                result.distance
            );
        }
        Ok(())
    }

    fn print_results(&self, question: &str, results: &RetrievalResult) -> AppResult<()> {
        if self.json {
            return print_json(&serde_json::json!({
                "question": question,
                "results": results,
            }));
        }

        if results.is_empty() {
            println!("No matching chunks.");
            return Ok(());
        }

        for (rank, result) in results.iter().enumerate() {
            println!(
                "{}. #{} {} (distance {:.4})",
                rank + 1,
                result.chunk.position,
                self.source_label(result.chunk.position),
                result.distance
            );
            println!("   {}", result.chunk.text);
        }
        Ok(())
    }

    fn source_label(&self, position: usize) -> &str {
        source_for_position(&self.sources, position)
            .map(|s| s.source.as_str())
            .unwrap_or("unknown source")
    }
}
