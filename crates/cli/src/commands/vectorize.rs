//! Vectorize command handler.
//!
//! Extracts a PDF (or a directory of PDFs) or a web page and appends it to
//! the knowledge base.

use crate::commands::{install_engine, print_json};
use clap::{Args, Subcommand};
use ragbasics_core::{config::AppConfig, AppResult};
use ragbasics_knowledge::{
    EmbeddingEngine, ProgressEvent, ProgressReporter, SourceKind, VectorizeOptions,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Add a source to the knowledge base
#[derive(Args, Debug)]
pub struct VectorizeCommand {
    #[command(subcommand)]
    pub source: VectorizeSource,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Hide progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum VectorizeSource {
    /// A PDF file, or a directory searched recursively for PDFs
    Pdf {
        /// Path to the file or directory
        path: PathBuf,
    },
    /// A web page; the text of its paragraphs is indexed
    Website {
        /// Page URL
        url: String,
    },
}

impl VectorizeCommand {
    pub async fn execute(&self, config: &AppConfig, base_name: &str) -> AppResult<()> {
        let (kind, source) = match &self.source {
            VectorizeSource::Pdf { path } => (SourceKind::Pdf, path.display().to_string()),
            VectorizeSource::Website { url } => (SourceKind::Website, url.clone()),
        };

        tracing::info!("Executing vectorize command for {} '{}'", kind, source);

        install_engine(&config.workspace, base_name)?;
        let engine = EmbeddingEngine::global()?;

        let progress = if self.quiet || self.json {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: &ProgressEvent| {
                eprintln!("{}", event.format_simple());
            }))
        };

        let options = VectorizeOptions {
            base_name: base_name.to_string(),
            kind,
            source,
        };

        let stats =
            ragbasics_knowledge::vectorize(&config.workspace, &options, &engine, &progress)
                .await?;

        if self.json {
            print_json(&serde_json::json!({
                "base": base_name,
                "documentsCount": stats.documents_count,
                "chunksCount": stats.chunks_count,
                "firstPosition": stats.first_position,
                "indexLen": stats.index_len,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            }))?;
        } else {
            println!(
                "Vectorized {} documents ({} chunks, {} bytes) in {:.2}s; index now holds {} entries",
                stats.documents_count,
                stats.chunks_count,
                stats.bytes_processed,
                stats.duration_secs,
                stats.index_len
            );
        }

        Ok(())
    }
}
