//! Stats command handler.

use crate::commands::print_json;
use clap::Args;
use ragbasics_core::{config::AppConfig, AppResult};

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig, base_name: &str) -> AppResult<()> {
        tracing::info!("Executing stats command for base '{}'", base_name);

        let stats = ragbasics_knowledge::stats(&config.workspace, base_name)?;

        if self.json {
            return print_json(&stats);
        }

        println!("Knowledge base: {}", stats.base_name);
        println!("  Index entries: {}", stats.index_entries);
        match stats.dimension {
            Some(dim) => println!("  Dimension: {}", dim),
            None => println!("  Dimension: (unbound)"),
        }
        println!("  Chunk store records: {}", stats.store_records);
        if !stats.consistent {
            println!("  Warning: index and chunk store lengths differ");
        }
        println!("  Sources: {}", stats.sources_count);
        println!("  Index size: {} bytes", stats.index_size_bytes);
        if let Some(last) = stats.last_indexed_at {
            println!("  Last indexed: {}", last);
        }

        Ok(())
    }
}
