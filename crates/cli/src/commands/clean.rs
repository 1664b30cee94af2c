//! Clean command handler.

use clap::Args;
use ragbasics_core::{config::AppConfig, AppResult};

/// Remove the knowledge base's index, chunks and sources log
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub async fn execute(&self, config: &AppConfig, base_name: &str) -> AppResult<()> {
        tracing::info!("Executing clean command for base '{}'", base_name);

        ragbasics_knowledge::clean(&config.workspace, base_name)?;

        println!("Knowledge base '{}' cleaned", base_name);
        Ok(())
    }
}
