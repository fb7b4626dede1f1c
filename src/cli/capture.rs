//! `solkit capture`: fetch items and their dependencies into a solution.
//!
//! ```bash
//! solkit capture 6f2a91c0 --name "Field survey" --output survey.json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use super::common::portal_client;
use crate::capture::{capture_solution, freeze_items};
use crate::handlers::HandlerRegistry;
use crate::solution::Solution;
use crate::utils::Spinner;

#[derive(Args, Debug)]
pub struct CaptureCommand {
    /// Identifiers of the items to capture
    #[arg(required = true)]
    ids: Vec<String>,

    /// Solution name (defaults to the first item's title)
    #[arg(long)]
    name: Option<String>,

    /// Where to write the solution file
    #[arg(short, long, default_value = "solution.json")]
    output: PathBuf,

    /// Portal to capture from (defaults to `default_portal`)
    #[arg(long)]
    portal: Option<String>,
}

impl CaptureCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let global = config.load_global_config().await?;
        let client = portal_client(&global, self.portal.as_deref())?;
        let registry = HandlerRegistry::with_defaults();

        let spinner =
            Spinner::new(format!("Capturing {} item(s)", self.ids.len()), !config.no_progress);
        let captured = capture_solution(&client, &registry, &self.ids).await;
        spinner.finish_and_clear();
        let mut capture = captured?;

        freeze_items(&mut capture.items, &registry);
        let name = self
            .name
            .or_else(|| capture.items.first().map(|item| item.title.clone()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "solution".to_string());
        let solution = Solution::new(name, capture.items).with_external(capture.external);
        solution.save(&self.output)?;

        println!(
            "{} Captured {} item(s) into {}",
            "✓".green(),
            solution.items.len(),
            self.output.display()
        );
        if !solution.external.is_empty() {
            println!(
                "{} {} reference(s) left pointing at the source portal: {}",
                "!".yellow(),
                solution.external.len(),
                solution.external.join(", ")
            );
        }
        Ok(())
    }
}
