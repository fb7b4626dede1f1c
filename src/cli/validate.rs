//! `solkit validate`: check a solution before deploying it.
//!
//! Exits with an error when any issue is found, so it can gate CI.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::load_solution;
use crate::handlers::HandlerRegistry;
use crate::solution::validate;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Solution file
    solution: PathBuf,

    /// Print the build order when the solution is valid
    #[arg(long)]
    show_order: bool,
}

impl ValidateCommand {
    pub fn execute(self) -> Result<()> {
        let solution = load_solution(&self.solution)?;
        let registry = HandlerRegistry::with_defaults();
        let report = validate(&solution, &registry);

        if !report.is_valid() {
            for issue in &report.issues {
                println!("  {} {issue}", "✗".red());
            }
            bail!("{} issue(s) found in {}", report.issues.len(), self.solution.display());
        }

        println!(
            "{} {} is valid ({} item(s))",
            "✓".green(),
            self.solution.display(),
            solution.items.len()
        );
        if self.show_order
            && let Some(order) = &report.order
        {
            println!("Build order: {}", order.join(" → "));
        }
        Ok(())
    }
}
