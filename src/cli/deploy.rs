//! `solkit deploy`: create a solution's items in a portal.
//!
//! Items are created in build order. Ctrl-C cancels the run: the item in
//! flight finishes its current call, nothing further is started, and the
//! partial report is still written.
//!
//! ```bash
//! solkit deploy survey.json --portal staging --folder survey --report run.json
//! ```

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use super::CliConfig;
use super::common::{load_solution, portal_client};
use crate::constants::MAX_PARALLEL_LIMIT;
use crate::deploy::{DeployOptions, DeploymentDriver, DeploymentReport};
use crate::handlers::HandlerRegistry;
use crate::store::DeployTarget;
use crate::utils::{DeployProgressBar, safe_write};

#[derive(Args, Debug)]
pub struct DeployCommand {
    /// Solution file
    solution: PathBuf,

    /// Target portal (defaults to `default_portal`)
    #[arg(long)]
    portal: Option<String>,

    /// Folder to create the items in
    #[arg(long)]
    folder: Option<String>,

    /// Owner of the created items (defaults to the portal user)
    #[arg(long)]
    owner: Option<String>,

    /// Items created at once within a dependency wave
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=MAX_PARALLEL_LIMIT as i64))]
    max_parallel: Option<u16>,

    /// Per-call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the deployment report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

impl DeployCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let solution = load_solution(&self.solution)?;
        let global = config.load_global_config().await?;
        let client = portal_client(&global, self.portal.as_deref())?;
        let registry = HandlerRegistry::with_defaults();

        let mut options = DeployOptions::default()
            .with_target(DeployTarget {
                folder: self.folder.clone(),
                owner: self.owner.clone(),
            })
            .with_max_concurrency(
                self.max_parallel.map_or(global.max_parallel, usize::from).min(MAX_PARALLEL_LIMIT),
            );
        if let Some(secs) = self.timeout {
            options = options.with_item_timeout(Duration::from_secs(secs));
        }

        let driver = DeploymentDriver::new(&client, &registry).with_options(options);
        let cancel = driver.cancel_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing the current item");
                cancel.cancel();
            }
        });

        let bar = DeployProgressBar::new(!config.no_progress);
        let outcome = driver.deploy(&solution.items, &bar).await;
        interrupt.abort();
        bar.finish_and_clear();
        let report = outcome?;

        if let Some(path) = &self.report {
            safe_write(path, &serde_json::to_string_pretty(&report)?)?;
            tracing::info!("Wrote deployment report to {}", path.display());
        }
        print_report(&report);

        if report.is_success() {
            Ok(())
        } else {
            bail!("Deployment of '{}' incomplete: {}", solution.name, report.summary())
        }
    }
}

fn print_report(report: &DeploymentReport) {
    for id in &report.order {
        if let Some(new_id) = report.deployed.get(id) {
            println!("  {} {id} → {new_id}", "✓".green());
        } else if let Some(failure) = report.failed.get(id) {
            println!("  {} {id}: {}", "✗".red(), failure.reason);
        }
    }
    let summary = report.summary();
    if report.is_success() {
        println!("{} {summary}", "Done:".green().bold());
    } else {
        println!("{} {summary}", "Finished with failures:".red().bold());
    }
}
