//! `solkit order`: print the build order of a solution.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::load_solution;
use crate::graph::{GraphBuilder, TopologicalSorter};
use crate::handlers::HandlerRegistry;

#[derive(Args, Debug)]
pub struct OrderCommand {
    /// Solution file
    solution: PathBuf,

    /// Print the order as a JSON array
    #[arg(long)]
    json: bool,
}

impl OrderCommand {
    pub fn execute(self) -> Result<()> {
        let solution = load_solution(&self.solution)?;
        let registry = HandlerRegistry::with_defaults();
        let graph = GraphBuilder::new(&registry).build(&solution.items);
        let order = TopologicalSorter::new().sort(&graph)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&order)?);
        } else {
            for (position, id) in order.iter().enumerate() {
                let kind = solution.item(id).map(|item| item.kind.as_str()).unwrap_or_default();
                println!("{:>3}. {id} ({kind})", position + 1);
            }
        }
        Ok(())
    }
}
