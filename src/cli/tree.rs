//! `solkit tree`: show what each top-level item is built from.
//!
//! # Output
//!
//! ```text
//! wma (Web Mapping Application)
//! └── map (Web Map)
//!     └── svc (Feature Service)
//! ```
//!
//! Items shared by several parents appear under each of them. With
//! `--strict`, a dependency that is not part of the solution is an error;
//! otherwise it is listed after the tree.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{OutputFormat, load_solution};
use crate::graph::{HierarchyNode, Strictness, hierarchy};
use crate::solution::Solution;

#[derive(Args, Debug)]
pub struct TreeCommand {
    /// Solution file
    solution: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
    format: OutputFormat,

    /// Fail on dependencies that are not part of the solution
    #[arg(long)]
    strict: bool,
}

impl TreeCommand {
    pub fn execute(self) -> Result<()> {
        let solution = load_solution(&self.solution)?;
        let strictness = if self.strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        };
        let tree = hierarchy(&solution.items, strictness)?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree.roots)?),
            OutputFormat::Text => print!("{}", render_text(&tree.roots)),
            OutputFormat::Tree => {
                print!("{}", render_tree(&tree.roots, &solution));
                if !tree.missing.is_empty() {
                    println!(
                        "\n{} not in the solution: {}",
                        "!".yellow(),
                        tree.missing.join(", ")
                    );
                }
            }
        }
        Ok(())
    }
}

/// One line per node, indented two spaces per level.
fn render_text(roots: &[HierarchyNode]) -> String {
    fn walk(node: &HierarchyNode, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.id);
        out.push('\n');
        for child in &node.dependencies {
            walk(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    for root in roots {
        walk(root, 0, &mut out);
    }
    out
}

/// Box-drawing tree with kinds next to ids.
fn render_tree(roots: &[HierarchyNode], solution: &Solution) -> String {
    fn label(node: &HierarchyNode, solution: &Solution) -> String {
        match solution.item(&node.id) {
            Some(item) => format!("{} ({})", node.id, item.kind),
            None => format!("{} (external)", node.id),
        }
    }

    fn walk(node: &HierarchyNode, prefix: &str, solution: &Solution, out: &mut String) {
        let count = node.dependencies.len();
        for (i, child) in node.dependencies.iter().enumerate() {
            let last = i + 1 == count;
            let (branch, extension) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            out.push_str(&format!("{prefix}{branch}{}\n", label(child, solution)));
            walk(child, &format!("{prefix}{extension}"), solution, out);
        }
    }

    let mut out = String::new();
    for root in roots {
        out.push_str(&label(root, solution));
        out.push('\n');
        walk(root, "", solution, &mut out);
    }
    out
}
