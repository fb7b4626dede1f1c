//! solkit - capture portal content as reusable solutions and redeploy it.
//!
//! A *solution* is a set of content items (web maps, apps, dashboards,
//! story maps, groups, services) whose cross references have been frozen
//! into `{{id.param}}` placeholders. solkit captures such a set from one
//! portal, works out the order the items must be created in, and creates
//! them in another portal, rewriting every placeholder to the identifiers
//! the target portal assigned.
//!
//! # Architecture
//!
//! ```text
//! capture ──► handlers (per kind) ──► templating ──► solution file
//!                                                        │
//! deploy ◄── remap table ◄── sort ◄── graph ◄── extract ◄┘
//! ```
//!
//! - [`core`] - [`Item`](core::Item) and the [`SolkitError`](core::SolkitError) enum
//! - [`templating`] - placeholder syntax, freezing and thawing
//! - [`extract`] - dependency extraction dispatched per kind
//! - [`handlers`] - one [`ItemHandler`](handlers::ItemHandler) per kind
//! - [`graph`] - dependency graph, topological sort, hierarchy projection
//! - [`deploy`] - the deployment state machine and remap table
//! - [`store`] - the remote content store seam; [`portal`] implements it over REST
//! - [`capture`] / [`solution`] - capturing and persisting solutions
//! - [`config`] - user-wide settings in `~/.solkit/config.toml`
//! - [`cli`] - the `solkit` command-line interface
//!
//! # Example
//!
//! ```rust
//! use solkit_cli::core::Item;
//! use solkit_cli::graph::{GraphBuilder, TopologicalSorter, top_level};
//! use solkit_cli::handlers::HandlerRegistry;
//!
//! let items = vec![
//!     Item::new("wma", "Web Mapping Application").with_dependencies(["map"]),
//!     Item::new("map", "Web Map").with_dependencies(["svc"]),
//!     Item::new("svc", "Feature Service"),
//! ];
//! let registry = HandlerRegistry::with_defaults();
//! let graph = GraphBuilder::new(&registry).build(&items);
//! assert_eq!(TopologicalSorter::new().sort(&graph).unwrap(), ["svc", "map", "wma"]);
//! assert_eq!(top_level(&items), ["wma"]);
//! ```

// Core model
pub mod constants;
pub mod core;
pub mod templating;

// Dependency analysis
pub mod extract;
pub mod graph;
pub mod handlers;

// Remote side
pub mod deploy;
pub mod portal;
pub mod store;

// Solutions and the command line
pub mod capture;
pub mod cli;
pub mod config;
pub mod solution;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
