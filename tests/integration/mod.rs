//! Integration test suite for solkit
//!
//! End-to-end tests over the public API and the `solkit` binary. Remote
//! calls go to the in-memory `MockStore` from the `test-utils` feature, so
//! the suite needs no network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **ordering**: graph building, build order, top-level items and hierarchy
//! - **extraction**: per-kind dependency rules
//! - **deploy**: the deployment state machine against a mock store
//! - **capture**: capture, freeze and redeploy round trips
//! - **cli**: the `solkit` binary on solution files

mod capture;
mod cli;
mod deploy;
mod extraction;
mod ordering;

use solkit_cli::core::Item;

/// Items with only declared dependencies, in the given order.
pub fn items(layout: &[(&str, &[&str])]) -> Vec<Item> {
    layout.iter().map(|(id, deps)| Item::new(*id, "Thing").with_dependencies(deps.iter().copied())).collect()
}
