//! Core types for solkit
//!
//! This module holds the types every other module speaks in:
//!
//! - [`Item`] - a captured content item with its kind, body and dependencies
//! - [`SolkitError`] - the strongly-typed error enum
//! - [`ErrorContext`] / [`user_friendly_error`] - CLI presentation of errors
//!
//! # Thread Safety
//!
//! [`Item`] is plain data (`Send + Sync`) and is cloned freely between the
//! graph, the sorter and the deployment driver. [`SolkitError`] implements
//! [`Clone`] so a dependency's failure reason can be propagated to every
//! dependent item.

pub mod error;
pub mod item;

pub use error::{ErrorContext, SolkitError, user_friendly_error};
pub use item::{DEFAULT_COST_FACTOR, Item, kinds};
