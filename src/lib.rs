//! Client-side cache and link resolver for HAL hypermedia APIs.
//!
//! - [`cache`]: object cache, request table, dependency graph, single-writer store.
//! - [`registry`]: resource type → data-access strategy and declared links.
//! - [`data`]: href construction, request de-duplication, live results.
//! - [`links`]: resolution of named links into live results.
//! - [`domain`]: value types shared by all of the above.

pub mod cache;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod links;
pub mod registry;
