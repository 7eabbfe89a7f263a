//! Read-through cache with coalesced asynchronous lookups and
//! barrier-style invalidation, plus the ambient stack (errors, logging,
//! configuration) and a small demo HTTP surface built around it.

pub mod api;
pub mod cache;
pub mod env_config;
pub mod error;
pub mod http_cache;
pub mod logging;
