//! gamedex - game catalog browser core
//!
//! Token lifecycle, IGDB catalog queries, the local record cache, and the
//! sync coordinator that ties them together. The `gamedex` binary is a thin
//! CLI over these modules.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;
#[cfg(test)]
mod testing;
