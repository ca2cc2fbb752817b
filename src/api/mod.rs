//! API client module for the IGDB game database

pub mod catalog;
pub mod client;
pub mod images;

pub use catalog::{Catalog, CatalogClient};
pub use client::IgdbClient;
