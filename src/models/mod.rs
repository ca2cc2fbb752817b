//! Data models for catalog entities

mod game;

pub use game::*;
