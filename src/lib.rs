//! AniTunes: pairwise ranking of anime theme songs.
//!
//! The library holds everything the web client needs (gateway client, song
//! queue controller, media state machine, identity, local storage and the
//! Dioxus views) so the core can be exercised natively in tests. The catalog
//! importer lives here too and is only compiled for native targets.

pub mod api;
pub mod auth;
pub mod components;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod queue;
pub mod utils;

#[cfg(not(target_arch = "wasm32"))]
pub mod importer;

pub use error::GatewayError;
