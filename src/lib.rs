//! # Clan Sync
//!
//! Synchronizes clan rosters and battle history from a remote ranking
//! service into local persistent state.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, battles, outcomes)
//! - **config**: Configuration loading and validation
//! - **registry**: Immutable clan registry built at startup
//! - **api**: Authenticated ranking-service client with rate limiting
//! - **storage**: Persistence port and its implementations
//! - **reconcile**: Insert/update/skip decisions against stored state
//! - **sync**: Per-clan and all-clans run orchestration

pub mod api;
pub mod config;
pub mod models;
pub mod reconcile;
pub mod registry;
pub mod storage;
pub mod sync;

pub use models::*;
