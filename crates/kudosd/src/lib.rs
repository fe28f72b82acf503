//! Kudos daemon library: HTTP surface over the reward and progression engine.

pub mod generators;
pub mod routes;
pub mod server;
pub mod state;
pub mod sweeper;
