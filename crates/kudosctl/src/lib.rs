//! Kudos CLI library

pub mod cli;
pub mod client;
pub mod display;
