//! Road Director Library
//!
//! Turns player intents into queued, multi-tick vehicle actions on a shared
//! road network.

pub mod simulation;
