//! # Warlord deck optimization library
//!
//! warlord searches the space of card-deck compositions for a collectible
//! card game and ranks them by simulated score. A fixed pool of worker
//! threads repeatedly plays randomized battles through a pluggable
//! [`sim::Simulator`], a statistical scorer turns the outcome tallies into
//! confidence-bounded point estimates, and a greedy hill-climbing search
//! walks single-card mutations under an acquisition-budget constraint.

#[macro_use]
extern crate serde_derive;
extern crate serde;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate bincode;
extern crate flate2;
extern crate rand;
extern crate regex;
extern crate serde_json;

pub mod card;
pub mod catalog;
pub mod climb;
pub mod config;
pub mod cost;
pub mod deck;
pub mod ledger;
pub mod mutate;
pub mod pool;
pub mod requirement;
pub mod score;
pub mod sim;
pub mod skirmish;
pub mod stats;

pub use crate::catalog::Catalog;
pub use crate::climb::{ClimbResult, Optimizer};
pub use crate::config::OptimizerConfig;
pub use crate::deck::Deck;
pub use crate::pool::SimulatorPool;
