//! Core domain types and logic.

pub mod config_validation;
pub mod date_range;
pub mod error;
pub mod frontier;
pub mod market;
pub mod ordered_index;
pub mod portfolio;
pub mod price_bar;
pub mod search;
pub mod stats;
