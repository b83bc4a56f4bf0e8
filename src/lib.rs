//! portopt: mean/variance portfolio frontier explorer.
//!
//! Hexagonal layout: the ordered index, frontier and statistics live in
//! [`domain`], port traits in [`ports`], SQLite/CSV/INI implementations in
//! [`adapters`], and the command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
