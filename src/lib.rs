//! viperview - Terminal UI analyzer for installed Python package sizes
//!
//! This crate lists the packages installed in a Python environment, measures
//! how much disk space each one occupies, and offers ranking, filtering and
//! export over the resulting snapshot, with a terminal-based user interface
//! for exploring it.

pub mod aggregate;
pub mod config;
pub mod export;
pub mod registry;
pub mod scan;
pub mod ui;
