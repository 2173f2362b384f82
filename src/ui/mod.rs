//! Terminal user interface for viperview
//!
//! This module provides the package table, search box and largest-packages
//! chart shown by the interactive mode.

mod app;
pub mod chart;

pub use app::{run_app, App, ScanStatus, VirtualScrollState};
pub use chart::{chart_bars, plasma_color, ChartBar};
