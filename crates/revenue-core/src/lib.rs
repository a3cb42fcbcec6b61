//! `revenue-core` — configuration, error taxonomy and record types shared by
//! the daily revenue pipeline and its scheduler.

pub mod config;
pub mod error;
pub mod types;

pub use config::RevenueConfig;
pub use error::{Result, RevenueError};
pub use types::{DailyRevenue, OrderLine, RunState, Stage};
