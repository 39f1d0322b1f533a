//! Browser focus tracker that keeps a daily ledger of time spent per site and a streak of days
//! on which enough of it went to productive sites.
//! The daemon reads browser events from stdin and answers with notifications on stdout, the cli
//! shows and resets what was recorded.
//!

pub mod browser_api;
pub mod cli;
pub mod daemon;
pub mod engine;
pub mod fs;
pub mod utils;
