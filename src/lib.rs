//! Live server records for a server browser.
//!
//! Query workers feed snapshots into [`record::ServerRecord`]s held by
//! [`storage::memory::ServerStorage`]; list views read them and poll the
//! modified flag to decide what to redraw.

pub mod cache;
pub mod config;
pub mod extension;
pub mod handlers;
pub mod models;
pub mod players;
pub mod record;
pub mod storage;
pub mod utils;
