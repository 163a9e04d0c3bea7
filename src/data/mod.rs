//! Data layer module
//!
//! SQLite persistence for users and calendar muxes.

mod database;
mod models;

pub use database::Database;
pub use models::*;
