//! Local relational store for gitnote

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LocalStore, SqliteLocalStore};
