pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod counter;
pub mod database;
pub mod error;
pub mod github;
pub mod logger;
pub mod model;
pub mod stats;
