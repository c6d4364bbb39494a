pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod realtime;
pub mod services;
pub mod state;
pub mod stats;
pub mod store;
